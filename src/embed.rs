// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! Embedding a foreign top-level window into a container surface and back.

use crate::error::{EmbedError, OsError};
use crate::window::{Rect, WindowId, WindowSystem, DECORATION, WS_CHILD, WS_POPUP};

/// Where a detached window goes when its old rect makes no sense.
pub const DEFAULT_RECT: Rect = Rect::new(100, 100, 1024, 768);

/// Pre-attach state of a window, restored on detach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedState {
    pub style: u32,
    pub parent: Option<WindowId>,
    pub rect: Rect,
}

/// A window currently (or formerly) reparented into a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embedding {
    pub window: WindowId,
    pub surface: WindowId,
    pub saved: SavedState,
    active: bool,
}

impl Embedding {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The window is gone; there is nothing left to restore.
    pub fn abandon(&mut self) {
        self.active = false;
    }
}

pub fn embedded_style(style: u32) -> u32 {
    (style & !(DECORATION | WS_POPUP)) | WS_CHILD
}

// Puts the window back to `parent`/`style` for whatever part of a
// reparent-and-restyle sequence ran, unless committed.
struct Rollback<'a> {
    sys: &'a dyn WindowSystem,
    op: &'static str,
    window: WindowId,
    parent: Option<WindowId>,
    style: u32,
    styled: bool,
    reparented: bool,
    committed: bool,
}

impl<'a> Rollback<'a> {
    fn new(
        sys: &'a dyn WindowSystem,
        op: &'static str,
        window: WindowId,
        parent: Option<WindowId>,
        style: u32,
    ) -> Self {
        Self { sys, op, window, parent, style, styled: false, reparented: false, committed: false }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if self.committed || !(self.styled || self.reparented) {
            return;
        }
        log::warn!("{} {}: rolling back", self.op, self.window);
        if self.reparented {
            let _ = self.sys.set_parent(self.window, self.parent);
        }
        if self.styled {
            let _ = self.sys.set_style(self.window, self.style);
        }
        let _ = self.sys.refresh_frame(self.window);
    }
}

/// Strips the frame from `window`, reparents it under `surface` and fills the
/// surface. On failure every change already applied is reverted.
pub fn attach(
    sys: &dyn WindowSystem,
    window: WindowId,
    surface: WindowId,
) -> Result<Embedding, EmbedError> {
    if !sys.is_window(window) {
        return Err(EmbedError::TargetVanished);
    }
    let saved = SavedState {
        style: sys.style(window).map_err(EmbedError::attach)?,
        parent: sys.parent(window).map_err(EmbedError::attach)?,
        rect: sys.window_rect(window).map_err(EmbedError::attach)?,
    };
    if saved.parent == Some(surface) {
        return Err(EmbedError::AlreadyAttached);
    }

    {
        let mut guard = Rollback::new(sys, "attach", window, saved.parent, saved.style);
        sys.set_style(window, embedded_style(saved.style))
            .map_err(EmbedError::attach)?;
        guard.styled = true;
        sys.set_parent(window, Some(surface))
            .map_err(EmbedError::attach)?;
        guard.reparented = true;
        sys.refresh_frame(window).map_err(EmbedError::attach)?;
        fit(sys, window, surface).map_err(EmbedError::attach)?;
        guard.commit();
    }

    log::info!("attach {} -> surface {}", window, surface);
    Ok(Embedding { window, surface, saved, active: true })
}

/// Resizes `window` to cover the client area of `surface`.
pub fn fit(sys: &dyn WindowSystem, window: WindowId, surface: WindowId) -> Result<(), OsError> {
    let client = sys.client_rect(surface)?;
    sys.move_window(window, Rect::sized(client.w, client.h))
}

/// Makes the window top-level again with its original style, parent and
/// position. Detaching an inactive embedding does nothing. On error the
/// window is left embedded exactly as before and the embedding stays active.
pub fn detach(sys: &dyn WindowSystem, embedding: &mut Embedding) -> Result<(), EmbedError> {
    if !embedding.active {
        return Ok(());
    }
    let window = embedding.window;
    if !sys.is_window(window) {
        log::debug!("detach {}: already gone", window);
        embedding.active = false;
        return Ok(());
    }
    match restore(sys, embedding) {
        Ok(()) | Err(OsError::Gone) => {
            embedding.active = false;
            log::info!("detach {}", window);
            Ok(())
        }
        Err(source) => {
            log::warn!("detach {}: {}", window, source);
            Err(EmbedError::Detach { source })
        }
    }
}

fn restore(sys: &dyn WindowSystem, embedding: &Embedding) -> Result<(), OsError> {
    let Embedding { window, surface, saved, .. } = embedding;
    let window = *window;
    {
        // Unparent before restyling, so a failed SetParent changes nothing.
        let mut guard =
            Rollback::new(sys, "detach", window, Some(*surface), embedded_style(saved.style));
        sys.set_parent(window, saved.parent)?;
        guard.reparented = true;
        sys.set_style(window, saved.style)?;
        guard.commit();
    }

    // Top-level again; the rest only affects looks.
    let rect = if saved.rect.is_sensible() { saved.rect } else { DEFAULT_RECT };
    let placed = sys
        .refresh_frame(window)
        .and_then(|()| sys.move_window(window, rect))
        .and_then(|()| sys.show(window));
    if let Err(e) = placed {
        log::debug!("detach {}: placement: {}", window, e);
    }
    Ok(())
}

/// Last resort after a failed `detach`: pulls the window out of its surface
/// so destroying the surface cannot take it along. Best effort.
pub fn release(sys: &dyn WindowSystem, embedding: &mut Embedding) {
    if !embedding.active {
        return;
    }
    let window = embedding.window;
    if sys.is_window(window) {
        let _ = sys.set_parent(window, None);
        let _ = sys.set_style(window, embedding.saved.style & !WS_CHILD);
        let _ = sys.refresh_frame(window);
        let _ = sys.show(window);
        log::warn!("release {}: unhooked from surface {}", window, embedding.surface);
    }
    embedding.active = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeWindows, Fault};
    use crate::window::{WS_CAPTION, WS_SYSMENU, WS_THICKFRAME};

    const VM_STYLE: u32 = WS_CAPTION | WS_THICKFRAME | WS_SYSMENU | 0x1000_0000;

    fn setup() -> (FakeWindows, WindowId, WindowId) {
        let sys = FakeWindows::new();
        let vm = sys.add_top_level("Ubuntu [Running]");
        sys.set_style_raw(vm, VM_STYLE);
        sys.set_rect_raw(vm, Rect::new(40, 60, 1280, 800));
        let surface = sys.add_surface(Rect::sized(900, 600));
        (sys, vm, surface)
    }

    #[test]
    fn attach_strips_frame_and_fills_surface() {
        let (sys, vm, surface) = setup();
        let emb = attach(&sys, vm, surface).unwrap();
        assert!(emb.is_active());
        assert_eq!(emb.saved.style, VM_STYLE);
        assert_eq!(emb.saved.parent, None);

        let now = sys.snapshot(vm);
        assert_eq!(now.parent, Some(surface));
        assert_eq!(now.style & DECORATION, 0);
        assert_eq!(now.style & WS_CHILD, WS_CHILD);
        assert_eq!(now.rect, Rect::sized(900, 600));
    }

    #[test]
    fn attach_then_detach_restores_style_and_parent() {
        let (sys, vm, surface) = setup();
        let before = sys.snapshot(vm);
        let mut emb = attach(&sys, vm, surface).unwrap();
        detach(&sys, &mut emb).unwrap();
        let after = sys.snapshot(vm);
        assert_eq!(after.style, before.style);
        assert_eq!(after.parent, before.parent);
        assert_eq!(after.rect, before.rect);
        assert!(after.visible);
        assert!(!emb.is_active());
    }

    #[test]
    fn detach_is_idempotent() {
        let (sys, vm, surface) = setup();
        let mut emb = attach(&sys, vm, surface).unwrap();
        detach(&sys, &mut emb).unwrap();
        let calls = sys.mutation_count(vm);
        detach(&sys, &mut emb).unwrap();
        assert_eq!(sys.mutation_count(vm), calls);
    }

    #[test]
    fn detach_uses_default_rect_for_minimized_origin() {
        let (sys, vm, surface) = setup();
        sys.set_rect_raw(vm, Rect::new(-32000, -32000, 160, 28));
        let mut emb = attach(&sys, vm, surface).unwrap();
        detach(&sys, &mut emb).unwrap();
        assert_eq!(sys.snapshot(vm).rect, DEFAULT_RECT);
    }

    #[test]
    fn access_denied_rolls_back_style() {
        let (sys, vm, surface) = setup();
        let before = sys.snapshot(vm);
        sys.inject(vm, Fault::SetParent(OsError::AccessDenied));
        let err = attach(&sys, vm, surface).unwrap_err();
        assert_eq!(err, EmbedError::AccessDenied);
        assert_eq!(err.to_string(), "attach failed: access denied");
        let after = sys.snapshot(vm);
        assert_eq!(after.style, before.style);
        assert_eq!(after.parent, None);
    }

    #[test]
    fn failure_after_reparent_restores_parent_too() {
        let (sys, vm, surface) = setup();
        let before = sys.snapshot(vm);
        sys.inject(surface, Fault::ClientRect(OsError::Failed {
            op: "GetClientRect",
            message: "nope".into(),
        }));
        assert!(matches!(attach(&sys, vm, surface), Err(EmbedError::Attach { .. })));
        let after = sys.snapshot(vm);
        assert_eq!(after.parent, before.parent);
        assert_eq!(after.style, before.style);
    }

    #[test]
    fn vanished_targets_report_target_vanished() {
        let (sys, vm, surface) = setup();
        sys.destroy(vm);
        assert_eq!(attach(&sys, vm, surface).unwrap_err(), EmbedError::TargetVanished);

        let (sys, vm, surface) = setup();
        sys.inject(vm, Fault::SetStyle(OsError::Gone));
        let err = attach(&sys, vm, surface).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "attach failed: target vanished");
    }

    #[test]
    fn detaching_a_dead_window_makes_no_os_calls() {
        let (sys, vm, surface) = setup();
        let mut emb = attach(&sys, vm, surface).unwrap();
        sys.destroy(vm);
        let calls = sys.mutation_count(vm);
        detach(&sys, &mut emb).unwrap();
        assert_eq!(sys.mutation_count(vm), calls);
        assert!(!emb.is_active());
    }

    #[test]
    fn refit_follows_surface_resize() {
        let (sys, vm, surface) = setup();
        attach(&sys, vm, surface).unwrap();
        sys.set_rect_raw(surface, Rect::sized(640, 480));
        fit(&sys, vm, surface).unwrap();
        assert_eq!(sys.snapshot(vm).rect, Rect::sized(640, 480));
    }

    #[test]
    fn failed_unparent_leaves_window_embedded() {
        let (sys, vm, surface) = setup();
        let mut emb = attach(&sys, vm, surface).unwrap();
        let embedded = sys.snapshot(vm);
        sys.inject(vm, Fault::SetParent(OsError::AccessDenied));

        let err = detach(&sys, &mut emb).unwrap_err();
        assert!(matches!(err, EmbedError::Detach { source: OsError::AccessDenied }));
        assert!(emb.is_active());
        let now = sys.snapshot(vm);
        assert_eq!(now.parent, Some(surface));
        assert_eq!(now.style, embedded.style);
        assert_eq!(now.style & DECORATION, 0);

        // Nothing half-done: a retry completes normally.
        detach(&sys, &mut emb).unwrap();
        assert_eq!(sys.snapshot(vm).style, VM_STYLE);
        assert_eq!(sys.snapshot(vm).parent, None);
    }

    #[test]
    fn failed_restyle_puts_window_back_into_surface() {
        let (sys, vm, surface) = setup();
        let mut emb = attach(&sys, vm, surface).unwrap();
        let embedded = sys.snapshot(vm);
        sys.inject(vm, Fault::SetStyle(OsError::AccessDenied));

        assert!(detach(&sys, &mut emb).is_err());
        assert!(emb.is_active());
        let now = sys.snapshot(vm);
        assert_eq!(now.parent, Some(surface));
        assert_eq!(now.style, embedded.style);
    }

    #[test]
    fn release_unhooks_after_failed_detach() {
        let (sys, vm, surface) = setup();
        let mut emb = attach(&sys, vm, surface).unwrap();
        sys.inject(vm, Fault::SetParent(OsError::AccessDenied));
        assert!(detach(&sys, &mut emb).is_err());

        release(&sys, &mut emb);
        assert!(!emb.is_active());
        let now = sys.snapshot(vm);
        assert_eq!(now.parent, None);
        assert_eq!(now.style & WS_CHILD, 0);
        assert_eq!(now.style, VM_STYLE);
    }
}
