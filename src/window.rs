// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! The slice of the OS windowing subsystem the core consumes.

use std::fmt;
use std::time::Duration;

use crate::error::OsError;

// ── Style bits (GWL_STYLE) ──────────────────────────
pub const WS_POPUP: u32 = 0x8000_0000;
pub const WS_CHILD: u32 = 0x4000_0000;
pub const WS_CAPTION: u32 = 0x00C0_0000;
pub const WS_SYSMENU: u32 = 0x0008_0000;
pub const WS_THICKFRAME: u32 = 0x0004_0000;
pub const WS_MINIMIZEBOX: u32 = 0x0002_0000;
pub const WS_MAXIMIZEBOX: u32 = 0x0001_0000;

/// Everything that draws a frame around a top-level window.
pub const DECORATION: u32 =
    WS_CAPTION | WS_THICKFRAME | WS_MINIMIZEBOX | WS_MAXIMIZEBOX | WS_SYSMENU;

/// Opaque handle of an OS window (an `HWND` on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub isize);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0 as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

// Minimized windows report their origin here.
const MINIMIZED_ORIGIN: i32 = -32000;

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Client area of a surface: same size, origin at 0/0.
    pub const fn sized(w: i32, h: i32) -> Self {
        Self { x: 0, y: 0, w, h }
    }

    /// Whether a window could reasonably be restored to this rect.
    pub fn is_sensible(&self) -> bool {
        self.w > 0 && self.h > 0 && self.x > MINIMIZED_ORIGIN && self.y > MINIMIZED_ORIGIN
    }
}

/// Window-system operations, all performed on the UI thread.
///
/// Implemented by the Win32 backend and by the in-memory fake used in tests.
pub trait WindowSystem {
    /// All top-level windows, in z-order.
    fn top_level_windows(&self) -> Vec<WindowId>;
    fn is_window(&self, id: WindowId) -> bool;
    fn is_visible(&self, id: WindowId) -> bool;
    /// `None` when the window vanished or has no title.
    fn title(&self, id: WindowId) -> Option<String>;

    fn style(&self, id: WindowId) -> Result<u32, OsError>;
    fn set_style(&self, id: WindowId, style: u32) -> Result<(), OsError>;
    /// `None` for a top-level window.
    fn parent(&self, id: WindowId) -> Result<Option<WindowId>, OsError>;
    fn set_parent(&self, id: WindowId, parent: Option<WindowId>) -> Result<(), OsError>;

    /// Screen rect of a top-level window, parent-relative for children.
    fn window_rect(&self, id: WindowId) -> Result<Rect, OsError>;
    fn client_rect(&self, id: WindowId) -> Result<Rect, OsError>;
    fn move_window(&self, id: WindowId, rect: Rect) -> Result<(), OsError>;
    /// Makes a style change visible (`SWP_FRAMECHANGED`).
    fn refresh_frame(&self, id: WindowId) -> Result<(), OsError>;
    fn show(&self, id: WindowId) -> Result<(), OsError>;

    /// Kills the processes owning `ids`, then waits once, up to `wait` in
    /// total, for all of them to exit. One result per id, in order.
    fn terminate_owners(&self, ids: &[WindowId], wait: Duration) -> Vec<Result<(), OsError>>;
}
