// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! In-memory window system, tab view and timer for unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

use crate::error::OsError;
use crate::host::TabView;
use crate::poller::Timer;
use crate::window::{
    Rect, WindowId, WindowSystem, WS_CAPTION, WS_CHILD, WS_MAXIMIZEBOX, WS_MINIMIZEBOX,
    WS_SYSMENU, WS_THICKFRAME,
};

const WS_VISIBLE: u32 = 0x1000_0000;
const TOP_LEVEL_STYLE: u32 =
    WS_CAPTION | WS_THICKFRAME | WS_SYSMENU | WS_MINIMIZEBOX | WS_MAXIMIZEBOX | WS_VISIBLE;

/// One-shot failure injected into the next matching call.
#[derive(Debug, Clone)]
pub enum Fault {
    SetStyle(OsError),
    SetParent(OsError),
    ClientRect(OsError),
    Terminate(OsError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub style: u32,
    pub parent: Option<WindowId>,
    pub rect: Rect,
    pub visible: bool,
}

#[derive(Debug, Clone)]
struct FakeWindow {
    title: Option<String>,
    style: u32,
    parent: Option<WindowId>,
    rect: Rect,
    visible: bool,
    alive: bool,
}

#[derive(Debug, Default)]
struct State {
    next: isize,
    windows: BTreeMap<WindowId, FakeWindow>,
    repeats: Vec<WindowId>,
    vanish_after_enum: Vec<WindowId>,
    faults: Vec<(WindowId, Fault)>,
    mutations: HashMap<WindowId, usize>,
    attach_attempts: usize,
    restores: HashMap<WindowId, usize>,
    terminated: Vec<WindowId>,
    waits: usize,
}

impl State {
    fn add(&mut self, window: FakeWindow) -> WindowId {
        self.next += 0x10;
        let id = WindowId(0x1000 + self.next);
        self.windows.insert(id, window);
        id
    }

    fn live(&mut self, id: WindowId) -> Result<&mut FakeWindow, OsError> {
        self.windows
            .get_mut(&id)
            .filter(|w| w.alive)
            .ok_or(OsError::Gone)
    }

    fn take_fault(&mut self, id: WindowId, pick: fn(&Fault) -> bool) -> Option<Fault> {
        let pos = self.faults.iter().position(|(w, f)| *w == id && pick(f))?;
        Some(self.faults.remove(pos).1)
    }

    fn touch(&mut self, id: WindowId) {
        *self.mutations.entry(id).or_default() += 1;
    }
}

fn fault_error(fault: Fault) -> OsError {
    match fault {
        Fault::SetStyle(e) | Fault::SetParent(e) | Fault::ClientRect(e) | Fault::Terminate(e) => e,
    }
}

/// Shared handle: clones see the same windows.
#[derive(Debug, Clone, Default)]
pub struct FakeWindows {
    state: Rc<RefCell<State>>,
}

impl FakeWindows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_top_level(&self, title: &str) -> WindowId {
        self.state.borrow_mut().add(FakeWindow {
            title: Some(title.to_string()),
            style: TOP_LEVEL_STYLE,
            parent: None,
            rect: Rect::new(100, 100, 1024, 768),
            visible: true,
            alive: true,
        })
    }

    /// A container surface with the given client size.
    pub fn add_surface(&self, rect: Rect) -> WindowId {
        self.state.borrow_mut().add(FakeWindow {
            title: None,
            style: WS_CHILD | WS_VISIBLE,
            parent: Some(WindowId(1)),
            rect,
            visible: true,
            alive: true,
        })
    }

    pub fn set_title(&self, id: WindowId, title: &str) {
        if let Some(w) = self.state.borrow_mut().windows.get_mut(&id) {
            w.title = Some(title.to_string());
        }
    }

    pub fn set_visible(&self, id: WindowId, visible: bool) {
        if let Some(w) = self.state.borrow_mut().windows.get_mut(&id) {
            w.visible = visible;
        }
    }

    pub fn set_style_raw(&self, id: WindowId, style: u32) {
        if let Some(w) = self.state.borrow_mut().windows.get_mut(&id) {
            w.style = style;
        }
    }

    pub fn set_rect_raw(&self, id: WindowId, rect: Rect) {
        if let Some(w) = self.state.borrow_mut().windows.get_mut(&id) {
            w.rect = rect;
        }
    }

    /// Enumerate `id` once more, whatever its parent.
    pub fn repeat_in_enumeration(&self, id: WindowId) {
        self.state.borrow_mut().repeats.push(id);
    }

    /// `id` is enumerated but dies before its title can be read.
    pub fn vanish_after_enumeration(&self, id: WindowId) {
        self.state.borrow_mut().vanish_after_enum.push(id);
    }

    pub fn destroy(&self, id: WindowId) {
        if let Some(w) = self.state.borrow_mut().windows.get_mut(&id) {
            w.alive = false;
        }
    }

    pub fn inject(&self, id: WindowId, fault: Fault) {
        self.state.borrow_mut().faults.push((id, fault));
    }

    pub fn snapshot(&self, id: WindowId) -> Snapshot {
        let state = self.state.borrow();
        let w = &state.windows[&id];
        Snapshot { style: w.style, parent: w.parent, rect: w.rect, visible: w.visible }
    }

    /// Style/parent/position changes applied to `id`, failed ones included.
    pub fn mutation_count(&self, id: WindowId) -> usize {
        self.state.borrow().mutations.get(&id).copied().unwrap_or(0)
    }

    pub fn total_mutations(&self) -> usize {
        self.state.borrow().mutations.values().sum()
    }

    /// Calls that tried to turn a window into a child.
    pub fn attach_attempts(&self) -> usize {
        self.state.borrow().attach_attempts
    }

    /// Calls that put a non-child style back on `id`.
    pub fn restore_count(&self, id: WindowId) -> usize {
        self.state.borrow().restores.get(&id).copied().unwrap_or(0)
    }

    pub fn terminated(&self) -> Vec<WindowId> {
        self.state.borrow().terminated.clone()
    }

    /// How many times a caller waited for killed processes to exit.
    pub fn exit_waits(&self) -> usize {
        self.state.borrow().waits
    }
}

impl WindowSystem for FakeWindows {
    fn top_level_windows(&self) -> Vec<WindowId> {
        let mut state = self.state.borrow_mut();
        let mut out: Vec<WindowId> = state
            .windows
            .iter()
            .filter(|(_, w)| w.alive && w.parent.is_none())
            .map(|(id, _)| *id)
            .collect();
        out.extend(state.repeats.iter().copied());
        for id in std::mem::take(&mut state.vanish_after_enum) {
            if let Some(w) = state.windows.get_mut(&id) {
                w.alive = false;
            }
        }
        out
    }

    fn is_window(&self, id: WindowId) -> bool {
        self.state.borrow().windows.get(&id).is_some_and(|w| w.alive)
    }

    fn is_visible(&self, id: WindowId) -> bool {
        self.state.borrow().windows.get(&id).is_some_and(|w| w.alive && w.visible)
    }

    fn title(&self, id: WindowId) -> Option<String> {
        self.state.borrow_mut().live(id).ok()?.title.clone()
    }

    fn style(&self, id: WindowId) -> Result<u32, OsError> {
        Ok(self.state.borrow_mut().live(id)?.style)
    }

    fn set_style(&self, id: WindowId, style: u32) -> Result<(), OsError> {
        let mut state = self.state.borrow_mut();
        state.touch(id);
        if style & WS_CHILD != 0 {
            state.attach_attempts += 1;
        } else {
            *state.restores.entry(id).or_default() += 1;
        }
        if let Some(f) = state.take_fault(id, |f| matches!(f, Fault::SetStyle(_))) {
            return Err(fault_error(f));
        }
        state.live(id)?.style = style;
        Ok(())
    }

    fn parent(&self, id: WindowId) -> Result<Option<WindowId>, OsError> {
        Ok(self.state.borrow_mut().live(id)?.parent)
    }

    fn set_parent(&self, id: WindowId, parent: Option<WindowId>) -> Result<(), OsError> {
        let mut state = self.state.borrow_mut();
        state.touch(id);
        if let Some(f) = state.take_fault(id, |f| matches!(f, Fault::SetParent(_))) {
            return Err(fault_error(f));
        }
        state.live(id)?.parent = parent;
        Ok(())
    }

    fn window_rect(&self, id: WindowId) -> Result<Rect, OsError> {
        Ok(self.state.borrow_mut().live(id)?.rect)
    }

    fn client_rect(&self, id: WindowId) -> Result<Rect, OsError> {
        let mut state = self.state.borrow_mut();
        if let Some(f) = state.take_fault(id, |f| matches!(f, Fault::ClientRect(_))) {
            return Err(fault_error(f));
        }
        let r = state.live(id)?.rect;
        Ok(Rect::sized(r.w, r.h))
    }

    fn move_window(&self, id: WindowId, rect: Rect) -> Result<(), OsError> {
        let mut state = self.state.borrow_mut();
        state.touch(id);
        state.live(id)?.rect = rect;
        Ok(())
    }

    fn refresh_frame(&self, id: WindowId) -> Result<(), OsError> {
        let mut state = self.state.borrow_mut();
        state.touch(id);
        state.live(id).map(|_| ())
    }

    fn show(&self, id: WindowId) -> Result<(), OsError> {
        let mut state = self.state.borrow_mut();
        state.touch(id);
        state.live(id)?.visible = true;
        Ok(())
    }

    fn terminate_owners(&self, ids: &[WindowId], _wait: Duration) -> Vec<Result<(), OsError>> {
        let mut state = self.state.borrow_mut();
        let results: Vec<_> = ids
            .iter()
            .map(|&id| {
                if let Some(f) = state.take_fault(id, |f| matches!(f, Fault::Terminate(_))) {
                    return Err(fault_error(f));
                }
                state.live(id)?.alive = false;
                state.terminated.push(id);
                Ok(())
            })
            .collect();
        if results.iter().any(Result::is_ok) {
            state.waits += 1;
        }
        results
    }
}

/// Tab strip backed by fake surfaces.
#[derive(Debug)]
pub struct FakeView {
    sys: FakeWindows,
    pages: Vec<(String, WindowId)>,
    current: Option<usize>,
    removed: Vec<WindowId>,
    fail_next: bool,
}

impl FakeView {
    pub fn new(sys: FakeWindows) -> Self {
        Self { sys, pages: Vec::new(), current: None, removed: Vec::new(), fail_next: false }
    }

    pub fn captions(&self) -> Vec<String> {
        self.pages.iter().map(|(c, _)| c.clone()).collect()
    }

    /// Surfaces destroyed so far.
    pub fn removed(&self) -> Vec<WindowId> {
        self.removed.clone()
    }

    pub fn fail_next_page(&mut self) {
        self.fail_next = true;
    }
}

impl TabView for FakeView {
    fn add_page(&mut self, caption: &str) -> Result<WindowId, OsError> {
        if std::mem::take(&mut self.fail_next) {
            return Err(OsError::Failed { op: "CreateWindowExW", message: "fake".into() });
        }
        let surface = self.sys.add_surface(Rect::sized(800, 600));
        self.pages.push((caption.to_string(), surface));
        if self.current.is_none() {
            self.current = Some(0);
        }
        Ok(surface)
    }

    fn remove_page(&mut self, index: usize) {
        if index >= self.pages.len() {
            return;
        }
        let (_, surface) = self.pages.remove(index);
        self.sys.destroy(surface);
        self.removed.push(surface);
        self.current = match self.current {
            _ if self.pages.is_empty() => None,
            Some(c) if c > index => Some(c - 1),
            Some(c) => Some(c.min(self.pages.len() - 1)),
            None => None,
        };
    }

    fn set_caption(&mut self, index: usize, caption: &str) {
        if let Some(page) = self.pages.get_mut(index) {
            page.0 = caption.to_string();
        }
    }

    fn move_page(&mut self, from: usize, to: usize) {
        if from < self.pages.len() && to < self.pages.len() {
            let page = self.pages.remove(from);
            self.pages.insert(to, page);
        }
    }

    fn current(&self) -> Option<usize> {
        self.current
    }

    fn select(&mut self, index: usize) {
        if index < self.pages.len() {
            self.current = Some(index);
        }
    }
}

#[derive(Debug, Default)]
pub struct ManualTimer {
    pub armed: Option<Duration>,
    pub arms: Vec<Duration>,
}

impl Timer for ManualTimer {
    fn arm(&mut self, interval: Duration) {
        self.armed = Some(interval);
        self.arms.push(interval);
    }

    fn disarm(&mut self) {
        self.armed = None;
    }
}
