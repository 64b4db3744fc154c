// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! Common-controls tab strip with one page window per tab, plus the
//! `SetTimer` tick source for the poller.

use std::ffi::c_void;
use std::mem;
use std::sync::atomic::{AtomicIsize, Ordering::SeqCst};
use std::time::Duration;

use windows_core::{w, Error, Result, PCWSTR, PWSTR};
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Gdi::*;
use windows::Win32::UI::Controls::{
    TCHITTESTINFO, TCIF_TEXT, TCITEMW, TCM_ADJUSTRECT, TCM_DELETEITEM, TCM_GETCURSEL,
    TCM_GETITEMRECT, TCM_HITTEST, TCM_INSERTITEMW, TCM_SETCURSEL, TCM_SETITEMW, WC_TABCONTROLW,
};
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::error::OsError;
use crate::host::TabView;
use crate::poller::Timer;
use crate::win32::sys::window_id;
use crate::window::WindowId;

pub const TAB_CLASS: PCWSTR = WC_TABCONTROLW;
pub const PAGE_CLASS: PCWSTR = w!("VBoxTabsPage");

/// Page background, swapped on theme change.
static PAGE_BRUSH: AtomicIsize = AtomicIsize::new(0);

pub fn set_page_brush(brush: HBRUSH) {
    let old = PAGE_BRUSH.swap(brush.0 as isize, SeqCst);
    if old != 0 {
        unsafe {
            let _ = DeleteObject(HBRUSH(old as *mut c_void));
        }
    }
}

unsafe extern "system" fn page_proc(hwnd: HWND, msg: u32, wp: WPARAM, lp: LPARAM) -> LRESULT {
    if msg == WM_ERASEBKGND {
        let brush = PAGE_BRUSH.load(SeqCst);
        if brush != 0 {
            let mut rc = RECT::default();
            let _ = GetClientRect(hwnd, &mut rc);
            FillRect(HDC(wp.0 as *mut c_void), &rc, HBRUSH(brush as *mut c_void));
            return LRESULT(1);
        }
    }
    DefWindowProcW(hwnd, msg, wp, lp)
}

pub fn register_page_class(hinst: HINSTANCE) -> Result<()> {
    let wc = WNDCLASSEXW {
        cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
        lpfnWndProc: Some(page_proc),
        hInstance: hinst,
        hCursor: unsafe { LoadCursorW(None, IDC_ARROW)? },
        lpszClassName: PAGE_CLASS,
        ..Default::default()
    };
    if unsafe { RegisterClassExW(&wc) } == 0 {
        return Err(Error::from_win32());
    }
    Ok(())
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

// `text` must outlive the message the item is sent with.
fn text_item(text: &mut [u16]) -> TCITEMW {
    TCITEMW {
        mask: TCIF_TEXT,
        pszText: PWSTR(text.as_mut_ptr()),
        cchTextMax: text.len() as i32,
        iImage: -1,
        ..Default::default()
    }
}

pub struct Win32TabView {
    tab: HWND,
    hinst: HINSTANCE,
    pages: Vec<HWND>,
    captions: Vec<String>,
}

impl Win32TabView {
    pub fn new(tab: HWND, hinst: HINSTANCE) -> Self {
        Self { tab, hinst, pages: Vec::new(), captions: Vec::new() }
    }

    pub fn hwnd(&self) -> HWND {
        self.tab
    }

    pub fn page(&self, index: usize) -> Option<HWND> {
        self.pages.get(index).copied()
    }

    /// Tab under a point in tab-control client coordinates.
    pub fn hit_test(&self, x: i32, y: i32) -> Option<usize> {
        let mut info = TCHITTESTINFO { pt: POINT { x, y }, ..Default::default() };
        let hit = unsafe {
            SendMessageW(self.tab, TCM_HITTEST, WPARAM(0), LPARAM(&mut info as *mut _ as isize))
        };
        usize::try_from(hit.0).ok()
    }

    /// Rectangle of the tab button at `index`, in tab-control client coordinates.
    pub fn item_rect(&self, index: usize) -> Option<RECT> {
        let mut rc = RECT::default();
        let ok = unsafe {
            SendMessageW(self.tab, TCM_GETITEMRECT, WPARAM(index), LPARAM(&mut rc as *mut _ as isize))
        };
        (ok.0 != 0).then_some(rc)
    }

    /// Page area inside the strip, in tab-control client coordinates.
    pub fn display_rect(&self) -> RECT {
        let mut rc = RECT::default();
        unsafe {
            let _ = GetClientRect(self.tab, &mut rc);
            SendMessageW(self.tab, TCM_ADJUSTRECT, WPARAM(0), LPARAM(&mut rc as *mut _ as isize));
        }
        rc
    }

    /// Moves the strip to `area` (host client coordinates) and fits every page.
    pub fn layout(&self, area: RECT) {
        unsafe {
            let _ = MoveWindow(
                self.tab,
                area.left,
                area.top,
                area.right - area.left,
                area.bottom - area.top,
                TRUE,
            );
        }
        let rc = self.display_rect();
        for page in &self.pages {
            unsafe {
                let _ = MoveWindow(*page, rc.left, rc.top, rc.right - rc.left, rc.bottom - rc.top, TRUE);
            }
        }
    }

    /// Shows the page of the selected tab and hides the others.
    pub fn sync_pages(&self) {
        let current = self.current();
        for (i, page) in self.pages.iter().enumerate() {
            let cmd = if Some(i) == current { SW_SHOW } else { SW_HIDE };
            unsafe {
                let _ = ShowWindow(*page, cmd);
            }
        }
    }

    fn insert_item(&self, index: usize, caption: &str) -> isize {
        let mut text = wide(caption);
        let item = text_item(&mut text);
        unsafe {
            SendMessageW(self.tab, TCM_INSERTITEMW, WPARAM(index), LPARAM(&item as *const _ as isize)).0
        }
    }

    pub fn invalidate(&self) {
        unsafe {
            let _ = InvalidateRect(self.tab, None, TRUE);
            for page in &self.pages {
                let _ = InvalidateRect(*page, None, TRUE);
            }
        }
    }
}

impl TabView for Win32TabView {
    fn add_page(&mut self, caption: &str) -> std::result::Result<WindowId, OsError> {
        let rc = self.display_rect();
        let page = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                PAGE_CLASS,
                PCWSTR::null(),
                WS_CHILD | WS_CLIPCHILDREN,
                rc.left,
                rc.top,
                rc.right - rc.left,
                rc.bottom - rc.top,
                self.tab,
                HMENU::default(),
                self.hinst,
                None,
            )
        }
        .map_err(|e| OsError::Failed { op: "CreateWindowExW", message: e.message() })?;

        let index = self.pages.len();
        if self.insert_item(index, caption) < 0 {
            unsafe {
                let _ = DestroyWindow(page);
            }
            return Err(OsError::Failed { op: "TCM_INSERTITEMW", message: "tab insert failed".into() });
        }
        self.pages.push(page);
        self.captions.push(caption.to_string());
        if self.current().is_none() {
            self.select(index);
        }
        self.sync_pages();
        Ok(window_id(page))
    }

    fn remove_page(&mut self, index: usize) {
        if index >= self.pages.len() {
            return;
        }
        let was_current = self.current() == Some(index);
        let page = self.pages.remove(index);
        self.captions.remove(index);
        unsafe {
            SendMessageW(self.tab, TCM_DELETEITEM, WPARAM(index), LPARAM(0));
            let _ = DestroyWindow(page);
        }
        if was_current && !self.pages.is_empty() {
            self.select(index.min(self.pages.len() - 1));
        }
        self.sync_pages();
    }

    fn set_caption(&mut self, index: usize, caption: &str) {
        let Some(slot) = self.captions.get_mut(index) else { return };
        *slot = caption.to_string();
        let mut text = wide(caption);
        let item = text_item(&mut text);
        unsafe {
            SendMessageW(self.tab, TCM_SETITEMW, WPARAM(index), LPARAM(&item as *const _ as isize));
        }
    }

    fn move_page(&mut self, from: usize, to: usize) {
        let len = self.pages.len();
        if from >= len || to >= len || from == to {
            return;
        }
        // The control cannot move items; delete and re-insert.
        let page = self.pages.remove(from);
        let caption = self.captions.remove(from);
        unsafe {
            SendMessageW(self.tab, TCM_DELETEITEM, WPARAM(from), LPARAM(0));
        }
        self.insert_item(to, &caption);
        self.pages.insert(to, page);
        self.captions.insert(to, caption);
    }

    fn current(&self) -> Option<usize> {
        let sel = unsafe { SendMessageW(self.tab, TCM_GETCURSEL, WPARAM(0), LPARAM(0)) };
        usize::try_from(sel.0).ok().filter(|i| *i < self.pages.len())
    }

    fn select(&mut self, index: usize) {
        if index >= self.pages.len() {
            return;
        }
        // TCM_SETCURSEL sends no TCN_SELCHANGE; pages are synced here.
        unsafe {
            SendMessageW(self.tab, TCM_SETCURSEL, WPARAM(index), LPARAM(0));
        }
        self.sync_pages();
    }
}

/// `SetTimer` on the host window.
pub struct WinTimer {
    hwnd: HWND,
    id: usize,
}

impl WinTimer {
    pub fn new(hwnd: HWND, id: usize) -> Self {
        Self { hwnd, id }
    }
}

impl Timer for WinTimer {
    fn arm(&mut self, interval: Duration) {
        let ms = interval.as_millis().clamp(1, u32::MAX as u128) as u32;
        unsafe {
            let _ = SetTimer(self.hwnd, self.id, ms, None);
        }
    }

    fn disarm(&mut self) {
        unsafe {
            let _ = KillTimer(self.hwnd, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_item_covers_the_whole_caption() {
        let mut text = wide("Ubuntu");
        let item = text_item(&mut text);
        assert_eq!(item.mask, TCIF_TEXT);
        assert_eq!(item.pszText.0, text.as_mut_ptr());
        assert_eq!(item.cchTextMax, 7);
        assert_eq!(item.iImage, -1);
    }
}
