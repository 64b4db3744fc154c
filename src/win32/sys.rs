// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! `WindowSystem` on top of user32/kernel32.

use std::ffi::c_void;
use std::time::{Duration, Instant};

use windows::Win32::Foundation::*;
use windows::Win32::System::Threading::{
    GetCurrentProcessId, OpenProcess, TerminateProcess, WaitForMultipleObjects,
    PROCESS_SYNCHRONIZE, PROCESS_TERMINATE,
};
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::error::OsError;
use crate::window::{Rect, WindowId, WindowSystem, WS_CHILD};

/// Handle limit of `WaitForMultipleObjects`.
const WAIT_BATCH: usize = 64;

pub(crate) fn hwnd(id: WindowId) -> HWND {
    HWND(id.0 as *mut c_void)
}

pub(crate) fn window_id(hwnd: HWND) -> WindowId {
    WindowId(hwnd.0 as isize)
}

/// Turns a failed call into an `OsError`, checking whether the window is
/// still there first.
fn os_error(id: WindowId, op: &'static str, e: windows::core::Error) -> OsError {
    if !unsafe { IsWindow(hwnd(id)) }.as_bool() || e.code() == ERROR_INVALID_WINDOW_HANDLE.to_hresult() {
        OsError::Gone
    } else if e.code() == E_ACCESSDENIED {
        OsError::AccessDenied
    } else {
        OsError::Failed { op, message: e.message() }
    }
}

fn last_error(id: WindowId, op: &'static str) -> OsError {
    os_error(id, op, windows::core::Error::from_win32())
}

fn to_rect(rc: RECT) -> Rect {
    Rect::new(rc.left, rc.top, rc.right - rc.left, rc.bottom - rc.top)
}

// ── Enumeration ─────────────────────────────────────
unsafe extern "system" fn enum_windows_cb(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let vec = &mut *(lparam.0 as *mut Vec<WindowId>);
    vec.push(window_id(hwnd));
    TRUE
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Windows;

impl WindowSystem for Win32Windows {
    fn top_level_windows(&self) -> Vec<WindowId> {
        let mut ids: Vec<WindowId> = Vec::new();
        unsafe {
            let _ = EnumWindows(Some(enum_windows_cb), LPARAM(&mut ids as *mut Vec<WindowId> as isize));
        }
        ids
    }

    fn is_window(&self, id: WindowId) -> bool {
        unsafe { IsWindow(hwnd(id)) }.as_bool()
    }

    fn is_visible(&self, id: WindowId) -> bool {
        unsafe { IsWindowVisible(hwnd(id)) }.as_bool()
    }

    fn title(&self, id: WindowId) -> Option<String> {
        let mut buf = [0u16; 512];
        let len = unsafe { GetWindowTextW(hwnd(id), &mut buf) };
        if len <= 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&buf[..len as usize]))
    }

    fn style(&self, id: WindowId) -> Result<u32, OsError> {
        unsafe {
            SetLastError(WIN32_ERROR(0));
            let style = GetWindowLongPtrW(hwnd(id), GWL_STYLE);
            if style == 0 && GetLastError() != WIN32_ERROR(0) {
                return Err(last_error(id, "GetWindowLongPtrW"));
            }
            Ok(style as u32)
        }
    }

    fn set_style(&self, id: WindowId, style: u32) -> Result<(), OsError> {
        unsafe {
            // A zero return is only an error when the last error says so.
            SetLastError(WIN32_ERROR(0));
            let prev = SetWindowLongPtrW(hwnd(id), GWL_STYLE, style as i32 as isize);
            if prev == 0 && GetLastError() != WIN32_ERROR(0) {
                return Err(last_error(id, "SetWindowLongPtrW"));
            }
        }
        Ok(())
    }

    fn parent(&self, id: WindowId) -> Result<Option<WindowId>, OsError> {
        // Top-level windows may have an owner; only a real parent counts.
        if self.style(id)? & WS_CHILD == 0 {
            return Ok(None);
        }
        let parent = unsafe { GetAncestor(hwnd(id), GA_PARENT) };
        Ok((!parent.0.is_null()).then(|| window_id(parent)))
    }

    fn set_parent(&self, id: WindowId, parent: Option<WindowId>) -> Result<(), OsError> {
        let new_parent = parent.map(hwnd).unwrap_or_default();
        unsafe { SetParent(hwnd(id), new_parent) }
            .map(|_| ())
            .map_err(|e| os_error(id, "SetParent", e))
    }

    fn window_rect(&self, id: WindowId) -> Result<Rect, OsError> {
        let mut rc = RECT::default();
        unsafe { GetWindowRect(hwnd(id), &mut rc) }.map_err(|e| os_error(id, "GetWindowRect", e))?;
        Ok(to_rect(rc))
    }

    fn client_rect(&self, id: WindowId) -> Result<Rect, OsError> {
        let mut rc = RECT::default();
        unsafe { GetClientRect(hwnd(id), &mut rc) }.map_err(|e| os_error(id, "GetClientRect", e))?;
        Ok(to_rect(rc))
    }

    fn move_window(&self, id: WindowId, rect: Rect) -> Result<(), OsError> {
        unsafe { MoveWindow(hwnd(id), rect.x, rect.y, rect.w, rect.h, TRUE) }
            .map_err(|e| os_error(id, "MoveWindow", e))
    }

    fn refresh_frame(&self, id: WindowId) -> Result<(), OsError> {
        unsafe {
            SetWindowPos(
                hwnd(id),
                HWND::default(),
                0,
                0,
                0,
                0,
                SWP_FRAMECHANGED | SWP_NOMOVE | SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE,
            )
        }
        .map_err(|e| os_error(id, "SetWindowPos", e))
    }

    fn show(&self, id: WindowId) -> Result<(), OsError> {
        if !self.is_window(id) {
            return Err(OsError::Gone);
        }
        // Return value is the previous visibility, not success.
        let _ = unsafe { ShowWindow(hwnd(id), SW_SHOW) };
        Ok(())
    }

    fn terminate_owners(&self, ids: &[WindowId], wait: Duration) -> Vec<Result<(), OsError>> {
        let mut handles: Vec<HANDLE> = Vec::new();
        let results: Vec<Result<(), OsError>> = ids
            .iter()
            .map(|&id| {
                let handle = kill_owner(id)?;
                handles.push(handle);
                Ok(())
            })
            .collect();

        // One wait for the whole batch.
        let deadline = Instant::now() + wait;
        for chunk in handles.chunks(WAIT_BATCH) {
            let left = deadline.saturating_duration_since(Instant::now());
            let ms = left.as_millis().min(u32::MAX as u128) as u32;
            if unsafe { WaitForMultipleObjects(chunk, TRUE, ms) } == WAIT_TIMEOUT {
                log::warn!("terminate: {} process(es) still alive after {:?}", chunk.len(), wait);
            }
        }
        for handle in handles {
            unsafe {
                let _ = CloseHandle(handle);
            }
        }
        results
    }
}

/// Kills the process owning `id`; the returned handle can be waited on.
fn kill_owner(id: WindowId) -> Result<HANDLE, OsError> {
    let mut pid: u32 = 0;
    unsafe { GetWindowThreadProcessId(hwnd(id), Some(&mut pid)) };
    if pid == 0 {
        return Err(OsError::Gone);
    }
    if pid == unsafe { GetCurrentProcessId() } {
        return Err(OsError::Failed {
            op: "TerminateProcess",
            message: "refusing to terminate own process".into(),
        });
    }
    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE | PROCESS_SYNCHRONIZE, FALSE, pid)
            .map_err(|e| os_error(id, "OpenProcess", e))?;
        if let Err(e) = TerminateProcess(handle, 1) {
            let _ = CloseHandle(handle);
            return Err(os_error(id, "TerminateProcess", e));
        }
        log::info!("terminate {}: pid {}", id, pid);
        Ok(handle)
    }
}
