// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

use std::cell::RefCell;
use std::ffi::c_void;
use std::mem;
use std::sync::atomic::{AtomicIsize, Ordering::SeqCst};

use windows::core::*;
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Dwm::{DwmSetWindowAttribute, DWMWA_USE_IMMERSIVE_DARK_MODE};
use windows::Win32::Graphics::Gdi::*;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Registry::{RegGetValueW, HKEY_CURRENT_USER, RRF_RT_REG_DWORD};
use windows::Win32::UI::Controls::{
    InitCommonControlsEx, ICC_STANDARD_CLASSES, ICC_TAB_CLASSES, INITCOMMONCONTROLSEX, NMHDR,
    NM_RCLICK, TCN_SELCHANGE,
};
use windows::Win32::UI::HiDpi::{
    GetDpiForWindow, SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{GetKeyState, SetFocus, VK_CONTROL, VK_ESCAPE, VK_RETURN};
use windows::Win32::UI::Shell::ShellExecuteW;
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::host::{CloseOutcome, PollMode, Reconciled, TabHost};
use crate::launcher::launch_manager;
use crate::logging::{self, LOG_FILE};
use crate::matcher::TitleMatcher;
use crate::poller::Poller;
use crate::settings::{LiveSettings, SettingsForm, SETTINGS_FILE};
use crate::store::{NameStore, NAMES_DB};
use crate::theme::{Palette, Theme};
use crate::win32::dialog::{self, Choice};
use crate::win32::sys::{window_id, Win32Windows};
use crate::win32::view::{self, Win32TabView, WinTimer, TAB_CLASS};
use crate::window::WindowId;

const CLASS: PCWSTR = w!("VBoxTabs");
const TITLE: PCWSTR = w!("VBoxTabs Manager");
const POLL_TIMER: usize = 1;

// ── Control IDs ─────────────────────────────────────
const ID_TAB: u16 = 100;
const ID_STATUS: u16 = 101;
const ID_RENAME: u16 = 102;

const CMD_REFRESH: u16 = 200;
const CMD_ATTACH_ALL: u16 = 201;
const CMD_DETACH: u16 = 202;
const CMD_CLOSE_VM: u16 = 203;
const CMD_CLOSE_ALL: u16 = 204;
const CMD_RENAME: u16 = 205;
const CMD_MANAGER: u16 = 206;
const CMD_SETTINGS: u16 = 207;
const CMD_ABOUT: u16 = 208;
const CMD_EXIT: u16 = 209;

const MENU_RENAME: u16 = 300;
const MENU_DETACH: u16 = 301;
const MENU_LEFT: u16 = 302;
const MENU_RIGHT: u16 = 303;
const MENU_CLOSE: u16 = 304;

const TOOLBAR: [(u16, &str); 10] = [
    (CMD_REFRESH, "Refresh"),
    (CMD_ATTACH_ALL, "Attach all"),
    (CMD_DETACH, "Detach"),
    (CMD_CLOSE_VM, "Close VM"),
    (CMD_CLOSE_ALL, "Close all"),
    (CMD_RENAME, "Rename"),
    (CMD_MANAGER, "VirtualBox"),
    (CMD_SETTINGS, "Settings"),
    (CMD_ABOUT, "About"),
    (CMD_EXIT, "Exit"),
];

// Read by the message loop without borrowing the app state.
static TAB_HWND: AtomicIsize = AtomicIsize::new(0);
static RENAME_HWND: AtomicIsize = AtomicIsize::new(0);

type Host = TabHost<Win32Windows, Win32TabView>;

struct App {
    hwnd: HWND,
    hinst: HINSTANCE,
    host: Host,
    poller: Poller<WinTimer>,
    live: LiveSettings,
    buttons: Vec<HWND>,
    status: HWND,
    /// Edit box and the window whose tab is being renamed.
    rename: Option<(HWND, WindowId)>,
    palette: Palette,
    bg_brush: HBRUSH,
    font: HFONT,
    scale: f32,
}

thread_local! {
    static APP: RefCell<Option<App>> = const { RefCell::new(None) };
}

/// Runs `f` on the app state. Returns `None` when the state is missing or
/// already borrowed further up the stack (message re-entered through a
/// modal loop or a cross-thread `SendMessage`).
fn with_app<R>(f: impl FnOnce(&mut App) -> R) -> Option<R> {
    APP.with(|cell| {
        let mut guard = cell.try_borrow_mut().ok()?;
        let app = guard.as_mut()?;
        Some(f(app))
    })
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn window_text(hwnd: HWND) -> String {
    let mut buf = [0u16; 256];
    let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn loword(v: usize) -> u16 {
    (v & 0xFFFF) as u16
}

fn hiword(v: usize) -> u16 {
    ((v >> 16) & 0xFFFF) as u16
}

fn system_prefers_dark() -> bool {
    let mut value: u32 = 1;
    let mut size = mem::size_of::<u32>() as u32;
    let rc = unsafe {
        RegGetValueW(
            HKEY_CURRENT_USER,
            w!("Software\\Microsoft\\Windows\\CurrentVersion\\Themes\\Personalize"),
            w!("AppsUseLightTheme"),
            RRF_RT_REG_DWORD,
            None,
            Some(&mut value as *mut u32 as *mut c_void),
            Some(&mut size as *mut u32),
        )
    };
    rc == ERROR_SUCCESS && value == 0
}

unsafe fn ui_font(scale: f32) -> HFONT {
    let mut lf = LOGFONTW {
        lfHeight: -(12.0 * scale).round() as i32,
        lfWeight: 400,
        ..Default::default()
    };
    for (dst, src) in lf.lfFaceName.iter_mut().zip("Segoe UI".encode_utf16()) {
        *dst = src;
    }
    CreateFontIndirectW(&lf)
}

unsafe fn set_font(hwnd: HWND, font: HFONT) {
    SendMessageW(hwnd, WM_SETFONT, WPARAM(font.0 as usize), LPARAM(1));
}

impl App {
    fn notice(&self, text: &str) {
        let text = wide(text);
        unsafe {
            let _ = SetWindowTextW(self.status, PCWSTR(text.as_ptr()));
        }
    }

    // ── Poll ────────────────────────────────────────
    fn poll(&mut self, mode: PollMode) {
        let Some(cycle) = self.poller.poll(&mut self.host, &mut self.live, mode) else {
            return;
        };
        if let Some(delta) = cycle.settings {
            if delta.theme {
                self.apply_theme();
            }
            if delta.restart_required {
                self.notice("Settings reloaded; restart to apply the new DPI scaling");
            } else {
                self.notice("Settings reloaded");
            }
        }
        self.report(&cycle.reconciled);
    }

    fn report(&self, out: &Reconciled) {
        if let Some((name, e)) = out.failures.last() {
            self.notice(&format!("{name}: {e}"));
        } else if !out.attached.is_empty() {
            self.notice(&format!("Attached {} window(s)", out.attached.len()));
        } else if !out.dropped.is_empty() {
            self.notice(&format!("{} window(s) closed", out.dropped.len()));
        }
    }

    // ── Layout & theme ──────────────────────────────
    fn apply_scale(&mut self) {
        let auto = unsafe { GetDpiForWindow(self.hwnd) } as f32 / 96.0;
        self.scale = self.live.get().scale_factor().unwrap_or(auto).max(0.5);
        let old = mem::replace(&mut self.font, unsafe { ui_font(self.scale) });
        unsafe {
            for b in &self.buttons {
                set_font(*b, self.font);
            }
            set_font(self.status, self.font);
            set_font(self.host.view().hwnd(), self.font);
            if !old.is_invalid() {
                let _ = DeleteObject(old);
            }
        }
    }

    fn apply_theme(&mut self) {
        self.palette = self.live.get().theme.palette(system_prefers_dark());
        unsafe {
            let old = mem::replace(&mut self.bg_brush, CreateSolidBrush(COLORREF(self.palette.background)));
            if !old.is_invalid() {
                let _ = DeleteObject(old);
            }
            view::set_page_brush(CreateSolidBrush(COLORREF(self.palette.page)));
            let dark = BOOL::from(self.palette.dark_frame);
            let _ = DwmSetWindowAttribute(
                self.hwnd,
                DWMWA_USE_IMMERSIVE_DARK_MODE,
                &dark as *const _ as *const c_void,
                mem::size_of::<BOOL>() as u32,
            );
            let _ = InvalidateRect(self.hwnd, None, TRUE);
        }
        self.host.view().invalidate();
        log::info!("theme: {}", self.live.get().theme.name());
    }

    fn layout(&mut self) {
        let mut rc = RECT::default();
        unsafe {
            let _ = GetClientRect(self.hwnd, &mut rc);
        }
        let px = |v: f32| (v * self.scale).round() as i32;
        let (pad, bar_h, btn_w, status_h) = (px(4.0), px(28.0), px(84.0), px(22.0));

        let mut x = pad;
        for b in &self.buttons {
            unsafe {
                let _ = MoveWindow(*b, x, pad, btn_w, bar_h, TRUE);
            }
            x += btn_w + pad;
        }
        let top = bar_h + 2 * pad;
        let status_top = rc.bottom - status_h;
        unsafe {
            let _ = MoveWindow(self.status, pad, status_top, rc.right - 2 * pad, status_h, TRUE);
        }
        self.host.view().layout(RECT {
            left: pad,
            top,
            right: rc.right - pad,
            bottom: status_top - pad,
        });
        self.host.resize();
    }

    // ── Commands ────────────────────────────────────
    fn command(&mut self, cmd: u16) {
        match cmd {
            CMD_REFRESH => self.poll(PollMode::Auto),
            CMD_ATTACH_ALL => self.poll(PollMode::Manual),
            CMD_DETACH => match self.host.detach_current() {
                Ok(Some(record)) => self.notice(&format!("Detached '{}'", record.name)),
                Ok(None) => self.notice("No tab selected"),
                Err(e) => self.notice(&e.to_string()),
            },
            CMD_CLOSE_VM => match self.host.current() {
                Some(index) => self.force_close(index),
                None => self.notice("No tab selected"),
            },
            CMD_RENAME => match self.host.current() {
                Some(index) => self.start_rename(index),
                None => self.notice("No tab selected"),
            },
            CMD_MANAGER => match launch_manager(&self.live.get().vbox_path) {
                Ok(_) => self.notice("VirtualBox Manager started"),
                Err(e) => {
                    log::warn!("launch: {e}");
                    self.notice(&e.to_string());
                }
            },
            _ => {}
        }
    }

    fn force_close(&mut self, index: usize) {
        let name = self.host.tabs().get(index).map(|r| r.name.clone()).unwrap_or_default();
        match self.host.force_close_at(index) {
            Ok(CloseOutcome::Terminated) => self.notice(&format!("Closed '{name}'")),
            Ok(CloseOutcome::Detached(e)) => {
                self.notice(&format!("Could not close '{name}' ({e}); window detached instead"))
            }
            Err(e) => self.notice(&e.to_string()),
        }
    }

    fn menu_command(&mut self, cmd: u16, window: WindowId) {
        // The tab may have moved or gone while the menu was open.
        let Some(index) = self.host.tabs().position(window) else { return };
        match cmd {
            MENU_RENAME => self.start_rename(index),
            MENU_DETACH => {
                if let Err(e) = self.host.detach_at(index) {
                    self.notice(&e.to_string());
                }
            }
            MENU_LEFT if index > 0 => {
                self.host.reorder(index, index - 1);
            }
            MENU_RIGHT => {
                self.host.reorder(index, index + 1);
            }
            MENU_CLOSE => self.force_close(index),
            _ => {}
        }
    }

    /// Resolves a right-click on the tab strip. Returns the tab's window.
    fn menu_target(&mut self, screen: POINT, ctrl: bool) -> Option<WindowId> {
        let mut pt = screen;
        unsafe {
            let _ = ScreenToClient(self.host.view().hwnd(), &mut pt);
        }
        let hit = self.host.view().hit_test(pt.x, pt.y)?;
        let index = self.host.context_target(hit, ctrl)?;
        self.host.tabs().get(index).map(|r| r.window())
    }

    fn middle_click(&mut self, x: i32, y: i32) {
        if let Some(index) = self.host.view().hit_test(x, y) {
            self.force_close(index);
        }
    }

    fn save_settings(&mut self, form: SettingsForm) {
        let saved = form
            .apply(self.live.get())
            .and_then(|fresh| self.live.submit(fresh));
        match saved {
            // The next poll applies them, so run one now.
            Ok(()) => self.poll(PollMode::Auto),
            Err(e) => {
                log::warn!("{e}");
                self.notice(&e.to_string());
            }
        }
    }

    /// Opens `settings.json` in the default editor, for the keys the dialog
    /// does not show.
    fn open_settings_file(&mut self) {
        if let Err(e) = self.live.ensure_file() {
            log::warn!("{e}");
            self.notice(&e.to_string());
            return;
        }
        let path = self.live.path().to_path_buf();
        let file = wide(&path.to_string_lossy());
        let rc = unsafe {
            ShellExecuteW(self.hwnd, w!("open"), PCWSTR(file.as_ptr()), PCWSTR::null(), PCWSTR::null(), SW_SHOWNORMAL)
        };
        if rc.0 as isize <= 32 {
            log::warn!("open {}: ShellExecuteW returned {}", path.display(), rc.0 as isize);
            self.notice(&format!("Could not open {}", path.display()));
        } else {
            self.notice("Editing settings; changes apply on the next refresh");
        }
    }

    // ── Rename ──────────────────────────────────────
    fn start_rename(&mut self, index: usize) {
        self.finish_rename(false);
        let Some(record) = self.host.tabs().get(index) else { return };
        let (window, name) = (record.window(), wide(&record.name));
        let view = self.host.view();
        let Some(item) = view.item_rect(index) else { return };

        let mut pts = [POINT { x: item.left, y: item.top }, POINT { x: item.right, y: item.bottom }];
        unsafe {
            MapWindowPoints(view.hwnd(), self.hwnd, &mut pts);
        }
        let width = (pts[1].x - pts[0].x).max((120.0 * self.scale) as i32);
        let edit = unsafe {
            CreateWindowExW(
                WS_EX_CLIENTEDGE,
                w!("EDIT"),
                PCWSTR(name.as_ptr()),
                WS_CHILD | WS_VISIBLE | WINDOW_STYLE(ES_AUTOHSCROLL as u32),
                pts[0].x,
                pts[0].y,
                width,
                pts[1].y - pts[0].y,
                self.hwnd,
                HMENU(ID_RENAME as usize as *mut c_void),
                self.hinst,
                None,
            )
        };
        let edit = match edit {
            Ok(h) => h,
            Err(e) => {
                log::warn!("rename box: {e}");
                return;
            }
        };
        unsafe {
            set_font(edit, self.font);
            let _ = SetWindowPos(edit, HWND_TOP, 0, 0, 0, 0, SWP_NOMOVE | SWP_NOSIZE);
            SendMessageW(edit, EM_SETSEL, WPARAM(0), LPARAM(-1));
            let _ = SetFocus(edit);
        }
        RENAME_HWND.store(edit.0 as isize, SeqCst);
        self.rename = Some((edit, window));
    }

    fn finish_rename(&mut self, commit: bool) {
        let Some((edit, window)) = self.rename.take() else { return };
        RENAME_HWND.store(0, SeqCst);
        let text = commit.then(|| window_text(edit));
        unsafe {
            let _ = DestroyWindow(edit);
        }
        let (Some(text), Some(index)) = (text, self.host.tabs().position(window)) else { return };
        if let Err(e) = self.host.rename_at(index, &text) {
            self.notice(&e.to_string());
        }
    }

    // ── Exit ────────────────────────────────────────
    fn shutdown(&mut self) {
        self.finish_rename(false);
        self.poller.stop();
        let report = self.host.shutdown();
        for (name, e) in &report.failed {
            log::error!("exit: '{name}' left embedded: {e}");
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteObject(self.bg_brush);
            let _ = DeleteObject(self.font);
        }
    }
}

// ── Modal UI (runs outside the app borrow) ──────────
unsafe fn show_tab_menu(hwnd: HWND) {
    let mut pt = POINT::default();
    let _ = GetCursorPos(&mut pt);
    let ctrl = GetKeyState(VK_CONTROL.0 as i32) < 0;
    let Some(Some(window)) = with_app(|a| a.menu_target(pt, ctrl)) else { return };

    let Ok(menu) = CreatePopupMenu() else { return };
    for (id, label) in [
        (MENU_RENAME, w!("Rename")),
        (MENU_DETACH, w!("Detach")),
        (MENU_LEFT, w!("Move left")),
        (MENU_RIGHT, w!("Move right")),
    ] {
        let _ = AppendMenuW(menu, MF_STRING, id as usize, label);
    }
    let _ = AppendMenuW(menu, MF_SEPARATOR, 0, PCWSTR::null());
    let _ = AppendMenuW(menu, MF_STRING, MENU_CLOSE as usize, w!("Close window"));

    let _ = SetForegroundWindow(hwnd);
    let cmd = TrackPopupMenu(menu, TPM_RETURNCMD | TPM_RIGHTBUTTON, pt.x, pt.y, 0, hwnd, None);
    let _ = DestroyMenu(menu);
    if cmd.0 != 0 {
        with_app(|a| a.menu_command(cmd.0 as u16, window));
    }
}

unsafe fn confirm_close_all(hwnd: HWND) {
    let Some(count) = with_app(|a| a.host.tabs().len()) else { return };
    if count == 0 {
        with_app(|a| a.notice("No tabs to close"));
        return;
    }
    let text = wide(&format!(
        "Terminate all {count} virtual machine(s)?\nUnsaved guest state will be lost."
    ));
    let answer = MessageBoxW(hwnd, PCWSTR(text.as_ptr()), TITLE, MB_YESNO | MB_ICONWARNING);
    if answer != IDYES {
        return;
    }
    with_app(|a| {
        let killed = a.host.close_all();
        a.notice(&format!("Closed {killed} of {count} virtual machine(s)"));
    });
}

unsafe fn show_settings(hwnd: HWND) {
    let Some((base, hinst, font, scale)) =
        with_app(|a| (a.live.get().clone(), a.hinst, a.font, a.scale))
    else {
        return;
    };
    match dialog::run(hwnd, hinst, font, scale, &base) {
        Choice::Save(form) => {
            with_app(|a| a.save_settings(form));
        }
        Choice::EditFile => {
            with_app(|a| a.open_settings_file());
        }
        Choice::Cancel => {}
    }
}

unsafe fn show_about(hwnd: HWND) {
    let text = wide(&format!(
        "VBoxTabs Manager {}\n\nCollects running VirtualBox machine windows into tabs.\n\
         Author: Zalexanninev15\nLicense: MIT\n\nLog: {}",
        env!("CARGO_PKG_VERSION"),
        crate::app_dir().join(LOG_FILE).display()
    ));
    let _ = MessageBoxW(hwnd, PCWSTR(text.as_ptr()), TITLE, MB_OK | MB_ICONINFORMATION);
}

// ── Window Procedure ────────────────────────────────
unsafe extern "system" fn wndproc(hwnd: HWND, msg: u32, wp: WPARAM, lp: LPARAM) -> LRESULT {
    match msg {
        WM_TIMER if wp.0 == POLL_TIMER => {
            with_app(|a| a.poll(PollMode::Auto));
            LRESULT(0)
        }

        WM_SIZE => {
            with_app(|a| a.layout());
            LRESULT(0)
        }

        WM_GETMINMAXINFO => {
            let info = &mut *(lp.0 as *mut MINMAXINFO);
            info.ptMinTrackSize = POINT { x: 640, y: 400 };
            LRESULT(0)
        }

        WM_DPICHANGED => {
            let rc = &*(lp.0 as *const RECT);
            let _ = SetWindowPos(
                hwnd,
                HWND::default(),
                rc.left,
                rc.top,
                rc.right - rc.left,
                rc.bottom - rc.top,
                SWP_NOZORDER | SWP_NOACTIVATE,
            );
            with_app(|a| {
                a.apply_scale();
                a.layout();
            });
            LRESULT(0)
        }

        WM_SETTINGCHANGE => {
            with_app(|a| {
                if a.live.get().theme == Theme::System {
                    a.apply_theme();
                }
            });
            DefWindowProcW(hwnd, msg, wp, lp)
        }

        WM_ERASEBKGND => {
            let Some(brush) = with_app(|a| a.bg_brush) else {
                return DefWindowProcW(hwnd, msg, wp, lp);
            };
            let mut rc = RECT::default();
            let _ = GetClientRect(hwnd, &mut rc);
            FillRect(HDC(wp.0 as *mut c_void), &rc, brush);
            LRESULT(1)
        }

        WM_CTLCOLORSTATIC => {
            let Some((palette, brush)) = with_app(|a| (a.palette, a.bg_brush)) else {
                return DefWindowProcW(hwnd, msg, wp, lp);
            };
            let hdc = HDC(wp.0 as *mut c_void);
            SetTextColor(hdc, COLORREF(palette.text));
            SetBkColor(hdc, COLORREF(palette.background));
            LRESULT(brush.0 as isize)
        }

        WM_COMMAND => {
            let (id, code) = (loword(wp.0), hiword(wp.0));
            match id {
                ID_RENAME if u32::from(code) == EN_KILLFOCUS => {
                    with_app(|a| a.finish_rename(true));
                }
                CMD_CLOSE_ALL => confirm_close_all(hwnd),
                CMD_SETTINGS => show_settings(hwnd),
                CMD_ABOUT => show_about(hwnd),
                CMD_EXIT => {
                    let _ = PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0));
                }
                _ => {
                    with_app(|a| a.command(id));
                }
            }
            LRESULT(0)
        }

        WM_NOTIFY => {
            let hdr = &*(lp.0 as *const NMHDR);
            if hdr.idFrom == ID_TAB as usize {
                match hdr.code {
                    TCN_SELCHANGE => {
                        with_app(|a| {
                            a.finish_rename(false);
                            a.host.view().sync_pages();
                            a.host.resize();
                        });
                    }
                    NM_RCLICK => show_tab_menu(hwnd),
                    _ => {}
                }
            }
            LRESULT(0)
        }

        WM_ENDSESSION => {
            if wp.0 != 0 {
                log::info!("WM_ENDSESSION");
                with_app(|a| a.shutdown());
            }
            LRESULT(0)
        }

        WM_CLOSE => {
            log::info!("WM_CLOSE received");
            if with_app(|a| a.shutdown()).is_none() {
                // State is busy further up the stack; retry once it unwinds.
                let _ = PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0));
                return LRESULT(0);
            }
            let _ = DestroyWindow(hwnd);
            LRESULT(0)
        }

        WM_DESTROY => {
            PostQuitMessage(0);
            LRESULT(0)
        }

        _ => DefWindowProcW(hwnd, msg, wp, lp),
    }
}

/// Messages the controls would otherwise swallow. Returns true when handled.
fn intercept(msg: &MSG) -> bool {
    let rename = RENAME_HWND.load(SeqCst);
    if rename != 0 && msg.hwnd.0 as isize == rename && msg.message == WM_KEYDOWN {
        let key = msg.wParam.0;
        if key == VK_RETURN.0 as usize || key == VK_ESCAPE.0 as usize {
            with_app(|a| a.finish_rename(key == VK_RETURN.0 as usize));
            return true;
        }
    }
    let tab = TAB_HWND.load(SeqCst);
    if tab != 0 && msg.hwnd.0 as isize == tab && msg.message == WM_MBUTTONUP {
        let x = (msg.lParam.0 & 0xFFFF) as i16 as i32;
        let y = ((msg.lParam.0 >> 16) & 0xFFFF) as i16 as i32;
        with_app(|a| a.middle_click(x, y));
        return true;
    }
    false
}

unsafe fn create_child(
    parent: HWND,
    hinst: HINSTANCE,
    class: PCWSTR,
    text: &str,
    style: WINDOW_STYLE,
    id: u16,
) -> Result<HWND> {
    let text = wide(text);
    CreateWindowExW(
        WINDOW_EX_STYLE::default(),
        class,
        PCWSTR(text.as_ptr()),
        WS_CHILD | WS_VISIBLE | style,
        0,
        0,
        0,
        0,
        parent,
        HMENU(id as usize as *mut c_void),
        hinst,
        None,
    )
}

pub fn run() -> Result<()> {
    // ── Single-Instance Guard ───────────────────────
    if let Ok(existing) = unsafe { FindWindowW(CLASS, None) } {
        if existing != HWND::default() {
            unsafe {
                let _ = ShowWindow(existing, SW_RESTORE);
                let _ = SetForegroundWindow(existing);
            }
            return Ok(());
        }
    }

    let dir = crate::app_dir();
    if let Err(e) = logging::init(&dir.join(LOG_FILE), log::LevelFilter::Info) {
        eprintln!("logger: {e}");
    }
    log::info!("=== VBoxTabs {} START ===", env!("CARGO_PKG_VERSION"));
    let live = LiveSettings::load(dir.join(SETTINGS_FILE));
    let settings = live.get().clone();
    logging::set_level(settings.log_filter());

    unsafe {
        let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
        let _ = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
        let icc = INITCOMMONCONTROLSEX {
            dwSize: mem::size_of::<INITCOMMONCONTROLSEX>() as u32,
            dwICC: ICC_TAB_CLASSES | ICC_STANDARD_CLASSES,
        };
        let _ = InitCommonControlsEx(&icc);

        let inst = GetModuleHandleW(None)?;
        let hinst: HINSTANCE = inst.into();
        let wc = WNDCLASSEXW {
            cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(wndproc),
            hInstance: hinst,
            hCursor: LoadCursorW(None, IDC_ARROW)?,
            hIcon: LoadIconW(None, IDI_APPLICATION)?,
            lpszClassName: CLASS,
            ..Default::default()
        };
        RegisterClassExW(&wc);
        view::register_page_class(hinst)?;
        dialog::register_class(hinst)?;

        let hwnd = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            CLASS,
            TITLE,
            WS_OVERLAPPEDWINDOW | WS_CLIPCHILDREN,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            1280,
            860,
            HWND::default(),
            HMENU::default(),
            hinst,
            None,
        )?;
        log::info!("host window 0x{:X}", hwnd.0 as usize);

        let mut buttons = Vec::with_capacity(TOOLBAR.len());
        for (id, label) in TOOLBAR {
            buttons.push(create_child(hwnd, hinst, w!("BUTTON"), label, WINDOW_STYLE(0), id)?);
        }
        let status = create_child(hwnd, hinst, w!("STATIC"), "", WINDOW_STYLE(SS_CENTERIMAGE.0), ID_STATUS)?;
        let tab = create_child(hwnd, hinst, TAB_CLASS, "", WS_CLIPSIBLINGS | WS_CLIPCHILDREN, ID_TAB)?;
        TAB_HWND.store(tab.0 as isize, SeqCst);

        let mut host = TabHost::new(
            Win32Windows,
            Win32TabView::new(tab, hinst),
            Box::new(TitleMatcher::from_settings(&settings)),
        );
        match NameStore::open(&dir.join(NAMES_DB)) {
            Ok(store) => host = host.with_names(store),
            Err(e) => log::warn!("tab names unavailable: {e}"),
        }
        host.set_own_windows(vec![window_id(hwnd)]);
        host.set_auto_attach(settings.auto_attach);

        let app = App {
            hwnd,
            hinst,
            host,
            poller: Poller::start(WinTimer::new(hwnd, POLL_TIMER), settings.poll_interval()),
            live,
            buttons,
            status,
            rename: None,
            palette: Theme::System.palette(false),
            bg_brush: HBRUSH::default(),
            font: HFONT::default(),
            scale: 1.0,
        };
        APP.with(|cell| *cell.borrow_mut() = Some(app));

        with_app(|a| {
            a.apply_scale();
            a.apply_theme();
            a.layout();
        });
        let _ = ShowWindow(hwnd, SW_SHOW);
        let _ = UpdateWindow(hwnd);
        with_app(|a| a.poll(PollMode::Auto));

        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).into() {
            if intercept(&msg) {
                continue;
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        // WM_CLOSE already detached everything; this covers WM_QUIT from elsewhere.
        if let Some(mut app) = APP.with(|cell| cell.borrow_mut().take()) {
            app.shutdown();
        }
        TAB_HWND.store(0, SeqCst);
        log::info!("=== VBoxTabs EXIT ===");
        CoUninitialize();
    }
    Ok(())
}
