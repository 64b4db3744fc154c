// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! Modal settings dialog. Markers and the log level stay file-only.

use std::cell::RefCell;
use std::ffi::c_void;
use std::mem;

use windows::core::*;
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Gdi::{HBRUSH, HFONT, COLOR_BTNFACE};
use windows::Win32::UI::Controls::Dialogs::{
    GetOpenFileNameW, OFN_FILEMUSTEXIST, OFN_NOCHANGEDIR, OFN_PATHMUSTEXIST, OPENFILENAMEW,
};
use windows::Win32::UI::Controls::BST_CHECKED;
use windows::Win32::UI::Input::KeyboardAndMouse::{EnableWindow, SetFocus};
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::settings::{Settings, SettingsForm, DPI_CHOICES};
use crate::theme::Theme;

const CLASS: PCWSTR = w!("VBoxTabsSettings");

// ── Control IDs ─────────────────────────────────────
const ID_INTERVAL: u16 = 400;
const ID_AUTO: u16 = 401;
const ID_PATH: u16 = 402;
const ID_BROWSE: u16 = 403;
const ID_THEME: u16 = 404;
const ID_DPI: u16 = 405;
const ID_FILE: u16 = 406;

/// How the dialog was left.
pub enum Choice {
    /// Validated against the settings the dialog was opened with.
    Save(SettingsForm),
    /// Open `settings.json` for the keys not shown here.
    EditFile,
    Cancel,
}

struct Dialog {
    base: Settings,
    interval: HWND,
    auto: HWND,
    path: HWND,
    theme: HWND,
    dpi: HWND,
    choice: Option<Choice>,
}

thread_local! {
    static DIALOG: RefCell<Option<Dialog>> = const { RefCell::new(None) };
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn window_text(hwnd: HWND) -> String {
    let mut buf = [0u16; 520];
    let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn finish(choice: Choice) {
    DIALOG.with(|d| {
        if let Some(d) = d.borrow_mut().as_mut() {
            d.choice = Some(choice);
        }
    });
}

pub fn register_class(hinst: HINSTANCE) -> Result<()> {
    let wc = WNDCLASSEXW {
        cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
        lpfnWndProc: Some(dialog_proc),
        hInstance: hinst,
        hCursor: unsafe { LoadCursorW(None, IDC_ARROW)? },
        hbrBackground: HBRUSH((COLOR_BTNFACE.0 + 1) as usize as *mut c_void),
        lpszClassName: CLASS,
        ..Default::default()
    };
    if unsafe { RegisterClassExW(&wc) } == 0 {
        return Err(Error::from_win32());
    }
    Ok(())
}

// ── Reading & validating ────────────────────────────
unsafe fn read_form(d: &Dialog) -> SettingsForm {
    let checked = SendMessageW(d.auto, BM_GETCHECK, WPARAM(0), LPARAM(0));
    let pick = |combo: HWND| {
        let sel = SendMessageW(combo, CB_GETCURSEL, WPARAM(0), LPARAM(0));
        usize::try_from(sel.0).ok()
    };
    SettingsForm {
        auto_attach: checked.0 == BST_CHECKED.0 as isize,
        refresh_interval: window_text(d.interval),
        vbox_path: window_text(d.path),
        theme: pick(d.theme).and_then(|i| Theme::ALL.get(i).copied()).unwrap_or_default(),
        dpi_scaling: pick(d.dpi)
            .and_then(|i| DPI_CHOICES.get(i))
            .unwrap_or(&DPI_CHOICES[0])
            .to_string(),
    }
}

unsafe fn accept(hwnd: HWND) {
    let Some((form, checked)) = DIALOG.with(|d| {
        let d = d.borrow();
        let d = d.as_ref()?;
        let form = read_form(d);
        let checked = form.apply(&d.base).map(|_| ());
        Some((form, checked))
    }) else {
        return;
    };
    match checked {
        Ok(()) => finish(Choice::Save(form)),
        Err(e) => {
            let text = wide(&e.to_string());
            let _ = MessageBoxW(hwnd, PCWSTR(text.as_ptr()), w!("Settings"), MB_OK | MB_ICONWARNING);
        }
    }
}

unsafe fn browse(hwnd: HWND) {
    let Some(path) = DIALOG.with(|d| d.borrow().as_ref().map(|d| d.path)) else { return };
    let mut file = [0u16; 520];
    for (dst, src) in file.iter_mut().zip(window_text(path).encode_utf16()).take(519) {
        *dst = src;
    }
    let mut ofn = OPENFILENAMEW {
        lStructSize: mem::size_of::<OPENFILENAMEW>() as u32,
        hwndOwner: hwnd,
        lpstrFilter: w!("Programs (*.exe)\0*.exe\0All files (*.*)\0*.*\0"),
        lpstrFile: PWSTR(file.as_mut_ptr()),
        nMaxFile: file.len() as u32,
        Flags: OFN_FILEMUSTEXIST | OFN_PATHMUSTEXIST | OFN_NOCHANGEDIR,
        ..Default::default()
    };
    if GetOpenFileNameW(&mut ofn).as_bool() {
        let _ = SetWindowTextW(path, PCWSTR(file.as_ptr()));
    }
}

unsafe extern "system" fn dialog_proc(hwnd: HWND, msg: u32, wp: WPARAM, lp: LPARAM) -> LRESULT {
    match msg {
        WM_COMMAND => {
            // IsDialogMessageW turns Enter and Escape into IDOK / IDCANCEL.
            let id = (wp.0 & 0xFFFF) as u16;
            match id {
                ID_BROWSE => browse(hwnd),
                ID_FILE => finish(Choice::EditFile),
                _ if id == IDOK.0 as u16 => accept(hwnd),
                _ if id == IDCANCEL.0 as u16 => finish(Choice::Cancel),
                _ => {}
            }
            LRESULT(0)
        }
        WM_CLOSE => {
            finish(Choice::Cancel);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wp, lp),
    }
}

// ── Construction ────────────────────────────────────
struct Builder {
    dialog: HWND,
    hinst: HINSTANCE,
    font: HFONT,
    scale: f32,
}

impl Builder {
    fn px(&self, v: i32) -> i32 {
        (v as f32 * self.scale).round() as i32
    }

    unsafe fn add(
        &self,
        class: PCWSTR,
        text: &str,
        style: WINDOW_STYLE,
        id: u16,
        (x, y, w, h): (i32, i32, i32, i32),
    ) -> Result<HWND> {
        let text = wide(text);
        let hwnd = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            class,
            PCWSTR(text.as_ptr()),
            WS_CHILD | WS_VISIBLE | style,
            self.px(x),
            self.px(y),
            self.px(w),
            self.px(h),
            self.dialog,
            HMENU(id as usize as *mut c_void),
            self.hinst,
            None,
        )?;
        SendMessageW(hwnd, WM_SETFONT, WPARAM(self.font.0 as usize), LPARAM(1));
        Ok(hwnd)
    }

    unsafe fn label(&self, text: &str, y: i32) -> Result<HWND> {
        self.add(w!("STATIC"), text, WINDOW_STYLE(0), 0, (16, y + 3, 150, 20))
    }

    unsafe fn combo<'a>(
        &self,
        id: u16,
        y: i32,
        items: impl IntoIterator<Item = &'a str>,
        selected: usize,
    ) -> Result<HWND> {
        let style = WS_TABSTOP | WS_VSCROLL | WINDOW_STYLE(CBS_DROPDOWNLIST as u32);
        let combo = self.add(w!("COMBOBOX"), "", style, id, (176, y, 130, 200))?;
        for item in items {
            let text = wide(item);
            SendMessageW(combo, CB_ADDSTRING, WPARAM(0), LPARAM(text.as_ptr() as isize));
        }
        SendMessageW(combo, CB_SETCURSEL, WPARAM(selected), LPARAM(0));
        Ok(combo)
    }
}

unsafe fn build(b: &Builder, base: &Settings) -> Result<Dialog> {
    let edit = WS_TABSTOP | WS_BORDER | WINDOW_STYLE(ES_AUTOHSCROLL as u32);
    let button = WS_TABSTOP | WINDOW_STYLE(BS_PUSHBUTTON as u32);

    b.label("Refresh interval (s)", 16)?;
    let interval = b.add(
        w!("EDIT"),
        &base.refresh_interval.to_string(),
        edit | WINDOW_STYLE(ES_NUMBER as u32),
        ID_INTERVAL,
        (176, 16, 60, 22),
    )?;
    let auto = b.add(
        w!("BUTTON"),
        "Attach new VM windows automatically",
        WS_TABSTOP | WINDOW_STYLE(BS_AUTOCHECKBOX as u32),
        ID_AUTO,
        (16, 48, 380, 22),
    )?;
    if base.auto_attach {
        SendMessageW(auto, BM_SETCHECK, WPARAM(BST_CHECKED.0 as usize), LPARAM(0));
    }

    b.label("VirtualBox Manager", 80)?;
    let path = b.add(
        w!("EDIT"),
        &base.vbox_path.display().to_string(),
        edit,
        ID_PATH,
        (16, 104, 300, 22),
    )?;
    b.add(w!("BUTTON"), "Browse…", button, ID_BROWSE, (324, 103, 80, 24))?;

    b.label("Theme", 140)?;
    let theme_index = Theme::ALL.iter().position(|t| *t == base.theme).unwrap_or(0);
    let theme = b.combo(ID_THEME, 140, Theme::ALL.iter().map(|t| t.name()), theme_index)?;

    b.label("DPI scaling", 172)?;
    let dpi_index = DPI_CHOICES
        .iter()
        .position(|c| c.eq_ignore_ascii_case(base.dpi_scaling.trim()))
        .unwrap_or(0);
    let dpi = b.combo(ID_DPI, 172, DPI_CHOICES, dpi_index)?;

    b.add(w!("BUTTON"), "Edit file…", button, ID_FILE, (16, 216, 100, 26))?;
    b.add(
        w!("BUTTON"),
        "OK",
        WS_TABSTOP | WINDOW_STYLE(BS_DEFPUSHBUTTON as u32),
        IDOK.0 as u16,
        (216, 216, 90, 26),
    )?;
    b.add(w!("BUTTON"), "Cancel", button, IDCANCEL.0 as u16, (314, 216, 90, 26))?;

    let _ = SetFocus(interval);
    Ok(Dialog { base: base.clone(), interval, auto, path, theme, dpi, choice: None })
}

/// Shows the dialog over `owner` and blocks until it is closed. The owner
/// keeps receiving messages (poll timer included) while it is open.
pub unsafe fn run(owner: HWND, hinst: HINSTANCE, font: HFONT, scale: f32, base: &Settings) -> Choice {
    let (w, h) = ((436.0 * scale) as i32, (296.0 * scale) as i32);
    let mut rc = RECT::default();
    let _ = GetWindowRect(owner, &mut rc);
    let (x, y) = (rc.left + (rc.right - rc.left - w) / 2, rc.top + (rc.bottom - rc.top - h) / 2);

    let dialog = match CreateWindowExW(
        WS_EX_DLGMODALFRAME,
        CLASS,
        w!("VBoxTabs Settings"),
        WS_POPUP | WS_CAPTION | WS_SYSMENU,
        x,
        y,
        w,
        h,
        owner,
        HMENU::default(),
        hinst,
        None,
    ) {
        Ok(h) => h,
        Err(e) => {
            log::warn!("settings dialog: {e}");
            return Choice::Cancel;
        }
    };
    let builder = Builder { dialog, hinst, font, scale };
    match build(&builder, base) {
        Ok(state) => DIALOG.with(|d| *d.borrow_mut() = Some(state)),
        Err(e) => {
            log::warn!("settings dialog: {e}");
            let _ = DestroyWindow(dialog);
            return Choice::Cancel;
        }
    }

    let _ = EnableWindow(owner, FALSE);
    let _ = ShowWindow(dialog, SW_SHOW);
    let mut msg = MSG::default();
    while DIALOG.with(|d| d.borrow().as_ref().is_some_and(|d| d.choice.is_none())) {
        if !GetMessageW(&mut msg, None, 0, 0).as_bool() {
            // Hand WM_QUIT back to the main loop.
            PostQuitMessage(msg.wParam.0 as i32);
            break;
        }
        if IsDialogMessageW(dialog, &msg).as_bool() {
            continue;
        }
        let _ = TranslateMessage(&msg);
        DispatchMessageW(&msg);
    }
    let _ = EnableWindow(owner, TRUE);
    let _ = DestroyWindow(dialog);
    let _ = SetForegroundWindow(owner);

    DIALOG
        .with(|d| d.borrow_mut().take())
        .and_then(|d| d.choice)
        .unwrap_or(Choice::Cancel)
}
