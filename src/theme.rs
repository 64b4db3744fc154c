// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// Host window color scheme. Unknown names in the settings file (older
/// theme names included) read as `System`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

// ── Farben (COLORREF = 0x00BBGGRR) ─────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: u32,
    pub page: u32,
    pub text: u32,
    pub dark_frame: bool,
}

const LIGHT: Palette = Palette {
    background: 0x00F3F3F3,
    page: 0x00FFFFFF,
    text: 0x00202020,
    dark_frame: false,
};

const DARK: Palette = Palette {
    background: 0x00282320,
    page: 0x001E1A18,
    text: 0x00E0E0E0,
    dark_frame: true,
};

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::System, Theme::Light, Theme::Dark];

    pub fn name(self) -> &'static str {
        match self {
            Theme::System => "System",
            Theme::Light => "Light",
            Theme::Dark => "Dark",
        }
    }

    /// `system_dark` is the OS app-mode preference, only consulted for `System`.
    pub fn palette(self, system_dark: bool) -> Palette {
        match self {
            Theme::Light => LIGHT,
            Theme::Dark => DARK,
            Theme::System if system_dark => DARK,
            Theme::System => LIGHT,
        }
    }
}

impl From<String> for Theme {
    fn from(name: String) -> Self {
        Theme::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }
}

impl From<Theme> for &'static str {
    fn from(theme: Theme) -> Self {
        theme.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_and_unknown_falls_back() {
        for t in Theme::ALL {
            assert_eq!(Theme::from(t.name().to_string()), t);
        }
        assert_eq!(Theme::from("dark".to_string()), Theme::Dark);
        assert_eq!(Theme::from("Catppuccin Mocha".to_string()), Theme::System);
    }

    #[test]
    fn system_follows_os_preference() {
        assert!(Theme::System.palette(true).dark_frame);
        assert!(!Theme::System.palette(false).dark_frame);
        assert_eq!(Theme::Dark.palette(false), DARK);
    }

    #[test]
    fn serializes_as_plain_name() {
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"Dark\"");
        let t: Theme = serde_json::from_str("\"Fusion\"").unwrap();
        assert_eq!(t, Theme::System);
    }
}
