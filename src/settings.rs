// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! `settings.json` next to the executable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::logging;
use crate::theme::Theme;

pub const SETTINGS_FILE: &str = "settings.json";
pub const MIN_INTERVAL_SECS: u64 = 1;
pub const MAX_INTERVAL_SECS: u64 = 60;
/// Scaling choices offered by the settings dialog.
pub const DPI_CHOICES: [&str; 6] = ["Auto", "100%", "125%", "150%", "175%", "200%"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub auto_attach: bool,
    /// Seconds between liveness polls.
    pub refresh_interval: u64,
    pub vbox_path: PathBuf,
    pub theme: Theme,
    /// `"Auto"` or a percentage such as `"125%"`.
    pub dpi_scaling: String,
    pub running_markers: Vec<String>,
    pub product_marker: Option<String>,
    pub manager_markers: Vec<String>,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_attach: true,
            refresh_interval: 5,
            vbox_path: PathBuf::from(r"C:\Program Files\Oracle\VirtualBox\VirtualBox.exe"),
            theme: Theme::default(),
            dpi_scaling: "Auto".into(),
            running_markers: vec!["[Running]".into(), "[Работает]".into()],
            product_marker: None,
            manager_markers: vec![
                "Oracle VirtualBox Manager".into(),
                "Oracle VirtualBox Менеджер".into(),
            ],
            log_level: "info".into(),
        }
    }
}

impl Settings {
    /// Reads `path`, filling absent keys with defaults. A missing file yields
    /// the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`Settings::load`], but any failure falls back to the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("settings: {e}; using defaults");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.refresh_interval
                .clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS),
        )
    }

    /// Explicit scale factor, `None` for automatic (per-monitor DPI).
    pub fn scale_factor(&self) -> Option<f32> {
        let raw = self.dpi_scaling.trim();
        if raw.eq_ignore_ascii_case("auto") {
            return None;
        }
        raw.trim_end_matches('%')
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|p| (50.0..=400.0).contains(p))
            .map(|p| p / 100.0)
    }

    pub fn log_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

/// Detects edits to the settings file between polls.
#[derive(Debug)]
pub struct SettingsWatcher {
    path: PathBuf,
    seen: Option<SystemTime>,
}

impl SettingsWatcher {
    pub fn new(path: PathBuf) -> Self {
        let seen = modified(&path);
        Self { path, seen }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once per modification of the file.
    pub fn changed(&mut self) -> bool {
        let now = modified(&self.path);
        if now != self.seen {
            self.seen = now;
            return now.is_some();
        }
        false
    }

    /// Records the current state as seen, e.g. after writing the file ourselves.
    pub fn mark_seen(&mut self) {
        self.seen = modified(&self.path);
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Which live-applicable settings differ between two snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsDelta {
    pub interval: bool,
    pub theme: bool,
    pub matcher: bool,
    pub auto_attach: bool,
    pub restart_required: bool,
}

impl SettingsDelta {
    pub fn between(old: &Settings, new: &Settings) -> Self {
        Self {
            interval: old.poll_interval() != new.poll_interval(),
            theme: old.theme != new.theme,
            matcher: old.running_markers != new.running_markers
                || old.product_marker != new.product_marker
                || old.manager_markers != new.manager_markers,
            auto_attach: old.auto_attach != new.auto_attach,
            restart_required: old.dpi_scaling != new.dpi_scaling,
        }
    }
}

/// The settings in effect plus the file they come from. Edits reach it two
/// ways: the file changes on disk, or the dialog submits new values.
#[derive(Debug)]
pub struct LiveSettings {
    current: Settings,
    watcher: SettingsWatcher,
    pending: Option<Settings>,
}

impl LiveSettings {
    pub fn load(path: PathBuf) -> Self {
        let current = Settings::load_or_default(&path);
        Self { current, watcher: SettingsWatcher::new(path), pending: None }
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    pub fn path(&self) -> &Path {
        self.watcher.path()
    }

    /// Writes the current values out when the file does not exist yet.
    pub fn ensure_file(&mut self) -> Result<(), SettingsError> {
        if !self.path().exists() {
            self.current.save(self.watcher.path())?;
            self.watcher.mark_seen();
        }
        Ok(())
    }

    /// Saves `fresh`; it takes effect on the next [`LiveSettings::reload`].
    pub fn submit(&mut self, fresh: Settings) -> Result<(), SettingsError> {
        fresh.save(self.watcher.path())?;
        self.watcher.mark_seen();
        self.pending = Some(fresh);
        Ok(())
    }

    /// Swaps in submitted or edited settings. `None` when nothing changed or
    /// the edited file does not parse (the old values stay).
    pub fn reload(&mut self) -> Option<SettingsDelta> {
        let fresh = match self.pending.take() {
            Some(fresh) => fresh,
            None if self.watcher.changed() => match Settings::load(self.watcher.path()) {
                Ok(fresh) => fresh,
                Err(e) => {
                    log::warn!("settings reload: {e}");
                    return None;
                }
            },
            None => return None,
        };
        let delta = SettingsDelta::between(&self.current, &fresh);
        logging::set_level(fresh.log_filter());
        self.current = fresh;
        log::info!("settings reloaded: {:?}", delta);
        Some(delta)
    }
}

/// Field values as entered in the settings dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    pub auto_attach: bool,
    pub refresh_interval: String,
    pub vbox_path: String,
    pub theme: Theme,
    pub dpi_scaling: String,
}

impl SettingsForm {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            auto_attach: s.auto_attach,
            refresh_interval: s.refresh_interval.to_string(),
            vbox_path: s.vbox_path.display().to_string(),
            theme: s.theme,
            dpi_scaling: s.dpi_scaling.clone(),
        }
    }

    /// `base` with the form applied. Fields the form does not show (markers,
    /// log level) are kept.
    pub fn apply(&self, base: &Settings) -> Result<Settings, SettingsError> {
        let interval = self.refresh_interval.trim();
        let refresh_interval = interval
            .parse::<u64>()
            .ok()
            .filter(|n| (MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(n))
            .ok_or_else(|| SettingsError::Invalid {
                field: "refresh interval",
                value: interval.to_string(),
            })?;
        let path = self.vbox_path.trim();
        if path.is_empty() {
            return Err(SettingsError::Invalid { field: "VirtualBox path", value: String::new() });
        }
        let dpi = self.dpi_scaling.trim();
        if !DPI_CHOICES.iter().any(|c| c.eq_ignore_ascii_case(dpi)) {
            return Err(SettingsError::Invalid { field: "DPI scaling", value: dpi.to_string() });
        }
        Ok(Settings {
            auto_attach: self.auto_attach,
            refresh_interval,
            vbox_path: PathBuf::from(path),
            theme: self.theme,
            dpi_scaling: dpi.to_string(),
            ..base.clone()
        })
    }
}
