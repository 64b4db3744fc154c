// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! Collects running VirtualBox machine windows into tabs of one host window.
//!
//! Everything except `win32` is platform neutral and runs against the
//! [`window::WindowSystem`] and [`host::TabView`] traits.

pub mod embed;
pub mod error;
pub mod host;
pub mod launcher;
pub mod logging;
pub mod matcher;
pub mod poller;
pub mod scanner;
pub mod settings;
pub mod store;
pub mod tabs;
pub mod theme;
pub mod window;

#[cfg(windows)]
pub mod win32;

#[cfg(test)]
mod testing;

use std::path::PathBuf;

/// Directory of the running executable; settings, log and name store live
/// next to it. Falls back to the working directory.
pub fn app_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    fn sources(dir: &Path, out: &mut Vec<std::path::PathBuf>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                sources(&path, out);
            } else if path.extension().is_some_and(|e| e == "rs") {
                out.push(path);
            }
        }
    }

    #[test]
    fn every_source_file_carries_the_mit_header() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let mut files = vec![root.join("build.rs")];
        sources(&root.join("src"), &mut files);
        assert!(files.len() > 10);
        for file in files {
            let text = fs::read_to_string(&file).unwrap();
            let header: Vec<_> = text.lines().take(8).collect();
            assert_eq!(header[1], "// Copyright (c) 2025  Zalexanninev15", "{}", file.display());
            assert_eq!(header[7], "// SPDX-License-Identifier: MIT", "{}", file.display());
        }
    }
}
