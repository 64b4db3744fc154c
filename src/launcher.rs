// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::LaunchError;

/// Starts the manager executable and forgets about it.
pub fn launch_manager(path: &Path) -> Result<u32, LaunchError> {
    if !path.is_file() {
        return Err(LaunchError::NotFound { path: path.to_path_buf() });
    }
    let child = Command::new(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| LaunchError::Spawn { path: path.to_path_buf(), source })?;
    log::info!("launched {} (pid {})", path.display(), child.id());
    Ok(child.id())
}
