// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

#![windows_subsystem = "windows"]

#[cfg(windows)]
fn main() -> windows::core::Result<()> {
    vboxtabs::win32::run()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("vboxtabs only runs on Windows");
    std::process::exit(1);
}
