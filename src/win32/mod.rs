// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! Raw Win32 front end: host window, tab strip and the OS window system.

mod app;
mod dialog;
pub mod sys;
pub mod view;

pub use app::run;
