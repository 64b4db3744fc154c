// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

use std::collections::HashSet;

use crate::matcher::{TargetKind, TargetPredicate};
use crate::window::{WindowId, WindowSystem};

/// A top-level window that looks like an embeddable target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: WindowId,
    pub title: String,
    pub kind: TargetKind,
}

impl Candidate {
    pub fn name(&self) -> &str {
        self.kind.name()
    }
}

/// One fresh snapshot of target windows. `exclude` holds the host's own
/// windows. Windows that vanish mid-scan are skipped.
pub fn scan(
    sys: &dyn WindowSystem,
    predicate: &dyn TargetPredicate,
    exclude: &[WindowId],
) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for id in sys.top_level_windows() {
        if exclude.contains(&id) || !seen.insert(id) {
            continue;
        }
        if !sys.is_visible(id) {
            continue;
        }
        let Some(title) = sys.title(id) else {
            continue;
        };
        if let Some(kind) = predicate.classify(&title) {
            found.push(Candidate { id, title, kind });
        }
    }
    log::debug!("scan: {} target(s)", found.len());
    found
}
