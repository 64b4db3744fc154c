// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! Title classification: which top-level windows are embeddable targets.

use crate::settings::Settings;

pub const MANAGER_NAME: &str = "VB Manager";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    /// A running VM window; `name` is the machine name from the title.
    Machine { name: String },
    /// The product's manager window.
    Manager,
}

impl TargetKind {
    pub fn name(&self) -> &str {
        match self {
            TargetKind::Machine { name } => name,
            TargetKind::Manager => MANAGER_NAME,
        }
    }
}

/// Decides whether a window title belongs to an embeddable target.
pub trait TargetPredicate {
    fn classify(&self, title: &str) -> Option<TargetKind>;

    fn is_target(&self, title: &str) -> bool {
        self.classify(title).is_some()
    }
}

impl<F> TargetPredicate for F
where
    F: Fn(&str) -> Option<TargetKind>,
{
    fn classify(&self, title: &str) -> Option<TargetKind> {
        self(title)
    }
}

/// Substring matcher driven entirely by marker lists from the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMatcher {
    running: Vec<String>,
    product: Option<String>,
    manager: Vec<String>,
}

impl TitleMatcher {
    pub fn new(running: Vec<String>, product: Option<String>, manager: Vec<String>) -> Self {
        let clean = |v: Vec<String>| v.into_iter().filter(|m| !m.trim().is_empty()).collect();
        Self {
            running: clean(running),
            product: product.filter(|p| !p.trim().is_empty()),
            manager: clean(manager),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.running_markers.clone(),
            settings.product_marker.clone(),
            settings.manager_markers.clone(),
        )
    }

    fn has_product(&self, title: &str) -> bool {
        self.product.as_deref().map_or(true, |p| title.contains(p))
    }
}

impl TargetPredicate for TitleMatcher {
    fn classify(&self, title: &str) -> Option<TargetKind> {
        if title.trim().is_empty() {
            return None;
        }
        if let Some(marker) = self.running.iter().find(|m| title.contains(m.as_str())) {
            if !self.has_product(title) {
                return None;
            }
            return Some(TargetKind::Machine {
                name: machine_name(title, marker),
            });
        }
        if self.manager.iter().any(|m| title.contains(m.as_str())) {
            return Some(TargetKind::Manager);
        }
        None
    }
}

// "Ubuntu [Running] - Oracle VirtualBox" → "Ubuntu"
fn machine_name(title: &str, marker: &str) -> String {
    let head = title.split(marker).next().unwrap_or(title).trim();
    if head.is_empty() {
        title.trim().to_string()
    } else {
        head.to_string()
    }
}

/// Default tab caption: the name, cut to `max` characters with an ellipsis.
pub fn truncate_title(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    let mut out: String = name.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
