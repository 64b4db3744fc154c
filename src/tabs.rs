// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! Ordered tab records, one per embedded window.

use crate::embed::Embedding;
use crate::matcher::TargetKind;
use crate::window::WindowId;

/// Longest default tab caption, in characters.
pub const MAX_TAB_TITLE: usize = 32;

/// One embedded window and its tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabRecord {
    /// User-visible tab caption.
    pub name: String,
    /// Window title at scan time.
    pub title: String,
    pub kind: TargetKind,
    pub embedding: Embedding,
}

impl TabRecord {
    pub fn window(&self) -> WindowId {
        self.embedding.window
    }

    pub fn surface(&self) -> WindowId {
        self.embedding.surface
    }

    /// Key for remembered names: the machine name, not the caption.
    pub fn vm_name(&self) -> &str {
        self.kind.name()
    }
}

/// Ordered tab records; position equals tab index. At most one record per
/// window handle.
#[derive(Debug, Default)]
pub struct TabSet {
    records: Vec<TabRecord>,
}

impl TabSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, window: WindowId) -> bool {
        self.position(window).is_some()
    }

    pub fn position(&self, window: WindowId) -> Option<usize> {
        self.records.iter().position(|r| r.window() == window)
    }

    pub fn get(&self, index: usize) -> Option<&TabRecord> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TabRecord> {
        self.records.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TabRecord> {
        self.records.iter()
    }

    /// Embedded windows in tab order.
    pub fn windows(&self) -> Vec<WindowId> {
        self.records.iter().map(TabRecord::window).collect()
    }

    /// Appends `record`, handing it back if its window already has a tab.
    pub fn push(&mut self, record: TabRecord) -> Result<usize, TabRecord> {
        if self.contains(record.window()) {
            return Err(record);
        }
        self.records.push(record);
        Ok(self.records.len() - 1)
    }

    pub fn remove(&mut self, index: usize) -> Option<TabRecord> {
        (index < self.records.len()).then(|| self.records.remove(index))
    }

    /// Moves the record at `from` to `to` (clamped to the last index).
    pub fn reorder(&mut self, from: usize, to: usize) -> Option<usize> {
        if from >= self.records.len() {
            return None;
        }
        let to = to.min(self.records.len() - 1);
        let record = self.records.remove(from);
        self.records.insert(to, record);
        Some(to)
    }

    pub fn drain(&mut self) -> Vec<TabRecord> {
        std::mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeWindows;
    use crate::window::Rect;

    fn record(sys: &FakeWindows, name: &str) -> TabRecord {
        let window = sys.add_top_level(&format!("{name} [Running]"));
        let surface = sys.add_surface(Rect::sized(10, 10));
        let embedding = crate::embed::attach(sys, window, surface).unwrap();
        TabRecord {
            name: name.into(),
            title: format!("{name} [Running]"),
            kind: TargetKind::Machine { name: name.into() },
            embedding,
        }
    }

    #[test]
    fn one_record_per_window() {
        let sys = FakeWindows::new();
        let mut set = TabSet::new();
        let a = record(&sys, "a");
        let mut dup = a.clone();
        dup.name = "copy".into();
        assert_eq!(set.push(a), Ok(0));
        assert!(set.push(dup).is_err());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn reorder_moves_and_clamps() {
        let sys = FakeWindows::new();
        let mut set = TabSet::new();
        for n in ["a", "b", "c"] {
            set.push(record(&sys, n)).unwrap();
        }
        assert_eq!(set.reorder(0, 9), Some(2));
        let names: Vec<_> = set.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["b", "c", "a"]);
        assert_eq!(set.reorder(5, 0), None);
    }

    #[test]
    fn remove_out_of_range_is_none() {
        let mut set = TabSet::new();
        assert!(set.remove(0).is_none());
        assert!(set.drain().is_empty());
    }
}
