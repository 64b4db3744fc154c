// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! The tab host: owns the tab records and maps user actions onto the
//! embedding controller.

use std::collections::HashSet;
use std::time::Duration;

use crate::embed;
use crate::error::{EmbedError, HostError, OsError};
use crate::matcher::{truncate_title, TargetPredicate, TitleMatcher};
use crate::scanner::{self, Candidate};
use crate::settings::{Settings, SettingsDelta};
use crate::store::NameStore;
use crate::tabs::{TabRecord, TabSet, MAX_TAB_TITLE};
use crate::window::{WindowId, WindowSystem};

/// How long force-close waits for the VM process to go away.
pub const FORCE_CLOSE_WAIT: Duration = Duration::from_millis(1500);

/// The visual side of the tab host. Page `i` is the container surface of
/// tab record `i`.
pub trait TabView {
    /// Appends a tab with a fresh container surface.
    fn add_page(&mut self, caption: &str) -> Result<WindowId, OsError>;
    /// Removes tab `index` and destroys its surface.
    fn remove_page(&mut self, index: usize);
    fn set_caption(&mut self, index: usize, caption: &str);
    fn move_page(&mut self, from: usize, to: usize);
    fn current(&self) -> Option<usize>;
    fn select(&mut self, index: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Timer tick or refresh button: honors auto-attach and manual detaches.
    Auto,
    /// Attach-all: attaches every match and forgets manual detaches.
    Manual,
}

#[derive(Debug, Default)]
pub struct Reconciled {
    pub attached: Vec<WindowId>,
    pub dropped: Vec<WindowId>,
    pub failures: Vec<(String, HostError)>,
}

impl Reconciled {
    pub fn is_quiet(&self) -> bool {
        self.attached.is_empty() && self.dropped.is_empty() && self.failures.is_empty()
    }
}

#[derive(Debug)]
pub enum CloseOutcome {
    /// The owning process was killed.
    Terminated,
    /// Killing failed; the window was handed back as a top-level window.
    Detached(OsError),
}

#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub detached: usize,
    pub failed: Vec<(String, EmbedError)>,
}

pub struct TabHost<S: WindowSystem, V: TabView> {
    sys: S,
    view: V,
    predicate: Box<dyn TargetPredicate>,
    tabs: TabSet,
    suppressed: HashSet<WindowId>,
    auto_attach: bool,
    own_windows: Vec<WindowId>,
    names: Option<NameStore>,
}

impl<S: WindowSystem, V: TabView> TabHost<S, V> {
    pub fn new(sys: S, view: V, predicate: Box<dyn TargetPredicate>) -> Self {
        Self {
            sys,
            view,
            predicate,
            tabs: TabSet::new(),
            suppressed: HashSet::new(),
            auto_attach: true,
            own_windows: Vec::new(),
            names: None,
        }
    }

    pub fn with_names(mut self, names: NameStore) -> Self {
        self.names = Some(names);
        self
    }

    /// Windows of this application, never treated as targets.
    pub fn set_own_windows(&mut self, own: Vec<WindowId>) {
        self.own_windows = own;
    }

    pub fn set_predicate(&mut self, predicate: Box<dyn TargetPredicate>) {
        self.predicate = predicate;
    }

    pub fn set_auto_attach(&mut self, on: bool) {
        self.auto_attach = on;
    }

    /// Applies the parts of `settings` flagged in `delta` that the host owns.
    pub fn apply_settings(&mut self, settings: &Settings, delta: SettingsDelta) {
        if delta.matcher {
            self.set_predicate(Box::new(TitleMatcher::from_settings(settings)));
        }
        if delta.auto_attach {
            self.set_auto_attach(settings.auto_attach);
        }
    }

    pub fn tabs(&self) -> &TabSet {
        &self.tabs
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn sys(&self) -> &S {
        &self.sys
    }

    pub fn is_suppressed(&self, window: WindowId) -> bool {
        self.suppressed.contains(&window)
    }

    pub fn current(&self) -> Option<usize> {
        self.view.current().filter(|&i| i < self.tabs.len())
    }

    /// One reconciliation pass: drop records whose window died, then attach
    /// targets that have no tab yet.
    pub fn reconcile(&mut self, mode: PollMode) -> Reconciled {
        let mut out = Reconciled::default();
        let scanned = scanner::scan(&self.sys, self.predicate.as_ref(), &self.own_windows);
        let live: HashSet<WindowId> = scanned.iter().map(|c| c.id).collect();

        // Embedded windows are children now and never show up in a
        // top-level scan; check their handles directly.
        let stale: Vec<WindowId> = self
            .tabs
            .iter()
            .map(TabRecord::window)
            .filter(|w| !live.contains(w) && !self.sys.is_window(*w))
            .collect();
        for window in stale {
            self.drop_stale(window);
            out.dropped.push(window);
        }

        let sys = &self.sys;
        self.suppressed
            .retain(|w| live.contains(w) || sys.is_window(*w));
        if mode == PollMode::Manual {
            self.suppressed.clear();
        }

        if mode == PollMode::Manual || self.auto_attach {
            for candidate in scanned {
                if self.tabs.contains(candidate.id) || self.suppressed.contains(&candidate.id) {
                    continue;
                }
                match self.attach_candidate(&candidate) {
                    Ok(_) => out.attached.push(candidate.id),
                    Err(HostError::Embed(e)) if e.is_transient() => {
                        log::debug!("poll: {} vanished before attach", candidate.id);
                    }
                    Err(e) => {
                        log::warn!("poll: {} ({}): {}", candidate.name(), candidate.id, e);
                        out.failures.push((candidate.name().to_string(), e));
                    }
                }
            }
        }

        if !out.is_quiet() {
            log::info!(
                "poll: +{} -{} !{} ({} tabs)",
                out.attached.len(),
                out.dropped.len(),
                out.failures.len(),
                self.tabs.len()
            );
        }
        out
    }

    fn drop_stale(&mut self, window: WindowId) {
        let Some(index) = self.tabs.position(window) else {
            return;
        };
        if let Some(mut record) = self.tabs.remove(index) {
            record.embedding.abandon();
            log::info!("tab '{}' ({}) closed by its owner", record.name, window);
        }
        self.view.remove_page(index);
    }

    fn attach_candidate(&mut self, candidate: &Candidate) -> Result<usize, HostError> {
        let caption = self
            .remembered_name(candidate.name())
            .unwrap_or_else(|| truncate_title(candidate.name(), MAX_TAB_TITLE));
        let surface = self
            .view
            .add_page(&caption)
            .map_err(|source| HostError::Surface { source })?;
        let page = self.tabs.len();

        let embedding = match embed::attach(&self.sys, candidate.id, surface) {
            Ok(embedding) => embedding,
            Err(e) => {
                self.view.remove_page(page);
                return Err(e.into());
            }
        };
        let record = TabRecord {
            name: caption,
            title: candidate.title.clone(),
            kind: candidate.kind.clone(),
            embedding,
        };
        match self.tabs.push(record) {
            Ok(index) => Ok(index),
            Err(mut record) => {
                let _ = embed::detach(&self.sys, &mut record.embedding);
                self.view.remove_page(page);
                Err(EmbedError::AlreadyAttached.into())
            }
        }
    }

    fn remembered_name(&self, vm_name: &str) -> Option<String> {
        let store = self.names.as_ref()?;
        match store.get(vm_name) {
            Ok(name) => name,
            Err(e) => {
                log::warn!("names: {e}");
                None
            }
        }
    }

    /// Hands the window at `index` back to the desktop and closes its tab.
    /// The window is not re-attached by automatic polls afterwards.
    pub fn detach_at(&mut self, index: usize) -> Result<TabRecord, HostError> {
        let record = self
            .tabs
            .get_mut(index)
            .ok_or(HostError::NoTab { index })?;
        embed::detach(&self.sys, &mut record.embedding)?;
        let record = self.tabs.remove(index).ok_or(HostError::NoTab { index })?;
        self.view.remove_page(index);
        self.suppressed.insert(record.window());
        Ok(record)
    }

    pub fn detach_current(&mut self) -> Result<Option<TabRecord>, HostError> {
        match self.current() {
            Some(index) => self.detach_at(index).map(Some),
            None => Ok(None),
        }
    }

    pub fn rename_at(&mut self, index: usize, name: &str) -> Result<(), HostError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(HostError::InvalidName);
        }
        let record = self
            .tabs
            .get_mut(index)
            .ok_or(HostError::NoTab { index })?;
        record.name = name.to_string();
        self.view.set_caption(index, name);
        if let Some(store) = &self.names {
            // Renaming back to the machine name drops the remembered entry.
            let saved = if name == record.vm_name() {
                store.forget(record.vm_name())
            } else {
                store.set(record.vm_name(), name)
            };
            if let Err(e) = saved {
                log::warn!("names: {e}");
            }
        }
        Ok(())
    }

    pub fn rename_current(&mut self, name: &str) -> Result<(), HostError> {
        let index = self.current().ok_or(HostError::NoTab { index: 0 })?;
        self.rename_at(index, name)
    }

    /// Kills the VM process behind tab `index` and removes the tab. No style
    /// or parent restoration happens on this path.
    pub fn force_close_at(&mut self, index: usize) -> Result<CloseOutcome, HostError> {
        let window = self
            .tabs
            .get(index)
            .map(TabRecord::window)
            .ok_or(HostError::NoTab { index })?;
        let result = self
            .sys
            .terminate_owners(&[window], FORCE_CLOSE_WAIT)
            .pop()
            .unwrap_or(Err(OsError::Gone));
        let outcome = self.settle_kill(index, result)?;
        self.remove_closed(window);
        Ok(outcome)
    }

    pub fn force_close_current(&mut self) -> Result<Option<CloseOutcome>, HostError> {
        match self.current() {
            Some(index) => self.force_close_at(index).map(Some),
            None => Ok(None),
        }
    }

    /// Force-closes every tab; returns how many processes were killed. All
    /// processes are killed before the single wait for them to exit.
    pub fn close_all(&mut self) -> usize {
        let windows = self.tabs.windows();
        let results = self.sys.terminate_owners(&windows, FORCE_CLOSE_WAIT);
        let mut killed = 0;
        for (index, (window, result)) in windows.iter().zip(results).enumerate().rev() {
            match self.settle_kill(index, result) {
                Ok(CloseOutcome::Terminated) => killed += 1,
                Ok(CloseOutcome::Detached(_)) => {}
                Err(e) => {
                    log::warn!("close all: tab {index}: {e}");
                    continue;
                }
            }
            self.remove_closed(*window);
        }
        killed
    }

    // A failed kill falls back to a detach so the window is not lost.
    fn settle_kill(
        &mut self,
        index: usize,
        result: Result<(), OsError>,
    ) -> Result<CloseOutcome, HostError> {
        match result {
            Ok(()) | Err(OsError::Gone) => Ok(CloseOutcome::Terminated),
            Err(e) => {
                let record = self.tabs.get_mut(index).ok_or(HostError::NoTab { index })?;
                log::warn!("force close {}: {}; detaching instead", record.window(), e);
                embed::detach(&self.sys, &mut record.embedding)?;
                Ok(CloseOutcome::Detached(e))
            }
        }
    }

    fn remove_closed(&mut self, window: WindowId) {
        let Some(index) = self.tabs.position(window) else {
            return;
        };
        if let Some(mut record) = self.tabs.remove(index) {
            if record.embedding.is_active() && self.sys.is_window(window) {
                // Still shutting down; unhook it before its surface goes.
                let _ = self.sys.set_parent(window, None);
            }
            record.embedding.abandon();
            log::info!("force closed '{}' ({})", record.name, window);
        }
        self.view.remove_page(index);
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Option<usize> {
        let to = self.tabs.reorder(from, to)?;
        self.view.move_page(from, to);
        self.view.select(to);
        Some(to)
    }

    pub fn select(&mut self, index: usize) {
        if index < self.tabs.len() {
            self.view.select(index);
        }
    }

    /// Context-menu target: the clicked tab. Without the modifier the clicked
    /// tab also becomes current; with it, focus stays where it was.
    pub fn context_target(&mut self, clicked: usize, modifier_held: bool) -> Option<usize> {
        if clicked >= self.tabs.len() {
            return None;
        }
        if !modifier_held {
            self.view.select(clicked);
        }
        Some(clicked)
    }

    /// Refits every embedded window to its surface.
    pub fn resize(&mut self) {
        for record in self.tabs.iter().filter(|r| r.embedding.is_active()) {
            if let Err(e) = embed::fit(&self.sys, record.window(), record.surface()) {
                log::debug!("fit {}: {}", record.window(), e);
            }
        }
    }

    /// Detaches every tab exactly once. Safe to call more than once.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        let records = self.tabs.drain();
        let pages = records.len();
        for mut record in records.into_iter().rev() {
            match embed::detach(&self.sys, &mut record.embedding) {
                Ok(()) => report.detached += 1,
                Err(e) => {
                    log::error!("shutdown: '{}' ({}): {}", record.name, record.window(), e);
                    embed::release(&self.sys, &mut record.embedding);
                    report.failed.push((record.name.clone(), e));
                }
            }
        }
        for index in (0..pages).rev() {
            self.view.remove_page(index);
        }
        if pages > 0 {
            log::info!("shutdown: {} detached, {} failed", report.detached, report.failed.len());
        }
        report
    }
}
