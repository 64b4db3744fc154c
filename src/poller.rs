// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! Liveness poll: a timer that drives one reconciliation cycle per tick.

use std::time::Duration;

use crate::host::{PollMode, Reconciled, TabHost, TabView};
use crate::settings::{LiveSettings, SettingsDelta};
use crate::window::WindowSystem;

/// Periodic tick source. On Windows this is `SetTimer` on the host window.
pub trait Timer {
    /// (Re)starts the timer; replaces any previous interval.
    fn arm(&mut self, interval: Duration);
    fn disarm(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Reconciling,
}

/// Lets a running cycle ask for a new interval; applied once the cycle ends.
#[derive(Debug, Default)]
pub struct IntervalRequest {
    next: Option<Duration>,
}

impl IntervalRequest {
    pub fn request(&mut self, interval: Duration) {
        self.next = Some(interval);
    }
}

/// What one poll cycle did.
#[derive(Debug)]
pub struct Cycle {
    pub reconciled: Reconciled,
    /// Set when the settings changed before this cycle.
    pub settings: Option<SettingsDelta>,
}

pub struct Poller<T: Timer> {
    timer: T,
    state: PollState,
    interval: Duration,
    cycles: u64,
}

impl<T: Timer> Poller<T> {
    /// Arms `timer` right away.
    pub fn start(mut timer: T, interval: Duration) -> Self {
        timer.arm(interval);
        log::info!("poller: every {:?}", interval);
        Self { timer, state: PollState::Idle, interval, cycles: 0 }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Runs one cycle. A tick arriving while a cycle is still running (a
    /// modal loop dispatching `WM_TIMER`) is dropped and yields `None`.
    pub fn fire<R>(&mut self, cycle: impl FnOnce(&mut IntervalRequest) -> R) -> Option<R> {
        if self.state == PollState::Reconciling {
            log::debug!("poller: tick during reconciliation skipped");
            return None;
        }
        self.state = PollState::Reconciling;
        let mut request = IntervalRequest::default();
        let out = cycle(&mut request);
        self.state = PollState::Idle;
        self.cycles += 1;
        if let Some(next) = request.next {
            self.set_interval(next);
        }
        Some(out)
    }

    /// One poll: applies changed settings first, then reconciles under them.
    /// A new interval takes effect once the cycle is over.
    pub fn poll<S: WindowSystem, V: TabView>(
        &mut self,
        host: &mut TabHost<S, V>,
        live: &mut LiveSettings,
        mode: PollMode,
    ) -> Option<Cycle> {
        self.fire(|req| {
            let settings = live.reload();
            if let Some(delta) = settings {
                host.apply_settings(live.get(), delta);
                if delta.interval {
                    req.request(live.get().poll_interval());
                }
            }
            Cycle { reconciled: host.reconcile(mode), settings }
        })
    }

    /// Re-arms the timer when `interval` differs from the current one.
    pub fn set_interval(&mut self, interval: Duration) {
        if interval == self.interval {
            return;
        }
        self.interval = interval;
        self.timer.arm(interval);
        log::info!("poller: interval now {:?}", interval);
    }

    pub fn stop(&mut self) {
        self.timer.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::TitleMatcher;
    use crate::settings::{Settings, SETTINGS_FILE};
    use crate::testing::{FakeView, FakeWindows, ManualTimer};

    #[test]
    fn start_arms_and_fire_returns_to_idle() {
        let mut p = Poller::start(ManualTimer::default(), Duration::from_secs(5));
        assert_eq!(p.timer().armed, Some(Duration::from_secs(5)));
        let seen = p.fire(|_| 42);
        assert_eq!(seen, Some(42));
        assert_eq!(p.state(), PollState::Idle);
        assert_eq!(p.cycles(), 1);
    }

    #[test]
    fn interval_change_inside_cycle_waits_for_cycle_end() {
        let mut p = Poller::start(ManualTimer::default(), Duration::from_secs(5));
        p.fire(|req| {
            req.request(Duration::from_secs(2));
        });
        assert_eq!(p.interval(), Duration::from_secs(2));
        assert_eq!(p.timer().arms, [Duration::from_secs(5), Duration::from_secs(2)]);
    }

    #[test]
    fn same_interval_does_not_rearm() {
        let mut p = Poller::start(ManualTimer::default(), Duration::from_secs(5));
        p.set_interval(Duration::from_secs(5));
        assert_eq!(p.timer().arms.len(), 1);
        p.stop();
        assert_eq!(p.timer().armed, None);
    }

    #[test]
    fn reentrant_tick_is_skipped() {
        let mut outer = Poller::start(ManualTimer::default(), Duration::from_secs(1));
        outer.state = PollState::Reconciling;
        assert_eq!(outer.fire(|_| ()), None);
        assert_eq!(outer.cycles(), 0);
    }

    #[test]
    fn manual_ticks_drive_reconciliation() {
        let sys = FakeWindows::new();
        let matcher = TitleMatcher::from_settings(&Settings::default());
        let mut host = TabHost::new(sys.clone(), FakeView::new(sys.clone()), Box::new(matcher));
        let mut p = Poller::start(ManualTimer::default(), Duration::from_secs(5));

        let vm = sys.add_top_level("Ubuntu [Running]");
        let first = p.fire(|_| host.reconcile(PollMode::Auto)).unwrap();
        assert_eq!(first.attached, vec![vm]);
        let second = p.fire(|_| host.reconcile(PollMode::Auto)).unwrap();
        assert!(second.is_quiet());

        sys.destroy(vm);
        let third = p.fire(|_| host.reconcile(PollMode::Auto)).unwrap();
        assert_eq!(third.dropped, vec![vm]);
        assert!(host.tabs().is_empty());
        assert_eq!(p.cycles(), 3);
    }

    #[test]
    fn edited_settings_rearm_timer_and_change_targets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let mut live = LiveSettings::load(path.clone());
        let sys = FakeWindows::new();
        let matcher = TitleMatcher::from_settings(live.get());
        let mut host = TabHost::new(sys.clone(), FakeView::new(sys.clone()), Box::new(matcher));
        let mut p = Poller::start(ManualTimer::default(), live.get().poll_interval());

        let vm = sys.add_top_level("Debian [Läuft]");
        let first = p.poll(&mut host, &mut live, PollMode::Auto).unwrap();
        assert!(first.settings.is_none());
        assert!(first.reconciled.attached.is_empty());

        Settings {
            refresh_interval: 2,
            running_markers: vec!["[Läuft]".into()],
            ..Settings::default()
        }
        .save(&path)
        .unwrap();
        let second = p.poll(&mut host, &mut live, PollMode::Auto).unwrap();
        let delta = second.settings.unwrap();
        assert!(delta.interval && delta.matcher);
        assert_eq!(second.reconciled.attached, vec![vm]);
        assert_eq!(p.interval(), Duration::from_secs(2));
        assert_eq!(p.timer().arms, [Duration::from_secs(5), Duration::from_secs(2)]);

        let third = p.poll(&mut host, &mut live, PollMode::Auto).unwrap();
        assert!(third.settings.is_none());
        assert_eq!(p.timer().arms.len(), 2);
    }

    #[test]
    fn auto_attach_toggle_applies_on_next_poll() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let mut live = LiveSettings::load(path);
        let sys = FakeWindows::new();
        let matcher = TitleMatcher::from_settings(live.get());
        let mut host = TabHost::new(sys.clone(), FakeView::new(sys.clone()), Box::new(matcher));
        let mut p = Poller::start(ManualTimer::default(), live.get().poll_interval());

        live.submit(Settings { auto_attach: false, ..Settings::default() }).unwrap();
        sys.add_top_level("Ubuntu [Running]");
        let cycle = p.poll(&mut host, &mut live, PollMode::Auto).unwrap();
        assert!(cycle.settings.unwrap().auto_attach);
        assert!(cycle.reconciled.attached.is_empty());
        assert_eq!(p.timer().arms.len(), 1);
    }
}
