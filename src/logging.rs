// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! `log` backend: keeps the last lines in memory and rewrites the log file
//! after each one, so the file never grows past `LOG_MAX` lines.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub const LOG_FILE: &str = "vboxtabs.log";
pub const LOG_MAX: usize = 200;

pub struct RingLogger {
    path: Option<PathBuf>,
    buf: Mutex<VecDeque<String>>,
}

impl RingLogger {
    /// `path = None` keeps lines in memory only.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path, buf: Mutex::new(VecDeque::with_capacity(LOG_MAX + 1)) }
    }

    fn push(&self, line: String) {
        let mut buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        buf.push_back(line);
        while buf.len() > LOG_MAX {
            buf.pop_front();
        }
        let Some(path) = &self.path else { return };
        let content: String = buf.iter().map(|l| l.as_str()).collect::<Vec<_>>().join("\n") + "\n";
        drop(buf);
        let _ = fs::write(path, content);
    }
}

fn format_line(record: &Record) -> String {
    format!(
        "[{}] {:<5} {}",
        chrono::Local::now().format("%H:%M:%S%.3f"),
        record.level(),
        record.args()
    )
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.push(format_line(record));
        }
    }

    fn flush(&self) {}
}

/// Installs the ring logger writing to `path`. Only the first call wins.
pub fn init(path: &Path, level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(RingLogger::new(Some(path.to_path_buf()))))?;
    log::set_max_level(level);
    Ok(())
}

/// Applies a new level after a settings reload.
pub fn set_level(level: LevelFilter) {
    if log::max_level() != level {
        log::set_max_level(level);
        log::info!("log level now {}", level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    fn emit(logger: &RingLogger, msg: &str) {
        // Bypasses `enabled`, which depends on the global max level.
        logger.push(format_line(
            &Record::builder().level(Level::Info).args(format_args!("{msg}")).build(),
        ));
    }

    #[test]
    fn ring_keeps_only_the_newest_lines() {
        let logger = RingLogger::new(None);
        for i in 0..LOG_MAX + 5 {
            emit(&logger, &format!("line {i}"));
        }
        let lines: Vec<String> = logger.buf.lock().unwrap().iter().cloned().collect();
        assert_eq!(lines.len(), LOG_MAX);
        assert!(lines[0].ends_with("line 5"));
        assert!(lines[LOG_MAX - 1].ends_with(&format!("line {}", LOG_MAX + 4)));
    }

    #[test]
    fn file_mirrors_the_ring() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE);
        let logger = RingLogger::new(Some(path.clone()));
        emit(&logger, "attach 0x1F0 -> surface 0x2A0");
        emit(&logger, "detach 0x1F0");

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].contains("] INFO  attach 0x1F0"));
        assert!(lines[1].ends_with("detach 0x1F0"));
    }
}
