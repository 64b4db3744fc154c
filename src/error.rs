// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

/// Failure of a single window-system call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OsError {
    #[error("window no longer exists")]
    Gone,

    #[error("access denied")]
    AccessDenied,

    #[error("{op} failed: {message}")]
    Failed { op: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmbedError {
    #[error("attach failed: target vanished")]
    TargetVanished,

    #[error("attach failed: access denied")]
    AccessDenied,

    #[error("attach failed: window is already embedded")]
    AlreadyAttached,

    #[error("attach failed: {source}")]
    Attach { source: OsError },

    #[error("detach failed: {source}")]
    Detach { source: OsError },
}

impl EmbedError {
    /// Classifies an OS failure hit during the attach sequence.
    pub(crate) fn attach(source: OsError) -> Self {
        match source {
            OsError::Gone => EmbedError::TargetVanished,
            OsError::AccessDenied => EmbedError::AccessDenied,
            source => EmbedError::Attach { source },
        }
    }

    /// Transient absence: the window went away, nothing to report.
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbedError::TargetVanished)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("no tab at index {index}")]
    NoTab { index: usize },

    #[error("invalid tab name: cannot be empty")]
    InvalidName,

    #[error("failed to create tab page: {source}")]
    Surface { source: OsError },

    #[error(transparent)]
    Embed(#[from] EmbedError),
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid {field}: '{value}'")]
    Invalid { field: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("executable not found at {path}")]
    NotFound { path: PathBuf },

    #[error("failed to start {path}: {source}")]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_failures_use_documented_messages() {
        assert_eq!(
            EmbedError::attach(OsError::Gone).to_string(),
            "attach failed: target vanished"
        );
        assert_eq!(
            EmbedError::attach(OsError::AccessDenied).to_string(),
            "attach failed: access denied"
        );
        let other = EmbedError::attach(OsError::Failed {
            op: "SetParent",
            message: "boom".into(),
        });
        assert_eq!(other.to_string(), "attach failed: SetParent failed: boom");
        assert!(!other.is_transient());
        assert!(EmbedError::TargetVanished.is_transient());
    }
}
