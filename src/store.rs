// VBoxTabs — VirtualBox windows as tabs in one host window
// Copyright (c) 2025  Zalexanninev15
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the MIT License. See the LICENSE file in the
// project root for the full license text.
//
// SPDX-License-Identifier: MIT

//! Tab names chosen by the user, remembered per machine across sessions.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;

pub const NAMES_DB: &str = "tab_names.db";

pub struct NameStore {
    conn: Connection,
}

impl NameStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // WAL is best effort; some filesystems refuse it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tab_names (
                vm_name      TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                updated_at   INTEGER NOT NULL
            );
            ",
        )?;
        Ok(Self { conn })
    }

    pub fn get(&self, vm_name: &str) -> Result<Option<String>, StoreError> {
        let name = self
            .conn
            .query_row(
                "SELECT display_name FROM tab_names WHERE vm_name = ?1",
                params![vm_name],
                |r| r.get(0),
            )
            .optional()?;
        Ok(name)
    }

    pub fn set(&self, vm_name: &str, display_name: &str) -> Result<(), StoreError> {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        self.conn.execute(
            "INSERT INTO tab_names (vm_name, display_name, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(vm_name) DO UPDATE SET display_name = ?2, updated_at = ?3",
            params![vm_name, display_name, ts],
        )?;
        Ok(())
    }

    pub fn forget(&self, vm_name: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM tab_names WHERE vm_name = ?1", params![vm_name])?;
        Ok(())
    }
}
