//! Row layout of the cache table

use rusqlite::Row;
use std::time::{SystemTime, UNIX_EPOCH};

/// One cache row; `expire` holds the deadline in unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CacheRow {
    pub key: String,
    pub value: String,
    pub expire: i64,
}

impl CacheRow {
    pub(crate) const COLUMNS: &'static str = r#""key", "value", "expire""#;

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            value: row.get(1)?,
            expire: row.get(2)?,
        })
    }

    pub(crate) fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expire
    }
}

/// Schema for `table`: the row layout plus an index backing the sweep.
pub(crate) fn schema(table: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS "{table}" (
            "key" VARCHAR(255) NOT NULL PRIMARY KEY,
            "value" TEXT NOT NULL,
            "expire" INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS "idx_{table}_expire" ON "{table}" ("expire");"#
    )
}

pub(crate) fn to_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|since| i64::try_from(since.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
