//! Backend Selector
//!
//! Two strategies:
//! - `StableHash`: pure function of (key, pool), gives session affinity
//! - `RoundRobin`: shared cursor, advanced atomically per call
//!
//! A stable-hash request without a source key falls back to the round-robin
//! cursor. Such requests get no affinity; they are spread evenly instead of
//! being hashed on a random key.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("No backends configured")]
    NoBackendsConfigured,
}

/// Downstream service eligible for ALLOW traffic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub id: String,
    pub url: String,
}

impl Backend {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    /// Parse `id=url` or a bare `url` (id = url)
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }

        if let Some((id, url)) = entry.split_once('=') {
            let (id, url) = (id.trim(), url.trim());
            // '=' inside a URL query is not a name separator
            if !id.is_empty() && !id.contains('/') && !id.contains(':') && !url.is_empty() {
                return Some(Self::new(id, url));
            }
        }

        Some(Self::new(entry, entry))
    }

    /// Comma-separated pool, blank entries skipped
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',').filter_map(Self::parse).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    #[default]
    StableHash,
    RoundRobin,
}

impl SelectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::StableHash => "stable_hash",
            SelectionStrategy::RoundRobin => "round_robin",
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stable_hash" | "stable" | "hash" | "consistent" => Ok(SelectionStrategy::StableHash),
            "round_robin" | "rr" => Ok(SelectionStrategy::RoundRobin),
            other => Err(format!("unknown selection strategy: {}", other)),
        }
    }
}

/// 32-bit `h * 31 + unit` over UTF-16 code units, wrapping.
/// Stable across runs and platforms.
pub fn stable_hash(key: &str) -> i32 {
    key.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

pub fn stable_index(key: &str, len: usize) -> usize {
    stable_hash(key).unsigned_abs() as usize % len
}

#[derive(Debug)]
pub struct BackendSelector {
    backends: Vec<Backend>,
    strategy: SelectionStrategy,
    cursor: AtomicUsize,
}

impl BackendSelector {
    pub fn new(backends: Vec<Backend>, strategy: SelectionStrategy) -> Self {
        Self {
            backends,
            strategy,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Pick a backend for a request identified by `key` (usually the source address)
    pub fn select(&self, key: Option<&str>) -> Result<&Backend, SelectError> {
        let len = self.backends.len();
        if len == 0 {
            return Err(SelectError::NoBackendsConfigured);
        }

        let index = match (self.strategy, key) {
            (SelectionStrategy::StableHash, Some(key)) => stable_index(key, len),
            (SelectionStrategy::StableHash, None) => {
                tracing::debug!("No source key for stable hashing, using round-robin");
                self.next_round_robin(len)
            }
            (SelectionStrategy::RoundRobin, _) => self.next_round_robin(len),
        };

        Ok(&self.backends[index])
    }

    fn next_round_robin(&self, len: usize) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % len
    }
}
