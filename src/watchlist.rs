//! Callsign watchlist
//!
//! Entries are stored upper-cased, so matching a candidate callsign is a set lookup after
//! upper-casing it. Blank entries never make it into the set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use crate::flights::UNKNOWN_CALLSIGN;

/// Active set of watched callsigns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    entries: BTreeSet<String>,
}

impl Watchlist {
    /// Build a watchlist from individual entries, normalizing each and dropping blanks
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .filter_map(|entry| normalize_entry(entry.as_ref()))
            .collect();
        Self { entries }
    }

    /// Parse comma-separated operator input (e.g., "dal123, BAW75 ,,")
    pub fn parse(input: &str) -> Self {
        Self::from_entries(input.split(','))
    }

    /// Whether `callsign` is on the watchlist (exact, case-insensitive)
    ///
    /// The unknown-callsign sentinel is never matched.
    pub fn matches(&self, callsign: &str) -> bool {
        let candidate = callsign.trim();
        if candidate.is_empty() || candidate == UNKNOWN_CALLSIGN {
            return false;
        }
        self.entries.contains(&candidate.to_uppercase())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in sorted order
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl FromStr for Watchlist {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

fn normalize_entry(entry: &str) -> Option<String> {
    let entry = entry.trim();
    (!entry.is_empty()).then(|| entry.to_uppercase())
}

/// Shared handle to the active watchlist
///
/// The poller takes a snapshot at the start of each cycle, so a replacement made through
/// the API applies from the next cycle on and never part-way through one.
#[derive(Debug, Clone, Default)]
pub struct WatchlistHandle {
    inner: Arc<RwLock<Arc<Watchlist>>>,
}

impl WatchlistHandle {
    pub fn new(watchlist: Watchlist) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(watchlist))),
        }
    }

    /// Current watchlist
    pub fn snapshot(&self) -> Arc<Watchlist> {
        let guard = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    /// Replace the whole watchlist
    pub fn replace(&self, watchlist: Watchlist) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(watchlist);
    }
}

/// Watchlist as exchanged over the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistBody {
    pub callsigns: Vec<String>,
}

impl From<&Watchlist> for WatchlistBody {
    fn from(watchlist: &Watchlist) -> Self {
        Self {
            callsigns: watchlist.entries().map(str::to_string).collect(),
        }
    }
}
