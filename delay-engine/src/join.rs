//! Joining per-item chain reads back onto the catalog.

use delay_crypto::JoinKey;
use delay_types::ReadOutcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Successful reads keyed by join key. Failed and unread items are absent
/// from `entries`, never zero-filled, so lookups distinguish "unknown" from
/// a genuine default record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Joined<T> {
    pub entries: BTreeMap<JoinKey, T>,
    pub failed: BTreeMap<JoinKey, String>,
}

impl<T> Default for Joined<T> {
    fn default() -> Self {
        Self { entries: BTreeMap::new(), failed: BTreeMap::new() }
    }
}

impl<T> Joined<T> {
    pub fn get(&self, key: &JoinKey) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pairs `keys[i]` with `outcomes[i]`. A short outcome list leaves the
/// trailing keys unknown; surplus outcomes are ignored.
///
/// The result is a fresh map: keys no longer in `keys` do not survive.
pub fn join<T>(keys: &[JoinKey], outcomes: Vec<ReadOutcome<T>>) -> Joined<T> {
    let mut joined = Joined::default();
    for (key, outcome) in keys.iter().zip(outcomes) {
        match outcome {
            ReadOutcome::Ok(value) => {
                joined.entries.insert(key.clone(), value);
            }
            ReadOutcome::Failed(error) => {
                joined.failed.insert(key.clone(), error);
            }
            ReadOutcome::Unknown => {}
        }
    }
    joined
}
