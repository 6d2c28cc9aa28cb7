//! In-process `ChainReader` with scripted responses.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ChainError;
use crate::reader::{CallOutcome, ChainReader, ContractCall};

#[derive(Default)]
struct State {
    responses: HashMap<ContractCall, CallOutcome>,
    down: bool,
    batches: usize,
    calls: usize,
}

/// Answers calls from a table. Calls with no entry fail as reverted.
#[derive(Default)]
pub struct MemoryReader {
    state: Mutex<State>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn respond(&self, call: ContractCall, return_data: Vec<u8>) {
        self.with_state(|s| s.responses.insert(call, CallOutcome::Ok(return_data)));
    }

    pub fn fail(&self, call: ContractCall, reason: &str) {
        self.with_state(|s| s.responses.insert(call, CallOutcome::Failed(reason.to_string())));
    }

    /// While down, every batch fails as a whole.
    pub fn set_down(&self, down: bool) {
        self.with_state(|s| s.down = down);
    }

    /// Number of batches answered or refused so far.
    pub fn batches(&self) -> usize {
        self.with_state(|s| s.batches)
    }

    /// Number of individual calls answered so far.
    pub fn calls(&self) -> usize {
        self.with_state(|s| s.calls)
    }
}

#[async_trait]
impl ChainReader for MemoryReader {
    async fn read_batch(&self, calls: &[ContractCall]) -> Result<Vec<CallOutcome>, ChainError> {
        self.with_state(|s| {
            s.batches += 1;
            if s.down {
                return Err(ChainError::Status { status: 503, body: "reader is down".into() });
            }
            s.calls += calls.len();
            Ok(calls
                .iter()
                .map(|call| {
                    s.responses
                        .get(call)
                        .cloned()
                        .unwrap_or_else(|| CallOutcome::Failed("execution reverted".into()))
                })
                .collect())
        })
    }
}
