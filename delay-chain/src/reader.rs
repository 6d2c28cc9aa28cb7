use async_trait::async_trait;
use delay_types::{Address, ReadOutcome};

use crate::error::ChainError;

/// One `eth_call` against the latest block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractCall {
    pub to: Address,
    pub data: Vec<u8>,
}

impl ContractCall {
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self { to, data }
    }
}

/// Raw return data of one call, or why it failed.
pub type CallOutcome = ReadOutcome<Vec<u8>>;

/// Batched contract reads in allow-failure mode.
///
/// An `Ok` batch always holds exactly one outcome per call, in call order.
/// A reverted or otherwise failed call is `ReadOutcome::Failed` and never
/// fails its siblings; `Err` is reserved for the batch as a whole not
/// completing.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn read_batch(&self, calls: &[ContractCall]) -> Result<Vec<CallOutcome>, ChainError>;
}

#[async_trait]
impl<R: ChainReader + ?Sized> ChainReader for std::sync::Arc<R> {
    async fn read_batch(&self, calls: &[ContractCall]) -> Result<Vec<CallOutcome>, ChainError> {
        (**self).read_batch(calls).await
    }
}
