pub mod keys;
pub mod selector;

pub use keys::{chain_key, join_key, normalize, JoinKey};
pub use selector::{keccak256, selector};
