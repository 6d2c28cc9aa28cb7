use serde::{Deserialize, Serialize};

/// Result of one item of a batched, failure-tolerant read.
///
/// `Unknown` means the item has not been read (yet); `Failed` means it was
/// read and the read failed. Neither is the same as a successful read of a
/// zero or empty record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ReadOutcome<T> {
    Ok(T),
    Failed(String),
    Unknown,
}

impl<T> ReadOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ok(&self) -> Option<&T> {
        match self {
            Self::Ok(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ReadOutcome<U> {
        match self {
            Self::Ok(v) => ReadOutcome::Ok(f(v)),
            Self::Failed(e) => ReadOutcome::Failed(e),
            Self::Unknown => ReadOutcome::Unknown,
        }
    }

    /// Chains a fallible decode onto a successful read.
    pub fn and_then<U, E: std::fmt::Display>(self, f: impl FnOnce(T) -> Result<U, E>) -> ReadOutcome<U> {
        match self {
            Self::Ok(v) => match f(v) {
                Ok(u) => ReadOutcome::Ok(u),
                Err(e) => ReadOutcome::Failed(e.to_string()),
            },
            Self::Failed(e) => ReadOutcome::Failed(e),
            Self::Unknown => ReadOutcome::Unknown,
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for ReadOutcome<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::Ok(v),
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

impl<T> Default for ReadOutcome<T> {
    fn default() -> Self {
        Self::Unknown
    }
}
