//! Error types for the repeat statistics engine.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reading or writing the durable counter document
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read store file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to persist store to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Expected, user-facing outcomes of a ranking query
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RankError {
    #[error("invalid period type: '{0}'")]
    InvalidPeriod(String),

    #[error("no repeat data for this period")]
    NoData,
}

/// Failure of a ranking query: either an expected user-facing outcome or a
/// store fault
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Rank(#[from] RankError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Member lookup failure; always recovered by falling back to the raw id
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("member {user_id} not found in group {group_id}")]
    NotFound { group_id: i64, user_id: i64 },

    #[error("member lookup failed: {0}")]
    Lookup(String),
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("nothing to chart")]
    Empty,
}
