//! Join-all with per-operation outcomes.
//!
//! Unlike `try_join_all`, [`join_settled`] always waits for every future and never
//! short-circuits on the first failure. Outcomes are returned in launch order.

use crate::shared::error::SyncError;
use futures_util::future::join_all;
use std::future::Future;

/// Outcome of one operation launched through [`join_settled`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult<T> {
    Fulfilled(T),
    Rejected(SyncError),
}

impl<T> FetchResult<T> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            Self::Fulfilled(_) => None,
            Self::Rejected(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<T, SyncError> {
        match self {
            Self::Fulfilled(value) => Ok(value),
            Self::Rejected(e) => Err(e),
        }
    }
}

impl<T> From<Result<T, SyncError>> for FetchResult<T> {
    fn from(result: Result<T, SyncError>) -> Self {
        match result {
            Ok(value) => Self::Fulfilled(value),
            Err(e) => Self::Rejected(e),
        }
    }
}

/// Drive all futures concurrently and collect every outcome
pub async fn join_settled<I, F, T>(operations: I) -> Vec<FetchResult<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, SyncError>>,
{
    join_all(operations)
        .await
        .into_iter()
        .map(FetchResult::from)
        .collect()
}
