// Fetch outcomes and service error taxonomy

use thiserror::Error;

/// Result of a query-service fetch, carried as state rather than thrown
/// across component boundaries. `Empty` is a valid zero-row outcome,
/// distinct from `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Loading,
    Ready(T),
    Empty,
    Failed(String),
}

impl<T> FetchOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, FetchOutcome::Ready(_))
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            FetchOutcome::Ready(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("query service failure: {0}")]
    Service(#[from] anyhow::Error),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_accessors() {
        let outcome = FetchOutcome::Ready(vec![1, 2]);
        assert!(outcome.is_ready());
        assert_eq!(outcome.as_ready(), Some(&vec![1, 2]));

        let empty: FetchOutcome<Vec<i32>> = FetchOutcome::Empty;
        assert!(!empty.is_ready());
        assert!(empty.as_ready().is_none());
    }
}
