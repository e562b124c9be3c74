// ABOUTME: Error types for block rendering and lifecycle hook dispatch
// ABOUTME: Separates the fatal budget error from failures that onError may intercept

use serde_json::Value;
use std::error::Error as StdError;
use thiserror::Error;

/// Error type accepted from block functions and hooks
pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("render call budget exceeded: more than {limit} block calls")]
    BudgetExceeded { limit: usize },

    #[error("block not found: {block}")]
    BlockNotFound { block: String },

    #[error("block returned {kind} instead of a string")]
    NonStringResult { kind: &'static str },

    #[error("{block}: onError hook returned {kind} instead of a string")]
    ErrorHookResult { block: String, kind: &'static str },

    #[error("{block}: {source}")]
    Block {
        block: String,
        #[source]
        source: BoxError,
    },

    #[error("{block}: onError hook failed: {source}")]
    ErrorHook {
        block: String,
        #[source]
        source: BoxError,
    },
}

impl RenderError {
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, RenderError::BudgetExceeded { .. })
    }

    /// Name of the block the error is attributed to, if any
    pub fn block(&self) -> Option<&str> {
        match self {
            RenderError::BlockNotFound { block }
            | RenderError::ErrorHookResult { block, .. }
            | RenderError::Block { block, .. }
            | RenderError::ErrorHook { block, .. } => Some(block),
            RenderError::BudgetExceeded { .. } | RenderError::NonStringResult { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Search an error and its sources for an exhausted call budget.
///
/// Block code may carry the budget error out through `?` or wrap it in its
/// own error type; either way it must not be treated as recoverable.
pub(crate) fn find_budget_exceeded(err: &(dyn StdError + 'static)) -> Option<usize> {
    std::iter::successors(Some(err), |&e| e.source()).find_map(|e| {
        match e.downcast_ref::<RenderError>() {
            Some(RenderError::BudgetExceeded { limit }) => Some(*limit),
            _ => None,
        }
    })
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Wrapper(RenderError);

    impl fmt::Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "wrapped")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_block_errors_prefix_the_block_name() {
        let err = RenderError::Block {
            block: "main".to_string(),
            source: "boom".into(),
        };
        assert_eq!(err.to_string(), "main: boom");
        assert_eq!(err.block(), Some("main"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_budget_error_found_through_boxing_and_wrapping() {
        let boxed: BoxError = Box::new(RenderError::BudgetExceeded { limit: 5 });
        assert_eq!(find_budget_exceeded(boxed.as_ref()), Some(5));

        let wrapped: BoxError = Box::new(Wrapper(RenderError::BudgetExceeded { limit: 7 }));
        assert_eq!(find_budget_exceeded(wrapped.as_ref()), Some(7));

        let other: BoxError = Box::new(RenderError::BlockNotFound {
            block: "x".to_string(),
        });
        assert_eq!(find_budget_exceeded(other.as_ref()), None);
    }

    #[test]
    fn test_budget_error_found_through_anyhow() {
        let err = anyhow::Error::new(RenderError::BudgetExceeded { limit: 3 }).context("rendering row");
        let boxed: BoxError = err.into();
        assert_eq!(find_budget_exceeded(boxed.as_ref()), Some(3));
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(value_kind(&Value::from(1)), "a number");
        assert_eq!(value_kind(&Value::Null), "null");
        assert_eq!(value_kind(&serde_json::json!({})), "an object");
    }
}
