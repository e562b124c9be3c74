// ABOUTME: Render-scoped call counter that bounds the number of block invocations
// ABOUTME: Shared by every nested and iterated call spawned from one top-level render

use std::sync::atomic::{AtomicUsize, Ordering};

use super::error::{RenderError, Result};

#[derive(Debug)]
pub struct CallBudget {
    used: AtomicUsize,
    limit: usize,
}

impl CallBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            used: AtomicUsize::new(0),
            limit,
        }
    }

    /// Count one block invocation and return its sequence number (1-based).
    ///
    /// A refused charge leaves the counter untouched, so `used` never exceeds
    /// the limit.
    pub fn charge(&self) -> Result<usize> {
        self.used
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .map(|used| used + 1)
            .map_err(|_| RenderError::BudgetExceeded { limit: self.limit })
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_until_limit() {
        let budget = CallBudget::new(3);

        assert_eq!(budget.charge().unwrap(), 1);
        assert_eq!(budget.charge().unwrap(), 2);
        assert_eq!(budget.charge().unwrap(), 3);

        let err = budget.charge().unwrap_err();
        assert!(err.is_budget_exceeded());
        assert!(budget.charge().is_err());
        assert_eq!(budget.used(), 3);
        assert_eq!(budget.limit(), 3);
    }

    #[test]
    fn test_concurrent_charges_are_counted_once_each() {
        let budget = std::sync::Arc::new(CallBudget::new(1_000));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let budget = std::sync::Arc::clone(&budget);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        budget.charge().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(budget.used(), 400);
    }
}
