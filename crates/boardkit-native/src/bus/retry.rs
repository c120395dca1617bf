// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded retry of transient bus failures.

use tracing::debug;

use super::status::TransferStatus;

pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Retries transient failures up to `budget` total attempts, no backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    budget: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_BUDGET)
    }
}

/// Final status of a retried operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOutcome {
    pub status: TransferStatus,
    /// Return code of the last attempt
    pub code: i32,
    pub attempts: u32,
}

impl RetryPolicy {
    /// A budget of 0 is treated as 1: every operation is attempted once
    pub fn new(budget: u32) -> Self {
        Self {
            budget: budget.max(1),
        }
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Call `attempt` until it succeeds, fails fatally, or the budget is spent
    pub fn run<F>(&self, mut attempt: F) -> RetryOutcome
    where
        F: FnMut() -> i32,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let code = attempt();
            let status = TransferStatus::classify(code);
            match status {
                TransferStatus::Transient(kind) if attempts < self.budget => {
                    debug!(
                        "[BUS] Transient failure ({}) on attempt {}/{}, retrying",
                        kind, attempts, self.budget
                    );
                }
                _ => {
                    return RetryOutcome {
                        status,
                        code,
                        attempts,
                    }
                }
            }
        }
    }
}
