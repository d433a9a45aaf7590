// =============================================================================
// Polling Scheduler — fixed-cadence balance checks with a cool-down
// =============================================================================
//
// Each cycle makes up to `interval` attempts, `check_for` minutes apart. A
// cycle ends early once a withdrawal request has been answered by the
// exchange. Every cycle, early or not, is followed by an `interval`-minute
// cool-down. The loop only stops when its cancellation token fires; every
// wait (and every in-flight attempt) races against that token.
// =============================================================================

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::types::WithdrawOutcome;
use crate::withdraw::{FundingApi, Withdrawer};

pub const DEFAULT_INTERVAL_MINUTES: u64 = 7;
pub const DEFAULT_CHECK_FOR_MINUTES: u64 = 1;

/// Polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Attempts per cycle, and the cool-down length in minutes.
    pub interval_minutes: u64,
    /// Minutes between attempts inside a cycle.
    pub check_for_minutes: u64,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            check_for_minutes: DEFAULT_CHECK_FOR_MINUTES,
        }
    }
}

impl PollSchedule {
    pub fn check_delay(&self) -> Duration {
        Duration::from_secs(self.check_for_minutes.saturating_mul(60))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

/// Sleep for `duration` unless `cancel` fires first. Returns `false` when
/// cancelled.
async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

pub struct Scheduler<E> {
    withdrawer: Withdrawer<E>,
    schedule: PollSchedule,
}

impl<E: FundingApi> Scheduler<E> {
    pub fn new(withdrawer: Withdrawer<E>, schedule: PollSchedule) -> Self {
        Self {
            withdrawer,
            schedule,
        }
    }

    /// Poll until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            coin = %self.withdrawer.target().coin,
            interval_minutes = self.schedule.interval_minutes,
            check_for_minutes = self.schedule.check_for_minutes,
            "withdraw scheduler started"
        );

        let mut repeated_rejections: u64 = 0;
        loop {
            if !self.run_cycle(&cancel, &mut repeated_rejections).await {
                break;
            }

            info!(
                "Waiting for {} minutes before checking again...",
                self.schedule.interval_minutes
            );
            if !sleep_or_cancel(&cancel, self.schedule.cooldown()).await {
                break;
            }
        }

        info!("withdraw scheduler stopped");
    }

    /// One inner cycle. Returns `false` if cancelled part-way.
    async fn run_cycle(&self, cancel: &CancellationToken, repeated_rejections: &mut u64) -> bool {
        for attempt in 1..=self.schedule.interval_minutes {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                outcome = self.withdrawer.attempt_withdraw() => outcome,
            };
            debug!(attempt, outcome = %outcome, "withdraw attempt finished");

            if let WithdrawOutcome::PermanentError(err) = &outcome {
                *repeated_rejections += 1;
                error!(
                    code = err.code,
                    endpoint = %err.endpoint,
                    repeated = *repeated_rejections,
                    "exchange keeps rejecting this request; it will be retried on the normal cadence"
                );
            } else {
                *repeated_rejections = 0;
            }

            if outcome.reached_withdraw_endpoint() {
                if outcome.is_withdrawn() {
                    info!(attempt, "withdrawal submitted, ending check cycle early");
                }
                break;
            }
            if !sleep_or_cancel(cancel, self.schedule.check_delay()).await {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Tests
// =============================================================================
