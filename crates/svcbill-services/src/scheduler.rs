//! Periodic overdue sweep
//!
//! Runs the suspension handler's sweep on a fixed interval. The runner takes
//! no lock: a manual sweep overlapping a scheduled one is harmless because
//! the sweep is idempotent.

use std::sync::Arc;
use std::time::Duration;
use svcbill_core::{config::SuspensionConfig, traits::BillingStore, AppResult};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::suspension_handler::{AutoSuspendCheckResult, SuspensionHandler};

/// Sweep scheduler
pub struct SweepScheduler<S: BillingStore> {
    handler: Arc<SuspensionHandler<S>>,
    interval: Duration,
    backoff_initial: Duration,
    run_on_startup: bool,
}

impl<S: BillingStore> SweepScheduler<S> {
    pub fn new(handler: Arc<SuspensionHandler<S>>, config: &SuspensionConfig) -> Self {
        Self {
            handler,
            interval: config.sweep_interval(),
            backoff_initial: config.retry_backoff_initial(),
            run_on_startup: config.sweep_on_startup,
        }
    }

    /// Run one sweep now and log its summary
    pub async fn run_once(&self) -> AppResult<AutoSuspendCheckResult> {
        let result = self.handler.check_overdue_and_suspend().await?;

        if result.failed > 0 {
            warn!(
                checked = result.checked,
                suspended = result.suspended,
                failed = result.failed,
                "Sweep finished with item failures"
            );
            for failure in &result.failures {
                warn!(
                    invoice_id = %failure.invoice_id,
                    company_service_id = %failure.company_service_id,
                    error_code = %failure.error_code,
                    "{}",
                    failure.message
                );
            }
        } else {
            info!(
                checked = result.checked,
                suspended = result.suspended,
                skipped = result.skipped,
                "Sweep finished"
            );
        }

        Ok(result)
    }

    /// Start the sweep loop. It stops once `cancel` fires; a sweep already
    /// running is allowed to finish.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                run_on_startup = self.run_on_startup,
                "Sweep scheduler started"
            );

            let mut failures: u32 = 0;
            let mut delay = if self.run_on_startup {
                Duration::ZERO
            } else {
                self.interval
            };

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                match self.run_once().await {
                    Ok(_) => {
                        failures = 0;
                        delay = self.interval;
                    }
                    Err(e) if e.is_retryable() => {
                        failures = failures.saturating_add(1);
                        delay = next_delay(self.interval, self.backoff_initial, failures);
                        warn!(
                            attempt = failures,
                            retry_in_ms = delay.as_millis() as u64,
                            "Sweep failed, retrying: {}",
                            e
                        );
                    }
                    Err(e) => {
                        error!("Sweep failed: {}", e);
                        failures = 0;
                        delay = self.interval;
                    }
                }
            }

            info!("Sweep scheduler stopped");
        })
    }
}

/// Delay before the next sweep after `failures` consecutive retryable
/// failures: `initial * 2^(failures - 1)`, never longer than `interval`.
pub fn next_delay(interval: Duration, initial: Duration, failures: u32) -> Duration {
    if failures == 0 {
        return interval;
    }

    let factor = 2u32.saturating_pow(failures - 1);
    initial
        .checked_mul(factor)
        .map_or(interval, |delay| delay.min(interval))
}
