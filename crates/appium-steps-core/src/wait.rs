//! Bounded waits on device state.
//!
//! Steps that depend on an element being on screen poll the driver until the
//! condition holds or the wait expires, then return
//! [`StepError::Timeout`]. The dispatcher imposes no timeout of its own, so
//! every wait a handler performs goes through here.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::StepsConfig;
use crate::driver::{DriverError, Locator, MobileDriver};
use crate::outcome::StepError;

/// Timeouts used by the built-in steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Wait before interacting with or asserting on an element.
    pub default_timeout: Duration,
    /// Wait for the explicit "wait until" steps.
    pub long_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::from(&StepsConfig::default())
    }
}

impl From<&StepsConfig> for WaitPolicy {
    fn from(config: &StepsConfig) -> Self {
        Self {
            default_timeout: config.default_timeout(),
            long_timeout: config.long_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// Polls until the element is displayed.
///
/// A missing element counts as "not yet displayed"; any other driver error
/// ends the wait immediately.
pub async fn wait_for_displayed(
    driver: &dyn MobileDriver,
    locator: &Locator,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), StepError> {
    poll_until(driver, locator, timeout, poll_interval, true).await
}

/// Polls until the element is gone or hidden.
pub async fn wait_for_not_displayed(
    driver: &dyn MobileDriver,
    locator: &Locator,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), StepError> {
    poll_until(driver, locator, timeout, poll_interval, false).await
}

async fn poll_until(
    driver: &dyn MobileDriver,
    locator: &Locator,
    timeout: Duration,
    poll_interval: Duration,
    want_displayed: bool,
) -> Result<(), StepError> {
    let start = Instant::now();
    loop {
        let displayed = match driver.is_displayed(locator).await {
            Ok(displayed) => displayed,
            Err(DriverError::ElementNotFound(_)) => false,
            Err(e) => return Err(e.into()),
        };
        if displayed == want_displayed {
            debug!(locator = %locator, elapsed_ms = start.elapsed().as_millis() as u64, "wait satisfied");
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            let what = if want_displayed {
                format!("'{}' to be displayed", locator)
            } else {
                format!("'{}' to disappear", locator)
            };
            return Err(StepError::Timeout {
                what,
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        tokio::time::sleep(poll_interval).await;
    }
}
