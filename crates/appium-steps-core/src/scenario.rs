//! Scenario execution.
//!
//! A [`ScenarioRunner`] runs the steps of one [`Scenario`] strictly in order
//! against its [`ExecutionContext`], wraps them in [`ScenarioHooks`], and
//! produces a [`ScenarioReport`]. After the first failing step the remaining
//! steps are recorded as skipped. The context's driver session is released
//! when the scenario ends, whatever its result.
//!
//! [`run_all`](ScenarioRunner::run_all) runs many scenarios concurrently, one
//! tokio task and one driver session per scenario. Cancelling the token
//! passed to it skips the remaining steps of every scenario still running.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use appium_steps_core::context::ExecutionContext;
//! use appium_steps_core::dispatcher::Dispatcher;
//! use appium_steps_core::memory_driver::{MemoryDriver, MockElement};
//! use appium_steps_core::platform::Platform;
//! use appium_steps_core::scenario::{Scenario, ScenarioRunner, ScenarioStatus};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let runner = ScenarioRunner::new(Dispatcher::with_builtin_steps().unwrap());
//!     let driver = Arc::new(MemoryDriver::new());
//!     driver.add_element("~username", MockElement::visible());
//!
//!     let mut ctx = ExecutionContext::new("Sign in");
//!     ctx.set_driver(driver.clone(), Platform::Android);
//!     let scenario = Scenario::new("Sign in", [
//!         "When I enter \"alice\" into \"~username\"",
//!         "Then \"~username\" value should be \"alice\"",
//!     ]);
//!
//!     let report = runner.run(&scenario, &mut ctx).await;
//!     assert_eq!(report.status, ScenarioStatus::Passed);
//!     assert!(driver.is_session_ended());
//! }
//! ```

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::StepsConfig;
use crate::context::ExecutionContext;
use crate::dispatcher::{panic_message, strip_keyword, CatchUnwind, Dispatcher};
use crate::driver::{DriverError, MobileDriver};
use crate::outcome::{StepError, StepFailure, StepOutcome, StepRecord};
use crate::platform::Platform;

/// A named, ordered list of step phrases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<String>,
}

impl Scenario {
    pub fn new<S: Into<String>>(name: impl Into<String>, steps: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            steps: steps.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    /// Cancelled before every step ran; no step failed.
    Cancelled,
}

/// A file attached to a report, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub media_type: String,
    pub data: String,
}

impl Attachment {
    pub fn png(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            media_type: "image/png".to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Result of running one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub id: Uuid,
    pub name: String,
    pub status: ScenarioStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub records: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Set when the before hook or session setup failed and no step ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_error: Option<String>,
}

impl ScenarioReport {
    fn new(id: Uuid, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            status: ScenarioStatus::Passed,
            started_at: Utc::now(),
            duration_ms: 0,
            records: Vec::new(),
            attachments: Vec::new(),
            setup_error: None,
        }
    }

    fn all_skipped(id: Uuid, scenario: &Scenario, status: ScenarioStatus) -> Self {
        let mut report = Self::new(id, &scenario.name);
        report.status = status;
        report.records = scenario
            .steps
            .iter()
            .map(|step| StepRecord::new(strip_keyword(step), StepOutcome::Skipped, 0))
            .collect();
        report
    }

    /// Report for a scenario that never started; every step is skipped.
    fn not_started(id: Uuid, scenario: &Scenario, error: String) -> Self {
        let mut report = Self::all_skipped(id, scenario, ScenarioStatus::Failed);
        report.setup_error = Some(error);
        report
    }

    /// Report for a scenario cancelled before its session was opened.
    fn cancelled(id: Uuid, scenario: &Scenario) -> Self {
        Self::all_skipped(id, scenario, ScenarioStatus::Cancelled)
    }

    pub fn is_passed(&self) -> bool {
        self.status == ScenarioStatus::Passed
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepFailure> {
        self.records.iter().filter_map(|r| match &r.outcome {
            StepOutcome::Failure(f) => Some(f),
            _ => None,
        })
    }
}

/// Code run around every scenario.
#[async_trait]
pub trait ScenarioHooks: Send + Sync {
    /// Runs before the first step. An error or a panic fails the scenario
    /// without running any step.
    async fn before(&self, _ctx: &mut ExecutionContext) -> Result<(), StepError> {
        Ok(())
    }

    /// Runs after the last step, while the driver session is still open.
    /// A panic is logged; the session is released regardless.
    async fn after(&self, _ctx: &mut ExecutionContext, _report: &mut ScenarioReport) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl ScenarioHooks for NoHooks {}

/// Attaches a screenshot to the report of a failed scenario.
///
/// A screenshot that cannot be captured is logged and otherwise ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureScreenshot;

#[async_trait]
impl ScenarioHooks for FailureScreenshot {
    async fn after(&self, ctx: &mut ExecutionContext, report: &mut ScenarioReport) {
        if report.status != ScenarioStatus::Failed {
            return;
        }
        let driver = match ctx.driver() {
            Ok(driver) => driver,
            Err(e) => {
                debug!(error = %e, "no driver for failure screenshot");
                return;
            }
        };
        match driver.screenshot().await {
            Ok(png) => {
                info!(scenario = %report.name, "Screenshot captured for failed scenario");
                report.attachments.push(Attachment::png("failure screenshot", &png));
            }
            Err(e) => warn!(scenario = %report.name, error = %e, "Failed to capture screenshot"),
        }
    }
}

/// Opens a driver session for a scenario.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self, scenario: &Scenario) -> Result<(Arc<dyn MobileDriver>, Platform), DriverError>;
}

/// Runs scenarios through a [`Dispatcher`].
#[derive(Clone)]
pub struct ScenarioRunner {
    dispatcher: Dispatcher,
    hooks: Arc<dyn ScenarioHooks>,
    config: StepsConfig,
}

impl ScenarioRunner {
    /// A runner with the [`FailureScreenshot`] hook and default config.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            hooks: Arc::new(FailureScreenshot),
            config: StepsConfig::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ScenarioHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Config used for the contexts created by [`run_all`](Self::run_all).
    pub fn with_config(mut self, config: StepsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs one scenario to completion and releases its driver.
    pub async fn run(&self, scenario: &Scenario, ctx: &mut ExecutionContext) -> ScenarioReport {
        let span = info_span!("run_scenario", scenario = %scenario.name);
        async {
            let start = Instant::now();
            let mut report = ScenarioReport::new(ctx.id(), &scenario.name);

            let setup = match CatchUnwind(self.hooks.before(ctx)).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(panic) => Err(format!("Before hook panicked: {}", panic_message(&*panic))),
            };
            match setup {
                Ok(()) => self.run_steps(scenario, ctx, &mut report).await,
                Err(message) => {
                    warn!(error = %message, "before hook failed");
                    report = ScenarioReport::not_started(ctx.id(), scenario, message);
                }
            }

            if let Err(panic) = CatchUnwind(self.hooks.after(ctx, &mut report)).await {
                error!(panic = %panic_message(&*panic), "after hook panicked");
            }
            ctx.release().await;

            report.duration_ms = start.elapsed().as_millis() as u64;
            debug!(
                elapsed_ms = report.duration_ms,
                status = ?report.status,
                "scenario complete"
            );
            report
        }
        .instrument(span)
        .await
    }

    async fn run_steps(&self, scenario: &Scenario, ctx: &mut ExecutionContext, report: &mut ScenarioReport) {
        let mut failed = false;
        for step in &scenario.steps {
            if failed {
                report
                    .records
                    .push(StepRecord::new(strip_keyword(step), StepOutcome::Skipped, 0));
                continue;
            }
            let record = self.dispatcher.execute_recorded(step, ctx).await;
            if let StepOutcome::Failure(failure) = &record.outcome {
                info!(error = %failure, "step failed");
                failed = true;
            }
            report.records.push(record);
        }

        report.status = if failed {
            ScenarioStatus::Failed
        } else if report.records.iter().any(|r| r.outcome.is_skipped()) {
            ScenarioStatus::Cancelled
        } else {
            ScenarioStatus::Passed
        };
    }

    /// Runs scenarios concurrently, one session each.
    ///
    /// Reports come back in the order of `scenarios`. A scenario whose
    /// session cannot be created fails on its own; siblings keep running.
    /// No session is opened once `cancel` has fired.
    pub async fn run_all(
        &self,
        scenarios: Vec<Scenario>,
        sessions: Arc<dyn SessionFactory>,
        cancel: &CancellationToken,
    ) -> Vec<ScenarioReport> {
        let mut set = JoinSet::new();
        let mut slots: Vec<(Uuid, Scenario, Option<ScenarioReport>)> = Vec::with_capacity(scenarios.len());

        for (index, scenario) in scenarios.into_iter().enumerate() {
            let runner = self.clone();
            let sessions = Arc::clone(&sessions);
            let mut ctx = ExecutionContext::with_config(scenario.name.clone(), &self.config)
                .with_parent_cancellation(cancel);
            slots.push((ctx.id(), scenario.clone(), None));

            set.spawn(async move {
                if ctx.is_cancelled() {
                    debug!(scenario = %scenario.name, "cancelled before session creation");
                    return (index, ScenarioReport::cancelled(ctx.id(), &scenario));
                }
                let created = match CatchUnwind(sessions.create(&scenario)).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(panic) => Err(format!("Session factory panicked: {}", panic_message(&*panic))),
                };
                let report = match created {
                    Ok((driver, platform)) => {
                        ctx.set_driver(driver, platform);
                        runner.run(&scenario, &mut ctx).await
                    }
                    Err(message) => {
                        warn!(scenario = %scenario.name, error = %message, "Failed to create driver session");
                        ScenarioReport::not_started(ctx.id(), &scenario, message)
                    }
                };
                (index, report)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, report)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        slot.2 = Some(report);
                    }
                }
                Err(e) => error!(error = %e, "scenario task failed"),
            }
        }

        slots
            .into_iter()
            .map(|(id, scenario, report)| {
                report.unwrap_or_else(|| {
                    ScenarioReport::not_started(id, &scenario, "scenario task aborted".to_string())
                })
            })
            .collect()
    }
}
