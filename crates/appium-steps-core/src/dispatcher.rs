//! Step dispatch.
//!
//! The [`Dispatcher`] owns a sealed [`StepRegistry`] behind an `Arc` and turns
//! a step phrase into a [`StepOutcome`]: it resolves the phrase, runs the
//! handler against the scenario's [`ExecutionContext`], and maps every error
//! (including a panicking handler) onto a failure for that one step.
//!
//! Cloning a dispatcher is cheap; clones share the registry, so one
//! dispatcher can serve any number of concurrently running scenarios.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use appium_steps_core::context::ExecutionContext;
//! use appium_steps_core::dispatcher::Dispatcher;
//! use appium_steps_core::memory_driver::{MemoryDriver, MockElement};
//! use appium_steps_core::platform::Platform;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let dispatcher = Dispatcher::with_builtin_steps().unwrap();
//!
//!     let driver = Arc::new(MemoryDriver::new());
//!     driver.add_element("login_button", MockElement::visible());
//!     let mut ctx = ExecutionContext::new("Login");
//!     ctx.set_driver(driver, Platform::Android);
//!
//!     let outcome = dispatcher.execute("When I tap on \"login_button\"", &mut ctx).await;
//!     assert!(outcome.is_success());
//! }
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use tracing::{debug, info_span, Instrument};

use crate::context::ExecutionContext;
use crate::outcome::{FailureReason, StepOutcome, StepRecord};
use crate::registry::{RegistryError, ResolveError, StepRegistry};

/// Gherkin keywords that may prefix a step line.
const KEYWORDS: &[&str] = &["Given", "When", "Then", "And", "But", "*"];

/// Resolves and runs steps against a shared, sealed registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<StepRegistry>,
}

impl Dispatcher {
    /// Seals `registry` and takes ownership of it.
    pub fn new(mut registry: StepRegistry) -> Self {
        registry.seal();
        Self {
            registry: Arc::new(registry),
        }
    }

    /// A dispatcher over every built-in step.
    pub fn with_builtin_steps() -> Result<Self, RegistryError> {
        let mut registry = StepRegistry::new();
        crate::steps::register_all(&mut registry)?;
        Ok(Self::new(registry))
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Runs one step.
    ///
    /// A cancelled context yields [`StepOutcome::Skipped`] without touching
    /// the registry. The dispatcher imposes no timeout; handlers bound their
    /// own waits.
    pub async fn execute(&self, phrase: &str, ctx: &mut ExecutionContext) -> StepOutcome {
        let step = strip_keyword(phrase);
        let span = info_span!("execute_step", step = step, scenario = ctx.name());
        async {
            let start = Instant::now();
            let outcome = self.execute_inner(step, ctx).await;
            debug!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                success = outcome.is_success(),
                "step complete"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    /// Runs one step and records it with its timing.
    pub async fn execute_recorded(&self, phrase: &str, ctx: &mut ExecutionContext) -> StepRecord {
        let start = Instant::now();
        let outcome = self.execute(phrase, ctx).await;
        StepRecord::new(strip_keyword(phrase), outcome, start.elapsed().as_millis() as u64)
    }

    async fn execute_inner(&self, step: &str, ctx: &mut ExecutionContext) -> StepOutcome {
        if ctx.is_cancelled() {
            debug!("scenario cancelled, skipping");
            return StepOutcome::Skipped;
        }

        let resolved = match self.registry.resolve(step) {
            Ok(resolved) => resolved,
            Err(e) => return StepOutcome::failure(step, failure_reason(e)),
        };
        debug!(pattern = resolved.registration.pattern().source(), "resolved");

        let handler = resolved.registration.handler();
        match CatchUnwind(handler.call(ctx, resolved.args)).await {
            Ok(result) => StepOutcome::from_handler(step, result),
            Err(panic) => StepOutcome::failure(
                step,
                FailureReason::HandlerError {
                    message: format!("Step handler panicked: {}", panic_message(&*panic)),
                },
            ),
        }
    }
}

/// Removes a leading Gherkin keyword and surrounding whitespace.
pub fn strip_keyword(phrase: &str) -> &str {
    split_keyword(phrase).1
}

/// Splits a trimmed line into its Gherkin keyword, if any, and the step text.
pub fn split_keyword(line: &str) -> (Option<&'static str>, &str) {
    let trimmed = line.trim();
    for keyword in KEYWORDS {
        if let Some(rest) = trimmed.strip_prefix(keyword) {
            if rest.starts_with(char::is_whitespace) {
                return (Some(*keyword), rest.trim_start());
            }
        }
    }
    (None, trimmed)
}

fn failure_reason(err: ResolveError) -> FailureReason {
    match err {
        ResolveError::NoMatch { .. } => FailureReason::UndefinedStep,
        ResolveError::AmbiguousMatch { patterns, .. } => FailureReason::AmbiguousMatch { patterns },
        ResolveError::ArgumentCoercion { pattern, source, .. } => FailureReason::ArgumentCoercion {
            pattern,
            message: source.to_string(),
        },
        // Unreachable through `Dispatcher::new`, which always seals.
        err @ ResolveError::NotSealed => FailureReason::HandlerError {
            message: err.to_string(),
        },
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Polls the inner future, turning a panic into `Err`.
pub(crate) struct CatchUnwind<F>(pub(crate) F);

impl<F: Future + Unpin> Future for CatchUnwind<F> {
    type Output = Result<F::Output, Box<dyn Any + Send>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = &mut self.0;
        match std::panic::catch_unwind(AssertUnwindSafe(|| Pin::new(inner).poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Err(panic) => Poll::Ready(Err(panic)),
        }
    }
}
