//! Built-in step definitions.
//!
//! Each submodule registers the steps for one [`StepTag`](crate::registry::StepTag):
//!
//! - [`navigation`] - app lifecycle, deep links, device state, plain waits
//! - [`interaction`] - taps, presses, text entry and pickers on any selector
//! - [`input`] - text fields addressed by accessibility id
//! - [`gestures`] - swipes and timed long presses
//! - [`assertion`] - visibility, text, state and count checks
//!
//! Selectors are WebdriverIO-style strings (see [`Locator`]). Steps whose
//! phrasing says "element" or "id" take a bare accessibility id instead.

use std::time::Duration;

use crate::context::ExecutionContext;
use crate::driver::Locator;
use crate::outcome::StepError;
use crate::registry::{RegistryError, StepRegistry};
use crate::wait;

/// Registers `$handler` (an `async fn(&mut ExecutionContext, StepArgs)`) under `$pattern`.
macro_rules! step {
    ($registry:expr, $pattern:literal, $handler:path, $metadata:expr) => {
        $registry.register(
            $pattern,
            $crate::registry::handler_fn(|ctx, args| Box::pin($handler(ctx, args))),
            $metadata,
        )
    };
}

pub mod assertion;
pub mod gestures;
pub mod input;
pub mod interaction;
pub mod navigation;

/// Upper bound on element waits for the accessibility-id input and gesture steps.
const QUICK_TIMEOUT: Duration = Duration::from_secs(5);

/// Registers every built-in step.
pub fn register_all(registry: &mut StepRegistry) -> Result<(), RegistryError> {
    navigation::register(registry)?;
    interaction::register(registry)?;
    input::register(registry)?;
    gestures::register(registry)?;
    assertion::register(registry)?;
    Ok(())
}

/// Waits up to the default timeout for `locator` to be displayed.
pub(crate) async fn await_displayed(ctx: &ExecutionContext, locator: &Locator) -> Result<(), StepError> {
    let policy = ctx.wait_policy();
    wait::wait_for_displayed(ctx.driver()?, locator, policy.default_timeout, policy.poll_interval).await
}

/// Like [`await_displayed`], capped at five seconds.
pub(crate) async fn await_displayed_quick(
    ctx: &ExecutionContext,
    locator: &Locator,
) -> Result<(), StepError> {
    let policy = ctx.wait_policy();
    let timeout = policy.default_timeout.min(QUICK_TIMEOUT);
    wait::wait_for_displayed(ctx.driver()?, locator, timeout, policy.poll_interval).await
}

/// Converts a step's integer argument to a non-negative count.
pub(crate) fn non_negative(value: i64, what: &str) -> Result<u64, StepError> {
    u64::try_from(value)
        .map_err(|_| StepError::InvalidArgument(format!("{} must not be negative, got {}", what, value)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::context::ExecutionContext;
    use crate::memory_driver::MemoryDriver;
    use crate::pattern::StepValue;
    use crate::platform::Platform;
    use crate::registry::StepArgs;

    pub fn context(driver: &Arc<MemoryDriver>) -> ExecutionContext {
        context_on(driver, Platform::Android)
    }

    pub fn context_on(driver: &Arc<MemoryDriver>, platform: Platform) -> ExecutionContext {
        let mut ctx = ExecutionContext::new("test scenario");
        ctx.set_driver(driver.clone(), platform);
        ctx
    }

    pub fn strings(values: &[&str]) -> StepArgs {
        StepArgs::new(values.iter().map(|v| StepValue::String(v.to_string())).collect())
    }

    pub fn int(value: i64) -> StepArgs {
        StepArgs::new(vec![StepValue::Int(value)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_has_no_duplicates() {
        let mut registry = StepRegistry::new();
        register_all(&mut registry).unwrap();
        assert!(registry.len() >= 48);

        // A second pass rejects every pattern and adds nothing.
        let before = registry.len();
        assert!(matches!(
            register_all(&mut registry),
            Err(RegistryError::DuplicatePattern { .. })
        ));
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn test_builtin_patterns_do_not_overlap() {
        let mut registry = StepRegistry::new();
        register_all(&mut registry).unwrap();
        assert!(registry.ambiguities().is_empty(), "{:?}", registry.ambiguities());
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(non_negative(3, "seconds").unwrap(), 3);
        assert!(matches!(non_negative(-1, "seconds"), Err(StepError::InvalidArgument(_))));
    }
}
