//! Per-scenario execution context.
//!
//! An [`ExecutionContext`] is created by the test runner for each scenario and
//! passed as `&mut` to every step handler of that scenario. It carries:
//!
//! - the driver session, set by the runner's setup hook
//! - the platform discriminant (`android` or `ios`)
//! - scenario-scoped key/value state shared between steps
//! - the wait policy and a cancellation token
//!
//! The driver is only ever handed out as a borrow (`&dyn MobileDriver`), so a
//! handler cannot keep it past its own invocation. After
//! [`release`](ExecutionContext::release) every driver access fails with
//! [`ContextError::SessionReleased`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use appium_steps_core::context::ExecutionContext;
//! use appium_steps_core::memory_driver::MemoryDriver;
//! use appium_steps_core::platform::Platform;
//!
//! let mut ctx = ExecutionContext::new("Login works");
//! assert!(ctx.driver().is_err());
//!
//! ctx.set_driver(Arc::new(MemoryDriver::new()), Platform::Android);
//! assert!(ctx.driver().is_ok());
//! ctx.set("username", "alice");
//! assert_eq!(ctx.get_as::<String>("username").unwrap().as_deref(), Some("alice"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StepsConfig;
use crate::driver::MobileDriver;
use crate::platform::{Platform, PlatformStrategy};
use crate::wait::WaitPolicy;

/// Errors from context access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The runner's setup hook has not provided a driver yet.
    #[error("Driver not initialized. Please ensure driver is set up in hooks.")]
    DriverNotInitialized,

    /// The scenario's session was torn down.
    #[error("Driver session for scenario '{scenario}' has been released")]
    SessionReleased { scenario: String },

    /// A state value could not be read as the requested type.
    #[error("State key '{key}' has an unexpected type: {message}")]
    StateType { key: String, message: String },
}

enum DriverSlot {
    Uninitialized,
    Active(Arc<dyn MobileDriver>),
    Released,
}

/// State carried across the steps of one scenario.
pub struct ExecutionContext {
    id: Uuid,
    name: String,
    driver: DriverSlot,
    platform: Option<Platform>,
    state: HashMap<String, Value>,
    wait: WaitPolicy,
    cancel: CancellationToken,
}

impl ExecutionContext {
    /// Creates a context with the default wait policy and no driver.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            driver: DriverSlot::Uninitialized,
            platform: None,
            state: HashMap::new(),
            wait: WaitPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a context whose wait policy and default platform come from `config`.
    pub fn with_config(name: impl Into<String>, config: &StepsConfig) -> Self {
        let mut ctx = Self::new(name);
        ctx.wait = WaitPolicy::from(config);
        ctx.platform = config.platform;
        ctx
    }

    /// Ties this context's cancellation to `parent`: cancelling the parent
    /// (e.g. a whole test run) cancels this scenario too.
    pub fn with_parent_cancellation(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The scenario name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Installs the scenario's driver session. Called by the setup hook.
    pub fn set_driver(&mut self, driver: Arc<dyn MobileDriver>, platform: Platform) {
        debug!(scenario = %self.name, platform = %platform, "driver attached");
        self.driver = DriverSlot::Active(driver);
        self.platform = Some(platform);
    }

    /// Borrows the active driver.
    pub fn driver(&self) -> Result<&dyn MobileDriver, ContextError> {
        match &self.driver {
            DriverSlot::Active(driver) => Ok(driver.as_ref()),
            DriverSlot::Uninitialized => Err(ContextError::DriverNotInitialized),
            DriverSlot::Released => Err(ContextError::SessionReleased {
                scenario: self.name.clone(),
            }),
        }
    }

    pub fn has_driver(&self) -> bool {
        matches!(self.driver, DriverSlot::Active(_))
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platform
    }

    pub fn set_platform(&mut self, platform: Platform) {
        self.platform = Some(platform);
    }

    /// Platform behavior for this scenario. Android when no platform is set.
    pub fn strategy(&self) -> &'static dyn PlatformStrategy {
        self.platform.unwrap_or(Platform::Android).strategy()
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        self.wait
    }

    pub fn set_wait_policy(&mut self, wait: WaitPolicy) {
        self.wait = wait;
    }

    // --- scenario state ---

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.state.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Reads a state value as `T`. `Ok(None)` if the key is absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ContextError> {
        self.state
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| ContextError::StateType {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.state.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    // --- cancellation and teardown ---

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Refuses dispatch of any further step in this scenario.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Ends the driver session, best effort.
    ///
    /// A failure to end the session is logged and swallowed. Afterwards the
    /// driver is unreachable through this context. Calling this twice is a
    /// no-op.
    pub async fn release(&mut self) {
        let slot = std::mem::replace(&mut self.driver, DriverSlot::Released);
        match slot {
            DriverSlot::Active(driver) => {
                if let Err(e) = driver.end_session().await {
                    warn!(scenario = %self.name, error = %e, "Failed to release driver session");
                } else {
                    info!(scenario = %self.name, "Driver session released");
                }
            }
            DriverSlot::Uninitialized => {
                debug!(scenario = %self.name, "No driver session to release");
            }
            DriverSlot::Released => {}
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let driver = match self.driver {
            DriverSlot::Uninitialized => "uninitialized",
            DriverSlot::Active(_) => "active",
            DriverSlot::Released => "released",
        };
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("driver", &driver)
            .field("platform", &self.platform)
            .field("state", &self.state)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
