//! # appium-steps-core
//!
//! Step registry, dispatcher and pre-built Cucumber steps for mobile UI
//! automation.
//!
//! Step patterns with typed placeholders are registered once into a
//! [`StepRegistry`](registry::StepRegistry), which is then sealed and handed
//! to a [`Dispatcher`](dispatcher::Dispatcher). The dispatcher resolves each
//! step phrase of a scenario and runs its handler against that scenario's
//! [`ExecutionContext`](context::ExecutionContext), which holds the driver
//! session and scenario-scoped state.
//!
//! ## Modules
//!
//! - [`pattern`] - Pattern compilation, matching and argument coercion
//! - [`registry`] - Step table with a build phase and a sealed resolve phase
//! - [`dispatcher`] - Resolves phrases and runs handlers, producing outcomes
//! - [`context`] - Per-scenario driver session, platform and state
//! - [`driver`] - The [`MobileDriver`](driver::MobileDriver) trait and locators
//! - [`element`] - Element geometry and swipe directions
//! - [`platform`] - Android and iOS specific step behavior
//! - [`wait`] - Bounded polling on element visibility
//! - [`outcome`] - Step errors, outcomes and records
//! - [`steps`] - The built-in step library
//! - [`scenario`] - Sequential scenario runner, hooks, concurrent runs
//! - [`catalog`] - Step metadata for editor completion
//! - [`config`] - Timeouts and resolution settings
//! - [`memory_driver`] - In-memory driver for dry runs and tests
//!
//! ## Example
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
//!     let dispatcher = Dispatcher::with_builtin_steps().expect("built-in steps register");
//!
//!     let driver = Arc::new(MemoryDriver::new());
//!     driver.add_element("~status", MockElement::visible().with_text("Ready"));
//!
//!     let mut ctx = ExecutionContext::new("Status check");
//!     ctx.set_driver(driver, Platform::Ios);
//!
//!     let outcome = dispatcher
//!         .execute("Then \"~status\" should contain text \"Ready\"", &mut ctx)
//!         .await;
//!     assert!(outcome.is_success());
//!     ctx.release().await;
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod driver;
pub mod element;
pub mod memory_driver;
pub mod outcome;
pub mod pattern;
pub mod platform;
pub mod registry;
pub mod scenario;
pub mod steps;
pub mod wait;
