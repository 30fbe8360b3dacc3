//! Device-automation driver trait.
//!
//! This module defines the [`MobileDriver`] trait, the capability surface the
//! built-in steps are written against. A concrete implementation wraps a live
//! Appium/WebDriver session; the crate itself ships only the in-memory
//! [`MemoryDriver`](crate::memory_driver::MemoryDriver).
//!
//! Elements are addressed by [`Locator`], parsed from the selector strings
//! used in step phrases:
//!
//! ```
//! use appium_steps_core::driver::{Locator, LocatorStrategy};
//!
//! let locator = Locator::parse("~login_button");
//! assert_eq!(locator.strategy(), LocatorStrategy::AccessibilityId);
//! assert_eq!(locator.value(), "login_button");
//! ```

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::element::{Direction, ElementRect, Point};

/// Errors raised by a driver backend.
#[derive(Error, Debug)]
pub enum DriverError {
    /// No element matched the locator.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A command or operation failed with the given message.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// The backend is not available or not connected.
    #[error("Not connected to automation backend")]
    NotConnected,

    /// The session has been ended.
    #[error("Session closed")]
    SessionClosed,

    /// An operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// The backend does not implement this command.
    #[error("Unsupported command: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How a selector string addresses an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// `~value`
    AccessibilityId,
    /// `//node[...]` or `(//node)[1]`
    XPath,
    /// `id=value`, or any selector without a recognised prefix.
    Id,
    /// `android=new UiSelector()...`
    AndroidUiAutomator,
    /// `-ios predicate string:...`
    IosPredicate,
    /// `-ios class chain:...`
    IosClassChain,
}

/// A parsed element selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    raw: String,
    strategy: LocatorStrategy,
    value: String,
}

impl Locator {
    /// Parses a WebdriverIO-style mobile selector.
    pub fn parse(selector: &str) -> Self {
        let (strategy, value) = if let Some(v) = selector.strip_prefix('~') {
            (LocatorStrategy::AccessibilityId, v)
        } else if selector.starts_with("//") || selector.starts_with("(/") {
            (LocatorStrategy::XPath, selector)
        } else if let Some(v) = selector.strip_prefix("android=") {
            (LocatorStrategy::AndroidUiAutomator, v)
        } else if let Some(v) = selector.strip_prefix("-ios predicate string:") {
            (LocatorStrategy::IosPredicate, v)
        } else if let Some(v) = selector.strip_prefix("-ios class chain:") {
            (LocatorStrategy::IosClassChain, v)
        } else if let Some(v) = selector.strip_prefix("id=") {
            (LocatorStrategy::Id, v)
        } else {
            (LocatorStrategy::Id, selector)
        };
        Self {
            raw: selector.to_string(),
            strategy,
            value: value.to_string(),
        }
    }

    /// Locator for an accessibility id (`~id`).
    pub fn accessibility_id(id: &str) -> Self {
        Self::parse(&format!("~{}", id))
    }

    pub fn strategy(&self) -> LocatorStrategy {
        self.strategy
    }

    /// The selector with its strategy prefix removed.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The selector exactly as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Screen orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PORTRAIT" => Ok(Orientation::Portrait),
            "LANDSCAPE" => Ok(Orientation::Landscape),
            other => Err(format!(
                "Invalid orientation '{}'. Use: PORTRAIT, LANDSCAPE",
                other
            )),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Portrait => f.write_str("PORTRAIT"),
            Orientation::Landscape => f.write_str("LANDSCAPE"),
        }
    }
}

/// Backend-agnostic mobile automation capabilities.
///
/// Element methods take a [`Locator`]. Methods that query a single element
/// return [`DriverError::ElementNotFound`] when nothing matches, except
/// [`exists`](MobileDriver::exists) and [`count`](MobileDriver::count).
///
/// All methods that touch the device are async; a step awaits each call
/// before issuing the next.
#[async_trait]
pub trait MobileDriver: Send + Sync {
    // --- element queries ---

    async fn exists(&self, locator: &Locator) -> Result<bool, DriverError>;

    async fn is_displayed(&self, locator: &Locator) -> Result<bool, DriverError>;

    async fn is_enabled(&self, locator: &Locator) -> Result<bool, DriverError>;

    async fn is_selected(&self, locator: &Locator) -> Result<bool, DriverError>;

    /// Visible text of the element.
    async fn text(&self, locator: &Locator) -> Result<String, DriverError>;

    /// Value attribute of the element, if it has one.
    async fn value(&self, locator: &Locator) -> Result<Option<String>, DriverError>;

    /// Number of elements matching the locator.
    async fn count(&self, locator: &Locator) -> Result<usize, DriverError>;

    async fn rect(&self, locator: &Locator) -> Result<ElementRect, DriverError>;

    /// Backend reference of the first matching element, as passed to
    /// element-scoped scripts.
    async fn element_id(&self, locator: &Locator) -> Result<String, DriverError>;

    // --- element interactions ---

    async fn click(&self, locator: &Locator) -> Result<(), DriverError>;

    async fn double_click(&self, locator: &Locator) -> Result<(), DriverError>;

    /// Press and hold on the element for `duration_ms`.
    async fn long_press(&self, locator: &Locator, duration_ms: u64) -> Result<(), DriverError>;

    /// Replace the element's value.
    async fn set_value(&self, locator: &Locator, text: &str) -> Result<(), DriverError>;

    /// Append to the element's value.
    async fn add_value(&self, locator: &Locator, text: &str) -> Result<(), DriverError>;

    async fn clear_value(&self, locator: &Locator) -> Result<(), DriverError>;

    async fn scroll_into_view(&self, locator: &Locator) -> Result<(), DriverError>;

    // --- gestures ---

    /// Press at `from`, hold for `hold_ms`, move to `to`, release.
    async fn swipe(&self, from: Point, to: Point, hold_ms: u64) -> Result<(), DriverError>;

    /// Scroll the whole screen.
    async fn scroll(&self, direction: Direction) -> Result<(), DriverError>;

    // --- app lifecycle ---

    async fn launch_app(&self) -> Result<(), DriverError>;

    async fn close_app(&self) -> Result<(), DriverError>;

    async fn activate_app(&self, app_id: &str) -> Result<(), DriverError>;

    async fn terminate_app(&self, app_id: &str) -> Result<(), DriverError>;

    /// Send the app to the background for `seconds`.
    async fn background_app(&self, seconds: i64) -> Result<(), DriverError>;

    /// Open a URL or deep link.
    async fn open_url(&self, url: &str) -> Result<(), DriverError>;

    /// Navigate back.
    async fn back(&self) -> Result<(), DriverError>;

    /// Read a session capability, e.g. `appPackage` or `bundleId`.
    fn capability(&self, name: &str) -> Option<String>;

    // --- device ---

    async fn set_orientation(&self, orientation: Orientation) -> Result<(), DriverError>;

    async fn lock(&self) -> Result<(), DriverError>;

    async fn unlock(&self) -> Result<(), DriverError>;

    async fn shake(&self) -> Result<(), DriverError>;

    async fn is_keyboard_shown(&self) -> Result<bool, DriverError>;

    async fn hide_keyboard(&self) -> Result<(), DriverError>;

    /// Run a backend script such as `mobile: scroll`.
    ///
    /// The default implementation reports the command as unsupported.
    async fn execute_script(
        &self,
        script: &str,
        _args: serde_json::Value,
    ) -> Result<serde_json::Value, DriverError> {
        Err(DriverError::Unsupported(script.to_string()))
    }

    /// Capture a screenshot as raw PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// End the session. Called once when the owning scenario is torn down.
    async fn end_session(&self) -> Result<(), DriverError>;
}
