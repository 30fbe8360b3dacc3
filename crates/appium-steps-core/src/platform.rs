//! Platform discriminant and per-platform behavior.
//!
//! The [`MobileDriver`] surface is the same on both platforms. Where the two
//! genuinely differ (how the app id is exposed in capabilities, how a picker
//! wheel is driven) the difference lives in a [`PlatformStrategy`] selected by
//! [`Platform::strategy`], so step handlers never branch on the platform
//! themselves.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::driver::{DriverError, Locator, MobileDriver};

/// Upper bound on picker wheel steps before giving up on a value.
const MAX_PICKER_STEPS: usize = 50;

/// The target mobile platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }

    /// The behavior object for this platform.
    pub fn strategy(&self) -> &'static dyn PlatformStrategy {
        match self {
            Platform::Android => &AndroidStrategy,
            Platform::Ios => &IosStrategy,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(format!("Unknown platform '{}'. Use: android, ios", other)),
        }
    }
}

/// Platform-specific pieces of step behavior.
#[async_trait]
pub trait PlatformStrategy: Send + Sync {
    fn platform(&self) -> Platform;

    /// Capability names that may carry the app id, in lookup order.
    fn app_id_capabilities(&self) -> &'static [&'static str];

    /// Reads the app id from the session capabilities.
    fn app_id(&self, driver: &dyn MobileDriver) -> Option<String> {
        self.app_id_capabilities()
            .iter()
            .find_map(|name| driver.capability(name))
            .filter(|id| !id.is_empty())
    }

    /// Selects `value` in the picker found by `locator`.
    async fn select_picker_value(
        &self,
        driver: &dyn MobileDriver,
        locator: &Locator,
        value: &str,
    ) -> Result<(), DriverError>;
}

/// Android: pickers accept a value directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct AndroidStrategy;

#[async_trait]
impl PlatformStrategy for AndroidStrategy {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    fn app_id_capabilities(&self) -> &'static [&'static str] {
        &["appPackage", "testobject_app_id"]
    }

    async fn select_picker_value(
        &self,
        driver: &dyn MobileDriver,
        locator: &Locator,
        value: &str,
    ) -> Result<(), DriverError> {
        driver.set_value(locator, value).await
    }
}

/// iOS: picker wheels are stepped with `mobile: selectPickerWheelValue`
/// until they show the requested value.
#[derive(Debug, Clone, Copy, Default)]
pub struct IosStrategy;

#[async_trait]
impl PlatformStrategy for IosStrategy {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    fn app_id_capabilities(&self) -> &'static [&'static str] {
        &["bundleId", "testobject_app_id"]
    }

    async fn select_picker_value(
        &self,
        driver: &dyn MobileDriver,
        locator: &Locator,
        value: &str,
    ) -> Result<(), DriverError> {
        let element = driver.element_id(locator).await?;
        for _ in 0..MAX_PICKER_STEPS {
            if driver.value(locator).await?.as_deref() == Some(value) {
                return Ok(());
            }
            driver
                .execute_script(
                    "mobile: selectPickerWheelValue",
                    json!({ "element": element, "order": "next", "offset": 0.15 }),
                )
                .await?;
        }
        if driver.value(locator).await?.as_deref() == Some(value) {
            return Ok(());
        }
        Err(DriverError::CommandFailed(format!(
            "Picker '{}' never showed value '{}'",
            locator, value
        )))
    }
}
