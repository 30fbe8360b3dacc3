//! App lifecycle and device steps.

use std::time::Duration;

use tracing::debug;

use crate::context::ExecutionContext;
use crate::driver::Orientation;
use crate::outcome::StepError;
use crate::registry::{RegistryError, StepArgs, StepMetadata, StepRegistry, StepTag};

use super::non_negative;

/// Pause after launching or closing the app.
const SETTLE: Duration = Duration::from_secs(1);

pub fn register(registry: &mut StepRegistry) -> Result<(), RegistryError> {
    let meta = |description: &str, example: &str| {
        StepMetadata::new(StepTag::Navigation, description).with_example(example)
    };

    step!(registry, "I open the deep link {string}", open_deep_link,
        meta("Opens a deep link URL", "I open the deep link \"myapp://settings/profile\""))?;
    step!(registry, "I put the app in the background for {int} seconds", background_app,
        meta("Puts the app in the background for a number of seconds", "I put the app in the background for 5 seconds"))?;
    step!(registry, "I put the app in background for {int} seconds", background_app,
        meta("Puts the app in the background for a number of seconds", "I put the app in background for 3 seconds"))?;
    step!(registry, "I restart the application", restart_application,
        meta("Terminates and re-activates the app under test", "I restart the application"))?;
    step!(registry, "I navigate back", navigate_back,
        meta("Navigates back to the previous screen", "I navigate back"))?;
    step!(registry, "I hide the keyboard", hide_keyboard_if_shown,
        meta("Hides the software keyboard if it is visible", "I hide the keyboard"))?;
    step!(registry, "I hide keyboard", hide_keyboard,
        meta("Hides the software keyboard", "I hide keyboard"))?;
    step!(registry, "I rotate the device to {string}", rotate_device,
        meta("Rotates the device to PORTRAIT or LANDSCAPE", "I rotate the device to \"LANDSCAPE\""))?;
    step!(registry, "I launch the app", launch_app,
        meta("Waits for the app launched by the session to settle", "I launch the app"))?;
    step!(registry, "I wait for {int} seconds", wait_seconds,
        meta("Pauses for a number of seconds", "I wait for 2 seconds"))?;
    step!(registry, "I restart the app", restart_app,
        meta("Closes and relaunches the app", "I restart the app"))?;
    step!(registry, "I close the app", close_app,
        meta("Closes the app", "I close the app"))?;
    step!(registry, "I launch the app again", launch_app_again,
        meta("Launches the app after it was closed", "I launch the app again"))?;
    step!(registry, "I shake the device", shake_device,
        meta("Shakes the device", "I shake the device"))?;
    step!(registry, "I lock the device", lock_device,
        meta("Locks the device", "I lock the device"))?;
    step!(registry, "I unlock the device", unlock_device,
        meta("Unlocks the device", "I unlock the device"))?;
    Ok(())
}

async fn open_deep_link(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    ctx.driver()?.open_url(args.string(0)?).await?;
    Ok(())
}

async fn background_app(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let seconds = args.int(0)?;
    non_negative(seconds, "background duration")?;
    ctx.driver()?.background_app(seconds).await?;
    Ok(())
}

async fn restart_application(ctx: &mut ExecutionContext, _args: StepArgs) -> Result<(), StepError> {
    let driver = ctx.driver()?;
    let app_id = ctx.strategy().app_id(driver).ok_or_else(|| {
        StepError::InvalidArgument(
            "Could not determine App ID (Package Name or Bundle ID) from driver capabilities."
                .to_string(),
        )
    })?;
    debug!(app_id = %app_id, "restarting application");
    driver.terminate_app(&app_id).await?;
    driver.activate_app(&app_id).await?;
    Ok(())
}

async fn navigate_back(ctx: &mut ExecutionContext, _args: StepArgs) -> Result<(), StepError> {
    ctx.driver()?.back().await?;
    Ok(())
}

async fn hide_keyboard_if_shown(ctx: &mut ExecutionContext, _args: StepArgs) -> Result<(), StepError> {
    let driver = ctx.driver()?;
    if driver.is_keyboard_shown().await? {
        driver.hide_keyboard().await?;
    }
    Ok(())
}

async fn hide_keyboard(ctx: &mut ExecutionContext, _args: StepArgs) -> Result<(), StepError> {
    ctx.driver()?.hide_keyboard().await?;
    Ok(())
}

async fn rotate_device(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let orientation: Orientation = args.string(0)?.parse().map_err(StepError::InvalidArgument)?;
    ctx.driver()?.set_orientation(orientation).await?;
    Ok(())
}

async fn launch_app(ctx: &mut ExecutionContext, _args: StepArgs) -> Result<(), StepError> {
    // The session capabilities already launched the app.
    ctx.driver()?;
    tokio::time::sleep(SETTLE).await;
    Ok(())
}

async fn wait_seconds(_ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let seconds = non_negative(args.int(0)?, "wait duration")?;
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    Ok(())
}

async fn restart_app(ctx: &mut ExecutionContext, _args: StepArgs) -> Result<(), StepError> {
    let driver = ctx.driver()?;
    driver.close_app().await?;
    tokio::time::sleep(SETTLE).await;
    driver.launch_app().await?;
    Ok(())
}

async fn close_app(ctx: &mut ExecutionContext, _args: StepArgs) -> Result<(), StepError> {
    ctx.driver()?.close_app().await?;
    Ok(())
}

async fn launch_app_again(ctx: &mut ExecutionContext, _args: StepArgs) -> Result<(), StepError> {
    ctx.driver()?.launch_app().await?;
    Ok(())
}

async fn shake_device(ctx: &mut ExecutionContext, _args: StepArgs) -> Result<(), StepError> {
    ctx.driver()?.shake().await?;
    Ok(())
}

async fn lock_device(ctx: &mut ExecutionContext, _args: StepArgs) -> Result<(), StepError> {
    ctx.driver()?.lock().await?;
    Ok(())
}

async fn unlock_device(ctx: &mut ExecutionContext, _args: StepArgs) -> Result<(), StepError> {
    ctx.driver()?.unlock().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::ContextError;
    use crate::memory_driver::MemoryDriver;
    use crate::platform::Platform;
    use crate::steps::test_support::{context, context_on, int, strings};

    #[tokio::test]
    async fn test_open_deep_link() {
        let driver = Arc::new(MemoryDriver::new());
        let mut ctx = context(&driver);
        open_deep_link(&mut ctx, strings(&["myapp://settings"])).await.unwrap();
        assert_eq!(driver.current_url().as_deref(), Some("myapp://settings"));
    }

    #[tokio::test]
    async fn test_restart_application_uses_platform_capability() {
        let driver = Arc::new(MemoryDriver::new());
        driver.set_capability("bundleId", "com.example.ios");
        driver.set_capability("appPackage", "com.example.android");
        let mut ctx = context_on(&driver, Platform::Ios);

        restart_application(&mut ctx, StepArgs::default()).await.unwrap();
        assert_eq!(
            driver.calls(),
            vec![
                "terminate_app com.example.ios".to_string(),
                "activate_app com.example.ios".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_restart_application_without_app_id_fails() {
        let driver = Arc::new(MemoryDriver::new());
        let mut ctx = context(&driver);
        let err = restart_application(&mut ctx, StepArgs::default()).await.unwrap_err();
        assert!(err.to_string().contains("Could not determine App ID"));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_hide_keyboard_only_when_shown() {
        let driver = Arc::new(MemoryDriver::new());
        let mut ctx = context(&driver);
        hide_keyboard_if_shown(&mut ctx, StepArgs::default()).await.unwrap();
        assert_eq!(driver.calls(), vec!["is_keyboard_shown".to_string()]);

        driver.set_keyboard_shown(true);
        hide_keyboard_if_shown(&mut ctx, StepArgs::default()).await.unwrap();
        assert!(!driver.keyboard_shown());
        assert_eq!(driver.calls().last().map(String::as_str), Some("hide_keyboard"));
    }

    #[tokio::test]
    async fn test_rotate_device_ignores_case() {
        let driver = Arc::new(MemoryDriver::new());
        let mut ctx = context(&driver);
        rotate_device(&mut ctx, strings(&["landscape"])).await.unwrap();
        assert_eq!(driver.orientation(), Orientation::Landscape);

        let err = rotate_device(&mut ctx, strings(&["sideways"])).await.unwrap_err();
        assert!(matches!(err, StepError::InvalidArgument(_)));
        assert_eq!(driver.orientation(), Orientation::Landscape);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_app_requires_driver() {
        let mut ctx = ExecutionContext::new("no driver");
        let err = launch_app(&mut ctx, StepArgs::default()).await.unwrap_err();
        assert!(matches!(err, StepError::Context(ContextError::DriverNotInitialized)));
        assert!(err.to_string().contains("Driver not initialized"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_seconds() {
        let driver = Arc::new(MemoryDriver::new());
        let mut ctx = context(&driver);
        let start = tokio::time::Instant::now();
        wait_seconds(&mut ctx, int(3)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));

        assert!(matches!(
            wait_seconds(&mut ctx, int(-1)).await,
            Err(StepError::InvalidArgument(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_app_closes_then_launches() {
        let driver = Arc::new(MemoryDriver::new());
        let mut ctx = context(&driver);
        restart_app(&mut ctx, StepArgs::default()).await.unwrap();
        assert_eq!(driver.calls(), vec!["close_app".to_string(), "launch_app".to_string()]);
        assert!(driver.is_app_running());
    }

    #[tokio::test]
    async fn test_device_state_steps() {
        let driver = Arc::new(MemoryDriver::new());
        let mut ctx = context(&driver);
        lock_device(&mut ctx, StepArgs::default()).await.unwrap();
        assert!(driver.is_locked());
        unlock_device(&mut ctx, StepArgs::default()).await.unwrap();
        assert!(!driver.is_locked());
        close_app(&mut ctx, StepArgs::default()).await.unwrap();
        assert!(!driver.is_app_running());
        launch_app_again(&mut ctx, StepArgs::default()).await.unwrap();
        assert!(driver.is_app_running());
    }

    #[tokio::test]
    async fn test_background_rejects_negative_duration() {
        let driver = Arc::new(MemoryDriver::new());
        let mut ctx = context(&driver);
        background_app(&mut ctx, int(5)).await.unwrap();
        assert_eq!(driver.calls(), vec!["background_app 5".to_string()]);
        assert!(background_app(&mut ctx, int(-5)).await.is_err());
    }
}
