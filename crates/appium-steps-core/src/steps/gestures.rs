//! Swipe and long-press gestures.

use crate::context::ExecutionContext;
use crate::driver::Locator;
use crate::element::Direction;
use crate::outcome::StepError;
use crate::registry::{RegistryError, StepArgs, StepMetadata, StepRegistry, StepTag};

use super::{await_displayed, await_displayed_quick, non_negative};

/// Distance kept from the element edges when swiping across it.
pub const SWIPE_INSET: f64 = 10.0;

/// Hold before moving in an element swipe.
pub const SWIPE_HOLD_MS: u64 = 200;

pub fn register(registry: &mut StepRegistry) -> Result<(), RegistryError> {
    let meta = |description: &str, example: &str| {
        StepMetadata::new(StepTag::Gesture, description).with_example(example)
    };

    step!(registry, "I swipe {string} on {string}", swipe_on_element,
        meta("Swipes across an element (up, down, left or right)", "I swipe \"left\" on \"~carousel\""))?;
    step!(registry, "I swipe {string} on the screen", swipe_screen,
        meta("Scrolls the screen in a direction", "I swipe \"up\" on the screen"))?;
    step!(registry, "I long press on {string} for {int}ms", long_press_for,
        meta("Presses and holds an element by accessibility id", "I long press on \"profile_picture\" for 3000ms"))?;
    Ok(())
}

fn direction(name: &str) -> Result<Direction, StepError> {
    Direction::parse(name).ok_or_else(|| {
        StepError::InvalidArgument(format!(
            "Unknown direction '{}'. Use: up, down, left, right",
            name
        ))
    })
}

async fn swipe_on_element(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let direction = direction(args.string(0)?)?;
    let locator = Locator::parse(args.string(1)?);
    await_displayed(ctx, &locator).await?;

    let driver = ctx.driver()?;
    let rect = driver.rect(&locator).await?;
    let (from, to) = direction.swipe_path(&rect, SWIPE_INSET);
    driver.swipe(from, to, SWIPE_HOLD_MS).await?;
    Ok(())
}

async fn swipe_screen(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let direction = direction(args.string(0)?)?;
    ctx.driver()?.scroll(direction).await?;
    Ok(())
}

async fn long_press_for(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::accessibility_id(args.string(0)?);
    let duration_ms = non_negative(args.int(1)?, "press duration")?;
    await_displayed_quick(ctx, &locator).await?;
    ctx.driver()?.long_press(&locator, duration_ms).await?;
    Ok(())
}
