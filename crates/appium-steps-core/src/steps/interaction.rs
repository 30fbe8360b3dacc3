//! Element interaction steps.
//!
//! Each step waits up to the default timeout for the element to be displayed
//! before acting on it, except `I scroll to`, whose target may be off screen.

use tracing::debug;

use crate::context::ExecutionContext;
use crate::driver::Locator;
use crate::outcome::StepError;
use crate::registry::{RegistryError, StepArgs, StepMetadata, StepRegistry, StepTag};

use super::{await_displayed, await_displayed_quick};

/// Hold time for a long press without an explicit duration.
pub const DEFAULT_LONG_PRESS_MS: u64 = 1000;

pub fn register(registry: &mut StepRegistry) -> Result<(), RegistryError> {
    let meta = |description: &str, example: &str| {
        StepMetadata::new(StepTag::Interaction, description).with_example(example)
    };

    step!(registry, "I tap on {string}", tap,
        meta("Taps on an element", "I tap on \"~login_button\""))?;
    step!(registry, "I tap on {string} element", tap_accessibility_id,
        meta("Taps on an element by accessibility id", "I tap on \"login_button\" element"))?;
    step!(registry, "I tap on the element with id {string}", tap_element_with_id,
        meta("Taps on an element by accessibility id", "I tap on the element with id \"login_button\""))?;
    step!(registry, "I double tap on {string}", double_tap,
        meta("Double taps on an element", "I double tap on \"~photo\""))?;
    step!(registry, "I long press on {string}", long_press,
        meta("Presses and holds an element for one second", "I long press on \"~avatar\""))?;
    step!(registry, "I enter {string} into {string}", enter_text,
        meta("Replaces the value of an input", "I enter \"alice\" into \"~username\""))?;
    step!(registry, "I clear {string}", clear,
        meta("Clears the value of an input", "I clear \"~username\""))?;
    step!(registry, "I append {string} to {string}", append_text,
        meta("Appends text to the value of an input", "I append \"@example.com\" to \"~email\""))?;
    step!(registry, "I scroll to {string}", scroll_to,
        meta("Scrolls until an element is in view", "I scroll to \"~footer\""))?;
    step!(registry, "I select {string} from {string} picker", select_from_picker,
        meta("Selects a value in a picker", "I select \"Blue\" from \"~colour\" picker"))?;
    Ok(())
}

async fn tap(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    await_displayed(ctx, &locator).await?;
    ctx.driver()?.click(&locator).await?;
    Ok(())
}

async fn tap_accessibility_id(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::accessibility_id(args.string(0)?);
    await_displayed(ctx, &locator).await?;
    ctx.driver()?.click(&locator).await?;
    Ok(())
}

async fn tap_element_with_id(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::accessibility_id(args.string(0)?);
    await_displayed_quick(ctx, &locator).await?;
    ctx.driver()?.click(&locator).await?;
    Ok(())
}

async fn double_tap(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    await_displayed(ctx, &locator).await?;
    ctx.driver()?.double_click(&locator).await?;
    Ok(())
}

async fn long_press(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    await_displayed(ctx, &locator).await?;
    ctx.driver()?.long_press(&locator, DEFAULT_LONG_PRESS_MS).await?;
    Ok(())
}

async fn enter_text(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let text = args.string(0)?;
    let locator = Locator::parse(args.string(1)?);
    await_displayed(ctx, &locator).await?;
    ctx.driver()?.set_value(&locator, text).await?;
    Ok(())
}

async fn clear(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    await_displayed(ctx, &locator).await?;
    ctx.driver()?.clear_value(&locator).await?;
    Ok(())
}

async fn append_text(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let text = args.string(0)?;
    let locator = Locator::parse(args.string(1)?);
    await_displayed(ctx, &locator).await?;
    ctx.driver()?.add_value(&locator, text).await?;
    Ok(())
}

async fn scroll_to(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    ctx.driver()?.scroll_into_view(&locator).await?;
    Ok(())
}

async fn select_from_picker(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let value = args.string(0)?;
    let locator = Locator::parse(args.string(1)?);
    await_displayed(ctx, &locator).await?;
    let strategy = ctx.strategy();
    debug!(platform = %strategy.platform(), picker = %locator, value, "selecting picker value");
    strategy.select_picker_value(ctx.driver()?, &locator, value).await?;
    Ok(())
}
