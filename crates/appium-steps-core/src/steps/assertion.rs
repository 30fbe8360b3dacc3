//! Assertions on what the screen shows.

use crate::context::ExecutionContext;
use crate::driver::{DriverError, Locator, MobileDriver};
use crate::outcome::StepError;
use crate::registry::{RegistryError, StepArgs, StepMetadata, StepRegistry, StepTag};
use crate::wait;

use super::{await_displayed, await_displayed_quick};

pub fn register(registry: &mut StepRegistry) -> Result<(), RegistryError> {
    let meta = |description: &str, example: &str| {
        StepMetadata::new(StepTag::Assertion, description).with_example(example)
    };

    step!(registry, "I should see {string}", should_see,
        meta("Waits for an element to be displayed", "I should see \"~welcome_banner\""))?;
    step!(registry, "I should not see {string}", should_not_see,
        meta("Checks that an element is not displayed", "I should not see \"~error_banner\""))?;
    step!(registry, "I should see {string} element", should_see_accessibility_id,
        meta("Waits for an element to be displayed by accessibility id", "I should see \"welcome_banner\" element"))?;
    step!(registry, "{string} should contain text {string}", should_contain_text,
        meta("Checks that an element's text contains a substring", "\"~status\" should contain text \"Success\""))?;
    step!(registry, "{string} should have exact text {string}", should_have_exact_text,
        meta("Checks an element's full text", "\"~status\" should have exact text \"Success\""))?;
    step!(registry, "{string} should be enabled", should_be_enabled,
        meta("Checks that an element is enabled", "\"~submit\" should be enabled"))?;
    step!(registry, "{string} should be disabled", should_be_disabled,
        meta("Checks that an element is disabled", "\"~submit\" should be disabled"))?;
    step!(registry, "{string} should exist", should_exist,
        meta("Checks that an element exists", "\"~menu\" should exist"))?;
    step!(registry, "{string} should not exist", should_not_exist,
        meta("Checks that no element matches", "\"~spinner\" should not exist"))?;
    step!(registry, "{string} should be selected", should_be_selected,
        meta("Checks that an element is selected", "\"~remember_me\" should be selected"))?;
    step!(registry, "I should see {int} {string} elements", should_see_count,
        meta("Checks how many elements match a selector", "I should see 3 \"//android.widget.CheckBox\" elements"))?;
    step!(registry, "{string} value should be {string}", value_should_be,
        meta("Checks an element's value attribute", "\"~quantity\" value should be \"2\""))?;
    step!(registry, "I wait until {string} is displayed", wait_until_displayed,
        meta("Waits up to the long timeout for an element to appear", "I wait until \"~dashboard\" is displayed"))?;
    step!(registry, "I wait until {string} is not displayed", wait_until_not_displayed,
        meta("Waits up to the long timeout for an element to disappear", "I wait until \"~spinner\" is not displayed"))?;
    step!(registry, "the element {string} should be visible", element_should_be_visible,
        meta("Checks that an element is visible by accessibility id", "the element \"welcome_header\" should be visible"))?;
    step!(registry, "the element {string} should contain the text {string}", element_should_contain_text,
        meta("Checks an element's text by accessibility id", "the element \"status_label\" should contain the text \"Success\""))?;
    step!(registry, "the {string} should be enabled", id_should_be_enabled,
        meta("Checks that an element is enabled by accessibility id", "the \"submit_button\" should be enabled"))?;
    Ok(())
}

fn check(condition: bool, message: impl FnOnce() -> String) -> Result<(), StepError> {
    if condition {
        Ok(())
    } else {
        Err(StepError::Assertion(message()))
    }
}

/// `is_displayed`, treating a missing element as not displayed.
async fn displayed_now(driver: &dyn MobileDriver, locator: &Locator) -> Result<bool, StepError> {
    match driver.is_displayed(locator).await {
        Ok(displayed) => Ok(displayed),
        Err(DriverError::ElementNotFound(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn should_see(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    await_displayed(ctx, &locator).await
}

async fn should_not_see(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    let displayed = displayed_now(ctx.driver()?, &locator).await?;
    check(!displayed, || format!("Expected '{}' not to be displayed", locator))
}

async fn should_see_accessibility_id(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::accessibility_id(args.string(0)?);
    await_displayed(ctx, &locator).await
}

async fn should_contain_text(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    let expected = args.string(1)?;
    await_displayed(ctx, &locator).await?;
    let actual = ctx.driver()?.text(&locator).await?;
    check(actual.contains(expected), || {
        format!("Expected '{}' to contain \"{}\" but found \"{}\"", locator, expected, actual)
    })
}

async fn should_have_exact_text(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    let expected = args.string(1)?;
    await_displayed(ctx, &locator).await?;
    let actual = ctx.driver()?.text(&locator).await?;
    check(actual == expected, || {
        format!("Expected '{}' to have text \"{}\" but found \"{}\"", locator, expected, actual)
    })
}

async fn should_be_enabled(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    await_displayed(ctx, &locator).await?;
    let enabled = ctx.driver()?.is_enabled(&locator).await?;
    check(enabled, || format!("Expected '{}' to be enabled", locator))
}

async fn should_be_disabled(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    await_displayed(ctx, &locator).await?;
    let enabled = ctx.driver()?.is_enabled(&locator).await?;
    check(!enabled, || format!("Expected '{}' to be disabled", locator))
}

async fn should_exist(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    let exists = ctx.driver()?.exists(&locator).await?;
    check(exists, || format!("Expected '{}' to exist", locator))
}

async fn should_not_exist(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    let exists = ctx.driver()?.exists(&locator).await?;
    check(!exists, || format!("Expected '{}' not to exist", locator))
}

async fn should_be_selected(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    await_displayed(ctx, &locator).await?;
    let selected = ctx.driver()?.is_selected(&locator).await?;
    check(selected, || format!("Expected '{}' to be selected", locator))
}

async fn should_see_count(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let expected = args.int(0)?;
    let locator = Locator::parse(args.string(1)?);
    let actual = ctx.driver()?.count(&locator).await?;
    check(i64::try_from(actual).is_ok_and(|n| n == expected), || {
        format!("Expected {} '{}' elements but found {}", expected, locator, actual)
    })
}

async fn value_should_be(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    let expected = args.string(1)?;
    await_displayed(ctx, &locator).await?;
    let actual = ctx.driver()?.value(&locator).await?;
    check(actual.as_deref() == Some(expected), || match &actual {
        Some(actual) => format!("Expected '{}' value \"{}\" but found \"{}\"", locator, expected, actual),
        None => format!("Expected '{}' value \"{}\" but it has no value", locator, expected),
    })
}

async fn wait_until_displayed(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    let policy = ctx.wait_policy();
    wait::wait_for_displayed(ctx.driver()?, &locator, policy.long_timeout, policy.poll_interval).await
}

async fn wait_until_not_displayed(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::parse(args.string(0)?);
    let policy = ctx.wait_policy();
    wait::wait_for_not_displayed(ctx.driver()?, &locator, policy.long_timeout, policy.poll_interval).await
}

async fn element_should_be_visible(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let id = args.string(0)?;
    let displayed = displayed_now(ctx.driver()?, &Locator::accessibility_id(id)).await?;
    check(displayed, || {
        format!("Element with ID \"{}\" was not visible on the screen", id)
    })
}

async fn element_should_contain_text(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let locator = Locator::accessibility_id(args.string(0)?);
    let expected = args.string(1)?;
    await_displayed_quick(ctx, &locator).await?;
    let actual = ctx.driver()?.text(&locator).await?;
    check(actual.contains(expected), || {
        format!("Expected \"{}\" but found \"{}\"", expected, actual)
    })
}

async fn id_should_be_enabled(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let id = args.string(0)?;
    let enabled = ctx.driver()?.is_enabled(&Locator::accessibility_id(id)).await?;
    check(enabled, || format!("Element \"{}\" is currently disabled", id))
}
