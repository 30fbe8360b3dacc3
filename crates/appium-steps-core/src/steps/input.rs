//! Text field steps. Fields are addressed by accessibility id.

use crate::context::ExecutionContext;
use crate::driver::Locator;
use crate::outcome::StepError;
use crate::registry::{RegistryError, StepArgs, StepMetadata, StepRegistry, StepTag};

use super::await_displayed_quick;

pub fn register(registry: &mut StepRegistry) -> Result<(), RegistryError> {
    step!(registry, "I type {string} into the {string}", type_into_field,
        StepMetadata::new(StepTag::Input, "Sets the value of a text field by accessibility id")
            .with_example("I type \"my_secret_password\" into the \"password_input\""))?;
    step!(registry, "I clear the {string} field", clear_field,
        StepMetadata::new(StepTag::Input, "Clears a text field by accessibility id")
            .with_example("I clear the \"search_box\" field"))?;
    Ok(())
}

async fn type_into_field(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let text = args.string(0)?;
    let field = Locator::accessibility_id(args.string(1)?);
    await_displayed_quick(ctx, &field).await?;
    ctx.driver()?.set_value(&field, text).await?;
    Ok(())
}

async fn clear_field(ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
    let field = Locator::accessibility_id(args.string(0)?);
    await_displayed_quick(ctx, &field).await?;
    ctx.driver()?.clear_value(&field).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::memory_driver::{MemoryDriver, MockElement};
    use crate::steps::test_support::{context, strings};

    #[tokio::test]
    async fn test_type_and_clear() {
        let driver = Arc::new(MemoryDriver::new());
        driver.add_element("~password_input", MockElement::visible().with_value("old"));
        let mut ctx = context(&driver);

        type_into_field(&mut ctx, strings(&["s3cret", "password_input"])).await.unwrap();
        assert_eq!(driver.element("~password_input").unwrap().value.as_deref(), Some("s3cret"));

        clear_field(&mut ctx, strings(&["password_input"])).await.unwrap();
        assert_eq!(driver.element("~password_input").unwrap().value.as_deref(), Some(""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_field_times_out() {
        let driver = Arc::new(MemoryDriver::new());
        driver.add_element("~search_box", MockElement::hidden());
        let mut ctx = context(&driver);
        let err = clear_field(&mut ctx, strings(&["search_box"])).await.unwrap_err();
        assert!(matches!(err, StepError::Timeout { .. }));
        assert_eq!(driver.element("~search_box").unwrap().value, None);
    }
}
