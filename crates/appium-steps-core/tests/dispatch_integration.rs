//! End-to-end dispatch through a sealed registry.
//!
//! Covers resolution over the whole built-in library (round trips, cross
//! matches), argument extraction into handlers, undefined and mistyped
//! phrases, and step ordering on a shared context.

mod common;

use common::{builtin_dispatcher, memory_context, Recorder};

use appium_steps_core::dispatcher::Dispatcher;
use appium_steps_core::memory_driver::MockElement;
use appium_steps_core::outcome::{FailureReason, StepError, StepOutcome};
use appium_steps_core::platform::Platform;
use appium_steps_core::registry::{handler_fn, RegistryError, StepMetadata, StepRegistry, StepTag};
use appium_steps_core::scenario::{Scenario, ScenarioRunner, ScenarioStatus};
use appium_steps_core::steps;

// ---------------------------------------------------------------------------
// Resolution over the built-in library
// ---------------------------------------------------------------------------

#[test]
fn test_every_builtin_pattern_round_trips() {
    let dispatcher = builtin_dispatcher();
    let registry = dispatcher.registry();
    for reg in registry.registrations() {
        let phrase = reg.pattern().example_phrase();
        let resolved = registry
            .resolve(&phrase)
            .unwrap_or_else(|e| panic!("'{}' did not resolve: {}", phrase, e));
        assert_eq!(
            resolved.registration.pattern().source(),
            reg.pattern().source(),
            "'{}' resolved to the wrong step",
            phrase
        );
        assert_eq!(resolved.args.len(), reg.pattern().placeholders().len());
    }
}

#[test]
fn test_no_builtin_pattern_matches_another_builtin_phrase() {
    let dispatcher = builtin_dispatcher();
    let regs = dispatcher.registry().registrations();
    for intended in regs {
        let phrase = intended.pattern().example_phrase();
        for other in regs.iter().filter(|o| o.id() != intended.id()) {
            assert!(
                other.pattern().matches(&phrase).is_none(),
                "'{}' also matches '{}'",
                phrase,
                other.pattern().source()
            );
        }
    }
}

#[test]
fn test_reregistering_builtins_is_rejected_without_side_effects() {
    let mut registry = StepRegistry::new();
    steps::register_all(&mut registry).unwrap();
    let before: Vec<String> = registry
        .registrations()
        .iter()
        .map(|r| r.pattern().source().to_string())
        .collect();

    let err = registry
        .register(
            "I navigate back",
            handler_fn(|_ctx, _args| Box::pin(async { Ok::<(), StepError>(()) })),
            StepMetadata::new(StepTag::Navigation, "again"),
        )
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::DuplicatePattern {
            pattern: "I navigate back".to_string()
        }
    );

    let after: Vec<String> = registry
        .registrations()
        .iter()
        .map(|r| r.pattern().source().to_string())
        .collect();
    assert_eq!(before, after);
}

// ---------------------------------------------------------------------------
// Argument extraction into handlers
// ---------------------------------------------------------------------------

fn recording_dispatcher(recorder: &Recorder) -> Dispatcher {
    let mut registry = StepRegistry::new();
    recorder.register(&mut registry, "I tap on {string}", "tap");
    recorder.register(&mut registry, "I wait for {int} seconds", "wait");
    recorder.register(&mut registry, "I zoom to {float}x", "zoom");
    Dispatcher::new(registry)
}

#[tokio::test]
async fn test_tap_extracts_string_argument() {
    let recorder = Recorder::default();
    let dispatcher = recording_dispatcher(&recorder);
    let (mut ctx, _driver) = memory_context("tap", Platform::Android);

    let outcome = dispatcher.execute("I tap on \"login_button\"", &mut ctx).await;
    assert_eq!(outcome, StepOutcome::Success);
    assert_eq!(recorder.calls(), vec!["tap(\"login_button\")"]);
}

#[tokio::test]
async fn test_wait_extracts_int_argument() {
    let recorder = Recorder::default();
    let dispatcher = recording_dispatcher(&recorder);
    let (mut ctx, _driver) = memory_context("wait", Platform::Android);

    let outcome = dispatcher.execute("When I wait for 3 seconds", &mut ctx).await;
    assert!(outcome.is_success());
    assert_eq!(recorder.calls(), vec!["wait(3)"]);

    let outcome = dispatcher.execute("I zoom to 1.5x", &mut ctx).await;
    assert!(outcome.is_success());
    assert_eq!(recorder.calls()[1], "zoom(1.5)");
}

#[tokio::test]
async fn test_non_numeric_int_is_a_coercion_failure() {
    let recorder = Recorder::default();
    let dispatcher = recording_dispatcher(&recorder);
    let (mut ctx, _driver) = memory_context("wait", Platform::Android);

    let outcome = dispatcher.execute("I wait for abc seconds", &mut ctx).await;
    match outcome.failure_reason() {
        Some(FailureReason::ArgumentCoercion { pattern, message }) => {
            assert_eq!(pattern, "I wait for {int} seconds");
            assert!(message.contains("abc"));
        }
        other => panic!("expected coercion failure, got {:?}", other),
    }
    assert_eq!(recorder.count(), 0);
}

#[tokio::test]
async fn test_undefined_phrase_fails_scenario_without_invoking_handlers() {
    let recorder = Recorder::default();
    let dispatcher = recording_dispatcher(&recorder);
    let (mut ctx, driver) = memory_context("teleport", Platform::Android);

    let scenario = Scenario::new("teleport", ["I teleport the device", "I tap on \"x\""]);
    let report = ScenarioRunner::new(dispatcher).run(&scenario, &mut ctx).await;

    assert_eq!(report.status, ScenarioStatus::Failed);
    assert_eq!(
        report.records[0].outcome.failure_reason(),
        Some(&FailureReason::UndefinedStep)
    );
    assert!(report.records[1].outcome.is_skipped());
    assert_eq!(recorder.count(), 0);
    assert!(driver.is_session_ended());
}

// ---------------------------------------------------------------------------
// Ordering on a shared context
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_second_step_observes_first_steps_write() {
    let dispatcher = builtin_dispatcher();
    let (mut ctx, driver) = memory_context("ordering", Platform::Android);
    driver.add_element("~field", MockElement::visible());

    let first = dispatcher.execute("When I enter \"hello\" into \"~field\"", &mut ctx).await;
    assert!(first.is_success());
    let second = dispatcher
        .execute("Then \"~field\" value should be \"hello\"", &mut ctx)
        .await;
    assert!(second.is_success(), "{:?}", second);

    let calls = driver.calls();
    let write = calls.iter().position(|c| c == "set_value ~field").unwrap();
    let read = calls.iter().position(|c| c == "value ~field").unwrap();
    assert!(write < read);
}

#[tokio::test]
async fn test_step_fails_after_release() {
    let dispatcher = builtin_dispatcher();
    let (mut ctx, _driver) = memory_context("released", Platform::Ios);
    ctx.release().await;

    let outcome = dispatcher.execute("I navigate back", &mut ctx).await;
    match outcome {
        StepOutcome::Failure(failure) => {
            assert!(failure.to_string().contains("has been released"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}
