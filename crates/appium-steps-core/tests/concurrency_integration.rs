//! Concurrent scenarios and cancellation.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use common::{builtin_dispatcher, memory_context};

use appium_steps_core::driver::{DriverError, MobileDriver};
use appium_steps_core::memory_driver::{MemoryDriver, MockElement};
use appium_steps_core::platform::Platform;
use appium_steps_core::scenario::{Scenario, ScenarioRunner, ScenarioStatus, SessionFactory};

/// Hands out one in-memory driver per scenario and keeps them for inspection.
#[derive(Default)]
struct MemorySessions {
    drivers: Mutex<Vec<(String, Arc<MemoryDriver>)>>,
}

impl MemorySessions {
    fn driver_for(&self, scenario: &str) -> Arc<MemoryDriver> {
        self.drivers
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == scenario)
            .map(|(_, d)| d.clone())
            .unwrap()
    }
}

#[async_trait]
impl SessionFactory for MemorySessions {
    async fn create(&self, scenario: &Scenario) -> Result<(Arc<dyn MobileDriver>, Platform), DriverError> {
        let driver = Arc::new(MemoryDriver::new());
        driver.add_element("~field", MockElement::visible());
        self.drivers
            .lock()
            .unwrap()
            .push((scenario.name.clone(), driver.clone()));
        Ok((driver, Platform::Android))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failing_scenario_does_not_affect_siblings() {
    let sessions = Arc::new(MemorySessions::default());
    let mut scenarios = Vec::new();
    for i in 0..8 {
        let value = format!("user{}", i);
        scenarios.push(Scenario::new(
            format!("writer {}", i),
            [
                format!("When I enter \"{}\" into \"~field\"", value),
                format!("Then \"~field\" value should be \"{}\"", value),
            ],
        ));
    }
    scenarios.push(Scenario::new("broken", ["Then \"~nothing\" should exist", "I navigate back"]));

    let runner = ScenarioRunner::new(builtin_dispatcher());
    let reports = runner
        .run_all(scenarios, sessions.clone(), &CancellationToken::new())
        .await;

    assert_eq!(reports.len(), 9);
    for (i, report) in reports.iter().take(8).enumerate() {
        assert_eq!(report.name, format!("writer {}", i));
        assert_eq!(report.status, ScenarioStatus::Passed, "{:?}", report);
        // Each scenario saw only its own session.
        let driver = sessions.driver_for(&report.name);
        assert_eq!(
            driver.element("~field").unwrap().value,
            Some(format!("user{}", i))
        );
        assert!(driver.is_session_ended());
    }

    let broken = &reports[8];
    assert_eq!(broken.status, ScenarioStatus::Failed);
    assert!(broken.records[1].outcome.is_skipped());
    assert_eq!(broken.attachments.len(), 1);
    assert!(sessions.driver_for("broken").is_session_ended());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_skips_remaining_steps_and_releases_driver() {
    let sessions = Arc::new(MemorySessions::default());
    let cancel = CancellationToken::new();
    let scenarios = vec![Scenario::new(
        "slow",
        ["I wait for 10 seconds", "I shake the device", "I lock the device"],
    )];

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let runner = ScenarioRunner::new(builtin_dispatcher());
    let reports = runner.run_all(scenarios, sessions.clone(), &cancel).await;

    let report = &reports[0];
    // The step already running completes; nothing after it is dispatched.
    assert!(report.records[0].outcome.is_success());
    assert!(report.records[1].outcome.is_skipped());
    assert!(report.records[2].outcome.is_skipped());
    assert_eq!(report.status, ScenarioStatus::Cancelled);

    let driver = sessions.driver_for("slow");
    assert!(!driver.calls().iter().any(|c| c == "shake" || c == "lock"));
    assert!(driver.is_session_ended());
}

#[tokio::test]
async fn test_cancelled_before_start_opens_no_sessions() {
    let sessions = Arc::new(MemorySessions::default());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let scenarios = vec![
        Scenario::new("first", ["I navigate back"]),
        Scenario::new("second", ["I shake the device", "I lock the device"]),
    ];

    let runner = ScenarioRunner::new(builtin_dispatcher());
    let reports = runner.run_all(scenarios, sessions.clone(), &cancel).await;

    assert!(sessions.drivers.lock().unwrap().is_empty());
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(report.status, ScenarioStatus::Cancelled);
        assert!(report.setup_error.is_none());
        assert!(report.records.iter().all(|r| r.outcome.is_skipped()));
    }
    assert_eq!(reports[1].records.len(), 2);
}

#[tokio::test]
async fn test_dispatcher_clones_share_one_registry() {
    let dispatcher = builtin_dispatcher();
    let clone = dispatcher.clone();
    assert!(std::ptr::eq(dispatcher.registry(), clone.registry()));

    let mut handles = Vec::new();
    for i in 0..4 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            let (mut ctx, driver) = memory_context(&format!("task {}", i), Platform::Ios);
            let outcome = dispatcher.execute("I shake the device", &mut ctx).await;
            ctx.release().await;
            (outcome.is_success(), driver.calls())
        }));
    }
    for handle in handles {
        let (ok, calls) = handle.await.unwrap();
        assert!(ok);
        assert_eq!(calls, vec!["shake".to_string(), "end_session".to_string()]);
    }
}
