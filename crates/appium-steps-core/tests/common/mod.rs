//! Shared test helpers for appium-steps-core integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use appium_steps_core::context::ExecutionContext;
use appium_steps_core::dispatcher::Dispatcher;
use appium_steps_core::memory_driver::MemoryDriver;
use appium_steps_core::outcome::StepError;
use appium_steps_core::platform::Platform;
use appium_steps_core::registry::{handler_fn, StepArgs, StepMetadata, StepRegistry, StepTag};

/// A dispatcher over the built-in steps.
pub fn builtin_dispatcher() -> Dispatcher {
    Dispatcher::with_builtin_steps().unwrap()
}

/// A context bound to a fresh in-memory driver.
pub fn memory_context(name: &str, platform: Platform) -> (ExecutionContext, Arc<MemoryDriver>) {
    let driver = Arc::new(MemoryDriver::new());
    let mut ctx = ExecutionContext::new(name);
    ctx.set_driver(driver.clone(), platform);
    (ctx, driver)
}

// ---------------------------------------------------------------------------
// Recording handlers
// ---------------------------------------------------------------------------

/// Call log shared between a test and the handlers it registers.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
    count: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Registers `pattern` with a handler that logs `label` and its arguments.
    pub fn register(&self, registry: &mut StepRegistry, pattern: &str, label: &'static str) {
        let recorder = self.clone();
        registry
            .register(
                pattern,
                handler_fn(move |_ctx: &mut ExecutionContext, args: StepArgs| {
                    let recorder = recorder.clone();
                    Box::pin(async move {
                        recorder.record(label, &args);
                        Ok::<(), StepError>(())
                    })
                }),
                StepMetadata::new(StepTag::Interaction, label),
            )
            .unwrap();
    }

    fn record(&self, label: &str, args: &StepArgs) {
        let rendered: Vec<String> = args.values().iter().map(|v| v.to_string()).collect();
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}({})", label, rendered.join(", ")));
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
