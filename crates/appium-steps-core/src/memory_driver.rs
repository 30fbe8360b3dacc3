//! In-memory [`MobileDriver`] for dry runs and tests.
//!
//! [`MemoryDriver`] keeps a table of fake elements keyed by the exact selector
//! string, tracks a little device state (keyboard, orientation, lock, app),
//! and records every command it receives. Commands can be made to fail by
//! name with [`fail_command`](MemoryDriver::fail_command).
//!
//! # Example
//!
//! ```
//! use appium_steps_core::driver::{Locator, MobileDriver};
//! use appium_steps_core::memory_driver::{MemoryDriver, MockElement};
//!
//! # async fn demo() {
//! let driver = MemoryDriver::new();
//! driver.add_element("~login", MockElement::visible().with_text("Log in"));
//!
//! driver.click(&Locator::parse("~login")).await.unwrap();
//! assert_eq!(driver.calls(), vec!["click ~login".to_string()]);
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::driver::{DriverError, Locator, MobileDriver, Orientation};
use crate::element::{Direction, ElementRect, Point};

/// PNG signature, returned as the screenshot payload.
const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// A fake on-screen element.
#[derive(Debug, Clone, PartialEq)]
pub struct MockElement {
    pub displayed: bool,
    pub enabled: bool,
    pub selected: bool,
    pub text: String,
    pub value: Option<String>,
    pub rect: ElementRect,
    /// Picker wheel entries; `value` steps through them.
    pub options: Vec<String>,
}

impl MockElement {
    pub fn visible() -> Self {
        Self {
            displayed: true,
            enabled: true,
            selected: false,
            text: String::new(),
            value: None,
            rect: ElementRect { x: 0.0, y: 0.0, width: 100.0, height: 50.0 },
            options: Vec::new(),
        }
    }

    pub fn hidden() -> Self {
        Self {
            displayed: false,
            ..Self::visible()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_rect(mut self, rect: ElementRect) -> Self {
        self.rect = rect;
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self.value = self.options.first().cloned();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }
}

#[derive(Debug)]
struct State {
    elements: HashMap<String, Vec<MockElement>>,
    /// Selector behind each handed-out element id; the id is `element-<index>`.
    element_ids: Vec<String>,
    calls: Vec<String>,
    failing: HashSet<String>,
    capabilities: HashMap<String, String>,
    session_ended: bool,
    keyboard_shown: bool,
    orientation: Orientation,
    locked: bool,
    app_running: bool,
    current_url: Option<String>,
}

/// A headless driver backed by in-memory state.
#[derive(Debug)]
pub struct MemoryDriver {
    state: Mutex<State>,
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                elements: HashMap::new(),
                element_ids: Vec::new(),
                calls: Vec::new(),
                failing: HashSet::new(),
                capabilities: HashMap::new(),
                session_ended: false,
                keyboard_shown: false,
                orientation: Orientation::Portrait,
                locked: false,
                app_running: true,
                current_url: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Places (or replaces) a single element under `selector`.
    pub fn add_element(&self, selector: &str, element: MockElement) {
        self.state().elements.insert(selector.to_string(), vec![element]);
    }

    /// Places `count` copies of `element` under `selector`.
    pub fn add_elements(&self, selector: &str, count: usize, element: MockElement) {
        self.state()
            .elements
            .insert(selector.to_string(), vec![element; count]);
    }

    pub fn remove_element(&self, selector: &str) {
        self.state().elements.remove(selector);
    }

    /// A copy of the first element under `selector`.
    pub fn element(&self, selector: &str) -> Option<MockElement> {
        self.state()
            .elements
            .get(selector)
            .and_then(|els| els.first().cloned())
    }

    pub fn set_capability(&self, name: &str, value: &str) {
        self.state()
            .capabilities
            .insert(name.to_string(), value.to_string());
    }

    pub fn set_keyboard_shown(&self, shown: bool) {
        self.state().keyboard_shown = shown;
    }

    /// Makes every future call of `command` fail with [`DriverError::CommandFailed`].
    pub fn fail_command(&self, command: &str) {
        self.state().failing.insert(command.to_string());
    }

    /// Marks the session as ended without going through `end_session`.
    pub fn end_session_now(&self) {
        self.state().session_ended = true;
    }

    pub fn is_session_ended(&self) -> bool {
        self.state().session_ended
    }

    /// Commands received so far, e.g. `"click ~login"`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn orientation(&self) -> Orientation {
        self.state().orientation
    }

    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    pub fn is_app_running(&self) -> bool {
        self.state().app_running
    }

    pub fn keyboard_shown(&self) -> bool {
        self.state().keyboard_shown
    }

    pub fn current_url(&self) -> Option<String> {
        self.state().current_url.clone()
    }

    /// Checks the session and failure list, then records the call.
    fn begin(&self, command: &str, detail: &str) -> Result<MutexGuard<'_, State>, DriverError> {
        let mut state = self.state();
        if state.session_ended {
            return Err(DriverError::SessionClosed);
        }
        if state.failing.contains(command) {
            return Err(DriverError::CommandFailed(format!("{} failed", command)));
        }
        let entry = if detail.is_empty() {
            command.to_string()
        } else {
            format!("{} {}", command, detail)
        };
        state.calls.push(entry);
        Ok(state)
    }

    fn with_element<T>(
        &self,
        command: &str,
        locator: &Locator,
        f: impl FnOnce(&mut MockElement) -> T,
    ) -> Result<T, DriverError> {
        let mut state = self.begin(command, locator.as_str())?;
        state
            .elements
            .get_mut(locator.as_str())
            .and_then(|els| els.first_mut())
            .map(f)
            .ok_or_else(|| DriverError::ElementNotFound(locator.to_string()))
    }
}

#[async_trait]
impl MobileDriver for MemoryDriver {
    async fn exists(&self, locator: &Locator) -> Result<bool, DriverError> {
        let state = self.begin("exists", locator.as_str())?;
        Ok(state
            .elements
            .get(locator.as_str())
            .is_some_and(|els| !els.is_empty()))
    }

    async fn is_displayed(&self, locator: &Locator) -> Result<bool, DriverError> {
        self.with_element("is_displayed", locator, |el| el.displayed)
    }

    async fn is_enabled(&self, locator: &Locator) -> Result<bool, DriverError> {
        self.with_element("is_enabled", locator, |el| el.enabled)
    }

    async fn is_selected(&self, locator: &Locator) -> Result<bool, DriverError> {
        self.with_element("is_selected", locator, |el| el.selected)
    }

    async fn text(&self, locator: &Locator) -> Result<String, DriverError> {
        self.with_element("text", locator, |el| el.text.clone())
    }

    async fn value(&self, locator: &Locator) -> Result<Option<String>, DriverError> {
        self.with_element("value", locator, |el| el.value.clone())
    }

    async fn count(&self, locator: &Locator) -> Result<usize, DriverError> {
        let state = self.begin("count", locator.as_str())?;
        Ok(state.elements.get(locator.as_str()).map_or(0, Vec::len))
    }

    async fn rect(&self, locator: &Locator) -> Result<ElementRect, DriverError> {
        self.with_element("rect", locator, |el| el.rect)
    }

    async fn element_id(&self, locator: &Locator) -> Result<String, DriverError> {
        let mut state = self.begin("element_id", locator.as_str())?;
        let selector = locator.as_str();
        if !state.elements.get(selector).is_some_and(|els| !els.is_empty()) {
            return Err(DriverError::ElementNotFound(locator.to_string()));
        }
        let index = match state.element_ids.iter().position(|s| s == selector) {
            Some(index) => index,
            None => {
                state.element_ids.push(selector.to_string());
                state.element_ids.len() - 1
            }
        };
        Ok(format!("element-{}", index))
    }

    async fn click(&self, locator: &Locator) -> Result<(), DriverError> {
        self.with_element("click", locator, |_| ())
    }

    async fn double_click(&self, locator: &Locator) -> Result<(), DriverError> {
        self.with_element("double_click", locator, |_| ())
    }

    async fn long_press(&self, locator: &Locator, duration_ms: u64) -> Result<(), DriverError> {
        let detail = format!("{} {}ms", locator, duration_ms);
        let mut state = self.begin("long_press", &detail)?;
        if state.elements.get_mut(locator.as_str()).is_some_and(|els| !els.is_empty()) {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(locator.to_string()))
        }
    }

    async fn set_value(&self, locator: &Locator, text: &str) -> Result<(), DriverError> {
        self.with_element("set_value", locator, |el| el.value = Some(text.to_string()))
    }

    async fn add_value(&self, locator: &Locator, text: &str) -> Result<(), DriverError> {
        self.with_element("add_value", locator, |el| {
            el.value.get_or_insert_with(String::new).push_str(text)
        })
    }

    async fn clear_value(&self, locator: &Locator) -> Result<(), DriverError> {
        self.with_element("clear_value", locator, |el| el.value = Some(String::new()))
    }

    async fn scroll_into_view(&self, locator: &Locator) -> Result<(), DriverError> {
        self.with_element("scroll_into_view", locator, |el| el.displayed = true)
    }

    async fn swipe(&self, from: Point, to: Point, hold_ms: u64) -> Result<(), DriverError> {
        let detail = format!("({},{})->({},{}) {}ms", from.x, from.y, to.x, to.y, hold_ms);
        self.begin("swipe", &detail).map(|_| ())
    }

    async fn scroll(&self, direction: Direction) -> Result<(), DriverError> {
        self.begin("scroll", direction.as_str()).map(|_| ())
    }

    async fn launch_app(&self) -> Result<(), DriverError> {
        self.begin("launch_app", "")?.app_running = true;
        Ok(())
    }

    async fn close_app(&self) -> Result<(), DriverError> {
        self.begin("close_app", "")?.app_running = false;
        Ok(())
    }

    async fn activate_app(&self, app_id: &str) -> Result<(), DriverError> {
        self.begin("activate_app", app_id)?.app_running = true;
        Ok(())
    }

    async fn terminate_app(&self, app_id: &str) -> Result<(), DriverError> {
        self.begin("terminate_app", app_id)?.app_running = false;
        Ok(())
    }

    async fn background_app(&self, seconds: i64) -> Result<(), DriverError> {
        self.begin("background_app", &seconds.to_string()).map(|_| ())
    }

    async fn open_url(&self, url: &str) -> Result<(), DriverError> {
        self.begin("open_url", url)?.current_url = Some(url.to_string());
        Ok(())
    }

    async fn back(&self) -> Result<(), DriverError> {
        self.begin("back", "").map(|_| ())
    }

    fn capability(&self, name: &str) -> Option<String> {
        self.state().capabilities.get(name).cloned()
    }

    async fn set_orientation(&self, orientation: Orientation) -> Result<(), DriverError> {
        self.begin("set_orientation", &orientation.to_string())?.orientation = orientation;
        Ok(())
    }

    async fn lock(&self) -> Result<(), DriverError> {
        self.begin("lock", "")?.locked = true;
        Ok(())
    }

    async fn unlock(&self) -> Result<(), DriverError> {
        self.begin("unlock", "")?.locked = false;
        Ok(())
    }

    async fn shake(&self) -> Result<(), DriverError> {
        self.begin("shake", "").map(|_| ())
    }

    async fn is_keyboard_shown(&self) -> Result<bool, DriverError> {
        Ok(self.begin("is_keyboard_shown", "")?.keyboard_shown)
    }

    async fn hide_keyboard(&self) -> Result<(), DriverError> {
        self.begin("hide_keyboard", "")?.keyboard_shown = false;
        Ok(())
    }

    async fn execute_script(&self, script: &str, args: Value) -> Result<Value, DriverError> {
        let mut state = self.begin("execute_script", script)?;
        match script {
            "mobile: scroll" => Ok(Value::Null),
            "mobile: selectPickerWheelValue" => {
                let id = args
                    .get("element")
                    .and_then(Value::as_str)
                    .ok_or_else(|| DriverError::CommandFailed("missing element".to_string()))?;
                let selector = id
                    .strip_prefix("element-")
                    .and_then(|index| index.parse::<usize>().ok())
                    .and_then(|index| state.element_ids.get(index))
                    .cloned()
                    .ok_or_else(|| DriverError::ElementNotFound(id.to_string()))?;
                let picker = state
                    .elements
                    .get_mut(&selector)
                    .and_then(|els| els.first_mut())
                    .ok_or_else(|| DriverError::ElementNotFound(selector.to_string()))?;
                if picker.options.is_empty() {
                    return Err(DriverError::CommandFailed(format!("'{}' is not a picker", selector)));
                }
                let current = picker
                    .value
                    .as_ref()
                    .and_then(|v| picker.options.iter().position(|o| o == v))
                    .unwrap_or(0);
                let next = (current + 1) % picker.options.len();
                picker.value = Some(picker.options[next].clone());
                Ok(Value::Null)
            }
            other => Err(DriverError::Unsupported(other.to_string())),
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.begin("screenshot", "")?;
        Ok(FAKE_PNG.to_vec())
    }

    async fn end_session(&self) -> Result<(), DriverError> {
        self.begin("end_session", "")?.session_ended = true;
        Ok(())
    }
}
