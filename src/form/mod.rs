//! Multi-step form orchestration.
//!
//! A [`MultiStepForm`] is built per request from the application's step,
//! hook and data declarations, then [`MultiStepForm::handle`] classifies the
//! request and runs the matching transition:
//!
//! - **reset**: namespace replaced with `{form_step: 1}`, no hooks run
//! - **modify**: before hooks (wildcard, then requested step), validation,
//!   save, after hooks (wildcard, then committed step), advance, completion
//! - **navigate**: commit an earlier step when backward navigation is on
//! - **show**: render the view or answer with the JSON payload
//!
//! A reset performed by any hook during a modification ends the transition:
//! nothing after the hook (validation, save, advance, completion) runs.
//!
//! The committed step is read from and written to the session on every call,
//! so concurrent requests for one session must be serialised by the host.

pub mod classify;
pub mod cursor;
pub mod hooks;
pub mod response;
pub mod step;

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::FormConfig;
use crate::error::FormError;
use crate::request::FormRequest;
use crate::session::{Session, ERRORS_KEY, OLD_INPUT_KEY};
use crate::validation::Rule;
use crate::view::ViewRenderer;

pub use classify::RequestKind;
pub use hooks::{HookKey, HookRegistry, HookResult, StepHook};
pub use response::{FormResponse, Representation};
pub use step::{static_data, DataMap, DataValue, StepConfig, StepRegistry};

/// Session and request field holding the step number
pub const FORM_STEP: &str = "form_step";

/// Session namespace used unless [`MultiStepForm::namespaced`] is called
pub const DEFAULT_NAMESPACE: &str = "multistep-form";

/// Transform applied to validated fields before they are saved
pub type BeforeSave =
    Arc<dyn Fn(Map<String, Value>) -> anyhow::Result<Map<String, Value>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookPhase {
    Before,
    After,
}

/// Per-request form state machine
pub struct MultiStepForm {
    request: Box<dyn FormRequest>,
    session: Box<dyn Session>,
    steps: StepRegistry,
    before: HookRegistry,
    after: HookRegistry,
    data: DataMap,
    view: Option<String>,
    renderer: Option<Arc<dyn ViewRenderer>>,
    namespace: String,
    can_go_back: bool,
    was_reset: bool,
    before_save: Option<BeforeSave>,
    on_complete: Option<Arc<dyn StepHook>>,
}

impl MultiStepForm {
    pub fn new(request: impl FormRequest + 'static, session: impl Session + 'static) -> Self {
        Self::from_boxed(Box::new(request), Box::new(session))
    }

    pub fn from_boxed(request: Box<dyn FormRequest>, session: Box<dyn Session>) -> Self {
        Self {
            request,
            session,
            steps: StepRegistry::new(),
            before: HookRegistry::new(),
            after: HookRegistry::new(),
            data: DataMap::new(),
            view: None,
            renderer: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            can_go_back: false,
            was_reset: false,
            before_save: None,
            on_complete: None,
        }
    }

    /// Form rendering `view` with global `data`
    pub fn make(
        request: impl FormRequest + 'static,
        session: impl Session + 'static,
        view: Option<&str>,
        data: DataMap,
    ) -> Self {
        let mut form = Self::new(request, session);
        form.view = view.map(str::to_string);
        form.data = data;
        form
    }

    // --- configuration -----------------------------------------------------

    /// Apply namespace and navigation settings from configuration
    pub fn configure(&mut self, config: &FormConfig) -> &mut Self {
        self.namespace.clone_from(&config.namespace);
        self.can_go_back = config.can_navigate_back;
        self
    }

    pub fn add_step(&mut self, step: u32, config: StepConfig) -> &mut Self {
        self.steps.insert(step, config);
        self
    }

    /// Hook run before validation; a returned response skips the rest
    pub fn before_step<F>(&mut self, key: impl Into<HookKey>, hook: F) -> &mut Self
    where
        F: Fn(&mut MultiStepForm) -> HookResult + Send + Sync + 'static,
    {
        self.before.insert(key.into(), Arc::new(hook));
        self
    }

    /// Hook run after a successful save
    pub fn on_step<F>(&mut self, key: impl Into<HookKey>, hook: F) -> &mut Self
    where
        F: Fn(&mut MultiStepForm) -> HookResult + Send + Sync + 'static,
    {
        self.after.insert(key.into(), Arc::new(hook));
        self
    }

    pub fn before_save<F>(&mut self, transform: F) -> &mut Self
    where
        F: Fn(Map<String, Value>) -> anyhow::Result<Map<String, Value>> + Send + Sync + 'static,
    {
        self.before_save = Some(Arc::new(transform));
        self
    }

    /// Callback run when the last step is submitted, before the form resets
    pub fn on_complete<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut MultiStepForm) -> HookResult + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(hook));
        self
    }

    pub fn can_navigate_back(&mut self, enabled: bool) -> &mut Self {
        self.can_go_back = enabled;
        self
    }

    pub fn namespaced(&mut self, namespace: &str) -> &mut Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Merge global response data; later keys win
    pub fn with_data(&mut self, data: DataMap) -> &mut Self {
        self.data.extend(data);
        self
    }

    pub fn data(&mut self, key: &str, value: impl Into<DataValue>) -> &mut Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn view(&mut self, view: &str) -> &mut Self {
        self.view = Some(view.to_string());
        self
    }

    pub fn renderer(&mut self, renderer: Arc<dyn ViewRenderer>) -> &mut Self {
        self.renderer = Some(renderer);
        self
    }

    /// Run a configuration callback against the form
    pub fn tap<F>(&mut self, configure: F) -> &mut Self
    where
        F: FnOnce(&mut MultiStepForm),
    {
        configure(self);
        self
    }

    // --- accessors ---------------------------------------------------------

    pub fn request(&self) -> &dyn FormRequest {
        self.request.as_ref()
    }

    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> &mut dyn Session {
        self.session.as_mut()
    }

    /// Give the session back to the host for persistence
    pub fn into_session(self) -> Box<dyn Session> {
        self.session
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn steps(&self) -> &StepRegistry {
        &self.steps
    }

    pub fn was_reset(&self) -> bool {
        self.was_reset
    }

    pub fn navigates_back(&self) -> bool {
        self.can_go_back
    }

    /// Configuration of `step`, or of the committed step
    pub fn step_config(&self, step: Option<u32>) -> Option<&StepConfig> {
        self.steps.get(step.unwrap_or_else(|| self.current_step()))
    }

    fn key(&self, field: &str) -> String {
        format!("{}.{}", self.namespace, field)
    }

    // --- values ------------------------------------------------------------

    /// Saved value, then flashed old input, then `default`
    pub fn get_value(&self, key: &str, default: Value) -> Value {
        self.session
            .get(&self.key(key))
            .or_else(|| self.session.old_input(key))
            .unwrap_or(default)
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.session.has(&self.key(key))
    }

    pub fn set_value(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let key = self.key(key);
        self.session.put(&key, value.into());
        self
    }

    /// Merge fields into the namespace
    pub fn save(&mut self, data: Map<String, Value>) -> &mut Self {
        let namespace = self.namespace.clone();
        self.session.merge(&namespace, data);
        self
    }

    /// Replace the namespace with `data` at step 1
    pub fn reset(&mut self, mut data: Map<String, Value>) -> &mut Self {
        data.insert(FORM_STEP.to_string(), json!(1));
        let namespace = self.namespace.clone();
        self.session.put(&namespace, Value::Object(data));
        self.was_reset = true;
        info!(namespace = %self.namespace, "Form reset to step 1");
        self
    }

    /// Raw snapshot of the namespace
    pub fn to_array(&self) -> Map<String, Value> {
        match self.session.get(&self.namespace) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Namespace snapshot as a JSON value
    pub fn to_collection(&self) -> Value {
        Value::Object(self.to_array())
    }

    // --- dispatch ----------------------------------------------------------

    /// Classify the request and run the matching transition
    pub fn handle(&mut self) -> Result<FormResponse, FormError> {
        self.setup_session();

        let kind = RequestKind::classify(
            self.request.as_ref(),
            self.current_step(),
            self.requested_step(),
        );
        debug!(
            namespace = %self.namespace,
            kind = kind.as_str(),
            current = self.current_step(),
            requested = self.requested_step(),
            "Dispatching form request"
        );

        match kind {
            RequestKind::Reset => self.handle_reset(),
            RequestKind::Modify => self.handle_modification(),
            RequestKind::Navigate => self.handle_navigation(),
            RequestKind::Show => self.handle_show(),
        }
    }

    fn setup_session(&mut self) {
        let key = self.key(FORM_STEP);
        let numeric = self
            .session
            .get(&key)
            .as_ref()
            .and_then(cursor::step_number)
            .is_some();
        if !numeric {
            self.session.put(&key, json!(1));
        }
    }

    fn handle_reset(&mut self) -> Result<FormResponse, FormError> {
        self.reset(Map::new());
        self.modification_response()
    }

    fn handle_modification(&mut self) -> Result<FormResponse, FormError> {
        let requested = self.requested_step();
        if let Some(response) = self.run_hooks(HookPhase::Before, requested)? {
            debug!(step = requested, "Before hook answered the request");
            return Ok(response);
        }

        if self.was_reset {
            return self.modification_response();
        }

        let validated = self.validate()?;
        self.handle_save(validated)?;

        let after_response = self.run_hooks(HookPhase::After, self.current_step())?;

        if self.was_reset {
            return match after_response {
                Some(response) => Ok(response),
                None => self.modification_response(),
            };
        }

        let is_last_step = self.is_last_step();
        if !is_last_step {
            self.increment_step();
        }

        if let Some(response) = after_response {
            return Ok(response);
        }

        if is_last_step {
            let completed = self.run_complete()?;
            info!(namespace = %self.namespace, "Form completed");
            self.reset(Map::new());
            if let Some(response) = completed {
                return Ok(response);
            }
        }

        self.modification_response()
    }

    fn handle_navigation(&mut self) -> Result<FormResponse, FormError> {
        let requested = self.requested_step();
        if self.can_go_back && self.is_past(requested, true, false) {
            info!(
                from = self.current_step(),
                to = requested,
                "Navigated back to earlier step"
            );
            self.set_value(FORM_STEP, requested);
        } else {
            debug!(
                current = self.current_step(),
                requested, "Ignored navigation request"
            );
        }
        self.modification_response()
    }

    fn handle_show(&mut self) -> Result<FormResponse, FormError> {
        match self.representation() {
            Representation::View => self.render_view(),
            Representation::Json => Ok(self.json_response()),
        }
    }

    /// Requested step's rules plus the `form_step` bound
    fn validate(&self) -> Result<Map<String, Value>, FormError> {
        let config = self.steps.get(self.requested_step());
        let mut rules = config.map(|c| c.rules.clone()).unwrap_or_default();
        let messages = config.map(|c| c.messages.clone()).unwrap_or_default();

        rules.insert(
            FORM_STEP.to_string(),
            vec![
                Rule::Required,
                Rule::Numeric,
                Rule::in_range(1..=self.next_accessible_step()),
            ],
        );

        self.request.validate(&rules, &messages).map_err(|errors| {
            debug!(fields = ?errors.fields().collect::<Vec<_>>(), "Step validation failed");
            FormError::Validation(errors)
        })
    }

    fn handle_save(&mut self, data: Map<String, Value>) -> Result<(), FormError> {
        let mut data = match &self.before_save {
            Some(transform) => transform(data).map_err(FormError::Hook)?,
            None => data,
        };
        if let Some(step) = data.get(FORM_STEP).and_then(cursor::step_number) {
            data.insert(FORM_STEP.to_string(), json!(step));
        }
        self.save(data);
        Ok(())
    }

    fn increment_step(&mut self) {
        if !self.is_step(self.last_step()) {
            let next = self.requested_step() + 1;
            info!(namespace = %self.namespace, step = next, "Advanced to next step");
            self.set_value(FORM_STEP, next);
        }
    }

    fn run_hooks(
        &mut self,
        phase: HookPhase,
        step: u32,
    ) -> Result<Option<FormResponse>, FormError> {
        for key in HookRegistry::lookup_order(step) {
            let hook = match phase {
                HookPhase::Before => self.before.get(key),
                HookPhase::After => self.after.get(key),
            };
            if let Some(hook) = hook {
                debug!(?phase, %key, "Running step hook");
                if let Some(response) = hook.call(self).map_err(FormError::Hook)? {
                    return Ok(Some(response));
                }
            }
        }
        Ok(None)
    }

    fn run_complete(&mut self) -> Result<Option<FormResponse>, FormError> {
        match self.on_complete.clone() {
            Some(hook) => hook.call(self).map_err(FormError::Hook),
            None => Ok(None),
        }
    }

    // --- responses ---------------------------------------------------------

    /// View for HTML clients when a view is set, JSON otherwise
    pub fn representation(&self) -> Representation {
        Representation::select(self.view.is_some(), self.request.wants_json())
    }

    /// Global data merged with the committed step's data, lazy entries
    /// resolved, then `overrides` on top
    pub fn get_data(&self, overrides: Map<String, Value>) -> Map<String, Value> {
        let mut merged = self.data.clone();
        if let Some(config) = self.step_config(None) {
            merged.extend(config.data.clone());
        }

        let mut resolved: Map<String, Value> = merged
            .iter()
            .map(|(key, value)| (key.clone(), value.resolve(self)))
            .collect();
        resolved.extend(overrides);
        resolved
    }

    fn json_response(&self) -> FormResponse {
        FormResponse::payload(Value::Object(self.get_data(Map::new())), self.to_collection())
    }

    /// Redirect back for HTML clients, the JSON payload otherwise
    fn modification_response(&self) -> Result<FormResponse, FormError> {
        Ok(match self.representation() {
            Representation::View => FormResponse::redirect(self.request.previous_url()),
            Representation::Json => self.json_response(),
        })
    }

    fn render_view(&self) -> Result<FormResponse, FormError> {
        let view = self.view.clone().unwrap_or_default();
        let renderer = self
            .renderer
            .as_ref()
            .ok_or_else(|| FormError::MissingRenderer { view: view.clone() })?;

        let mut overrides = Map::new();
        overrides.insert("form".to_string(), self.view_context());
        if let Some(errors) = self.session.flashed(ERRORS_KEY) {
            overrides.insert("errors".to_string(), errors);
        }

        let html = renderer.render(&view, &Value::Object(self.get_data(overrides)))?;
        Ok(FormResponse::Html(html))
    }

    /// What templates see as `form`
    pub fn view_context(&self) -> Value {
        let steps: Vec<Value> = self
            .steps
            .numbers()
            .map(|n| {
                json!({
                    "number": n,
                    "active": self.is_active(n, true, false),
                    "past": self.is_past(n, true, false),
                    "future": self.is_future(n, true, false),
                })
            })
            .collect();

        json!({
            "namespace": self.namespace,
            "current_step": self.current_step(),
            "last_step": self.last_step(),
            "is_last_step": self.is_last_step(),
            "can_navigate_back": self.can_go_back,
            "prev_step_url": self.prev_step_url(),
            "values": self.to_collection(),
            "old": self.session.flashed(OLD_INPUT_KEY).unwrap_or_else(|| json!({})),
            "steps": steps,
        })
    }
}

impl fmt::Debug for MultiStepForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiStepForm")
            .field("namespace", &self.namespace)
            .field("steps", &self.steps.numbers().collect::<Vec<_>>())
            .field("before", &self.before)
            .field("after", &self.after)
            .field("view", &self.view)
            .field("can_go_back", &self.can_go_back)
            .field("was_reset", &self.was_reset)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::InboundRequest;
    use crate::session::MemorySession;

    fn form(request: InboundRequest, session: MemorySession) -> MultiStepForm {
        let mut form = MultiStepForm::new(request, session);
        form.namespaced("test")
            .add_step(1, StepConfig::new().rule("name", "required").unwrap())
            .add_step(2, StepConfig::new().rule("role", "required").unwrap())
            .add_step(3, StepConfig::new());
        form
    }

    #[test]
    fn test_setup_normalises_missing_step() {
        let mut form = form(
            InboundRequest::get("http://localhost/").json(),
            MemorySession::new().with("test.form_step", json!("nope")),
        );
        form.handle().unwrap();
        assert_eq!(form.session().get("test.form_step"), Some(json!(1)));
    }

    #[test]
    fn test_get_value_falls_back_to_old_input_then_default() {
        let mut session = MemorySession::new().with("test.name", json!("saved"));
        session.flash("old_input", json!({"role": "typed"}));
        let session = MemorySession::from_attributes(session.into_attributes());

        let form = form(InboundRequest::get("http://localhost/"), session);
        assert_eq!(form.get_value("name", json!(null)), json!("saved"));
        assert_eq!(form.get_value("role", json!(null)), json!("typed"));
        assert_eq!(form.get_value("other", json!("dflt")), json!("dflt"));
        assert!(form.has_value("name"));
        assert!(!form.has_value("role"));
    }

    #[test]
    fn test_reset_keeps_only_payload() {
        let mut form = form(
            InboundRequest::get("http://localhost/"),
            MemorySession::new()
                .with("test.form_step", json!(3))
                .with("test.name", json!("John")),
        );
        let mut payload = Map::new();
        payload.insert("name".into(), json!("Updated"));
        payload.insert("form_step".into(), json!(7));
        form.reset(payload);

        assert!(form.was_reset());
        assert_eq!(form.to_collection(), json!({"name": "Updated", "form_step": 1}));
    }

    #[test]
    fn test_data_merge_order_and_override() {
        let mut form = form(
            InboundRequest::get("http://localhost/"),
            MemorySession::new().with("test.form_step", json!(1)),
        );
        form.data("title", "global")
            .data("description", "global")
            .add_step(
                1,
                StepConfig::new()
                    .data("description", "step")
                    .data("lazy", DataValue::lazy(|f| json!(format!("step {}", f.current_step())))),
            );

        let mut overrides = Map::new();
        overrides.insert("title".into(), json!("override"));
        let data = form.get_data(overrides);

        assert_eq!(data["title"], "override");
        assert_eq!(data["description"], "step");
        assert_eq!(data["lazy"], "step 1");
    }

    #[test]
    fn test_view_without_renderer_is_an_error() {
        let mut form = form(
            InboundRequest::get("http://localhost/"),
            MemorySession::new(),
        );
        form.view("form");
        assert!(matches!(
            form.handle(),
            Err(FormError::MissingRenderer { view }) if view == "form"
        ));
    }

    #[test]
    fn test_configure_from_config() {
        let mut form = form(InboundRequest::get("http://localhost/"), MemorySession::new());
        form.configure(&FormConfig {
            namespace: "checkout".into(),
            can_navigate_back: true,
        });
        assert_eq!(form.namespace(), "checkout");
        assert!(form.navigates_back());
    }

    #[test]
    fn test_step_config_defaults_to_committed_step() {
        let form = form(
            InboundRequest::get("http://localhost/"),
            MemorySession::new().with("test.form_step", json!(2)),
        );
        assert!(form.step_config(None).unwrap().rules.contains_key("role"));
        assert!(form.step_config(Some(1)).unwrap().rules.contains_key("name"));
        assert!(form.step_config(Some(9)).is_none());
    }
}
