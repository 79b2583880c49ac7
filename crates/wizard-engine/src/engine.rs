use std::sync::Arc;

use tracing::{debug, info, warn};
use wizard_spec::{
    FieldErrors, FieldValue, FormData, Progress, StepId, StepTable, WizardSchema, progress,
    validate_visible_steps,
};

use crate::completion::CompletionHandler;
use crate::config::{EngineConfig, SubmitPolicy};
use crate::error::EngineError;
use crate::navigation;
use crate::persistence::{DraftStore, MemoryStore, PersistenceAdapter, Snapshot};
use crate::state::{FormState, Intent, Outcome, StepView};

/// Collects the inputs of a [`FormEngine`].
pub struct EngineBuilder {
    table: StepTable,
    completion: Arc<dyn CompletionHandler>,
    store: Option<Box<dyn PersistenceAdapter>>,
    defaults: FormData,
    overrides: FormData,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new(table: StepTable, completion: Arc<dyn CompletionHandler>) -> Self {
        Self {
            table,
            completion,
            store: None,
            defaults: FormData::new(),
            overrides: FormData::new(),
            config: EngineConfig::default(),
        }
    }

    /// Builds the step table from `schema` and seeds its declared defaults.
    pub fn from_schema(
        schema: &WizardSchema,
        completion: Arc<dyn CompletionHandler>,
    ) -> Result<Self, EngineError> {
        let table = StepTable::from_schema(schema)?;
        Ok(Self::new(table, completion).defaults(schema.defaults()))
    }

    pub fn defaults(mut self, defaults: FormData) -> Self {
        self.defaults.merge(&defaults);
        self
    }

    /// Values from the identity source; they beat a resumed draft.
    pub fn overrides(mut self, overrides: FormData) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn store(mut self, store: impl PersistenceAdapter + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Resumes a stored draft if one is readable. Never fails on the store.
    pub fn build(self) -> FormEngine {
        let adapter = self
            .store
            .unwrap_or_else(|| Box::new(MemoryStore::new()));
        let drafts = DraftStore::new(adapter, self.config.namespace.clone(), self.config.persist);

        let mut data = self.defaults;
        let mut resume_at = 1;
        if let Some(snapshot) = drafts.load() {
            let last = self.table.len();
            resume_at = snapshot.current_step_id.clamp(1, last);
            if resume_at != snapshot.current_step_id {
                warn!(
                    recorded = snapshot.current_step_id,
                    resumed = resume_at,
                    "draft step out of range; clamped"
                );
            }
            data.merge(&snapshot.data);
            debug!(step = resume_at, fields = snapshot.data.len(), "resumed draft");
        }
        data.merge(&self.overrides);

        let mut engine = FormEngine {
            table: self.table,
            drafts,
            completion: self.completion,
            submit_policy: self.config.submit_policy,
            state: FormState::new(1, data),
        };
        engine.jump(resume_at);
        engine
    }
}

/// The wizard state machine.
pub struct FormEngine {
    table: StepTable,
    drafts: DraftStore,
    completion: Arc<dyn CompletionHandler>,
    submit_policy: SubmitPolicy,
    state: FormState,
}

impl FormEngine {
    pub fn builder(table: StepTable, completion: Arc<dyn CompletionHandler>) -> EngineBuilder {
        EngineBuilder::new(table, completion)
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn data(&self) -> &FormData {
        &self.state.data
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.state.errors
    }

    pub fn current_step(&self) -> StepId {
        self.state.current_step_id
    }

    pub fn is_complete(&self) -> bool {
        self.state.complete
    }

    pub fn table(&self) -> &StepTable {
        &self.table
    }

    pub fn dispatch(&mut self, intent: Intent) -> Result<Outcome, EngineError> {
        self.ensure_idle()?;
        debug!(intent = intent.name(), step = self.state.current_step_id, "dispatch");
        match intent {
            Intent::UpdateField { field, value } => Ok(self.apply_update(field, value)),
            Intent::Advance => Ok(self.apply_advance()),
            Intent::Retreat => Ok(self.apply_retreat()),
            Intent::Goto(id) => {
                if !self.table.contains(id) {
                    return Err(EngineError::UnknownStep(id));
                }
                let from = self.jump(id);
                Ok(Outcome::Moved { from, to: id })
            }
        }
    }

    pub fn update_field(
        &mut self,
        field: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<Outcome, EngineError> {
        self.dispatch(Intent::update(field, value))
    }

    pub fn advance(&mut self) -> Result<Outcome, EngineError> {
        self.dispatch(Intent::Advance)
    }

    pub fn retreat(&mut self) -> Result<Outcome, EngineError> {
        self.dispatch(Intent::Retreat)
    }

    pub fn goto(&mut self, id: StepId) -> Result<Outcome, EngineError> {
        self.dispatch(Intent::Goto(id))
    }

    /// Validates per the submit policy, then hands the record to the
    /// completion handler. On rejection the draft is kept so the user can
    /// retry from the same step.
    pub async fn submit(&mut self) -> Result<Outcome, EngineError> {
        self.ensure_idle()?;
        let current = self.state.current_step_id;
        if navigation::next_visible(&self.table, current, &self.state.data).is_some() {
            return Err(EngineError::NotFinalStep(current));
        }
        if let Some((step, errors)) = self.submit_failure() {
            if step != current {
                self.jump(step);
                self.persist();
            }
            debug!(step, failing = errors.len(), "submit blocked by validation");
            self.state.errors = errors.clone();
            return Ok(Outcome::Invalid(errors));
        }

        let FormState {
            data, submitting, ..
        } = &mut self.state;
        let result = {
            let _in_flight = InFlight::start(submitting);
            self.completion.complete(data).await
        };

        match result {
            Ok(()) => {
                self.state.complete = true;
                self.state.errors.clear();
                self.drafts.clear();
                info!(step = current, fields = self.state.data.len(), "wizard complete");
                Ok(Outcome::Completed)
            }
            Err(err) => {
                warn!(step = current, error = %err, "completion handler rejected submission");
                Err(EngineError::Completion(err))
            }
        }
    }

    /// True when a visible step follows the current one.
    pub fn can_advance(&self) -> bool {
        self.is_idle()
            && navigation::next_visible(&self.table, self.current_step(), &self.state.data)
                .is_some()
    }

    /// True on the last visible step while idle.
    pub fn can_submit(&self) -> bool {
        self.is_idle()
            && navigation::next_visible(&self.table, self.current_step(), &self.state.data)
                .is_none()
    }

    pub fn progress(&self) -> Progress {
        progress(&self.table, self.current_step(), &self.state.data)
    }

    pub fn view(&self) -> StepView {
        let step = self.table.get(self.current_step());
        // Steps built from closures may not declare their fields; they keep
        // every error.
        let errors = self
            .state
            .errors
            .iter()
            .filter(|(path, _)| {
                step.is_none_or(|step| step.fields().is_empty() || step.owns_field(path))
            })
            .map(|(path, message)| (path.clone(), message.clone()))
            .collect();
        StepView {
            step_id: self.current_step(),
            title: step.map(|step| step.title().to_string()).unwrap_or_default(),
            progress: self.progress(),
            values: self.state.data.clone(),
            errors,
            can_advance: self.can_advance(),
            can_submit: self.can_submit(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            current_step_id: self.state.current_step_id,
            data: self.state.data.clone(),
        }
    }

    fn is_idle(&self) -> bool {
        !self.state.complete && !self.state.submitting
    }

    fn ensure_idle(&self) -> Result<(), EngineError> {
        if self.state.complete {
            return Err(EngineError::Completed);
        }
        if self.state.submitting {
            return Err(EngineError::Busy);
        }
        Ok(())
    }

    fn apply_update(&mut self, field: String, value: FieldValue) -> Outcome {
        debug!(field = %field, step = self.state.current_step_id, "field updated");
        self.state.data.set(field, value);
        self.state.errors.clear();
        self.persist();
        Outcome::Updated
    }

    fn apply_advance(&mut self) -> Outcome {
        let from = self.state.current_step_id;
        let result = self.table.validate(from, &self.state.data);
        if !result.is_valid() {
            let errors = result.into_errors();
            debug!(step = from, failing = errors.len(), "advance blocked by validation");
            self.state.errors = errors.clone();
            return Outcome::Invalid(errors);
        }
        let to = navigation::advance_target(&self.table, from, &self.state.data);
        self.jump(to);
        self.persist();
        Outcome::Moved { from, to }
    }

    fn apply_retreat(&mut self) -> Outcome {
        let from = self.state.current_step_id;
        let to = navigation::retreat_target(&self.table, from, &self.state.data);
        self.jump(to);
        self.persist();
        Outcome::Moved { from, to }
    }

    /// Moves without validation and returns the previous step.
    fn jump(&mut self, to: StepId) -> StepId {
        let from = self.state.current_step_id;
        self.state.current_step_id = to;
        self.state.errors.clear();
        if from != to {
            debug!(from, to, "step changed");
        }
        from
    }

    fn submit_failure(&self) -> Option<(StepId, FieldErrors)> {
        let current = self.state.current_step_id;
        let data = &self.state.data;
        let current_failure = || {
            let result = self.table.validate(current, data);
            (!result.is_valid()).then(|| (current, result.into_errors()))
        };
        match self.submit_policy {
            SubmitPolicy::CurrentStep => current_failure(),
            SubmitPolicy::AllVisibleSteps => validate_visible_steps(&self.table, data)
                .into_iter()
                .next()
                .or_else(current_failure),
        }
    }

    fn persist(&self) {
        if self.state.complete {
            return;
        }
        self.drafts.save(&self.snapshot());
    }
}

/// Holds `submitting` high for the lifetime of a completion call, including
/// when the submit future is dropped before it resolves.
struct InFlight<'a> {
    flag: &'a mut bool,
}

impl<'a> InFlight<'a> {
    fn start(flag: &'a mut bool) -> Self {
        *flag = true;
        Self { flag }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.flag = false;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wizard_spec::{StepDefinition, ValidationResult};

    use super::*;
    use crate::completion::MockCompletionHandler;
    use crate::config::DEFAULT_NAMESPACE;

    fn table() -> StepTable {
        StepTable::new(vec![
            StepDefinition::new(1).with_fields(["name"]).with_validator(|data| {
                if data.is_set("name") {
                    ValidationResult::ok()
                } else {
                    ValidationResult::ok().with_error("name", "Name is required")
                }
            }),
            StepDefinition::new(2)
                .with_fields(["terms"])
                .with_validator(|data| {
                    if data.get("terms").and_then(FieldValue::as_bool) == Some(true) {
                        ValidationResult::ok()
                    } else {
                        ValidationResult::ok().with_error("terms", "Accept the terms")
                    }
                }),
        ])
        .expect("table")
    }

    fn engine_with(handler: MockCompletionHandler, store: MemoryStore) -> FormEngine {
        FormEngine::builder(table(), Arc::new(handler))
            .store(store)
            .build()
    }

    #[tokio::test]
    async fn completion_runs_once_and_clears_the_draft() {
        let mut handler = MockCompletionHandler::new();
        handler
            .expect_complete()
            .withf(|data| data.get("name").and_then(FieldValue::as_str) == Some("Ada"))
            .times(1)
            .returning(|_| Ok(()));
        let store = MemoryStore::new();
        let mut engine = engine_with(handler, store.clone());

        engine.update_field("name", "Ada").expect("update");
        engine.advance().expect("advance");
        engine.update_field("terms", true).expect("update");
        assert!(store.get(DEFAULT_NAMESPACE).is_some());

        assert_eq!(engine.submit().await.expect("submit"), Outcome::Completed);
        assert!(engine.is_complete());
        assert!(!engine.state().submitting);
        assert!(store.get(DEFAULT_NAMESPACE).is_none());

        assert!(matches!(engine.submit().await, Err(EngineError::Completed)));
        assert!(matches!(engine.advance(), Err(EngineError::Completed)));
        assert!(matches!(
            engine.update_field("name", "Bob"),
            Err(EngineError::Completed)
        ));
        assert!(!engine.can_submit());
    }

    #[tokio::test]
    async fn rejected_completion_keeps_the_draft_for_retry() {
        let mut handler = MockCompletionHandler::new();
        let mut attempts = 0;
        handler.expect_complete().times(2).returning(move |_| {
            attempts += 1;
            if attempts == 1 {
                Err("upstream unavailable".into())
            } else {
                Ok(())
            }
        });
        let store = MemoryStore::new();
        let mut engine = engine_with(handler, store.clone());
        engine.update_field("name", "Ada").expect("update");
        engine.advance().expect("advance");
        engine.update_field("terms", true).expect("update");

        let err = engine.submit().await.expect_err("rejected");
        assert!(matches!(err, EngineError::Completion(_)));
        assert!(!engine.state().submitting);
        assert!(!engine.is_complete());
        assert_eq!(engine.current_step(), 2);
        let draft = Snapshot::parse(&store.get(DEFAULT_NAMESPACE).expect("draft")).expect("parse");
        assert_eq!(draft.current_step_id, 2);

        assert_eq!(engine.submit().await.expect("retry"), Outcome::Completed);
    }

    #[tokio::test]
    async fn invalid_submit_never_reaches_the_handler() {
        let mut handler = MockCompletionHandler::new();
        handler.expect_complete().times(0);
        let mut engine = engine_with(handler, MemoryStore::new());
        engine.update_field("name", "Ada").expect("update");
        engine.advance().expect("advance");

        let outcome = engine.submit().await.expect("submit");
        assert!(outcome.is_invalid());
        assert_eq!(engine.current_step(), 2);
        assert_eq!(
            engine.errors().get("terms").map(String::as_str),
            Some("Accept the terms")
        );
        assert!(!engine.state().submitting);
    }

    #[tokio::test]
    async fn submit_before_the_last_visible_step_is_refused() {
        let mut handler = MockCompletionHandler::new();
        handler.expect_complete().times(0);
        let mut engine = engine_with(handler, MemoryStore::new());
        engine.update_field("name", "Ada").expect("update");
        assert!(matches!(
            engine.submit().await,
            Err(EngineError::NotFinalStep(1))
        ));
        assert!(engine.can_advance());
        assert!(!engine.can_submit());
    }

    #[tokio::test]
    async fn dropping_an_inflight_submit_resets_the_flag() {
        let handler = crate::completion_fn(|_| async {
            std::future::pending::<()>().await;
            Ok::<(), crate::CompletionError>(())
        });
        let mut engine = FormEngine::builder(table(), Arc::new(handler)).build();
        engine.update_field("name", "Ada").expect("update");
        engine.advance().expect("advance");
        engine.update_field("terms", true).expect("update");

        let timed_out = tokio::time::timeout(Duration::from_millis(20), engine.submit()).await;
        assert!(timed_out.is_err());
        assert!(!engine.state().submitting);
        assert!(!engine.is_complete());
        assert!(engine.can_submit());
    }

    #[tokio::test]
    async fn all_visible_policy_sends_the_user_back_to_the_failing_step() {
        let mut handler = MockCompletionHandler::new();
        handler.expect_complete().times(0);
        let store = MemoryStore::new();
        store.insert(
            DEFAULT_NAMESPACE,
            r#"{"currentStepId":2,"data":{"terms":true}}"#,
        );
        let mut engine = FormEngine::builder(table(), Arc::new(handler))
            .store(store.clone())
            .config(EngineConfig::default().with_submit_policy(SubmitPolicy::AllVisibleSteps))
            .build();
        assert_eq!(engine.current_step(), 2);

        let outcome = engine.submit().await.expect("submit");
        assert!(outcome.is_invalid());
        assert_eq!(engine.current_step(), 1);
        assert!(engine.errors().contains_key("name"));
        let draft = Snapshot::parse(&store.get(DEFAULT_NAMESPACE).expect("draft")).expect("parse");
        assert_eq!(draft.current_step_id, 1);
    }

    #[test]
    fn view_scopes_errors_to_the_current_step() {
        let mut engine = engine_with(MockCompletionHandler::new(), MemoryStore::new());
        assert!(engine.advance().expect("advance").is_invalid());
        let view = engine.view();
        assert_eq!(view.step_id, 1);
        assert_eq!(view.errors.len(), 1);
        assert!(view.can_advance);

        engine.goto(2).expect("goto");
        assert!(engine.view().errors.is_empty());
        assert!(matches!(engine.goto(3), Err(EngineError::UnknownStep(3))));
        assert!(matches!(engine.goto(0), Err(EngineError::UnknownStep(0))));
    }

    #[test]
    fn view_keeps_errors_of_steps_without_a_field_list() {
        let table = StepTable::new(vec![
            StepDefinition::new(1).with_validator(|data| {
                if data.is_set("email") {
                    ValidationResult::ok()
                } else {
                    ValidationResult::ok().with_error("email", "email is required")
                }
            }),
            StepDefinition::new(2),
        ])
        .expect("table");
        let mut engine = FormEngine::builder(table, Arc::new(MockCompletionHandler::new())).build();

        assert!(engine.advance().expect("advance").is_invalid());
        let view = engine.view();
        assert_eq!(view.step_id, 1);
        assert_eq!(
            view.errors.get("email").map(String::as_str),
            Some("email is required")
        );
        assert_eq!(view.errors, engine.errors().clone());
    }
}
