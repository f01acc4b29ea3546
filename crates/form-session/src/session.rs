use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;

use form_spec::{
    Derivation, FieldOption, FormConfig, FormValues, OptionSets, OptionSource, RenderPayload,
    ValidationResult, build_render_payload, check, derive, find_form, flatten, initial_values,
    lookup, resolve_visibility,
};

use crate::error::SessionError;
use crate::lookup::{LookupRequest, OptionLookup};
use crate::resolver::{OptionState, ResolutionOutcome, ResolutionTask, dependency_token};
use crate::sink::{SubmissionRecord, SubmissionSink};
use crate::source::ConfigSource;

/// Where a loaded session stands. Loading has no phase: a session only exists
/// once its configuration is available.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    Ready,
    Submitting,
    Succeeded(SubmissionRecord),
    /// The sink rejected the last attempt; values are kept for a retry.
    Failed(String),
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Ready => "ready",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Succeeded(_) => "succeeded",
            SessionPhase::Failed(_) => "failed",
        }
    }
}

/// Result of a submit that reached validation.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(SubmissionRecord),
    /// Validation failed; the sink was not called.
    Invalid(ValidationResult),
}

/// Editing state of one form: the values, the options of dependent selects and
/// the derivation that follows them.
pub struct FormSession {
    form: FormConfig,
    values: FormValues,
    options: BTreeMap<String, OptionState>,
    derivation: Derivation,
    queued: Vec<ResolutionTask>,
    next_generation: u64,
    last_validation: Option<ValidationResult>,
    phase: SessionPhase,
    lookup: Arc<dyn OptionLookup>,
    sink: Arc<dyn SubmissionSink>,
}

impl std::fmt::Debug for FormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSession")
            .field("form", &self.form.id)
            .field("phase", &self.phase)
            .field("values", &self.values)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl FormSession {
    /// Loads `form_id` from `source` and starts a session on its default values.
    pub async fn load(
        source: &dyn ConfigSource,
        form_id: &str,
        lookup: Arc<dyn OptionLookup>,
        sink: Arc<dyn SubmissionSink>,
    ) -> Result<Self, SessionError> {
        let forms = source.load_forms().await?;
        let form = find_form(&forms, form_id)
            .cloned()
            .ok_or_else(|| SessionError::FormNotFound(form_id.to_string()))?;
        let session = Self::new(form, lookup, sink)?;
        tracing::info!(form = form_id, "form session ready");
        Ok(session)
    }

    pub fn new(
        form: FormConfig,
        lookup: Arc<dyn OptionLookup>,
        sink: Arc<dyn SubmissionSink>,
    ) -> Result<Self, SessionError> {
        check(&form)?;
        let values = initial_values(&form);
        let mut session = Self {
            form,
            values,
            options: BTreeMap::new(),
            derivation: Derivation::default(),
            queued: Vec::new(),
            next_generation: 0,
            last_validation: None,
            phase: SessionPhase::Ready,
            lookup,
            sink,
        };
        session.refresh();
        Ok(session)
    }

    pub fn form(&self) -> &FormConfig {
        &self.form
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn derivation(&self) -> &Derivation {
        &self.derivation
    }

    pub fn last_validation(&self) -> Option<&ValidationResult> {
        self.last_validation.as_ref()
    }

    pub fn is_visible(&self, field_id: &str) -> bool {
        self.derivation.is_visible(field_id)
    }

    /// Sets a leaf value and re-derives everything that depends on it.
    pub fn set_value(&mut self, field_id: &str, value: Value) -> Result<(), SessionError> {
        self.ensure_editable(field_id)?;
        self.values.insert(field_id.to_string(), value);
        self.after_edit();
        Ok(())
    }

    pub fn clear_value(&mut self, field_id: &str) -> Result<(), SessionError> {
        self.ensure_editable(field_id)?;
        self.values.remove(field_id);
        self.after_edit();
        Ok(())
    }

    /// Options currently offered by a choice field. Dynamic selects offer
    /// nothing until their lookup has resolved.
    pub fn options(&self, field_id: &str) -> &[FieldOption] {
        match lookup(self.form.top_level_fields(), field_id).and_then(|f| f.option_source()) {
            Some(OptionSource::Static(options)) => options,
            Some(OptionSource::Dynamic(_)) => self
                .options
                .get(field_id)
                .map(OptionState::options)
                .unwrap_or(&[]),
            None => &[],
        }
    }

    pub fn option_state(&self, field_id: &str) -> Option<&OptionState> {
        self.options.get(field_id)
    }

    pub fn is_busy(&self, field_id: &str) -> bool {
        self.options
            .get(field_id)
            .is_some_and(OptionState::is_pending)
    }

    pub fn busy_fields(&self) -> BTreeSet<String> {
        self.options
            .iter()
            .filter(|(_, state)| state.is_pending())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Hands out the lookups queued by the last edits. Their outcomes go back
    /// through [`FormSession::apply`].
    pub fn take_pending(&mut self) -> Vec<ResolutionTask> {
        std::mem::take(&mut self.queued)
    }

    /// Stores a finished lookup. Returns `false` when the outcome belongs to a
    /// superseded request and was dropped.
    pub fn apply(&mut self, outcome: ResolutionOutcome) -> bool {
        let current = self.options.get(&outcome.field_id);
        let expected = matches!(
            current,
            Some(OptionState::Pending { token, generation })
                if *generation == outcome.generation && *token == outcome.token
        );
        if !expected {
            tracing::debug!(
                field = %outcome.field_id,
                generation = outcome.generation,
                "discarding stale option response"
            );
            return false;
        }

        let state = match outcome.result {
            Ok(options) => {
                tracing::debug!(field = %outcome.field_id, options = options.len(), "options resolved");
                OptionState::Ready {
                    token: outcome.token,
                    options,
                }
            }
            Err(err) => {
                tracing::warn!(field = %outcome.field_id, error = %err, "option lookup failed; showing no options");
                OptionState::Failed {
                    token: outcome.token,
                    error: err.to_string(),
                }
            }
        };
        self.options.insert(outcome.field_id, state);
        self.rederive();
        true
    }

    /// Runs every queued lookup concurrently and applies the outcomes.
    pub async fn resolve_pending(&mut self) {
        let tasks = self.take_pending();
        if tasks.is_empty() {
            return;
        }
        let lookup = Arc::clone(&self.lookup);
        let outcomes = join_all(tasks.into_iter().map(|task| task.run(lookup.as_ref()))).await;
        for outcome in outcomes {
            self.apply(outcome);
        }
    }

    /// Requests options again for visible dynamic selects whose last lookup
    /// failed, or whose lookup was handed out by [`FormSession::take_pending`]
    /// and has not come back. The fresh generation makes any late outcome of
    /// the earlier request stale.
    pub fn retry_lookups(&mut self) {
        let stale: Vec<(String, Value)> = self
            .options
            .iter()
            .filter(|(id, _)| self.derivation.is_visible(id))
            .filter(|(id, state)| match state {
                OptionState::Failed { .. } => true,
                OptionState::Pending { .. } => {
                    !self.queued.iter().any(|task| &task.field_id == *id)
                }
                OptionState::Idle | OptionState::Ready { .. } => false,
            })
            .filter_map(|(id, state)| Some((id.clone(), state.token()?.clone())))
            .collect();
        if stale.is_empty() {
            return;
        }
        for (field_id, token) in stale {
            let Some(descriptor) =
                lookup(self.form.top_level_fields(), &field_id).and_then(|f| f.dynamic_options())
            else {
                continue;
            };
            let request = LookupRequest::new(descriptor, token);
            tracing::debug!(field = %field_id, "retrying option lookup");
            self.queue_lookup(field_id, request);
        }
        self.rederive();
    }

    /// Abandons queued and in-flight lookups. Their fields go back to idle and
    /// are requested again on the next edit.
    pub fn cancel_pending(&mut self) {
        self.queued.clear();
        for state in self.options.values_mut() {
            if state.is_pending() {
                *state = OptionState::Idle;
            }
        }
        self.rederive();
    }

    /// Validates the latest values and, when they pass, hands the visible ones
    /// to the submission sink.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, SessionError> {
        if let SessionPhase::Succeeded(_) | SessionPhase::Submitting = self.phase {
            return Err(SessionError::NotReady(self.phase.name()));
        }
        self.refresh();
        self.retry_lookups();
        self.resolve_pending().await;
        self.phase = SessionPhase::Submitting;

        let cleaned = match self.derivation.schema.apply(&self.values) {
            Ok(cleaned) => cleaned,
            Err(result) => {
                tracing::debug!(
                    form = %self.form.id,
                    errors = result.errors.len(),
                    "submission blocked by validation"
                );
                self.last_validation = Some(result.clone());
                self.phase = SessionPhase::Ready;
                return Ok(SubmitOutcome::Invalid(result));
            }
        };
        self.last_validation = None;

        match self.sink.submit(&self.form.id, &cleaned).await {
            Ok(id) => {
                let record = SubmissionRecord::new(id, self.form.id.clone(), cleaned);
                tracing::info!(form = %self.form.id, submission = %record.id, "form submitted");
                self.phase = SessionPhase::Succeeded(record.clone());
                Ok(SubmitOutcome::Submitted(record))
            }
            Err(err) => {
                tracing::warn!(form = %self.form.id, error = %err, "submission failed");
                self.phase = SessionPhase::Failed(err.to_string());
                Err(SessionError::Submission(err))
            }
        }
    }

    /// Starts over on the default values.
    pub fn reset(&mut self) {
        self.values = initial_values(&self.form);
        self.options.clear();
        self.queued.clear();
        self.last_validation = None;
        self.phase = SessionPhase::Ready;
        self.refresh();
    }

    pub fn render_payload(&self) -> RenderPayload {
        let mut payload = build_render_payload(&self.form, &self.values, &self.derivation);
        payload.mark_busy(&self.busy_fields());
        if let Some(result) = &self.last_validation {
            payload.annotate(result);
        }
        payload
    }

    fn ensure_editable(&self, field_id: &str) -> Result<(), SessionError> {
        if let SessionPhase::Succeeded(_) | SessionPhase::Submitting = self.phase {
            return Err(SessionError::NotReady(self.phase.name()));
        }
        if lookup(self.form.top_level_fields(), field_id).is_none() {
            return Err(SessionError::UnknownField(field_id.to_string()));
        }
        Ok(())
    }

    fn after_edit(&mut self) {
        if let SessionPhase::Failed(_) = self.phase {
            self.phase = SessionPhase::Ready;
        }
        self.refresh();
    }

    /// Visibility first, then dependent options, then the schema.
    fn refresh(&mut self) {
        let visibility = resolve_visibility(&self.form, &self.values);
        self.sync_options(&visibility);
        self.rederive();
    }

    fn rederive(&mut self) {
        self.derivation = derive(&self.form, &self.values, &self.option_sets());
    }

    fn option_sets(&self) -> OptionSets {
        self.options
            .iter()
            .filter(|(_, state)| !state.is_pending())
            .map(|(id, state)| (id.clone(), state.options().to_vec()))
            .collect()
    }

    /// Invalidates dynamic selects whose dependency value changed and queues a
    /// lookup for the visible ones.
    fn sync_options(&mut self, visibility: &BTreeMap<String, bool>) {
        let mut requests = Vec::new();
        for flat in flatten(self.form.top_level_fields()) {
            let Some(descriptor) = flat.field.dynamic_options() else {
                continue;
            };
            let token = dependency_token(descriptor, &self.values);
            let state = self.options.get(&flat.id).cloned().unwrap_or_default();
            if token.as_ref() == state.token() {
                continue;
            }
            let visible = visibility.get(&flat.id).copied().unwrap_or(false);
            match token {
                Some(token) if visible => {
                    requests.push((flat.id.clone(), LookupRequest::new(descriptor, token)));
                }
                _ => {
                    if state != OptionState::Idle {
                        tracing::debug!(field = %flat.id, "dependency changed; options cleared");
                    }
                    self.options.insert(flat.id.clone(), OptionState::Idle);
                    self.queued.retain(|task| task.field_id != flat.id);
                }
            }
        }

        for (field_id, request) in requests {
            self.queue_lookup(field_id, request);
        }
    }

    fn queue_lookup(&mut self, field_id: String, request: LookupRequest) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let token = request.value.clone();
        tracing::debug!(field = %field_id, generation, "queued option lookup");
        self.queued.retain(|task| task.field_id != field_id);
        self.options.insert(
            field_id.clone(),
            OptionState::Pending {
                token: token.clone(),
                generation,
            },
        );
        self.queued.push(ResolutionTask {
            field_id,
            token,
            generation,
            request,
        });
    }
}
