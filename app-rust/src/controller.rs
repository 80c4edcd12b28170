use crate::{
    attachment::ImageAttachment,
    catalog::{Catalog, Language, TaskType},
    prompt::{compose, validate_submission},
    render::{render, RenderedDocument},
    storage::KeyValueStore,
    stream::{accumulate, DocumentEvent, DocumentStream, StreamedDocument},
    suggestions::{Filter, SearchableItem, SuggestionCategory, SuggestionIndex},
    versions::{ScriptVersion, VersionStore},
    AppError, AppResult,
};
use futures::StreamExt;
use logicleap_sdk::{LanguageModel, ModelUsage};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing_futures::Instrument;

/// Everything the user sees and edits.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub task: TaskType,
    pub language: Language,
    pub user_input: String,
    pub image: Option<ImageAttachment>,
    pub result: StreamedDocument,
    pub is_loading: bool,
    /// Message of the last failure, ready for display.
    pub error: Option<String>,
    pub search_query: String,
    pub type_filter: Filter<SuggestionCategory>,
    pub language_filter: Filter<Language>,
    pub last_usage: Option<ModelUsage>,
}

/// A started request. Feed its events back through [`Controller::apply`].
pub struct Submission {
    pub generation: u64,
    pub events: DocumentStream,
}

/// Owns the application state. Every change goes through one of its
/// methods.
pub struct Controller {
    state: AppState,
    model: Arc<dyn LanguageModel>,
    catalog: Catalog,
    suggestions: SuggestionIndex,
    versions: VersionStore,
    stream_timeout: Option<Duration>,
    generation: u64,
    cancel: Option<CancellationToken>,
    /// Error that ended the last stream, kept until taken.
    failure: Option<AppError>,
}

impl Controller {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        catalog: Catalog,
        store: Arc<dyn KeyValueStore>,
        stream_timeout: Option<Duration>,
    ) -> Self {
        let suggestions = SuggestionIndex::from_catalog(&catalog);
        let versions = VersionStore::open(store);
        Self {
            state: AppState::default(),
            model,
            catalog,
            suggestions,
            versions,
            stream_timeout,
            generation: 0,
            cancel: None,
            failure: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn versions(&self) -> &[ScriptVersion] {
        self.versions.list()
    }

    #[must_use]
    pub fn version_load_error(&self) -> Option<&AppError> {
        self.versions.load_error()
    }

    /// The current result as blocks, with the cursor while loading.
    #[must_use]
    pub fn rendered(&self) -> RenderedDocument {
        render(self.state.result.text(), self.state.is_loading)
    }

    pub fn set_task(&mut self, task: TaskType) {
        self.state.task = task;
    }

    pub fn set_language(&mut self, language: Language) {
        self.state.language = language;
    }

    pub fn set_user_input(&mut self, text: impl Into<String>) {
        self.state.user_input = text.into();
    }

    /// Attaching an image starts over: the previous result and error go.
    pub fn attach_image(&mut self, image: ImageAttachment) {
        self.state.error = None;
        self.state.result = StreamedDocument::default();
        self.state.image = Some(image);
    }

    pub fn remove_image(&mut self) {
        self.state.image = None;
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.state.search_query = query.into();
    }

    pub fn set_filters(
        &mut self,
        type_filter: Filter<SuggestionCategory>,
        language_filter: Filter<Language>,
    ) {
        self.state.type_filter = type_filter;
        self.state.language_filter = language_filter;
    }

    /// Suggestions for the current search query and filters.
    #[must_use]
    pub fn suggestions(&self) -> Vec<&SearchableItem> {
        self.suggestions.query(
            &self.state.search_query,
            self.state.type_filter,
            self.state.language_filter,
        )
    }

    /// Use a suggestion as the input. Scripts switch the task to Explain.
    pub fn select_suggestion(&mut self, item: SearchableItem) {
        self.state.user_input = item.text;
        self.state.language = item.language;
        if item.category != SuggestionCategory::Example {
            self.state.task = TaskType::Explain;
        }
        self.state.search_query.clear();
        self.state.image = None;
    }

    pub fn select_example(&mut self, text: impl Into<String>, language: Language) {
        self.state.user_input = text.into();
        self.state.language = language;
        self.state.image = None;
    }

    /// Use a ready-made script as the input, to be explained.
    pub fn select_script(&mut self, script: impl Into<String>, language: Language) {
        self.state.user_input = script.into();
        self.state.language = language;
        self.state.task = TaskType::Explain;
        self.state.image = None;
    }

    /// Start a request for the current input. Any running request is
    /// cancelled and its remaining events will be ignored.
    pub async fn submit(&mut self) -> AppResult<Submission> {
        if let Err(error) = validate_submission(&self.state.user_input, self.state.image.as_ref()) {
            self.state.error = Some(error.display_message());
            return Err(error);
        }

        self.cancel_stream();
        self.generation += 1;
        let generation = self.generation;

        self.state.is_loading = true;
        self.state.error = None;
        self.state.result = StreamedDocument::default();
        self.state.last_usage = None;
        self.failure = None;

        let request = compose(
            self.state.task.label(),
            self.state.language.label(),
            &self.state.user_input,
            self.state.image.clone(),
        );

        tracing::info!(
            generation,
            task = self.state.task.value(),
            language = self.state.language.label(),
            has_image = request.image.is_some(),
            "submitting request"
        );

        let model_stream = match self.model.stream(request.into_input()).await {
            Ok(stream) => stream,
            Err(error) => {
                let error = AppError::from(error);
                self.state.is_loading = false;
                self.state.result = StreamedDocument::complete("");
                self.state.error = Some(error.display_message());
                return Err(error);
            }
        };

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let span = tracing::info_span!("logicleap.submission", generation);
        let events = accumulate(model_stream, cancel, self.stream_timeout).instrument(span);

        Ok(Submission {
            generation,
            events: DocumentStream::from_stream(events),
        })
    }

    /// Fold one event into the state. Events of a superseded submission are
    /// dropped; returns whether the event was applied.
    pub fn apply(&mut self, generation: u64, event: DocumentEvent) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "stale event dropped");
            return false;
        }

        match event {
            DocumentEvent::Snapshot(document) => {
                self.state.result = document;
            }
            DocumentEvent::Completed { document, usage } => {
                self.state.result = document;
                self.state.last_usage = usage;
                self.finish_stream();
            }
            DocumentEvent::Failed { document, error } => {
                let error = AppError::from(error);
                tracing::warn!(%error, "request failed");
                self.state.result = document;
                self.state.error = Some(error.display_message());
                self.failure = Some(error);
                self.finish_stream();
            }
        }
        true
    }

    /// The error that ended the last stream, if it failed.
    pub fn take_failure(&mut self) -> Option<AppError> {
        self.failure.take()
    }

    /// Apply every event of `submission`, calling `on_update` after each one
    /// that changed the state.
    pub async fn drive<F>(&mut self, submission: Submission, mut on_update: F)
    where
        F: FnMut(&Self),
    {
        let Submission {
            generation,
            mut events,
        } = submission;
        while let Some(event) = events.next().await {
            if self.apply(generation, event) {
                on_update(self);
            }
        }
    }

    /// Stop the running request, keeping what was received.
    pub fn cancel(&mut self) {
        if self.cancel.is_none() {
            return;
        }
        self.cancel_stream();
        self.generation += 1;
        self.state.result = StreamedDocument::complete(self.state.result.text());
        self.state.is_loading = false;
    }

    pub fn save_version(&mut self) -> AppResult<Option<ScriptVersion>> {
        self.versions.save(
            &self.state.user_input,
            self.state.task,
            self.state.language,
            self.state.result.text(),
        )
    }

    /// Show a saved result. Returns `false` when the id is unknown.
    pub fn load_version(&mut self, id: &str) -> bool {
        let Some(result) = self.versions.get(id).map(|version| version.result.clone()) else {
            return false;
        };
        self.cancel();
        self.state.result = StreamedDocument::complete(result);
        true
    }

    pub fn delete_version(&mut self, id: &str) -> AppResult<bool> {
        self.versions.delete(id)
    }

    pub fn clear_history(&mut self) -> AppResult<()> {
        self.versions.clear()
    }

    fn cancel_stream(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }

    fn finish_stream(&mut self) {
        self.state.is_loading = false;
        self.cancel = None;
    }
}
