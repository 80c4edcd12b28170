use std::{collections::VecDeque, sync::Mutex};

use futures::{
    channel::mpsc::{self, UnboundedReceiver, UnboundedSender},
    stream, StreamExt,
};

use crate::{
    errors::{LanguageModelError, LanguageModelResult},
    language_model::{LanguageModel, LanguageModelStream},
    LanguageModelInput, PartialModelResponse,
};

/// Sending half of a [`MockStreamResult::channel`] stream. Each item sent is
/// yielded by the stream in order; dropping the sender ends the stream.
pub type MockStreamSender = UnboundedSender<LanguageModelResult<PartialModelResponse>>;

/// Result for a mocked `stream` call.
pub enum MockStreamResult {
    /// The stream yields the partials, then completes.
    Partials(Vec<PartialModelResponse>),
    /// The stream yields the partials, then fails with the error.
    PartialsThenError(Vec<PartialModelResponse>, LanguageModelError),
    /// The stream yields whatever the paired sender pushes, as it arrives.
    Channel(UnboundedReceiver<LanguageModelResult<PartialModelResponse>>),
    /// The `stream` call itself fails.
    Error(LanguageModelError),
}

impl MockStreamResult {
    /// Construct a result that yields the provided partial responses.
    pub fn partials(partials: Vec<PartialModelResponse>) -> Self {
        Self::Partials(partials)
    }

    /// Construct a result that yields one text partial per fragment.
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Partials(
            fragments
                .into_iter()
                .map(PartialModelResponse::text)
                .collect(),
        )
    }

    /// Construct a result that yields the partials and then breaks.
    pub fn partials_then_error(
        partials: Vec<PartialModelResponse>,
        error: LanguageModelError,
    ) -> Self {
        Self::PartialsThenError(partials, error)
    }

    /// Construct a result driven by the returned sender.
    pub fn channel() -> (MockStreamSender, Self) {
        let (sender, receiver) = mpsc::unbounded();
        (sender, Self::Channel(receiver))
    }

    /// Construct a result that fails the `stream` call.
    pub fn error(error: LanguageModelError) -> Self {
        Self::Error(error)
    }
}

impl From<Vec<PartialModelResponse>> for MockStreamResult {
    fn from(partials: Vec<PartialModelResponse>) -> Self {
        Self::partials(partials)
    }
}

impl From<PartialModelResponse> for MockStreamResult {
    fn from(partial: PartialModelResponse) -> Self {
        Self::partials(vec![partial])
    }
}

impl From<LanguageModelError> for MockStreamResult {
    fn from(error: LanguageModelError) -> Self {
        Self::error(error)
    }
}

#[derive(Default)]
struct MockLanguageModelState {
    mocked_stream_results: VecDeque<MockStreamResult>,
    tracked_stream_inputs: Vec<LanguageModelInput>,
}

impl MockLanguageModelState {
    fn enqueue_stream_result(&mut self, result: MockStreamResult) {
        self.mocked_stream_results.push_back(result);
    }

    fn reset(&mut self) {
        self.tracked_stream_inputs.clear();
    }

    fn restore(&mut self) {
        self.mocked_stream_results.clear();
        self.reset();
    }
}

/// A mock language model for testing that tracks inputs and yields predefined
/// outputs.
pub struct MockLanguageModel {
    provider: &'static str,
    model_id: String,
    state: Mutex<MockLanguageModelState>,
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self {
            provider: "mock",
            model_id: "mock-model".to_string(),
            state: Mutex::new(MockLanguageModelState::default()),
        }
    }
}

impl MockLanguageModel {
    /// Construct a new mock language model instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the provider identifier returned by the mock.
    pub fn set_provider(&mut self, provider: &'static str) {
        self.provider = provider;
    }

    /// Override the model identifier returned by the mock.
    pub fn set_model_id<S: Into<String>>(&mut self, model_id: S) {
        self.model_id = model_id.into();
    }

    /// Enqueue one or more mocked stream results.
    pub fn enqueue_stream_results<I>(&self, results: I) -> &Self
    where
        I: IntoIterator<Item = MockStreamResult>,
    {
        let mut state = self.state.lock().expect("mock state poisoned");
        for result in results {
            state.enqueue_stream_result(result);
        }
        drop(state);
        self
    }

    /// Convenience to enqueue a single mocked stream result.
    pub fn enqueue_stream<R>(&self, result: R) -> &Self
    where
        R: Into<MockStreamResult>,
    {
        self.enqueue_stream_results(std::iter::once(result.into()))
    }

    /// Retrieve the tracked stream inputs accumulated so far.
    pub fn tracked_stream_inputs(&self) -> Vec<LanguageModelInput> {
        let state = self.state.lock().expect("mock state poisoned");
        state.tracked_stream_inputs.clone()
    }

    /// Reset tracked inputs without touching enqueued results.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.reset();
    }

    /// Clear both tracked inputs and enqueued results.
    pub fn restore(&self) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.restore();
    }
}

#[async_trait::async_trait]
impl LanguageModel for MockLanguageModel {
    fn provider(&self) -> &'static str {
        self.provider
    }

    fn model_id(&self) -> String {
        self.model_id.clone()
    }

    async fn stream(&self, input: LanguageModelInput) -> LanguageModelResult<LanguageModelStream> {
        let mut state = self.state.lock().expect("mock state poisoned");

        let result = state.mocked_stream_results.pop_front().ok_or_else(|| {
            LanguageModelError::Invariant(
                self.provider,
                "no mocked stream results available".into(),
            )
        })?;

        state.tracked_stream_inputs.push(input);

        match result {
            MockStreamResult::Error(error) => Err(error),
            MockStreamResult::Partials(partials) => Ok(LanguageModelStream::from_stream(
                stream::iter(partials.into_iter().map(Ok)),
            )),
            MockStreamResult::PartialsThenError(partials, error) => {
                let items = partials
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error)));
                Ok(LanguageModelStream::from_stream(stream::iter(items)))
            }
            MockStreamResult::Channel(receiver) => {
                Ok(LanguageModelStream::from_stream(receiver.boxed()))
            }
        }
    }
}
