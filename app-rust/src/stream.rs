use crate::StreamError;
use futures::{Stream, StreamExt};
use logicleap_sdk::{
    LanguageModelResult, LanguageModelStream, ModelUsage, PartialModelResponse, StreamAccumulator,
};
use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio_util::sync::CancellationToken;

/// The response text received so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamedDocument {
    text: String,
    is_complete: bool,
}

impl StreamedDocument {
    #[must_use]
    pub fn streaming(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_complete: false,
        }
    }

    #[must_use]
    pub fn complete(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_complete: true,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug)]
pub enum DocumentEvent {
    /// One per fragment received; the text of every fragment so far.
    Snapshot(StreamedDocument),
    /// The backend finished the response.
    Completed {
        document: StreamedDocument,
        usage: Option<ModelUsage>,
    },
    /// The stream broke. `document` keeps everything received before the
    /// failure.
    Failed {
        document: StreamedDocument,
        error: StreamError,
    },
}

impl DocumentEvent {
    #[must_use]
    pub fn document(&self) -> &StreamedDocument {
        match self {
            Self::Snapshot(document)
            | Self::Completed { document, .. }
            | Self::Failed { document, .. } => document,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Snapshot(_))
    }
}

pub struct DocumentStream(Pin<Box<dyn Stream<Item = DocumentEvent> + Send>>);

impl DocumentStream {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = DocumentEvent> + Send + 'static,
    {
        Self(Box::pin(stream))
    }
}

impl Stream for DocumentStream {
    type Item = DocumentEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.as_mut().poll_next(cx)
    }
}

/// Fold a model stream into document snapshots.
///
/// Once `cancel` fires the stream ends without yielding anything further.
/// When `idle_timeout` is set and no fragment arrives within it, the stream
/// ends with [`StreamError::Timeout`].
#[must_use]
pub fn accumulate(
    model_stream: LanguageModelStream,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
) -> DocumentStream {
    let stream = async_stream::stream! {
        let mut model_stream = model_stream;
        let mut accumulator = StreamAccumulator::new();

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(fragments = accumulator.size(), "stream cancelled");
                    return;
                }
                next = next_partial(&mut model_stream, idle_timeout) => next,
            };

            match next {
                Ok(Some(Ok(partial))) => {
                    let text = accumulator.add_partial(&partial);
                    yield DocumentEvent::Snapshot(StreamedDocument::streaming(text));
                }
                Ok(Some(Err(error))) => {
                    tracing::debug!(%error, "stream failed");
                    yield DocumentEvent::Failed {
                        document: StreamedDocument::complete(accumulator.text()),
                        error: error.into(),
                    };
                    return;
                }
                Ok(None) => break,
                Err(timeout) => {
                    tracing::debug!(?timeout, "stream timed out");
                    yield DocumentEvent::Failed {
                        document: StreamedDocument::complete(accumulator.text()),
                        error: StreamError::Timeout(timeout),
                    };
                    return;
                }
            }
        }

        if cancel.is_cancelled() {
            return;
        }

        tracing::debug!(fragments = accumulator.size(), "stream completed");
        let response = accumulator.compute_response();
        yield DocumentEvent::Completed {
            document: StreamedDocument::complete(response.text),
            usage: response.usage,
        };
    };

    DocumentStream::from_stream(stream)
}

async fn next_partial(
    stream: &mut LanguageModelStream,
    idle_timeout: Option<Duration>,
) -> Result<Option<LanguageModelResult<PartialModelResponse>>, Duration> {
    match idle_timeout {
        Some(duration) => tokio::time::timeout(duration, stream.next())
            .await
            .map_err(|_| duration),
        None => Ok(stream.next().await),
    }
}
