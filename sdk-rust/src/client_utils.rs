use crate::LanguageModelError;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{stream::StreamExt, Stream};
use reqwest::{header::HeaderMap, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::pin::Pin;

pub type ChunkStream<R> = Pin<Box<dyn Stream<Item = Result<R, LanguageModelError>> + Send>>;

/// Post a JSON request whose response is an SSE stream and parse every event
/// as a JSON chunk of type `R`.
/// Fails before streaming on a non-success status code; the body is kept as
/// the error message. Empty events are skipped and "[DONE]" ends the stream.
pub async fn send_sse_stream<T: Serialize + ?Sized, R: DeserializeOwned + Send + 'static>(
    client: &Client,
    url: &str,
    data: &T,
    headers: HeaderMap,
    provider: &'static str,
) -> Result<ChunkStream<R>, LanguageModelError> {
    let response = client.post(url).headers(headers).json(data).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(provider, %status, "stream request rejected");
        return Err(LanguageModelError::StatusCode(status, body));
    }

    let mut events = response.bytes_stream().eventsource();

    let stream = async_stream::try_stream! {
        while let Some(event) = events.next().await {
            let event = event.map_err(|error| map_event_error(error, provider))?;

            if event.data.is_empty() {
                continue;
            }
            if event.data == "[DONE]" {
                break;
            }

            let chunk: R = serde_json::from_str(&event.data).map_err(|e| {
                LanguageModelError::Invariant(
                    provider,
                    format!("Failed to parse stream chunk: {e}"),
                )
            })?;

            yield chunk;
        }
    };

    Ok(Box::pin(stream))
}

fn map_event_error(
    error: EventStreamError<reqwest::Error>,
    provider: &'static str,
) -> LanguageModelError {
    match error {
        EventStreamError::Utf8(_) => LanguageModelError::Invariant(
            provider,
            "Receive invalid UTF-8 sequence for stream data".to_string(),
        ),
        EventStreamError::Parser(error) => LanguageModelError::Invariant(
            provider,
            format!("Receive invalid EventStream data: {error}"),
        ),
        EventStreamError::Transport(error) => LanguageModelError::Transport(error),
    }
}
