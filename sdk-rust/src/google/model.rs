use super::api::{
    GenerationConfig, InlineData, RequestContent, RequestPart, StreamChunk, StreamRequest,
    UsageMetadata,
};
use crate::{
    client_utils, LanguageModel, LanguageModelError, LanguageModelInput, LanguageModelResult,
    LanguageModelStream, ModelUsage, Part, PartialModelResponse,
};
use async_stream::try_stream;
use futures::StreamExt;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use std::collections::HashMap;

const PROVIDER: &str = "google";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Finish reasons that mean the response was cut for policy reasons rather
/// than completed.
const BLOCKED_FINISH_REASONS: [&str; 4] = ["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

pub struct GoogleModel {
    model_id: String,
    api_key: String,
    base_url: String,
    client: Client,
    headers: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct GoogleModelOptions {
    pub api_key: String,
    pub base_url: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub client: Option<Client>,
}

impl GoogleModel {
    #[must_use]
    pub fn new(model_id: impl Into<String>, options: GoogleModelOptions) -> Self {
        let GoogleModelOptions {
            api_key,
            base_url,
            headers,
            client,
        } = options;

        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let client = client.unwrap_or_else(Client::new);
        let headers = headers.unwrap_or_default();

        Self {
            model_id: model_id.into(),
            api_key,
            base_url,
            client,
            headers,
        }
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model_id
        )
    }

    fn request_headers(&self) -> LanguageModelResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.api_key).map_err(|error| {
            LanguageModelError::InvalidInput(format!("Invalid Google API key: {error}"))
        })?;
        headers.insert(HeaderName::from_static("x-goog-api-key"), api_key);

        for (key, value) in &self.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|error| {
                LanguageModelError::InvalidInput(format!(
                    "Invalid Google header name '{key}': {error}"
                ))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|error| {
                LanguageModelError::InvalidInput(format!(
                    "Invalid Google header value for '{key}': {error}"
                ))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }
}

#[async_trait::async_trait]
impl LanguageModel for GoogleModel {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn model_id(&self) -> String {
        self.model_id.clone()
    }

    async fn stream(&self, input: LanguageModelInput) -> LanguageModelResult<LanguageModelStream> {
        crate::opentelemetry::trace_stream(
            self.provider(),
            &self.model_id(),
            input,
            |input| async move {
                let request = convert_to_stream_request(input)?;
                let headers = self.request_headers()?;

                let mut chunk_stream = client_utils::send_sse_stream::<_, StreamChunk>(
                    &self.client,
                    &self.stream_url(),
                    &request,
                    headers,
                    self.provider(),
                )
                .await?;

                let stream = try_stream! {
                    let mut last_usage: Option<ModelUsage> = None;

                    while let Some(chunk) = chunk_stream.next().await {
                        let chunk = chunk?;

                        if let Some(usage_metadata) = chunk.usage_metadata {
                            last_usage = Some(map_usage(usage_metadata));
                        }

                        if let Some(text) = chunk_text(chunk)? {
                            yield PartialModelResponse::text(text);
                        }
                    }

                    // Usage counts are cumulative, so only the final report is forwarded.
                    if let Some(usage) = last_usage {
                        yield PartialModelResponse::usage(usage);
                    }
                };

                Ok(LanguageModelStream::from_stream(stream))
            },
        )
        .await
    }
}

fn convert_to_stream_request(input: LanguageModelInput) -> LanguageModelResult<StreamRequest> {
    if input.content.is_empty() {
        return Err(LanguageModelError::InvalidInput(
            "Request content must not be empty".to_string(),
        ));
    }

    let generation_config = (input.temperature.is_some() || input.max_tokens.is_some()).then(|| {
        GenerationConfig {
            temperature: input.temperature,
            max_output_tokens: input.max_tokens,
        }
    });

    Ok(StreamRequest {
        contents: vec![RequestContent {
            role: "user",
            parts: input.content.into_iter().map(convert_part).collect(),
        }],
        system_instruction: input.system_prompt.map(|prompt| RequestContent {
            role: "system",
            parts: vec![RequestPart::Text(prompt)],
        }),
        generation_config,
    })
}

fn convert_part(part: Part) -> RequestPart {
    match part {
        Part::Text(text_part) => RequestPart::Text(text_part.text),
        Part::Image(image_part) => RequestPart::InlineData(InlineData {
            mime_type: image_part.mime_type,
            data: image_part.image_data,
        }),
    }
}

/// Answer text of one chunk, thought parts skipped. `None` when the chunk
/// carries no answer text.
fn chunk_text(chunk: StreamChunk) -> LanguageModelResult<Option<String>> {
    if let Some(feedback) = chunk.prompt_feedback {
        if let Some(reason) = feedback.block_reason {
            let message = match feedback.block_reason_message {
                Some(detail) => format!("Prompt blocked ({reason}) {detail}"),
                None => format!("Prompt blocked ({reason})"),
            };
            return Err(LanguageModelError::Refusal(message));
        }
    }

    let Some(candidate) = chunk.candidates.into_iter().next() else {
        return Ok(None);
    };

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if BLOCKED_FINISH_REASONS.contains(&reason) {
            return Err(LanguageModelError::Refusal(format!(
                "Response stopped by the provider ({reason})"
            )));
        }
    }

    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|part| !part.thought)
        .filter_map(|part| part.text)
        .collect();

    Ok((!text.is_empty()).then_some(text))
}

fn map_usage(usage: UsageMetadata) -> ModelUsage {
    ModelUsage {
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImagePart;
    use serde_json::json;

    fn chunk(value: serde_json::Value) -> StreamChunk {
        serde_json::from_value(value).expect("valid chunk")
    }

    #[test]
    fn converts_prompt_and_inline_image_into_single_user_turn() {
        let request = convert_to_stream_request(LanguageModelInput {
            content: vec![
                Part::text("Explain this error"),
                ImagePart::new("aGVsbG8=", "image/png").into(),
            ],
            ..Default::default()
        })
        .expect("conversion succeeds");

        let body = serde_json::to_value(&request).expect("serializable");
        assert_eq!(
            body,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": "Explain this error" },
                        { "inlineData": { "data": "aGVsbG8=", "mimeType": "image/png" } }
                    ]
                }]
            })
        );
    }

    #[test]
    fn rejects_empty_content() {
        let error = convert_to_stream_request(LanguageModelInput::default())
            .expect_err("empty content is invalid");
        assert!(matches!(error, LanguageModelError::InvalidInput(_)));
    }

    #[test]
    fn chunk_text_skips_thoughts_and_joins_parts() {
        let text = chunk_text(chunk(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "thinking...", "thought": true },
                        { "text": "```powershell\n" },
                        { "text": "Get-Process" }
                    ]
                }
            }]
        })))
        .expect("valid chunk");

        assert_eq!(text.as_deref(), Some("```powershell\nGet-Process"));
    }

    #[test]
    fn chunk_without_candidates_has_no_text() {
        let text = chunk_text(chunk(json!({
            "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 4 }
        })))
        .expect("valid chunk");
        assert_eq!(text, None);
    }

    #[test]
    fn blocked_prompt_is_a_refusal() {
        let error = chunk_text(chunk(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .expect_err("blocked prompt");
        assert!(matches!(error, LanguageModelError::Refusal(message) if message.contains("SAFETY")));
    }

    #[test]
    fn safety_finish_reason_is_a_refusal() {
        let error = chunk_text(chunk(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        })))
        .expect_err("stopped for safety");
        assert!(matches!(error, LanguageModelError::Refusal(_)));
    }

    #[test]
    fn normal_stop_keeps_final_text() {
        let text = chunk_text(chunk(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "done" }] },
                "finishReason": "STOP"
            }]
        })))
        .expect("valid chunk");
        assert_eq!(text.as_deref(), Some("done"));
    }

    #[test]
    fn request_headers_carry_api_key() {
        let model = GoogleModel::new(
            "gemini-2.5-flash",
            GoogleModelOptions {
                api_key: "secret".to_string(),
                base_url: Some("http://localhost:9999/v1beta/".to_string()),
                ..Default::default()
            },
        );

        let headers = model.request_headers().expect("valid headers");
        assert_eq!(headers.get("x-goog-api-key").unwrap(), "secret");
        assert_eq!(
            model.stream_url(),
            "http://localhost:9999/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }
}
