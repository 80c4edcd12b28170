use crate::{LanguageModelInput, LanguageModelResult, LanguageModelStream, ModelUsage, PartialModelResponse};
use futures::StreamExt;
use opentelemetry::{trace::Status, Value};
use std::time::Instant;
use tracing::{info_span, Span};
use tracing_futures::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Span state for one streamed generation. Summary attributes are written
/// once, when the stream finishes, fails, or is dropped.
struct StreamSpan {
    span: Span,
    started: Instant,
    first_fragment_secs: Option<f64>,
    fragments: i64,
    usage: Option<ModelUsage>,
    finished: bool,
}

impl StreamSpan {
    fn start(provider: &str, model_id: &str, input: &LanguageModelInput) -> Self {
        let span = info_span!("logicleap_sdk.stream");
        let images = i64::try_from(input.images().count()).unwrap_or(i64::MAX);
        let mut attributes: Vec<(&'static str, Value)> = vec![
            ("gen_ai.operation.name", "generate_content".into()),
            ("gen_ai.provider.name", provider.to_string().into()),
            ("gen_ai.request.model", model_id.to_string().into()),
            ("logicleap_sdk.request.images", images.into()),
        ];
        if let Some(max_tokens) = input.max_tokens {
            attributes.push(("gen_ai.request.max_tokens", i64::from(max_tokens).into()));
        }
        if let Some(temperature) = input.temperature {
            attributes.push(("gen_ai.request.temperature", temperature.into()));
        }
        for (key, value) in attributes {
            span.set_attribute(key, value);
        }

        Self {
            span,
            started: Instant::now(),
            first_fragment_secs: None,
            fragments: 0,
            usage: None,
            finished: false,
        }
    }

    fn record(&mut self, partial: &PartialModelResponse) {
        if partial.delta.is_some() {
            self.fragments += 1;
            self.first_fragment_secs
                .get_or_insert_with(|| self.started.elapsed().as_secs_f64());
        }
        if let Some(usage) = &partial.usage {
            self.usage.get_or_insert_with(ModelUsage::default).add(usage);
        }
    }

    fn fail(&mut self, error: &(dyn std::error::Error + 'static)) {
        let message = error.to_string();
        self.span.set_attribute("exception.message", message.clone());
        self.span.set_status(Status::error(message));
        self.finish();
    }

    fn finish(&mut self) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        self.span
            .set_attribute("logicleap_sdk.response.fragments", self.fragments);
        if let Some(secs) = self.first_fragment_secs {
            self.span
                .set_attribute("gen_ai.server.time_to_first_token", secs);
        }
        if let Some(usage) = &self.usage {
            self.span
                .set_attribute("gen_ai.usage.input_tokens", i64::from(usage.input_tokens));
            self.span
                .set_attribute("gen_ai.usage.output_tokens", i64::from(usage.output_tokens));
        }
    }
}

impl Drop for StreamSpan {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Run `open` inside a `logicleap_sdk.stream` span and keep the span open
/// until the returned stream is exhausted or dropped.
pub async fn trace_stream<F, Fut>(
    provider: &str,
    model_id: &str,
    input: LanguageModelInput,
    open: F,
) -> LanguageModelResult<LanguageModelStream>
where
    F: FnOnce(LanguageModelInput) -> Fut,
    Fut: std::future::Future<Output = LanguageModelResult<LanguageModelStream>>,
{
    let mut state = StreamSpan::start(provider, model_id, &input);
    let span = state.span.clone();

    let mut upstream = match open(input).instrument(span.clone()).await {
        Ok(stream) => stream,
        Err(error) => {
            state.fail(&error);
            return Err(error);
        }
    };

    let traced = async_stream::try_stream! {
        while let Some(item) = upstream.next().await {
            match item {
                Ok(partial) => {
                    state.record(&partial);
                    yield partial;
                }
                Err(error) => {
                    state.fail(&error);
                    Err(error)?;
                }
            }
        }
        state.finish();
    }
    .instrument(span);

    Ok(LanguageModelStream::from_stream(traced))
}
