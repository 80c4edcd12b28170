use crate::{ModelResponse, ModelUsage, PartialModelResponse};

/// Folds the partial responses of a stream into the complete text, in
/// arrival order.
///
/// Text is only ever appended: after `n` partials, [`text`](Self::text) is the
/// concatenation of their deltas.
#[derive(Debug, Clone, Default)]
pub struct StreamAccumulator {
    /// Concatenated text deltas
    text: String,
    /// Number of partials folded so far, including usage-only partials
    partials: usize,
    /// Accumulated usage statistics
    accumulated_usage: Option<ModelUsage>,
}

impl StreamAccumulator {
    /// Creates a new `StreamAccumulator`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a partial response to the accumulator and returns the text
    /// accumulated so far.
    pub fn add_partial(&mut self, partial: &PartialModelResponse) -> &str {
        if let Some(delta) = &partial.delta {
            self.text.push_str(&delta.text);
        }
        if let Some(usage) = &partial.usage {
            self.accumulated_usage
                .get_or_insert_with(ModelUsage::default)
                .add(usage);
        }
        self.partials += 1;
        &self.text
    }

    /// The text accumulated so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Usage reported so far, if the provider sent any.
    #[must_use]
    pub fn usage(&self) -> Option<&ModelUsage> {
        self.accumulated_usage.as_ref()
    }

    /// Computes the final response from accumulated partials
    #[must_use]
    pub fn compute_response(self) -> ModelResponse {
        ModelResponse {
            text: self.text,
            usage: self.accumulated_usage,
        }
    }

    /// Clears all accumulated data
    pub fn clear(&mut self) {
        self.text.clear();
        self.partials = 0;
        self.accumulated_usage = None;
    }

    /// Gets the number of partials folded so far
    #[must_use]
    pub fn size(&self) -> usize {
        self.partials
    }

    /// Checks if the accumulator has received any partial
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partials == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_text_in_arrival_order() {
        let mut accumulator = StreamAccumulator::new();
        assert!(accumulator.is_empty());

        assert_eq!(accumulator.add_partial(&PartialModelResponse::text("```bash")), "```bash");
        assert_eq!(
            accumulator.add_partial(&PartialModelResponse::text("\nls -la\n")),
            "```bash\nls -la\n"
        );
        assert_eq!(accumulator.add_partial(&PartialModelResponse::text("```")), "```bash\nls -la\n```");
        assert_eq!(accumulator.size(), 3);
    }

    #[test]
    fn usage_only_partials_count_but_do_not_change_text() {
        let mut accumulator = StreamAccumulator::new();
        accumulator.add_partial(&PartialModelResponse::text("Hello"));
        accumulator.add_partial(&PartialModelResponse::usage(ModelUsage {
            input_tokens: 12,
            output_tokens: 3,
        }));
        accumulator.add_partial(&PartialModelResponse::usage(ModelUsage {
            input_tokens: 0,
            output_tokens: 2,
        }));

        assert_eq!(accumulator.text(), "Hello");
        assert_eq!(accumulator.size(), 3);

        let response = accumulator.compute_response();
        assert_eq!(
            response,
            ModelResponse {
                text: "Hello".to_string(),
                usage: Some(ModelUsage {
                    input_tokens: 12,
                    output_tokens: 5,
                }),
            }
        );
    }

    #[test]
    fn clear_resets_state() {
        let mut accumulator = StreamAccumulator::new();
        accumulator.add_partial(&PartialModelResponse::text("partial"));
        accumulator.clear();

        assert!(accumulator.is_empty());
        assert_eq!(accumulator.text(), "");
        assert!(accumulator.usage().is_none());
    }
}
