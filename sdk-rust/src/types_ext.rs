use crate::{
    ImagePart, LanguageModelInput, ModelUsage, Part, PartialModelResponse, TextPart,
    TextPartDelta,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};

impl TextPart {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl From<&str> for TextPart {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TextPart {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl ImagePart {
    pub fn new(image_data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            image_data: image_data.into(),
        }
    }

    /// Encode raw image bytes as base64 inline data.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::new(BASE64_STANDARD.encode(bytes), mime_type)
    }
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextPart::new(text))
    }

    pub fn image(image_data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image(ImagePart::new(image_data, mime_type))
    }
}

impl From<TextPart> for Part {
    fn from(value: TextPart) -> Self {
        Self::Text(value)
    }
}

impl From<ImagePart> for Part {
    fn from(value: ImagePart) -> Self {
        Self::Image(value)
    }
}

impl PartialModelResponse {
    /// A partial carrying only a text delta.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            delta: Some(TextPartDelta { text: text.into() }),
            usage: None,
        }
    }

    /// A partial carrying only usage.
    #[must_use]
    pub fn usage(usage: ModelUsage) -> Self {
        Self {
            delta: None,
            usage: Some(usage),
        }
    }

    /// The text delta of this partial, or an empty string.
    #[must_use]
    pub fn delta_text(&self) -> &str {
        self.delta.as_ref().map_or("", |delta| delta.text.as_str())
    }
}

impl ModelUsage {
    pub fn add(&mut self, other: &Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

impl LanguageModelInput {
    /// The concatenated text parts of the input.
    #[must_use]
    pub fn prompt_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                Part::Text(text_part) => Some(text_part.text.as_str()),
                Part::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The inline images of the input.
    pub fn images(&self) -> impl Iterator<Item = &ImagePart> {
        self.content.iter().filter_map(|part| match part {
            Part::Image(image_part) => Some(image_part),
            Part::Text(_) => None,
        })
    }
}
