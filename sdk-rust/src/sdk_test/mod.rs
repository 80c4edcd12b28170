//! Test doubles for code that consumes a [`LanguageModel`](crate::LanguageModel).

mod model;

pub use model::{MockLanguageModel, MockStreamResult, MockStreamSender};
