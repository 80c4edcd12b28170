pub mod actions;
pub mod attachment;
pub mod catalog;
pub mod config;
mod controller;
mod errors;
pub mod prompt;
pub mod render;
pub mod storage;
pub mod stream;
pub mod suggestions;
pub mod versions;

pub use attachment::ImageAttachment;
pub use catalog::{Catalog, Language, TaskType};
pub use config::AppConfig;
pub use controller::{AppState, Controller, Submission};
pub use errors::{AppError, AppResult, StreamError};
pub use render::{render, Block, RenderedDocument};
pub use stream::{DocumentEvent, StreamedDocument};
