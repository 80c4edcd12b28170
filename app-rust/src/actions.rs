use crate::{render::CodeBlock, AppError, AppResult};
use std::{
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};

/// How long a copy reports success.
pub const COPY_FEEDBACK_DURATION: Duration = Duration::from_secs(2);

pub trait Clipboard: Send + Sync {
    fn set_text(&self, text: &str) -> AppResult<()>;
}

pub trait FileSink: Send + Sync {
    /// Save `bytes` under `file_name` and return where they went.
    fn save(&self, bytes: &[u8], file_name: &str) -> AppResult<PathBuf>;
}

/// Clipboard that keeps the last copied text in memory.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .map(|contents| contents.clone())
            .unwrap_or_default()
    }
}

impl Clipboard for MemoryClipboard {
    fn set_text(&self, text: &str) -> AppResult<()> {
        let mut contents = self
            .contents
            .lock()
            .map_err(|_| AppError::Clipboard("clipboard lock poisoned".to_string()))?;
        *contents = Some(text.to_string());
        Ok(())
    }
}

/// The desktop clipboard.
#[cfg(feature = "system-clipboard")]
#[derive(Debug, Default)]
pub struct SystemClipboard;

#[cfg(feature = "system-clipboard")]
impl Clipboard for SystemClipboard {
    fn set_text(&self, text: &str) -> AppResult<()> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| AppError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| AppError::Clipboard(e.to_string()))
    }
}

/// Writes downloads into a directory. Existing files are never overwritten:
/// `script.sh` becomes `script-1.sh`, `script-2.sh`, ...
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn available_path(&self, file_name: &str) -> PathBuf {
        let candidate = self.dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }
        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((stem, extension)) => (stem, Some(extension)),
            None => (file_name, None),
        };
        (1..)
            .map(|n| {
                let name = match extension {
                    Some(extension) => format!("{stem}-{n}.{extension}"),
                    None => format!("{stem}-{n}"),
                };
                self.dir.join(name)
            })
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }
}

impl FileSink for DirectorySink {
    fn save(&self, bytes: &[u8], file_name: &str) -> AppResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.available_path(file_name);
        std::fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "script saved");
        Ok(path)
    }
}

/// Result of a copy. Shows success for [`COPY_FEEDBACK_DURATION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyFeedback {
    copied_at: Instant,
}

impl CopyFeedback {
    #[must_use]
    pub fn is_active_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.copied_at) < COPY_FEEDBACK_DURATION
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active_at(Instant::now())
    }

    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.copied_at + COPY_FEEDBACK_DURATION
    }
}

/// Copy the raw source of a code block.
pub fn copy_code(block: &CodeBlock, clipboard: &dyn Clipboard) -> AppResult<CopyFeedback> {
    clipboard.set_text(&block.source)?;
    Ok(CopyFeedback {
        copied_at: Instant::now(),
    })
}

/// Save the raw source of a code block as `script.<ext>`.
pub fn download_code(block: &CodeBlock, sink: &dyn FileSink) -> AppResult<PathBuf> {
    sink.save(block.source.as_bytes(), &block.affordances.file_name)
}
