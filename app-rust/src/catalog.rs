use crate::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// What the user wants done with their input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskType {
    #[default]
    Generate,
    Explain,
    Translate,
    Debug,
    #[serde(rename = "Code Review")]
    CodeReview,
    Security,
    #[serde(rename = "Step by step")]
    StepByStep,
}

impl TaskType {
    pub const ALL: [Self; 7] = [
        Self::Generate,
        Self::Explain,
        Self::Translate,
        Self::Debug,
        Self::CodeReview,
        Self::Security,
        Self::StepByStep,
    ];

    /// Stable identifier, used when persisting versions.
    #[must_use]
    pub fn value(self) -> &'static str {
        match self {
            Self::Generate => "Generate",
            Self::Explain => "Explain",
            Self::Translate => "Translate",
            Self::Debug => "Debug",
            Self::CodeReview => "Code Review",
            Self::Security => "Security",
            Self::StepByStep => "Step by step",
        }
    }

    /// The label shown to the user and sent to the model.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Generate => "Create script",
            Self::Explain => "Explain a script",
            Self::Translate => "Translate a script",
            Self::Debug => "Debug a script",
            Self::CodeReview => "Review Code",
            Self::Security => "Analyze for Security",
            Self::StepByStep => "Give solution step by step",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = normalize_key(s);
        Self::ALL
            .into_iter()
            .find(|task| {
                normalize_key(task.value()) == needle || normalize_key(task.label()) == needle
            })
            .ok_or_else(|| AppError::Config(format!("Unknown task type: {s}")))
    }
}

/// Target scripting language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "Auto-detect by AI")]
    Auto,
    PowerShell,
    #[serde(rename = "Bash (for WSL)")]
    Bash,
    #[serde(rename = "CMD Batch")]
    Cmd,
    #[serde(rename = "VBA")]
    Vba,
    Python,
    #[serde(rename = "SQL")]
    Sql,
    Ruby,
    Go,
}

impl Language {
    pub const ALL: [Self; 9] = [
        Self::Auto,
        Self::PowerShell,
        Self::Bash,
        Self::Cmd,
        Self::Vba,
        Self::Python,
        Self::Sql,
        Self::Ruby,
        Self::Go,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "Auto-detect by AI",
            Self::PowerShell => "PowerShell",
            Self::Bash => "Bash (for WSL)",
            Self::Cmd => "CMD Batch",
            Self::Vba => "VBA",
            Self::Python => "Python",
            Self::Sql => "SQL",
            Self::Ruby => "Ruby",
            Self::Go => "Go",
        }
    }

    /// Short name accepted on the command line.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::PowerShell => "powershell",
            Self::Bash => "bash",
            Self::Cmd => "cmd",
            Self::Vba => "vba",
            Self::Python => "python",
            Self::Sql => "sql",
            Self::Ruby => "ruby",
            Self::Go => "go",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Language {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = normalize_key(s);
        Self::ALL
            .into_iter()
            .find(|language| {
                language.short_name() == needle || normalize_key(language.label()) == needle
            })
            .ok_or_else(|| AppError::Config(format!("Unknown language: {s}")))
    }
}

fn normalize_key(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplePrompt {
    pub task: TaskType,
    pub language: Language,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickScript {
    pub language: Language,
    pub label: String,
    pub script: String,
}

/// A ready-made script from the cleanup or security collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogScript {
    pub label: String,
    pub description: String,
    pub script: String,
    pub language: Language,
}

/// Static content tables. Loaded once and never mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub example_prompts: Vec<ExamplePrompt>,
    #[serde(default)]
    pub quick_scripts: Vec<QuickScript>,
    #[serde(default)]
    pub cleanup_scripts: Vec<CatalogScript>,
    #[serde(default)]
    pub security_scripts: Vec<CatalogScript>,
}

/// Which script collection to browse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptCollection {
    Cleanup,
    Security,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> AppResult<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> AppResult<Self> {
        serde_json::from_str(json).map_err(|e| AppError::Config(format!("Invalid catalog: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Catalog {} could not be read: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Example prompts of one task, narrowed to those whose text contains
    /// `query` (case-insensitive). An empty query keeps them all.
    #[must_use]
    pub fn examples_for(&self, task: TaskType, query: &str) -> Vec<&ExamplePrompt> {
        let query = query.to_lowercase();
        self.example_prompts
            .iter()
            .filter(|example| example.task == task)
            .filter(|example| query.is_empty() || example.text.to_lowercase().contains(&query))
            .collect()
    }

    /// Quick scripts grouped by language in catalog order, keeping only
    /// labels that contain `query`. Languages with no match are left out.
    #[must_use]
    pub fn quick_scripts_by_language(&self, query: &str) -> Vec<(Language, Vec<&QuickScript>)> {
        let query = query.to_lowercase();
        let mut groups: Vec<(Language, Vec<&QuickScript>)> = Vec::new();
        for script in &self.quick_scripts {
            if script.language == Language::Auto || !script.label.to_lowercase().contains(&query) {
                continue;
            }
            match groups.iter_mut().find(|(language, _)| *language == script.language) {
                Some((_, scripts)) => scripts.push(script),
                None => groups.push((script.language, vec![script])),
            }
        }
        groups
    }

    /// Cleanup or security scripts whose label or description contains
    /// `query` (case-insensitive).
    #[must_use]
    pub fn browse(&self, collection: ScriptCollection, query: &str) -> Vec<&CatalogScript> {
        let query = query.to_lowercase();
        let scripts = match collection {
            ScriptCollection::Cleanup => &self.cleanup_scripts,
            ScriptCollection::Security => &self.security_scripts,
        };
        scripts
            .iter()
            .filter(|script| {
                script.label.to_lowercase().contains(&query)
                    || script.description.to_lowercase().contains(&query)
            })
            .collect()
    }
}
