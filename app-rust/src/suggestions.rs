use crate::{
    catalog::{Catalog, Language},
    AppError,
};
use std::{collections::HashSet, fmt, str::FromStr};

/// Queries shorter than this return nothing.
pub const MIN_QUERY_CHARS: usize = 2;
pub const MAX_SUGGESTIONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuggestionCategory {
    Example,
    QuickScript,
    CleanupScript,
    SecurityScript,
}

impl SuggestionCategory {
    pub const ALL: [Self; 4] = [
        Self::Example,
        Self::QuickScript,
        Self::CleanupScript,
        Self::SecurityScript,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Example => "Example",
            Self::QuickScript => "Quick Script",
            Self::CleanupScript => "Cleanup Script",
            Self::SecurityScript => "Security Script",
        }
    }
}

impl fmt::Display for SuggestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SuggestionCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().replace(['-', '_'], " ").to_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.label().to_lowercase() == needle)
            .ok_or_else(|| AppError::Config(format!("Unknown suggestion type: {s}")))
    }
}

/// One filter dimension. `All` disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq> Filter<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => expected == value,
        }
    }
}

impl<T> FromStr for Filter<T>
where
    T: FromStr<Err = AppError>,
{
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchableItem {
    pub label: String,
    /// What gets placed in the input when the item is picked.
    pub text: String,
    pub language: Language,
    pub category: SuggestionCategory,
}

/// Deduplicated search catalog. Built once, then only queried.
#[derive(Debug, Clone, Default)]
pub struct SuggestionIndex {
    items: Vec<SearchableItem>,
}

impl SuggestionIndex {
    /// Keep the first item of every lower-cased label, in the given order.
    pub fn build(sources: impl IntoIterator<Item = SearchableItem>) -> Self {
        let mut seen = HashSet::new();
        let items = sources
            .into_iter()
            .filter(|item| seen.insert(item.label.to_lowercase()))
            .collect();
        Self { items }
    }

    /// Examples first, then quick scripts (auto-detect excluded), cleanup and
    /// security scripts.
    #[must_use]
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let examples = catalog.example_prompts.iter().map(|example| SearchableItem {
            label: example.text.clone(),
            text: example.text.clone(),
            language: example.language,
            category: SuggestionCategory::Example,
        });
        let quick_scripts = catalog
            .quick_scripts
            .iter()
            .filter(|script| script.language != Language::Auto)
            .map(|script| SearchableItem {
                label: script.label.clone(),
                text: script.script.clone(),
                language: script.language,
                category: SuggestionCategory::QuickScript,
            });
        let cleanup = catalog.cleanup_scripts.iter().map(|script| SearchableItem {
            label: script.label.clone(),
            text: script.script.clone(),
            language: script.language,
            category: SuggestionCategory::CleanupScript,
        });
        let security = catalog.security_scripts.iter().map(|script| SearchableItem {
            label: script.label.clone(),
            text: script.script.clone(),
            language: script.language,
            category: SuggestionCategory::SecurityScript,
        });

        Self::build(examples.chain(quick_scripts).chain(cleanup).chain(security))
    }

    #[must_use]
    pub fn items(&self) -> &[SearchableItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items whose label contains `text` (case-insensitive), in index order.
    #[must_use]
    pub fn query(
        &self,
        text: &str,
        type_filter: Filter<SuggestionCategory>,
        language_filter: Filter<Language>,
    ) -> Vec<&SearchableItem> {
        if text.chars().count() < MIN_QUERY_CHARS {
            return Vec::new();
        }
        let needle = text.to_lowercase();
        self.items
            .iter()
            .filter(|item| {
                type_filter.matches(&item.category)
                    && language_filter.matches(&item.language)
                    && item.label.to_lowercase().contains(&needle)
            })
            .take(MAX_SUGGESTIONS)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(label: &str, category: SuggestionCategory, language: Language) -> SearchableItem {
        SearchableItem {
            label: label.to_string(),
            text: format!("{label} text"),
            language,
            category,
        }
    }

    #[test]
    fn first_label_wins_across_categories() {
        let index = SuggestionIndex::build([
            item("Flush DNS", SuggestionCategory::Example, Language::Cmd),
            item("flush dns", SuggestionCategory::QuickScript, Language::PowerShell),
            item("Check Ports", SuggestionCategory::SecurityScript, Language::Bash),
        ]);

        assert_eq!(index.len(), 2);
        let hits = index.query("dns", Filter::All, Filter::All);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].category, SuggestionCategory::Example);
        assert_eq!(hits[0].language, Language::Cmd);
    }

    #[test]
    fn short_queries_return_nothing() {
        let index = SuggestionIndex::from_catalog(&Catalog::builtin().unwrap());
        assert!(index.query("", Filter::All, Filter::All).is_empty());
        assert!(index.query("d", Filter::All, Filter::All).is_empty());
        assert!(!index.query("dn", Filter::All, Filter::All).is_empty());
    }

    #[test]
    fn results_are_capped_and_filtered() {
        let index = SuggestionIndex::from_catalog(&Catalog::builtin().unwrap());

        let hits = index.query("e", Filter::All, Filter::All);
        assert!(hits.is_empty());

        let hits = index.query("th", Filter::All, Filter::All);
        assert_eq!(hits.len(), MAX_SUGGESTIONS);

        let hits = index.query(
            "clear",
            Filter::Only(SuggestionCategory::CleanupScript),
            Filter::Only(Language::Bash),
        );
        let labels: Vec<_> = hits.iter().map(|item| item.label.as_str()).collect();
        assert_eq!(labels, vec!["Clear Docker Build Cache", "Clear npm Cache", "Clear Homebrew Cache (macOS)"]);
    }

    #[test]
    fn filters_parse_from_strings() {
        assert_eq!("all".parse::<Filter<Language>>().unwrap(), Filter::All);
        assert_eq!(
            "Quick Script".parse::<Filter<SuggestionCategory>>().unwrap(),
            Filter::Only(SuggestionCategory::QuickScript)
        );
        assert_eq!(
            "security-script".parse::<Filter<SuggestionCategory>>().unwrap(),
            Filter::Only(SuggestionCategory::SecurityScript)
        );
        assert!("bogus".parse::<Filter<SuggestionCategory>>().is_err());
    }
}
