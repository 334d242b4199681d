//! Strategy document and category metadata types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Literal token every template must contain; callers substitute their prompt here
pub const PLACEHOLDER: &str = "[Insert initial prompt here]";

/// Name of the per-category metadata file
pub const METADATA_FILE: &str = "_metadata.json";

/// Complexity / time-investment rating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Low,
    #[default]
    Medium,
    High,
    #[serde(rename = "Medium-High")]
    MediumHigh,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "Low",
            Level::Medium => "Medium",
            Level::High => "High",
            Level::MediumHigh => "Medium-High",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which root a document was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "built-in")]
    BuiltIn,
    #[serde(rename = "custom")]
    Custom,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::BuiltIn => "built-in",
            Source::Custom => "custom",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A strategy document file as it appears on disk
///
/// Only deserialized after the file has passed schema validation.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StrategyFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
    pub template: String,
    #[serde(default)]
    pub complexity: Option<Level>,
    #[serde(default)]
    pub time_investment: Option<Level>,
    #[serde(default)]
    pub triggers: Option<Vec<String>>,
    #[serde(default)]
    pub best_for: Option<Vec<String>>,
}

/// A loaded, validated strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyDocument {
    /// Unique key within the merged catalog
    pub key: String,
    pub name: String,
    pub description: String,
    pub examples: Vec<String>,
    pub template: String,
    /// Category key this document belongs to (matches the categories map)
    pub category: String,
    pub complexity: Level,
    pub time_investment: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_for: Option<Vec<String>>,
    pub source: Source,
    /// Directory name of the custom category, for custom documents only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_category: Option<String>,
}

impl StrategyDocument {
    pub(crate) fn from_file(key: String, category: String, source: Source, dir_name: &str, file: StrategyFile) -> Self {
        Self {
            key,
            name: file.name,
            description: file.description,
            examples: file.examples,
            template: file.template,
            category,
            complexity: file.complexity.unwrap_or_default(),
            time_investment: file.time_investment.unwrap_or_default(),
            triggers: file.triggers,
            best_for: file.best_for,
            source,
            custom_category: match source {
                Source::Custom => Some(dir_name.to_string()),
                Source::BuiltIn => None,
            },
        }
    }

    /// Whether the template carries the placeholder token
    pub fn has_placeholder(&self) -> bool {
        self.template.contains(PLACEHOLDER)
    }

    pub fn summary(&self) -> StrategySummary {
        StrategySummary {
            key: self.key.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            best_for: self.best_for.clone().unwrap_or_default(),
            complexity: self.complexity.to_string(),
            time_investment: self.time_investment.to_string(),
            triggers: self.triggers.clone(),
            output_focus: None,
        }
    }
}

/// Discovery summary of a strategy, denormalized into its category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub key: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub best_for: Vec<String>,
    #[serde(default)]
    pub complexity: String,
    #[serde(default)]
    pub time_investment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_focus: Option<String>,
}

/// A category `_metadata.json` file as it appears on disk
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MetadataFile {
    pub category: String,
    pub description: String,
    pub use_cases: Vec<String>,
    #[serde(default)]
    pub strategies: Vec<StrategySummary>,
}

/// Metadata describing one category of strategies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMetadata {
    /// Display name
    pub category: String,
    pub description: String,
    pub use_cases: Vec<String>,
    /// Strategies loaded into this category, sorted by key
    #[serde(default)]
    pub strategies: Vec<StrategySummary>,
}

/// Key for a built-in document
pub fn builtin_key(stem: &str) -> String {
    stem.to_string()
}

/// Key for a custom document; namespaced so it can never collide with a
/// built-in key or a document from another custom category
pub fn custom_key(category: &str, stem: &str) -> String {
    format!("custom_{}_{}", category, stem)
}

/// Key under which a category directory is registered in the categories map
pub fn category_key(source: Source, dir_name: &str) -> String {
    match source {
        Source::BuiltIn => dir_name.to_string(),
        Source::Custom => format!("custom_{}", dir_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_serde() {
        let level: Level = serde_json::from_str("\"Medium-High\"").unwrap();
        assert_eq!(level, Level::MediumHigh);
        assert_eq!(serde_json::to_string(&Level::Low).unwrap(), "\"Low\"");
        assert_eq!(Level::default(), Level::Medium);
    }

    #[test]
    fn test_source_serde() {
        assert_eq!(serde_json::to_string(&Source::BuiltIn).unwrap(), "\"built-in\"");
        let source: Source = serde_json::from_str("\"custom\"").unwrap();
        assert_eq!(source, Source::Custom);
    }

    #[test]
    fn test_keys() {
        assert_eq!(builtin_key("star"), "star");
        assert_eq!(custom_key("extra", "star"), "custom_extra_star");
        assert_eq!(category_key(Source::BuiltIn, "core"), "core");
        assert_eq!(category_key(Source::Custom, "extra"), "custom_extra");
    }

    #[test]
    fn test_from_file_defaults() {
        let file: StrategyFile =
            serde_json::from_str(r#"{"name": "STAR", "template": "x [Insert initial prompt here]"}"#).unwrap();
        let doc = StrategyDocument::from_file("star".into(), "core".into(), Source::BuiltIn, "core", file);
        assert_eq!(doc.complexity, Level::Medium);
        assert_eq!(doc.time_investment, Level::Medium);
        assert!(doc.examples.is_empty());
        assert!(doc.custom_category.is_none());
        assert!(doc.has_placeholder());
    }

    #[test]
    fn test_custom_document_tags_category() {
        let file: StrategyFile = serde_json::from_str(r#"{"name": "N", "template": "t"}"#).unwrap();
        let doc = StrategyDocument::from_file(
            "custom_extra_n".into(),
            "custom_extra".into(),
            Source::Custom,
            "extra",
            file,
        );
        assert_eq!(doc.custom_category.as_deref(), Some("extra"));
        assert!(!doc.has_placeholder());
    }

    #[test]
    fn test_summary() {
        let file: StrategyFile = serde_json::from_str(
            r#"{"name": "N", "template": "t", "complexity": "High", "best_for": ["debugging"]}"#,
        )
        .unwrap();
        let doc = StrategyDocument::from_file("n".into(), "core".into(), Source::BuiltIn, "core", file);
        let summary = doc.summary();
        assert_eq!(summary.complexity, "High");
        assert_eq!(summary.time_investment, "Medium");
        assert_eq!(summary.best_for, vec!["debugging"]);
    }
}
