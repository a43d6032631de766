//! Domain models for tailoring documents and their items.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static CANONICAL_IDREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^xccdf_[A-Za-z0-9.\-]+_(rule|value)_.+$").expect("valid idref pattern")
});

/// Session-local identity of a [`TailoringItem`]. Never serialized to XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic source of [`ItemId`]s for one editing session.
#[derive(Debug, Default, Clone)]
pub struct ItemIdGenerator {
    next: u64,
}

impl ItemIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next identity. Identities are never reused within a session.
    pub fn next_id(&mut self) -> ItemId {
        self.next += 1;
        ItemId(self.next)
    }
}

/// Explicit selection state of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    True,
    False,
    /// No `select` element was present and none is emitted.
    #[default]
    Unset,
}

impl Selection {
    /// Decode the `selected` attribute of a `select` element.
    pub fn from_attribute(value: &str) -> Self {
        match value.trim() {
            "true" | "1" => Selection::True,
            _ => Selection::False,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Selection::True => "true",
            Selection::False => "false",
            Selection::Unset => "unset",
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Selection::Unset)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity override carried by a `refine-rule` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No override; nothing is emitted on export.
    #[default]
    Default,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Default,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Decode a `severity` attribute. Unrecognized levels fall back to [`Severity::Default`].
    pub fn from_attribute(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "default",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    pub fn is_override(&self) -> bool {
        !matches!(self, Severity::Default)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" | "" => Ok(Severity::Default),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}

/// Error returned when parsing a [`Severity`] from user input fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("unknown severity '{0}' (expected default, high, medium, low or info)")]
pub struct UnknownSeverity(pub String);

/// Variant-specific state of a tailoring item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    /// Merged `select` / `refine-rule` state for one rule.
    Rule {
        selected: Selection,
        severity: Severity,
    },
    /// A `set-value` assignment.
    Variable { value: String },
}

impl ItemKind {
    pub fn rule(selected: Selection, severity: Severity) -> Self {
        ItemKind::Rule { selected, severity }
    }

    pub fn variable(value: impl Into<String>) -> Self {
        ItemKind::Variable {
            value: value.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Rule { .. } => "rule",
            ItemKind::Variable { .. } => "variable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TailoringItem {
    #[serde(skip)]
    pub id: ItemId,
    pub idref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl TailoringItem {
    pub fn is_rule(&self) -> bool {
        matches!(self.kind, ItemKind::Rule { .. })
    }

    /// Whether the item produces any markup on export.
    pub fn emits_markup(&self) -> bool {
        match &self.kind {
            ItemKind::Rule { selected, severity } => selected.is_set() || severity.is_override(),
            ItemKind::Variable { .. } => true,
        }
    }

    /// Case-insensitive substring match against `idref` and `comment`.
    ///
    /// `needle` must already be lowercased.
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.idref.to_lowercase().contains(needle)
            || self
                .comment
                .as_deref()
                .is_some_and(|comment| comment.to_lowercase().contains(needle))
    }
}

/// A parsed tailoring file: profile metadata plus ordered items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TailoringDocument {
    pub benchmark_href: String,
    pub version_text: String,
    pub profile_id: String,
    pub profile_extends: String,
    pub profile_title: String,
    pub profile_description: String,
    pub items: Vec<TailoringItem>,
}

impl Default for TailoringDocument {
    fn default() -> Self {
        Self {
            benchmark_href: String::new(),
            version_text: String::new(),
            profile_id: String::new(),
            profile_extends: String::new(),
            profile_title: UNKNOWN_PROFILE_TITLE.to_string(),
            profile_description: String::new(),
            items: Vec::new(),
        }
    }
}

pub const UNKNOWN_PROFILE_TITLE: &str = "Unknown Profile";

impl TailoringDocument {
    pub fn item(&self, id: ItemId) -> Option<&TailoringItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn rule_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_rule()).count()
    }

    pub fn variable_count(&self) -> usize {
        self.items.len() - self.rule_count()
    }
}

/// Whether `idref` has the XCCDF 1.2 shape `xccdf_<namespace>_(rule|value)_<name>`.
pub fn idref_looks_canonical(idref: &str) -> bool {
    CANONICAL_IDREF.is_match(idref)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_generator_is_monotonic() {
        let mut ids = ItemIdGenerator::new();
        let first = ids.next_id();
        let second = ids.next_id();
        assert!(second > first);
        assert_ne!(first, second);
    }

    #[test]
    fn severity_parsing_is_case_insensitive() {
        assert_eq!("HIGH".parse::<Severity>(), Ok(Severity::High));
        assert_eq!(Severity::from_attribute("unknown"), Severity::Default);
        assert!("critical".parse::<Severity>().is_err());
    }

    #[test]
    fn selection_accepts_schema_booleans() {
        assert_eq!(Selection::from_attribute("true"), Selection::True);
        assert_eq!(Selection::from_attribute("1"), Selection::True);
        assert_eq!(Selection::from_attribute("false"), Selection::False);
        assert_eq!(Selection::from_attribute("yes"), Selection::False);
    }

    #[test]
    fn canonical_idref_shape() {
        assert!(idref_looks_canonical(
            "xccdf_org.ssgproject.content_rule_kernel_module_cramfs_disabled"
        ));
        assert!(idref_looks_canonical(
            "xccdf_org.ssgproject.content_value_var_apparmor_mode"
        ));
        assert!(!idref_looks_canonical("cramfs_disabled"));
    }

    #[test]
    fn items_serialize_with_variant_tag() {
        let item = TailoringItem {
            id: ItemIdGenerator::new().next_id(),
            idref: "xccdf_x_value_mode".into(),
            comment: None,
            kind: ItemKind::variable("enforce"),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "variable");
        assert_eq!(json["value"], "enforce");
        assert!(json.get("id").is_none());
    }
}
