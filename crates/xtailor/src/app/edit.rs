//! In-memory edits of a tailoring document's item list.
//!
//! Everything here is synchronous. Identifiers are validated on the way in: an idref is never
//! blank, and no two rules share one.

use crate::domain::errors::ValidationError;
use crate::domain::model::{
    ItemId, ItemIdGenerator, ItemKind, Selection, Severity, TailoringDocument, TailoringItem,
};

/// A single field replacement for [`update_field`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemField {
    Idref(String),
    Comment(Option<String>),
    Selected(Selection),
    Severity(Severity),
    Value(String),
}

/// Profile metadata replacements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileField {
    Id(String),
    Extends(String),
    Title(String),
    Description(String),
    BenchmarkHref(String),
    Version(String),
}

/// Variant requested by [`add_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewItemKind {
    Rule,
    Variable,
}

/// User input for a new entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewItem {
    pub kind: Option<NewItemKind>,
    pub idref: String,
    pub value: String,
    pub severity: Severity,
    pub comment: Option<String>,
}

impl NewItem {
    pub fn rule(idref: impl Into<String>, severity: Severity) -> Self {
        Self {
            kind: Some(NewItemKind::Rule),
            idref: idref.into(),
            severity,
            ..Self::default()
        }
    }

    pub fn variable(idref: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: Some(NewItemKind::Variable),
            idref: idref.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Replace one field of the item identified by `id`.
///
/// Returns `false` when no such item exists, the field does not belong to its variant, or the
/// new idref fails [`check_idref`].
pub fn update_field(doc: &mut TailoringDocument, id: ItemId, field: ItemField) -> bool {
    let field = match field {
        ItemField::Idref(idref) => match check_idref(doc, Some(id), &idref) {
            Ok(idref) => ItemField::Idref(idref.to_string()),
            Err(err) => {
                tracing::debug!(%id, error = %err, "idref update rejected");
                return false;
            }
        },
        field => field,
    };
    let Some(item) = doc.items.iter_mut().find(|item| item.id == id) else {
        tracing::debug!(%id, "update for unknown item ignored");
        return false;
    };

    match (field, &mut item.kind) {
        (ItemField::Idref(idref), _) => item.idref = idref,
        (ItemField::Comment(comment), _) => item.comment = comment.and_then(clean_comment),
        (ItemField::Selected(value), ItemKind::Rule { selected, .. }) => *selected = value,
        (ItemField::Severity(value), ItemKind::Rule { severity, .. }) => *severity = value,
        (ItemField::Value(text), ItemKind::Variable { value }) => *value = text,
        (field, kind) => {
            tracing::debug!(%id, ?field, variant = kind.label(), "field does not apply to item");
            return false;
        }
    }
    true
}

/// Remove the item identified by `id`. Returns whether anything was removed.
pub fn delete_item(doc: &mut TailoringDocument, id: ItemId) -> bool {
    let before = doc.items.len();
    doc.items.retain(|item| item.id != id);
    doc.items.len() != before
}

/// Validate `new` and prepend it to the document.
///
/// Rules start with `selected = true` and the requested severity. A rule whose idref is
/// already taken by another rule is rejected rather than merged.
pub fn add_item(
    doc: &mut TailoringDocument,
    ids: &mut ItemIdGenerator,
    new: NewItem,
) -> Result<ItemId, ValidationError> {
    let idref = new.idref.trim();
    if idref.is_empty() {
        return Err(ValidationError::MissingIdref);
    }

    let kind = match new.kind.unwrap_or(NewItemKind::Rule) {
        NewItemKind::Rule => {
            if find_rule(doc, idref, None).is_some() {
                return Err(ValidationError::DuplicateRule(idref.to_string()));
            }
            ItemKind::rule(Selection::True, new.severity)
        }
        NewItemKind::Variable => ItemKind::variable(new.value),
    };

    let id = ids.next_id();
    doc.items.insert(
        0,
        TailoringItem {
            id,
            idref: idref.to_string(),
            comment: new.comment.and_then(clean_comment),
            kind,
        },
    );
    Ok(id)
}

/// Check that the item `id` may take `idref`, returning it trimmed.
///
/// Variables may share idrefs. A rule may not take an idref held by another rule.
pub fn check_idref<'a>(
    doc: &TailoringDocument,
    id: Option<ItemId>,
    idref: &'a str,
) -> Result<&'a str, ValidationError> {
    let idref = idref.trim();
    if idref.is_empty() {
        return Err(ValidationError::MissingIdref);
    }
    let renames_rule = id
        .and_then(|id| doc.item(id))
        .is_some_and(TailoringItem::is_rule);
    if renames_rule && find_rule(doc, idref, id).is_some() {
        return Err(ValidationError::DuplicateRule(idref.to_string()));
    }
    Ok(idref)
}

fn find_rule<'a>(
    doc: &'a TailoringDocument,
    idref: &str,
    except: Option<ItemId>,
) -> Option<&'a TailoringItem> {
    doc.items
        .iter()
        .find(|item| item.is_rule() && item.idref == idref && Some(item.id) != except)
}

pub fn update_profile(doc: &mut TailoringDocument, field: ProfileField) {
    match field {
        ProfileField::Id(value) => doc.profile_id = value,
        ProfileField::Extends(value) => doc.profile_extends = value,
        ProfileField::Title(value) => doc.profile_title = value,
        ProfileField::Description(value) => doc.profile_description = value,
        ProfileField::BenchmarkHref(value) => doc.benchmark_href = value,
        ProfileField::Version(value) => doc.version_text = value,
    }
}

/// Lazy view over the items matching a case-insensitive query.
pub fn filter<'a>(items: &'a [TailoringItem], query: &str) -> ItemFilter<'a> {
    ItemFilter {
        items: items.iter(),
        needle: query.trim().to_lowercase(),
    }
}

/// Iterator returned by [`filter`]. Cloning restarts from the current position.
#[derive(Debug, Clone)]
pub struct ItemFilter<'a> {
    items: std::slice::Iter<'a, TailoringItem>,
    needle: String,
}

impl<'a> Iterator for ItemFilter<'a> {
    type Item = &'a TailoringItem;

    fn next(&mut self) -> Option<Self::Item> {
        let needle = &self.needle;
        self.items.by_ref().find(|item| item.matches_lowercase(needle))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.items.size_hint().1)
    }
}

/// Next selection state for a toggle: anything but `true` becomes `true`.
pub fn cycle_selection(selected: Selection) -> Selection {
    match selected {
        Selection::True => Selection::False,
        Selection::False | Selection::Unset => Selection::True,
    }
}

/// Next severity in `default → high → medium → low → info → default` order.
pub fn cycle_severity(severity: Severity) -> Severity {
    let index = Severity::ALL
        .iter()
        .position(|candidate| *candidate == severity)
        .unwrap_or(0);
    Severity::ALL[(index + 1) % Severity::ALL.len()]
}

fn clean_comment(comment: String) -> Option<String> {
    let trimmed = comment.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
