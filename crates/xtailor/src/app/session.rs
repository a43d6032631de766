//! The in-memory editing session.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::app::edit::{self, ItemField, ItemFilter, NewItem, ProfileField};
use crate::app::export::{ExportOptions, ExportResult, Exporter};
use crate::app::parse::parse_document;
use crate::domain::errors::{ParseError, ValidationError};
use crate::domain::model::{ItemId, ItemIdGenerator, TailoringDocument};

/// Tailoring document shipped with the binary and loaded when no file is given.
pub const SAMPLE_TAILORING: &str = include_str!("../../assets/sample-tailoring.xml");

/// Holds the single document being edited.
///
/// A successful load replaces the document wholesale; a failed one leaves it untouched.
#[derive(Debug, Default)]
pub struct EditorSession {
    document: Option<TailoringDocument>,
    ids: ItemIdGenerator,
    source: Option<PathBuf>,
    dirty: bool,
}

impl EditorSession {
    /// Create a session without a document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session holding the embedded sample document.
    pub fn with_sample() -> Result<Self> {
        let mut session = Self::new();
        session
            .load_str(SAMPLE_TAILORING)
            .context("embedded sample tailoring is invalid")?;
        Ok(session)
    }

    pub fn document(&self) -> Option<&TailoringDocument> {
        self.document.as_ref()
    }

    /// Path of the file the current document was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Whether the document changed since it was loaded or last exported.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Parse `text` and make it the current document.
    pub fn load_str(&mut self, text: &str) -> Result<&TailoringDocument, ParseError> {
        match parse_document(text, &mut self.ids) {
            Ok(document) => {
                tracing::info!(
                    profile = %document.profile_id,
                    rules = document.rule_count(),
                    variables = document.variable_count(),
                    "loaded tailoring document"
                );
                self.source = None;
                self.dirty = false;
                Ok(self.document.insert(document))
            }
            Err(err) => {
                tracing::warn!(error = %err, "keeping previous document after failed load");
                Err(err)
            }
        }
    }

    /// Read a UTF-8 file and make it the current document.
    pub fn load_file(&mut self, path: &Path) -> Result<&TailoringDocument> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read tailoring file {}", path.display()))?;
        self.load_str(&text)
            .with_context(|| format!("failed to load {}", path.display()))?;
        self.source = Some(path.to_path_buf());
        self.document
            .as_ref()
            .context("document missing after successful load")
    }

    pub fn update_field(&mut self, id: ItemId, field: ItemField) -> bool {
        let changed = self
            .document
            .as_mut()
            .is_some_and(|doc| edit::update_field(doc, id, field));
        self.dirty |= changed;
        changed
    }

    pub fn update_profile(&mut self, field: ProfileField) {
        let doc = self.document.get_or_insert_with(TailoringDocument::default);
        edit::update_profile(doc, field);
        self.dirty = true;
    }

    pub fn delete_item(&mut self, id: ItemId) -> bool {
        let removed = self
            .document
            .as_mut()
            .is_some_and(|doc| edit::delete_item(doc, id));
        self.dirty |= removed;
        removed
    }

    /// Prepend a new item. Starts a blank document when none is loaded.
    pub fn add_item(&mut self, new: NewItem) -> Result<ItemId, ValidationError> {
        let doc = self.document.get_or_insert_with(TailoringDocument::default);
        let id = edit::add_item(doc, &mut self.ids, new)?;
        self.dirty = true;
        Ok(id)
    }

    /// Items whose idref or comment contains `query`, in document order.
    pub fn filter<'a>(&'a self, query: &str) -> ItemFilter<'a> {
        let items = self
            .document
            .as_ref()
            .map(|doc| doc.items.as_slice())
            .unwrap_or_default();
        edit::filter(items, query)
    }

    /// Render the current document and write it according to `options`.
    pub fn export(&mut self, exporter: &Exporter, options: &ExportOptions) -> Result<ExportResult> {
        let doc = self.document.as_ref().context("no document loaded")?;
        let result = exporter.export(doc, options)?;
        self.dirty = false;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::model::{ItemKind, Selection, Severity};

    #[test]
    fn sample_loads_three_items() {
        let session = EditorSession::with_sample().unwrap();
        let doc = session.document().unwrap();
        assert_eq!(doc.items.len(), 3);
        assert_eq!(doc.items[0].kind, ItemKind::rule(Selection::True, Severity::High));
        assert!(!session.is_dirty());
    }

    #[test]
    fn failed_load_keeps_previous_document() {
        let mut session = EditorSession::with_sample().unwrap();
        let before = session.document().cloned();

        assert!(matches!(session.load_str("<oops"), Err(ParseError::Malformed(_))));
        assert_eq!(
            session.load_str("<Tailoring/>").unwrap_err(),
            ParseError::MissingProfile
        );
        assert_eq!(session.document().cloned(), before);
    }

    #[test]
    fn first_failed_load_leaves_session_empty() {
        let mut session = EditorSession::new();
        assert!(session.load_str("not xml").is_err());
        assert!(session.document().is_none());
        assert_eq!(session.filter("x").count(), 0);
    }

    #[test]
    fn reload_replaces_document_with_fresh_ids() {
        let mut session = EditorSession::with_sample().unwrap();
        let old_ids: Vec<_> = session.document().unwrap().items.iter().map(|i| i.id).collect();
        session.load_str(SAMPLE_TAILORING).unwrap();
        let doc = session.document().unwrap();
        assert_eq!(doc.items.len(), 3);
        assert!(doc.items.iter().all(|item| !old_ids.contains(&item.id)));
    }

    #[test]
    fn edits_mark_session_dirty() {
        let mut session = EditorSession::with_sample().unwrap();
        let id = session.document().unwrap().items[1].id;
        assert!(session.update_field(id, ItemField::Severity(Severity::Low)));
        assert!(session.is_dirty());
    }

    #[test]
    fn add_item_rejects_missing_idref() {
        let mut session = EditorSession::with_sample().unwrap();
        let err = session.add_item(NewItem::rule("", Severity::High)).unwrap_err();
        assert_eq!(err, ValidationError::MissingIdref);
        assert_eq!(session.document().unwrap().items.len(), 3);
        assert!(!session.is_dirty());
    }

    #[test]
    fn load_file_records_source() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("tailoring.xml");
        fs::write(&path, SAMPLE_TAILORING)?;

        let mut session = EditorSession::new();
        session.load_file(&path)?;
        assert_eq!(session.source(), Some(path.as_path()));

        let missing = temp.path().join("missing.xml");
        assert!(session.load_file(&missing).is_err());
        assert_eq!(session.source(), Some(path.as_path()));
        Ok(())
    }
}
