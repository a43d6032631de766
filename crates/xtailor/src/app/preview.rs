//! Live preview of the XML that an export would produce.

use anyhow::Result;

use crate::app::export::{ExportOptions, Exporter};
use crate::domain::model::TailoringDocument;
use crate::infra::highlight::{HighlightResult, Highlighter};

/// Rendered and highlighted export output for the UI layer.
#[derive(Debug, Clone)]
pub struct PreviewSegment {
    pub highlighted: HighlightResult,
    pub line_count: usize,
}

/// Renders documents through the exporter and highlights the result.
#[derive(Debug, Default)]
pub struct PreviewService {
    highlighter: Highlighter,
}

impl PreviewService {
    pub fn new() -> Self {
        Self {
            highlighter: Highlighter::new(),
        }
    }

    /// Theme names accepted by [`PreviewService::preview`].
    pub fn themes(&self) -> Vec<String> {
        self.highlighter.available_themes()
    }

    pub fn preview(
        &self,
        exporter: &Exporter,
        doc: &TailoringDocument,
        options: &ExportOptions,
        theme: &str,
    ) -> Result<PreviewSegment> {
        let rendered = exporter.render(doc, options)?;
        let highlighted = self.highlighter.highlight_xml(&rendered, theme);
        Ok(PreviewSegment {
            line_count: highlighted.lines.len(),
            highlighted,
        })
    }
}
