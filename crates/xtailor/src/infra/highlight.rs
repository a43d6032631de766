//! XML syntax highlighting built on top of syntect.

use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style as SyntectStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};

pub const DEFAULT_THEME: &str = "base16-ocean.dark";

static DEFAULT_ASSETS: Lazy<(Arc<SyntaxSet>, Arc<ThemeSet>)> = Lazy::new(|| {
    (
        Arc::new(SyntaxSet::load_defaults_newlines()),
        Arc::new(ThemeSet::load_defaults()),
    )
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HighlightStyle {
    pub foreground: Option<RgbColor>,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    pub content: String,
    pub style: HighlightStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HighlightLine {
    pub spans: Vec<HighlightSpan>,
}

impl HighlightLine {
    fn plain(line: &str) -> Self {
        Self {
            spans: vec![HighlightSpan {
                content: line.to_string(),
                style: HighlightStyle::default(),
            }],
        }
    }

    /// Text of the line without styling.
    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.content.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightMode {
    Highlighted,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightResult {
    pub lines: Vec<HighlightLine>,
    pub theme: String,
    pub mode: HighlightMode,
}

impl HighlightResult {
    pub fn plain(text: &str, theme: String) -> Self {
        Self {
            lines: text.lines().map(HighlightLine::plain).collect(),
            theme,
            mode: HighlightMode::Plain,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Highlighter {
    syntax_set: Arc<SyntaxSet>,
    theme_set: Arc<ThemeSet>,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    pub fn new() -> Self {
        let assets = &*DEFAULT_ASSETS;
        Self {
            syntax_set: Arc::clone(&assets.0),
            theme_set: Arc::clone(&assets.1),
        }
    }

    pub fn available_themes(&self) -> Vec<String> {
        let mut themes: Vec<_> = self.theme_set.themes.keys().cloned().collect();
        themes.sort();
        themes
    }

    /// Highlight an XML document line by line.
    pub fn highlight_xml(&self, text: &str, theme: &str) -> HighlightResult {
        let Some((theme_name, resolved)) = self.resolve_theme(theme) else {
            return HighlightResult::plain(text, theme.to_string());
        };
        let Some(syntax) = self.syntax_set.find_syntax_by_extension("xml") else {
            tracing::debug!("no XML syntax bundled with syntect");
            return HighlightResult::plain(text, theme_name);
        };

        match self.highlight_with_syntax(text, resolved, syntax) {
            Ok(lines) => HighlightResult {
                lines,
                theme: theme_name,
                mode: HighlightMode::Highlighted,
            },
            Err(err) => {
                tracing::warn!(error = %err, "XML highlighting failed");
                HighlightResult::plain(text, theme_name)
            }
        }
    }

    fn highlight_with_syntax(
        &self,
        text: &str,
        theme: &Theme,
        syntax: &SyntaxReference,
    ) -> Result<Vec<HighlightLine>> {
        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut result = Vec::new();
        for line in text.lines() {
            // The newline-aware syntax set expects the terminator to be present.
            let terminated = format!("{line}\n");
            let segments = highlighter.highlight_line(&terminated, &self.syntax_set)?;
            let spans = segments
                .into_iter()
                .map(|(style, content)| HighlightSpan {
                    content: content.trim_end_matches('\n').to_string(),
                    style: convert_style(style),
                })
                .filter(|span| !span.content.is_empty())
                .collect();
            result.push(HighlightLine { spans });
        }
        Ok(result)
    }

    fn resolve_theme(&self, requested: &str) -> Option<(String, &Theme)> {
        if let Some(theme) = self.theme_set.themes.get(requested) {
            return Some((requested.to_string(), theme));
        }

        if let Some((name, theme)) = self
            .theme_set
            .themes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(requested))
        {
            return Some((name.clone(), theme));
        }

        let (name, theme) = self
            .theme_set
            .themes
            .get_key_value(DEFAULT_THEME)
            .or_else(|| self.theme_set.themes.iter().next())?;
        tracing::warn!(requested, fallback = %name, "theme not found");
        Some((name.clone(), theme))
    }
}

fn convert_style(style: SyntectStyle) -> HighlightStyle {
    let foreground = style.foreground;
    HighlightStyle {
        foreground: (foreground.a != 0).then_some(RgbColor {
            r: foreground.r,
            g: foreground.g,
            b: foreground.b,
        }),
        bold: style.font_style.contains(FontStyle::BOLD),
        italic: style.font_style.contains(FontStyle::ITALIC),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = "<a href=\"x\">\n  <b/>\n</a>";

    #[test]
    fn highlights_xml_lines() {
        let result = Highlighter::new().highlight_xml(XML, DEFAULT_THEME);
        assert_eq!(result.mode, HighlightMode::Highlighted);
        assert_eq!(result.lines.len(), 3);
        assert_eq!(result.lines[1].text(), "  <b/>");
    }

    #[test]
    fn unknown_theme_falls_back() {
        let result = Highlighter::new().highlight_xml(XML, "not-a-theme");
        assert_eq!(result.mode, HighlightMode::Highlighted);
        assert_ne!(result.theme, "not-a-theme");
    }

    #[test]
    fn theme_lookup_ignores_case() {
        let highlighter = Highlighter::new();
        assert!(highlighter.available_themes().iter().any(|name| name == DEFAULT_THEME));
        let result = highlighter.highlight_xml(XML, "BASE16-OCEAN.DARK");
        assert_eq!(result.theme, DEFAULT_THEME);
    }
}
