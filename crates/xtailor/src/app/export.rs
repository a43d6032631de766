//! Serializing tailoring documents back to XCCDF XML.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use minijinja::{AutoEscape, Environment};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::domain::model::{ItemKind, TailoringDocument, TailoringItem};
use crate::infra::clipboard::Clipboard;
use crate::infra::config::Config;

/// Name of the built-in tailoring template.
pub const BUILTIN_TEMPLATE: &str = "xccdf_tailoring";
/// XCCDF 1.2 namespace used for every emitted element.
pub const XCCDF_NAMESPACE: &str = "http://checklists.nist.gov/xccdf/1.2";
/// MIME type of exported documents.
pub const MIME_TYPE: &str = "application/xml";

/// Runtime options controlling export behavior.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub template: String,
    pub tailoring_id: String,
    pub locale: String,
    /// Escape markup-significant characters in values. When disabled, values are written
    /// verbatim and may produce a document that no longer parses.
    pub escape_markup: bool,
    pub output_path: Option<PathBuf>,
    pub copy_to_clipboard: bool,
}

impl ExportOptions {
    /// Build options from configuration defaults.
    pub fn from_config(config: &Config) -> Self {
        Self {
            template: config.export.template(),
            tailoring_id: config.export.tailoring_id(),
            locale: config.export.locale(),
            escape_markup: config.export.escape_markup(),
            output_path: None,
            copy_to_clipboard: config.export.copy_to_clipboard(),
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of an export operation.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub rendered: String,
    pub output_path: Option<PathBuf>,
    pub copied_to_clipboard: bool,
}

/// Renders documents to XML and writes the artifacts.
pub struct Exporter {
    env: Environment<'static>,
    clipboard: Mutex<Clipboard>,
}

impl Exporter {
    /// Create an exporter with the built-in template registered.
    pub fn new() -> Result<Self> {
        Ok(Self {
            env: default_environment()?,
            clipboard: Mutex::new(Clipboard::new()),
        })
    }

    /// Render `doc`, stamping the version with the current time.
    pub fn render(&self, doc: &TailoringDocument, options: &ExportOptions) -> Result<String> {
        self.render_at(doc, options, OffsetDateTime::now_utc())
    }

    /// Render `doc` with an explicit version timestamp.
    pub fn render_at(
        &self,
        doc: &TailoringDocument,
        options: &ExportOptions,
        timestamp: OffsetDateTime,
    ) -> Result<String> {
        let context = build_template_context(doc, options, timestamp)?;
        self.render_with_template(&context, &options.template)
    }

    /// Render the document and persist/copy outputs based on options.
    pub fn export(&self, doc: &TailoringDocument, options: &ExportOptions) -> Result<ExportResult> {
        let rendered = self.render(doc, options)?;

        if let Some(path) = &options.output_path {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create export directory: {}", parent.display())
                })?;
            }
            fs::write(path, &rendered)
                .with_context(|| format!("failed to write export output to {}", path.display()))?;
            tracing::info!(
                path = %path.display(),
                bytes = rendered.len(),
                mime = MIME_TYPE,
                "exported tailoring"
            );
        }

        if options.copy_to_clipboard {
            self.clipboard
                .lock()
                .map_err(|_| anyhow!("clipboard lock poisoned"))?
                .copy(&rendered)
                .context("failed to copy export to clipboard")?;
        }

        Ok(ExportResult {
            rendered,
            output_path: options.output_path.clone(),
            copied_to_clipboard: options.copy_to_clipboard,
        })
    }

    fn render_with_template(
        &self,
        context: &TemplateContext,
        template_name: &str,
    ) -> Result<String> {
        if let Ok(template) = self.env.get_template(template_name) {
            return template
                .render(context)
                .map_err(|err| anyhow!("failed to render template '{template_name}': {err}"));
        }

        let template_path = Path::new(template_name);
        if template_path.exists() {
            let source = fs::read_to_string(template_path).with_context(|| {
                format!(
                    "failed to load template from path {}",
                    template_path.display()
                )
            })?;
            let mut env = Environment::new();
            configure(&mut env);
            env.add_template("external", &source)
                .map_err(|err| anyhow!("invalid template '{template_name}': {err}"))?;
            return env
                .get_template("external")
                .and_then(|template| template.render(context))
                .map_err(|err| anyhow!("failed to render template '{template_name}': {err}"));
        }

        Err(anyhow!(
            "template '{}' not found (built-in or filesystem)",
            template_name
        ))
    }
}

fn configure(env: &mut Environment<'_>) {
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_keep_trailing_newline(true);
    // Escaping is decided per export in `build_template_context`.
    env.set_auto_escape_callback(|_| AutoEscape::None);
}

fn default_environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    configure(&mut env);
    env.add_template(BUILTIN_TEMPLATE, TAILORING_TEMPLATE)
        .map_err(|err| anyhow!("failed to register tailoring template: {err}"))?;
    Ok(env)
}

fn build_template_context(
    doc: &TailoringDocument,
    options: &ExportOptions,
    timestamp: OffsetDateTime,
) -> Result<TemplateContext> {
    let generated_at = timestamp
        .format(&Rfc3339)
        .context("failed to format export timestamp")?;

    let text = |value: &str| {
        if options.escape_markup {
            escape_markup(value)
        } else {
            value.to_string()
        }
    };

    let mut items = Vec::with_capacity(doc.items.len());
    let mut dropped = 0usize;
    for item in &doc.items {
        // Rules without a selection or severity override carry no markup, so their comment is
        // dropped with them.
        if !item.emits_markup() {
            dropped += 1;
            continue;
        }
        items.push(template_item(item, options.escape_markup, &text));
    }
    if dropped > 0 {
        tracing::debug!(dropped, "rules without explicit state omitted from export");
    }

    Ok(TemplateContext {
        namespace: XCCDF_NAMESPACE,
        tailoring_id: text(&options.tailoring_id),
        locale: text(&options.locale),
        generated_at,
        benchmark_href: text(&doc.benchmark_href),
        version: text(&doc.version_text),
        profile: TemplateProfile {
            id: text(&doc.profile_id),
            extends: text(&doc.profile_extends),
            title: text(&doc.profile_title),
            description: text(&doc.profile_description),
        },
        items,
    })
}

fn template_item(
    item: &TailoringItem,
    escape: bool,
    text: &impl Fn(&str) -> String,
) -> TemplateItem {
    let comment = item
        .comment
        .as_deref()
        .filter(|comment| !comment.is_empty())
        .map(|comment| {
            if escape {
                sanitize_comment(comment)
            } else {
                comment.to_string()
            }
        });

    match &item.kind {
        ItemKind::Rule { selected, severity } => TemplateItem {
            kind: "rule",
            idref: text(&item.idref),
            comment,
            selected: selected.is_set().then(|| selected.as_str()),
            severity: severity.is_override().then(|| severity.as_str()),
            value: None,
        },
        ItemKind::Variable { value } => TemplateItem {
            kind: "variable",
            idref: text(&item.idref),
            comment,
            selected: None,
            severity: None,
            value: Some(text(value)),
        },
    }
}

/// Escape the five XML predefined entities.
pub fn escape_markup(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Comments cannot contain `--`; split every run so the output stays well-formed.
fn sanitize_comment(comment: &str) -> String {
    let mut sanitized = comment.to_string();
    while sanitized.contains("--") {
        sanitized = sanitized.replace("--", "- -");
    }
    sanitized
}

#[derive(Serialize)]
struct TemplateContext {
    namespace: &'static str,
    tailoring_id: String,
    locale: String,
    generated_at: String,
    benchmark_href: String,
    version: String,
    profile: TemplateProfile,
    items: Vec<TemplateItem>,
}

#[derive(Serialize)]
struct TemplateProfile {
    id: String,
    extends: String,
    title: String,
    description: String,
}

#[derive(Serialize)]
struct TemplateItem {
    kind: &'static str,
    idref: String,
    comment: Option<String>,
    selected: Option<&'static str>,
    severity: Option<&'static str>,
    value: Option<String>,
}

const TAILORING_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xccdf:Tailoring xmlns:xccdf="{{ namespace }}" id="{{ tailoring_id }}">
  <xccdf:benchmark href="{{ benchmark_href }}"/>
  <xccdf:version time="{{ generated_at }}">{{ version }}</xccdf:version>
  <xccdf:Profile id="{{ profile.id }}" extends="{{ profile.extends }}">
    <xccdf:title xmlns:xhtml="http://www.w3.org/1999/xhtml" xml:lang="{{ locale }}" override="true">{{ profile.title }}</xccdf:title>
    <xccdf:description xmlns:xhtml="http://www.w3.org/1999/xhtml" xml:lang="{{ locale }}" override="true">{{ profile.description }}</xccdf:description>
{% for item in items %}
{% if item.comment %}
    <!-- {{ item.comment }} -->
{% endif %}
{% if item.selected %}
    <xccdf:select idref="{{ item.idref }}" selected="{{ item.selected }}"/>
{% endif %}
{% if item.severity %}
    <xccdf:refine-rule idref="{{ item.idref }}" severity="{{ item.severity }}"/>
{% endif %}
{% if item.kind == "variable" %}
    <xccdf:set-value idref="{{ item.idref }}">{{ item.value }}</xccdf:set-value>
{% endif %}
{% endfor %}
  </xccdf:Profile>
</xccdf:Tailoring>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    use time::macros::datetime;

    use crate::domain::model::{ItemIdGenerator, Selection, Severity};

    fn document(items: Vec<(Option<&str>, &str, ItemKind)>) -> TailoringDocument {
        let mut ids = ItemIdGenerator::new();
        TailoringDocument {
            benchmark_href: "ssg-ubuntu2204-ds.xml".into(),
            version_text: "1".into(),
            profile_id: "xccdf_custom_profile".into(),
            profile_extends: "xccdf_base_profile".into(),
            profile_title: "Custom".into(),
            profile_description: "Tailored".into(),
            items: items
                .into_iter()
                .map(|(comment, idref, kind)| TailoringItem {
                    id: ids.next_id(),
                    idref: idref.into(),
                    comment: comment.map(Into::into),
                    kind,
                })
                .collect(),
        }
    }

    fn render(doc: &TailoringDocument, options: &ExportOptions) -> String {
        Exporter::new()
            .unwrap()
            .render_at(doc, options, datetime!(2024-05-01 12:30:00 UTC))
            .unwrap()
    }

    #[test]
    fn renders_fixed_header_and_profile() {
        let rendered = render(&document(Vec::new()), &ExportOptions::default());
        assert!(rendered.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(rendered.contains(&format!("xmlns:xccdf=\"{XCCDF_NAMESPACE}\"")));
        assert!(rendered.contains("id=\"xccdf_scap-workbench_tailoring_default\""));
        assert!(rendered.contains("<xccdf:benchmark href=\"ssg-ubuntu2204-ds.xml\"/>"));
        assert!(rendered.contains("<xccdf:version time=\"2024-05-01T12:30:00Z\">1</xccdf:version>"));
        assert!(rendered.contains("<xccdf:Profile id=\"xccdf_custom_profile\" extends=\"xccdf_base_profile\">"));
        assert!(rendered.contains("xml:lang=\"en-US\" override=\"true\">Custom</xccdf:title>"));
        assert!(rendered.trim_end().ends_with("</xccdf:Tailoring>"));
    }

    #[test]
    fn renders_items_in_order_with_comments() {
        let doc = document(vec![
            (Some("cramfs"), "A", ItemKind::rule(Selection::True, Severity::High)),
            (None, "B", ItemKind::rule(Selection::False, Severity::Default)),
            (None, "C", ItemKind::rule(Selection::Unset, Severity::Low)),
            (None, "V", ItemKind::variable("enforce")),
        ]);
        let rendered = render(&doc, &ExportOptions::default());

        let expected = [
            "<!-- cramfs -->",
            "<xccdf:select idref=\"A\" selected=\"true\"/>",
            "<xccdf:refine-rule idref=\"A\" severity=\"high\"/>",
            "<xccdf:select idref=\"B\" selected=\"false\"/>",
            "<xccdf:refine-rule idref=\"C\" severity=\"low\"/>",
            "<xccdf:set-value idref=\"V\">enforce</xccdf:set-value>",
        ];
        let mut cursor = 0;
        for fragment in expected {
            let found = rendered[cursor..]
                .find(fragment)
                .unwrap_or_else(|| panic!("missing {fragment} in\n{rendered}"));
            cursor += found + fragment.len();
        }
        assert!(!rendered.contains("refine-rule idref=\"B\""));
        assert!(!rendered.contains("select idref=\"C\""));
    }

    #[test]
    fn rule_without_state_is_dropped_with_its_comment() {
        let doc = document(vec![(
            Some("metadata only"),
            "A",
            ItemKind::rule(Selection::Unset, Severity::Default),
        )]);
        let rendered = render(&doc, &ExportOptions::default());
        assert!(!rendered.contains("idref=\"A\""));
        assert!(!rendered.contains("metadata only"));
    }

    #[test]
    fn empty_variable_value_still_emits_set_value() {
        let doc = document(vec![(None, "V", ItemKind::variable(""))]);
        let rendered = render(&doc, &ExportOptions::default());
        assert!(rendered.contains("<xccdf:set-value idref=\"V\"></xccdf:set-value>"));
    }

    #[test]
    fn escapes_markup_by_default() {
        let doc = document(vec![(
            Some("a -- b"),
            "V",
            ItemKind::variable("<a & 'b'>"),
        )]);
        let rendered = render(&doc, &ExportOptions::default());
        assert!(rendered.contains(">&lt;a &amp; &apos;b&apos;&gt;</xccdf:set-value>"));
        assert!(rendered.contains("<!-- a - - b -->"));
    }

    #[test]
    fn raw_mode_writes_values_verbatim() {
        let doc = document(vec![(Some("a -- b"), "V", ItemKind::variable("x & y"))]);
        let options = ExportOptions {
            escape_markup: false,
            ..ExportOptions::default()
        };
        let rendered = render(&doc, &options);
        assert!(rendered.contains(">x & y</xccdf:set-value>"));
        assert!(rendered.contains("<!-- a -- b -->"));
    }

    #[test]
    fn sanitize_comment_removes_every_double_dash() {
        assert_eq!(sanitize_comment("---"), "- - -");
        assert!(!sanitize_comment("a----b").contains("--"));
    }

    #[test]
    fn export_writes_output_file() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("out/tailoring_custom.xml");
        let options = ExportOptions {
            output_path: Some(path.clone()),
            copy_to_clipboard: false,
            ..ExportOptions::default()
        };
        let doc = document(vec![(None, "V", ItemKind::variable("enforce"))]);
        let result = Exporter::new()?.export(&doc, &options)?;
        assert_eq!(fs::read_to_string(&path)?, result.rendered);
        assert!(!result.copied_to_clipboard);
        Ok(())
    }

    #[test]
    fn external_template_is_loaded_from_disk() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("minimal.xml.j2");
        fs::write(&path, "{{ profile.id }}:{% for item in items %}{{ item.idref }};{% endfor %}")?;
        let options = ExportOptions {
            template: path.display().to_string(),
            ..ExportOptions::default()
        };
        let doc = document(vec![(None, "V", ItemKind::variable("x"))]);
        assert_eq!(render(&doc, &options), "xccdf_custom_profile:V;");
        Ok(())
    }

    #[test]
    fn unknown_template_is_an_error() {
        let options = ExportOptions {
            template: "no-such-template".into(),
            ..ExportOptions::default()
        };
        let result = Exporter::new()
            .unwrap()
            .render(&document(Vec::new()), &options);
        assert!(result.is_err());
    }
}
