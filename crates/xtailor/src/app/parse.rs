//! Parsing tailoring XML into the editable model.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use roxmltree::{Document, Node};

use crate::domain::errors::ParseError;
use crate::domain::model::{
    ItemIdGenerator, ItemKind, Selection, Severity, TailoringDocument, TailoringItem,
    UNKNOWN_PROFILE_TITLE,
};

/// Parse `text` into a [`TailoringDocument`], allocating item ids from `ids`.
///
/// Elements are matched by local name, so both `xccdf:select` and a bare `select` are accepted.
pub fn parse_document(
    text: &str,
    ids: &mut ItemIdGenerator,
) -> Result<TailoringDocument, ParseError> {
    let xml = Document::parse(text).map_err(|err| ParseError::Malformed(err.to_string()))?;

    let tailoring = xml
        .descendants()
        .find(|node| is_element_named(node, "Tailoring"))
        .unwrap_or_else(|| xml.root_element());

    let benchmark_href = child_element(tailoring, "benchmark")
        .and_then(|node| node.attribute("href"))
        .unwrap_or_default()
        .to_string();
    let version_text = child_element(tailoring, "version")
        .map(|node| text_content(node).trim().to_string())
        .unwrap_or_default();

    let profile = xml
        .descendants()
        .find(|node| is_element_named(node, "Profile"))
        .ok_or(ParseError::MissingProfile)?;

    let profile_title = child_element(profile, "title")
        .map(|node| text_content(node).trim().to_string())
        .unwrap_or_else(|| UNKNOWN_PROFILE_TITLE.to_string());
    let profile_description = child_element(profile, "description")
        .map(|node| text_content(node).trim().to_string())
        .unwrap_or_default();

    let items = ProfileWalker::new(ids).walk(profile);

    tracing::debug!(
        profile = profile.attribute("id").unwrap_or_default(),
        items = items.len(),
        "parsed tailoring document"
    );

    Ok(TailoringDocument {
        benchmark_href,
        version_text,
        profile_id: profile.attribute("id").unwrap_or_default().to_string(),
        profile_extends: profile.attribute("extends").unwrap_or_default().to_string(),
        profile_title,
        profile_description,
        items,
    })
}

/// Single pass over the direct children of a `Profile` element.
struct ProfileWalker<'a> {
    ids: &'a mut ItemIdGenerator,
    items: Vec<TailoringItem>,
    rules: HashMap<String, usize>,
    pending_comment: Option<String>,
}

impl<'a> ProfileWalker<'a> {
    fn new(ids: &'a mut ItemIdGenerator) -> Self {
        Self {
            ids,
            items: Vec::new(),
            rules: HashMap::new(),
            pending_comment: None,
        }
    }

    fn walk(mut self, profile: Node<'_, '_>) -> Vec<TailoringItem> {
        for child in profile.children() {
            if child.is_comment() {
                let text = child.text().unwrap_or_default().trim();
                self.pending_comment = (!text.is_empty()).then(|| text.to_string());
                continue;
            }
            if !child.is_element() {
                continue;
            }

            // Unrecognized elements and elements without an idref leave the pending comment for
            // the next recognized item.
            let Some(idref) = child.attribute("idref").filter(|idref| !idref.is_empty()) else {
                continue;
            };

            match child.tag_name().name() {
                "select" => {
                    let selected =
                        Selection::from_attribute(child.attribute("selected").unwrap_or("false"));
                    self.upsert_rule(idref, |kind| {
                        if let ItemKind::Rule { selected: slot, .. } = kind {
                            *slot = selected;
                        }
                    });
                }
                "refine-rule" => {
                    let severity = Severity::from_attribute(child.attribute("severity").unwrap_or(""));
                    self.upsert_rule(idref, |kind| {
                        if let ItemKind::Rule { severity: slot, .. } = kind {
                            *slot = severity;
                        }
                    });
                }
                "set-value" => {
                    let comment = self.pending_comment.take();
                    let id = self.ids.next_id();
                    self.items.push(TailoringItem {
                        id,
                        idref: idref.to_string(),
                        comment,
                        kind: ItemKind::variable(text_content(child)),
                    });
                }
                other => {
                    tracing::trace!(element = other, idref, "ignoring unsupported profile child");
                }
            }
        }
        self.items
    }

    /// Create the merged rule item for `idref` on first sight, then apply `update` to it.
    ///
    /// A newly created rule takes the pending comment; the slot is cleared either way.
    fn upsert_rule(&mut self, idref: &str, update: impl FnOnce(&mut ItemKind)) {
        let comment = self.pending_comment.take();
        let index = match self.rules.entry(idref.to_string()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let index = self.items.len();
                self.items.push(TailoringItem {
                    id: self.ids.next_id(),
                    idref: idref.to_string(),
                    comment,
                    kind: ItemKind::rule(Selection::Unset, Severity::Default),
                });
                *entry.insert(index)
            }
        };
        update(&mut self.items[index].kind);
    }
}

fn is_element_named(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| is_element_named(child, name))
}

/// Concatenated text of all descendant text nodes.
fn text_content(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "http://checklists.nist.gov/xccdf/1.2";

    fn parse(profile_body: &str) -> TailoringDocument {
        let text = format!(
            r#"<?xml version="1.0"?>
<xccdf:Tailoring xmlns:xccdf="{NS}" id="t">
  <xccdf:benchmark href="ssg-ubuntu2204-ds.xml"/>
  <xccdf:version time="2024-01-01T00:00:00">1</xccdf:version>
  <xccdf:Profile id="custom" extends="base">
    <xccdf:title>Custom</xccdf:title>
    {profile_body}
  </xccdf:Profile>
</xccdf:Tailoring>"#
        );
        parse_document(&text, &mut ItemIdGenerator::new()).expect("valid document")
    }

    fn rule_state(item: &TailoringItem) -> (Selection, Severity) {
        match item.kind {
            ItemKind::Rule { selected, severity } => (selected, severity),
            ItemKind::Variable { .. } => panic!("expected rule item"),
        }
    }

    #[test]
    fn reads_profile_metadata() {
        let doc = parse("");
        assert_eq!(doc.benchmark_href, "ssg-ubuntu2204-ds.xml");
        assert_eq!(doc.version_text, "1");
        assert_eq!(doc.profile_id, "custom");
        assert_eq!(doc.profile_extends, "base");
        assert_eq!(doc.profile_title, "Custom");
        assert_eq!(doc.profile_description, "");
        assert!(doc.items.is_empty());
    }

    #[test]
    fn missing_metadata_falls_back_to_defaults() {
        let text = r#"<Tailoring><Profile id="p"/></Tailoring>"#;
        let doc = parse_document(text, &mut ItemIdGenerator::new()).unwrap();
        assert_eq!(doc.benchmark_href, "");
        assert_eq!(doc.version_text, "");
        assert_eq!(doc.profile_title, UNKNOWN_PROFILE_TITLE);
        assert_eq!(doc.profile_extends, "");
    }

    #[test]
    fn malformed_xml_is_reported() {
        let err = parse_document("<Tailoring><Profile>", &mut ItemIdGenerator::new()).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn missing_profile_is_reported() {
        let err = parse_document("<Tailoring/>", &mut ItemIdGenerator::new()).unwrap_err();
        assert_eq!(err, ParseError::MissingProfile);
    }

    #[test]
    fn select_then_refine_merges_at_select_position() {
        let doc = parse(
            r#"<xccdf:select idref="A" selected="true"/>
               <xccdf:select idref="B" selected="false"/>
               <xccdf:refine-rule idref="A" severity="high"/>"#,
        );
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[0].idref, "A");
        assert_eq!(rule_state(&doc.items[0]), (Selection::True, Severity::High));
        assert_eq!(rule_state(&doc.items[1]), (Selection::False, Severity::Default));
    }

    #[test]
    fn refine_before_select_keeps_refine_position() {
        let doc = parse(
            r#"<xccdf:refine-rule idref="B" severity="low"/>
               <xccdf:select idref="C" selected="true"/>
               <xccdf:select idref="B" selected="true"/>"#,
        );
        let idrefs: Vec<_> = doc.items.iter().map(|item| item.idref.as_str()).collect();
        assert_eq!(idrefs, ["B", "C"]);
        assert_eq!(rule_state(&doc.items[0]), (Selection::True, Severity::Low));
    }

    #[test]
    fn refine_only_rule_is_unset() {
        let doc = parse(r#"<xccdf:refine-rule idref="B" severity="medium"/>"#);
        assert_eq!(rule_state(&doc.items[0]), (Selection::Unset, Severity::Medium));
    }

    #[test]
    fn select_without_selected_attribute_defaults_to_false() {
        let doc = parse(r#"<xccdf:select idref="A"/>"#);
        assert_eq!(rule_state(&doc.items[0]).0, Selection::False);
    }

    #[test]
    fn duplicate_select_overwrites_in_place() {
        let doc = parse(
            r#"<xccdf:select idref="A" selected="true"/>
               <xccdf:select idref="Z" selected="true"/>
               <xccdf:select idref="A" selected="false"/>"#,
        );
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[0].idref, "A");
        assert_eq!(rule_state(&doc.items[0]).0, Selection::False);
    }

    #[test]
    fn set_values_are_never_merged() {
        let doc = parse(
            r#"<xccdf:set-value idref="V">one</xccdf:set-value>
               <xccdf:set-value idref="V">two</xccdf:set-value>"#,
        );
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[0].kind, ItemKind::variable("one"));
        assert_eq!(doc.items[1].kind, ItemKind::variable("two"));
        assert_ne!(doc.items[0].id, doc.items[1].id);
    }

    #[test]
    fn comment_attaches_to_next_recognized_item() {
        let doc = parse(
            r#"<!--  disable cramfs  -->
               <xccdf:unknown idref="X"/>
               <xccdf:select/>
               <xccdf:select idref="A" selected="true"/>
               <xccdf:select idref="B" selected="true"/>"#,
        );
        assert_eq!(doc.items[0].comment.as_deref(), Some("disable cramfs"));
        assert_eq!(doc.items[1].comment, None);
    }

    #[test]
    fn comment_before_merge_into_existing_rule_is_dropped() {
        let doc = parse(
            r#"<xccdf:select idref="A" selected="true"/>
               <!-- about A again -->
               <xccdf:refine-rule idref="A" severity="high"/>
               <xccdf:set-value idref="V">x</xccdf:set-value>"#,
        );
        assert_eq!(doc.items[0].comment, None);
        assert_eq!(doc.items[1].comment, None);
    }

    #[test]
    fn later_comment_replaces_pending_one() {
        let doc = parse(
            r#"<!-- first -->
               <!-- second -->
               <xccdf:set-value idref="V">x</xccdf:set-value>"#,
        );
        assert_eq!(doc.items[0].comment.as_deref(), Some("second"));
    }

    #[test]
    fn accepts_unqualified_elements() {
        let text = r#"<Tailoring>
  <benchmark href="b.xml"/>
  <Profile id="p" extends="q">
    <title>T</title>
    <description>D</description>
    <select idref="A" selected="true"/>
    <set-value idref="V">v &amp; w</set-value>
  </Profile>
</Tailoring>"#;
        let doc = parse_document(text, &mut ItemIdGenerator::new()).unwrap();
        assert_eq!(doc.profile_description, "D");
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[1].kind, ItemKind::variable("v & w"));
    }
}
