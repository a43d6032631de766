//! Profile metadata and selected item details.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::domain::model::{ItemKind, TailoringDocument, TailoringItem};
use crate::ui::components::item_list::severity_color;

/// Displays the profile header and the fields of the highlighted item.
#[derive(Debug, Default)]
pub struct ItemDetail;

impl ItemDetail {
    pub fn render(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        doc: Option<&TailoringDocument>,
        item: Option<&TailoringItem>,
        dirty: bool,
    ) {
        let title = if dirty { "Profile · modified" } else { "Profile" };
        let block = Block::default().title(title).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(doc) = doc else {
            let placeholder = Paragraph::new("No document loaded")
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(placeholder, inner);
            return;
        };

        let mut lines = profile_lines(doc);
        lines.push(Line::raw(""));
        match item {
            Some(item) => lines.extend(item_lines(item)),
            None => lines.push(Line::styled(
                "No item selected",
                Style::default().fg(Color::DarkGray),
            )),
        }

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
    }
}

fn field(label: &'static str, value: impl Into<String>) -> Line<'static> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Gray)),
        Span::raw(": "),
        Span::raw(value.into()),
    ])
}

fn profile_lines(doc: &TailoringDocument) -> Vec<Line<'static>> {
    vec![
        Line::styled(
            doc.profile_title.clone(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        field("Profile", doc.profile_id.clone()),
        field("Extends", doc.profile_extends.clone()),
        field("Benchmark", doc.benchmark_href.clone()),
        field(
            "Items",
            format!(
                "{} rules · {} variables",
                doc.rule_count(),
                doc.variable_count()
            ),
        ),
    ]
}

fn item_lines(item: &TailoringItem) -> Vec<Line<'static>> {
    let mut lines = vec![field("Type", item.kind.label()), field("Idref", item.idref.clone())];
    match &item.kind {
        ItemKind::Rule { selected, severity } => {
            lines.push(field("Selected", selected.as_str()));
            lines.push(Line::from(vec![
                Span::styled("Severity", Style::default().fg(Color::Gray)),
                Span::raw(": "),
                Span::styled(severity.as_str(), Style::default().fg(severity_color(*severity))),
            ]));
        }
        ItemKind::Variable { value } => lines.push(field("Value", value.clone())),
    }
    if let Some(comment) = &item.comment {
        lines.push(Line::styled(
            format!("# {}", comment.replace('\n', " ")),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ));
    }
    lines
}
