//! Export preview pane showing highlighted XML.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::app::preview::PreviewSegment;
use crate::infra::highlight::HighlightSpan;

#[derive(Debug, Default)]
pub struct Preview;

impl Preview {
    pub fn render(
        &self,
        segment: Option<&PreviewSegment>,
        scroll: u16,
        has_focus: bool,
        area: Rect,
        buf: &mut Buffer,
    ) {
        let title = match segment {
            Some(segment) => format!("Export preview · {} lines", segment.line_count),
            None => "Export preview".to_string(),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if has_focus {
                Color::Cyan
            } else {
                Color::DarkGray
            }));
        let inner = block.inner(area);
        block.render(area, buf);

        let lines: Vec<Line<'_>> = match segment {
            Some(segment) => segment
                .highlighted
                .lines
                .iter()
                .map(|line| Line::from(line.spans.iter().map(to_span).collect::<Vec<_>>()))
                .collect(),
            None => vec![Line::styled(
                "(nothing to preview)",
                Style::default().fg(Color::DarkGray),
            )],
        };

        Paragraph::new(lines).scroll((scroll, 0)).render(inner, buf);
    }
}

fn to_span(span: &HighlightSpan) -> Span<'_> {
    let mut style = Style::default();
    if let Some(color) = span.style.foreground {
        style = style.fg(Color::Rgb(color.r, color.g, color.b));
    }
    if span.style.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if span.style.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    Span::styled(span.content.as_str(), style)
}

#[cfg(test)]
mod tests {
    use super::*;

    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::app::export::{ExportOptions, Exporter};
    use crate::app::preview::PreviewService;
    use crate::app::session::EditorSession;
    use crate::infra::highlight::DEFAULT_THEME;

    #[test]
    fn renders_highlighted_export() {
        let session = EditorSession::with_sample().unwrap();
        let segment = PreviewService::new()
            .preview(
                &Exporter::new().unwrap(),
                session.document().unwrap(),
                &ExportOptions::default(),
                DEFAULT_THEME,
            )
            .unwrap();

        let backend = TestBackend::new(120, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| {
                let area = frame.size();
                Preview.render(Some(&segment), 0, true, area, frame.buffer_mut());
            })
            .unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("xccdf:Tailoring"));
    }
}
