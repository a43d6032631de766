//! Tailoring item list component and its navigation state.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::app::edit;
use crate::domain::model::{ItemId, ItemKind, Selection, Severity, TailoringDocument, TailoringItem};

/// Visible items after filtering plus the highlighted row.
#[derive(Debug, Default, Clone)]
pub struct ItemListState {
    visible: Vec<ItemId>,
    selected: usize,
    filter: String,
    filter_active: bool,
}

impl ItemListState {
    /// Recompute the visible rows, keeping the highlighted item when it still matches.
    pub fn refresh(&mut self, doc: Option<&TailoringDocument>) {
        let current = self.selected_id();
        self.visible = doc
            .map(|doc| edit::filter(&doc.items, &self.filter).map(|item| item.id).collect())
            .unwrap_or_default();

        if let Some(id) = current
            && let Some(position) = self.visible.iter().position(|visible| *visible == id)
        {
            self.selected = position;
        } else if self.selected >= self.visible.len() {
            self.selected = self.visible.len().saturating_sub(1);
        }
    }

    /// Id of the highlighted item, if any.
    pub fn selected_id(&self) -> Option<ItemId> {
        self.visible.get(self.selected).copied()
    }

    /// Highlight `id` if it is visible.
    pub fn focus(&mut self, id: ItemId) {
        if let Some(position) = self.visible.iter().position(|visible| *visible == id) {
            self.selected = position;
        }
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.visible.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.visible.len().saturating_sub(1);
    }

    pub fn begin_filter(&mut self) {
        self.filter_active = true;
    }

    pub fn end_filter(&mut self) {
        self.filter_active = false;
    }

    pub fn is_filter_active(&self) -> bool {
        self.filter_active
    }

    pub fn push_filter_char(&mut self, ch: char, doc: Option<&TailoringDocument>) {
        self.filter.push(ch);
        self.refresh(doc);
    }

    pub fn pop_filter_char(&mut self, doc: Option<&TailoringDocument>) {
        self.filter.pop();
        self.refresh(doc);
    }

    pub fn set_filter<S: Into<String>>(&mut self, pattern: S, doc: Option<&TailoringDocument>) {
        self.filter = pattern.into();
        self.refresh(doc);
    }

    pub fn clear_filter(&mut self, doc: Option<&TailoringDocument>) {
        self.filter.clear();
        self.refresh(doc);
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn selected_index(&self) -> Option<usize> {
        (!self.visible.is_empty()).then_some(self.selected)
    }

    fn visible_ids(&self) -> &[ItemId] {
        &self.visible
    }
}

/// Ratatui component rendering the item list with its filter line.
#[derive(Debug, Default)]
pub struct ItemList;

impl ItemList {
    pub fn render(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        state: &ItemListState,
        doc: Option<&TailoringDocument>,
        has_focus: bool,
    ) {
        let total = doc.map_or(0, |doc| doc.items.len());
        let title = if state.filter().is_empty() {
            format!("Items · {total}")
        } else {
            format!("Items · {}/{total}", state.visible_len())
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(if has_focus {
                Color::Cyan
            } else {
                Color::DarkGray
            }));
        frame.render_widget(block.clone(), area);

        let inner = block.inner(area);
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(1)])
            .split(inner);

        let filter_text = if state.filter().is_empty() {
            "⌕ filter (press /)".to_string()
        } else {
            format!("⌕ {}", state.filter())
        };
        let mut filter_style = Style::default().fg(Color::Gray);
        if state.is_filter_active() {
            filter_style = filter_style.add_modifier(Modifier::BOLD).fg(Color::Cyan);
        }
        frame.render_widget(Paragraph::new(filter_text).style(filter_style), layout[0]);

        let Some(doc) = doc else {
            frame.render_widget(placeholder("No document loaded · :open <path>"), layout[1]);
            return;
        };
        if state.visible_len() == 0 {
            let message = if doc.items.is_empty() {
                "No items · :add rule <idref>"
            } else {
                "No items match filter"
            };
            frame.render_widget(placeholder(message), layout[1]);
            return;
        }

        let items: Vec<ListItem<'static>> = state
            .visible_ids()
            .iter()
            .filter_map(|id| doc.item(*id))
            .enumerate()
            .map(|(row, item)| {
                let mut list_item = ListItem::new(item_line(item));
                if row % 2 == 1 {
                    list_item = list_item.style(Style::default().bg(Color::Rgb(24, 24, 24)));
                }
                list_item
            })
            .collect();

        let mut list_state = ListState::default();
        list_state.select(state.selected_index());

        let highlight_style = Style::default()
            .fg(Color::Black)
            .bg(if has_focus { Color::Cyan } else { Color::Gray })
            .add_modifier(Modifier::BOLD);

        let list = List::new(items)
            .highlight_style(highlight_style)
            .highlight_symbol("▸ ");
        frame.render_stateful_widget(list, layout[1], &mut list_state);
    }
}

fn placeholder(text: &'static str) -> Paragraph<'static> {
    Paragraph::new(text).style(
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )
}

fn item_line(item: &TailoringItem) -> Line<'static> {
    let mut spans = Vec::new();
    match &item.kind {
        ItemKind::Rule { selected, severity } => {
            let (marker, color) = match selected {
                Selection::True => ("[x] ", Color::Green),
                Selection::False => ("[ ] ", Color::Red),
                Selection::Unset => ("[·] ", Color::DarkGray),
            };
            spans.push(Span::styled(marker, Style::default().fg(color)));
            spans.push(Span::raw(short_idref(&item.idref).to_string()));
            if severity.is_override() {
                spans.push(Span::raw(" "));
                spans.push(Span::styled(
                    severity.as_str().to_uppercase(),
                    Style::default()
                        .fg(severity_color(*severity))
                        .add_modifier(Modifier::BOLD),
                ));
            }
        }
        ItemKind::Variable { value } => {
            spans.push(Span::styled("$ ", Style::default().fg(Color::Magenta)));
            spans.push(Span::raw(short_idref(&item.idref).to_string()));
            spans.push(Span::styled(" = ", Style::default().fg(Color::DarkGray)));
            spans.push(Span::styled(value.clone(), Style::default().fg(Color::Yellow)));
        }
    }
    if item.comment.is_some() {
        spans.push(Span::styled(" ✎", Style::default().fg(Color::DarkGray)));
    }
    Line::from(spans)
}

/// Strip the `xccdf_<namespace>_rule_` / `_value_` prefix for display.
pub fn short_idref(idref: &str) -> &str {
    ["_rule_", "_value_"]
        .iter()
        .find_map(|marker| idref.find(marker).map(|at| &idref[at + marker.len()..]))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(idref)
}

pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::High => Color::Red,
        Severity::Medium => Color::Yellow,
        Severity::Low => Color::Blue,
        Severity::Info => Color::Gray,
        Severity::Default => Color::DarkGray,
    }
}
