//! Command palette for editing commands.

use std::time::{Duration, Instant};

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Commands understood by the editor, with a usage hint each.
pub const COMMANDS: &[(&str, &str)] = &[
    ("open", "open <path>"),
    ("sample", "sample"),
    ("add", "add rule <idref> [severity] [# comment] | add var <idref> <value>"),
    ("value", "value <text>"),
    ("comment", "comment [text]"),
    ("idref", "idref <text>"),
    ("severity", "severity <default|high|medium|low|info>"),
    ("select", "select <true|false|unset>"),
    ("delete", "delete"),
    ("title", "title <text>"),
    ("description", "description <text>"),
    ("profile", "profile <id>"),
    ("extends", "extends <id>"),
    ("benchmark", "benchmark <href>"),
    ("version", "version <text>"),
    ("filter", "filter <query>"),
    ("clear", "clear"),
    ("export", "export [path]"),
    ("yank", "yank"),
    ("escape", "escape <on|off>"),
    ("theme", "theme <name>"),
    ("help", "help"),
    ("quit", "quit"),
];

/// Interactive state backing the command palette overlay.
#[derive(Debug, Default, Clone)]
pub struct CommandPaletteState {
    visible: bool,
    input: String,
    history: Vec<String>,
    history_cursor: Option<usize>,
    message: Option<PaletteMessage>,
}

impl CommandPaletteState {
    /// Reveal the palette with an empty input buffer.
    pub fn open(&mut self) {
        self.open_with(String::new());
    }

    /// Reveal the palette with a command prefilled, e.g. the current value of a field.
    pub fn open_with<S: Into<String>>(&mut self, content: S) {
        self.visible = true;
        self.input = content.into();
        self.history_cursor = None;
    }

    pub fn close(&mut self) {
        self.visible = false;
    }

    pub fn is_open(&self) -> bool {
        self.visible
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Consume the input and remember it for history recall.
    pub fn take_input(&mut self) -> String {
        let input = std::mem::take(&mut self.input);
        let trimmed = input.trim();
        if !trimmed.is_empty() && self.history.last().map(String::as_str) != Some(trimmed) {
            self.history.push(trimmed.to_string());
        }
        self.history_cursor = None;
        input
    }

    pub fn push_char(&mut self, ch: char) {
        self.input.push(ch);
    }

    pub fn pop_char(&mut self) {
        self.input.pop();
    }

    /// Replace the input with the previous history entry.
    pub fn history_previous(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let index = match self.history_cursor {
            Some(index) => index.saturating_sub(1),
            None => self.history.len() - 1,
        };
        self.history_cursor = Some(index);
        self.input = self.history[index].clone();
    }

    /// Step forward in history, ending on an empty buffer.
    pub fn history_next(&mut self) {
        match self.history_cursor {
            Some(index) if index + 1 < self.history.len() => {
                self.history_cursor = Some(index + 1);
                self.input = self.history[index + 1].clone();
            }
            Some(_) => {
                self.history_cursor = None;
                self.input.clear();
            }
            None => {}
        }
    }

    /// Complete the command verb when exactly one command matches the typed prefix.
    pub fn complete(&mut self) {
        if self.input.contains(' ') {
            return;
        }
        let matches = suggestions(&self.input);
        if let [(verb, _)] = matches.as_slice() {
            self.input = format!("{verb} ");
        }
    }

    pub fn set_message<S: Into<String>>(&mut self, level: PaletteMessageLevel, message: S) {
        self.message = Some(PaletteMessage::new(level, message.into()));
    }

    pub fn purge_expired_messages(&mut self) {
        if let Some(message) = &self.message
            && message.is_expired()
        {
            self.message = None;
        }
    }
}

/// Commands whose verb starts with the first word of `input`.
pub fn suggestions(input: &str) -> Vec<(&'static str, &'static str)> {
    let verb = input.split_whitespace().next().unwrap_or("");
    let typed_args = input.trim_start().len() > verb.len();
    COMMANDS
        .iter()
        .filter(|(name, _)| {
            if typed_args {
                *name == verb
            } else {
                name.starts_with(verb)
            }
        })
        .copied()
        .collect()
}

/// Visual component that renders the command palette overlay.
#[derive(Debug, Default)]
pub struct CommandPalette;

impl CommandPalette {
    pub fn render(&self, frame: &mut Frame<'_>, area: Rect, state: &CommandPaletteState) {
        if !state.is_open() {
            return;
        }

        let width = area.width.saturating_sub(10).min(90);
        let height = 6.min(area.height);
        let popup = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + area.height.saturating_sub(height + 1),
            width,
            height,
        };

        frame.render_widget(Clear, popup);

        let block = Block::default()
            .title("Command · tab completes · ↑↓ history")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0)])
            .split(inner);

        let prompt = Paragraph::new(format!(":{}", state.input()))
            .style(Style::default().fg(Color::White));
        frame.render_widget(prompt, layout[0]);

        let footer = match &state.message {
            Some(message) => {
                let style = match message.level {
                    PaletteMessageLevel::Info => Style::default().fg(Color::Gray),
                    PaletteMessageLevel::Success => Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                    PaletteMessageLevel::Error => {
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
                    }
                };
                Line::styled(message.text.clone(), style)
            }
            None => {
                let hints: Vec<Span<'static>> = suggestions(state.input())
                    .into_iter()
                    .take(6)
                    .flat_map(|(_, usage)| {
                        [
                            Span::styled(usage, Style::default().fg(Color::DarkGray)),
                            Span::raw("  "),
                        ]
                    })
                    .collect();
                Line::from(hints)
            }
        };
        frame.render_widget(Paragraph::new(footer).wrap(Wrap { trim: true }), layout[1]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteMessageLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
struct PaletteMessage {
    level: PaletteMessageLevel,
    text: String,
    expires_at: Instant,
}

impl PaletteMessage {
    fn new(level: PaletteMessageLevel, text: String) -> Self {
        Self {
            level,
            text,
            expires_at: Instant::now() + Duration::from_secs(4),
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestions_follow_typed_prefix() {
        let names: Vec<_> = suggestions("de").into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["delete", "description"]);
        assert_eq!(suggestions("add rule x").len(), 1);
        assert_eq!(suggestions("").len(), COMMANDS.len());
    }

    #[test]
    fn completes_unique_prefix() {
        let mut state = CommandPaletteState::default();
        state.open_with("sev");
        state.complete();
        assert_eq!(state.input(), "severity ");

        state.open_with("e");
        state.complete();
        assert_eq!(state.input(), "e");
    }

    #[test]
    fn history_recalls_previous_commands() {
        let mut state = CommandPaletteState::default();
        state.open_with("filter cramfs");
        state.take_input();
        state.open_with("export out.xml");
        state.take_input();

        state.open();
        state.history_previous();
        assert_eq!(state.input(), "export out.xml");
        state.history_previous();
        assert_eq!(state.input(), "filter cramfs");
        state.history_next();
        assert_eq!(state.input(), "export out.xml");
        state.history_next();
        assert_eq!(state.input(), "");
    }
}
