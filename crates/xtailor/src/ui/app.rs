//! Application loop for the TUI.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};

use crate::app::edit::{self, ItemField, NewItem, ProfileField};
use crate::app::export::{ExportOptions, Exporter};
use crate::app::preview::{PreviewSegment, PreviewService};
use crate::app::session::{EditorSession, SAMPLE_TAILORING};
use crate::domain::model::{ItemKind, Selection, Severity, TailoringItem, idref_looks_canonical};
use crate::infra::config::Config;
use crate::ui::components::command_palette::{
    COMMANDS, CommandPalette, CommandPaletteState, PaletteMessageLevel,
};
use crate::ui::components::detail::ItemDetail;
use crate::ui::components::item_list::{ItemList, ItemListState};
use crate::ui::components::preview::Preview;
use crate::ui::keymap::{Action, Keymap};

const TICK_RATE: Duration = Duration::from_millis(120);

/// Interactive tailoring editor.
pub struct UiApp {
    config: Config,
    keymap: Keymap,
    session: EditorSession,
    exporter: Exporter,
    export_options: ExportOptions,
    preview_service: PreviewService,
    preview: Option<PreviewSegment>,
    preview_scroll: u16,
    list: ItemListState,
    palette_state: CommandPaletteState,
    status: Option<StatusMessage>,
    focus: FocusTarget,
    should_quit: bool,
}

impl UiApp {
    /// Build the editor around `path`, or the bundled sample when no path is given.
    pub fn new(config: Config, path: Option<PathBuf>) -> Result<Self> {
        let session = match &path {
            Some(path) => {
                let mut session = EditorSession::new();
                session.load_file(path)?;
                session
            }
            None => EditorSession::with_sample()?,
        };

        let mut app = Self {
            keymap: Keymap::from_config(&config.keybindings),
            export_options: ExportOptions::from_config(&config),
            config,
            session,
            exporter: Exporter::new()?,
            preview_service: PreviewService::new(),
            preview: None,
            preview_scroll: 0,
            list: ItemListState::default(),
            palette_state: CommandPaletteState::default(),
            status: None,
            focus: FocusTarget::Items,
            should_quit: false,
        };
        app.refresh();
        Ok(app)
    }

    /// Launch the terminal UI and enter the event loop.
    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to initialize terminal")?;
        terminal.hide_cursor().ok();

        let event_loop_result = self.event_loop(&mut terminal);

        disable_raw_mode().ok();
        let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
        let _ = terminal.show_cursor();

        event_loop_result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|frame| self.render(frame))?;
            self.tick();

            if self.should_quit {
                break;
            }

            if event::poll(TICK_RATE)? {
                let ev = event::read()?;
                self.handle_event(ev)?;
            }
        }
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>) {
        let size = frame.size();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(2)])
            .split(size);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(layout[0]);

        let doc = self.session.document();
        ItemList.render(
            frame,
            main_chunks[0],
            &self.list,
            doc,
            self.focus == FocusTarget::Items,
        );

        let selected = self.selected_item();
        if self.config.defaults.show_preview() {
            let right_chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(12), Constraint::Min(5)])
                .split(main_chunks[1]);
            ItemDetail.render(frame, right_chunks[0], doc, selected, self.session.is_dirty());
            Preview.render(
                self.preview.as_ref(),
                self.preview_scroll,
                self.focus == FocusTarget::Preview,
                right_chunks[1],
                frame.buffer_mut(),
            );
        } else {
            ItemDetail.render(frame, main_chunks[1], doc, selected, self.session.is_dirty());
        }

        self.render_status(frame, layout[1]);
        CommandPalette.render(frame, size, &self.palette_state);
    }

    fn render_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let line = match &self.status {
            Some(status) => {
                let style = match status.level {
                    StatusLevel::Info => Style::default().fg(Color::Gray),
                    StatusLevel::Success => Style::default().fg(Color::Green),
                    StatusLevel::Warning => Style::default().fg(Color::Yellow),
                    StatusLevel::Error => Style::default().fg(Color::Red),
                };
                Line::styled(status.text.clone(), style)
            }
            None => {
                let source = self
                    .session
                    .source()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "sample".to_string());
                let escape = if self.export_options.escape_markup {
                    ""
                } else {
                    " · raw export"
                };
                Line::styled(
                    format!("{source}{escape} · : commands · v value · c comment · a add · tab focus"),
                    Style::default().fg(Color::DarkGray),
                )
            }
        };
        frame.render_widget(Paragraph::new(line), inner);
    }

    fn tick(&mut self) {
        if let Some(status) = &self.status
            && status.is_expired()
        {
            self.status = None;
        }
        self.palette_state.purge_expired_messages();
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Key(key) => self.handle_key_event(key)?,
            Event::Paste(text) if self.palette_state.is_open() => {
                text.chars()
                    .filter(|ch| !ch.is_control())
                    .for_each(|ch| self.palette_state.push_char(ch));
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        if self.palette_state.is_open() {
            return self.handle_palette_key(key);
        }
        if self.list.is_filter_active() {
            return self.handle_filter_input(key);
        }

        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q'))
        {
            self.should_quit = true;
            return Ok(());
        }

        if let Some(action) = self.keymap.action(&key) {
            return self.handle_action(action);
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char(':') => self.palette_state.open(),
            KeyCode::Tab => {
                let show_preview = self.config.defaults.show_preview();
                self.focus = match self.focus {
                    FocusTarget::Items if show_preview => FocusTarget::Preview,
                    _ => FocusTarget::Items,
                };
            }
            KeyCode::Up => self.handle_action(Action::Up)?,
            KeyCode::Down => self.handle_action(Action::Down)?,
            KeyCode::Home | KeyCode::Char('g') => self.list.select_first(),
            KeyCode::End | KeyCode::Char('G') => self.list.select_last(),
            KeyCode::Char('a') => self.palette_state.open_with("add rule "),
            KeyCode::Char('o') => self.palette_state.open_with("open "),
            KeyCode::Char('v') => {
                let prefill = match self.selected_item().map(|item| &item.kind) {
                    Some(ItemKind::Variable { value }) => format!("value {value}"),
                    _ => "value ".to_string(),
                };
                self.palette_state.open_with(prefill);
            }
            KeyCode::Char('c') => {
                let comment = self
                    .selected_item()
                    .and_then(|item| item.comment.clone())
                    .unwrap_or_default();
                self.palette_state.open_with(format!("comment {comment}"));
            }
            KeyCode::Char('i') => {
                let idref = self
                    .selected_item()
                    .map(|item| item.idref.clone())
                    .unwrap_or_default();
                self.palette_state.open_with(format!("idref {idref}"));
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_action(&mut self, action: Action) -> Result<()> {
        match (action, self.focus) {
            (Action::Up, FocusTarget::Preview) => {
                self.preview_scroll = self.preview_scroll.saturating_sub(1);
            }
            (Action::Down, FocusTarget::Preview) => {
                let max = self
                    .preview
                    .as_ref()
                    .map_or(0, |segment| segment.line_count.saturating_sub(1));
                let max = u16::try_from(max).unwrap_or(u16::MAX);
                self.preview_scroll = (self.preview_scroll + 1).min(max);
            }
            (Action::Up, _) => self.list.select_previous(),
            (Action::Down, _) => self.list.select_next(),
            (Action::ToggleSelection, _) => self.toggle_selection(),
            (Action::CycleSeverity, _) => self.cycle_severity(),
            (Action::Delete, _) => self.delete_selected(),
            (Action::Filter, _) => {
                self.focus = FocusTarget::Items;
                self.list.begin_filter();
            }
            (Action::Export, _) => {
                if let Err(err) = self.perform_export(None) {
                    self.set_status(StatusLevel::Error, format!("{err:#}"));
                }
            }
        }
        Ok(())
    }

    fn handle_palette_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => self.palette_state.close(),
            KeyCode::Enter => {
                let command = self.palette_state.take_input();
                self.palette_state.close();
                if let Err(err) = self.execute_command(command.trim()) {
                    self.palette_state
                        .set_message(PaletteMessageLevel::Error, format!("{err:#}"));
                    self.set_status(StatusLevel::Error, format!("{err:#}"));
                }
            }
            KeyCode::Tab => self.palette_state.complete(),
            KeyCode::Up => self.palette_state.history_previous(),
            KeyCode::Down => self.palette_state.history_next(),
            KeyCode::Backspace => self.palette_state.pop_char(),
            KeyCode::Char(ch) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    self.palette_state.push_char(ch);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_filter_input(&mut self, key: KeyEvent) -> Result<()> {
        let doc = self.session.document();
        match key.code {
            KeyCode::Esc => {
                self.list.clear_filter(doc);
                self.list.end_filter();
            }
            KeyCode::Enter => self.list.end_filter(),
            KeyCode::Backspace => self.list.pop_filter_char(doc),
            KeyCode::Char(ch) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    self.list.push_filter_char(ch, doc);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn selected_item(&self) -> Option<&TailoringItem> {
        let id = self.list.selected_id()?;
        self.session.document()?.item(id)
    }

    fn toggle_selection(&mut self) {
        let Some(item) = self.selected_item() else {
            return;
        };
        let ItemKind::Rule { selected, .. } = item.kind else {
            self.set_status(StatusLevel::Info, "Variables cannot be selected");
            return;
        };
        let id = item.id;
        let next = edit::cycle_selection(selected);
        self.session.update_field(id, ItemField::Selected(next));
        self.set_status(StatusLevel::Info, format!("selected = {next}"));
        self.refresh();
    }

    fn cycle_severity(&mut self) {
        let Some(item) = self.selected_item() else {
            return;
        };
        let ItemKind::Rule { severity, .. } = item.kind else {
            self.set_status(StatusLevel::Info, "Variables have no severity");
            return;
        };
        let id = item.id;
        let next = edit::cycle_severity(severity);
        self.session.update_field(id, ItemField::Severity(next));
        self.set_status(StatusLevel::Info, format!("severity = {next}"));
        self.refresh();
    }

    fn delete_selected(&mut self) {
        let Some(item) = self.selected_item() else {
            return;
        };
        let (id, idref) = (item.id, item.idref.clone());
        if self.session.delete_item(id) {
            self.set_status(StatusLevel::Info, format!("Deleted {idref}"));
            self.refresh();
        }
    }

    fn execute_command(&mut self, input: &str) -> Result<()> {
        let Some(command) = parse_command(input)? else {
            return Ok(());
        };
        tracing::debug!(?command, "executing palette command");

        match command {
            Command::Open(path) => {
                let doc = self.session.load_file(&path)?;
                let message = format!("Opened {} · {} items", path.display(), doc.items.len());
                self.list.clear_filter(self.session.document());
                self.list.select_first();
                self.set_status(StatusLevel::Success, message);
            }
            Command::Sample => {
                self.session
                    .load_str(SAMPLE_TAILORING)
                    .context("embedded sample tailoring is invalid")?;
                self.list.clear_filter(self.session.document());
                self.list.select_first();
                self.set_status(StatusLevel::Success, "Loaded sample tailoring");
            }
            Command::Add(new) => {
                let idref = new.idref.trim().to_string();
                let id = self.session.add_item(new)?;
                self.list.refresh(self.session.document());
                self.list.focus(id);
                self.report_idref(&idref, format!("Added {idref}"));
            }
            Command::Edit(field) => {
                let id = self
                    .list
                    .selected_id()
                    .ok_or_else(|| anyhow!("no item selected"))?;
                let idref = match &field {
                    ItemField::Idref(idref) => {
                        let doc = self.session.document().context("no document loaded")?;
                        Some(edit::check_idref(doc, Some(id), idref)?.to_string())
                    }
                    _ => None,
                };
                if !self.session.update_field(id, field) {
                    bail!("field does not apply to the selected item");
                }
                match idref {
                    Some(idref) => self.report_idref(&idref, "Updated idref".to_string()),
                    None => self.set_status(StatusLevel::Success, "Updated item"),
                }
            }
            Command::Profile(field) => {
                self.session.update_profile(field);
                self.set_status(StatusLevel::Success, "Updated profile");
            }
            Command::Delete => self.delete_selected(),
            Command::Filter(query) => {
                self.list.set_filter(query, self.session.document());
                self.set_status(
                    StatusLevel::Info,
                    format!("{} items match", self.list.visible_len()),
                );
            }
            Command::ClearFilter => {
                self.list.clear_filter(self.session.document());
                self.set_status(StatusLevel::Info, "Filter cleared");
            }
            Command::Export(path) => self.perform_export(path)?,
            Command::Yank => {
                let mut options = self.export_options.clone();
                options.output_path = None;
                options.copy_to_clipboard = true;
                let doc = self
                    .session
                    .document()
                    .ok_or_else(|| anyhow!("no document loaded"))?;
                self.exporter.export(doc, &options)?;
                self.set_status(StatusLevel::Success, "Copied tailoring XML to clipboard");
            }
            Command::Escape(escape) => {
                self.export_options.escape_markup = escape;
                let message = if escape {
                    "Values will be escaped on export"
                } else {
                    "Raw export: markup in values is written verbatim"
                };
                self.set_status(StatusLevel::Warning, message);
            }
            Command::Theme(name) => {
                let themes = self.preview_service.themes();
                if !themes.contains(&name) {
                    bail!("unknown theme '{name}', available: {}", themes.join(", "));
                }
                self.set_status(StatusLevel::Info, format!("Preview theme set to {name}"));
                self.config.defaults.set_theme(name);
            }
            Command::Help => {
                let names: Vec<&str> = COMMANDS.iter().map(|(name, _)| *name).collect();
                self.set_status(
                    StatusLevel::Info,
                    format!("Commands: {}", names.join(", ")),
                );
            }
            Command::Quit => self.should_quit = true,
        }
        self.refresh();
        Ok(())
    }

    fn perform_export(&mut self, target: Option<PathBuf>) -> Result<()> {
        let mut options = self.export_options.clone();
        let path = target.unwrap_or_else(|| PathBuf::from(self.config.export.file_name()));
        options.output_path = Some(path.clone());

        let result = self.session.export(&self.exporter, &options)?;
        let copied = if result.copied_to_clipboard {
            " and clipboard"
        } else {
            ""
        };
        self.set_status(
            StatusLevel::Success,
            format!("Exported to {}{copied}", path.display()),
        );
        Ok(())
    }

    fn report_idref(&mut self, idref: &str, message: String) {
        if idref_looks_canonical(idref) {
            self.set_status(StatusLevel::Success, message);
        } else {
            self.set_status(
                StatusLevel::Warning,
                format!("{message} · '{idref}' does not look like an XCCDF identifier"),
            );
        }
    }

    /// Recompute list rows and the export preview after the document changed.
    fn refresh(&mut self) {
        self.list.refresh(self.session.document());
        if !self.config.defaults.show_preview() {
            return;
        }
        self.preview = match self.session.document() {
            Some(doc) => match self.preview_service.preview(
                &self.exporter,
                doc,
                &self.export_options,
                self.config.defaults.theme(),
            ) {
                Ok(segment) => Some(segment),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to render preview");
                    None
                }
            },
            None => None,
        };
    }

    fn set_status<S: Into<String>>(&mut self, level: StatusLevel, message: S) {
        self.status = Some(StatusMessage::new(level, message.into()));
    }
}

/// A parsed palette command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Open(PathBuf),
    Sample,
    Add(NewItem),
    Edit(ItemField),
    Profile(ProfileField),
    Delete,
    Filter(String),
    ClearFilter,
    Export(Option<PathBuf>),
    Yank,
    Escape(bool),
    Theme(String),
    Help,
    Quit,
}

fn parse_command(input: &str) -> Result<Option<Command>> {
    let input = input.trim_start().trim_start_matches(':');
    let Some(verb) = input.split_whitespace().next() else {
        return Ok(None);
    };
    let rest = input[verb.len()..].trim_start();
    let required = |what: &str| -> Result<String> {
        if rest.trim().is_empty() {
            bail!("{verb} requires {what}");
        }
        Ok(rest.to_string())
    };

    let command = match verb {
        "open" | "o" => Command::Open(PathBuf::from(required("a path")?.trim())),
        "sample" => Command::Sample,
        "add" => Command::Add(parse_new_item(rest)?),
        "value" => Command::Edit(ItemField::Value(rest.to_string())),
        "comment" => Command::Edit(ItemField::Comment(Some(rest.to_string()))),
        "idref" => Command::Edit(ItemField::Idref(required("an identifier")?.trim().to_string())),
        "severity" => {
            let severity: Severity = required("a level")?.trim().parse()?;
            Command::Edit(ItemField::Severity(severity))
        }
        "select" => Command::Edit(ItemField::Selected(parse_selection(rest)?)),
        "delete" => Command::Delete,
        "title" => Command::Profile(ProfileField::Title(rest.to_string())),
        "description" => Command::Profile(ProfileField::Description(rest.to_string())),
        "profile" => Command::Profile(ProfileField::Id(required("an id")?.trim().to_string())),
        "extends" => Command::Profile(ProfileField::Extends(rest.trim().to_string())),
        "benchmark" => Command::Profile(ProfileField::BenchmarkHref(rest.trim().to_string())),
        "version" => Command::Profile(ProfileField::Version(rest.trim().to_string())),
        "filter" => Command::Filter(rest.to_string()),
        "clear" => Command::ClearFilter,
        "export" => Command::Export((!rest.trim().is_empty()).then(|| PathBuf::from(rest.trim()))),
        "yank" => Command::Yank,
        "escape" => match rest.trim() {
            "on" | "true" | "" => Command::Escape(true),
            "off" | "false" => Command::Escape(false),
            other => bail!("escape expects on or off, got '{other}'"),
        },
        "theme" => Command::Theme(required("a theme name")?.trim().to_string()),
        "help" | "?" => Command::Help,
        "quit" | "q" => Command::Quit,
        other => bail!("unknown command '{other}'"),
    };
    Ok(Some(command))
}

/// `rule <idref> [severity] [# comment]` or `var <idref> <value> [# comment]`.
fn parse_new_item(args: &str) -> Result<NewItem> {
    let (args, comment) = split_comment(args);
    let mut words = args.split_whitespace();
    let kind = words
        .next()
        .ok_or_else(|| anyhow!("add requires 'rule' or 'var'"))?;
    let idref = words.next().unwrap_or_default();

    let item = match kind {
        "rule" => {
            let severity = match words.next() {
                Some(level) => level.parse()?,
                None => Severity::Default,
            };
            if let Some(extra) = words.next() {
                bail!("unexpected argument '{extra}'");
            }
            NewItem::rule(idref, severity)
        }
        "var" | "variable" | "value" => {
            let value = words.collect::<Vec<_>>().join(" ");
            NewItem::variable(idref, value)
        }
        other => bail!("cannot add '{other}', expected 'rule' or 'var'"),
    };

    Ok(match comment.filter(|comment| !comment.is_empty()) {
        Some(comment) => item.with_comment(comment),
        None => item,
    })
}

/// Split off a trailing comment. Only a `#` that starts a word opens one, so values such as
/// `^#.*` stay intact.
fn split_comment(args: &str) -> (&str, Option<&str>) {
    let marker = args.char_indices().find(|&(index, ch)| {
        ch == '#' && (index == 0 || args[..index].ends_with(char::is_whitespace))
    });
    match marker {
        Some((index, _)) => (&args[..index], Some(args[index + 1..].trim())),
        None => (args, None),
    }
}

fn parse_selection(input: &str) -> Result<Selection> {
    match input.trim() {
        "true" | "1" | "yes" | "on" => Ok(Selection::True),
        "false" | "0" | "no" | "off" => Ok(Selection::False),
        "unset" | "none" | "" => Ok(Selection::Unset),
        other => bail!("select expects true, false or unset, got '{other}'"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusTarget {
    Items,
    Preview,
}

#[derive(Debug)]
struct StatusMessage {
    level: StatusLevel,
    text: String,
    expires_at: Instant,
}

impl StatusMessage {
    fn new(level: StatusLevel, text: String) -> Self {
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

#[derive(Debug, Clone, Copy)]
enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}
