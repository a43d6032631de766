//! Command line surface.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::app::edit;
use crate::app::export::{ExportOptions, Exporter};
use crate::app::session::EditorSession;
use crate::domain::model::{ItemKind, TailoringDocument, TailoringItem, idref_looks_canonical};
use crate::infra::config::Config;
use crate::ui::app::UiApp;

#[derive(Debug, Parser)]
#[command(
    name = "xtailor",
    author,
    version,
    about = "Edit XCCDF tailoring files in the terminal",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Tailoring file to open in the editor
    pub file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Open the interactive editor (default)
    Edit {
        /// Tailoring file to open; the bundled sample is used when omitted
        file: Option<PathBuf>,
    },
    /// Parse a tailoring file and print a summary
    Check { file: PathBuf },
    /// List the items of a tailoring file
    List {
        file: PathBuf,
        /// Only show items whose idref or comment contains this text
        #[arg(long, short)]
        filter: Option<String>,
        /// Emit JSON instead of one line per item
        #[arg(long)]
        json: bool,
    },
    /// Parse a tailoring file and write it back out
    Export {
        file: PathBuf,
        /// Destination file, or `-` for stdout. Defaults to the configured file name
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Write values without escaping markup characters
        #[arg(long)]
        raw: bool,
        /// Also copy the result to the clipboard
        #[arg(long)]
        copy: bool,
    },
    /// Generate shell completions
    Completions { shell: Shell },
}

impl Cli {
    /// Whether this invocation takes over the terminal.
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, None | Some(Commands::Edit { .. }))
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut stdout = io::stdout();

    match cli.command {
        None => UiApp::new(config, cli.file)?.run(),
        Some(Commands::Edit { file }) => UiApp::new(config, file)?.run(),
        Some(Commands::Check { file }) => {
            let doc = load(&file)?;
            writeln!(stdout, "{}", check_summary(&file, &doc))?;
            Ok(())
        }
        Some(Commands::List { file, filter, json }) => {
            let doc = load(&file)?;
            let items: Vec<&TailoringItem> =
                edit::filter(&doc.items, filter.as_deref().unwrap_or_default()).collect();
            if json {
                serde_json::to_writer_pretty(&mut stdout, &items)?;
                writeln!(stdout)?;
            } else {
                write!(stdout, "{}", listing(items))?;
            }
            Ok(())
        }
        Some(Commands::Export {
            file,
            output,
            raw,
            copy,
        }) => {
            let mut session = EditorSession::new();
            session.load_file(&file)?;

            let mut options = ExportOptions::from_config(&config);
            options.escape_markup &= !raw;
            options.copy_to_clipboard |= copy;
            let output = output.unwrap_or_else(|| PathBuf::from(config.export.file_name()));
            let to_stdout = output.as_os_str() == "-";
            options.output_path = (!to_stdout).then_some(output);

            let result = session.export(&Exporter::new()?, &options)?;
            if to_stdout {
                write!(stdout, "{}", result.rendered)?;
            } else if let Some(path) = &result.output_path {
                writeln!(stdout, "wrote {}", path.display())?;
            }
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "xtailor", &mut stdout);
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<TailoringDocument> {
    let mut session = EditorSession::new();
    session.load_file(path)?;
    session
        .document()
        .cloned()
        .context("document missing after successful load")
}

/// One-line description of a parsed document.
pub fn check_summary(path: &Path, doc: &TailoringDocument) -> String {
    let unusual = doc
        .items
        .iter()
        .filter(|item| !idref_looks_canonical(&item.idref))
        .inspect(|item| tracing::warn!(idref = %item.idref, "idref does not look canonical"))
        .count();
    let mut summary = format!(
        "{}: {} · {} rules · {} variables",
        path.display(),
        doc.profile_id,
        doc.rule_count(),
        doc.variable_count()
    );
    if unusual > 0 {
        summary.push_str(&format!(" · {unusual} unusual idrefs"));
    }
    summary
}

/// Render items one per line, in document order.
pub fn listing<'a>(items: impl IntoIterator<Item = &'a TailoringItem>) -> String {
    items
        .into_iter()
        .map(|item| {
            let mut line = match &item.kind {
                ItemKind::Rule { selected, severity } => format!(
                    "rule {:<5} {:<7} {}",
                    selected.as_str(),
                    severity.as_str(),
                    item.idref
                ),
                ItemKind::Variable { value } => format!("var  {} = {value}", item.idref),
            };
            if let Some(comment) = &item.comment {
                line.push_str("  # ");
                line.push_str(&comment.replace('\n', " "));
            }
            line.push('\n');
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_file_argument_opens_editor() {
        let cli = Cli::try_parse_from(["xtailor", "custom.xml"]).unwrap();
        assert!(cli.is_interactive());
        assert_eq!(cli.file, Some(PathBuf::from("custom.xml")));

        let cli = Cli::try_parse_from(["xtailor", "list", "a.xml", "--json"]).unwrap();
        assert!(!cli.is_interactive());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn listing_marks_comments_and_values() {
        let session = EditorSession::with_sample().unwrap();
        let doc = session.document().unwrap();
        let text = listing(&doc.items);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("rule true  high    "));
        assert!(lines[0].contains("# 1.1.1.1"));
        assert!(lines[2].contains("var_apparmor_mode = enforce"));
    }

    #[test]
    fn summary_counts_items() {
        let session = EditorSession::with_sample().unwrap();
        let doc = session.document().unwrap();
        let summary = check_summary(Path::new("sample.xml"), doc);
        assert!(summary.contains("2 rules · 1 variables"));
        assert!(!summary.contains("unusual"));
    }
}
