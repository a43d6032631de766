use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;
use xtailor::app::export::{ExportOptions, Exporter};
use xtailor::app::parse::parse_document;
use xtailor::domain::model::{ItemIdGenerator, TailoringDocument, TailoringItem};

#[derive(Parser)]
#[command(author, version, about = "Project automation commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cargo nextest with default configuration
    Nextest {
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        release: bool,
    },
    /// Round-trip every XML fixture through the parser and exporter
    Fixtures {
        #[arg(long, default_value = "crates/xtailor/tests/fixtures")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Nextest { profile, release } => run_nextest(profile, release)?,
        Commands::Fixtures { dir } => check_fixtures(&dir)?,
    }
    Ok(())
}

fn run_nextest(profile: Option<String>, release: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("nextest").arg("run");
    if let Some(profile) = profile {
        cmd.arg("--profile").arg(profile);
    }
    if release {
        cmd.arg("--release");
    }
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("cargo nextest run failed");
    }
    Ok(())
}

fn check_fixtures(dir: &Path) -> Result<()> {
    let exporter = Exporter::new()?;
    let options = ExportOptions::default();
    let mut checked = 0;
    let mut failures = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "xml") {
            continue;
        }
        checked += 1;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let mut ids = ItemIdGenerator::new();
        let original = match parse_document(&text, &mut ids) {
            Ok(doc) => doc,
            // Fixtures under `invalid/` are expected to be rejected.
            Err(err) if is_invalid_fixture(path) => {
                println!("ok   {} (rejected: {err})", path.display());
                continue;
            }
            Err(err) => {
                failures.push(format!("{}: {err}", path.display()));
                continue;
            }
        };
        if is_invalid_fixture(path) {
            failures.push(format!("{}: parsed but should have been rejected", path.display()));
            continue;
        }

        let rendered = exporter.render(&original, &options)?;
        match parse_document(&rendered, &mut ids) {
            Ok(reparsed) if same_content(&original, &reparsed) => {
                println!("ok   {} ({} items)", path.display(), reparsed.items.len());
            }
            Ok(_) => failures.push(format!("{}: content changed after round-trip", path.display())),
            Err(err) => failures.push(format!("{}: export did not re-parse: {err}", path.display())),
        }
    }

    for failure in &failures {
        eprintln!("FAIL {failure}");
    }
    if !failures.is_empty() {
        anyhow::bail!("{} of {checked} fixtures failed", failures.len());
    }
    println!("{checked} fixtures passed");
    Ok(())
}

fn is_invalid_fixture(path: &Path) -> bool {
    path.components().any(|part| part.as_os_str() == "invalid")
}

/// Compare documents ignoring session ids, the version text and rules that export nothing.
fn same_content(left: &TailoringDocument, right: &TailoringDocument) -> bool {
    let items = |doc: &TailoringDocument| -> Vec<(String, Option<String>, String)> {
        doc.items
            .iter()
            .filter(|item| item.emits_markup())
            .map(|item: &TailoringItem| {
                (
                    item.idref.clone(),
                    item.comment.clone(),
                    format!("{:?}", item.kind),
                )
            })
            .collect()
    };
    left.profile_id == right.profile_id
        && left.profile_extends == right.profile_extends
        && left.profile_title == right.profile_title
        && left.profile_description == right.profile_description
        && left.benchmark_href == right.benchmark_href
        && items(left) == items(right)
}
