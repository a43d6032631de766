//! Clipboard integration for exported XML.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};

/// System clipboard opened on first use, with command-line tools as fallback.
#[derive(Default)]
pub struct Clipboard {
    native: Option<arboard::Clipboard>,
    native_failed: bool,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `text` on the clipboard.
    pub fn copy(&mut self, text: &str) -> Result<()> {
        if let Some(native) = self.native() {
            match native.set_text(text.to_owned()) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::debug!(error = %err, "native clipboard rejected text");
                    self.native = None;
                    self.native_failed = true;
                }
            }
        }
        copy_with_tools(text)
    }

    fn native(&mut self) -> Option<&mut arboard::Clipboard> {
        if self.native.is_none() && !self.native_failed {
            match arboard::Clipboard::new() {
                Ok(clipboard) => self.native = Some(clipboard),
                Err(err) => {
                    tracing::debug!(error = %err, "native clipboard unavailable");
                    self.native_failed = true;
                }
            }
        }
        self.native.as_mut()
    }
}

fn copy_with_tools(text: &str) -> Result<()> {
    for tool in clipboard_tools() {
        match pipe_into(tool, text) {
            Ok(()) => return Ok(()),
            Err(err) => tracing::debug!(tool = tool[0], error = %err, "clipboard tool failed"),
        }
    }
    Err(anyhow!("no clipboard backend accepted the export"))
}

fn pipe_into(tool: &[&str], text: &str) -> Result<()> {
    let (program, args) = tool.split_first().context("clipboard tool missing program")?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;

    child
        .stdin
        .take()
        .context("clipboard tool has no stdin")?
        .write_all(text.as_bytes())
        .context("failed to write clipboard contents")?;

    let status = child
        .wait()
        .with_context(|| format!("{program} did not exit cleanly"))?;
    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("{program} exited with status {status}"))
    }
}

#[cfg(target_os = "macos")]
fn clipboard_tools() -> &'static [&'static [&'static str]] {
    &[&["pbcopy"]]
}

#[cfg(all(unix, not(target_os = "macos")))]
fn clipboard_tools() -> &'static [&'static [&'static str]] {
    &[&["wl-copy"], &["xclip", "-selection", "clipboard"], &["xsel", "--clipboard", "--input"]]
}

#[cfg(target_os = "windows")]
fn clipboard_tools() -> &'static [&'static [&'static str]] {
    &[&["clip.exe"]]
}

#[cfg(not(any(unix, target_os = "windows")))]
fn clipboard_tools() -> &'static [&'static [&'static str]] {
    &[]
}
