use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    /// None of the known clipboard programs could be run.
    NoBackend(String),
    /// A clipboard program ran but reported failure.
    CommandFailed(String),
}

impl fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipboardError::NoBackend(msg) => write!(f, "{msg}"),
            ClipboardError::CommandFailed(cmd) => write!(f, "Clipboard command `{cmd}` failed"),
        }
    }
}

impl std::error::Error for ClipboardError {}

pub trait Clipboard {
    fn copy(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// Clipboard backed by the platform's copy utilities.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn copy(&mut self, text: &str) -> Result<(), ClipboardError> {
        copy_to_clipboard(text)
    }
}

pub fn copy_to_clipboard(text: &str) -> Result<(), ClipboardError> {
    #[cfg(target_os = "macos")]
    {
        return run_with_stdin("pbcopy", &[], text);
    }
    #[cfg(target_os = "windows")]
    {
        return run_with_stdin("cmd", &["/C", "clip"], text);
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let candidates: [(&str, &[&str]); 3] = [
            ("wl-copy", &[]),
            ("xclip", &["-selection", "clipboard"]),
            ("xsel", &["--clipboard", "--input"]),
        ];
        for (cmd, args) in candidates {
            match run_with_stdin(cmd, args, text) {
                Ok(()) => return Ok(()),
                Err(err) => tracing::debug!("{err}"),
            }
        }
        Err(ClipboardError::NoBackend(
            "No clipboard command found (install wl-copy, xclip, or xsel)".to_string(),
        ))
    }
}

fn run_with_stdin(cmd: &str, args: &[&str], input: &str) -> Result<(), ClipboardError> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|_| ClipboardError::NoBackend(format!("Clipboard command `{cmd}` not available")))?;

    if let Some(mut stdin) = child.stdin.take() {
        if stdin.write_all(input.as_bytes()).is_err() {
            let _ = child.kill();
            return Err(ClipboardError::CommandFailed(cmd.to_string()));
        }
    }
    match child.wait() {
        Ok(status) if status.success() => Ok(()),
        _ => Err(ClipboardError::CommandFailed(cmd.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_reports_no_backend() {
        let err = run_with_stdin("mediscan-definitely-not-a-clipboard", &[], "x")
            .expect_err("program should not exist");
        assert!(matches!(err, ClipboardError::NoBackend(_)));
        assert!(err.to_string().contains("not available"));
    }
}
