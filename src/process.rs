//! External command execution behind a mockable seam.
//!
//! Both collaborators (`ffmpeg`/`ffprobe` for frames, `tesseract` for text)
//! are separate programs. Going through [`CommandRunner`] keeps every caller
//! testable without the tools installed.

use crate::error::{HardsubError, Result};
use std::process::Command;

/// Trait for running an external program to completion.
///
/// Object-safe, Send + Sync so one runner can be shared by every worker.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and returns its stdout.
    ///
    /// A missing program yields [`HardsubError::ToolNotFound`]; a non-zero
    /// exit yields [`HardsubError::ExternalTool`] carrying stderr.
    fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

/// Production runner using `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        log::trace!("exec: {} {}", program, args.join(" "));

        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HardsubError::ToolNotFound {
                    tool: program.to_string(),
                }
            } else {
                HardsubError::ExternalTool {
                    tool: program.to_string(),
                    message: format!("could not start: {e}"),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HardsubError::ExternalTool {
                tool: program.to_string(),
                message: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
