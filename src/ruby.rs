use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::BuildError;
use crate::index::TreeExtractor;
use crate::version::Version;

const RDOC_DUMP_SCRIPT: &str = include_str!("../scripts/rdoc_dump.rb");

/// The Ruby interpreter used to run RDoc.
///
/// RDoc keeps process-wide state that cannot be reset, so every extraction
/// runs in a fresh child process and talks to us only through its
/// arguments, its exit status and the file it writes.
#[derive(Debug, Clone)]
pub struct RubyRuntime {
    bin: PathBuf,
}

impl RubyRuntime {
    pub fn new(bin: PathBuf) -> Self {
        Self { bin }
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    fn command(&self, args: &[&OsStr], cwd: Option<&Path>) -> Result<Output, BuildError> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.output().map_err(|source| BuildError::Spawn {
            program: self.bin.display().to_string(),
            source,
        })
    }

    /// Version of the interpreter itself, for the `current-runtime` fallback.
    pub fn version(&self) -> Result<Version, BuildError> {
        let output = self.command(&[OsStr::new("-e"), OsStr::new("print RUBY_VERSION")], None)?;
        check_status(&output)?;
        let raw = String::from_utf8_lossy(&output.stdout);
        raw.trim().parse().map_err(|_| BuildError::Exit {
            status: "ok".to_string(),
            stderr: format!("unexpected RUBY_VERSION output: {:?}", raw.trim()),
        })
    }
}

impl TreeExtractor for RubyRuntime {
    fn extract(&self, src: &Path, out: &Path) -> Result<(), BuildError> {
        tracing::debug!(
            "Running RDoc extraction with {} in {}",
            self.bin.display(),
            src.display()
        );
        let output = self.command(
            &[
                OsStr::new("-e"),
                OsStr::new(RDOC_DUMP_SCRIPT),
                src.as_os_str(),
                out.as_os_str(),
            ],
            Some(src),
        )?;
        check_status(&output)
    }
}

fn check_status(output: &Output) -> Result<(), BuildError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(BuildError::Exit {
        status: output.status.to_string(),
        stderr: stderr.trim().to_string(),
    })
}
