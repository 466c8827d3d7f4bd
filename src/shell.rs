//! Running shell commands in the working copy.

use async_trait::async_trait;
use colored::*;
use std::path::PathBuf;
use subprocess::{Exec, ExitStatus, Redirection};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot execute '{command}'")]
    Spawn {
        command: String,
        #[source]
        e: subprocess::PopenError,
    },
    #[error("'{command}' failed with {status:?}: {output}")]
    Failed {
        command: String,
        status: ExitStatus,
        output: String,
    },
    #[error("Shell task aborted")]
    Join(#[from] tokio::task::JoinError),
}

#[async_trait]
pub trait Shell: Send + Sync {
    /// Runs `command` and returns its combined stdout/stderr on success
    async fn run(&self, command: &str) -> Result<String, Error>;
}

/// Executes commands via `sh -c` in a fixed directory
#[derive(Debug, Clone)]
pub struct Subprocess {
    cwd: PathBuf,
}

impl Subprocess {
    pub fn new<P: Into<PathBuf>>(cwd: P) -> Self {
        Self { cwd: cwd.into() }
    }

    fn run_blocking(cwd: PathBuf, command: String) -> Result<String, Error> {
        let cmd = Exec::shell(&command)
            .cwd(&cwd)
            .stdout(Redirection::Pipe)
            .stderr(Redirection::Merge);
        debug!("{}", cmd.to_cmdline_lossy().purple());
        let c = cmd.capture().map_err(|e| Error::Spawn {
            command: command.clone(),
            e,
        })?;
        let output = c.stdout_str();
        if c.exit_status.success() {
            Ok(output)
        } else {
            Err(Error::Failed {
                command,
                status: c.exit_status,
                output: output.trim().to_owned(),
            })
        }
    }
}

#[async_trait]
impl Shell for Subprocess {
    async fn run(&self, command: &str) -> Result<String, Error> {
        let cwd = self.cwd.clone();
        let command = command.to_owned();
        tokio::task::spawn_blocking(move || Self::run_blocking(cwd, command)).await?
    }
}

/// Quotes `arg` for inclusion in a `sh -c` command line
pub fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+".contains(c))
    {
        arg.to_owned()
    } else {
        format!("'{}'", arg.replace('\'', r#"'\''"#))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn quoting() {
        assert_eq!(quote("eng-1-fix"), "eng-1-fix");
        assert_eq!(quote("kc/eng-1"), "kc/eng-1");
        assert_eq!(quote("a b"), "'a b'");
        assert_eq!(quote("it's"), r#"'it'\''s'"#);
        assert_eq!(quote(""), "''");
    }

    #[tokio::test]
    async fn captures_output_in_cwd() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("marker"), "").unwrap();
        let sh = Subprocess::new(tmp.path());
        assert_eq!(sh.run("ls").await.unwrap().trim(), "marker");
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error() {
        let sh = Subprocess::new(".");
        assert_matches!(
            sh.run("echo broken >&2; exit 3").await,
            Err(Error::Failed { status: ExitStatus::Exited(3), output, .. }) if output == "broken"
        );
    }
}
