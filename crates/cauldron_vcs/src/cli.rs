//! Git backend that drives the `git` executable.

use crate::backend::GitBackend;
use crate::error::{VcsError, VcsResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Committer identity passed to `git` on every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Value for `user.name`.
    pub name: String,
    /// Value for `user.email`.
    pub email: String,
}

/// A git backend that runs the `git` executable in the working directory.
///
/// Every operation is a blocking child process. Failures carry the exit
/// code and the captured standard error of the command.
///
/// # Example
///
/// ```no_run
/// use cauldron_vcs::{GitBackend, GitCli};
/// use std::path::Path;
///
/// let git = GitCli::new("/tmp/cauldron");
/// if !git.is_repository() {
///     git.init().unwrap();
/// }
/// git.add(Path::new("cauldron.json")).unwrap();
/// git.commit(&["Update cauldron".to_string()]).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
    program: OsString,
    identity: Option<Identity>,
}

impl GitCli {
    /// Creates a backend for the given working directory.
    #[must_use]
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            program: OsString::from("git"),
            identity: None,
        }
    }

    /// Uses a different git executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Commits with the given identity instead of the user's git config.
    #[must_use]
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.identity = Some(Identity {
            name: name.into(),
            email: email.into(),
        });
        self
    }

    /// Returns true if the configured git executable can be started.
    #[must_use]
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(&self.workdir);
        if let Some(identity) = &self.identity {
            cmd.arg("-c")
                .arg(format!("user.name={}", identity.name))
                .arg("-c")
                .arg(format!("user.email={}", identity.email));
        }
        cmd
    }

    fn output<I, S>(&self, args: I) -> VcsResult<(String, Output)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        let rendered = args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        debug!(command = %rendered, workdir = %self.workdir.display(), "git");
        let output = self.command().args(&args).output()?;
        Ok((rendered, output))
    }

    /// Runs a git command and returns its standard output.
    fn run<I, S>(&self, args: I) -> VcsResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let (rendered, output) = self.output(args)?;
        if !output.status.success() {
            return Err(VcsError::command_failed(
                rendered,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GitBackend for GitCli {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn is_repository(&self) -> bool {
        self.workdir.join(".git").exists()
    }

    fn init(&self) -> VcsResult<()> {
        std::fs::create_dir_all(&self.workdir)?;
        self.run(["init"]).map(|_| ())
    }

    fn set_remote(&self, name: &str, url: &str) -> VcsResult<()> {
        let remotes = self.run(["remote"])?;
        if remotes.lines().any(|r| r.trim() == name) {
            self.run(["remote", "set-url", name, url]).map(|_| ())
        } else {
            self.run(["remote", "add", name, url]).map(|_| ())
        }
    }

    fn list_remote_heads(&self, remote: &str) -> VcsResult<String> {
        self.run(["ls-remote", "--heads", remote])
    }

    fn fetch_all(&self) -> VcsResult<()> {
        self.run(["fetch", "--all"]).map(|_| ())
    }

    fn reset_hard(&self, target: Option<&str>) -> VcsResult<()> {
        match target {
            Some(target) => self.run(["reset", "--hard", target]),
            None => self.run(["reset", "--hard"]),
        }
        .map(|_| ())
    }

    fn checkout_new_branch(&self, branch: &str) -> VcsResult<()> {
        self.run(["checkout", "-b", branch]).map(|_| ())
    }

    fn add(&self, path: &Path) -> VcsResult<()> {
        let mut args: Vec<OsString> = vec!["add".into(), "--all".into(), "--".into()];
        args.push(path.as_os_str().to_owned());
        self.run(args).map(|_| ())
    }

    fn rm(&self, path: &Path) -> VcsResult<()> {
        let mut args: Vec<OsString> = vec!["rm".into(), "-r".into(), "-f".into(), "--".into()];
        args.push(path.as_os_str().to_owned());
        self.run(args).map(|_| ())
    }

    fn has_staged_changes(&self) -> VcsResult<bool> {
        let (rendered, output) = self.output(["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            code => Err(VcsError::command_failed(
                rendered,
                code,
                String::from_utf8_lossy(&output.stderr).trim(),
            )),
        }
    }

    fn commit(&self, message: &[String]) -> VcsResult<()> {
        let mut args: Vec<OsString> = vec!["commit".into()];
        for paragraph in message {
            args.push("-m".into());
            args.push(paragraph.into());
        }
        self.run(args).map(|_| ())
    }

    fn push(&self, remote: &str, branch: &str) -> VcsResult<()> {
        self.run(["push", remote, branch]).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn git_in(dir: &Path) -> Option<GitCli> {
        let git = GitCli::new(dir).with_identity("Cauldron Test", "test@cauldron.invalid");
        git.is_available().then_some(git)
    }

    #[test]
    fn cli_init_add_commit() {
        let dir = tempdir().unwrap();
        let Some(git) = git_in(dir.path()) else {
            return;
        };

        assert!(!git.is_repository());
        git.init().unwrap();
        assert!(git.is_repository());

        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        git.add(Path::new("a.txt")).unwrap();
        assert!(git.has_staged_changes().unwrap());

        git.commit(&["First".to_string(), "Body".to_string()]).unwrap();
        assert!(!git.has_staged_changes().unwrap());
    }

    #[test]
    fn cli_reset_hard_restores_tracked_file() {
        let dir = tempdir().unwrap();
        let Some(git) = git_in(dir.path()) else {
            return;
        };
        git.init().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"one").unwrap();
        git.add(Path::new("a.txt")).unwrap();
        git.commit(&["one".to_string()]).unwrap();

        std::fs::write(dir.path().join("a.txt"), b"two").unwrap();
        git.add(Path::new("a.txt")).unwrap();
        git.reset_hard(None).unwrap();

        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"one");
    }

    #[test]
    fn cli_push_to_bare_remote() {
        let remote_dir = tempdir().unwrap();
        let work_dir = tempdir().unwrap();
        let Some(remote) = git_in(remote_dir.path()) else {
            return;
        };
        remote.run(["init", "--bare"]).unwrap();

        let git = git_in(work_dir.path()).unwrap();
        git.init().unwrap();
        let url = remote_dir.path().to_string_lossy().into_owned();
        git.set_remote("upstream", &url).unwrap();
        // Setting it twice updates the URL instead of failing.
        git.set_remote("upstream", &url).unwrap();
        assert!(git.list_remote_heads("upstream").unwrap().trim().is_empty());

        git.checkout_new_branch("master").unwrap();
        std::fs::write(work_dir.path().join("README.md"), b"x").unwrap();
        git.add(Path::new("README.md")).unwrap();
        git.commit(&["First".to_string()]).unwrap();
        git.push("upstream", "master").unwrap();

        assert!(git
            .list_remote_heads("upstream")
            .unwrap()
            .contains("refs/heads/master"));
    }

    #[test]
    fn cli_failure_reports_command() {
        let dir = tempdir().unwrap();
        let Some(git) = git_in(dir.path()) else {
            return;
        };
        git.init().unwrap();
        let err = git.reset_hard(Some("does-not-exist")).unwrap_err();
        match err {
            VcsError::CommandFailed { command, .. } => {
                assert_eq!(command, "reset --hard does-not-exist");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
