//! Child process handling.
//!
//! Every subprocess the launcher starts is first described as a
//! [`CommandSpec`] and then handed to a [`ProcessRunner`]. The system runner
//! inherits stdio, so tool output streams straight to the console.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use log::debug;
use serde::Serialize;

use crate::error::{ProcessError, Result};

/// A fully described child command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: PathBuf,

    /// Arguments, in order.
    pub args: Vec<String>,

    /// Variables added to the inherited environment.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Working directory of the child.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Create a command for the given program with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory of the child.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Whether the command runs `-m <module>` as its first arguments.
    pub fn runs_module(&self, module: &str) -> bool {
        self.args.len() >= 2 && self.args[0] == "-m" && self.args[1] == module
    }

    /// Build the standard library command, with stdio inherited.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program_name()))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(value: &str) -> String {
    if value.is_empty() || value.contains(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,

    /// Terminating signal, if the process was killed by one (Unix only).
    pub signal: Option<i32>,
}

impl ProcessExit {
    /// An exit with the given code.
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// A termination by the given signal.
    pub fn from_signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Convert from the standard library status.
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    /// Whether the process exited with code zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code the launcher should report for this child.
    ///
    /// Signal terminations map to `128 + signal`, as shells do.
    pub fn exit_code(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => 1,
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "terminated by signal {}", signal),
            (None, None) => write!(f, "terminated"),
        }
    }
}

/// Output captured from a short-lived command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    /// How the command ended.
    pub status: ProcessExit,

    /// Standard output, lossily decoded.
    pub stdout: String,

    /// Standard error, lossily decoded.
    pub stderr: String,
}

/// Executes child commands.
///
/// The launcher never touches `std::process` directly; tests substitute
/// their own runner here.
pub trait ProcessRunner {
    /// Run the command to completion with inherited stdio.
    fn run(&self, spec: &CommandSpec) -> Result<ProcessExit>;

    /// Run the command to completion and capture its output.
    fn capture(&self, spec: &CommandSpec) -> Result<CapturedOutput>;
}

/// Runner backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ProcessExit> {
        debug!("Running {}", spec);
        let status = spec
            .to_command()
            .status()
            .map_err(|source| ProcessError::Spawn {
                program: spec.program_name(),
                source,
            })?;
        let exit = ProcessExit::from_status(status);
        debug!("{} finished with {}", spec.program_name(), exit);
        Ok(exit)
    }

    fn capture(&self, spec: &CommandSpec) -> Result<CapturedOutput> {
        debug!("Capturing {}", spec);
        let output = spec
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ProcessError::Spawn {
                program: spec.program_name(),
                source,
            })?;
        Ok(CapturedOutput {
            status: ProcessExit::from_status(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Whether `path` names a program given by path rather than by bare name.
pub(crate) fn is_explicit_path(path: &Path) -> bool {
    path.components().count() > 1 || path.is_absolute()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("python3")
            .arg("-m")
            .args(["pip", "install"])
            .env("KEY", "value")
            .current_dir("/srv/app");

        assert_eq!(spec.program, PathBuf::from("python3"));
        assert_eq!(spec.args, vec!["-m", "pip", "install"]);
        assert_eq!(spec.env.get("KEY").map(String::as_str), Some("value"));
        assert_eq!(spec.current_dir, Some(PathBuf::from("/srv/app")));
        assert!(spec.runs_module("pip"));
        assert!(!spec.runs_module("venv"));
    }

    #[test]
    fn test_command_spec_display_quotes_spaces() {
        let spec = CommandSpec::new("/opt/my tools/python").args(["-m", "uvicorn", ""]);
        assert_eq!(spec.to_string(), "\"/opt/my tools/python\" -m uvicorn \"\"");
    }

    #[test]
    fn test_process_exit_codes() {
        assert!(ProcessExit::from_code(0).success());
        assert!(!ProcessExit::from_code(3).success());
        assert_eq!(ProcessExit::from_code(3).exit_code(), 3);
        assert_eq!(ProcessExit::from_signal(2).exit_code(), 130);
        assert!(!ProcessExit::from_signal(9).success());
        assert_eq!(ProcessExit::from_signal(9).to_string(), "terminated by signal 9");
        assert_eq!(ProcessExit::from_code(4).to_string(), "exit code 4");
    }

    #[test]
    fn test_explicit_path_detection() {
        assert!(!is_explicit_path(Path::new("python3")));
        assert!(is_explicit_path(Path::new("./python3")));
        assert!(is_explicit_path(Path::new("/usr/bin/python3")));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_reports_exit_code() {
        let exit = SystemRunner
            .run(&CommandSpec::new("sh").args(["-c", "exit 7"]))
            .unwrap();
        assert_eq!(exit.code, Some(7));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_passes_env_to_child_only() {
        let output = SystemRunner
            .capture(
                &CommandSpec::new("sh")
                    .args(["-c", "printf %s \"$AUJI_PROCESS_TEST\""])
                    .env("AUJI_PROCESS_TEST", "child-only"),
            )
            .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, "child-only");
        assert!(std::env::var("AUJI_PROCESS_TEST").is_err());
    }

    #[test]
    fn test_system_runner_spawn_failure() {
        let err = SystemRunner
            .run(&CommandSpec::new("auji-definitely-not-a-program"))
            .unwrap_err();
        assert!(err.to_string().contains("auji-definitely-not-a-program"));
    }
}
