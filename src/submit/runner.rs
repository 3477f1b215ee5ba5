//! Subprocess Execution
//!
//! Every external process the engine starts goes through a
//! [`CommandRunner`], so submission logic can be exercised without a
//! scheduler.

use std::fmt;
use std::io;
use std::process::Command;

use log::debug;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code; `None` if killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a command to completion and captures its output.
pub trait CommandRunner {
    fn run(&mut self, command: &CommandLine) -> io::Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &CommandLine) -> io::Result<CommandOutput> {
        debug!("Spawning: {}", command);

        let output = Command::new(&command.program).args(&command.args).output()?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_display() {
        let cmd = CommandLine::new("qsub").arg("-terse").args(["-N", "align_star"]);
        assert_eq!(cmd.to_string(), "qsub -terse -N align_star");
    }

    #[test]
    fn test_output_success() {
        let ok = CommandOutput {
            code: Some(0),
            ..Default::default()
        };
        let failed = CommandOutput {
            code: Some(1),
            ..Default::default()
        };
        assert!(ok.success());
        assert!(!failed.success());
        assert!(!CommandOutput::default().success());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_stdout() {
        let mut runner = SystemRunner;
        let output = runner
            .run(&CommandLine::new("sh").args(["-c", "echo hello; echo oops >&2"]))
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn test_system_runner_missing_program() {
        let mut runner = SystemRunner;
        let result = runner.run(&CommandLine::new("rnaseqde-no-such-program-here"));
        assert!(result.is_err());
    }
}
