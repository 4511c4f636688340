//! Running external tools with captured output.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{Result, ToolchainError};
use crate::locate::exe_name;

/// A single external program invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Replacement environment. `None` inherits the parent's.
    pub env: Option<Vec<(String, String)>>,
    /// Echo the command line, timing and captured output to stdout.
    pub verbose: bool,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
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

    pub fn env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Program path with the platform executable suffix applied.
    pub fn resolved_program(&self) -> PathBuf {
        match self.program.file_name().and_then(|n| n.to_str()) {
            Some(name) => self.program.with_file_name(exe_name(name)),
            None => self.program.clone(),
        }
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(env) = &self.env {
            for (key, value) in env {
                write!(f, "{key}={value} ")?;
            }
        }
        write!(f, "{}", self.resolved_program().display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: i32,
    /// Combined stdout and stderr.
    pub output: String,
    pub elapsed: Duration,
}

/// Run `invocation` to completion.
///
/// Stdout and stderr are captured together into a temporary file that is
/// removed when this function returns. A nonzero exit code, a failure to
/// start or a missing program are errors; the captured output travels with
/// [`ToolchainError::ToolFailed`].
pub fn run_tool(invocation: &ToolInvocation) -> Result<ToolOutput> {
    let program = invocation.resolved_program();
    if invocation.verbose {
        println!("\nRun: {invocation}");
    }
    if !program.exists() {
        return Err(ToolchainError::ProgramNotFound { program });
    }

    let capture = tempfile::Builder::new()
        .prefix("tmpRunTool")
        .suffix("Logging")
        .tempfile()
        .map_err(ToolchainError::Capture)?;
    let stdout = capture.as_file().try_clone().map_err(ToolchainError::Capture)?;
    let stderr = capture.as_file().try_clone().map_err(ToolchainError::Capture)?;

    let mut command = Command::new(&program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr);
    if let Some(env) = &invocation.env {
        command.env_clear();
        command.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    debug!("running {invocation}");
    let start = Instant::now();
    let status = command.status();
    let elapsed = start.elapsed();
    let output = read_capture(capture.path());

    let (exit_code, spawn_error) = match status {
        Ok(status) => match status.code() {
            Some(code) => (code, None),
            None => {
                warn!("{} terminated by signal", program.display());
                (-1, Some("terminated by signal".to_string()))
            }
        },
        Err(e) => (-1, Some(e.to_string())),
    };

    if invocation.verbose {
        let verdict = if exit_code == 0 { "Succeeded" } else { "Failed" };
        println!(
            "\n{verdict} in totalTime {:.3} [s]. Exit code={exit_code}",
            elapsed.as_secs_f64()
        );
        println!("{output}");
    }

    if exit_code != 0 {
        return Err(ToolchainError::ToolFailed {
            program,
            exit_code,
            spawn_error,
            output,
        });
    }

    Ok(ToolOutput {
        exit_code,
        output,
        elapsed,
    })
}

fn read_capture(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!("failed to read captured tool output: {e}");
            String::new()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn captures_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script(dir.path(), "tool", "echo out; echo err 1>&2");
        let out = run_tool(&ToolInvocation::new(tool)).unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.output.contains("out"));
        assert!(out.output.contains("err"));
    }

    #[test]
    fn nonzero_exit_is_failure_with_output() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script(dir.path(), "tool", "echo broken 1>&2; exit 3");
        let err = run_tool(&ToolInvocation::new(tool)).unwrap_err();
        match err {
            ToolchainError::ToolFailed {
                exit_code, output, ..
            } => {
                assert_eq!(exit_code, 3);
                assert!(output.contains("broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_not_run() {
        let err = run_tool(&ToolInvocation::new("/nonexistent/tool")).unwrap_err();
        assert!(matches!(err, ToolchainError::ProgramNotFound { .. }));
    }

    #[test]
    fn env_override_replaces_environment() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script(dir.path(), "tool", "echo \"foo=$FOO home=$HOME\"");
        let inv = ToolInvocation::new(tool).env(vec![("FOO".into(), "bar".into())]);
        let out = run_tool(&inv).unwrap();
        assert!(out.output.contains("foo=bar home=\n") || out.output.trim_end() == "foo=bar home=");
    }

    #[test]
    fn args_are_passed_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script(dir.path(), "tool", "echo \"$@\"");
        let inv = ToolInvocation::new(tool).arg("-a").args(["b", "c"]);
        let out = run_tool(&inv).unwrap();
        assert_eq!(out.output.trim_end(), "-a b c");
    }

    #[test]
    fn display_includes_env_and_args() {
        let inv = ToolInvocation::new("/bin/tool")
            .arg("-x")
            .env(vec![("K".into(), "V".into())]);
        assert_eq!(inv.to_string(), "K=V /bin/tool -x");
    }
}
