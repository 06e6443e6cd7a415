//! External tool invocation.
//!
//! Every side effect outside the working directory goes through
//! [`ToolRunner`]: a program, a fixed argument list, and the rule that any
//! non-zero exit is fatal. [`SystemRunner`] spawns real processes; tests
//! substitute their own implementation.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::context::AbortHandle;
use crate::error::{Error, Result};

/// Number of output lines kept for diagnostics.
pub const TAIL_LINES: usize = 40;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A single external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Capture stdout and return it instead of echoing it.
    pub capture: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            capture: false,
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

    /// Append a path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Prefix the command with `sudo` when `privileged` is set.
    pub fn elevated(self, privileged: bool) -> Self {
        if !privileged {
            return self;
        }

        let mut args = Vec::with_capacity(self.args.len() + 2);
        // sudo drops the environment; forward it explicitly
        for (key, value) in &self.env {
            args.push(format!("{}={}", key, value));
        }
        args.push(self.program);
        args.extend(self.args);

        Self {
            program: "sudo".to_string(),
            args,
            ..self
        }
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        let mut line = String::new();
        for (key, value) in &self.env {
            let _ = write!(line, "{}={} ", key, value);
        }
        line.push_str(&self.program);
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                let _ = write!(line, " '{}'", arg);
            } else {
                let _ = write!(line, " {}", arg);
            }
        }
        line
    }
}

/// What a successful invocation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Full stdout for captured invocations, empty otherwise.
    pub stdout: String,
    /// Last lines of combined output.
    pub tail: Vec<String>,
}

/// Runs external tools on behalf of the pipeline.
pub trait ToolRunner: Send + Sync {
    /// Run `invocation` to completion, handing every output line to
    /// `on_line` as it arrives.
    ///
    /// Returns `Error::Tool` on a non-zero exit and `Error::Spawn` when the
    /// program cannot be started.
    fn run_with_output(
        &self,
        invocation: &Invocation,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ToolOutput>;

    /// Run `invocation` to completion.
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        self.run_with_output(invocation, &mut |_: &str| {})
    }
}

/// Runs tools as child processes of the current process.
///
/// Output of non-captured invocations is streamed through to the terminal
/// as it arrives. Children are polled so that an abort or an expired
/// deadline kills them promptly, together with everything they started.
#[derive(Clone, Default)]
pub struct SystemRunner {
    abort: AbortHandle,
}

impl SystemRunner {
    pub fn new(abort: AbortHandle) -> Self {
        Self { abort }
    }

    fn resolve(program: &str) -> Result<PathBuf> {
        which::which(program).map_err(|e| Error::Spawn {
            program: program.to_string(),
            message: e.to_string(),
        })
    }

    fn spawn_reader<S: Read + Send + 'static>(
        stream: S,
        lines: Sender<String>,
        echo: Option<fn(&str)>,
        collect: bool,
    ) -> JoinHandle<String> {
        thread::spawn(move || {
            let mut collected = String::new();
            for line in BufReader::new(stream).lines() {
                let Ok(line) = line else { break };

                if let Some(echo) = echo {
                    echo(&line);
                }
                if collect {
                    collected.push_str(&line);
                    collected.push('\n');
                }
                if lines.send(line).is_err() {
                    // Run was abandoned
                    break;
                }
            }
            collected
        })
    }
}

fn echo_stdout(line: &str) {
    println!("{}", line);
}

fn echo_stderr(line: &str) {
    eprintln!("{}", line);
}

/// Kill `child` and every process in its group.
#[cfg(unix)]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    // The child leads its own group, see `run_with_output`
    let pgid = child.id() as libc::pid_t;
    // SIGKILL for immediate termination
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    child.kill()
}

impl ToolRunner for SystemRunner {
    fn run_with_output(
        &self,
        invocation: &Invocation,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ToolOutput> {
        self.abort.check()?;

        let program = Self::resolve(&invocation.program)?;
        let mut cmd = Command::new(&program);
        cmd.args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        tracing::debug!("Spawning {}", invocation.command_line());

        let mut child = cmd.spawn().map_err(|e| Error::Spawn {
            program: invocation.program.clone(),
            message: e.to_string(),
        })?;

        let capture = invocation.capture;
        let (tx, rx) = mpsc::channel();

        let stdout = child.stdout.take().map(|s| {
            let echo = if capture { None } else { Some(echo_stdout as fn(&str)) };
            Self::spawn_reader(s, tx.clone(), echo, capture)
        });
        let stderr = child.stderr.take().map(|s| {
            let echo = if capture { None } else { Some(echo_stderr as fn(&str)) };
            Self::spawn_reader(s, tx.clone(), echo, false)
        });
        drop(tx);

        let mut tail = VecDeque::with_capacity(TAIL_LINES);
        let mut record = |line: String| {
            on_line(&line);
            if tail.len() == TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        };

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Err(err) = self.abort.check() {
                tracing::warn!("Killing '{}' ({})", invocation.program, err);
                if let Err(e) = kill_tree(&mut child) {
                    tracing::warn!("Failed to kill '{}': {}", invocation.program, e);
                }
                // Wait to reap zombie
                let _ = child.wait();
                rx.try_iter().for_each(&mut record);
                return Err(err);
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    record(line);
                    rx.try_iter().for_each(&mut record);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => thread::sleep(POLL_INTERVAL),
            }
        };

        let stdout = stdout
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();
        if let Some(handle) = stderr {
            let _ = handle.join();
        }
        rx.try_iter().for_each(&mut record);

        let tail = Vec::from(tail);
        if !status.success() {
            return Err(Error::Tool {
                program: invocation.program.clone(),
                status: status.to_string(),
                tail,
            });
        }

        Ok(ToolOutput { stdout, tail })
    }
}
