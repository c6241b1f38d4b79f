use std::io::{ErrorKind, Read};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Result;

use super::CommandSpec;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long to keep reading a killed child's pipes before giving up on them.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Captured result of a finished (or killed) subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was killed by a signal or timed out
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }

    /// Stdout followed by stderr, for error reports.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// Runs external commands to completion.
pub trait ProcessRunner {
    /// Run `spec`, blocking until it exits or `timeout` elapses.
    fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> Result<ProcessOutput>;
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for &T {
    fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> Result<ProcessOutput> {
        (**self).run(spec, timeout)
    }
}

/// `ProcessRunner` backed by `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> Result<ProcessOutput> {
        tracing::debug!("Running: {}", spec.to_shell_command());
        if let Some(dir) = spec.working_dir() {
            tracing::debug!("Working directory: {}", dir.display());
        }

        let mut child = spec
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain both pipes concurrently so neither can fill up and stall
        // the child while we wait on it.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut timed_out = false;
        let status: Option<ExitStatus> = loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!(
                    "Command timed out after {:?}: {}",
                    timeout.unwrap_or_default(),
                    spec.to_shell_command()
                );
                let _ = child.kill();
                let _ = child.wait();
                timed_out = true;
                break None;
            }
            thread::sleep(POLL_INTERVAL);
        };

        // A killed child may leave grandchildren holding the pipes open, so
        // after a timeout the readers get a short grace period and whatever
        // they collected by then is kept.
        let wait = if timed_out { Some(DRAIN_GRACE) } else { None };
        let stdout = stdout.map(|c| c.finish(wait)).unwrap_or_default();
        let stderr = stderr.map(|c| c.finish(wait)).unwrap_or_default();
        let output = ProcessOutput {
            code: status.and_then(|s| s.code()),
            stdout,
            stderr,
            timed_out,
        };
        tracing::debug!("Command exited with {:?}", output.code);
        Ok(output)
    }
}

/// A pipe being read on its own thread into a shared buffer.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: thread::JoinHandle<()>,
}

impl Capture {
    /// Text read so far. With `grace`, waits at most that long for the
    /// reader to hit end of stream; otherwise joins it.
    fn finish(self, grace: Option<Duration>) -> String {
        match grace {
            None => {
                let _ = self.handle.join();
            }
            Some(grace) => {
                let until = Instant::now() + grace;
                while !self.handle.is_finished() && Instant::now() < until {
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Capture {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buf);
    let handle = thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Ok(0) | Err(_) => break,
                Ok(n) => sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
            }
        }
    });
    Capture { buf, handle }
}
