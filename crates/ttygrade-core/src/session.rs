//! Interactive child process session.
//!
//! Owns one child process's lifecycle and its bidirectional text stream. A
//! background reader task per stream drains output into the shared transcript
//! so nothing is lost while the sequencer is between checks; `expect` waits
//! on transcript growth rather than polling.

use crate::matcher::{Pattern, Transcript};
use std::io::Write;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};

/// Errors from session lifecycle operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("child process has no {0} handle")]
    MissingStream(&'static str),
    #[error("failed to write to child stdin: {0}")]
    Stdin(#[source] std::io::Error),
}

/// Result of waiting on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wait {
    /// The pattern matched newly arrived output.
    Matched(String),
    /// The timeout elapsed without a match.
    TimedOut,
    /// The child's output stream closed before the pattern matched. Some
    /// checks expect this (a shutdown command); for the rest it is failure.
    Exited,
}

struct Shared {
    transcript: Mutex<Transcript>,
    grew: Notify,
}

impl Shared {
    fn transcript(&self) -> MutexGuard<'_, Transcript> {
        self.transcript.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live interactive child process plus its growing output buffer.
pub struct Session {
    child: Child,
    stdin: ChildStdin,
    shared: Arc<Shared>,
    readers: Vec<JoinHandle<()>>,
}

impl Session {
    /// Spawn the launch command through `/bin/sh -c` with piped streams.
    ///
    /// Raw output is tee'd to `sink` as it arrives, before matching. Must be
    /// called from within a tokio runtime (reader tasks are spawned here).
    ///
    /// # Errors
    /// Returns `SessionError::Spawn` if the command cannot be started.
    pub fn spawn(
        launch: &str,
        sink: Option<Box<dyn Write + Send>>,
    ) -> Result<Self, SessionError> {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(launch)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // kill_on_drop covers abnormal exit paths; shutdown() is the
            // orderly one.
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SessionError::Spawn {
            command: launch.to_string(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or(SessionError::MissingStream("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(SessionError::MissingStream("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(SessionError::MissingStream("stderr"))?;

        let shared = Arc::new(Shared {
            transcript: Mutex::new(Transcript::new(sink)),
            grew: Notify::new(),
        });

        // stdout EOF is the process-exit observation; stderr closing alone
        // says nothing about the child.
        let readers = vec![
            tokio::spawn(drain(stdout, Arc::clone(&shared), true)),
            tokio::spawn(drain(stderr, Arc::clone(&shared), false)),
        ];

        Ok(Self {
            child,
            stdin,
            shared,
            readers,
        })
    }

    /// Write `line` plus a newline to the child's stdin. Does not wait for
    /// output.
    ///
    /// # Errors
    /// Returns `SessionError::Stdin` if the write fails (typically because
    /// the child already exited).
    pub async fn send(&mut self, line: &str) -> Result<(), SessionError> {
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(SessionError::Stdin)?;
        self.stdin
            .write_all(b"\n")
            .await
            .map_err(SessionError::Stdin)?;
        self.stdin.flush().await.map_err(SessionError::Stdin)
    }

    /// Block until `pattern` matches newly arrived output, `timeout` elapses,
    /// or the child's output stream closes, whichever comes first.
    ///
    /// A match commits the transcript cursor past the match end. The wait is
    /// re-evaluated on transcript growth, not by polling.
    pub async fn expect(&self, pattern: &Pattern, timeout: Duration) -> Wait {
        let deadline = Instant::now() + timeout;
        loop {
            let grew = self.shared.grew.notified();
            tokio::pin!(grew);
            // Register interest before inspecting the transcript so output
            // arriving in between cannot be missed.
            grew.as_mut().enable();

            {
                let mut transcript = self.shared.transcript();
                if let Some(wait) = check_now(pattern, &mut transcript) {
                    return wait;
                }
            }

            if timeout_at(deadline, grew).await.is_err() {
                // Output or the exit may have raced the deadline; one final
                // look, in the same order as the in-loop check.
                let mut transcript = self.shared.transcript();
                return check_now(pattern, &mut transcript).unwrap_or(Wait::TimedOut);
            }
        }
    }

    /// Wait for the child's output stream to close (expected termination).
    pub async fn await_exit(&self, timeout: Duration) -> Wait {
        let deadline = Instant::now() + timeout;
        loop {
            let grew = self.shared.grew.notified();
            tokio::pin!(grew);
            grew.as_mut().enable();

            if self.shared.transcript().eof() {
                return Wait::Exited;
            }

            if timeout_at(deadline, grew).await.is_err() {
                return if self.shared.transcript().eof() {
                    Wait::Exited
                } else {
                    Wait::TimedOut
                };
            }
        }
    }

    /// Whether the child's output stream has closed.
    #[must_use]
    pub fn exit_observed(&self) -> bool {
        self.shared.transcript().eof()
    }

    /// Transcript offset consumed by matches so far.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.shared.transcript().cursor()
    }

    /// Total transcript bytes received so far.
    #[must_use]
    pub fn received(&self) -> usize {
        self.shared.transcript().len()
    }

    /// Force-terminate the child and stop the reader tasks. Best-effort:
    /// every failure mode here still ends with the child reaped or killed on
    /// drop.
    pub async fn shutdown(mut self) {
        let _ = self.child.start_kill();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await;
        for reader in self.readers {
            reader.abort();
        }
    }
}

/// Match, then exit observation; `None` means keep waiting.
fn check_now(pattern: &Pattern, transcript: &mut Transcript) -> Option<Wait> {
    if let Some(text) = pattern.try_match(transcript) {
        return Some(Wait::Matched(text));
    }
    if transcript.eof() {
        return Some(Wait::Exited);
    }
    None
}

/// Split off the longest decodable UTF-8 prefix of `pending`. An incomplete
/// multi-byte sequence at the tail (split across reads) stays in `pending`
/// for the next read; genuinely invalid bytes become replacement characters.
fn take_valid_prefix(pending: &mut Vec<u8>) -> String {
    let mut out = String::new();
    loop {
        let (valid, bad) = match std::str::from_utf8(pending) {
            Ok(_) => (pending.len(), None),
            Err(e) => (e.valid_up_to(), Some(e.error_len())),
        };
        out.push_str(&String::from_utf8_lossy(&pending[..valid]));
        match bad {
            None => {
                pending.clear();
                break;
            }
            Some(Some(invalid)) => {
                out.push(char::REPLACEMENT_CHARACTER);
                pending.drain(..valid + invalid);
            }
            Some(None) => {
                pending.drain(..valid);
                break;
            }
        }
    }
    out
}

async fn drain<R>(mut stream: R, shared: Arc<Shared>, primary: bool)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                let text = take_valid_prefix(&mut pending);
                if !text.is_empty() {
                    shared.transcript().append(&text);
                    shared.grew.notify_waiters();
                }
            }
        }
    }
    // A sequence still incomplete at stream close can never finish.
    if !pending.is_empty() {
        let text = String::from_utf8_lossy(&pending).into_owned();
        shared.transcript().append(&text);
        shared.grew.notify_waiters();
    }
    if primary {
        shared.transcript().mark_eof();
        shared.grew.notify_waiters();
    }
}
