//! Control-connection session against the server under test
//!
//! A session is strictly lock-step: one greeting read, then one command write
//! and one response read per command. Nothing is pipelined.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::common::config::SessionConfig;
use crate::common::{Error, Result};

use super::codec;

/// Lines captured during one session: the greeting followed by one response
/// per command, in command order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTranscript {
    lines: Vec<String>,
}

impl SessionTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn greeting(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// An open control connection
pub struct Session {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    read_timeout: Duration,
}

/// Errors worth retrying while the listener is still coming up
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut
    )
}

impl Session {
    /// Connect to `addr`, retrying transient failures
    ///
    /// Makes at most `connect_attempts` attempts with a fixed backoff between
    /// them. Non-transient errors fail immediately.
    pub async fn connect(addr: &str, config: &SessionConfig) -> Result<Self> {
        let attempts = config.connect_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let connect = TcpStream::connect(addr);
            let result = match tokio::time::timeout(config.connect_timeout(), connect).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {}s", config.connect_timeout_secs),
                )),
            };

            match result {
                Ok(stream) => {
                    tracing::debug!(addr, attempt, "Control connection established");
                    return Ok(Self::from_stream(stream, config.read_timeout()));
                }
                Err(e) if is_transient(&e) && attempt < attempts => {
                    tracing::debug!(addr, attempt, error = %e, "Connect failed, retrying");
                    tokio::time::sleep(config.connect_backoff()).await;
                }
                Err(e) => {
                    return Err(Error::ConnectFailed {
                        addr: addr.to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream, read_timeout: Duration) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
            read_timeout,
        }
    }

    /// Read one response line, bounded by the session read timeout
    pub async fn read_line(&mut self) -> Result<String> {
        let line = codec::read_line(&mut self.reader, self.read_timeout).await?;
        tracing::debug!("<<< {}", line);
        Ok(line)
    }

    /// Send one command with its CR LF terminator
    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        tracing::debug!(">>> {}", command);
        codec::write_command(&mut self.writer, command).await
    }

    /// Read the greeting, then exchange each command for one response line
    pub async fn exchange(&mut self, commands: &[String]) -> Result<SessionTranscript> {
        let mut transcript = SessionTranscript::new();

        transcript.push(self.read_line().await?);

        for command in commands {
            self.send_command(command).await?;
            transcript.push(self.read_line().await?);
        }

        Ok(transcript)
    }

    /// Shut down the write side and release the connection
    pub async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            tracing::debug!("Error shutting down control connection: {}", e);
        }
    }
}

/// Run a full session: connect, greet, exchange commands, close
///
/// The connection is closed on every path, including failures midway.
pub async fn run_session(
    addr: &str,
    commands: &[String],
    config: &SessionConfig,
) -> Result<SessionTranscript> {
    let mut session = Session::connect(addr, config).await?;
    let result = session.exchange(commands).await;
    session.close().await;

    if let Err(e) = &result {
        tracing::warn!("Session with {} aborted: {}", addr, e);
    }
    result
}
