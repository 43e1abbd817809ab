//! Control-connection line codec
//!
//! Commands go out terminated by CR LF. Responses are delimited by LF; any
//! trailing whitespace (including the CR) is stripped before the line is
//! handed back.
//! ```text
//! USER anonymous\r\n   ->
//!                      <-   230 Login successful\r\n
//! ```

use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::Error;

/// Line terminator appended to every command
pub const COMMAND_TERMINATOR: &str = "\r\n";

/// Response lines longer than this (terminator included) are a protocol
/// failure; reading stops as soon as the limit is passed
const MAX_LINE_LEN: usize = 64 * 1024;

/// Read one LF-terminated line, giving up after `timeout`
///
/// Bytes are passed through lossily; the server is not required to speak
/// UTF-8.
pub async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<String, Error> {
    let mut buf = Vec::new();
    let mut limited = (&mut *reader).take(MAX_LINE_LEN as u64 + 1);

    let read = tokio::time::timeout(timeout, limited.read_until(b'\n', &mut buf))
        .await
        .map_err(|_| Error::ReadTimeout(timeout.as_secs()))?;

    let bytes_read = read.map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::ConnectionClosed
        } else {
            Error::Io(e)
        }
    })?;

    if buf.len() > MAX_LINE_LEN {
        return Err(Error::Communication(format!(
            "Response line longer than {} bytes",
            MAX_LINE_LEN
        )));
    }

    // EOF, or EOF in the middle of a line
    if bytes_read == 0 || buf.last() != Some(&b'\n') {
        return Err(Error::ConnectionClosed);
    }

    let line = String::from_utf8_lossy(&buf);
    Ok(line.trim_end().to_string())
}

/// Write one command followed by CR LF in a single write
pub async fn write_command<W: AsyncWrite + Unpin>(writer: &mut W, command: &str) -> Result<(), Error> {
    let mut frame = String::with_capacity(command.len() + COMMAND_TERMINATOR.len());
    frame.push_str(command);
    frame.push_str(COMMAND_TERMINATOR);

    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await?;

    Ok(())
}
