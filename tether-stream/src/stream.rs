//! Binding a pair to a byte stream.
//!
//! Outbound frames are serialized as one JSON value plus `\n` and written
//! by a background writer task fed from an unbounded channel, so frames go
//! out in the order their operations were invoked. Inbound bytes are
//! line-buffered; each complete line is parsed and handed to the pair.
//!
//! Parse failures stay on the stream: they surface on the handle's error
//! channel and never tear the pair down.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use serde_json::Value;
use tether::codec::Frame;
use tether::error::TransportError;
use tether::Pair;
use thiserror::Error;

use crate::framing::{FramingError, LineBuffer};

/// Size of the read chunk handed to the line buffer.
const READ_CHUNK: usize = 8 * 1024;

/// Failures surfaced on a stream binding's error channel.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A received line was not valid JSON.
    #[error("RpcStreamTransportJsonParseError: {original} (line: {line})")]
    Parse {
        /// The offending line, lossily decoded for diagnostics.
        line: String,
        /// The underlying parser message.
        original: String,
    },

    /// The line framing gave up on the current buffer.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// The underlying stream failed.
    #[error("stream i/o error: {0}")]
    Io(String),

    /// The peer closed the stream (clean EOF).
    #[error("stream closed by peer")]
    Closed,
}

/// Bind a pair to a byte stream.
///
/// Installs the pair's send function and spawns the reader and writer
/// tasks on the current [`tokio::task::LocalSet`].
pub fn bind<R, W>(pair: &Pair, reader: R, writer: W) -> StreamHandle
where
    R: AsyncRead + Unpin + 'static,
    W: AsyncWrite + Unpin + 'static,
{
    let (line_tx, line_rx) = mpsc::unbounded_channel::<String>();
    pair.set_send(move |frame: &Frame| {
        let mut line =
            serde_json::to_string(frame).map_err(|err| TransportError::Io(err.to_string()))?;
        line.push('\n');
        line_tx.send(line).map_err(|_| TransportError::Closed)
    });

    let (error_tx, error_rx) = mpsc::unbounded_channel::<StreamError>();

    let writer_task = tokio::task::spawn_local(write_loop(writer, line_rx, error_tx.clone()));
    let reader_task = tokio::task::spawn_local(read_loop(reader, pair.clone(), error_tx));

    StreamHandle {
        pair: pair.clone(),
        reader_task,
        writer_task,
        errors: Some(error_rx),
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut lines: mpsc::UnboundedReceiver<String>,
    errors: mpsc::UnboundedSender<StreamError>,
) {
    while let Some(line) = lines.recv().await {
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        if let Err(err) = result {
            tracing::warn!(error = %err, "stream write failed, stopping writer");
            let _ = errors.send(StreamError::Io(err.to_string()));
            break;
        }
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    pair: Pair,
    errors: mpsc::UnboundedSender<StreamError>,
) {
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut buffer = LineBuffer::new();

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => {
                tracing::debug!(pair = %pair.name(), "stream closed by peer");
                let _ = errors.send(StreamError::Closed);
                break;
            }
            Ok(n) => {
                let lines = match buffer.push(&chunk[..n]) {
                    Ok(lines) => lines,
                    Err(err) => {
                        let _ = errors.send(err.into());
                        continue;
                    }
                };
                for line in lines {
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_slice::<Value>(&line) {
                        Ok(message) => pair.incoming(message),
                        Err(err) => {
                            tracing::warn!(
                                pair = %pair.name(),
                                error = %err,
                                "undecodable line on stream"
                            );
                            let _ = errors.send(StreamError::Parse {
                                line: String::from_utf8_lossy(&line).into_owned(),
                                original: err.to_string(),
                            });
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(pair = %pair.name(), error = %err, "stream read failed");
                let _ = errors.send(StreamError::Io(err.to_string()));
                break;
            }
        }
    }
}

/// A live stream binding.
///
/// Dropping the handle leaves the tasks running; call
/// [`disconnect`](Self::disconnect) to release both directions.
pub struct StreamHandle {
    pair: Pair,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
    errors: Option<mpsc::UnboundedReceiver<StreamError>>,
}

impl StreamHandle {
    /// Take ownership of the error channel (first caller wins).
    pub fn take_errors(&mut self) -> Option<mpsc::UnboundedReceiver<StreamError>> {
        self.errors.take()
    }

    /// Release both directions: the pair gets a no-op send function and
    /// the reader/writer tasks stop. In-flight waiters are left to their
    /// timeouts.
    pub fn disconnect(self) {
        self.pair.set_send(|_frame| Ok(()));
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("pair", &self.pair.name())
            .finish()
    }
}
