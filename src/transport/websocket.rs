//! WebSocket transport over plain TCP
//!
//! The handshake runs once on the TCP stream. The handshake socket keeps
//! whatever it read past the upgrade response, so it becomes the reader
//! half. A clone of the stream backs a single writer that both halves
//! share: the reader's own socket never writes, and pong and close
//! replies go through the shared writer so they cannot land in the middle
//! of a transaction frame. Only `ws://` urls are supported.

use super::{Inbound, Outbound};
use crate::error::{Result, UifError};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};
use tungstenite::client::IntoClientRequest;
use tungstenite::protocol::Role;
use tungstenite::{Message, WebSocket};

/// Default port when the url does not name one
const DEFAULT_WS_PORT: u16 = 80;

/// TCP stream of the reader half.
///
/// Writes pass through during the handshake and are discarded afterwards.
#[derive(Debug)]
struct ReadStream {
    stream: TcpStream,
    writes_enabled: bool,
}

impl Read for ReadStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for ReadStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.writes_enabled {
            self.stream.write(buf)
        } else {
            Ok(buf.len())
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.writes_enabled {
            self.stream.flush()
        } else {
            Ok(())
        }
    }
}

type SharedWriter = Arc<Mutex<WebSocket<TcpStream>>>;

fn lock_writer(writer: &SharedWriter) -> Result<MutexGuard<'_, WebSocket<TcpStream>>> {
    writer
        .lock()
        .map_err(|e| UifError::poisoned("websocket writer", e))
}

/// Writer half of a websocket connection
#[derive(Debug)]
pub struct WsOutbound {
    writer: SharedWriter,
}

/// Reader half of a websocket connection
#[derive(Debug)]
pub struct WsInbound {
    socket: WebSocket<ReadStream>,
    writer: SharedWriter,
}

/// Dial `url` and complete the websocket handshake.
pub fn connect(url: &str) -> Result<(WsOutbound, WsInbound)> {
    let request = url
        .into_client_request()
        .map_err(|e| UifError::Connection(format!("invalid url `{}`: {}", url, e)))?;

    let (host, port) = {
        let uri = request.uri();
        match uri.scheme_str() {
            Some("ws") => {}
            Some(other) => {
                return Err(UifError::Connection(format!(
                    "unsupported scheme `{}` (only ws:// is supported)",
                    other
                )))
            }
            None => return Err(UifError::Connection(format!("url `{}` has no scheme", url))),
        }
        let host = uri
            .host()
            .ok_or_else(|| UifError::Connection(format!("url `{}` has no host", url)))?
            .to_string();
        (host, uri.port_u16().unwrap_or(DEFAULT_WS_PORT))
    };

    let stream = TcpStream::connect((host.as_str(), port))
        .map_err(|e| UifError::Connection(format!("failed to connect to {}:{}: {}", host, port, e)))?;
    stream
        .set_nodelay(true)
        .map_err(|e| UifError::Connection(format!("failed to configure socket: {}", e)))?;

    let stream = ReadStream {
        stream,
        writes_enabled: true,
    };
    let (mut reader, response) = tungstenite::client(request, stream)
        .map_err(|e| UifError::Connection(format!("websocket handshake failed: {}", e)))?;
    tracing::debug!("Websocket handshake completed with status {}", response.status());

    let writer_stream = reader
        .get_ref()
        .stream
        .try_clone()
        .map_err(|e| UifError::Connection(format!("failed to clone socket: {}", e)))?;
    reader.get_mut().writes_enabled = false;
    let writer = Arc::new(Mutex::new(WebSocket::from_raw_socket(
        writer_stream,
        Role::Client,
        None,
    )));

    Ok((
        WsOutbound {
            writer: writer.clone(),
        },
        WsInbound {
            socket: reader,
            writer,
        },
    ))
}

impl Outbound for WsOutbound {
    fn send(&mut self, text: &str) -> Result<()> {
        lock_writer(&self.writer)?
            .send(Message::Text(text.to_string()))
            .map_err(|e| UifError::Transport(e.to_string()))
    }

    fn close(&mut self) -> Result<()> {
        let mut writer = lock_writer(&self.writer)?;
        if let Err(e) = writer.close(None) {
            tracing::debug!("Close handshake not sent: {}", e);
        }
        if let Err(e) = writer.flush() {
            tracing::debug!("Close frame not flushed: {}", e);
        }
        match writer.get_ref().shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(UifError::Io(e)),
        }
    }
}

impl WsInbound {
    fn reply_pong(&self, data: Vec<u8>) -> Result<()> {
        let mut writer = lock_writer(&self.writer)?;
        if !writer.can_write() {
            return Ok(());
        }
        writer
            .send(Message::Pong(data))
            .map_err(|e| UifError::Transport(e.to_string()))
    }

    /// Answer the host's close frame unless we already sent ours.
    fn reply_close(&self) -> Result<()> {
        let mut writer = lock_writer(&self.writer)?;
        if !writer.can_write() {
            return Ok(());
        }
        if let Err(e) = writer.close(None).and_then(|_| writer.flush()) {
            tracing::debug!("Close reply not sent: {}", e);
        }
        Ok(())
    }
}

impl Inbound for WsInbound {
    fn recv(&mut self) -> Result<Option<String>> {
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Binary(bytes)) => {
                    return String::from_utf8(bytes)
                        .map(Some)
                        .map_err(|e| UifError::Decode(format!("binary frame is not UTF-8: {}", e)));
                }
                Ok(Message::Ping(data)) => self.reply_pong(data)?,
                Ok(Message::Close(frame)) => {
                    tracing::debug!("Host sent close frame: {:?}", frame);
                    self.reply_close()?;
                    return Ok(None);
                }
                // Pongs and raw frames carry no events.
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(None);
                }
                Err(e) => return Err(UifError::Transport(e.to_string())),
            }
        }
    }
}
