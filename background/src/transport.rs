//! Native-messaging transport.
//!
//! Frames are a 4-byte native-endian length followed by that many bytes of
//! UTF-8 JSON. One reader loop decodes inbound frames and dispatches them;
//! every outbound frame goes through a single channel to one writer task so
//! frames never interleave.

use std::io::ErrorKind;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use shared::{ArchiveApi, Error, Response, Result, SettingsStore};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::notify::{Notification, Notifier};
use crate::reply;
use crate::request::Request;
use crate::router::{ActionRouter, Dispatch};
use crate::triggers::{self, ContextMenuItem, MenuEntry, Shortcut, Trigger};

/// Largest frame the browser accepts from a native host.
pub const MAX_OUTBOUND_FRAME: usize = 1024 * 1024;
/// Inbound frames above this size are drained and skipped.
pub const MAX_INBOUND_FRAME: usize = 4 * 1024 * 1024;

#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Message(Vec<u8>),
    /// A frame over [`MAX_INBOUND_FRAME`]; its bytes were consumed
    Oversized(usize),
    /// The input stream closed cleanly
    End,
}

fn io_error(context: &str, err: std::io::Error) -> Error {
    Error::Transport(format!("{}: {}", context, err))
}

pub async fn read_frame<R>(reader: &mut R) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(Frame::End),
        Err(e) => return Err(io_error("reading frame header", e)),
    }

    let len = u32::from_ne_bytes(header) as usize;
    if len > MAX_INBOUND_FRAME {
        let drained = tokio::io::copy(&mut (&mut *reader).take(len as u64), &mut tokio::io::sink())
            .await
            .map_err(|e| io_error("draining oversized frame", e))?;
        if drained < len as u64 {
            return Err(Error::Transport(format!(
                "stream closed inside a {} byte frame",
                len
            )));
        }
        return Ok(Frame::Oversized(len));
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| io_error("reading frame body", e))?;
    Ok(Frame::Message(body))
}

pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_OUTBOUND_FRAME {
        return Err(Error::Transport(format!(
            "outbound frame of {} bytes exceeds the {} byte limit",
            payload.len(),
            MAX_OUTBOUND_FRAME
        )));
    }

    let header = (payload.len() as u32).to_ne_bytes();
    writer
        .write_all(&header)
        .await
        .map_err(|e| io_error("writing frame header", e))?;
    writer
        .write_all(payload)
        .await
        .map_err(|e| io_error("writing frame body", e))?;
    writer.flush().await.map_err(|e| io_error("flushing frame", e))
}

/// Frames sent to the extension.
#[derive(Debug, Clone)]
pub enum Outbound {
    Response { id: u64, response: Response },
    /// The reply for `id` will arrive in a later frame
    Pending { id: u64 },
    Notification(Notification),
    ContextMenus(Vec<MenuEntry>),
}

impl Outbound {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let value = match self {
            Outbound::Response { id, response } => {
                let mut value = serde_json::to_value(response)?;
                if let Value::Object(map) = &mut value {
                    map.insert("kind".to_string(), json!("response"));
                    map.insert("id".to_string(), json!(id));
                }
                value
            }
            Outbound::Pending { id } => json!({"kind": "pending", "id": id}),
            Outbound::Notification(notification) => {
                let mut value = serde_json::to_value(notification)?;
                if let Value::Object(map) = &mut value {
                    map.insert("kind".to_string(), json!("notification"));
                }
                value
            }
            Outbound::ContextMenus(items) => json!({"kind": "contextMenus", "items": items}),
        };
        Ok(serde_json::to_vec(&value)?)
    }

    /// Encode, replacing a response too large for one frame with a failure
    /// for the same id.
    fn encode_bounded(&self) -> Result<Vec<u8>> {
        let bytes = self.encode()?;
        if bytes.len() <= MAX_OUTBOUND_FRAME {
            return Ok(bytes);
        }
        match self {
            Outbound::Response { id, .. } => {
                warn!(id, size = bytes.len(), "Response too large for one frame");
                Outbound::Response {
                    id: *id,
                    response: Response::failure(format!(
                        "Response of {} bytes exceeds the {} byte message limit",
                        bytes.len(),
                        MAX_OUTBOUND_FRAME
                    )),
                }
                .encode()
            }
            _ => Err(Error::Transport(format!("outbound frame of {} bytes dropped", bytes.len()))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum TriggerFrame {
    #[serde(rename_all = "camelCase")]
    ContextMenu { menu_item_id: String, page_url: String },
    #[serde(rename_all = "camelCase")]
    Shortcut { key: String, page_url: String },
}

impl TriggerFrame {
    fn into_trigger(self) -> Option<Trigger> {
        match self {
            TriggerFrame::ContextMenu { menu_item_id, page_url } => {
                ContextMenuItem::from_id(&menu_item_id).map(|item| Trigger::ContextMenu { item, page_url })
            }
            TriggerFrame::Shortcut { key, page_url } => {
                Shortcut::from_key(&key).map(|key| Trigger::Shortcut { key, page_url })
            }
        }
    }
}

#[derive(Debug)]
pub enum Inbound {
    Message { id: u64, request: Request },
    Trigger(Trigger),
    /// Undecodable frame; answered when it carries an id, skipped otherwise.
    /// Broken JSON is a transport error, a bad field a validation error.
    Malformed { id: Option<u64>, error: Error },
}

pub fn parse_inbound(bytes: &[u8]) -> Inbound {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            return Inbound::Malformed {
                id: None,
                error: Error::Transport(format!("Invalid JSON: {}", e)),
            }
        }
    };
    let id = value.get("id").and_then(Value::as_u64);

    if value.get("event").is_some() {
        return match serde_json::from_value::<TriggerFrame>(value) {
            Ok(frame) => match frame.into_trigger() {
                Some(trigger) => Inbound::Trigger(trigger),
                None => Inbound::Malformed {
                    id,
                    error: Error::Validation("Unknown menu item or shortcut".to_string()),
                },
            },
            Err(e) => Inbound::Malformed {
                id,
                error: Error::Validation(format!("Malformed trigger: {}", e)),
            },
        };
    }

    let Some(id) = id else {
        return Inbound::Malformed {
            id: None,
            error: Error::Transport("Message frame has no id".to_string()),
        };
    };
    match serde_json::from_value::<Request>(value) {
        Ok(request) => Inbound::Message { id, request },
        Err(e) => Inbound::Malformed {
            id: Some(id),
            error: Error::Validation(format!("Malformed request: {}", e)),
        },
    }
}

fn send(tx: &mpsc::UnboundedSender<Outbound>, frame: Outbound) {
    if tx.send(frame).is_err() {
        debug!("Writer task has stopped; frame discarded");
    }
}

/// Notifier that emits notification frames.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        send(&self.tx, Outbound::Notification(notification));
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Outbound>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let bytes = match frame.encode_bounded() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "Failed to encode outbound frame");
                continue;
            }
        };
        write_frame(&mut writer, &bytes).await?;
    }
    Ok(())
}

/// Serve requests from `reader` until it closes.
///
/// On end of input no further frames are read; in-flight work is allowed to
/// finish and its frames are flushed before this returns.
pub async fn serve<R, W, A, S>(mut reader: R, writer: W, router: ActionRouter<A, S>) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    A: ArchiveApi + 'static,
    S: SettingsStore + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_loop(writer, rx));
    send(&tx, Outbound::ContextMenus(triggers::menu_entries()));

    let notifier = Arc::new(ChannelNotifier::new(tx.clone()));
    let mut tasks = JoinSet::new();

    let outcome = loop {
        let frame = match read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(e) => break Err(e),
        };

        match frame {
            Frame::End => break Ok(()),
            Frame::Oversized(len) => warn!(len, "Skipped oversized inbound frame"),
            Frame::Message(bytes) => match parse_inbound(&bytes) {
                Inbound::Message { id, request } => {
                    let (reply, rx) = reply::channel();
                    let dispatch = router.handle(&request, reply).await;
                    let tx = tx.clone();
                    if dispatch == Dispatch::Pending {
                        send(&tx, Outbound::Pending { id });
                    }
                    tasks.spawn(async move {
                        let response = rx
                            .await
                            .unwrap_or_else(|_| Response::failure("Internal error: reply channel closed"));
                        send(&tx, Outbound::Response { id, response });
                    });
                }
                Inbound::Trigger(trigger) => {
                    let router = router.clone();
                    let notifier = Arc::clone(&notifier);
                    tasks.spawn(async move {
                        triggers::run(&router, notifier.as_ref(), &trigger).await;
                    });
                }
                Inbound::Malformed { id: Some(id), error } => {
                    warn!(id, kind = error.kind(), error = %error, "Malformed inbound frame");
                    send(
                        &tx,
                        Outbound::Response {
                            id,
                            response: Response::from(error),
                        },
                    );
                }
                Inbound::Malformed { id: None, error } => {
                    warn!(kind = error.kind(), error = %error, "Skipped inbound frame without id");
                }
            },
        }

        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                error!(error = %e, "Request task failed");
            }
        }
    };

    if let Err(e) = &outcome {
        error!(error = %e, "Stopped reading from the extension");
    }
    info!(in_flight = tasks.len(), "Input closed; finishing in-flight requests");
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Request task failed");
        }
    }

    drop(notifier);
    drop(tx);
    writer_task
        .await
        .map_err(|e| Error::Internal(format!("writer task failed: {}", e)))??;

    outcome
}
