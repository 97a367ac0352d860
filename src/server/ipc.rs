// Query server protocol over Unix domain sockets: length-prefixed JSON frames

use crate::error::{Result, ReviewLensError};
use crate::models::{QueryRequest, StreamEvent};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

/// Default maximum frame size (10MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

/// Requests sent from the CLI to the query server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IpcMessage {
    /// Answer a question; streamed as event frames when `stream` is set
    Ask {
        request: QueryRequest,
        #[serde(default)]
        stream: bool,
        /// Overrides the server's current date
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date: Option<NaiveDate>,
    },
    /// Review counts per rating and period
    Stats,
    /// Server status
    Status,
}

/// Single response frame for non-streaming requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl IpcResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn success_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Unix domain socket listener
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
}

impl IpcServer {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            listener: None,
        }
    }

    /// Bind to the socket path, replacing a stale socket file
    pub async fn bind(&mut self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| ReviewLensError::Io {
                source: e,
                context: format!("Failed to remove existing socket: {:?}", self.socket_path),
            })?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ReviewLensError::Io {
                source: e,
                context: format!("Failed to create socket directory: {:?}", parent),
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| ReviewLensError::Io {
            source: e,
            context: format!("Failed to bind to socket: {:?}", self.socket_path),
        })?;

        self.listener = Some(listener);

        tracing::info!("Query server listening on {:?}", self.socket_path);
        Ok(())
    }

    pub async fn accept(&self) -> Result<UnixStream> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| ReviewLensError::Server("Server not bound".to_string()))?;

        let (stream, _addr) = listener.accept().await.map_err(|e| ReviewLensError::Io {
            source: e,
            context: "Failed to accept connection".to_string(),
        })?;

        Ok(stream)
    }

    /// Remove the socket file
    pub fn shutdown(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| ReviewLensError::Io {
                source: e,
                context: format!("Failed to remove socket: {:?}", self.socket_path),
            })?;
        }
        Ok(())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

/// Read one length-prefixed JSON frame
pub async fn read_frame<R, T>(reader: &mut R, max_size: u32) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let length = reader.read_u32().await.map_err(|e| ReviewLensError::Io {
        source: e,
        context: "Failed to read frame length".to_string(),
    })?;

    if length > max_size {
        return Err(ReviewLensError::Server(format!(
            "Frame too large: {} bytes (max: {})",
            length, max_size
        )));
    }

    let mut buffer = vec![0u8; length as usize];
    reader
        .read_exact(&mut buffer)
        .await
        .map_err(|e| ReviewLensError::Io {
            source: e,
            context: "Failed to read frame payload".to_string(),
        })?;

    serde_json::from_slice(&buffer).map_err(|e| ReviewLensError::Json {
        source: e,
        context: "Failed to deserialize frame".to_string(),
    })
}

/// Write one length-prefixed JSON frame (4-byte big-endian length)
pub async fn write_frame<W, T>(writer: &mut W, value: &T, max_size: u32) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(value).map_err(|e| ReviewLensError::Json {
        source: e,
        context: "Failed to serialize frame".to_string(),
    })?;

    if payload.len() > max_size as usize {
        return Err(ReviewLensError::Server(format!(
            "Frame too large: {} bytes (max: {})",
            payload.len(),
            max_size
        )));
    }

    writer
        .write_u32(payload.len() as u32)
        .await
        .map_err(|e| ReviewLensError::Io {
            source: e,
            context: "Failed to write frame length".to_string(),
        })?;

    writer
        .write_all(&payload)
        .await
        .map_err(|e| ReviewLensError::Io {
            source: e,
            context: "Failed to write frame payload".to_string(),
        })?;

    writer.flush().await.map_err(|e| ReviewLensError::Io {
        source: e,
        context: "Failed to flush frame".to_string(),
    })
}

/// Client side of the query server protocol
pub struct IpcClient {
    socket_path: PathBuf,
    max_message_size: u32,
}

impl IpcClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_max_message_size(mut self, max_message_size: u32) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    async fn connect(&self, message: &IpcMessage) -> Result<UnixStream> {
        let mut stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|e| ReviewLensError::Io {
                    source: e,
                    context: format!("Failed to connect to server at {:?}", self.socket_path),
                })?;

        write_frame(&mut stream, message, self.max_message_size).await?;
        Ok(stream)
    }

    /// Send a request and read its single response frame
    pub async fn send(&self, message: &IpcMessage) -> Result<IpcResponse> {
        let mut stream = self.connect(message).await?;
        read_frame(&mut stream, self.max_message_size).await
    }

    /// Send a streaming ask and hand each event to `on_event` until a
    /// terminal event arrives
    pub async fn ask_stream<F>(
        &self,
        request: QueryRequest,
        date: Option<NaiveDate>,
        mut on_event: F,
    ) -> Result<()>
    where
        F: FnMut(&StreamEvent),
    {
        let message = IpcMessage::Ask {
            request,
            stream: true,
            date,
        };
        let mut stream = self.connect(&message).await?;

        loop {
            let event: StreamEvent = read_frame(&mut stream, self.max_message_size).await?;
            on_event(&event);
            if event.is_terminal() {
                return Ok(());
            }
        }
    }
}
