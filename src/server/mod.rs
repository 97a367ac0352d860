// Query server: answers questions for CLI clients over a Unix socket

mod ipc;
mod signals;

pub use ipc::{
    read_frame, write_frame, IpcClient, IpcMessage, IpcResponse, IpcServer,
    DEFAULT_MAX_MESSAGE_SIZE,
};
pub use signals::SignalHandler;

use crate::engine::RagEngine;
use crate::error::{Result, ReviewLensError};
use crate::stats::ReviewStatsCollector;
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task;

/// Long-running server sharing one engine across connections
pub struct QueryServer {
    engine: Arc<RagEngine>,
    stats: Arc<ReviewStatsCollector>,
    socket_path: PathBuf,
    max_message_size: u32,
}

impl QueryServer {
    pub fn new(engine: Arc<RagEngine>) -> Self {
        let config = &engine.context().config;
        let stats = Arc::new(ReviewStatsCollector::new(
            engine.context().store.clone(),
            config.stats.max_concurrent,
        ));
        let socket_path = expand_tilde(&config.server.socket_path);
        let max_message_size = config.server.max_message_size;

        Self {
            engine,
            stats,
            socket_path,
            max_message_size,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Serve until SIGTERM or SIGINT
    pub async fn run(&self) -> Result<()> {
        let mut signal_handler = SignalHandler::new()?;

        let mut ipc_server = IpcServer::new(self.socket_path.clone());
        ipc_server.bind().await?;

        tracing::info!("Query server started");

        loop {
            tokio::select! {
                accepted = ipc_server.accept() => {
                    match accepted {
                        Ok(stream) => {
                            let handler = ConnectionHandler {
                                engine: self.engine.clone(),
                                stats: self.stats.clone(),
                                max_message_size: self.max_message_size,
                            };
                            task::spawn(async move {
                                let mut stream = stream;
                                if let Err(e) = handler.handle(&mut stream).await {
                                    tracing::error!("Client handler error: {}", e);
                                }
                            });
                        }
                        Err(e) => tracing::warn!("Accept failed: {}", e),
                    }
                }

                sig = signal_handler.wait() => {
                    if signals::should_shutdown(sig) {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        ipc_server.shutdown()?;
        tracing::info!("Query server stopped");
        Ok(())
    }
}

/// Per-connection request handling
#[derive(Clone)]
pub struct ConnectionHandler {
    pub engine: Arc<RagEngine>,
    pub stats: Arc<ReviewStatsCollector>,
    pub max_message_size: u32,
}

impl ConnectionHandler {
    /// Read one request and write its response frame(s)
    ///
    /// A failed write while streaming drops the event receiver, which
    /// cancels the request.
    pub async fn handle<S>(&self, stream: &mut S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let message: IpcMessage = read_frame(stream, self.max_message_size).await?;
        tracing::debug!("Received message: {:?}", message);

        match message {
            IpcMessage::Ask {
                request,
                stream: true,
                date,
            } => {
                let mut events = self.engine.answer_stream(request, today_or(date));
                while let Some(event) = events.recv().await {
                    write_frame(stream, &event, self.max_message_size).await?;
                }
                Ok(())
            }
            IpcMessage::Ask {
                request,
                stream: false,
                date,
            } => {
                let response = match self.engine.answer(&request, today_or(date)).await {
                    Ok(answer) => to_data(&answer)?,
                    Err(e) => {
                        tracing::error!("Ask failed: {}", e);
                        IpcResponse::error(e.public_message())
                    }
                };
                write_frame(stream, &response, self.max_message_size).await
            }
            IpcMessage::Stats => {
                let response = match self.stats.collect(Utc::now()).await {
                    Ok(stats) => to_data(&stats)?,
                    Err(e) => {
                        tracing::error!("Stats failed: {}", e);
                        IpcResponse::error(e.public_message())
                    }
                };
                write_frame(stream, &response, self.max_message_size).await
            }
            IpcMessage::Status => {
                let config = &self.engine.context().config;
                let response = IpcResponse::success_with_data(serde_json::json!({
                    "status": "running",
                    "collection": config.vector_store.collection,
                    "model": config.llm.model,
                    "parser_model": config.llm.parser_model,
                }));
                write_frame(stream, &response, self.max_message_size).await
            }
        }
    }
}

fn today_or(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Utc::now().date_naive())
}

fn to_data<T: serde::Serialize>(value: &T) -> Result<IpcResponse> {
    let data = serde_json::to_value(value).map_err(|e| ReviewLensError::Json {
        source: e,
        context: "Failed to serialize response data".to_string(),
    })?;
    Ok(IpcResponse::success_with_data(data))
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let plain = PathBuf::from("/tmp/reviewlens.sock");
        assert_eq!(expand_tilde(&plain), plain);

        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_tilde(Path::new("~/.reviewlens/reviewlens.sock")),
                home.join(".reviewlens/reviewlens.sock")
            );
        }
    }

    #[test]
    fn test_today_or_prefers_supplied_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(today_or(Some(date)), date);
    }
}
