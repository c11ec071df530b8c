//! Stream pool implementation
//!
//! Maps stream ids to their live stream record and the input feeding it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::av::EsFrame;
use crate::input::{InputPhase, LiveInput};
use crate::stats::InputStats;

use super::config::RegistryConfig;
use super::error::RegistryError;
use super::stream::{LiveStream, StreamSnapshot};

struct PoolEntry {
    stream: Arc<LiveStream>,
    input: Option<LiveInput>,
}

/// All live streams served by this process
///
/// Thread-safe via `RwLock`. Fan-out happens on each [`LiveStream`] and never
/// touches the pool lock.
pub struct StreamPool {
    streams: RwLock<HashMap<String, PoolEntry>>,
    config: RegistryConfig,
}

impl StreamPool {
    /// Create a pool with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a pool with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a stream pulled from `uri`
    ///
    /// The URI must parse and use the `scheme://` form.
    pub async fn add_stream(
        &self,
        stream_id: &str,
        uri: &str,
    ) -> Result<Arc<LiveStream>, RegistryError> {
        if stream_id.is_empty() {
            return Err(RegistryError::EmptyStreamId);
        }
        validate_uri(uri)?;

        let mut streams = self.streams.write().await;
        if streams.contains_key(stream_id) {
            return Err(RegistryError::StreamAlreadyExists(stream_id.to_string()));
        }

        let stream = Arc::new(LiveStream::new(stream_id, uri, self.config.clone()));
        streams.insert(
            stream_id.to_string(),
            PoolEntry {
                stream: Arc::clone(&stream),
                input: None,
            },
        );

        tracing::info!(stream_id = stream_id, uri = uri, streams = streams.len(), "Stream added");
        Ok(stream)
    }

    /// Remove a stream, closing its input, attached queue and viewers
    pub async fn remove_stream(&self, stream_id: &str) -> Result<(), RegistryError> {
        let entry = self
            .streams
            .write()
            .await
            .remove(stream_id)
            .ok_or_else(|| RegistryError::StreamNotFound(stream_id.to_string()))?;

        if let Some(mut input) = entry.input {
            input.close();
        }
        entry.stream.close().await;

        tracing::info!(stream_id = stream_id, "Stream removed");
        Ok(())
    }

    /// Start `input` pulling the stream's source
    pub async fn attach_input(
        &self,
        stream_id: &str,
        mut input: LiveInput,
    ) -> Result<(), RegistryError> {
        let mut streams = self.streams.write().await;
        let entry = streams
            .get_mut(stream_id)
            .ok_or_else(|| RegistryError::StreamNotFound(stream_id.to_string()))?;
        if entry.input.is_some() {
            return Err(RegistryError::InputAlreadyAttached(stream_id.to_string()));
        }

        input.open(Arc::clone(&entry.stream));
        entry.input = Some(input);
        Ok(())
    }

    /// Phase of the stream's input, `None` if no input is attached
    pub async fn input_phase(&self, stream_id: &str) -> Result<Option<InputPhase>, RegistryError> {
        let streams = self.streams.read().await;
        let entry = streams
            .get(stream_id)
            .ok_or_else(|| RegistryError::StreamNotFound(stream_id.to_string()))?;
        Ok(entry.input.as_ref().map(LiveInput::phase))
    }

    /// Counters of the stream's input, `None` if no input is attached
    pub async fn input_stats(&self, stream_id: &str) -> Result<Option<InputStats>, RegistryError> {
        let streams = self.streams.read().await;
        let entry = streams
            .get(stream_id)
            .ok_or_else(|| RegistryError::StreamNotFound(stream_id.to_string()))?;
        Ok(entry.input.as_ref().map(LiveInput::stats))
    }

    /// Register a direct viewer on a stream
    pub async fn add_session(
        &self,
        stream_id: &str,
        session_id: &str,
        protocol: &str,
    ) -> Result<mpsc::Receiver<EsFrame>, RegistryError> {
        let stream = self.get_stream(stream_id).await?;
        stream.add_viewer(session_id, protocol).await
    }

    /// Remove a direct viewer from a stream
    pub async fn remove_session(
        &self,
        stream_id: &str,
        session_id: &str,
    ) -> Result<(), RegistryError> {
        let stream = self.get_stream(stream_id).await?;
        stream.remove_viewer(session_id).await
    }

    /// Remove every viewer using `protocol`, across all streams
    pub async fn remove_sessions_by_protocol(&self, protocol: &str) -> usize {
        let streams: Vec<Arc<LiveStream>> = self
            .streams
            .read()
            .await
            .values()
            .map(|e| Arc::clone(&e.stream))
            .collect();

        let mut removed = 0;
        for stream in streams {
            removed += stream.remove_viewers_by_protocol(protocol).await;
        }
        removed
    }

    /// Declare an output on a stream
    pub async fn add_output(
        &self,
        stream_id: &str,
        protocol: &str,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        let stream = self.get_stream(stream_id).await?;
        stream.add_output(protocol, enabled).await
    }

    pub async fn remove_output(&self, stream_id: &str, protocol: &str) -> Result<(), RegistryError> {
        let stream = self.get_stream(stream_id).await?;
        stream.remove_output(protocol).await
    }

    /// Whether the stream exists and serves `protocol`
    pub async fn has_output(&self, stream_id: &str, protocol: &str) -> bool {
        match self.get_stream(stream_id).await {
            Ok(stream) => stream.has_output(protocol).await,
            Err(_) => false,
        }
    }

    pub async fn get_stream(&self, stream_id: &str) -> Result<Arc<LiveStream>, RegistryError> {
        self.streams
            .read()
            .await
            .get(stream_id)
            .map(|e| Arc::clone(&e.stream))
            .ok_or_else(|| RegistryError::StreamNotFound(stream_id.to_string()))
    }

    /// Current snapshot of a stream
    pub async fn snapshot(&self, stream_id: &str) -> Result<StreamSnapshot, RegistryError> {
        Ok(self.get_stream(stream_id).await?.snapshot())
    }

    /// Get total number of streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Ids of all registered streams, sorted
    pub async fn stream_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.streams.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Remove every stream
    pub async fn close_all(&self) {
        let entries: Vec<PoolEntry> = self.streams.write().await.drain().map(|(_, e)| e).collect();
        let count = entries.len();

        for entry in entries {
            if let Some(mut input) = entry.input {
                input.close();
            }
            entry.stream.close().await;
        }

        tracing::info!(streams = count, "Stream pool closed");
    }
}

impl Default for StreamPool {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_uri(uri: &str) -> Result<(), RegistryError> {
    let invalid = || RegistryError::InvalidUri(uri.to_string());
    let parsed = url::Url::parse(uri).map_err(|_| invalid())?;

    // Rejects forms like `mailto:x` or `rtsp:host` that parse but carry no authority
    match uri.get(parsed.scheme().len()..) {
        Some(rest) if rest.starts_with("://") => Ok(()),
        _ => Err(invalid()),
    }
}
