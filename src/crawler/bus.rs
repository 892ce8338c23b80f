//! Named broadcast channels
//!
//! A coarser extension surface than [`crate::crawler::PipelineHandler`]: any
//! number of independent consumers can subscribe to a channel by name and
//! observe the same event stream.

use crate::crawler::request::PreparedRequest;
use crate::crawler::PipelineSummary;
use crate::PipelineError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::Url;

pub const NEW_URL: &str = "new_url";
pub const NEW_DOMAIN: &str = "new_domain";
pub const NEW_REQUEST: &str = "new_request";
pub const PIPELINE_FINISHED: &str = "pipeline_finished";

/// Every channel the pipeline publishes on
pub const CHANNELS: &[&str] = &[NEW_URL, NEW_DOMAIN, NEW_REQUEST, PIPELINE_FINISHED];

const CHANNEL_CAPACITY: usize = 1024;

/// Payload carried on the bus
#[derive(Debug, Clone)]
pub enum BusEvent {
    NewUrl(Url),
    NewDomain(String),
    NewRequest(PreparedRequest),
    PipelineFinished(PipelineSummary),
}

impl BusEvent {
    /// Name of the channel this event is published on
    pub fn channel(&self) -> &'static str {
        match self {
            Self::NewUrl(_) => NEW_URL,
            Self::NewDomain(_) => NEW_DOMAIN,
            Self::NewRequest(_) => NEW_REQUEST,
            Self::PipelineFinished(_) => PIPELINE_FINISHED,
        }
    }
}

/// Set of named broadcast channels, cheap to clone
#[derive(Debug, Clone)]
pub struct EventBus {
    channels: Arc<HashMap<&'static str, broadcast::Sender<BusEvent>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let channels = CHANNELS
            .iter()
            .map(|name| (*name, broadcast::channel(CHANNEL_CAPACITY).0))
            .collect();
        Self {
            channels: Arc::new(channels),
        }
    }

    /// Returns a receiver for the named channel
    ///
    /// Only events published after this call are received.
    pub fn subscribe(&self, name: &str) -> Result<broadcast::Receiver<BusEvent>, PipelineError> {
        self.channels
            .get(name)
            .map(broadcast::Sender::subscribe)
            .ok_or_else(|| PipelineError::UnknownChannel(name.to_string()))
    }

    /// Spawns a task that calls `f` for every event on the named channel
    ///
    /// The task ends when the bus is dropped. A consumer that falls behind
    /// skips the missed events and keeps going.
    pub fn link_handler<F>(&self, name: &str, mut f: F) -> Result<JoinHandle<()>, PipelineError>
    where
        F: FnMut(BusEvent) + Send + 'static,
    {
        let mut receiver = self.subscribe(name)?;
        let channel = name.to_string();

        Ok(tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => f(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Handler on '{}' lagged, skipped {} events", channel, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    /// Publishes an event on its channel; having no subscribers is not an error
    pub fn publish(&self, event: BusEvent) {
        if let Some(sender) = self.channels.get(event.channel()) {
            let _ = sender.send(event);
        }
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.channels
            .get(name)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }
}
