//! Task queue interface
//!
//! The tunnel only needs to hand labeled work items to something that
//! eventually reaches the agent. [`ChannelTaskQueue`] is the in-process
//! implementation feeding the agent link.

use super::types::WorkItem;
use crate::error::TaskRelayError;
use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::mpsc;

/// Trait implemented by every work item sink
#[async_trait]
pub trait TaskQueue: Send + Sync + Debug {
    /// Submit a work item for the agent
    async fn submit(&self, item: WorkItem) -> Result<(), TaskRelayError>;
}

/// Task queue backed by an unbounded mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelTaskQueue {
    tx: mpsc::UnboundedSender<WorkItem>,
}

impl ChannelTaskQueue {
    /// Create a queue and the receiver that drains it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkItem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelTaskQueue { tx }, rx)
    }
}

#[async_trait]
impl TaskQueue for ChannelTaskQueue {
    async fn submit(&self, item: WorkItem) -> Result<(), TaskRelayError> {
        self.tx
            .send(item)
            .map_err(|e| TaskRelayError::TaskQueue(format!("queue closed, dropped {}", e.0)))
    }
}
