//! Callback-style delivery adapted to the pull seam
//!
//! Client libraries that push messages through a registered callback hand them to a
//! [`PushHandle`]. The paired [`PushConsumer`] holds at most one undelivered message, so a
//! producer calling [`PushHandle::deliver`] waits until the dispatcher has taken the
//! previous one.

use crate::error::{ListenerError, ListenerResult};
use crate::transport::MessageConsumer;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use types::RawMessage;

/// Create a connected handle/consumer pair
pub fn push_channel() -> (PushHandle, PushConsumer) {
    let (sender, receiver) = mpsc::channel(1);
    (
        PushHandle { sender },
        PushConsumer {
            receiver: Mutex::new(receiver),
        },
    )
}

#[derive(Debug, Clone)]
pub struct PushHandle {
    sender: mpsc::Sender<RawMessage>,
}

impl PushHandle {
    /// Hand a message to the consumer, waiting while the slot is occupied
    pub async fn deliver(&self, message: RawMessage) -> ListenerResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| ListenerError::transport("deliver", "push consumer is closed"))
    }

    /// Hand a message over only if the slot is free
    pub fn try_deliver(&self, message: RawMessage) -> ListenerResult<()> {
        self.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                ListenerError::transport("deliver", "a message is already pending")
            }
            mpsc::error::TrySendError::Closed(_) => {
                ListenerError::transport("deliver", "push consumer is closed")
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Debug)]
pub struct PushConsumer {
    receiver: Mutex<mpsc::Receiver<RawMessage>>,
}

#[async_trait]
impl MessageConsumer for PushConsumer {
    async fn receive(&self, timeout: Duration) -> ListenerResult<Option<RawMessage>> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => {
                debug!("Push handle dropped, nothing further to receive");
                Ok(None)
            }
            Err(_) => Ok(None),
        }
    }

    async fn close(&self) -> ListenerResult<()> {
        self.receiver.lock().await.close();
        Ok(())
    }
}
