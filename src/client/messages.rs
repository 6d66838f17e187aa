use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_util::sync::CancellationToken;

use crate::error::DbToolsError;

/// Sink for human readable progress lines of long operations.
#[async_trait]
pub trait MessagesDataManager: Send + Sync + fmt::Debug {
    /// # Errors
    /// Returns an error when the message cannot be delivered.
    async fn send_message(
        &self,
        user_name: Option<&str>,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<(), DbToolsError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressMessage {
    pub user_name: Option<String>,
    pub message: String,
}

/// [`MessagesDataManager`] over an unbounded tokio channel.
///
/// ```rust
/// # use db_tools::client::messages::{ChannelMessages, MessagesDataManager};
/// # use tokio_util::sync::CancellationToken;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (messages, mut rx) = ChannelMessages::new();
/// messages
///     .send_message(Some("ops"), "Backup database Sales...", &CancellationToken::new())
///     .await
///     .unwrap();
/// assert_eq!(rx.recv().await.unwrap().message, "Backup database Sales...");
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChannelMessages {
    sender: UnboundedSender<ProgressMessage>,
}

impl ChannelMessages {
    #[must_use]
    pub fn new() -> (Self, UnboundedReceiver<ProgressMessage>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }

    #[must_use]
    pub fn from_sender(sender: UnboundedSender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl MessagesDataManager for ChannelMessages {
    async fn send_message(
        &self,
        user_name: Option<&str>,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<(), DbToolsError> {
        if cancel.is_cancelled() {
            return Err(DbToolsError::Cancelled);
        }
        self.sender
            .send(ProgressMessage {
                user_name: user_name.map(str::to_string),
                message: message.to_string(),
            })
            .map_err(|_| DbToolsError::ExecutionError("progress receiver was dropped".into()))
    }
}
