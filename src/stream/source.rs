use async_trait::async_trait;

use crate::error::Result;
use crate::types::StreamMessage;

/// "Read the next message for this group." Blocks until one is available or the
/// read fails. Offsets advance implicitly on a successful read, so a message
/// handed out here is never handed out again by the same group cursor.
#[async_trait]
pub trait StreamSource: Send {
    async fn next_message(&mut self) -> Result<StreamMessage>;

    /// Short description for logs (brokers, topic, group).
    fn describe(&self) -> String;
}
