// ABOUTME: Collaborator traits and platform-neutral message types for the relay
// ABOUTME: Lets the relay run against Discord in production and in-memory fakes in tests

use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// Incoming Message
// =============================================================================

/// A newly created chat message, already stripped of platform types
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform message ID (decimal snowflake)
    pub message_id: String,
    /// Channel (or thread) the message was posted in
    pub channel_id: String,
    /// Originating server, `None` for direct messages
    pub guild_id: Option<String>,
    /// Whether the author is a bot account
    pub author_is_bot: bool,
    /// Raw text content
    pub content: String,
    /// Canonical jump link to the message
    pub jump_url: String,
}

// =============================================================================
// Channel Metadata
// =============================================================================

/// What the relay needs to know about a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub is_thread: bool,
    /// Parent channel for threads, category for regular channels
    pub parent_id: Option<String>,
}

/// Resolves channel metadata from the chat platform
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Look up a channel by ID. `Ok(None)` when the channel is unknown.
    async fn lookup(&self, channel_id: &str) -> Result<Option<ChannelInfo>>;
}

// =============================================================================
// Outbound Delivery
// =============================================================================

/// Delivers formatted text to the forwarding destination
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Post one formatted message.
    ///
    /// Rejections by the destination are logged by the implementation and
    /// still count as delivered; `Err` means the request never completed.
    async fn post(&self, content: &str) -> Result<()>;
}
