// ABOUTME: Per-message relay pipeline from chat event to webhook forward
// ABOUTME: Filters game-day threads, tracks Foos membership, classifies, dedups, and forwards

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::{
    classifier::{Classifier, MessageKind},
    config::Config,
    format::format_forward,
    state::StateStore,
    traits::{ChannelDirectory, Forwarder, IncomingMessage},
};

/// Why a message was not forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    BotAuthor,
    OtherGuild,
    UnknownChannel,
    NotThread,
    NotGameDay,
    EmptyContent,
    NotFoosThread,
    Unclassified,
    AlreadyForwarded,
}

/// Result of handling one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Forwarded(MessageKind),
    Ignored(IgnoreReason),
}

/// Owns everything needed to turn chat messages into forwards
pub struct Relay {
    guild_id: String,
    game_day_category_id: String,
    classifier: Classifier,
    store: StateStore,
    forwarder: Arc<dyn Forwarder>,
}

impl Relay {
    pub fn new(config: &Config, store: StateStore, forwarder: Arc<dyn Forwarder>) -> Result<Self> {
        let classifier =
            Classifier::new(&config.team).context("Failed to build message classifier")?;
        Ok(Self {
            guild_id: config.discord.guild_id.clone(),
            game_day_category_id: config.discord.game_day_category_id.clone(),
            classifier,
            store,
            forwarder,
        })
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Handle one newly created message.
    ///
    /// Lookup and persistence failures are returned to the caller; a failed
    /// webhook delivery is logged and the message still counts as handled.
    pub async fn handle_message(
        &self,
        directory: &dyn ChannelDirectory,
        msg: &IncomingMessage,
    ) -> Result<Outcome> {
        if msg.author_is_bot {
            return Ok(Outcome::Ignored(IgnoreReason::BotAuthor));
        }
        if msg.guild_id.as_deref() != Some(self.guild_id.as_str()) {
            return Ok(Outcome::Ignored(IgnoreReason::OtherGuild));
        }

        let Some(thread) = directory
            .lookup(&msg.channel_id)
            .await
            .context("Failed to look up message channel")?
        else {
            return Ok(Outcome::Ignored(IgnoreReason::UnknownChannel));
        };
        if !thread.is_thread {
            return Ok(Outcome::Ignored(IgnoreReason::NotThread));
        }
        if !self.is_game_day_thread(directory, thread.parent_id.as_deref()).await? {
            return Ok(Outcome::Ignored(IgnoreReason::NotGameDay));
        }

        if msg.content.is_empty() {
            return Ok(Outcome::Ignored(IgnoreReason::EmptyContent));
        }

        // Any Foos marker adopts the whole thread
        self.store
            .mark_if_game_message(&self.classifier, &thread.id, &msg.content)?;
        if !self.store.is_foos_thread(&thread.id)? {
            return Ok(Outcome::Ignored(IgnoreReason::NotFoosThread));
        }

        let Some(kind) = self.classifier.classify_message(&msg.content) else {
            return Ok(Outcome::Ignored(IgnoreReason::Unclassified));
        };

        // Claim before posting: the watermark moves even if delivery fails, and
        // no lock is held while the webhook call is in flight
        if !self.store.claim_forward(&thread.id, &msg.message_id)? {
            tracing::debug!(
                thread_id = %thread.id,
                message_id = %msg.message_id,
                "Skipping message at or below forward watermark"
            );
            return Ok(Outcome::Ignored(IgnoreReason::AlreadyForwarded));
        }

        let body = format_forward(kind, &thread.name, &msg.jump_url, &msg.content);
        if let Err(e) = self.forwarder.post(&body).await {
            tracing::error!(
                error = %e,
                thread_id = %thread.id,
                message_id = %msg.message_id,
                "Webhook delivery failed"
            );
        }

        tracing::info!(
            kind = %kind,
            thread_id = %thread.id,
            thread_name = %thread.name,
            message_id = %msg.message_id,
            "Forwarded message"
        );

        Ok(Outcome::Forwarded(kind))
    }

    /// A thread is game-day when its parent channel sits in the configured category
    async fn is_game_day_thread(
        &self,
        directory: &dyn ChannelDirectory,
        parent_id: Option<&str>,
    ) -> Result<bool> {
        let Some(parent_id) = parent_id else {
            return Ok(false);
        };
        let parent = directory
            .lookup(parent_id)
            .await
            .context("Failed to look up thread parent channel")?;
        Ok(parent
            .and_then(|p| p.parent_id)
            .is_some_and(|category| category == self.game_day_category_id))
    }
}
