// ABOUTME: Discord gateway adapter built on serenity
// ABOUTME: Converts message events for the relay and resolves thread/channel metadata via cache or HTTP

use anyhow::{Context as _, Result};
use serenity::all::{
    Channel, ChannelId, ChannelType, Client, Context, EventHandler, GatewayIntents, GuildChannel,
    GuildId, Message, Ready,
};
use std::collections::HashMap;
use std::sync::Arc;

use foos_core::{
    relay::Relay,
    traits::{ChannelDirectory, ChannelInfo, IncomingMessage},
};

/// Gateway intents the relay needs. MESSAGE_CONTENT must also be enabled
/// for the bot in the developer portal.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
}

/// Connect to the gateway and relay messages until the connection ends
pub async fn run(token: &str, relay: Arc<Relay>) -> Result<()> {
    let mut client = Client::builder(token, intents())
        .event_handler(Handler::new(relay))
        .await
        .context("Failed to create Discord client")?;

    tracing::info!("Connecting to Discord gateway");
    client
        .start()
        .await
        .context("Discord gateway connection failed")?;
    Ok(())
}

pub fn is_thread_kind(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    )
}

fn guild_channel_info(gc: &GuildChannel) -> ChannelInfo {
    ChannelInfo {
        id: gc.id.to_string(),
        name: gc.name.clone(),
        is_thread: is_thread_kind(gc.kind),
        parent_id: gc.parent_id.map(|p| p.to_string()),
    }
}

fn channel_info(channel: &Channel) -> ChannelInfo {
    match channel {
        Channel::Guild(gc) => guild_channel_info(gc),
        other => ChannelInfo {
            id: other.id().to_string(),
            name: String::new(),
            is_thread: false,
            parent_id: None,
        },
    }
}

/// Strip a serenity message down to what the relay reads
pub fn incoming_from(msg: &Message) -> IncomingMessage {
    IncomingMessage {
        message_id: msg.id.to_string(),
        channel_id: msg.channel_id.to_string(),
        guild_id: msg.guild_id.map(|g| g.to_string()),
        author_is_bot: msg.author.bot,
        content: msg.content.clone(),
        jump_url: msg.link(),
    }
}

/// Find a channel in a cached guild: regular channels first, then active threads
fn find_cached<'a, T>(
    channels: &'a HashMap<ChannelId, T>,
    threads: &'a [T],
    id: ChannelId,
    id_of: impl Fn(&T) -> ChannelId,
) -> Option<&'a T> {
    channels
        .get(&id)
        .or_else(|| threads.iter().find(|t| id_of(t) == id))
}

/// Channel lookups through the serenity cache, falling back to HTTP
pub struct DiscordDirectory {
    ctx: Context,
    guild_id: Option<GuildId>,
}

impl DiscordDirectory {
    pub fn new(ctx: Context, guild_id: Option<GuildId>) -> Self {
        Self { ctx, guild_id }
    }

    /// Cache hit for `id`. The guild reference is released before returning.
    fn cached(&self, id: ChannelId) -> Option<ChannelInfo> {
        let guild = self.ctx.cache.guild(self.guild_id?)?;
        find_cached(&guild.channels, &guild.threads, id, |gc| gc.id).map(guild_channel_info)
    }
}

#[serenity::async_trait]
impl ChannelDirectory for DiscordDirectory {
    async fn lookup(&self, channel_id: &str) -> Result<Option<ChannelInfo>> {
        let id: u64 = channel_id
            .parse()
            .with_context(|| format!("Invalid Discord channel ID: {}", channel_id))?;
        if id == 0 {
            return Ok(None);
        }
        let id = ChannelId::new(id);

        if let Some(info) = self.cached(id) {
            return Ok(Some(info));
        }
        tracing::debug!(channel_id, "Channel not cached, fetching over HTTP");

        let channel = id
            .to_channel(&self.ctx)
            .await
            .with_context(|| format!("Failed to fetch Discord channel {}", channel_id))?;
        Ok(Some(channel_info(&channel)))
    }
}

/// serenity event handler feeding the relay
pub struct Handler {
    relay: Arc<Relay>,
}

impl Handler {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self { relay }
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!(user = %ready.user.name, user_id = %ready.user.id, "Logged in to Discord");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let incoming = incoming_from(&msg);
        let directory = DiscordDirectory::new(ctx, msg.guild_id);

        // Errors end here: one bad event must not take down the gateway loop
        match self.relay.handle_message(&directory, &incoming).await {
            Ok(outcome) => {
                tracing::debug!(
                    message_id = %incoming.message_id,
                    channel_id = %incoming.channel_id,
                    ?outcome,
                    "Message handled"
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %format!("{:#}", e),
                    message_id = %incoming.message_id,
                    channel_id = %incoming.channel_id,
                    "Handler error"
                );
            }
        }
    }
}
