// ABOUTME: Scenario tests for the relay pipeline with in-memory collaborators
// ABOUTME: Covers thread filtering, membership adoption, classification, dedup, and delivery failures

use anyhow::Result;
use async_trait::async_trait;
use foos_core::config::Config;
use foos_core::{
    ChannelDirectory, ChannelInfo, Forwarder, IgnoreReason, IncomingMessage, JsonFileSnapshot,
    MessageKind, Outcome, Relay, StateStore,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const GUILD: &str = "100";
const CATEGORY: &str = "200";
const GAME_CHANNEL: &str = "300";
const THREAD: &str = "400";

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct FakeDirectory {
    channels: HashMap<String, ChannelInfo>,
}

impl FakeDirectory {
    fn with(mut self, id: &str, name: &str, is_thread: bool, parent: Option<&str>) -> Self {
        self.channels.insert(
            id.to_string(),
            ChannelInfo {
                id: id.to_string(),
                name: name.to_string(),
                is_thread,
                parent_id: parent.map(String::from),
            },
        );
        self
    }

    /// Game-day channel in the configured category with one game thread
    fn game_day() -> Self {
        Self::default()
            .with(GAME_CHANNEL, "game-day", false, Some(CATEGORY))
            .with(THREAD, "LAF @ BOS, Game 3", true, Some(GAME_CHANNEL))
    }
}

#[async_trait]
impl ChannelDirectory for FakeDirectory {
    async fn lookup(&self, channel_id: &str) -> Result<Option<ChannelInfo>> {
        Ok(self.channels.get(channel_id).cloned())
    }
}

struct BrokenDirectory;

#[async_trait]
impl ChannelDirectory for BrokenDirectory {
    async fn lookup(&self, _channel_id: &str) -> Result<Option<ChannelInfo>> {
        anyhow::bail!("gateway unavailable")
    }
}

#[derive(Default)]
struct RecordingForwarder {
    posts: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingForwarder {
    fn failing() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn posts(&self) -> Vec<String> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn post(&self, content: &str) -> Result<()> {
        self.posts.lock().unwrap().push(content.to_string());
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn test_config() -> Config {
    let mut config = Config::default();
    config.discord.token = "token".to_string();
    config.discord.guild_id = GUILD.to_string();
    config.discord.game_day_category_id = CATEGORY.to_string();
    config.webhook.url = "http://localhost/hook".to_string();
    config
}

struct Harness {
    _temp_dir: TempDir,
    state_path: std::path::PathBuf,
    relay: Relay,
    forwarder: Arc<RecordingForwarder>,
}

impl Harness {
    fn new() -> Self {
        Self::with_forwarder(RecordingForwarder::default())
    }

    fn with_forwarder(forwarder: RecordingForwarder) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state_path = temp_dir.path().join("forward_state.json");
        let forwarder = Arc::new(forwarder);
        let store = StateStore::open(JsonFileSnapshot::new(&state_path));
        let relay = Relay::new(&test_config(), store, forwarder.clone()).unwrap();
        Self {
            _temp_dir: temp_dir,
            state_path,
            relay,
            forwarder,
        }
    }

    /// Fresh relay over the same state file, as after a process restart
    fn restart(&mut self) {
        let store = StateStore::open(JsonFileSnapshot::new(&self.state_path));
        self.relay = Relay::new(&test_config(), store, self.forwarder.clone()).unwrap();
    }
}

fn message(id: &str, content: &str) -> IncomingMessage {
    IncomingMessage {
        message_id: id.to_string(),
        channel_id: THREAD.to_string(),
        guild_id: Some(GUILD.to_string()),
        author_is_bot: false,
        content: content.to_string(),
        jump_url: format!("https://discord.com/channels/{}/{}/{}", GUILD, THREAD, id),
    }
}

async fn adopt_thread(h: &Harness, dir: &FakeDirectory) {
    let outcome = h
        .relay
        .handle_message(dir, &message("1000", "Tonight: @Los Angeles Foos vs @Boston Beans"))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Ignored(IgnoreReason::Unclassified));
    assert!(h.relay.store().is_foos_thread(THREAD).unwrap());
}

// =============================================================================
// SCENARIO: Pitcher writeup in a tracked thread is forwarded
// =============================================================================
#[tokio::test]
async fn scenario_pitcher_writeup_forwarded() {
    let h = Harness::new();
    let dir = FakeDirectory::game_day();
    adopt_thread(&h, &dir).await;

    let msg = message("1180000000000000123", "On the mound: Smith\nBatter is up to bat");
    let outcome = h.relay.handle_message(&dir, &msg).await.unwrap();

    assert_eq!(outcome, Outcome::Forwarded(MessageKind::PitcherWriteup));
    let posts = h.forwarder.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].starts_with("🎯 **PITCH** (ump writeup) • **LAF @ BOS, Game 3** • [Jump]("));
    assert!(posts[0].contains(&msg.jump_url));
    assert!(posts[0].ends_with("```text\nOn the mound: Smith\nBatter is up to bat\n```"));
    assert_eq!(
        h.relay.store().watermark(THREAD).unwrap(),
        "1180000000000000123"
    );
}

// =============================================================================
// SCENARIO: Replayed event is forwarded exactly once
// =============================================================================
#[tokio::test]
async fn scenario_replayed_event_forwarded_once() {
    let h = Harness::new();
    let dir = FakeDirectory::game_day();
    adopt_thread(&h, &dir).await;

    let msg = message("1180000000000000500", "482");
    let first = h.relay.handle_message(&dir, &msg).await.unwrap();
    let second = h.relay.handle_message(&dir, &msg).await.unwrap();

    assert_eq!(first, Outcome::Forwarded(MessageKind::SwingWriteup));
    assert_eq!(second, Outcome::Ignored(IgnoreReason::AlreadyForwarded));
    assert_eq!(h.forwarder.posts().len(), 1);
}

// =============================================================================
// SCENARIO: Concurrent duplicate deliveries still forward once
// =============================================================================
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_concurrent_duplicates_forwarded_once() {
    let h = Arc::new(Harness::new());
    let dir = Arc::new(FakeDirectory::game_day());
    adopt_thread(&h, &dir).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let h = Arc::clone(&h);
        let dir = Arc::clone(&dir);
        handles.push(tokio::spawn(async move {
            let msg = message("1180000000000000777", "777");
            let outcome = h.relay.handle_message(dir.as_ref(), &msg).await.unwrap();
            outcome
        }));
    }

    let mut forwarded = 0;
    for handle in handles {
        if let Outcome::Forwarded(_) = handle.await.unwrap() {
            forwarded += 1;
        }
    }

    assert_eq!(forwarded, 1);
    assert_eq!(h.forwarder.posts().len(), 1);
}

// =============================================================================
// SCENARIO: Older message delivered late is not forwarded
// =============================================================================
#[tokio::test]
async fn scenario_out_of_order_message_rejected() {
    let h = Harness::new();
    let dir = FakeDirectory::game_day();
    adopt_thread(&h, &dir).await;

    h.relay
        .handle_message(&dir, &message("1180000000000000900", "901"))
        .await
        .unwrap();
    let late = h
        .relay
        .handle_message(&dir, &message("1180000000000000899", "899"))
        .await
        .unwrap();

    assert_eq!(late, Outcome::Ignored(IgnoreReason::AlreadyForwarded));
    assert_eq!(h.forwarder.posts().len(), 1);
}

// =============================================================================
// SCENARIO: Dedup survives a restart
// =============================================================================
#[tokio::test]
async fn scenario_restart_does_not_repost() {
    let mut h = Harness::new();
    let dir = FakeDirectory::game_day();
    adopt_thread(&h, &dir).await;

    let msg = message("1180000000000000600", "Pitch: 512\nSwing: 480\nDiff: 32 -> Single");
    assert_eq!(
        h.relay.handle_message(&dir, &msg).await.unwrap(),
        Outcome::Forwarded(MessageKind::UmpResult)
    );

    h.restart();

    assert!(h.relay.store().is_foos_thread(THREAD).unwrap());
    assert_eq!(
        h.relay.handle_message(&dir, &msg).await.unwrap(),
        Outcome::Ignored(IgnoreReason::AlreadyForwarded)
    );
    assert_eq!(h.forwarder.posts().len(), 1);
}

// =============================================================================
// SCENARIO: Untracked thread is ignored until a Foos marker shows up
// =============================================================================
#[tokio::test]
async fn scenario_untracked_thread_ignored() {
    let h = Harness::new();
    let dir = FakeDirectory::game_day();

    let outcome = h
        .relay
        .handle_message(&dir, &message("2000", "482"))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Ignored(IgnoreReason::NotFoosThread));
    assert!(h.forwarder.posts().is_empty());
    assert!(!h.state_path.exists(), "nothing to persist yet");
}

// =============================================================================
// SCENARIO: A marker message that also classifies is forwarded right away
// =============================================================================
#[tokio::test]
async fn scenario_marker_message_forwarded_immediately() {
    let h = Harness::new();
    let dir = FakeDirectory::game_day();

    let msg = message(
        "3000",
        "LAF 2 - BOS 1\nPitch: 100\nSwing: 150\nDiff: 50 -> Double",
    );
    let outcome = h.relay.handle_message(&dir, &msg).await.unwrap();

    assert_eq!(outcome, Outcome::Forwarded(MessageKind::UmpResult));
    assert!(h.forwarder.posts()[0].starts_with("🧾 **RESULT**"));
}

// =============================================================================
// SCENARIO: Filtering before any state is touched
// =============================================================================
#[tokio::test]
async fn scenario_bot_author_ignored() {
    let h = Harness::new();
    let mut msg = message("1", "@Los Angeles Foos 482");
    msg.author_is_bot = true;

    let outcome = h
        .relay
        .handle_message(&FakeDirectory::game_day(), &msg)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Ignored(IgnoreReason::BotAuthor));
    assert!(!h.relay.store().is_foos_thread(THREAD).unwrap());
}

#[tokio::test]
async fn scenario_other_guild_and_dm_ignored() {
    let h = Harness::new();
    let dir = FakeDirectory::game_day();

    let mut msg = message("1", "@Los Angeles Foos");
    msg.guild_id = Some("999".to_string());
    assert_eq!(
        h.relay.handle_message(&dir, &msg).await.unwrap(),
        Outcome::Ignored(IgnoreReason::OtherGuild)
    );

    msg.guild_id = None;
    assert_eq!(
        h.relay.handle_message(&dir, &msg).await.unwrap(),
        Outcome::Ignored(IgnoreReason::OtherGuild)
    );
}

#[tokio::test]
async fn scenario_non_thread_channel_ignored() {
    let h = Harness::new();
    let dir = FakeDirectory::game_day();
    let mut msg = message("1", "@Los Angeles Foos");
    msg.channel_id = GAME_CHANNEL.to_string();

    assert_eq!(
        h.relay.handle_message(&dir, &msg).await.unwrap(),
        Outcome::Ignored(IgnoreReason::NotThread)
    );
}

#[tokio::test]
async fn scenario_unknown_channel_ignored() {
    let h = Harness::new();
    let outcome = h
        .relay
        .handle_message(&FakeDirectory::default(), &message("1", "@Los Angeles Foos"))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Ignored(IgnoreReason::UnknownChannel));
}

#[tokio::test]
async fn scenario_thread_outside_game_day_category_ignored() {
    let h = Harness::new();
    let dir = FakeDirectory::default()
        .with(GAME_CHANNEL, "general", false, Some("999"))
        .with(THREAD, "chit chat", true, Some(GAME_CHANNEL));

    let outcome = h
        .relay
        .handle_message(&dir, &message("1", "@Los Angeles Foos"))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Ignored(IgnoreReason::NotGameDay));
    assert!(!h.relay.store().is_foos_thread(THREAD).unwrap());
}

#[tokio::test]
async fn scenario_orphan_thread_ignored() {
    let h = Harness::new();
    let dir = FakeDirectory::default().with(THREAD, "orphan", true, None);

    let outcome = h
        .relay
        .handle_message(&dir, &message("1", "@Los Angeles Foos"))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Ignored(IgnoreReason::NotGameDay));
}

#[tokio::test]
async fn scenario_empty_content_ignored() {
    let h = Harness::new();
    let outcome = h
        .relay
        .handle_message(&FakeDirectory::game_day(), &message("1", ""))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Ignored(IgnoreReason::EmptyContent));
}

// =============================================================================
// SCENARIO: Errors and delivery failures
// =============================================================================
#[tokio::test]
async fn scenario_lookup_failure_is_returned() {
    let h = Harness::new();
    let result = h
        .relay
        .handle_message(&BrokenDirectory, &message("1", "@Los Angeles Foos"))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn scenario_invalid_message_id_is_returned() {
    let h = Harness::new();
    let dir = FakeDirectory::game_day();
    adopt_thread(&h, &dir).await;

    let result = h.relay.handle_message(&dir, &message("not-a-number", "482")).await;
    assert!(result.is_err());
    assert!(h.forwarder.posts().is_empty());
}

#[tokio::test]
async fn scenario_delivery_failure_still_advances_watermark() {
    let h = Harness::with_forwarder(RecordingForwarder::failing());
    let dir = FakeDirectory::game_day();
    adopt_thread(&h, &dir).await;

    let msg = message("5000", "482");
    assert_eq!(
        h.relay.handle_message(&dir, &msg).await.unwrap(),
        Outcome::Forwarded(MessageKind::SwingWriteup)
    );
    assert_eq!(h.relay.store().watermark(THREAD).unwrap(), "5000");
    assert_eq!(
        h.relay.handle_message(&dir, &msg).await.unwrap(),
        Outcome::Ignored(IgnoreReason::AlreadyForwarded)
    );
    assert_eq!(h.forwarder.posts().len(), 1);
}

#[tokio::test]
async fn scenario_long_message_is_truncated() {
    let h = Harness::new();
    let dir = FakeDirectory::game_day();
    adopt_thread(&h, &dir).await;

    let content = format!("<@&123456> {} my swing is 640", "blah ".repeat(500));
    let outcome = h.relay.handle_message(&dir, &message("6000", &content)).await.unwrap();

    assert_eq!(outcome, Outcome::Forwarded(MessageKind::SwingWriteup));
    let post = &h.forwarder.posts()[0];
    assert!(post.ends_with("…\n```"));
    assert!(!post.contains("640"));
}

// =============================================================================
// SCENARIO: A webhook call that never returns does not stall other threads
// =============================================================================

/// Posts for one thread never complete; everything else is recorded
struct StallingForwarder {
    stall_on: &'static str,
    posts: Mutex<Vec<String>>,
}

#[async_trait]
impl Forwarder for StallingForwarder {
    async fn post(&self, content: &str) -> Result<()> {
        if content.contains(self.stall_on) {
            std::future::pending::<()>().await;
        }
        self.posts.lock().unwrap().push(content.to_string());
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_stalled_delivery_does_not_block_other_threads() {
    const OTHER_THREAD: &str = "401";

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = StateStore::open(JsonFileSnapshot::new(temp_dir.path().join("state.json")));
    let forwarder = Arc::new(StallingForwarder {
        stall_on: "LAF @ BOS",
        posts: Mutex::new(Vec::new()),
    });
    let relay = Arc::new(Relay::new(&test_config(), store, forwarder.clone()).unwrap());
    let dir = Arc::new(
        FakeDirectory::game_day().with(OTHER_THREAD, "LAF @ NYY, Game 1", true, Some(GAME_CHANNEL)),
    );
    relay.store().mark_foos_thread(THREAD).unwrap();
    relay.store().mark_foos_thread(OTHER_THREAD).unwrap();

    let stalled = {
        let relay = Arc::clone(&relay);
        let dir = Arc::clone(&dir);
        tokio::spawn(async move {
            let msg = message("7000", "482");
            let outcome = relay.handle_message(dir.as_ref(), &msg).await;
            outcome
        })
    };

    // Give the first handler time to reach its webhook call
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(relay.store().watermark(THREAD).unwrap(), "7000");

    let mut msg = message("7001", "511");
    msg.channel_id = OTHER_THREAD.to_string();
    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        relay.handle_message(dir.as_ref(), &msg),
    )
    .await
    .expect("second thread was blocked by the stalled delivery")
    .unwrap();

    assert_eq!(outcome, Outcome::Forwarded(MessageKind::SwingWriteup));
    let posts = forwarder.posts.lock().unwrap().clone();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].contains("LAF @ NYY, Game 1"));
    assert!(!stalled.is_finished());
    stalled.abort();
}
