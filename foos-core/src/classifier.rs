// ABOUTME: Heuristic text classification for Foos play-by-play messages
// ABOUTME: Detects game membership, message kind, and the swing number embedded in free text

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::TeamConfig;

/// Ump result block: Pitch, Swing and Diff lines in that order.
static RESULT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ms)^\s*Pitch:\s*[0-9]{1,4}\s*$.*?^\s*Swing:\s*[0-9]{1,4}\s*$.*?^\s*Diff:\s*[0-9]{1,4}\s*->\s*.+?\s*$",
    )
    .expect("result block pattern is valid")
});

static PITCHER_ANNOUNCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bOn the mound:").expect("pitcher pattern is valid"));

static UP_TO_BAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bis up to bat\b|\bwhen you swing\b|\btimer expires\b")
        .expect("at-bat pattern is valid")
});

static SWING_EXPLICIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bSwing\s*:\s*([0-9]{1,4})\b").expect("explicit swing pattern is valid")
});

static SWING_INLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:swing|swung)\s+([0-9]{1,4})\b").expect("inline swing pattern is valid")
});

static STANDALONE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([0-9]{1,4})\b").expect("number pattern is valid"));

/// Ump/crew role ping, e.g. `<@&123456>`
static ROLE_PING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<@&[0-9]+>").expect("role ping pattern is valid"));

static SCOREBOARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Z]{2,4}\s+[0-9]+\s*-\s*[A-Z]{2,4}\s+[0-9]+")
        .expect("scoreboard pattern is valid")
});

const MIN_SWING: u32 = 1;
const MAX_SWING: u32 = 1000;

// Lengths below are UTF-16 code units, the unit Discord clients count in.

/// Role-pinged swing posts shorter than this are treated as chatter.
const PINGED_SWING_MIN_LEN: usize = 25;
/// Bare swing posts like "482" must be at most this long.
const BARE_SWING_MAX_LEN: usize = 10;

/// Structural role of a message in the at-bat sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    UmpResult,
    PitcherWriteup,
    SwingWriteup,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UmpResult => "UMP_RESULT",
            Self::PitcherWriteup => "PITCHER_WRITEUP",
            Self::SwingWriteup => "SWING_WRITEUP",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier bound to one team's abbreviation and display name
#[derive(Debug, Clone)]
pub struct Classifier {
    team_abbr: String,
    team_name_text: String,
    /// `^\s*ABBR\s+<n>\b` anchored per line
    abbr_line: Regex,
}

impl Classifier {
    pub fn new(team: &TeamConfig) -> anyhow::Result<Self> {
        let pattern = format!(r"(?m)^\s*{}\s+[0-9]+\b", regex::escape(&team.abbr));
        let abbr_line = Regex::new(&pattern)
            .map_err(|e| anyhow::anyhow!("invalid team abbreviation {:?}: {}", team.abbr, e))?;

        Ok(Self {
            team_abbr: team.abbr.clone(),
            team_name_text: team.name_text.clone(),
            abbr_line,
        })
    }

    /// Whether the text carries a team marker that ties its thread to a Foos game.
    ///
    /// Best effort: any single marker is enough and nothing un-marks a thread.
    pub fn is_foos_game_message(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        if text.contains(&self.team_name_text) {
            return true;
        }
        if text.contains(&self.team_abbr) && SCOREBOARD.is_match(text) {
            return true;
        }
        self.abbr_line.is_match(text)
    }

    /// Classify a message, first matching rule wins.
    pub fn classify_message(&self, text: &str) -> Option<MessageKind> {
        classify_message(text)
    }
}

/// Classify message text into its at-bat role.
///
/// Priority order: result block, pitcher writeup, swing writeup.
pub fn classify_message(text: &str) -> Option<MessageKind> {
    if RESULT_BLOCK.is_match(text) {
        return Some(MessageKind::UmpResult);
    }
    if PITCHER_ANNOUNCE.is_match(text) && UP_TO_BAT.is_match(text) {
        return Some(MessageKind::PitcherWriteup);
    }

    let swing = extract_swing_from_text(text);
    let trimmed_len = utf16_len(text.trim());

    // Pinging the ump role counts even when the number is buried ("793 feet")
    if ROLE_PING.is_match(text) && swing.is_some() && trimmed_len >= PINGED_SWING_MIN_LEN {
        return Some(MessageKind::SwingWriteup);
    }
    if swing.is_some() && trimmed_len <= BARE_SWING_MAX_LEN {
        return Some(MessageKind::SwingWriteup);
    }

    None
}

/// Pull the swing number out of free text.
///
/// An explicit `Swing: n` or inline `swing n` / `swung n` label wins; an out of
/// range labelled number yields `None` rather than falling back. Without a
/// label the last standalone number in [1, 1000] is used.
pub fn extract_swing_from_text(text: &str) -> Option<u32> {
    if text.is_empty() {
        return None;
    }

    let labelled = SWING_EXPLICIT
        .captures(text)
        .or_else(|| SWING_INLINE.captures(text));

    if let Some(caps) = labelled {
        return caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|n| in_swing_range(*n));
    }

    STANDALONE_NUMBER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .filter(|n| in_swing_range(*n))
        .last()
}

/// Length in UTF-16 code units; characters outside the BMP count twice
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

fn in_swing_range(n: u32) -> bool {
    (MIN_SWING..=MAX_SWING).contains(&n)
}
