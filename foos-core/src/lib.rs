// ABOUTME: Platform-agnostic core of the Foos relay
// ABOUTME: Classifier heuristics, forwarding state, formatting, and the message relay

pub mod classifier;
pub mod config;
pub mod format;
pub mod relay;
pub mod state;
pub mod traits;

pub use classifier::{Classifier, MessageKind};
pub use relay::{IgnoreReason, Outcome, Relay};
pub use state::{ForwardState, JsonFileSnapshot, SnapshotStore, StateStore};

// Re-export collaborator traits for convenient access
pub use traits::{ChannelDirectory, ChannelInfo, Forwarder, IncomingMessage};
