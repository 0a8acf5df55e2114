// ABOUTME: Root library module exposing the Discord adapter and webhook forwarder
// ABOUTME: Re-exports the platform-agnostic relay core from foos-core

// Platform-specific modules
pub mod discord;
pub mod webhook;

// Re-export platform-agnostic modules from foos-core
pub use foos_core::classifier;
pub use foos_core::config;
pub use foos_core::format;
pub use foos_core::relay;
pub use foos_core::state;
pub use foos_core::traits;
