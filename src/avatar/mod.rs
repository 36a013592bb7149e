//! Client for the avatar host's public WebSocket API.

pub mod client;
pub mod protocol;

pub use client::AvatarClient;
