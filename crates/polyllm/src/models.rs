//! These models represent the conversation passed between a caller and a provider.
//!
//! A conversation is built from backend-neutral [`message::HistoryMessage`]s plus
//! whatever replies the providers handed back. Replies stay in their backend's
//! own shape inside [`message::Message`]; every variant answers the same small
//! set of accessors so the outbound conversion never needs to know where a
//! message came from.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
