//! API handlers for the Conversations domain

pub mod conversations;
pub mod events;
pub mod messages;
