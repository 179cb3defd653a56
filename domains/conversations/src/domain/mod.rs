//! Domain model and orchestration for the Conversations domain

pub mod entities;
pub mod relay;
pub mod session;
