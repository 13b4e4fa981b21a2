//! Service layer
//!
//! - [`ChannelService`] - method channel lifecycle

pub mod channel_service;

pub use channel_service::ChannelService;
