//! Discord delivery: posts rendered alert messages to a single channel.

use async_trait::async_trait;
use serenity::all::{ChannelId, Http};
use tracing::debug;

use crate::alert::MessageSink;
use crate::error::AppError;

pub struct DiscordSink {
    http: Http,
    channel: ChannelId,
}

impl DiscordSink {
    pub fn new(token: &str, channel_id: u64) -> Self {
        Self {
            http: Http::new(token),
            channel: ChannelId::new(channel_id),
        }
    }
}

#[async_trait]
impl MessageSink for DiscordSink {
    async fn send(&self, text: &str) -> Result<(), AppError> {
        debug!(channel = %self.channel, "📨 Posting alert message");
        self.channel.say(&self.http, text).await?;
        Ok(())
    }
}
