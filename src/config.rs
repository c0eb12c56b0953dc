use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::riot::Platform;

/// Message templates for every notification the tracker can emit.
///
/// Placeholders: `{summoner_name}`, `{deaths}`, `{lp_change}`, `{queue_type}`.
#[derive(Debug, Clone)]
pub struct MessageTemplates {
    pub game_start: String,
    pub game_win: String,
    pub game_loss: String,
    pub death_count: String,
    pub lp_gain: String,
    pub lp_loss: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            game_start: "{summoner_name} is in a game now! Monitoring...".into(),
            game_win: "{summoner_name} got carried!".into(),
            game_loss: "{summoner_name} threw the game!".into(),
            death_count: "Amount of times {summoner_name} died: {deaths}".into(),
            lp_gain: "{summoner_name} gained {lp_change} LP in {queue_type}!".into(),
            lp_loss: "{summoner_name} lost {lp_change} LP in {queue_type}!".into(),
        }
    }
}

impl MessageTemplates {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            game_start: env::var("MSG_GAME_START").unwrap_or(defaults.game_start),
            game_win: env::var("MSG_GAME_WIN").unwrap_or(defaults.game_win),
            game_loss: env::var("MSG_GAME_LOSS").unwrap_or(defaults.game_loss),
            death_count: env::var("MSG_DEATH_COUNT").unwrap_or(defaults.death_count),
            lp_gain: env::var("MSG_LP_GAIN").unwrap_or(defaults.lp_gain),
            lp_loss: env::var("MSG_LP_LOSS").unwrap_or(defaults.lp_loss),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub alert_channel_id: u64,
    pub riot_api_key: String,
    /// Riot ID of the tracked subject, `game_name` + `tag_line`.
    pub game_name: String,
    pub tag_line: String,
    /// Optional display name override used in messages.
    pub nickname: Option<String>,
    pub platform: Platform,
    pub database_url: String,
    pub max_db_connections: u32,
    pub poll_interval: Duration,
    /// How often league entries are sampled outside of games.
    pub rank_sample_interval: Duration,
    /// Static application-wide quota, `count:window[,count:window...]`.
    pub app_rate_limit: String,
    pub api_retry_attempts: u32,
    pub api_cache_ttl: Duration,
    pub messages: MessageTemplates,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
        const DEFAULT_RANK_SAMPLE_INTERVAL_SECS: u64 = 3_600;
        const DEFAULT_APP_RATE_LIMIT: &str = "20:1,100:120";
        const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
        const DEFAULT_CACHE_TTL_SECS: u64 = 60;
        const DEFAULT_MAX_DB_CONNECTIONS: u32 = 5;

        let discord_token = env::var("DISCORD_TOKEN")
            .map_err(|_| AppError::Config("DISCORD_TOKEN must be set".into()))?;

        let alert_channel_id = env::var("ALERT_CHANNEL_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| AppError::Config("ALERT_CHANNEL_ID must be a channel id".into()))?;

        let riot_api_key = env::var("RIOT_API_KEY")
            .map_err(|_| AppError::Config("RIOT_API_KEY must be set".into()))?;

        let game_name = env::var("RIOT_GAME_NAME")
            .map_err(|_| AppError::Config("RIOT_GAME_NAME must be set".into()))?;

        let tag_line = env::var("RIOT_TAG_LINE")
            .map_err(|_| AppError::Config("RIOT_TAG_LINE must be set".into()))?;

        let nickname = env::var("NICKNAME").ok().filter(|n| !n.is_empty());

        let platform = env::var("RIOT_PLATFORM")
            .unwrap_or_else(|_| "EUW1".into())
            .parse()?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:sourcestalker.db".into());

        let max_db_connections = env::var("MAX_DB_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_DB_CONNECTIONS);

        let poll_interval_secs = env::var("POLL_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let rank_sample_interval_secs = env::var("RANK_SAMPLE_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RANK_SAMPLE_INTERVAL_SECS);

        let app_rate_limit =
            env::var("APP_RATE_LIMIT").unwrap_or_else(|_| DEFAULT_APP_RATE_LIMIT.into());

        let api_retry_attempts = env::var("API_RETRY_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RETRY_ATTEMPTS);

        let api_cache_ttl_secs = env::var("API_CACHE_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);

        Ok(Self {
            discord_token,
            alert_channel_id,
            riot_api_key,
            game_name,
            tag_line,
            nickname,
            platform,
            database_url,
            max_db_connections,
            poll_interval: Duration::from_secs(poll_interval_secs),
            rank_sample_interval: Duration::from_secs(rank_sample_interval_secs),
            app_rate_limit,
            api_retry_attempts,
            api_cache_ttl: Duration::from_secs(api_cache_ttl_secs),
            messages: MessageTemplates::from_env(),
        })
    }

    /// Name used in outgoing messages: the nickname when set, else the Riot ID game name.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.game_name)
    }
}
