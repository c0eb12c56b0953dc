use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::Config;

use super::{
    LolApi,
    limiter::RateLimiter,
    region::{Platform, Region},
    types::{
        AccountDto, ApiError, ApiResult, CurrentGameInfo, LeagueEntryDto, MatchDto, SummonerDto,
    },
};

struct CacheEntry {
    stored_at: Instant,
    document: Value,
}

/// Rate-limited, caching, retrying client for the Riot API.
///
/// Expected 4xx statuses come back as [`ApiError::Status`]; 429 is honored
/// via `Retry-After` and retried indefinitely; 5xx and network failures are
/// retried with exponential backoff up to the configured attempt budget.
pub struct RiotClient {
    http: reqwest::Client,
    limiter: RateLimiter,
    cache: Mutex<HashMap<String, CacheEntry>>,
    /// Riot API Key
    key: String,
    platform: Platform,
    region: Region,
    retry_attempts: u32,
    cache_ttl: Duration,
}

impl RiotClient {
    pub fn new(
        key: String,
        platform: Platform,
        app_rate_limit: &str,
        retry_attempts: u32,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            limiter: RateLimiter::new(app_rate_limit),
            cache: Mutex::new(HashMap::new()),
            key,
            platform,
            region: platform.to_region(),
            retry_attempts,
            cache_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.riot_api_key.clone(),
            config.platform,
            &config.app_rate_limit,
            config.api_retry_attempts,
            config.api_cache_ttl,
        )
    }

    async fn cached(&self, url: &str) -> Option<Value> {
        let mut cache = self.cache.lock().await;
        match cache.get(url) {
            Some(entry) if entry.stored_at.elapsed() < self.cache_ttl => {
                debug!(url, "cache hit");
                Some(entry.document.clone())
            }
            Some(_) => {
                cache.remove(url);
                None
            }
            None => None,
        }
    }

    async fn store_cached(&self, url: String, document: Value) {
        self.cache.lock().await.insert(
            url,
            CacheEntry {
                stored_at: Instant::now(),
                document,
            },
        );
    }

    /// Shared request path: cache lookup, token acquisition, send, retries.
    ///
    /// `endpoint` is the logical method name the dynamic rate-limit buckets
    /// key on; the cache keys on the full URL including parameters.
    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: String,
        cache: bool,
        force_refresh: bool,
    ) -> ApiResult<T> {
        if cache && !force_refresh {
            if let Some(document) = self.cached(&url).await {
                return Ok(serde_json::from_value(document)?);
            }
        }

        // Explicit wait loop rather than recursing into the request: the
        // bucket refill schedule decides when we proceed.
        while !self.limiter.try_acquire(endpoint) {
            debug!(endpoint, "rate limit reached, waiting for token refill");
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        let mut attempt: u32 = 0;
        loop {
            let res = self
                .http
                .get(&url)
                .header("X-Riot-Token", &self.key)
                .send()
                .await;

            let res = match res {
                Ok(res) => res,
                Err(e) => {
                    if attempt < self.retry_attempts {
                        let wait = backoff_delay(attempt);
                        warn!(endpoint, error = %e, wait = wait.as_secs(), "request error, retrying");
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(ApiError::Network(e));
                }
            };

            if let Some(header) = res
                .headers()
                .get("X-Method-Rate-Limit")
                .and_then(|v| v.to_str().ok())
            {
                self.limiter.update_method_limits(endpoint, header);
            }

            let status = res.status();
            let retry_after = res
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());

            match next_action(status, retry_after, attempt, self.retry_attempts) {
                StatusAction::RetryAfter(wait) => {
                    warn!(endpoint, wait = wait.as_secs(), "rate limited by server");
                    tokio::time::sleep(wait).await;
                    // 429 is self-terminating, it does not consume the budget.
                }
                StatusAction::Backoff(wait) => {
                    warn!(
                        endpoint,
                        status = status.as_u16(),
                        wait = wait.as_secs(),
                        "server error, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                StatusAction::Fail { code, message } => {
                    return Err(ApiError::Status {
                        code,
                        message: message.into(),
                    });
                }
                StatusAction::Proceed => {
                    let document: Value = res.json().await?;
                    if cache {
                        self.store_cached(url, document.clone()).await;
                    }
                    return Ok(serde_json::from_value(document)?);
                }
            }
        }
    }
}

const MAX_BACKOFF_EXPONENT: u32 = 6;

/// What the request loop does with a response status, given how many
/// retries were already spent. Pure so the schedule can be asserted.
#[derive(Debug, PartialEq, Eq)]
enum StatusAction {
    /// Parse and return the body.
    Proceed,
    /// The server asked us to wait; does not consume the retry budget.
    RetryAfter(Duration),
    /// Transient server failure; wait and spend one attempt.
    Backoff(Duration),
    Fail { code: u16, message: &'static str },
}

fn next_action(
    status: StatusCode,
    retry_after_secs: Option<u64>,
    attempt: u32,
    retry_attempts: u32,
) -> StatusAction {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return StatusAction::RetryAfter(Duration::from_secs(retry_after_secs.unwrap_or(1)));
    }

    if status.is_server_error() {
        if attempt < retry_attempts {
            return StatusAction::Backoff(backoff_delay(attempt));
        }
        return StatusAction::Fail {
            code: status.as_u16(),
            message: "server error",
        };
    }

    if !status.is_success() {
        let message = match status.as_u16() {
            400 => "bad request - check endpoint and parameters",
            401 => "unauthorized - check if API key is valid",
            403 => "forbidden - check API key permissions",
            404 => "not found",
            _ => "request failed",
        };
        return StatusAction::Fail {
            code: status.as_u16(),
            message,
        };
    }

    StatusAction::Proceed
}

/// Exponential backoff with the exponent clamped, so an oversized retry
/// budget cannot overflow the doubling.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt.min(MAX_BACKOFF_EXPONENT)))
}

#[async_trait]
impl LolApi for RiotClient {
    // Account-V1 endpoint
    async fn get_account_by_riot_id(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> ApiResult<AccountDto> {
        tracing::trace!("[RIOT::CLIENT] get_account_by_riot_id {game_name}#{tag_line}");
        let url = format!(
            "{}/riot/account/v1/accounts/by-riot-id/{}/{}",
            self.region.base_url(),
            urlencoding::encode(game_name),
            urlencoding::encode(tag_line),
        );

        self.request("account/by-riot-id", url, true, false).await
    }

    // Summoner-V4 endpoint
    async fn get_summoner_by_puuid(&self, puuid: &str) -> ApiResult<SummonerDto> {
        tracing::trace!("[RIOT::CLIENT] get_summoner_by_puuid {puuid}");
        let url = format!(
            "{}/lol/summoner/v4/summoners/by-puuid/{}",
            self.platform.base_url(),
            puuid,
        );

        self.request("summoner/by-puuid", url, true, false).await
    }

    // Spectator-V5 endpoint. Never cached: the poll loop must observe
    // transitions as soon as the server does.
    async fn get_current_game(&self, puuid: &str) -> ApiResult<CurrentGameInfo> {
        tracing::trace!("[RIOT::CLIENT] get_current_game {puuid}");
        let url = format!(
            "{}/lol/spectator/v5/active-games/by-summoner/{}",
            self.platform.base_url(),
            puuid,
        );

        self.request("spectator/active-games", url, false, false)
            .await
    }

    // Match-V5 endpoints
    async fn get_last_match_id(&self, puuid: &str) -> ApiResult<Option<String>> {
        tracing::trace!("[RIOT::CLIENT] get_last_match_id {puuid}");
        let url = format!(
            "{}/lol/match/v5/matches/by-puuid/{}/ids?start=0&count=1",
            self.region.base_url(),
            puuid,
        );

        let ids: Vec<String> = self.request("match/ids", url, false, false).await?;
        Ok(ids.into_iter().next())
    }

    async fn get_match(&self, match_id: &str) -> ApiResult<MatchDto> {
        tracing::trace!("[RIOT::CLIENT] get_match {match_id}");
        let url = format!(
            "{}/lol/match/v5/matches/{}",
            self.region.base_url(),
            match_id,
        );

        self.request("match/by-id", url, true, false).await
    }

    // League-V4 endpoint
    async fn get_league_entries(
        &self,
        puuid: &str,
        force_refresh: bool,
    ) -> ApiResult<Vec<LeagueEntryDto>> {
        tracing::trace!("[RIOT::CLIENT] get_league_entries {puuid}");
        let url = format!(
            "{}/lol/league/v4/entries/by-puuid/{}",
            self.platform.base_url(),
            puuid,
        );

        self.request("league/entries", url, true, force_refresh)
            .await
    }
}
