//! Rate-limited Riot API client and the trait seam the tracker polls through.

use async_trait::async_trait;

pub mod client;
pub mod limiter;
pub mod region;
pub mod types;

pub use client::RiotClient;
pub use region::{Platform, Region};
pub use types::{
    AccountDto, ApiError, ApiResult, CurrentGameInfo, LeagueEntryDto, MatchDto, SummonerDto,
};

/// Every Riot endpoint the tracker consumes.
///
/// The tracker is generic over this trait so its state transitions can be
/// exercised against a scripted mock instead of live servers.
#[async_trait]
pub trait LolApi: Send + Sync {
    async fn get_account_by_riot_id(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> ApiResult<AccountDto>;

    async fn get_summoner_by_puuid(&self, puuid: &str) -> ApiResult<SummonerDto>;

    async fn get_current_game(&self, puuid: &str) -> ApiResult<CurrentGameInfo>;

    async fn get_last_match_id(&self, puuid: &str) -> ApiResult<Option<String>>;

    async fn get_match(&self, match_id: &str) -> ApiResult<MatchDto>;

    async fn get_league_entries(
        &self,
        puuid: &str,
        force_refresh: bool,
    ) -> ApiResult<Vec<LeagueEntryDto>>;
}
