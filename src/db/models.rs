use sqlx::FromRow;

/// One observed league-points reading. Append-only; "latest" is always the
/// most recent timestamp for a queue type, ties broken by rowid.
#[derive(Debug, Clone, FromRow)]
pub struct RankSample {
    pub id: i64,
    pub match_id: Option<String>,
    pub queue_type: String,
    pub tier: String,
    pub division: String,
    pub lp: i32,
    pub timestamp: i64,
}

/// Cached identity of the tracked subject.
#[derive(Debug, Clone, FromRow)]
pub struct CachedSummoner {
    pub puuid: String,
    pub summoner_id: String,
    pub game_name: String,
    pub tag_line: String,
    /// Raw profile payload as returned by the API.
    pub data: String,
    pub last_updated: i64,
}
