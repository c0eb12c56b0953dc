//! Polling state machine: watches the spectator endpoint, detects game
//! boundaries and reconciles outcomes and LP movement once a game ends.

pub mod outcome;
pub mod queues;
mod session;

use tokio::sync::{Mutex, watch};
use tokio::time::{self, Duration, sleep};
use tracing::{debug, error, info, warn};

use crate::alert::{AlertDispatcher, MessageSink, TrackerEvent};
use crate::db::Database;
use crate::error::AppError;
use crate::riot::{CurrentGameInfo, LolApi};

use outcome::GameResult;
use queues::QueueKind;
use session::{ActiveGame, SessionState};

/// How long a cached identity is trusted before it must be re-resolved.
const IDENTITY_MAX_AGE_HOURS: i64 = 24;

/// Every sleep the tracker takes, gathered so tests can drive the machine
/// under paused time.
#[derive(Debug, Clone)]
pub struct TrackerTiming {
    pub poll_interval: Duration,
    /// Schedule for rank sampling independent of game activity.
    pub rank_sample_interval: Duration,
    /// Wait after a game disappears from spectator before the match document
    /// is fetched. Match-v5 lags the live game by a handful of seconds.
    pub post_game_grace: Duration,
    pub identity_retry: Duration,
    pub auth_backoff: Duration,
    pub status_backoff: Duration,
}

impl Default for TrackerTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            rank_sample_interval: Duration::from_secs(3_600),
            post_game_grace: Duration::from_secs(30),
            identity_retry: Duration::from_secs(60),
            auth_backoff: Duration::from_secs(60),
            status_backoff: Duration::from_secs(30),
        }
    }
}

/// Resolved identifier of the tracked subject.
#[derive(Debug, Clone)]
struct Identity {
    puuid: String,
}

/// Mutable tracker state. The mutex guard spans a whole polling cycle, so
/// cycles never interleave.
struct Session {
    identity: Option<Identity>,
    state: SessionState,
}

pub struct SpectatorTracker<A: LolApi, S: MessageSink> {
    api: A,
    db: Database,
    alerts: AlertDispatcher<S>,
    game_name: String,
    tag_line: String,
    timing: TrackerTiming,
    session: Mutex<Session>,
}

impl<A: LolApi, S: MessageSink> SpectatorTracker<A, S> {
    pub fn new(
        api: A,
        db: Database,
        alerts: AlertDispatcher<S>,
        game_name: String,
        tag_line: String,
        timing: TrackerTiming,
    ) -> Self {
        Self {
            api,
            db,
            alerts,
            game_name,
            tag_line,
            timing,
            session: Mutex::new(Session {
                identity: None,
                state: SessionState::Idle,
            }),
        }
    }

    /// Poll until the shutdown channel fires. Cycle failures are logged and
    /// the loop carries on with the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval = ?self.timing.poll_interval,
            "🔎 Starting spectator polling for {}#{}", self.game_name, self.tag_line
        );

        let mut ticker = time::interval(self.timing.poll_interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let mut rank_ticker = time::interval(self.timing.rank_sample_interval);
        rank_ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!(error = %e, "🔎 polling cycle failed");
                    }
                }
                _ = rank_ticker.tick() => {
                    if let Err(e) = self.sample_ranks().await {
                        error!(error = %e, "📊 scheduled rank sampling failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("🔎 Shutdown requested, stopping spectator polling");
                    break;
                }
            }
        }
    }

    /// Scheduled rank sampling, independent of game activity. The store's
    /// dedup invariant keeps unchanged readings from piling up.
    async fn sample_ranks(&self) -> Result<(), AppError> {
        let mut session = self.session.lock().await;
        let identity = self.ensure_identity(&mut session).await?;

        let entries = self.api.get_league_entries(&identity.puuid, false).await?;
        for entry in &entries {
            if QueueKind::from_ranked_queue_key(&entry.queue_type).is_none() {
                continue;
            }
            self.db
                .store_rank_sample(
                    None,
                    &entry.queue_type,
                    &entry.tier,
                    &entry.rank,
                    entry.league_points,
                )
                .await?;
        }
        Ok(())
    }

    async fn run_cycle(&self) -> Result<(), AppError> {
        let mut session = self.session.lock().await;

        let identity = match self.ensure_identity(&mut session).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "could not resolve subject identity, will retry");
                sleep(self.timing.identity_retry).await;
                return Ok(());
            }
        };

        match self.api.get_current_game(&identity.puuid).await {
            Ok(game) => {
                if session.state.is_in_game() {
                    debug!(game_id = game.game_id, "subject still in game");
                } else {
                    self.handle_game_start(&mut session, &identity, game).await;
                }
            }
            Err(e) if e.is_not_found() => {
                // Idle and not in game is the quiet steady state. A previously
                // observed game means it just ended: flip to idle before any
                // resolution work so a failure here cannot wedge the session.
                if let Some(active) = session.state.take_active() {
                    self.reconcile(&identity, active).await?;
                }
            }
            Err(e) if e.is_unauthorized() => {
                error!("riot api key was rejected, backing off");
                sleep(self.timing.auth_backoff).await;
            }
            Err(e) => {
                warn!(error = %e, "spectator poll failed");
                sleep(self.timing.status_backoff).await;
            }
        }

        Ok(())
    }

    /// Subject identity, from the session, then the database cache, then the
    /// account and summoner endpoints.
    async fn ensure_identity(&self, session: &mut Session) -> Result<Identity, AppError> {
        if let Some(identity) = &session.identity {
            return Ok(identity.clone());
        }

        if let Some(cached) = self
            .db
            .cached_summoner_by_name(&self.game_name, IDENTITY_MAX_AGE_HOURS)
            .await?
        {
            debug!("subject identity restored from cache");
            let identity = Identity {
                puuid: cached.puuid,
            };
            session.identity = Some(identity.clone());
            return Ok(identity);
        }

        info!("🔑 Resolving identity of {}#{}", self.game_name, self.tag_line);
        let account = self
            .api
            .get_account_by_riot_id(&self.game_name, &self.tag_line)
            .await?;
        let summoner = self.api.get_summoner_by_puuid(&account.puuid).await?;

        self.db
            .upsert_summoner(
                &account.puuid,
                &summoner.id,
                account.game_name.as_deref().unwrap_or(&self.game_name),
                account.tag_line.as_deref().unwrap_or(&self.tag_line),
                &serde_json::json!({ "profileIconId": summoner.profile_icon_id }),
            )
            .await?;

        let identity = Identity {
            puuid: account.puuid,
        };
        session.identity = Some(identity.clone());
        Ok(identity)
    }

    async fn handle_game_start(
        &self,
        session: &mut Session,
        identity: &Identity,
        game: CurrentGameInfo,
    ) {
        let queue = game
            .game_queue_config_id
            .map(QueueKind::from_queue_id)
            .unwrap_or(QueueKind::Unknown);

        // A failed snapshot downgrades the LP delta to the history fallback,
        // it never blocks tracking the game.
        let pre_game_lp = match queue.ranked_queue_key() {
            Some(key) => match self.snapshot_lp(identity, key).await {
                Ok(lp) => lp,
                Err(e) => {
                    warn!(error = %e, "could not snapshot pre-game LP");
                    None
                }
            },
            None => None,
        };

        info!(game_id = game.game_id, %queue, "🎮 Game detected");
        session.state = SessionState::InGame(ActiveGame {
            game_id: game.game_id,
            queue,
            pre_game_lp,
        });

        self.alerts.dispatch(TrackerEvent::GameStarted).await;
    }

    /// Pre-game LP for a ranked queue: last stored sample, or a live
    /// league-v4 read when the store has never seen this queue.
    async fn snapshot_lp(
        &self,
        identity: &Identity,
        queue_key: &'static str,
    ) -> Result<Option<i32>, AppError> {
        if let Some(sample) = self.db.latest_rank(queue_key).await? {
            return Ok(Some(sample.lp));
        }

        let entries = self.api.get_league_entries(&identity.puuid, true).await?;
        Ok(entries
            .iter()
            .find(|e| e.queue_type == queue_key)
            .map(|e| e.league_points))
    }

    /// The observed game vanished from spectator: resolve what happened.
    /// The session is already idle when this runs.
    async fn reconcile(&self, identity: &Identity, active: ActiveGame) -> Result<(), AppError> {
        info!(game_id = active.game_id, "🏁 Game over, resolving outcome");
        sleep(self.timing.post_game_grace).await;

        let Some(match_id) = self.api.get_last_match_id(&identity.puuid).await? else {
            warn!("no recent match found after game end");
            return Ok(());
        };
        let match_data = self.api.get_match(&match_id).await?;
        let outcome = outcome::resolve_match_outcome(&match_data, &identity.puuid);

        // The match document's queue id is authoritative over what spectator
        // reported at game start.
        let queue = outcome.queue;

        if outcome.result == GameResult::Unknown {
            warn!(%match_id, "subject missing from match document, staying quiet");
        } else {
            self.alerts
                .dispatch(TrackerEvent::GameEnded {
                    result: outcome.result,
                    deaths: outcome.deaths,
                    queue,
                })
                .await;
        }

        if !queue.is_ranked() {
            return Ok(());
        }

        let entries = match self.api.get_league_entries(&identity.puuid, true).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "could not refresh league entries after game");
                return Ok(());
            }
        };

        let mut post_game_lp = None;
        for entry in &entries {
            let Some(entry_queue) = QueueKind::from_ranked_queue_key(&entry.queue_type) else {
                continue;
            };

            // The match id is attached only to the queue that was played.
            let played = entry_queue == queue;
            if played {
                post_game_lp = Some(entry.league_points);
            }

            if let Err(e) = self
                .db
                .store_rank_sample(
                    played.then_some(match_id.as_str()),
                    &entry.queue_type,
                    &entry.tier,
                    &entry.rank,
                    entry.league_points,
                )
                .await
            {
                warn!(queue_type = %entry.queue_type, error = %e, "failed to store rank sample");
            }
        }

        match outcome::lp_delta(&self.db, queue, active.pre_game_lp, post_game_lp).await? {
            Some(0) => debug!("LP unchanged, staying quiet"),
            Some(delta) => {
                self.alerts
                    .dispatch(TrackerEvent::LpChanged { delta, queue })
                    .await;
            }
            None => debug!("not enough data to compute an LP delta"),
        }

        Ok(())
    }
}
