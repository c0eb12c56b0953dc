//! Pure match-outcome and LP-delta resolution.

use tracing::debug;

use crate::db::Database;
use crate::error::AppError;
use crate::riot::MatchDto;

use super::queues::QueueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Won,
    Lost,
    /// The subject was absent from the match document (remake, API lag).
    Unknown,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchOutcome {
    pub result: GameResult,
    pub deaths: Option<i64>,
    pub queue: QueueKind,
}

/// Locate the subject among the participants and classify the result.
///
/// A missing subject is an expected edge case and resolves to `Unknown`
/// rather than an error. Death counts are withheld for tournament queues.
pub fn resolve_match_outcome(match_data: &MatchDto, puuid: &str) -> MatchOutcome {
    let queue = QueueKind::from_queue_id(match_data.info.queue_id);

    let Some(participant) = match_data
        .info
        .participants
        .iter()
        .find(|p| p.puuid == puuid)
    else {
        debug!(
            match_id = %match_data.metadata.match_id,
            "subject not found in match participants"
        );
        return MatchOutcome {
            result: GameResult::Unknown,
            deaths: None,
            queue,
        };
    };

    let deaths = match queue {
        QueueKind::Tournament => None,
        _ => Some(participant.deaths),
    };

    MatchOutcome {
        result: if participant.win {
            GameResult::Won
        } else {
            GameResult::Lost
        },
        deaths,
        queue,
    }
}

/// LP delta for a finished ranked game, tried in fixed priority order:
/// direct pre/post snapshot difference first, then the difference of the two
/// most recent stored samples inside a trailing one-day window. `None` when
/// neither strategy yields two comparable points.
pub async fn lp_delta(
    db: &Database,
    queue: QueueKind,
    pre_game_lp: Option<i32>,
    post_game_lp: Option<i32>,
) -> Result<Option<i32>, AppError> {
    if let (Some(pre), Some(post)) = (pre_game_lp, post_game_lp) {
        return Ok(Some(post - pre));
    }

    let Some(key) = queue.ranked_queue_key() else {
        return Ok(None);
    };

    let history = db.rank_history(Some(key), 1).await?;
    if history.len() < 2 {
        return Ok(None);
    }

    let latest = &history[history.len() - 1];
    let previous = &history[history.len() - 2];
    Ok(Some(latest.lp - previous.lp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riot::types::{MatchInfoDto, MatchMetadataDto, ParticipantDto};

    fn match_doc(queue_id: i64, participants: Vec<ParticipantDto>) -> MatchDto {
        MatchDto {
            metadata: MatchMetadataDto {
                match_id: "EUW1_42".into(),
            },
            info: MatchInfoDto {
                queue_id,
                participants,
            },
        }
    }

    fn participant(puuid: &str, win: bool, deaths: i64) -> ParticipantDto {
        ParticipantDto {
            puuid: puuid.into(),
            deaths,
            win,
        }
    }

    #[test]
    fn subject_win_and_deaths_are_resolved() {
        let doc = match_doc(420, vec![participant("me", true, 3)]);
        let outcome = resolve_match_outcome(&doc, "me");

        assert_eq!(outcome.result, GameResult::Won);
        assert_eq!(outcome.deaths, Some(3));
        assert_eq!(outcome.queue, QueueKind::SoloDuo);
    }

    #[test]
    fn missing_subject_resolves_to_unknown() {
        let doc = match_doc(420, vec![participant("someone-else", true, 0)]);
        let outcome = resolve_match_outcome(&doc, "me");

        assert_eq!(outcome.result, GameResult::Unknown);
        assert_eq!(outcome.deaths, None);
    }

    #[test]
    fn tournament_death_count_is_withheld() {
        let doc = match_doc(700, vec![participant("me", false, 7)]);
        let outcome = resolve_match_outcome(&doc, "me");

        assert_eq!(outcome.result, GameResult::Lost);
        assert_eq!(outcome.deaths, None);
        assert_eq!(outcome.queue, QueueKind::Tournament);
    }

    #[tokio::test]
    async fn snapshot_difference_takes_priority() {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        // History that would disagree with the snapshots.
        db.store_rank_sample(None, "RANKED_SOLO_5x5", "GOLD", "II", 10)
            .await
            .unwrap();
        db.store_rank_sample(None, "RANKED_SOLO_5x5", "GOLD", "II", 90)
            .await
            .unwrap();

        let delta = lp_delta(&db, QueueKind::SoloDuo, Some(40), Some(55))
            .await
            .unwrap();
        assert_eq!(delta, Some(15));
    }

    #[tokio::test]
    async fn history_fallback_uses_two_most_recent_samples() {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        db.store_rank_sample(None, "RANKED_SOLO_5x5", "GOLD", "II", 40)
            .await
            .unwrap();
        db.store_rank_sample(Some("EUW1_9"), "RANKED_SOLO_5x5", "GOLD", "II", 22)
            .await
            .unwrap();

        let delta = lp_delta(&db, QueueKind::SoloDuo, None, Some(22))
            .await
            .unwrap();
        assert_eq!(delta, Some(-18));
    }

    #[tokio::test]
    async fn no_comparable_points_yields_none() {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        db.store_rank_sample(None, "RANKED_SOLO_5x5", "GOLD", "II", 40)
            .await
            .unwrap();

        let delta = lp_delta(&db, QueueKind::SoloDuo, None, None).await.unwrap();
        assert_eq!(delta, None);

        let delta = lp_delta(&db, QueueKind::Aram, None, None).await.unwrap();
        assert_eq!(delta, None);
    }
}
