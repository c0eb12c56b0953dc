use super::queues::QueueKind;

/// What we believe about the subject's current match.
///
/// Pre-game snapshot fields only exist while a game is observed, so a stale
/// snapshot while idle is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InGame(ActiveGame),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveGame {
    pub game_id: i64,
    pub queue: QueueKind,
    /// LP snapshot captured at game start; `Some` only for ranked queues.
    pub pre_game_lp: Option<i32>,
}

impl SessionState {
    pub fn is_in_game(&self) -> bool {
        matches!(self, Self::InGame(_))
    }

    /// Flip back to idle, handing out whatever game was being observed.
    pub fn take_active(&mut self) -> Option<ActiveGame> {
        match std::mem::replace(self, Self::Idle) {
            Self::Idle => None,
            Self::InGame(active) => Some(active),
        }
    }
}
