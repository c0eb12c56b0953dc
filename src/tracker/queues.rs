use std::fmt;

/// Classification of a match's game mode.
///
/// This is the single source of truth for queue handling: the state machine
/// consults it at game start (whether to snapshot pre-game LP) and at game
/// end (whether to reconcile the LP change).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    SoloDuo,
    Flex,
    /// Tournament and custom lobbies; death counts are unreliable here.
    Tournament,
    Aram,
    /// Recognized non-ranked matchmade queues (normals, quickplay, ...).
    Other,
    /// Queue ids we have no mapping for.
    Unknown,
}

impl QueueKind {
    pub fn from_queue_id(queue_id: i64) -> Self {
        match queue_id {
            420 => Self::SoloDuo,
            440 => Self::Flex,
            0 | 700 | 720 => Self::Tournament,
            450 => Self::Aram,
            400 | 430 | 490 | 830 | 840 | 850 => Self::Other,
            _ => Self::Unknown,
        }
    }

    pub fn is_ranked(&self) -> bool {
        matches!(self, Self::SoloDuo | Self::Flex)
    }

    /// The queue-type string the League-v4 API (and our store) uses.
    pub fn ranked_queue_key(&self) -> Option<&'static str> {
        match self {
            Self::SoloDuo => Some("RANKED_SOLO_5x5"),
            Self::Flex => Some("RANKED_FLEX_SR"),
            _ => None,
        }
    }

    pub fn from_ranked_queue_key(key: &str) -> Option<Self> {
        match key {
            "RANKED_SOLO_5x5" => Some(Self::SoloDuo),
            "RANKED_FLEX_SR" => Some(Self::Flex),
            _ => None,
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SoloDuo => "Solo Queue",
            Self::Flex => "Flex",
            Self::Tournament => "Tournament",
            Self::Aram => "ARAM",
            Self::Other => "Normals",
            Self::Unknown => "Unknown Queue",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranked_queue_ids_classify() {
        assert_eq!(QueueKind::from_queue_id(420), QueueKind::SoloDuo);
        assert_eq!(QueueKind::from_queue_id(440), QueueKind::Flex);
        assert!(QueueKind::from_queue_id(420).is_ranked());
        assert!(QueueKind::from_queue_id(440).is_ranked());
    }

    #[test]
    fn non_ranked_queue_ids_classify() {
        assert_eq!(QueueKind::from_queue_id(450), QueueKind::Aram);
        assert_eq!(QueueKind::from_queue_id(0), QueueKind::Tournament);
        assert_eq!(QueueKind::from_queue_id(700), QueueKind::Tournament);
        assert_eq!(QueueKind::from_queue_id(400), QueueKind::Other);
        assert!(!QueueKind::from_queue_id(450).is_ranked());
    }

    #[test]
    fn unknown_queue_ids_map_to_unknown_not_error() {
        assert_eq!(QueueKind::from_queue_id(123_456), QueueKind::Unknown);
        assert_eq!(QueueKind::from_queue_id(-1), QueueKind::Unknown);
    }

    #[test]
    fn ranked_keys_round_trip() {
        assert_eq!(
            QueueKind::SoloDuo.ranked_queue_key(),
            Some("RANKED_SOLO_5x5")
        );
        assert_eq!(
            QueueKind::from_ranked_queue_key("RANKED_FLEX_SR"),
            Some(QueueKind::Flex)
        );
        assert_eq!(QueueKind::Aram.ranked_queue_key(), None);
        assert_eq!(QueueKind::from_ranked_queue_key("CHERRY"), None);
    }
}
