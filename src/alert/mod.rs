//! Turns tracker events into channel messages and pushes them to a sink.

use async_trait::async_trait;
use tracing::{debug, error};

use crate::config::MessageTemplates;
use crate::error::AppError;
use crate::tracker::outcome::GameResult;
use crate::tracker::queues::QueueKind;

/// Category icons prepended to every message.
mod icons {
    pub const MONITORING: &str = "👀";
    pub const WIN: &str = "🏆";
    pub const LOSS: &str = "😭";
    pub const DEATHS: &str = "💀";
    pub const LP_GAIN: &str = "📈";
    pub const LP_LOSS: &str = "📉";
}

/// Notification events produced by the polling state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    GameStarted,
    GameEnded {
        result: GameResult,
        deaths: Option<i64>,
        queue: QueueKind,
    },
    LpChanged {
        delta: i32,
        queue: QueueKind,
    },
}

/// Where rendered messages go. The Discord channel in production, a
/// collecting mock in tests.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), AppError>;
}

pub struct AlertFormatter {
    templates: MessageTemplates,
    display_name: String,
}

impl AlertFormatter {
    pub fn new(templates: MessageTemplates, display_name: String) -> Self {
        Self {
            templates,
            display_name,
        }
    }

    /// Messages for one event, in sending order. May be empty (unknown
    /// outcome, zero delta).
    pub fn render(&self, event: &TrackerEvent) -> Vec<String> {
        match event {
            TrackerEvent::GameStarted => {
                vec![format!(
                    "{} {}",
                    icons::MONITORING,
                    self.fill(&self.templates.game_start, None, None)
                )]
            }
            TrackerEvent::GameEnded {
                result,
                deaths,
                queue,
            } => self.render_game_ended(*result, *deaths, *queue),
            TrackerEvent::LpChanged { delta, queue } => self.render_lp_change(*delta, *queue),
        }
    }

    fn render_game_ended(
        &self,
        result: GameResult,
        deaths: Option<i64>,
        queue: QueueKind,
    ) -> Vec<String> {
        let mut messages = Vec::new();

        match result {
            GameResult::Won => messages.push(format!(
                "{} {}",
                icons::WIN,
                self.fill(&self.templates.game_win, None, None)
            )),
            GameResult::Lost => messages.push(format!(
                "{} {}",
                icons::LOSS,
                self.fill(&self.templates.game_loss, None, None)
            )),
            GameResult::Unknown => return messages,
        }

        if queue == QueueKind::Tournament {
            messages.push(format!(
                "{} Unable to display tournament death count...",
                icons::DEATHS
            ));
        } else if let Some(deaths) = deaths {
            let mut line = self.fill(&self.templates.death_count, Some(deaths), None);
            if !queue.is_ranked() {
                line.push_str(&format!(" in {queue}"));
            }
            messages.push(format!("{} {}", icons::DEATHS, line));
        }

        messages
    }

    fn render_lp_change(&self, delta: i32, queue: QueueKind) -> Vec<String> {
        if delta == 0 {
            return Vec::new();
        }

        let (icon, template) = if delta > 0 {
            (icons::LP_GAIN, &self.templates.lp_gain)
        } else {
            (icons::LP_LOSS, &self.templates.lp_loss)
        };
        vec![format!(
            "{} {}",
            icon,
            self.fill_with_queue(template, delta.abs(), queue)
        )]
    }

    fn fill(&self, template: &str, deaths: Option<i64>, lp_change: Option<i32>) -> String {
        let mut out = template.replace("{summoner_name}", &self.display_name);
        if let Some(deaths) = deaths {
            out = out.replace("{deaths}", &deaths.to_string());
        }
        if let Some(lp) = lp_change {
            out = out.replace("{lp_change}", &lp.to_string());
        }
        out
    }

    fn fill_with_queue(&self, template: &str, lp_change: i32, queue: QueueKind) -> String {
        self.fill(template, None, Some(lp_change))
            .replace("{queue_type}", &queue.to_string())
    }
}

/// Renders events and forwards them to the sink. Send failures are logged,
/// never escalated: a lost message must not wedge the polling loop.
pub struct AlertDispatcher<S: MessageSink> {
    sink: S,
    formatter: AlertFormatter,
}

impl<S: MessageSink> AlertDispatcher<S> {
    pub fn new(sink: S, formatter: AlertFormatter) -> Self {
        Self { sink, formatter }
    }

    pub async fn dispatch(&self, event: TrackerEvent) {
        debug!(?event, "✉️ dispatching alert");
        for message in self.formatter.render(&event) {
            if let Err(e) = self.sink.send(&message).await {
                error!(error = %e, "✉️ failed to send alert message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter() -> AlertFormatter {
        AlertFormatter::new(MessageTemplates::default(), "Stalked".into())
    }

    #[test]
    fn game_start_renders_with_monitoring_icon() {
        let messages = formatter().render(&TrackerEvent::GameStarted);
        assert_eq!(messages, vec!["👀 Stalked is in a game now! Monitoring..."]);
    }

    #[test]
    fn win_renders_result_and_death_lines() {
        let messages = formatter().render(&TrackerEvent::GameEnded {
            result: GameResult::Won,
            deaths: Some(2),
            queue: QueueKind::SoloDuo,
        });

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], "🏆 Stalked got carried!");
        assert_eq!(messages[1], "💀 Amount of times Stalked died: 2");
    }

    #[test]
    fn non_ranked_death_line_names_the_queue() {
        let messages = formatter().render(&TrackerEvent::GameEnded {
            result: GameResult::Lost,
            deaths: Some(11),
            queue: QueueKind::Aram,
        });

        assert_eq!(messages[0], "😭 Stalked threw the game!");
        assert_eq!(messages[1], "💀 Amount of times Stalked died: 11 in ARAM");
    }

    #[test]
    fn tournament_death_count_gets_unavailable_variant() {
        let messages = formatter().render(&TrackerEvent::GameEnded {
            result: GameResult::Won,
            deaths: None,
            queue: QueueKind::Tournament,
        });

        assert_eq!(messages[0], "🏆 Stalked got carried!");
        assert!(messages[1].contains("Unable to display tournament death count"));
    }

    #[test]
    fn unknown_outcome_renders_nothing() {
        let messages = formatter().render(&TrackerEvent::GameEnded {
            result: GameResult::Unknown,
            deaths: None,
            queue: QueueKind::SoloDuo,
        });
        assert!(messages.is_empty());
    }

    #[test]
    fn lp_changes_render_gain_loss_and_zero_silence() {
        let f = formatter();

        let gain = f.render(&TrackerEvent::LpChanged {
            delta: 15,
            queue: QueueKind::SoloDuo,
        });
        assert_eq!(gain, vec!["📈 Stalked gained 15 LP in Solo Queue!"]);

        let loss = f.render(&TrackerEvent::LpChanged {
            delta: -18,
            queue: QueueKind::Flex,
        });
        assert_eq!(loss, vec!["📉 Stalked lost 18 LP in Flex!"]);

        let silent = f.render(&TrackerEvent::LpChanged {
            delta: 0,
            queue: QueueKind::SoloDuo,
        });
        assert!(silent.is_empty());
    }
}
