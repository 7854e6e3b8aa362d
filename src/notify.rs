//! Rule-change notifications.
//!
//! The mode controller reports every mining pass through an injected
//! [`RuleNotifier`]. The engine does not know who listens; a host typically
//! forwards notices to an operator chat.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::rules::Rule;

const MEDALS: [&str; 3] = ["\u{1F947}", "\u{1F948}", "\u{1F949}"];

/// Outcome of a mining pass, as seen by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleNoticeKind {
    /// The rule set differs from the previous one.
    Changed {
        /// The new ranked rules.
        rules: Vec<Rule>,
    },
    /// Same triggers and predictions as before.
    Unchanged,
    /// Adaptive mode was forced on but nothing could be mined yet.
    AwaitingData,
    /// Not enough data; adaptive mode is off.
    Disabled,
}

/// A notification emitted after a mining pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleNotice {
    /// Operator the notice is addressed to, if one is registered.
    pub recipient: Option<i64>,
    /// What happened.
    pub kind: RuleNoticeKind,
}

impl RuleNotice {
    /// Human-readable summary.
    #[must_use]
    pub fn render(&self) -> String {
        match &self.kind {
            RuleNoticeKind::Changed { rules } => {
                let mut out = String::from("\u{1F504} Rule update (rules changed):");
                for (i, rule) in rules.iter().enumerate() {
                    let rank = MEDALS.get(i).map_or_else(|| format!("#{}", i + 1), |m| (*m).to_string());
                    let _ = write!(out, "\n{rank} {} \u{2192} {} (x{})", rule.trigger, rule.predicted, rule.count);
                }
                out
            }
            RuleNoticeKind::Unchanged => {
                "\u{2705} Rule check: no significant change, current rules remain valid.".to_string()
            }
            RuleNoticeKind::AwaitingData => {
                "\u{23F3} Rule check: adaptive mode is on but no rule could be mined yet; the static table answers meanwhile."
                    .to_string()
            }
            RuleNoticeKind::Disabled => {
                "\u{26A0}\u{FE0F} Rule check: history too thin or inconsistent, adaptive mode is off."
                    .to_string()
            }
        }
    }
}

/// Receives rule notices.
pub trait RuleNotifier: Send + Sync {
    /// Delivers a notice. Must not block the engine.
    fn notify(&self, notice: &RuleNotice);
}

/// Discards every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl RuleNotifier for NoopNotifier {
    fn notify(&self, _notice: &RuleNotice) {}
}

/// Adapts a closure into a notifier.
pub struct FnNotifier<F>(pub F);

impl<F> RuleNotifier for FnNotifier<F>
where
    F: Fn(&RuleNotice) + Send + Sync,
{
    fn notify(&self, notice: &RuleNotice) {
        (self.0)(notice);
    }
}

/// Queues notices on a bounded channel for a consumer thread.
///
/// Uses non-blocking `try_send`; notices that do not fit are counted and
/// dropped.
#[derive(Debug)]
pub struct ChannelNotifier {
    tx: Sender<RuleNotice>,
    dropped: AtomicU64,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiving end of its queue.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<RuleNotice>) {
        let (tx, rx) = bounded(capacity.max(1));
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Notices dropped because the queue was full or disconnected.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl RuleNotifier for ChannelNotifier {
    fn notify(&self, notice: &RuleNotice) {
        match self.tx.try_send(notice.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(recipient = ?notice.recipient, "rule notice dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::card::{Card, Rank, Suit};

    fn changed() -> RuleNotice {
        RuleNotice {
            recipient: Some(7),
            kind: RuleNoticeKind::Changed {
                rules: vec![
                    Rule { trigger: Card::new(Rank::Ten, Suit::Diamonds), predicted: Suit::Spades, count: 4 },
                    Rule { trigger: Card::new(Rank::Nine, Suit::Clubs), predicted: Suit::Hearts, count: 3 },
                ],
            },
        }
    }

    #[test]
    fn test_render_changed_lists_ranked_rules() {
        let text = changed().render();
        assert!(text.contains("🥇 10♦️ → ♠️ (x4)"));
        assert!(text.contains("🥈 9♣️ → ❤️ (x3)"));
    }

    #[test]
    fn test_render_disabled() {
        let notice = RuleNotice { recipient: None, kind: RuleNoticeKind::Disabled };
        assert!(notice.render().contains("adaptive mode is off"));
    }

    #[test]
    fn test_channel_notifier_delivers_and_counts_drops() {
        let (notifier, rx) = ChannelNotifier::new(1);
        notifier.notify(&changed());
        notifier.notify(&changed());
        assert_eq!(notifier.dropped(), 1);
        assert_eq!(rx.try_recv().unwrap(), changed());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fn_notifier_invokes_closure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let notifier = FnNotifier(move |n: &RuleNotice| sink.lock().unwrap().push(n.clone()));
        notifier.notify(&changed());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
