//! Observable pot events and the sinks they are reported to.
//!
//! Reporting is fire-and-forget: the pot calls [`EventSink::report`] while
//! holding its lock, so a sink must never block. In exchange, the order in
//! which a sink receives state-transition events is exactly the order in
//! which the transitions happened.

use serde::Serialize;
use tokio::sync::mpsc;

/// Index of a savage at the pot, in `[0, consumers)`.
pub type SavageId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PotEvent {
    /// The cook filled the empty pot back to capacity.
    Refilled { units: usize, refills: u64 },
    /// A savage found the pot empty and went back to waiting.
    WaitingForFood { savage: SavageId },
    /// A savage woke up but the turn belongs to someone else.
    WaitingForTurn { savage: SavageId, turn: SavageId },
    /// A savage took one serving.
    Ate {
        savage: SavageId,
        remaining: usize,
        eaten: u64,
    },
    /// The turn ticket moved on after a serving.
    TurnPassed { from: SavageId, to: SavageId },
    /// The serving just taken was the last one; the cook has been called.
    PotEmptied { savage: SavageId },
    SavageFinished {
        savage: SavageId,
        eaten: u64,
        cancelled: bool,
    },
    CookFinished { refills: u64 },
}

/// Receiver of pot events.
pub trait EventSink: Send + Sync + 'static {
    fn report(&self, event: PotEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn report(&self, event: PotEvent) {
        match event {
            PotEvent::Refilled { units, refills } => {
                tracing::info!(units, refills, "Cook filled the pot");
            }
            PotEvent::WaitingForFood { savage } => {
                tracing::debug!(savage, "Savage waits for the pot to be filled");
            }
            PotEvent::WaitingForTurn { savage, turn } => {
                tracing::debug!(savage, turn, "Savage waits for its turn");
            }
            PotEvent::Ate {
                savage,
                remaining,
                eaten,
            } => {
                tracing::info!(savage, remaining, eaten, "Savage took a serving");
            }
            PotEvent::TurnPassed { from, to } => {
                tracing::debug!(from, to, "Turn passed");
            }
            PotEvent::PotEmptied { savage } => {
                tracing::info!(savage, "Pot is empty, calling the cook");
            }
            PotEvent::SavageFinished {
                savage,
                eaten,
                cancelled,
            } => {
                tracing::info!(savage, eaten, cancelled, "Savage left the table");
            }
            PotEvent::CookFinished { refills } => {
                tracing::info!(refills, "Cook finished work");
            }
        }
    }
}

/// Forwards events over an unbounded channel.
///
/// Sending never blocks; events reported after the receiver is gone are
/// dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PotEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<PotEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PotEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn report(&self, event: PotEvent) {
        let _ = self.tx.send(event);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn report(&self, _event: PotEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.report(PotEvent::Refilled {
            units: 5,
            refills: 1,
        });
        sink.report(PotEvent::PotEmptied { savage: 2 });

        assert_eq!(
            rx.try_recv().unwrap(),
            PotEvent::Refilled {
                units: 5,
                refills: 1
            }
        );
        assert_eq!(rx.try_recv().unwrap(), PotEvent::PotEmptied { savage: 2 });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::channel();
        drop(rx);
        sink.report(PotEvent::CookFinished { refills: 0 });
    }

    #[test]
    fn events_serialize_tagged() {
        insta::assert_json_snapshot!(
            PotEvent::Ate {
                savage: 1,
                remaining: 3,
                eaten: 4,
            },
            @r#"
        {
          "event": "ate",
          "savage": 1,
          "remaining": 3,
          "eaten": 4
        }
        "#
        );
    }
}
