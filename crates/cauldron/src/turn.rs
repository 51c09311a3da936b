//! Savages of a turn-ordered pot: strict round robin, forever hungry.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::PotError;
use crate::event::{PotEvent, SavageId};
use crate::pot::Pot;
use crate::savage::eat;

/// Default eating time for turn-ordered savages.
pub const DEFAULT_TURN_EAT_TIME: Duration = Duration::from_millis(300);

/// A savage that eats only on its turn and keeps coming back.
///
/// Each round: wait for the turn, wait for food while holding the turn, eat
/// one serving, pass the turn, then spend `eat_time` away from the pot.
pub struct TurnSavage {
    id: SavageId,
    pot: Arc<Pot>,
    cancel: CancellationToken,
    eat_time: Duration,
}

impl TurnSavage {
    pub fn new(id: SavageId, pot: Arc<Pot>, cancel: CancellationToken) -> Self {
        Self {
            id,
            pot,
            cancel,
            eat_time: DEFAULT_TURN_EAT_TIME,
        }
    }

    pub fn with_eat_time(mut self, eat_time: Duration) -> Self {
        self.eat_time = eat_time;
        self
    }

    pub fn id(&self) -> SavageId {
        self.id
    }

    /// Eat until cancelled or the pot closes.
    ///
    /// A closed pot ends the savage normally with the number of servings it
    /// ate. Cancellation is returned as [`PotError::Cancelled`]; the ledger on
    /// the pot still holds what was eaten.
    pub async fn run(self) -> Result<u64, PotError> {
        let mut eaten = 0;
        let result = self.dine(&mut eaten).await;

        self.pot.report(PotEvent::SavageFinished {
            savage: self.id,
            eaten,
            cancelled: result.as_ref().is_err_and(PotError::is_cancelled),
        });
        result.map(|()| eaten)
    }

    async fn dine(&self, eaten: &mut u64) -> Result<(), PotError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(PotError::Cancelled);
            }
            match self.pot.take_in_turn(self.id, &self.cancel).await {
                Ok(serving) => *eaten = serving.eaten,
                Err(PotError::Closed) => return Ok(()),
                Err(e) => return Err(e),
            }
            eat(&self.cancel, self.eat_time).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Policy, PotConfig};
    use crate::cook::Cook;
    use crate::event::{ChannelSink, NullSink};

    fn config(capacity: usize, consumers: usize) -> PotConfig {
        PotConfig::new(capacity, consumers).with_policy(Policy::TurnOrdered)
    }

    fn seat(
        pot: &Arc<Pot>,
        cancel: &CancellationToken,
        ids: impl Iterator<Item = SavageId>,
    ) -> Vec<tokio::task::JoinHandle<Result<u64, PotError>>> {
        ids.map(|id| {
            let savage = TurnSavage::new(id, Arc::clone(pot), cancel.child_token())
                .with_eat_time(Duration::from_millis(1));
            tokio::spawn(savage.run())
        })
        .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fifteen_servings_split_evenly() {
        let (sink, mut rx) = ChannelSink::channel();
        let pot = Pot::new(config(5, 3).with_service_limit(15), Arc::new(sink)).unwrap();
        let cancel = CancellationToken::new();

        let cook = tokio::spawn(Cook::new(Arc::clone(&pot), cancel.child_token()).run());
        // Arrive in reverse so arrival order differs from turn order.
        let savages = seat(&pot, &cancel, (0..3).rev());

        let results = tokio::time::timeout(
            Duration::from_secs(5),
            futures::future::join_all(savages),
        )
        .await
        .expect("a closed pot should release every savage");
        for result in results {
            assert_eq!(result.unwrap(), Ok(5));
        }
        let refills = tokio::time::timeout(Duration::from_secs(1), cook)
            .await
            .expect("a closed pot should release the cook")
            .unwrap();

        assert_eq!(pot.ledger().snapshot(), vec![5, 5, 5]);
        assert_eq!(refills, 2);

        // Every serving is immediately followed by passing the turn on.
        let mut servings = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if matches!(event, PotEvent::Ate { .. } | PotEvent::TurnPassed { .. }) {
                servings.push(event);
            }
        }
        assert_eq!(servings.len(), 30);
        for (n, pair) in servings.chunks(2).enumerate() {
            let savage = n % 3;
            assert!(
                matches!(pair[0], PotEvent::Ate { savage: s, .. } if s == savage),
                "serving {n}: {:?}",
                pair[0]
            );
            assert_eq!(
                pair[1],
                PotEvent::TurnPassed {
                    from: savage,
                    to: (savage + 1) % 3
                }
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ledger_stays_within_one_and_ring_does_not_deadlock() {
        let pot = Pot::new(config(5, 3), Arc::new(NullSink)).unwrap();
        let cancel = CancellationToken::new();

        let cook = tokio::spawn(Cook::new(Arc::clone(&pot), cancel.child_token()).run());
        let savages = seat(&pot, &cancel, 0..3);

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snap = pot.snapshot();
                assert!(snap.units <= snap.capacity);
                assert!(snap.spread() <= 1, "ledger drifted: {:?}", snap.ledger);
                if snap.ledger.iter().all(|&eaten| eaten >= 3) {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("every savage should eat three times");

        cancel.cancel();
        for savage in savages {
            assert_eq!(savage.await.unwrap(), Err(PotError::Cancelled));
        }
        cook.await.unwrap();

        let snap = pot.snapshot();
        assert_eq!(snap.filled() - snap.served, snap.units as u64);
    }

    #[tokio::test]
    async fn cancelled_turn_holder_stalls_the_ring() {
        let pot = Pot::new(config(5, 2), Arc::new(NullSink)).unwrap();
        let cancel = CancellationToken::new();

        // Savage 0 holds the first turn but is gone before it eats.
        let gone = cancel.child_token();
        gone.cancel();
        let first = TurnSavage::new(0, Arc::clone(&pot), gone).run().await;
        assert_eq!(first, Err(PotError::Cancelled));

        let second = tokio::spawn(
            TurnSavage::new(1, Arc::clone(&pot), cancel.child_token())
                .with_eat_time(Duration::ZERO)
                .run(),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(pot.snapshot().turn, Some(0));
        assert_eq!(pot.ledger().snapshot(), vec![0, 0]);

        cancel.cancel();
        assert_eq!(second.await.unwrap(), Err(PotError::Cancelled));
    }
}
