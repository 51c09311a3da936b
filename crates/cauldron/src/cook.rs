//! The producer: refills the pot whenever it runs dry.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::PotError;
use crate::event::PotEvent;
use crate::pot::Pot;

/// The one actor allowed to refill a [`Pot`].
///
/// Start at most one cook per pot.
pub struct Cook {
    pot: Arc<Pot>,
    cancel: CancellationToken,
}

impl Cook {
    pub fn new(pot: Arc<Pot>, cancel: CancellationToken) -> Self {
        Self { pot, cancel }
    }

    /// Refill until cancelled or the pot closes. Returns the number of refills
    /// this cook performed.
    pub async fn run(self) -> u64 {
        let mut refills = 0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.pot.refill(&self.cancel).await {
                Ok(units) => {
                    refills += 1;
                    tracing::trace!(units, refills, "Cook waits for the pot to empty again");
                }
                Err(PotError::Cancelled) => break,
                Err(PotError::Closed) => {
                    tracing::debug!("Pot closed, cook stops");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Cook failed to refill");
                    break;
                }
            }
        }

        self.pot.report(PotEvent::CookFinished { refills });
        refills
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::PotConfig;
    use crate::event::{ChannelSink, NullSink};

    #[tokio::test]
    async fn cook_idles_while_pot_has_food() {
        let pot = Pot::new(PotConfig::new(3, 1), Arc::new(NullSink)).unwrap();
        let cancel = CancellationToken::new();
        let cook = tokio::spawn(Cook::new(Arc::clone(&pot), cancel.clone()).run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let refills = tokio::time::timeout(Duration::from_secs(1), cook)
            .await
            .expect("cancelled cook should stop promptly")
            .unwrap();
        assert_eq!(refills, 0);
        assert_eq!(pot.units(), 3);
    }

    #[tokio::test]
    async fn cook_refills_each_time_the_pot_empties() {
        let (sink, mut rx) = ChannelSink::channel();
        let pot = Pot::new(PotConfig::new(2, 1), Arc::new(sink)).unwrap();
        let cancel = CancellationToken::new();
        let cook = tokio::spawn(Cook::new(Arc::clone(&pot), cancel.clone()).run());

        // Three pots' worth: the initial fill and two refills.
        for _ in 0..6 {
            let serving = tokio::time::timeout(Duration::from_secs(1), pot.take(0, &cancel))
                .await
                .expect("cook should keep the pot filled")
                .unwrap();
            assert!(serving.remaining < 2);
        }

        // The last take emptied the pot again, so a third refill follows.
        tokio::time::timeout(Duration::from_secs(1), async {
            while pot.snapshot().refills < 3 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("cook should refill the emptied pot");

        cancel.cancel();
        let refills = cook.await.unwrap();
        assert_eq!(refills, 3);
        assert_eq!(pot.units(), 2);

        let mut refilled = Vec::new();
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            if let PotEvent::Refilled { units, refills } = event {
                refilled.push((units, refills));
            }
            last = Some(event);
        }
        assert_eq!(refilled, vec![(2, 1), (2, 2), (2, 3)]);
        assert_eq!(last, Some(PotEvent::CookFinished { refills: 3 }));
    }
}
