//! Savages of an unordered pot: first to wake after a refill eats first.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::PotError;
use crate::event::{PotEvent, SavageId};
use crate::pot::Pot;

/// Default time a savage spends eating one serving.
pub const DEFAULT_EAT_TIME: Duration = Duration::from_millis(100);

/// Simulated eating. Runs outside the pot lock and stops early on cancellation.
pub(crate) async fn eat(cancel: &CancellationToken, time: Duration) -> Result<(), PotError> {
    if time.is_zero() {
        tokio::task::yield_now().await;
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PotError::Cancelled),
        _ = tokio::time::sleep(time) => Ok(()),
    }
}

/// A savage with a fixed appetite.
///
/// Makes `meals` attempts at the pot (one by default), then leaves.
pub struct Savage {
    id: SavageId,
    pot: Arc<Pot>,
    cancel: CancellationToken,
    meals: u32,
    eat_time: Duration,
}

impl Savage {
    pub fn new(id: SavageId, pot: Arc<Pot>, cancel: CancellationToken) -> Self {
        Self {
            id,
            pot,
            cancel,
            meals: 1,
            eat_time: DEFAULT_EAT_TIME,
        }
    }

    pub fn with_meals(mut self, meals: u32) -> Self {
        self.meals = meals;
        self
    }

    pub fn with_eat_time(mut self, eat_time: Duration) -> Self {
        self.eat_time = eat_time;
        self
    }

    pub fn id(&self) -> SavageId {
        self.id
    }

    /// Eat `meals` servings. Returns how many were eaten, or
    /// [`PotError::Cancelled`] if stopped early.
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
        for _ in 0..self.meals {
            if self.cancel.is_cancelled() {
                return Err(PotError::Cancelled);
            }
            self.pot.take(self.id, &self.cancel).await?;
            *eaten += 1;
            eat(&self.cancel, self.eat_time).await?;
        }
        Ok(())
    }
}
