//! The shared pot: servings, turn ticket and the signals that guard them.
//!
//! One `std::sync::Mutex` protects every piece of mutable state. It is never
//! held across an `.await`. Waiting follows the condition-variable pattern:
//!
//! 1. lock and check the predicate,
//! 2. if it fails, register on the matching [`Notify`] while still locked,
//! 3. unlock, sleep until notified or cancelled, go back to 1.
//!
//! Every notification is issued while the lock is held, so a waiter that
//! registered in step 2 cannot miss a wake-up issued after its check.

use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use serde::Serialize;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tokio_util::sync::CancellationToken;

use crate::config::{Policy, PotConfig};
use crate::error::{ConfigError, PotError};
use crate::event::{EventSink, PotEvent, SavageId};
use crate::ledger::Ledger;

/// Whose turn it is at a turn-ordered pot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TurnTicket {
    current: SavageId,
    consumers: usize,
}

impl TurnTicket {
    fn new(consumers: usize) -> Self {
        Self {
            current: 0,
            consumers,
        }
    }

    fn advance(&mut self) -> SavageId {
        self.current = (self.current + 1) % self.consumers;
        self.current
    }
}

#[derive(Debug)]
struct PotState {
    units: usize,
    refills: u64,
    served: u64,
    ticket: Option<TurnTicket>,
    closed: bool,
}

/// Condition a waiter sleeps on.
#[derive(Debug, Clone, Copy)]
enum Signal {
    HasFood,
    IsEmpty,
    TurnChanged,
}

enum Attempt<T> {
    Ready(Result<T, PotError>),
    Wait(Signal),
}

/// One serving handed to a savage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Serving {
    pub savage: SavageId,
    /// Servings left in the pot after this one.
    pub remaining: usize,
    /// Servings this savage has eaten so far, this one included.
    pub eaten: u64,
}

impl Serving {
    /// Whether this serving emptied the pot.
    pub fn emptied_pot(&self) -> bool {
        self.remaining == 0
    }
}

/// Consistent view of the pot, taken under its lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub capacity: usize,
    pub units: usize,
    pub refills: u64,
    pub served: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<SavageId>,
    pub closed: bool,
    pub ledger: Vec<u64>,
}

impl Snapshot {
    /// Servings put into the pot so far: the initial fill plus every refill.
    /// Saturates at `u64::MAX`.
    pub fn filled(&self) -> u64 {
        self.refills
            .saturating_add(1)
            .saturating_mul(self.capacity as u64)
    }

    /// Difference between the best-fed and the hungriest savage.
    pub fn spread(&self) -> u64 {
        let max = self.ledger.iter().copied().max().unwrap_or(0);
        let min = self.ledger.iter().copied().min().unwrap_or(0);
        max - min
    }
}

/// A bounded pot shared by one cook and a table of savages.
pub struct Pot {
    config: PotConfig,
    state: StdMutex<PotState>,
    has_food: Notify,
    is_empty: Notify,
    turn_changed: Notify,
    ledger: Ledger,
    events: Arc<dyn EventSink>,
}

impl Pot {
    /// Build a full pot. Fails fast on an unusable configuration.
    pub fn new(config: PotConfig, events: Arc<dyn EventSink>) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;

        let ticket = match config.policy {
            Policy::Unordered => None,
            Policy::TurnOrdered => Some(TurnTicket::new(config.consumers)),
        };

        Ok(Arc::new(Self {
            state: StdMutex::new(PotState {
                units: config.capacity,
                refills: 0,
                served: 0,
                ticket,
                closed: false,
            }),
            has_food: Notify::new(),
            is_empty: Notify::new(),
            turn_changed: Notify::new(),
            ledger: Ledger::new(config.consumers),
            events,
            config,
        }))
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn consumers(&self) -> usize {
        self.config.consumers
    }

    pub fn policy(&self) -> Policy {
        self.config.policy
    }

    pub fn config(&self) -> &PotConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn units(&self) -> usize {
        self.lock().units
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            capacity: self.config.capacity,
            units: state.units,
            refills: state.refills,
            served: state.served,
            turn: state.ticket.map(|t| t.current),
            closed: state.closed,
            ledger: self.ledger.snapshot(),
        }
    }

    /// Forward an event that is not tied to a state transition.
    pub fn report(&self, event: PotEvent) {
        self.events.report(event);
    }

    /// Wait until the pot is empty, then fill it to capacity and wake every
    /// savage waiting for food. Returns the new number of servings.
    ///
    /// Only the cook calls this.
    pub async fn refill(&self, cancel: &CancellationToken) -> Result<usize, PotError> {
        self.wait_for(cancel, |state| {
            if state.closed {
                return Attempt::Ready(Err(PotError::Closed));
            }
            if state.units > 0 {
                return Attempt::Wait(Signal::IsEmpty);
            }

            state.units = self.config.capacity;
            state.refills += 1;
            self.events.report(PotEvent::Refilled {
                units: state.units,
                refills: state.refills,
            });
            self.has_food.notify_waiters();
            Attempt::Ready(Ok(state.units))
        })
        .await
    }

    /// Wait until the pot has food, then take one serving.
    ///
    /// Savage of an unordered pot only.
    pub async fn take(
        &self,
        savage: SavageId,
        cancel: &CancellationToken,
    ) -> Result<Serving, PotError> {
        self.admit(savage, Policy::Unordered)?;

        self.wait_for(cancel, |state| {
            if state.units == 0 {
                self.events.report(PotEvent::WaitingForFood { savage });
                return Attempt::Wait(Signal::HasFood);
            }
            Attempt::Ready(Ok(self.serve(state, savage)))
        })
        .await
    }

    /// Wait for `savage`'s turn, then for food, then take one serving and
    /// pass the turn to the next savage.
    ///
    /// The turn is held while waiting for food. A savage cancelled while
    /// holding the turn never passes it on, which stalls the whole ring.
    pub async fn take_in_turn(
        &self,
        savage: SavageId,
        cancel: &CancellationToken,
    ) -> Result<Serving, PotError> {
        self.admit(savage, Policy::TurnOrdered)?;

        self.wait_for(cancel, |state| {
            if state.closed {
                return Attempt::Ready(Err(PotError::Closed));
            }
            let Some(turn) = state.ticket.map(|t| t.current) else {
                return Attempt::Ready(Err(self.wrong_policy(Policy::TurnOrdered)));
            };
            if turn != savage {
                self.events.report(PotEvent::WaitingForTurn { savage, turn });
                return Attempt::Wait(Signal::TurnChanged);
            }
            if state.units == 0 {
                self.events.report(PotEvent::WaitingForFood { savage });
                return Attempt::Wait(Signal::HasFood);
            }

            let serving = self.serve(state, savage);
            if let Some(ticket) = state.ticket.as_mut() {
                let next = ticket.advance();
                self.events.report(PotEvent::TurnPassed {
                    from: savage,
                    to: next,
                });
            }
            if self
                .config
                .service_limit
                .is_some_and(|limit| state.served >= limit)
            {
                self.close(state);
            }
            self.turn_changed.notify_waiters();
            Attempt::Ready(Ok(serving))
        })
        .await
    }

    /// Decrement the pot for `savage`. Caller holds the lock and has checked
    /// that the pot is not empty.
    fn serve(&self, state: &mut PotState, savage: SavageId) -> Serving {
        debug_assert!(state.units > 0 && state.units <= self.config.capacity);

        state.units -= 1;
        state.served += 1;
        let eaten = self.ledger.record(savage);
        self.events.report(PotEvent::Ate {
            savage,
            remaining: state.units,
            eaten,
        });

        if state.units == 0 {
            self.events.report(PotEvent::PotEmptied { savage });
            self.is_empty.notify_one();
        }

        Serving {
            savage,
            remaining: state.units,
            eaten,
        }
    }

    /// Stop serving and wake everyone so they can observe it.
    fn close(&self, state: &mut PotState) {
        state.closed = true;
        tracing::debug!(served = state.served, "Service limit reached, closing pot");
        self.turn_changed.notify_waiters();
        self.has_food.notify_waiters();
        self.is_empty.notify_one();
    }

    fn admit(&self, savage: SavageId, expected: Policy) -> Result<(), PotError> {
        if savage >= self.config.consumers {
            return Err(PotError::UnknownSavage {
                id: savage,
                consumers: self.config.consumers,
            });
        }
        if self.config.policy != expected {
            return Err(self.wrong_policy(expected));
        }
        Ok(())
    }

    fn wrong_policy(&self, expected: Policy) -> PotError {
        PotError::WrongPolicy {
            expected,
            actual: self.config.policy,
        }
    }

    fn signal(&self, signal: Signal) -> &Notify {
        match signal {
            Signal::HasFood => &self.has_food,
            Signal::IsEmpty => &self.is_empty,
            Signal::TurnChanged => &self.turn_changed,
        }
    }

    /// Run `attempt` under the lock until it is ready, sleeping on the signal
    /// it names in between. Cancellation is checked before every attempt and
    /// raced against every sleep.
    async fn wait_for<T>(
        &self,
        cancel: &CancellationToken,
        mut attempt: impl FnMut(&mut PotState) -> Attempt<T>,
    ) -> Result<T, PotError> {
        loop {
            if cancel.is_cancelled() {
                return Err(PotError::Cancelled);
            }

            let notified: Pin<Box<Notified<'_>>> = {
                let mut state = self.lock();
                let signal = match attempt(&mut *state) {
                    Attempt::Ready(result) => return result,
                    Attempt::Wait(signal) => signal,
                };
                let mut notified = Box::pin(self.signal(signal).notified());
                notified.as_mut().enable();
                notified
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PotError::Cancelled),
                _ = notified => {}
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, PotState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Pot mutex poisoned - continuing with last known state");
            poisoned.into_inner()
        })
    }
}

impl std::fmt::Debug for Pot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pot")
            .field("config", &self.config)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
