//! cauldron: one cook, many savages, one bounded pot.
//!
//! The [`Pot`] holds up to `capacity` servings. The [`Cook`] refills it only
//! once it is completely empty. Savages take one serving at a time under one
//! of two policies:
//!
//! - [`Policy::Unordered`]: [`Savage`]s race for servings after every refill.
//! - [`Policy::TurnOrdered`]: [`TurnSavage`]s eat in strict round robin,
//!   `0, 1, ..., n-1, 0, ...`, whatever order they arrive in.
//!
//! Every actor is an async task holding a [`CancellationToken`]; the harness
//! that spawns them decides when to stop them.

mod config;
mod cook;
mod error;
mod event;
mod ledger;
mod pot;
mod savage;
mod turn;

pub use config::{Policy, PotConfig};
pub use cook::Cook;
pub use error::{ConfigError, PotError};
pub use event::{ChannelSink, EventSink, NullSink, PotEvent, SavageId, TracingSink};
pub use ledger::Ledger;
pub use pot::{Pot, Serving, Snapshot};
pub use savage::{DEFAULT_EAT_TIME, Savage};
pub use tokio_util::sync::CancellationToken;
pub use turn::{DEFAULT_TURN_EAT_TIME, TurnSavage};
