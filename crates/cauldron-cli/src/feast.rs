//! Feast harness: seats the savages, runs the cook, collects the bill.
//!
//! An unordered feast ends when every savage has eaten its quota; the cook is
//! then sent home. A turn-ordered feast runs until its duration elapses or
//! the pot reaches its service limit, whichever comes first.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cauldron::{
    CancellationToken, ConfigError, Cook, EventSink, Policy, Pot, PotConfig, PotError, Savage,
    Snapshot, TurnSavage,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Everything needed to run one feast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeastConfig {
    pub pot: PotConfig,
    /// Servings each unordered savage eats before leaving.
    pub meals: u32,
    /// Simulated eating time per serving.
    pub eat_ms: u64,
    /// Wall-clock length of the feast. Required for turn-ordered feasts
    /// without a service limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Default for FeastConfig {
    fn default() -> Self {
        Self::for_policy(Policy::Unordered)
    }
}

impl FeastConfig {
    /// The classic dinner for each policy: 8 savages eating once from a pot
    /// of 5, or 3 savages taking turns for ten seconds.
    pub fn for_policy(policy: Policy) -> Self {
        match policy {
            Policy::Unordered => Self {
                pot: PotConfig::new(5, 8),
                meals: 1,
                eat_ms: 100,
                duration_ms: None,
            },
            Policy::TurnOrdered => Self {
                pot: PotConfig::new(5, 3).with_policy(Policy::TurnOrdered),
                meals: 1,
                eat_ms: 300,
                duration_ms: Some(10_000),
            },
        }
    }

    pub fn eat_time(&self) -> Duration {
        Duration::from_millis(self.eat_ms)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), FeastError> {
        self.pot.validate()?;
        if self.pot.policy == Policy::TurnOrdered
            && self.duration_ms.is_none()
            && self.pot.service_limit.is_none()
        {
            return Err(FeastError::Unbounded);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeastError {
    #[error("invalid pot configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("a turn-ordered feast needs a duration or a service limit")]
    Unbounded,

    #[error("savage failed: {0}")]
    Pot(#[from] PotError),

    #[error("actor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Final statistics of a feast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeastReport {
    pub policy: Policy,
    pub savages: usize,
    /// The pot as it was left once every actor had stopped.
    #[serde(flatten)]
    pub pot: Snapshot,
    /// Savages that were still at the table when the feast was stopped.
    pub cancelled_savages: usize,
    /// RFC 3339 start time.
    pub started_at: String,
    pub elapsed_ms: u64,
}

impl FeastReport {
    /// Round-robin fairness: nobody ate more than one serving over anyone else.
    pub fn is_balanced(&self) -> bool {
        self.pot.spread() <= 1
    }
}

impl fmt::Display for FeastReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pot = &self.pot;
        write!(
            f,
            "Feast over ({}): {} servings, {} refills, {} left in a pot of {}, {} ms",
            self.policy, pot.served, pot.refills, pot.units, pot.capacity, self.elapsed_ms
        )?;
        for (savage, eaten) in pot.ledger.iter().enumerate() {
            write!(f, "\n  savage {savage}: {eaten} servings")?;
        }
        if self.cancelled_savages > 0 {
            write!(f, "\n  {} savages were still hungry", self.cancelled_savages)?;
        }
        Ok(())
    }
}

/// Run one feast to completion, reporting pot events to `events`.
pub async fn run_feast(
    config: &FeastConfig,
    events: Arc<dyn EventSink>,
) -> Result<FeastReport, FeastError> {
    config.validate()?;
    let pot = Pot::new(config.pot.clone(), events)?;

    let started_at = chrono::Utc::now().to_rfc3339();
    let start = Instant::now();
    let shutdown = CancellationToken::new();

    tracing::info!(
        policy = %config.pot.policy,
        capacity = config.pot.capacity,
        savages = config.pot.consumers,
        "Feast begins"
    );

    let cook = tokio::spawn(Cook::new(Arc::clone(&pot), shutdown.child_token()).run());
    let diners = futures::future::join_all(seat_savages(config, &pot, &shutdown));
    tokio::pin!(diners);

    let results = match config.duration() {
        Some(duration) => tokio::select! {
            results = &mut diners => results,
            _ = tokio::time::sleep(duration) => {
                tracing::info!(?duration, "Time is up, stopping the feast");
                shutdown.cancel();
                diners.await
            }
        },
        None => diners.await,
    };

    shutdown.cancel();
    let refills = cook.await?;

    let mut cancelled_savages = 0;
    for result in results {
        match result? {
            Ok(_) => {}
            Err(PotError::Cancelled) => cancelled_savages += 1,
            Err(e) => return Err(e.into()),
        }
    }

    let snapshot = pot.snapshot();
    debug_assert_eq!(snapshot.refills, refills);

    let report = FeastReport {
        policy: config.pot.policy,
        savages: config.pot.consumers,
        pot: snapshot,
        cancelled_savages,
        started_at,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    tracing::info!(
        served = report.pot.served,
        refills = report.pot.refills,
        elapsed_ms = report.elapsed_ms,
        "Feast over"
    );
    Ok(report)
}

fn seat_savages(
    config: &FeastConfig,
    pot: &Arc<Pot>,
    shutdown: &CancellationToken,
) -> Vec<JoinHandle<Result<u64, PotError>>> {
    (0..config.pot.consumers)
        .map(|id| {
            let pot = Arc::clone(pot);
            let cancel = shutdown.child_token();
            match config.pot.policy {
                Policy::Unordered => tokio::spawn(
                    Savage::new(id, pot, cancel)
                        .with_meals(config.meals)
                        .with_eat_time(config.eat_time())
                        .run(),
                ),
                Policy::TurnOrdered => tokio::spawn(
                    TurnSavage::new(id, pot, cancel)
                        .with_eat_time(config.eat_time())
                        .run(),
                ),
            }
        })
        .collect()
}
