//! Bounded retry with re-randomized ordering.
//!
//! A solver supplies a side-effect-free attempt function; the policy calls
//! it up to `max_attempts` times, handing each call a [`Shuffler`] that
//! diversifies fellow and slot ordering. Attempts never share mutable
//! state, so a failed attempt leaves nothing behind.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Which orderings are shuffled between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShuffleStrategy {
    /// Fully deterministic: input order, chronological slots.
    #[default]
    None,
    /// Shuffle fellow order only.
    Fellows,
    /// Shuffle fellow order and candidate slots.
    FellowsAndSlots,
}

/// Retry policy for randomized solvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts (at least one is always made).
    pub max_attempts: usize,
    /// Shuffle strategy.
    pub shuffle: ShuffleStrategy,
    /// Seed of the pseudo-random source.
    pub seed: u64,
}

/// Default attempt budget for randomized builds.
pub const DEFAULT_MAX_ATTEMPTS: usize = 40;

impl RetryPolicy {
    /// Single deterministic attempt.
    pub fn deterministic() -> Self {
        Self {
            max_attempts: 1,
            shuffle: ShuffleStrategy::None,
            seed: 0,
        }
    }

    /// Randomized policy with the default attempt budget.
    pub fn randomized(seed: u64) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            shuffle: ShuffleStrategy::FellowsAndSlots,
            seed,
        }
    }

    /// Policy for a `randomize` flag.
    pub fn from_flag(randomize: bool, seed: u64) -> Self {
        if randomize {
            Self::randomized(seed)
        } else {
            Self::deterministic()
        }
    }

    /// Sets the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the shuffle strategy.
    pub fn with_shuffle(mut self, shuffle: ShuffleStrategy) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Whether any randomization happens.
    pub fn is_randomized(&self) -> bool {
        self.shuffle != ShuffleStrategy::None
    }

    /// Number of attempts actually made: deterministic attempts are identical,
    /// so only one is ever run.
    fn attempt_budget(&self) -> usize {
        if self.is_randomized() {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Runs `attempt` until it succeeds or the budget is spent.
    ///
    /// Returns the first success, or the last attempt's error.
    pub fn run<T, E>(
        &self,
        mut attempt: impl FnMut(&mut Shuffler) -> Result<T, E>,
    ) -> RetryOutcome<T, E> {
        let mut shuffler = Shuffler::new(self);
        let budget = self.attempt_budget();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = attempt(&mut shuffler);
            if result.is_ok() || attempts >= budget {
                return RetryOutcome { result, attempts };
            }
            tracing::debug!(attempt = attempts, "attempt failed, retrying");
        }
    }

    /// Runs `attempt` up to the budget, keeping the result with the lowest
    /// `cost`. Stops early on a zero-cost result.
    pub fn best_of<T>(
        &self,
        mut attempt: impl FnMut(&mut Shuffler) -> T,
        cost: impl Fn(&T) -> usize,
    ) -> (T, usize) {
        let mut shuffler = Shuffler::new(self);
        let budget = self.attempt_budget();
        let mut best = attempt(&mut shuffler);
        let mut best_cost = cost(&best);
        let mut attempts = 1;
        while best_cost > 0 && attempts < budget {
            attempts += 1;
            let candidate = attempt(&mut shuffler);
            let c = cost(&candidate);
            if c < best_cost {
                best = candidate;
                best_cost = c;
            }
        }
        (best, attempts)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::deterministic()
    }
}

/// Result of [`RetryPolicy::run`].
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// First success or last failure.
    pub result: Result<T, E>,
    /// Attempts made.
    pub attempts: usize,
}

/// Ordering source handed to each attempt.
#[derive(Debug)]
pub struct Shuffler {
    rng: Option<StdRng>,
    strategy: ShuffleStrategy,
}

impl Shuffler {
    fn new(policy: &RetryPolicy) -> Self {
        let rng = policy
            .is_randomized()
            .then(|| StdRng::seed_from_u64(policy.seed));
        Self {
            rng,
            strategy: policy.shuffle,
        }
    }

    /// Shuffles a fellow ordering (if the strategy allows).
    pub fn fellows<T>(&mut self, items: &mut [T]) {
        if let Some(rng) = self.rng.as_mut() {
            items.shuffle(rng);
        }
    }

    /// Shuffles a candidate slot ordering (if the strategy allows).
    pub fn slots<T>(&mut self, items: &mut [T]) {
        if self.strategy == ShuffleStrategy::FellowsAndSlots {
            if let Some(rng) = self.rng.as_mut() {
                items.shuffle(rng);
            }
        }
    }
}
