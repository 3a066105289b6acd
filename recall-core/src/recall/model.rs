//! Beta-distributed recall model.
//!
//! A key's memory strength is a Beta(alpha, beta) belief over the
//! probability of recalling it `half_life_hours` after it was last seen.
//! Recall at any other elapsed time `h` is that probability raised to
//! `h / half_life_hours`, so predictions only need the Beta function:
//!
//! E[p^δ] = B(alpha + δ, beta) / B(alpha, beta)
//!
//! A review is a Bernoulli observation at the elapsed time. The exact
//! posterior is no longer Beta in general, so it is projected back onto one
//! by matching its first two moments at a back-reference time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::math::{beta_from_moments, ln_beta, ln_sub_exp};
use crate::clock::elapsed_hours;
use crate::config::RecallConfig;
use crate::error::{Error, Result};

/// Schema version written to every model and event document.
pub const SCHEMA_VERSION: &str = "1";

/// Iteration cap for half-life bracketing and bisection.
const MAX_SEARCH_STEPS: usize = 200;

/// Outcome of one quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewResult {
    Success,
    Failure,
}

impl ReviewResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<bool> for ReviewResult {
    fn from(passed: bool) -> Self {
        if passed {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Beta shape parameters and the reference time they describe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strength {
    pub alpha: f64,
    pub beta: f64,
    pub half_life_hours: f64,
}

impl Strength {
    /// Create a strength, rejecting non-positive or non-finite parameters.
    pub fn new(alpha: f64, beta: f64, half_life_hours: f64) -> Result<Self> {
        let strength = Self {
            alpha,
            beta,
            half_life_hours,
        };
        strength.validate()?;
        Ok(strength)
    }

    fn validate(&self) -> Result<()> {
        let ok = [self.alpha, self.beta, self.half_life_hours]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0);
        if ok {
            Ok(())
        } else {
            Err(Error::model(format!("invalid strength {self:?}")))
        }
    }

    /// Expected recall probability `elapsed_hours` after the last exposure.
    pub fn recall_after(&self, elapsed_hours: f64) -> f64 {
        let delta = elapsed_hours.max(0.0) / self.half_life_hours;
        let ln_recall = ln_beta(self.alpha + delta, self.beta) - ln_beta(self.alpha, self.beta);
        ln_recall.exp().clamp(0.0, 1.0)
    }

    fn is_balanced(&self) -> bool {
        self.alpha <= 2.0 * self.beta && self.beta <= 2.0 * self.alpha
    }

    /// Elapsed hours at which expected recall drops to `percentile`.
    pub fn half_life(&self, percentile: f64) -> Result<f64> {
        self.decay_time(percentile, false)
    }

    /// Bracket the root of recall(t) = percentile on a log-time axis, then
    /// either take the bracket midpoint (`coarse`) or bisect it down.
    fn decay_time(&self, percentile: f64, coarse: bool) -> Result<f64> {
        if !(percentile > 0.0 && percentile < 1.0) {
            return Err(Error::model(format!(
                "percentile must be in (0, 1), got {percentile}"
            )));
        }

        let ln_norm = ln_beta(self.alpha, self.beta);
        let ln_target = percentile.ln();
        // Positive before the decay time, negative after.
        let f =
            |ln_delta: f64| ln_beta(self.alpha + ln_delta.exp(), self.beta) - ln_norm - ln_target;

        let width = if coarse { 1.0 } else { 6.0 };
        let (mut lo, mut hi) = (-width / 2.0, width / 2.0);
        let (mut f_lo, mut f_hi) = (f(lo), f(hi));

        let mut steps = 0;
        while f_lo > 0.0 && f_hi > 0.0 && steps < MAX_SEARCH_STEPS {
            lo = hi;
            f_lo = f_hi;
            hi += width;
            f_hi = f(hi);
            steps += 1;
        }
        while f_lo < 0.0 && f_hi < 0.0 && steps < MAX_SEARCH_STEPS {
            hi = lo;
            f_hi = f_lo;
            lo -= width;
            f_lo = f(lo);
            steps += 1;
        }
        if !(f_lo > 0.0 && f_hi < 0.0) {
            return Err(Error::model(format!(
                "could not bracket decay time of {self:?} at {percentile}"
            )));
        }

        if coarse {
            return Ok((lo.exp() + hi.exp()) / 2.0 * self.half_life_hours);
        }

        for _ in 0..MAX_SEARCH_STEPS {
            let mid = (lo + hi) / 2.0;
            if f(mid) > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo < 1e-12 {
                break;
            }
        }
        Ok(((lo + hi) / 2.0).exp() * self.half_life_hours)
    }

    /// Posterior after observing `result` at `elapsed` hours, projected onto
    /// a Beta at `back` hours (defaults to the current reference time).
    fn posterior(&self, result: ReviewResult, elapsed: f64, back: Option<f64>) -> Result<Self> {
        let Self {
            alpha,
            beta,
            half_life_hours: t,
        } = *self;
        let delta = elapsed / t;

        // Success at the reference time itself is conjugate.
        let back = match back {
            None if result.is_success() => {
                return Self::new(alpha + delta, beta, t);
            }
            None => t,
            Some(back) => back,
        };
        let eps = back / t;

        let (ln_m1, ln_m2) = match result {
            ReviewResult::Success => {
                let ln_z = ln_beta(alpha + delta, beta);
                (
                    ln_beta(alpha + delta + eps, beta) - ln_z,
                    ln_beta(alpha + delta + 2.0 * eps, beta) - ln_z,
                )
            }
            ReviewResult::Failure => {
                let ln_z = ln_sub_exp(ln_beta(alpha, beta), ln_beta(alpha + delta, beta))?;
                (
                    ln_sub_exp(ln_beta(alpha + eps, beta), ln_beta(alpha + delta + eps, beta))?
                        - ln_z,
                    ln_sub_exp(
                        ln_beta(alpha + 2.0 * eps, beta),
                        ln_beta(alpha + delta + 2.0 * eps, beta),
                    )? - ln_z,
                )
            }
        };

        let mean = ln_m1.exp();
        let variance = ln_sub_exp(ln_m2, 2.0 * ln_m1)?.exp();
        let (new_alpha, new_beta) = beta_from_moments(mean, variance)?;
        Self::new(new_alpha, new_beta, back)
    }
}

/// Memory state of one learned key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallModel {
    pub strength: Strength,
    pub last_seen: DateTime<Utc>,
}

impl RecallModel {
    /// Fresh model for a key learned at `now`.
    pub fn initial(config: &RecallConfig, now: DateTime<Utc>) -> Self {
        Self {
            strength: Strength {
                alpha: config.default_shape,
                beta: config.default_shape,
                half_life_hours: config.default_half_life_hours,
            },
            last_seen: now,
        }
    }

    /// Expected recall probability at `now`.
    pub fn predict_recall(&self, now: DateTime<Utc>) -> f64 {
        self.strength.recall_after(elapsed_hours(self.last_seen, now))
    }

    /// Hours since last exposure, never negative.
    pub fn elapsed_hours(&self, now: DateTime<Utc>) -> f64 {
        elapsed_hours(self.last_seen, now)
    }

    /// Model after a quiz taken `elapsed_hours` after the last exposure.
    ///
    /// The updated model never predicts lower recall at `elapsed_hours` than
    /// this one after a success, nor higher after a failure. A projection
    /// that would (possible when the posterior is re-fitted far from the
    /// observation time) is dropped and the strength kept as is.
    pub fn update(
        &self,
        result: ReviewResult,
        elapsed_hours: f64,
        now: DateTime<Utc>,
        config: &RecallConfig,
    ) -> Result<Self> {
        let elapsed = elapsed_hours.max(0.0).max(config.min_update_elapsed_hours);
        let prior = self.strength;

        let mut proposed = prior.posterior(result, elapsed, None)?;
        if config.rebalance && !proposed.is_balanced() {
            let back = proposed.decay_time(0.5, true)?;
            proposed = prior.posterior(result, elapsed, Some(back))?;
        }

        let before = prior.recall_after(elapsed);
        let after = proposed.recall_after(elapsed);
        let consistent = match result {
            ReviewResult::Success => after >= before,
            ReviewResult::Failure => after <= before,
        };
        let strength = if consistent {
            proposed
        } else {
            debug!(
                ?result,
                elapsed, before, after, "posterior projection contradicts outcome, keeping strength"
            );
            prior
        };

        Ok(Self {
            strength,
            last_seen: now,
        })
    }

    /// Same strength, exposure time moved to `now`.
    pub fn refreshed(&self, now: DateTime<Utc>) -> Self {
        Self {
            strength: self.strength,
            last_seen: now,
        }
    }

    /// Hours until expected recall falls to one half, counted from last exposure.
    pub fn half_life_hours(&self) -> Result<f64> {
        self.strength.half_life(0.5)
    }
}

/// Fresh model with the default prior: half-life 0.5 h, shape 3.
pub fn initialize_model(now: DateTime<Utc>) -> RecallModel {
    RecallModel::initial(&RecallConfig::default(), now)
}

/// Predicted recall of a possibly-unknown key.
///
/// Unknown keys predict `+inf` so they sort after every learned key.
pub fn predict(model: Option<&RecallModel>, now: DateTime<Utc>) -> f64 {
    match model {
        Some(model) => model.predict_recall(now),
        None => f64::INFINITY,
    }
}

/// Update with the default configuration.
pub fn update_model(
    model: &RecallModel,
    result: ReviewResult,
    elapsed_hours: f64,
    now: DateTime<Utc>,
) -> Result<RecallModel> {
    model.update(result, elapsed_hours, now, &RecallConfig::default())
}
