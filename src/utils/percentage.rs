use std::{fmt::Display, ops::Deref, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Value in the range `[0, 100]`. Used for every progress figure shown to the user and for the
/// streak threshold.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0.round())
    }
}

impl Percentage {
    pub const ZERO: Percentage = Percentage(0.);

    pub fn new_opt(value: f64) -> Option<Percentage> {
        if (0. ..=100.).contains(&value) {
            Some(Percentage(value))
        } else {
            None
        }
    }

    /// `completed / expected` as a percentage. Nothing expected means nothing done.
    pub fn of(completed: usize, expected: usize) -> Percentage {
        if expected == 0 {
            return Percentage::ZERO;
        }
        Percentage((completed.min(expected) as f64 / expected as f64) * 100.)
    }
}

impl TryFrom<f64> for Percentage {
    type Error = anyhow::Error;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Percentage::new_opt(value).ok_or_else(|| anyhow!("{value} is not a percentage"))
    }
}

impl From<Percentage> for f64 {
    fn from(value: Percentage) -> Self {
        value.0
    }
}

impl FromStr for Percentage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // This means that 100%% also works, but I think I'm fine with that
        let s = s.trim_end_matches("%");
        let v = s.parse::<f64>()?;
        Percentage::new_opt(v).ok_or_else(|| anyhow!("Can't parse {s} into percentage"))
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Unweighted mean of several percentages.
pub fn mean(values: &[Percentage]) -> Percentage {
    if values.is_empty() {
        return Percentage::ZERO;
    }
    Percentage(values.iter().map(|v| v.0).sum::<f64>() / values.len() as f64)
}
