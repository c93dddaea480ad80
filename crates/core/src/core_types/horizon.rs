//! Forecast horizons
//!
//! The horizon key set is fixed: the current hour plus four hourly steps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A discrete forecast look-ahead step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    /// Current hour
    #[serde(rename = "t0")]
    T0,
    /// One hour ahead
    #[serde(rename = "t+1")]
    T1,
    /// Two hours ahead
    #[serde(rename = "t+2")]
    T2,
    /// Three hours ahead
    #[serde(rename = "t+3")]
    T3,
    /// Four hours ahead
    #[serde(rename = "t+4")]
    T4,
}

impl Horizon {
    /// Every horizon in look-ahead order.
    pub const ALL: [Horizon; 5] = [
        Horizon::T0,
        Horizon::T1,
        Horizon::T2,
        Horizon::T3,
        Horizon::T4,
    ];

    /// Key used in snapshots and query output.
    pub const fn key(self) -> &'static str {
        match self {
            Self::T0 => "t0",
            Self::T1 => "t+1",
            Self::T2 => "t+2",
            Self::T3 => "t+3",
            Self::T4 => "t+4",
        }
    }

    /// Column name used by forecast tables.
    pub const fn column(self) -> &'static str {
        match self {
            Self::T0 => "NO2_t",
            Self::T1 => "NO2_T+1",
            Self::T2 => "NO2_T+2",
            Self::T3 => "NO2_T+3",
            Self::T4 => "NO2_T+4",
        }
    }

    /// Hours ahead of the current hour.
    pub const fn offset_hours(self) -> u32 {
        match self {
            Self::T0 => 0,
            Self::T1 => 1,
            Self::T2 => 2,
            Self::T3 => 3,
            Self::T4 => 4,
        }
    }

    /// Position in [`Horizon::ALL`].
    pub const fn index(self) -> usize {
        self.offset_hours() as usize
    }

    /// Parse either a snapshot key (`t+2`) or a table column (`NO2_T+2`).
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|h| h.key() == s || h.column() == s)
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
