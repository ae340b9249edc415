use serde::{Deserialize, Serialize};
use std::fmt;

/// The backtest simulator's position state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Flat,
    Long,
    Short,
}

/// Direction of a closed spread trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Long,
    Short,
}

impl TradeDirection {
    /// Sign applied to `exit_spread - entry_spread` when realizing pnl.
    pub fn sign(&self) -> f64 {
        match self {
            TradeDirection::Long => 1.0,
            TradeDirection::Short => -1.0,
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Long => write!(f, "LONG"),
            TradeDirection::Short => write!(f, "SHORT"),
        }
    }
}

/// Policy for bar intervals that received no ticks. With `Omit` the interval
/// is simply absent and downstream consumers handle irregular spacing; with
/// `ForwardFill` interior gaps carry the prior close at zero volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BarFill {
    #[default]
    Omit,
    ForwardFill,
}
