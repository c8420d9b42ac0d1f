//! Directional signal evaluation: multi-timeframe trend alignment and the
//! breakout/pullback entry trigger.

mod trend;
mod trigger;

pub use trend::{trend_score, TrendScore};
pub use trigger::trigger_at_index;

use serde::{Deserialize, Serialize};

/// Trade direction under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn is_long(self) -> bool {
        matches!(self, Self::Long)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => f.write_str("LONG"),
            Self::Short => f.write_str("SHORT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Long.to_string(), "LONG");
        assert_eq!(Side::Short.to_string(), "SHORT");
    }

    #[test]
    fn test_side_serde_uppercase() {
        assert_eq!(serde_json::to_string(&Side::Long).unwrap(), "\"LONG\"");
        let side: Side = serde_json::from_str("\"SHORT\"").unwrap();
        assert_eq!(side, Side::Short);
    }
}
