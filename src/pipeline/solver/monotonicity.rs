//! Monotonic trend of event rate across bins
//!
//! Used both as a MIP constraint by the supervised split finder and as the
//! target direction of the refinement monotonicity pass.

use serde::Serialize;

use crate::error::{BinningError, Result};

/// Required direction of the event rate as the bin index increases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    /// Event rate never decreases (higher values = higher risk)
    Ascending,
    /// Event rate never increases (higher values = lower risk)
    Descending,
}

impl Trend {
    /// Parse an optional trend literal where `none` disables the constraint
    pub fn from_literal(s: &str) -> Result<Option<Trend>> {
        if s.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        s.parse::<Trend>()
            .map(Some)
            .map_err(BinningError::InvalidConfiguration)
    }

    /// Whether the step `from -> to` goes against this trend
    #[inline]
    pub fn is_violated_by(self, from: f64, to: f64) -> bool {
        match self {
            Trend::Ascending => to < from,
            Trend::Descending => to > from,
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Ascending => write!(f, "ascending"),
            Trend::Descending => write!(f, "descending"),
        }
    }
}

impl std::str::FromStr for Trend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ascending" | "asc" => Ok(Trend::Ascending),
            "descending" | "desc" => Ok(Trend::Descending),
            _ => Err(format!(
                "Unknown trend: '{}'. Use 'ascending' or 'descending'.",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_from_str() {
        assert_eq!("ascending".parse::<Trend>().unwrap(), Trend::Ascending);
        assert_eq!("asc".parse::<Trend>().unwrap(), Trend::Ascending);
        assert_eq!("DESC".parse::<Trend>().unwrap(), Trend::Descending);
        assert!("peak".parse::<Trend>().is_err());
    }

    #[test]
    fn test_trend_display() {
        assert_eq!(Trend::Ascending.to_string(), "ascending");
        assert_eq!(Trend::Descending.to_string(), "descending");
    }

    #[test]
    fn test_from_literal() {
        assert_eq!(Trend::from_literal("none").unwrap(), None);
        assert_eq!(Trend::from_literal("ascending").unwrap(), Some(Trend::Ascending));
        assert!(matches!(
            Trend::from_literal("sideways"),
            Err(BinningError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_violation() {
        assert!(Trend::Ascending.is_violated_by(0.5, 0.1));
        assert!(!Trend::Ascending.is_violated_by(0.1, 0.1));
        assert!(Trend::Descending.is_violated_by(0.1, 0.5));
    }
}
