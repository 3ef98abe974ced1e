//! Score borders for range queries
//!
//! `1.5` is inclusive, `(1.5` exclusive, `-inf` / `+inf` unbounded.

use std::fmt;

use crate::error::ReplyError;

/// One end of a score range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBorder {
    pub value: f64,
    pub exclude: bool,
}

impl ScoreBorder {
    pub const NEG_INF: ScoreBorder = ScoreBorder {
        value: f64::NEG_INFINITY,
        exclude: false,
    };

    pub const POS_INF: ScoreBorder = ScoreBorder {
        value: f64::INFINITY,
        exclude: false,
    };

    pub fn inclusive(value: f64) -> Self {
        Self {
            value,
            exclude: false,
        }
    }

    pub fn exclusive(value: f64) -> Self {
        Self {
            value,
            exclude: true,
        }
    }

    /// Parse a border argument
    pub fn parse(text: &str) -> Result<Self, ReplyError> {
        let invalid = || ReplyError::Argument("min or max is not a float".to_string());
        let (exclude, number) = match text.strip_prefix('(') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let value = match number.to_ascii_lowercase().as_str() {
            "-inf" => f64::NEG_INFINITY,
            "+inf" | "inf" => f64::INFINITY,
            other => other.parse::<f64>().map_err(|_| invalid())?,
        };
        if value.is_nan() {
            return Err(invalid());
        }
        Ok(Self { value, exclude })
    }

    /// `score` lies on the upper side of this border used as a minimum
    pub fn admits_above(&self, score: f64) -> bool {
        if self.exclude {
            self.value < score
        } else {
            self.value <= score
        }
    }

    /// `score` lies on the lower side of this border used as a maximum
    pub fn admits_below(&self, score: f64) -> bool {
        if self.exclude {
            self.value > score
        } else {
            self.value >= score
        }
    }

    /// True when no score can satisfy `[min, max]`
    pub fn is_empty_range(min: &ScoreBorder, max: &ScoreBorder) -> bool {
        min.value > max.value || (min.value == max.value && (min.exclude || max.exclude))
    }
}

impl fmt::Display for ScoreBorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exclude {
            write!(f, "(")?;
        }
        if self.value == f64::INFINITY {
            write!(f, "+inf")
        } else if self.value == f64::NEG_INFINITY {
            write!(f, "-inf")
        } else {
            write!(f, "{}", self.value)
        }
    }
}
