// =============================================================================
// Indicator request strings
// =============================================================================
//
// Grammar (case-insensitive name, whitespace around tokens ignored):
//
//   spec   := NAME | NAME "(" params ")"
//   params := [int] { "," [int] }
//
// Empty parameter tokens are skipped, so "SMA()" and "MACD(12,,9)" parse.
// Unknown names are not a parse error; they are carried as
// `IndicatorKind::Unknown` and rejected by the engine.
// =============================================================================

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Which indicator a request refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    Macd,
    /// Upper-cased name that matched no supported indicator.
    Unknown(String),
}

impl IndicatorKind {
    /// Resolve an already upper-cased indicator name.
    fn from_name(name: &str) -> Self {
        match name {
            "SMA" => Self::Sma,
            "EMA" => Self::Ema,
            "RSI" => Self::Rsi,
            "MACD" => Self::Macd,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Sma => "SMA",
            Self::Ema => "EMA",
            Self::Rsi => "RSI",
            Self::Macd => "MACD",
            Self::Unknown(name) => name,
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a request string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("missing ')' in indicator spec")]
    MissingCloseParen,

    #[error("')' without a matching '(' in indicator spec")]
    UnexpectedCloseParen,

    #[error("unexpected text after ')': {0:?}")]
    TrailingInput(String),

    #[error("parameter {0:?} is not an integer")]
    InvalidParameter(String),
}

/// A parsed indicator request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSpec {
    kind: IndicatorKind,
    params: Vec<i64>,
    label: String,
}

impl IndicatorSpec {
    /// Parse a request such as `"ema(50)"` or `"MACD(12, 26, 9)"`.
    ///
    /// The label keeps `input` verbatim; only the kind is upper-cased.
    pub fn parse(input: &str) -> Result<Self, SpecError> {
        let trimmed = input.trim();

        let (name, params) = match trimmed.find('(') {
            None => {
                if trimmed.contains(')') {
                    return Err(SpecError::UnexpectedCloseParen);
                }
                (trimmed, Vec::new())
            }
            Some(open) => {
                let rest = &trimmed[open + 1..];
                let close = rest.find(')').ok_or(SpecError::MissingCloseParen)?;

                let trailing = rest[close + 1..].trim();
                if !trailing.is_empty() {
                    return Err(SpecError::TrailingInput(trailing.to_string()));
                }

                (trimmed[..open].trim(), parse_params(&rest[..close])?)
            }
        };

        Ok(Self {
            kind: IndicatorKind::from_name(&name.to_uppercase()),
            params,
            label: input.to_string(),
        })
    }

    pub fn kind(&self) -> &IndicatorKind {
        &self.kind
    }

    pub fn params(&self) -> &[i64] {
        &self.params
    }

    /// The original request string.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Parameter at `index`, or `default` when the request left it out.
    pub fn param_or(&self, index: usize, default: i64) -> i64 {
        self.params.get(index).copied().unwrap_or(default)
    }
}

impl FromStr for IndicatorSpec {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical form: `KIND` or `KIND(p1,p2,...)`.
impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.params.is_empty() {
            let joined: Vec<String> = self.params.iter().map(i64::to_string).collect();
            write!(f, "({})", joined.join(","))?;
        }
        Ok(())
    }
}

fn parse_params(inner: &str) -> Result<Vec<i64>, SpecError> {
    inner
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<i64>()
                .map_err(|_| SpecError::InvalidParameter(token.to_string()))
        })
        .collect()
}
