//! Measurement parsing
//!
//! Normalizes a status-coded metric payload into a [`Measurement`]:
//!
//! | status | payload        | count   | value    | shown  |
//! |--------|----------------|---------|----------|--------|
//! | `C`    | `<int>`        | int     | int      | count  |
//! | `T`    | `<float>`      | 1       | duration | avg    |
//! | `S`    | `<float>`      | 1       | sum      | sum    |
//! | `S,C`  | `<int>,<float>`| int     | float    | sum    |
//!
//! `S,C` leaves show-count off even though it carries a count.

use serde::{Deserialize, Serialize};
use tally_common::ParseError;

/// Recognized payload encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// `"C"`: pure count
    #[serde(rename = "C")]
    Count,
    /// `"T"`: single timing sample
    #[serde(rename = "T")]
    Timing,
    /// `"S"`: single sum sample
    #[serde(rename = "S")]
    Sum,
    /// `"S,C"`: `<count>,<sum>` pair, later fields ignored
    #[serde(rename = "S,C")]
    SumCount,
}

impl StatusKind {
    /// Map a raw status code; `None` for anything unrecognized
    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "C" => Some(Self::Count),
            "T" => Some(Self::Timing),
            "S" => Some(Self::Sum),
            "S,C" => Some(Self::SumCount),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "C",
            Self::Timing => "T",
            Self::Sum => "S",
            Self::SumCount => "S,C",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display flags carried by a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayFlags {
    pub show_count: bool,
    pub show_avg: bool,
    pub show_sum: bool,
}

/// One parsed metric sample
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub kind: StatusKind,
    pub count: u64,
    pub value: f64,
    pub flags: DisplayFlags,
}

impl Measurement {
    /// Parse a payload for `status`
    ///
    /// `Ok(None)` means the status is not one of the four encodings and the
    /// event contributes nothing. Counts must be non-negative integers.
    pub fn parse(status: &str, data: &str) -> Result<Option<Self>, ParseError> {
        let Some(kind) = StatusKind::from_status(status) else {
            return Ok(None);
        };

        let measurement = match kind {
            StatusKind::Count => {
                let count = parse_count(data)?;
                Self {
                    kind,
                    count,
                    value: count as f64,
                    flags: DisplayFlags {
                        show_count: true,
                        ..Default::default()
                    },
                }
            }
            StatusKind::Timing => Self {
                kind,
                count: 1,
                value: parse_value(data)?,
                flags: DisplayFlags {
                    show_avg: true,
                    ..Default::default()
                },
            },
            StatusKind::Sum => Self {
                kind,
                count: 1,
                value: parse_value(data)?,
                flags: DisplayFlags {
                    show_sum: true,
                    ..Default::default()
                },
            },
            StatusKind::SumCount => {
                // Fields past the second are ignored.
                let mut fields = data.split(',');
                let (count, sum) = match (fields.next(), fields.next()) {
                    (Some(count), Some(sum)) => (count, sum),
                    _ => {
                        return Err(ParseError::MissingField {
                            status: status.to_string(),
                            payload: data.to_string(),
                        })
                    }
                };
                Self {
                    kind,
                    count: parse_count(count)?,
                    value: parse_value(sum)?,
                    flags: DisplayFlags {
                        show_count: false,
                        show_avg: false,
                        show_sum: true,
                    },
                }
            }
        };

        Ok(Some(measurement))
    }

    /// Default display configuration derived from this sample
    pub fn config(&self, title: impl Into<String>) -> MetricConfig {
        MetricConfig {
            title: title.into(),
            show_count: self.flags.show_count,
            show_avg: self.flags.show_avg,
            show_sum: self.flags.show_sum,
        }
    }
}

/// Display configuration handed to the default-config registrar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricConfig {
    pub title: String,
    pub show_count: bool,
    pub show_avg: bool,
    pub show_sum: bool,
}

fn parse_count(raw: &str) -> Result<u64, ParseError> {
    raw.trim().parse().map_err(|_| ParseError::InvalidCount {
        payload: raw.to_string(),
    })
}

fn parse_value(raw: &str) -> Result<f64, ParseError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::InvalidValue {
            payload: raw.to_string(),
        }),
    }
}
