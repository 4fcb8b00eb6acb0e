//! Reading data model
//!
//! Wire shapes for `/readings`. Field names on the wire follow the backend
//! (`value_ng_ml`, `created_at`, `protein_intake_g`, ...); the Rust names
//! follow what the values mean.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound for `sleep_hours`
pub const MAX_SLEEP_HOURS: f64 = 24.0;

/// Server-assigned reading identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadingId(pub i64);

impl fmt::Display for ReadingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReadingId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ReadingId)
    }
}

/// When the reading was taken relative to meals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingType {
    #[default]
    Fasting,
    #[serde(rename = "pp")]
    Postprandial,
    Random,
}

impl ReadingType {
    pub const ALL: [ReadingType; 3] = [
        ReadingType::Fasting,
        ReadingType::Postprandial,
        ReadingType::Random,
    ];

    /// Value sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingType::Fasting => "fasting",
            ReadingType::Postprandial => "pp",
            ReadingType::Random => "random",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            ReadingType::Fasting => "Fasting",
            ReadingType::Postprandial => "Postprandial",
            ReadingType::Random => "Random",
        }
    }
}

impl fmt::Display for ReadingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown reading type: {0} (expected fasting, pp or random)")]
pub struct UnknownReadingType(pub String);

impl FromStr for ReadingType {
    type Err = UnknownReadingType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fasting" => Ok(ReadingType::Fasting),
            "pp" | "postprandial" => Ok(ReadingType::Postprandial),
            "random" => Ok(ReadingType::Random),
            _ => Err(UnknownReadingType(s.to_string())),
        }
    }
}

/// Optional lifestyle and nutrition metrics attached to a reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    #[serde(default)]
    pub step_count: Option<u32>,
    #[serde(default)]
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub exercise_minutes: Option<u32>,
    #[serde(default)]
    pub calorie_count: Option<u32>,
    #[serde(default, rename = "protein_intake_g")]
    pub protein_grams: Option<f64>,
    #[serde(default, rename = "carb_intake_g")]
    pub carb_grams: Option<f64>,
}

impl HealthMetrics {
    pub fn is_empty(&self) -> bool {
        *self == HealthMetrics::default()
    }
}

/// A stored glucose reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: ReadingId,
    /// Glucose concentration in mg/dL
    #[serde(rename = "value_ng_ml")]
    pub value: u32,
    pub reading_type: ReadingType,
    #[serde(rename = "created_at", with = "wire_time")]
    pub recorded_at: NaiveDateTime,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub metrics: HealthMetrics,
}

/// Body of `POST /readings` and `PATCH /readings/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPayload {
    #[serde(rename = "value_ng_ml")]
    pub value: u32,
    pub reading_type: ReadingType,
    #[serde(rename = "created_at", with = "wire_time")]
    pub recorded_at: NaiveDateTime,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub metrics: HealthMetrics,
}

impl ReadingPayload {
    /// Attach a server id, as the backend does on create
    pub fn into_reading(self, id: ReadingId) -> Reading {
        Reading {
            id,
            value: self.value,
            reading_type: self.reading_type,
            recorded_at: self.recorded_at,
            notes: self.notes,
            metrics: self.metrics,
        }
    }
}

/// One page of `GET /readings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPage {
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    pub readings: Vec<Reading>,
}

/// Inclusive bounds on one metric
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: PartialOrd + Copy + fmt::Display> Bounds<T> {
    pub fn new(min: Option<T>, max: Option<T>) -> Self {
        Self { min, max }
    }

    fn is_inverted(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min > max)
    }

    fn push_pairs(&self, field: &str, pairs: &mut Vec<(String, String)>) {
        if let Some(min) = self.min {
            pairs.push((format!("min_{}", field), min.to_string()));
        }
        if let Some(max) = self.max {
            pairs.push((format!("max_{}", field), max.to_string()));
        }
    }
}

/// Errors in a [`ReadingFilter`], caught before any request is made
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("min_{0} must be less than or equal to max_{0}")]
    InvertedBounds(&'static str),

    #[error("Sleep hours filter must be between 0 and 24")]
    SleepHoursOutOfRange,

    #[error("start must not be after end")]
    InvertedTimeRange,
}

/// Query filters supported by `GET /readings`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingFilter {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub reading_type: Option<ReadingType>,
    pub step_count: Bounds<u32>,
    pub sleep_hours: Bounds<f64>,
    pub exercise_minutes: Bounds<u32>,
    pub calorie_count: Bounds<u32>,
    pub protein_grams: Bounds<f64>,
    pub carb_grams: Bounds<f64>,
}

impl ReadingFilter {
    pub fn is_empty(&self) -> bool {
        *self == ReadingFilter::default()
    }

    /// Reject filters the backend would answer with 400 anyway
    pub fn validate(&self) -> Result<(), FilterError> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(FilterError::InvertedTimeRange);
            }
        }

        let sleep_ok = |v: Option<f64>| v.map_or(true, |h| (0.0..=MAX_SLEEP_HOURS).contains(&h));
        if !sleep_ok(self.sleep_hours.min) || !sleep_ok(self.sleep_hours.max) {
            return Err(FilterError::SleepHoursOutOfRange);
        }

        let inverted = [
            ("step_count", self.step_count.is_inverted()),
            ("sleep_hours", self.sleep_hours.is_inverted()),
            ("exercise_minutes", self.exercise_minutes.is_inverted()),
            ("calorie_count", self.calorie_count.is_inverted()),
            ("protein_intake_g", self.protein_grams.is_inverted()),
            ("carb_intake_g", self.carb_grams.is_inverted()),
        ];
        match inverted.into_iter().find(|(_, bad)| *bad) {
            Some((field, _)) => Err(FilterError::InvertedBounds(field)),
            None => Ok(()),
        }
    }

    /// Query parameters in the backend's naming
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        if let Some(start) = self.start {
            pairs.push(("start".to_string(), wire_time::format(&start)));
        }
        if let Some(end) = self.end {
            pairs.push(("end".to_string(), wire_time::format(&end)));
        }
        if let Some(reading_type) = self.reading_type {
            pairs.push(("reading_type".to_string(), reading_type.as_str().to_string()));
        }

        self.step_count.push_pairs("step_count", &mut pairs);
        self.sleep_hours.push_pairs("sleep_hours", &mut pairs);
        self.calorie_count.push_pairs("calorie_count", &mut pairs);
        self.protein_grams.push_pairs("protein_intake_g", &mut pairs);
        self.carb_grams.push_pairs("carb_intake_g", &mut pairs);
        self.exercise_minutes.push_pairs("exercise_minutes", &mut pairs);

        pairs
    }
}

/// Timestamp encoding used by the backend.
///
/// Outgoing values are naive ISO 8601, with a fraction only when the value
/// has one. Incoming values may be naive or carry an offset; offsets are
/// normalized to UTC.
pub mod wire_time {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    pub fn format(value: &NaiveDateTime) -> String {
        value.format(OUTPUT_FORMAT).to_string()
    }

    /// Parse any timestamp shape the backend or a user is likely to produce
    pub fn parse(value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.naive_utc());
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}

/// Format a reading timestamp for display, e.g. `Mar 4, 2025 08:30`
pub fn format_recorded_at(value: &NaiveDateTime) -> String {
    value.format("%b %-d, %Y %H:%M").to_string()
}

/// Format an optional metric: whole numbers without decimals, the rest to
/// one decimal place, `—` when absent.
pub fn format_metric(value: Option<f64>) -> String {
    match value {
        None => "—".to_string(),
        Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => format!("{:.1}", v),
    }
}
