//! Reading Form
//!
//! Text draft of a reading, its validation into a [`ReadingPayload`], and
//! the create/update submission.

use chrono::{Local, NaiveDateTime, Timelike};
use reqwest::Method;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use super::list::ReadingList;
use super::model::{
    wire_time, HealthMetrics, Reading, ReadingId, ReadingPayload, ReadingType, MAX_SLEEP_HOURS,
};
use crate::client::ClientError;
use crate::session::SessionStore;

pub const READING_ADDED: &str = "Reading added successfully.";
pub const READING_UPDATED: &str = "Reading updated successfully.";
pub const ADD_FAILED: &str = "Unable to add the reading. Please try again.";
pub const UPDATE_FAILED: &str = "Unable to update the reading. Please try again.";

/// Minute-precision local time, the shape of a datetime-local input
const DRAFT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Used instead of [`DRAFT_TIME_FORMAT`] when a stored time has seconds
const PRECISE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Draft text for a stored time; parses back to exactly `value`
fn draft_time(value: &NaiveDateTime) -> String {
    let format = if value.second() == 0 && value.nanosecond() == 0 {
        DRAFT_TIME_FORMAT
    } else {
        PRECISE_TIME_FORMAT
    };
    value.format(format).to_string()
}

/// Editable fields of a reading, kept as the user typed them
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingDraft {
    pub value: String,
    pub reading_type: ReadingType,
    pub recorded_at: String,
    pub notes: String,
    pub step_count: String,
    pub sleep_hours: String,
    pub exercise_minutes: String,
    pub calorie_count: String,
    pub protein_grams: String,
    pub carb_grams: String,
}

impl Default for ReadingDraft {
    fn default() -> Self {
        Self {
            value: String::new(),
            reading_type: ReadingType::default(),
            recorded_at: Local::now().format(DRAFT_TIME_FORMAT).to_string(),
            notes: String::new(),
            step_count: String::new(),
            sleep_hours: String::new(),
            exercise_minutes: String::new(),
            calorie_count: String::new(),
            protein_grams: String::new(),
            carb_grams: String::new(),
        }
    }
}

impl ReadingDraft {
    /// Seed a draft from a stored reading
    pub fn from_reading(reading: &Reading) -> Self {
        fn text<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        let metrics = &reading.metrics;
        Self {
            value: reading.value.to_string(),
            reading_type: reading.reading_type,
            recorded_at: draft_time(&reading.recorded_at),
            notes: reading.notes.clone().unwrap_or_default(),
            step_count: text(metrics.step_count),
            sleep_hours: text(metrics.sleep_hours),
            exercise_minutes: text(metrics.exercise_minutes),
            calorie_count: text(metrics.calorie_count),
            protein_grams: text(metrics.protein_grams),
            carb_grams: text(metrics.carb_grams),
        }
    }
}

/// Whether a submit creates a new reading or replaces an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormMode {
    #[default]
    Create,
    Update(ReadingId),
}

impl FormMode {
    pub fn editing(&self) -> Option<ReadingId> {
        match self {
            FormMode::Create => None,
            FormMode::Update(id) => Some(*id),
        }
    }
}

/// Field-level problems that block a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a valid reading value in mg/dL.")]
    InvalidValue,

    #[error("Sleep hours must be between 0 and 24.")]
    SleepHoursOutOfRange,

    #[error("Please enter a valid date and time for the reading.")]
    InvalidTimestamp,
}

impl ValidationError {
    /// Draft field the error belongs to
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidValue => "value",
            ValidationError::SleepHoursOutOfRange => "sleep_hours",
            ValidationError::InvalidTimestamp => "recorded_at",
        }
    }
}

/// A validated draft
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReading {
    pub payload: ReadingPayload,
    /// Optional metrics that held text but could not be used, and were sent
    /// as absent
    pub discarded: Vec<&'static str>,
}

/// Turn a draft into a payload.
///
/// The glucose value, timestamp and sleep hours block submission when
/// invalid. Any other optional metric that does not parse as a non-negative
/// number is dropped and listed in [`NormalizedReading::discarded`].
pub fn validate(draft: &ReadingDraft) -> Result<NormalizedReading, ValidationError> {
    let value = draft
        .value
        .trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidValue)?;

    let recorded_at =
        wire_time::parse(&draft.recorded_at).ok_or(ValidationError::InvalidTimestamp)?;

    let sleep_hours = match draft.sleep_hours.trim() {
        "" => None,
        raw => match raw.parse::<f64>() {
            Ok(h) if (0.0..=MAX_SLEEP_HOURS).contains(&h) => Some(h),
            _ => return Err(ValidationError::SleepHoursOutOfRange),
        },
    };

    let mut discarded = Vec::new();
    let mut count = |name: &'static str, raw: &str| {
        let parsed = parse_count(raw);
        if parsed.is_none() && !raw.trim().is_empty() {
            discarded.push(name);
        }
        parsed
    };
    let step_count = count("step_count", &draft.step_count);
    let exercise_minutes = count("exercise_minutes", &draft.exercise_minutes);
    let calorie_count = count("calorie_count", &draft.calorie_count);

    let mut amount = |name: &'static str, raw: &str| {
        let parsed = parse_amount(raw);
        if parsed.is_none() && !raw.trim().is_empty() {
            discarded.push(name);
        }
        parsed
    };
    let protein_grams = amount("protein_grams", &draft.protein_grams);
    let carb_grams = amount("carb_grams", &draft.carb_grams);

    let notes = Some(draft.notes.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    Ok(NormalizedReading {
        payload: ReadingPayload {
            value,
            reading_type: draft.reading_type,
            recorded_at,
            notes,
            metrics: HealthMetrics {
                step_count,
                sleep_hours,
                exercise_minutes,
                calorie_count,
                protein_grams,
                carb_grams,
            },
        },
        discarded,
    })
}

/// Whole non-negative number; `"1200"` and `"1200.0"` are both accepted
fn parse_count(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64).then(|| f as u32)
}

/// Finite non-negative number
fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && *f >= 0.0)
}

/// Errors from [`ReadingForm::submit`]
#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("A submission is already in progress")]
    InFlight,

    #[error("{message}")]
    Rejected {
        message: String,
        #[source]
        source: ClientError,
    },
}

/// Result of a successful submit
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub reading: Reading,
    pub mode: FormMode,
    pub message: &'static str,
    pub discarded: Vec<&'static str>,
}

#[derive(Debug, Default)]
struct FormState {
    draft: ReadingDraft,
    mode: FormMode,
}

/// Form state for creating and editing readings
pub struct ReadingForm {
    session: Arc<SessionStore>,
    state: RwLock<FormState>,
    submitting: AtomicBool,
}

/// Held for the duration of one submit; releases the in-flight flag on drop
pub struct SubmitGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl ReadingForm {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self {
            session,
            state: RwLock::new(FormState::default()),
            submitting: AtomicBool::new(false),
        }
    }

    pub async fn draft(&self) -> ReadingDraft {
        self.state.read().await.draft.clone()
    }

    pub async fn mode(&self) -> FormMode {
        self.state.read().await.mode
    }

    /// Edit the draft in place
    pub async fn update_draft(&self, edit: impl FnOnce(&mut ReadingDraft)) {
        edit(&mut self.state.write().await.draft);
    }

    /// Load a stored reading into the draft and switch to update mode
    pub async fn seed(&self, reading: &Reading) {
        let mut state = self.state.write().await;
        state.draft = ReadingDraft::from_reading(reading);
        state.mode = FormMode::Update(reading.id);
    }

    /// Empty draft, create mode
    pub async fn reset(&self) {
        *self.state.write().await = FormState::default();
    }

    pub async fn cancel_edit(&self) {
        self.reset().await;
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Claim the in-flight slot, or `None` when a submit is already running
    pub fn try_begin_submit(&self) -> Option<SubmitGuard<'_>> {
        self.submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmitGuard {
                flag: &self.submitting,
            })
    }

    /// Validate and send the draft, then refresh `list`.
    ///
    /// On success the draft resets to create mode. On failure it is left
    /// untouched so the user can retry.
    pub async fn submit(&self, list: &ReadingList) -> Result<SubmitOutcome, FormError> {
        let _guard = self.try_begin_submit().ok_or(FormError::InFlight)?;

        let (draft, mode) = {
            let state = self.state.read().await;
            (state.draft.clone(), state.mode)
        };
        let normalized = validate(&draft)?;
        if !normalized.discarded.is_empty() {
            tracing::warn!(fields = ?normalized.discarded, "Dropping unparsable optional metrics");
        }

        let (method, path, fallback, message) = match mode {
            FormMode::Create => (Method::POST, "/readings".to_string(), ADD_FAILED, READING_ADDED),
            FormMode::Update(id) => (
                Method::PATCH,
                format!("/readings/{}", id),
                UPDATE_FAILED,
                READING_UPDATED,
            ),
        };

        let reading = self
            .send(method, &path, &normalized.payload)
            .await
            .map_err(|source| FormError::Rejected {
                message: source.message_or(fallback),
                source,
            })?;
        tracing::info!(id = %reading.id, ?mode, "Reading saved");

        let refresh = match mode {
            FormMode::Create => list.load(1).await,
            FormMode::Update(_) => list.reload().await,
        };
        if let Err(e) = refresh {
            tracing::warn!(error = %e, "Failed to refresh readings after save");
        }

        self.reset().await;

        Ok(SubmitOutcome {
            reading,
            mode,
            message,
            discarded: normalized.discarded,
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        payload: &ReadingPayload,
    ) -> Result<Reading, ClientError> {
        let request = self.session.authorized_call(method, path).await?;
        self.session.client().send_json(request.json(payload)).await
    }
}
