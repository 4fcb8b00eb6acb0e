//! Glucose readings
//!
//! - [`model`]: wire types and filters
//! - [`ReadingForm`]: draft, validation and create/update
//! - [`ReadingList`]: one cached page, edit and delete
//! - [`Dashboard`]: both of the above over one session

mod dashboard;
mod form;
mod list;
pub mod model;

pub use dashboard::{Dashboard, Feedback};
pub use form::{
    validate, FormError, FormMode, NormalizedReading, ReadingDraft, ReadingForm, SubmitGuard,
    SubmitOutcome, ValidationError, ADD_FAILED, READING_ADDED, READING_UPDATED, UPDATE_FAILED,
};
pub use list::{
    Confirm, DeleteGuard, DeleteOutcome, ListError, ListState, Pager, ReadingList,
    CONFIRM_DELETE, DELETE_FAILED, FETCH_FAILED, LOAD_FAILED, READING_DELETED,
};
pub use model::{
    Bounds, FilterError, HealthMetrics, Reading, ReadingFilter, ReadingId, ReadingPage,
    ReadingPayload, ReadingType,
};
