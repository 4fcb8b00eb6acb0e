//! Dashboard
//!
//! Form and list wired to one session, with a single feedback slot for the
//! outcome of the last action.

use std::sync::Arc;
use tokio::sync::RwLock;

use super::form::{FormError, ReadingForm};
use super::list::{Confirm, DeleteOutcome, ListError, ReadingList, READING_DELETED};
use super::model::{Reading, ReadingId};
use crate::session::SessionStore;

/// Outcome text of the last dashboard action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feedback {
    pub success: Option<String>,
    pub error: Option<String>,
    /// Set when a save went through but some optional metrics were dropped
    pub warning: Option<String>,
}

impl Feedback {
    fn success(text: impl Into<String>) -> Self {
        Self {
            success: Some(text.into()),
            ..Self::default()
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            ..Self::default()
        }
    }
}

pub struct Dashboard {
    session: Arc<SessionStore>,
    form: ReadingForm,
    list: ReadingList,
    feedback: RwLock<Feedback>,
}

impl Dashboard {
    pub fn new(session: Arc<SessionStore>, page_size: u32) -> Self {
        Self {
            form: ReadingForm::new(session.clone()),
            list: ReadingList::new(session.clone(), page_size),
            session,
            feedback: RwLock::new(Feedback::default()),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn form(&self) -> &ReadingForm {
        &self.form
    }

    pub fn list(&self) -> &ReadingList {
        &self.list
    }

    pub async fn feedback(&self) -> Feedback {
        self.feedback.read().await.clone()
    }

    pub async fn clear_feedback(&self) {
        *self.feedback.write().await = Feedback::default();
    }

    async fn set_feedback(&self, feedback: Feedback) {
        *self.feedback.write().await = feedback;
    }

    /// `"Ada's glucose overview"`, or a neutral title without a name
    pub async fn greeting(&self) -> String {
        let first_name = self.session.user().await.and_then(|user| {
            user.full_name
                .as_deref()
                .and_then(|name| name.split_whitespace().next())
                .map(str::to_string)
        });
        match first_name {
            Some(name) => format!("{}'s glucose overview", name),
            None => "Gluco overview".to_string(),
        }
    }

    /// Restore the session, then show the first page
    pub async fn load(&self) {
        self.session.restore().await;
        self.show_page(1).await;
    }

    pub async fn refresh(&self) {
        let result = self.list.reload().await;
        self.report_load(result).await;
    }

    pub async fn next_page(&self) {
        if let Some(page) = self.list.pager().await.next_page() {
            self.show_page(page).await;
        }
    }

    pub async fn previous_page(&self) {
        if let Some(page) = self.list.pager().await.previous_page() {
            self.show_page(page).await;
        }
    }

    async fn show_page(&self, page: u32) {
        let result = self.list.load(page).await;
        self.report_load(result).await;
    }

    /// A failed load replaces the feedback; a good one clears a stale error
    async fn report_load(&self, result: Result<(), ListError>) {
        match result {
            Ok(()) => self.feedback.write().await.error = None,
            Err(e) => self.set_feedback(Feedback::error(e.to_string())).await,
        }
    }

    /// Submit the form. Returns whether the reading was saved.
    pub async fn submit(&self) -> bool {
        match self.form.submit(&self.list).await {
            Ok(outcome) => {
                let mut feedback = Feedback::success(outcome.message);
                if !outcome.discarded.is_empty() {
                    feedback.warning = Some(format!(
                        "Ignored invalid values for: {}",
                        outcome.discarded.join(", ")
                    ));
                }
                self.set_feedback(feedback).await;
                true
            }
            // a second click while saving is not an error worth showing
            Err(FormError::InFlight) => false,
            Err(e) => {
                self.set_feedback(Feedback::error(e.to_string())).await;
                false
            }
        }
    }

    pub async fn edit(&self, reading: &Reading) {
        self.list.edit_request(reading, &self.form).await;
        self.clear_feedback().await;
    }

    pub async fn cancel_edit(&self) {
        self.form.cancel_edit().await;
    }

    /// Delete after confirmation. Returns whether the reading was removed.
    pub async fn delete(&self, id: ReadingId, confirm: &dyn Confirm) -> bool {
        match self.list.delete_request(id, confirm, &self.form).await {
            Ok(DeleteOutcome::Deleted) => {
                self.set_feedback(Feedback::success(READING_DELETED)).await;
                true
            }
            Ok(DeleteOutcome::Cancelled) => false,
            Err(e) => {
                self.set_feedback(Feedback::error(e.to_string())).await;
                false
            }
        }
    }
}
