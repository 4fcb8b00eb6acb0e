//! Reading List / Pager
//!
//! One page of the user's readings, plus the edit and delete actions on
//! its rows. Every mutation is followed by a reload from the server.

use reqwest::Method;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::RwLock;

use super::form::ReadingForm;
use super::model::{FilterError, Reading, ReadingFilter, ReadingId, ReadingPage};
use crate::client::ClientError;
use crate::session::SessionStore;

pub const CONFIRM_DELETE: &str =
    "Are you sure you want to delete this reading? This action cannot be undone.";
pub const LOAD_FAILED: &str = "Unable to load readings.";
pub const FETCH_FAILED: &str = "Unable to load the reading.";
pub const DELETE_FAILED: &str = "Unable to delete the reading. Please try again.";
pub const READING_DELETED: &str = "Reading deleted successfully.";

/// Pagination arithmetic for a 1-based page index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl Pager {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) * u64::from(self.page_size) < self.total
    }

    /// Number of pages, at least 1
    pub fn page_count(&self) -> u32 {
        let size = u64::from(self.page_size.max(1));
        (self.total.div_ceil(size)).max(1) as u32
    }

    pub fn next_page(&self) -> Option<u32> {
        self.has_next().then(|| self.page + 1)
    }

    pub fn previous_page(&self) -> Option<u32> {
        self.has_previous().then(|| self.page - 1)
    }
}

/// Asks the user to confirm a destructive action
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Errors from list operations
#[derive(Debug, Error)]
pub enum ListError {
    #[error("{message}")]
    Request {
        message: String,
        #[source]
        source: ClientError,
    },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Reading {0} is already being deleted")]
    DeleteInFlight(ReadingId),
}

impl ListError {
    fn request(source: ClientError, fallback: &str) -> Self {
        ListError::Request {
            message: source.message_or(fallback),
            source,
        }
    }
}

/// What a delete request ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The user declined the confirmation; nothing was sent
    Cancelled,
    Deleted,
}

/// Cached page of readings
#[derive(Debug, Clone, PartialEq)]
pub struct ListState {
    pub readings: Vec<Reading>,
    pub total: u64,
    pub page: u32,
    pub loading: bool,
}

impl Default for ListState {
    fn default() -> Self {
        Self {
            readings: Vec::new(),
            total: 0,
            page: 1,
            loading: false,
        }
    }
}

/// Paginated list of the signed-in user's readings
pub struct ReadingList {
    session: Arc<SessionStore>,
    page_size: u32,
    state: RwLock<ListState>,
    filter: RwLock<ReadingFilter>,
    pending_deletes: Mutex<HashSet<ReadingId>>,
}

/// Marks one row as being deleted until dropped
pub struct DeleteGuard<'a> {
    pending: &'a Mutex<HashSet<ReadingId>>,
    id: ReadingId,
}

impl Drop for DeleteGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl ReadingList {
    pub fn new(session: Arc<SessionStore>, page_size: u32) -> Self {
        Self {
            session,
            page_size: page_size.max(1),
            state: RwLock::new(ListState::default()),
            filter: RwLock::new(ReadingFilter::default()),
            pending_deletes: Mutex::new(HashSet::new()),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub async fn snapshot(&self) -> ListState {
        self.state.read().await.clone()
    }

    pub async fn pager(&self) -> Pager {
        let state = self.state.read().await;
        Pager {
            page: state.page,
            page_size: self.page_size,
            total: state.total,
        }
    }

    pub async fn filter(&self) -> ReadingFilter {
        self.filter.read().await.clone()
    }

    /// Replace the filter used by later loads
    pub async fn set_filter(&self, filter: ReadingFilter) -> Result<(), FilterError> {
        filter.validate()?;
        *self.filter.write().await = filter;
        Ok(())
    }

    /// Fetch `page` and replace the cached page with it.
    ///
    /// Without a signed-in user the list is emptied and nothing is sent.
    pub async fn load(&self, page: u32) -> Result<(), ListError> {
        let page = page.max(1);

        if !self.session.is_authenticated().await {
            *self.state.write().await = ListState::default();
            return Ok(());
        }

        self.state.write().await.loading = true;
        let result = self.fetch_page(page).await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(data) => {
                tracing::debug!(page, total = data.total, count = data.readings.len(), "Loaded readings");
                state.readings = data.readings;
                state.total = data.total;
                state.page = page;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(page, error = %e, "Failed to load readings");
                state.readings.clear();
                state.total = 0;
                Err(ListError::request(e, LOAD_FAILED))
            }
        }
    }

    /// Load the current page again
    pub async fn reload(&self) -> Result<(), ListError> {
        let page = self.state.read().await.page;
        self.load(page).await
    }

    async fn fetch_page(&self, page: u32) -> Result<ReadingPage, ClientError> {
        let filter = self.filter.read().await.query_pairs();
        let request = self
            .session
            .authorized_call(Method::GET, "/readings")
            .await?
            .query(&[("page", page), ("size", self.page_size)])
            .query(&filter);
        self.session.client().send_json(request).await
    }

    /// Fetch a single reading by id
    pub async fn get(&self, id: ReadingId) -> Result<Reading, ListError> {
        self.fetch_reading(id)
            .await
            .map_err(|e| ListError::request(e, FETCH_FAILED))
    }

    async fn fetch_reading(&self, id: ReadingId) -> Result<Reading, ClientError> {
        let path = format!("/readings/{}", id);
        let request = self.session.authorized_call(Method::GET, &path).await?;
        self.session.client().send_json(request).await
    }

    /// Copy `reading` into the form and switch it to update mode
    pub async fn edit_request(&self, reading: &Reading, form: &ReadingForm) {
        form.seed(reading).await;
    }

    /// A delete for `id` is outstanding
    pub fn is_delete_pending(&self, id: ReadingId) -> bool {
        self.pending_deletes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Mark `id` as being deleted, or `None` when it already is
    pub fn try_begin_delete(&self, id: ReadingId) -> Option<DeleteGuard<'_>> {
        let inserted = self
            .pending_deletes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        inserted.then(|| DeleteGuard {
            pending: &self.pending_deletes,
            id,
        })
    }

    /// Delete a reading after the user confirms, then reload the current page.
    ///
    /// If `form` was editing that reading its draft is reset.
    pub async fn delete_request(
        &self,
        id: ReadingId,
        confirm: &dyn Confirm,
        form: &ReadingForm,
    ) -> Result<DeleteOutcome, ListError> {
        if self.is_delete_pending(id) {
            return Err(ListError::DeleteInFlight(id));
        }
        if !confirm.confirm(CONFIRM_DELETE) {
            return Ok(DeleteOutcome::Cancelled);
        }
        let _guard = self
            .try_begin_delete(id)
            .ok_or(ListError::DeleteInFlight(id))?;

        self.send_delete(id)
            .await
            .map_err(|e| ListError::request(e, DELETE_FAILED))?;
        tracing::info!(%id, "Reading deleted");

        if form.mode().await.editing() == Some(id) {
            form.reset().await;
        }

        if let Err(e) = self.reload().await {
            tracing::warn!(error = %e, "Failed to refresh readings after delete");
        }

        Ok(DeleteOutcome::Deleted)
    }

    async fn send_delete(&self, id: ReadingId) -> Result<(), ClientError> {
        let path = format!("/readings/{}", id);
        let request = self.session.authorized_call(Method::DELETE, &path).await?;
        self.session.client().send_empty(request).await
    }
}
