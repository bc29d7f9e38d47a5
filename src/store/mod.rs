//! Storage of records and approval requests.
//!
//! Available backends:
//! - [`MemoryStore`] - In-process storage for tests and embedders without
//!   a database.
//! - [`PgStore`] - PostgreSQL storage over a diesel connection.

use chrono::NaiveDateTime;
use diesel::result::Error as DbError;
use failure::Fail;
use publisher_macros::From;

use crate::{
    db::models::{NewRecord, NewRequest, Record, Request},
    error::ApiError,
    models::Target,
};

pub mod memory;
pub mod pg;

pub use self::{memory::MemoryStore, pg::PgStore};

/// Persistence operations the publisher is built upon.
///
/// Implementations must make [`Store::transaction`] atomic: if the closure
/// returns an error, none of the writes it made may be observable afterwards.
/// Transactions may nest.
pub trait Store {
    /// Run `f` in a transaction.
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StoreError>;

    /// Find a record by its ID.
    fn record(&self, id: i32) -> Result<Option<Record>, StoreError>;

    /// Find a record by its ID, locking it until the end of the current
    /// transaction.
    fn lock_record(&self, id: i32) -> Result<Option<Record>, StoreError>;

    /// Create a new record.
    fn insert_record(&self, record: NewRecord) -> Result<Record, StoreError>;

    /// Persist all fields of a record.
    fn update_record(&self, record: &Record) -> Result<(), StoreError>;

    /// Delete a record. Links pointing at it are cleared.
    fn delete_record(&self, id: i32) -> Result<(), StoreError>;

    /// List records matching a filter, ordered by ID.
    fn records(&self, filter: &RecordFilter) -> Result<Vec<Record>, StoreError>;

    /// Find an approval request by its ID.
    fn request(&self, id: i32) -> Result<Option<Request>, StoreError>;

    /// Find an approval request by its ID, locking it until the end of the
    /// current transaction.
    fn lock_request(&self, id: i32) -> Result<Option<Request>, StoreError>;

    /// Create a new approval request.
    ///
    /// Fails with [`StoreError::Conflict`] when `request` is open and there
    /// already is an open request for the same target. The check and the
    /// insertion are a single atomic step.
    fn insert_request(&self, request: NewRequest) -> Result<Request, StoreError>;

    /// Persist all fields of an approval request.
    fn update_request(&self, request: &Request) -> Result<(), StoreError>;

    /// List approval requests matching a filter, ordered by ID.
    fn requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError>;
}

/// Selection of records.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordFilter<'a> {
    /// Only records of this content type.
    pub content_type: Option<&'a str>,
    /// Only drafts (`true`) or only published records (`false`).
    pub is_draft: Option<bool>,
    /// Only records whose publication window contains this instant.
    pub visible_at: Option<NaiveDateTime>,
}

impl<'a> RecordFilter<'a> {
    /// Check whether a record is selected by this filter.
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(content_type) = self.content_type {
            if record.content_type != content_type {
                return false;
            }
        }

        if let Some(is_draft) = self.is_draft {
            if record.is_draft != is_draft {
                return false;
            }
        }

        if let Some(at) = self.visible_at {
            if record.publication_start.map_or(false, |start| start > at) {
                return false;
            }
            if record.publication_end.map_or(false, |end| end <= at) {
                return false;
            }
        }

        true
    }
}

/// Selection of approval requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestFilter<'a> {
    /// Only requests concerning this record.
    pub target: Option<&'a Target>,
    /// Only open (`true`) or only closed (`false`) requests.
    pub open: Option<bool>,
}

impl<'a> RequestFilter<'a> {
    /// Check whether a request is selected by this filter.
    pub fn matches(&self, request: &Request) -> bool {
        if let Some(target) = self.target {
            if request.target_type != target.content_type
            || request.target_id != target.id {
                return false;
            }
        }

        if let Some(open) = self.open {
            if request.state.is_open() != open {
                return false;
            }
        }

        true
    }
}

#[derive(ApiError, Debug, Fail, From)]
pub enum StoreError {
    /// Database error.
    #[fail(display = "Database error: {}", _0)]
    #[api(internal)]
    Database(#[cause] #[from] DbError),
    /// An open request already exists for a record.
    #[fail(display = "There already is an open request for {} #{}", _0, _1)]
    #[api(code = "request:open-request-exists", kind = "Invalid")]
    Conflict(String, i32),
    /// Row to update or delete doesn't exist.
    #[fail(display = "{} #{} does not exist", _0, _1)]
    #[api(code = "store:missing", kind = "NotFound")]
    Missing(&'static str, i32),
}
