use chrono::NaiveDateTime;
use serde_json::Value;

use super::{
    schema::*,
    types::{RequestAction, RequestState},
};

#[derive(AsChangeset, Clone, Debug, Identifiable, PartialEq, Queryable)]
#[changeset_options(treat_none_as_null = "true")]
#[table_name = "publisher_records"]
pub struct Record {
    pub id: i32,
    /// Name of the content type this record belongs to.
    pub content_type: String,
    /// Is this the editable (draft) side of a pair?
    pub is_draft: bool,
    /// The other side of the pair, if it exists.
    pub linked: Option<i32>,
    /// Last content modification.
    pub modified_at: NaiveDateTime,
    /// Date of the first publication. Cleared when unpublished.
    pub published_at: Option<NaiveDateTime>,
    /// Record is not publicly visible before this date.
    pub publication_start: Option<NaiveDateTime>,
    /// Record is not publicly visible from this date on.
    pub publication_end: Option<NaiveDateTime>,
    /// Content-type specific data, as a JSON object.
    pub fields: Value,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "publisher_records"]
pub struct NewRecord<'a> {
    pub content_type: &'a str,
    pub is_draft: bool,
    pub linked: Option<i32>,
    pub modified_at: NaiveDateTime,
    pub published_at: Option<NaiveDateTime>,
    pub publication_start: Option<NaiveDateTime>,
    pub publication_end: Option<NaiveDateTime>,
    pub fields: &'a Value,
}

#[derive(AsChangeset, Clone, Debug, Identifiable, PartialEq, Queryable)]
#[changeset_options(treat_none_as_null = "true")]
#[table_name = "publisher_requests"]
pub struct Request {
    pub id: i32,
    pub action: RequestAction,
    pub state: RequestState,
    /// Content type of the draft this request concerns.
    pub target_type: String,
    /// ID of the draft this request concerns. The draft may no longer exist.
    pub target_id: i32,
    pub request_timestamp: NaiveDateTime,
    pub request_user: i32,
    pub request_note: Option<String>,
    pub response_timestamp: Option<NaiveDateTime>,
    pub response_user: Option<i32>,
    pub response_note: Option<String>,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "publisher_requests"]
pub struct NewRequest<'a> {
    pub action: RequestAction,
    pub state: RequestState,
    pub target_type: &'a str,
    pub target_id: i32,
    pub request_timestamp: NaiveDateTime,
    pub request_user: i32,
    pub request_note: Option<&'a str>,
}
