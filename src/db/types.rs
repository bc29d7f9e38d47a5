use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};

use std::fmt;

/// What an approval request asks for.
#[derive(Clone, Copy, DbEnum, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[PgType = "publisher_request_action"]
#[DieselType = "Request_action"]
#[serde(rename_all = "kebab-case")]
pub enum RequestAction {
    /// Make the current draft public.
    Publish,
    /// Remove the public copy.
    Unpublish,
}

/// Lifecycle state of an approval request.
///
/// Requests start in [`RequestState::Request`] and move exactly once, to one
/// of the other (terminal) states.
#[derive(Clone, Copy, DbEnum, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[PgType = "publisher_request_state"]
#[DieselType = "Request_state"]
#[serde(rename_all = "kebab-case")]
pub enum RequestState {
    /// Waiting for a response.
    Request,
    /// Refused by a responder.
    Rejected,
    /// Accepted by a responder, and the action carried out.
    Accepted,
    /// Closed because its target was deleted while it was open.
    Done,
}

impl RequestState {
    /// Is this the only state from which a request can still move?
    pub fn is_open(self) -> bool {
        self == RequestState::Request
    }
}

impl fmt::Display for RequestAction {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match *self {
            RequestAction::Publish => "publish",
            RequestAction::Unpublish => "unpublish",
        })
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match *self {
            RequestState::Request => "request",
            RequestState::Rejected => "rejected",
            RequestState::Accepted => "accepted",
            RequestState::Done => "done",
        })
    }
}
