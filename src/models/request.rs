use chrono::Utc;
use failure::Fail;
use std::{fmt, ops::Deref};

use crate::{
    ApiError,
    From,
    db::{
        models::{self as db, NewRequest},
        types::{RequestAction, RequestState},
    },
    permissions::{
        AskRequest,
        Permission,
        PermissionGate,
        Publish,
        RequirePermissionsError,
    },
    store::{RequestFilter, Store, StoreError},
};
use super::{
    Publisher,
    Record,
    Target,
    publisher::{PublishError, PublishOutcome, assert_draft},
    record::FindRecordError,
};

/// A request to publish or unpublish a draft, and its outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    data: db::Request,
}

impl Request {
    /// Construct `Request` from its database counterpart.
    pub(crate) fn from_db(data: db::Request) -> Request {
        Request { data }
    }

    /// Get the underlying model.
    pub fn into_db(self) -> db::Request {
        self.data
    }

    /// Find a request by ID.
    pub fn by_id<S: Store>(store: &S, id: i32) -> Result<Request, RequestError> {
        store.request(id)?
            .map(Request::from_db)
            .ok_or(RequestError::NotFound(id))
    }

    /// Get all requests.
    pub fn all<S: Store>(store: &S) -> Result<Vec<Request>, StoreError> {
        Request::query(store, RequestFilter::default())
    }

    /// Get all open requests, regardless of their target.
    pub fn all_open<S: Store>(store: &S) -> Result<Vec<Request>, StoreError> {
        Request::query(store, RequestFilter {
            open: Some(true),
            ..RequestFilter::default()
        })
    }

    /// Get all requests concerning a record, oldest first.
    pub fn for_target<S: Store>(store: &S, target: &Target)
    -> Result<Vec<Request>, StoreError> {
        Request::query(store, RequestFilter {
            target: Some(target),
            open: None,
        })
    }

    /// Get open requests concerning a record.
    pub fn open<S: Store>(store: &S, target: &Target)
    -> Result<Vec<Request>, StoreError> {
        Request::query(store, RequestFilter {
            target: Some(target),
            open: Some(true),
        })
    }

    /// Get closed requests concerning a record.
    pub fn closed<S: Store>(store: &S, target: &Target)
    -> Result<Vec<Request>, StoreError> {
        Request::query(store, RequestFilter {
            target: Some(target),
            open: Some(false),
        })
    }

    pub fn has_open_requests<S: Store>(store: &S, target: &Target)
    -> Result<bool, StoreError> {
        Ok(!Request::open(store, target)?.is_empty())
    }

    /// Get the request currently awaiting a response for a record, if any.
    pub fn current_for<S: Store>(store: &S, target: &Target)
    -> Result<Option<Request>, StoreError> {
        Ok(Request::open(store, target)?.into_iter().next())
    }

    fn query<S: Store>(store: &S, filter: RequestFilter)
    -> Result<Vec<Request>, StoreError> {
        Ok(store.requests(&filter)?
            .into_iter()
            .map(Request::from_db)
            .collect())
    }

    /// Is this request still awaiting a response?
    pub fn is_open(&self) -> bool {
        self.data.state.is_open()
    }

    /// Reference to the draft this request concerns.
    pub fn target(&self) -> Target {
        Target::new(self.data.target_type.as_str(), self.data.target_id)
    }

    fn respond(&mut self, state: RequestState, user: i32, note: Option<&str>) {
        self.data.state = state;
        self.data.response_timestamp = Some(Utc::now().naive_utc());
        self.data.response_user = Some(user);
        self.data.response_note = note.map(str::to_string);
    }
}

impl Deref for Request {
    type Target = db::Request;

    fn deref(&self) -> &db::Request {
        &self.data
    }
}

impl fmt::Display for Request {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if self.data.state == RequestState::Done {
            fmt.write_str("Deleted ")?;
        }

        write!(fmt, "{} request for {} #{} by user {} ({})",
            self.data.action,
            self.data.target_type,
            self.data.target_id,
            self.data.request_user,
            self.data.state,
        )
    }
}

/// Publishing guarded by permissions, with approval requests for users who
/// can't publish themselves.
pub struct Workflow<'a, S, G> {
    publisher: &'a Publisher<S>,
    gate: &'a G,
}

/// Action carried out by an accepted request.
enum Executed {
    Published(PublishOutcome),
    Unpublished(Option<Record>),
}

impl<'a, S, G> Workflow<'a, S, G>
where
    S: Store,
    G: PermissionGate,
{
    pub fn new(publisher: &'a Publisher<S>, gate: &'a G) -> Self {
        Workflow { publisher, gate }
    }

    fn store(&self) -> &S {
        self.publisher.store()
    }

    /// Can `user` ask for records of `content_type` to be published or
    /// unpublished?
    pub fn can_ask(&self, user: i32, content_type: &str) -> bool {
        self.has::<AskRequest>(user, content_type)
    }

    /// Can `user` accept and reject requests concerning records of
    /// `content_type`?
    pub fn can_reply(&self, user: i32, content_type: &str) -> bool {
        self.has::<Publish>(user, content_type)
    }

    /// Can `user` publish and unpublish records of `content_type` directly?
    pub fn can_publish(&self, user: i32, content_type: &str) -> bool {
        self.has::<Publish>(user, content_type)
    }

    fn has<P: Permission>(&self, user: i32, content_type: &str) -> bool {
        self.gate.has_permission(user, content_type, P::bits())
    }

    /// Publish a draft directly.
    pub fn publish(&self, user: i32, draft: &mut Record)
    -> Result<Record, RequestError> {
        self.gate.require::<Publish>(user, &draft.content_type)?;
        Ok(self.publisher.publish(draft)?)
    }

    /// Unpublish a draft directly.
    pub fn unpublish(&self, user: i32, draft: &mut Record)
    -> Result<(), RequestError> {
        self.gate.require::<Publish>(user, &draft.content_type)?;
        Ok(self.publisher.unpublish(draft)?)
    }

    /// Ask for a draft to be published.
    ///
    /// The draft must have changes which were not yet published, and there
    /// must be no other open request concerning it.
    pub fn request_publishing(&self, user: i32, draft: &Record, note: Option<&str>)
    -> Result<Request, RequestError> {
        self.gate.require::<AskRequest>(user, &draft.content_type)?;
        assert_draft(draft)?;

        let request = self.store().transaction::<_, RequestError, _>(|| {
            let current = self.lock_target(&draft.target())?;

            if !self.publisher.is_dirty(&current)? {
                warn!("Refused to request publishing of {} #{}: no changes",
                    current.content_type, current.id);
                return Err(RequestError::NotDirty);
            }

            self.create(user, RequestAction::Publish, &current, note)
        })?;

        info!("Created {}", request);

        Ok(request)
    }

    /// Ask for a record to be unpublished.
    ///
    /// `record` can be either side of a published pair; the request always
    /// concerns the draft.
    pub fn request_unpublishing(&self, user: i32, record: &Record, note: Option<&str>)
    -> Result<Request, RequestError> {
        self.gate.require::<AskRequest>(user, &record.content_type)?;

        let request = self.store().transaction::<_, RequestError, _>(|| {
            let draft = match record.get_draft(self.store())? {
                Some(draft) => draft,
                None => return Err(consistency(format!(
                    "published {} #{} has no draft",
                    record.content_type, record.id))),
            };
            let current = self.lock_target(&draft.target())?;

            if current.get_public(self.store())?.is_none() {
                warn!("Refused to request unpublishing of {} #{}: not published",
                    current.content_type, current.id);
                return Err(RequestError::NotPublished);
            }

            self.create(user, RequestAction::Unpublish, &current, note)
        })?;

        info!("Created {}", request);

        Ok(request)
    }

    fn create(&self, user: i32, action: RequestAction, draft: &Record, note: Option<&str>)
    -> Result<Request, RequestError> {
        let result = self.store().insert_request(NewRequest {
            action,
            state: RequestState::Request,
            target_type: &draft.content_type,
            target_id: draft.id,
            request_timestamp: Utc::now().naive_utc(),
            request_user: user,
            request_note: note,
        });

        match result {
            Ok(data) => Ok(Request::from_db(data)),
            Err(StoreError::Conflict(..)) => {
                warn!("Refused to request {} of {} #{}: a request is already open",
                    action, draft.content_type, draft.id);
                Err(RequestError::OpenRequestExists)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Accept a request and carry out its action.
    ///
    /// Either both the request is closed and the action is carried out, or
    /// nothing changes.
    pub fn accept(&self, request: &mut Request, user: i32, note: Option<&str>)
    -> Result<(), RequestError> {
        let target = self.open_target(request)?;
        self.gate.require::<Publish>(user, &target.content_type)?;

        let (accepted, executed) = self.store().transaction::<_, RequestError, _>(|| {
            let mut accepted = self.lock_open(request)?;
            accepted.respond(RequestState::Accepted, user, note);

            let draft = self.lock_target(&target.target())?;

            if !draft.is_draft {
                return Err(consistency(format!(
                    "target of request #{} is not a draft", request.id)));
            }

            self.store().update_request(&accepted.data)?;

            let executed = match accepted.action {
                RequestAction::Publish => {
                    if !self.publisher.is_dirty(&draft)? {
                        return Err(consistency(format!(
                            "target of publish request #{} has no changes",
                            request.id)));
                    }

                    Executed::Published(self.publisher.publish_locked(&draft)?)
                }
                RequestAction::Unpublish => match self.publisher.unpublish_locked(&draft)? {
                    Some(draft) => Executed::Unpublished(Some(draft)),
                    None => return Err(consistency(format!(
                        "target of unpublish request #{} is not published",
                        request.id))),
                },
            };

            Ok((accepted, executed))
        })?;

        let mut draft = target;

        match executed {
            Executed::Published(outcome) => {
                self.publisher.finish_publish(&mut draft, outcome);
            }
            Executed::Unpublished(outcome) => {
                self.publisher.finish_unpublish(&mut draft, outcome);
            }
        }

        *request = accepted;
        info!("Accepted {}", request);

        Ok(())
    }

    /// Reject a request. The record it concerns is left as it is.
    pub fn reject(&self, request: &mut Request, user: i32, note: Option<&str>)
    -> Result<(), RequestError> {
        if !request.is_open() {
            return Err(RequestError::Closed);
        }

        self.gate.require::<Publish>(user, &request.target_type)?;

        let rejected = self.store().transaction::<_, RequestError, _>(|| {
            let mut rejected = self.lock_open(request)?;
            rejected.respond(RequestState::Rejected, user, note);
            self.store().update_request(&rejected.data)?;
            Ok(rejected)
        })?;

        *request = rejected;
        info!("Rejected {}", request);

        Ok(())
    }

    /// Close an open request whose target was deleted.
    pub fn close_deleted(&self, request: &mut Request, user: i32)
    -> Result<(), RequestError> {
        if !request.is_open() {
            return Err(RequestError::Closed);
        }

        let closed = self.store().transaction::<_, RequestError, _>(|| {
            let mut closed = self.lock_open(request)?;

            match Record::resolve(self.store(), &closed.target()) {
                Ok(_) => return Err(RequestError::TargetExists),
                Err(FindRecordError::NotFound(_)) => (),
                Err(FindRecordError::Store(err)) => return Err(err.into()),
            }

            closed.respond(RequestState::Done, user, None);
            self.store().update_request(&closed.data)?;

            Ok(closed)
        })?;

        *request = closed;
        info!("Closed {}", request);

        Ok(())
    }

    /// Discard changes made to a draft since it was last published.
    ///
    /// Reverting replaces the draft with a new record, so open requests
    /// concerning the old one are closed. Returns the new draft.
    pub fn revert_to_public(&self, user: i32, draft: Record)
    -> Result<Record, RequestError> {
        self.gate.require::<Publish>(user, &draft.content_type)?;
        assert_draft(&draft)?;

        let target = draft.target();

        let (outcome, closed) = self.store().transaction::<_, RequestError, _>(|| {
            let outcome = self.publisher.revert_locked(&draft)?;

            let closed = if outcome.reverted() {
                self.close_open(&target, user)?
            } else {
                Vec::new()
            };

            Ok((outcome, closed))
        })?;

        let reverted = self.publisher.finish_revert(&draft, outcome);

        for request in &closed {
            info!("Closed {}", request);
        }

        Ok(reverted)
    }

    /// Delete a record, closing all open requests concerning it.
    ///
    /// Returns requests which were closed.
    pub fn delete(&self, user: i32, record: Record)
    -> Result<Vec<Request>, RequestError> {
        let target = record.target();

        let (outcome, closed) = self.store().transaction::<_, RequestError, _>(|| {
            let outcome = self.publisher.delete_locked(&record)?;
            let closed = self.close_open(&target, user)?;
            Ok((outcome, closed))
        })?;

        self.publisher.finish_delete(&record, outcome);

        for request in &closed {
            info!("Closed {}", request);
        }

        Ok(closed)
    }

    /// Close all open requests concerning a record as done. Must be called in
    /// a transaction.
    fn close_open(&self, target: &Target, user: i32)
    -> Result<Vec<Request>, RequestError> {
        let open = Request::open(self.store(), target)?;
        let mut closed = Vec::with_capacity(open.len());

        for request in open {
            let mut request = self.lock_open(&request)?;
            request.respond(RequestState::Done, user, None);
            self.store().update_request(&request.data)?;
            closed.push(request);
        }

        Ok(closed)
    }

    /// Load and lock current state of a request, which must still be open.
    ///
    /// `request` may be stale; only the stored state is trusted.
    fn lock_open(&self, request: &Request) -> Result<Request, RequestError> {
        let current = self.store().lock_request(request.id)?
            .map(Request::from_db)
            .ok_or(RequestError::NotFound(request.id))?;

        if !current.is_open() {
            warn!("Refused to respond to request #{}: already {}",
                current.id, current.state);
            return Err(RequestError::Closed);
        }

        Ok(current)
    }

    /// Find the target of an open request.
    fn open_target(&self, request: &Request) -> Result<Record, RequestError> {
        if !request.is_open() {
            return Err(RequestError::Closed);
        }

        Ok(Record::resolve(self.store(), &request.target())?)
    }

    /// Load and lock current state of a request's target.
    fn lock_target(&self, target: &Target) -> Result<Record, RequestError> {
        match self.store().lock_record(target.id)? {
            Some(data) if data.content_type == target.content_type =>
                Ok(Record::from_db(data)),
            _ => Err(RequestError::TargetDeleted),
        }
    }
}

fn consistency(message: String) -> RequestError {
    let err = RequestError::Consistency(message);
    err.log();
    err
}

#[derive(ApiError, Debug, Fail, From)]
pub enum RequestError {
    #[fail(display = "{}", _0)]
    Store(#[cause] #[from] StoreError),
    #[fail(display = "{}", _0)]
    Permission(#[cause] #[from] RequirePermissionsError),
    #[fail(display = "{}", _0)]
    Publish(#[cause] #[from] PublishError),
    /// Only drafts with unpublished changes can be requested to be published.
    #[fail(display = "There are no changes to publish")]
    #[api(code = "request:not-dirty", kind = "Invalid")]
    NotDirty,
    /// Only published records can be requested to be unpublished.
    #[fail(display = "Record is not published")]
    #[api(code = "request:not-published", kind = "Invalid")]
    NotPublished,
    #[fail(display = "There already is an open request for this record")]
    #[api(code = "request:open-request-exists", kind = "Invalid")]
    OpenRequestExists,
    #[fail(display = "Request is already closed")]
    #[api(code = "request:closed", kind = "Invalid")]
    Closed,
    #[fail(display = "Record this request concerns was deleted")]
    #[api(code = "request:target-deleted", kind = "Invalid")]
    TargetDeleted,
    #[fail(display = "Record this request concerns still exists")]
    #[api(code = "request:target-exists", kind = "Invalid")]
    TargetExists,
    #[fail(display = "No request #{}", _0)]
    #[api(code = "request:not-found", kind = "NotFound")]
    NotFound(i32),
    /// Records don't satisfy assumptions made when the request was created.
    #[fail(display = "Inconsistent request state: {}", _0)]
    #[api(internal)]
    Consistency(String),
}

impl_from! { for RequestError ;
    FindRecordError => |e| match e {
        FindRecordError::Store(e) => RequestError::Store(e),
        FindRecordError::NotFound(_) => RequestError::TargetDeleted,
    },
}
