use chrono::{NaiveDateTime, Utc};
use failure::Fail;
use serde_json::Value;

use crate::{
    ApiError,
    From,
    db::models::NewRecord,
    events::{Event, EventManager, Listener},
    store::{Store, StoreError},
};
use super::{ContentType, ContentTypes, Record};

/// Moves draft/published pairs between states.
///
/// Every operation runs in a single store transaction, and either fully
/// succeeds or leaves the store unchanged. The draft is locked for the
/// duration of the operation, so that concurrent operations on the same
/// pair are serialized.
pub struct Publisher<S> {
    store: S,
    content_types: ContentTypes<S>,
    events: EventManager,
}

impl<S: Store> Publisher<S> {
    pub fn new(store: S, content_types: ContentTypes<S>) -> Self {
        Publisher {
            store,
            content_types,
            events: EventManager::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn content_types(&self) -> &ContentTypes<S> {
        &self.content_types
    }

    /// Register a listener for publishing events.
    pub fn register_listener<L>(&mut self, listener: L)
    where
        L: Listener + 'static,
    {
        self.events.register(listener);
    }

    /// Check whether a record has changes which were not yet published.
    ///
    /// Published records are never dirty. Drafts which were never published
    /// (or were unpublished) always are.
    pub fn is_dirty(&self, record: &Record) -> Result<bool, PublishError> {
        if !record.is_draft {
            return Ok(false);
        }

        let public = match self.twin(record)? {
            Some(public) => public,
            None => return Ok(true),
        };

        let content_type = self.content_types.get(&record.content_type);
        let content_modified_at = content_type
            .content_modified_at(&self.store, record)
            .map_err(content_error(record))?;

        Ok(record.differs_from(&public, content_modified_at))
    }

    /// Publish a draft.
    ///
    /// The draft is reloaded from the store before publishing; changes to
    /// `draft` which were not saved are discarded. On success `draft` is
    /// updated to its new state, and the published record is returned. If the
    /// draft has no unpublished changes its current published record is
    /// returned, and nothing is modified.
    pub fn publish(&self, draft: &mut Record) -> Result<Record, PublishError> {
        assert_draft(draft)?;

        let outcome = self.store.transaction::<_, PublishError, _>(
            || self.publish_locked(draft))?;

        Ok(self.finish_publish(draft, outcome))
    }

    /// Remove the published copy of a draft.
    ///
    /// Does nothing if the draft is not published.
    pub fn unpublish(&self, draft: &mut Record) -> Result<(), PublishError> {
        assert_draft(draft)?;

        let outcome = self.store.transaction::<_, PublishError, _>(
            || self.unpublish_locked(draft))?;

        self.finish_unpublish(draft, outcome);

        Ok(())
    }

    /// Discard changes made to a draft since it was last published.
    ///
    /// The draft is deleted, and the published record becomes the new draft
    /// and is published again. Returns the new draft. A draft which isn't
    /// published is returned unchanged.
    pub fn revert_to_public(&self, draft: Record) -> Result<Record, PublishError> {
        assert_draft(&draft)?;

        let outcome = self.store.transaction::<_, PublishError, _>(
            || self.revert_locked(&draft))?;

        Ok(self.finish_revert(&draft, outcome))
    }

    /// Delete a record.
    ///
    /// Deleting a draft first unpublishes it. Deleting a published record
    /// leaves its draft in place, unlinked.
    pub fn delete(&self, record: Record) -> Result<(), PublishError> {
        let outcome = self.store.transaction::<_, PublishError, _>(
            || self.delete_locked(&record))?;

        self.finish_delete(&record, outcome);

        Ok(())
    }

    /// Publish a dirty draft. Must be called in a transaction, and followed by
    /// [`Publisher::finish_publish`] once it commits.
    pub(super) fn publish_locked(&self, draft: &Record)
    -> Result<PublishOutcome, PublishError> {
        let current = self.lock(draft)?;

        if !self.is_dirty(&current)? {
            let public = self.twin(&current)?
                .ok_or_else(|| consistency(format!(
                    "clean draft {} #{} has no published copy",
                    current.content_type, current.id)))?;

            return Ok(PublishOutcome { public, draft: current, changed: false });
        }

        let (public, current) = self.do_publish(current, None)?;

        Ok(PublishOutcome { public, draft: current, changed: true })
    }

    pub(super) fn finish_publish(&self, draft: &mut Record, outcome: PublishOutcome)
    -> Record {
        let PublishOutcome { public, draft: current, changed } = outcome;

        if changed {
            self.events.notify(Event::PostPublish, &current);
            info!("Published {} #{} as #{}",
                current.content_type, current.id, public.id);
        } else {
            debug!("{} #{} has no changes to publish",
                current.content_type, current.id);
        }

        *draft = current;
        public
    }

    /// Unpublish a draft. Must be called in a transaction, and followed by
    /// [`Publisher::finish_unpublish`] once it commits.
    pub(super) fn unpublish_locked(&self, draft: &Record)
    -> Result<Option<Record>, PublishError> {
        let mut current = self.lock(draft)?;

        if self.do_unpublish(&mut current)? {
            Ok(Some(current))
        } else {
            Ok(None)
        }
    }

    pub(super) fn finish_unpublish(&self, draft: &mut Record, outcome: Option<Record>) {
        match outcome {
            Some(current) => {
                self.events.notify(Event::PostUnpublish, &current);
                info!("Unpublished {} #{}", current.content_type, current.id);
                *draft = current;
            }
            None => debug!("{} #{} is not published, nothing to unpublish",
                draft.content_type, draft.id),
        }
    }

    /// Revert a draft. Must be called in a transaction, and followed by
    /// [`Publisher::finish_revert`] once it commits.
    pub(super) fn revert_locked(&self, draft: &Record)
    -> Result<RevertOutcome, PublishError> {
        let current = self.lock(draft)?;

        let public = match self.twin(&current)? {
            Some(public) => public,
            None => return Ok(RevertOutcome { draft: current, public: None }),
        };

        self.store.delete_record(current.id)?;

        let mut promoted = public;
        promoted.data.is_draft = true;
        promoted.data.linked = None;
        promoted.save(&self.store)?;

        let published_at = promoted.published_at;
        let (public, promoted) = self.do_publish(promoted, published_at)?;

        Ok(RevertOutcome { draft: promoted, public: Some(public) })
    }

    pub(super) fn finish_revert(&self, draft: &Record, outcome: RevertOutcome)
    -> Record {
        let RevertOutcome { draft: reverted, public } = outcome;

        match public {
            Some(public) => {
                self.events.notify(Event::PostPublish, &reverted);
                info!("Reverted {} #{} to #{}, published as #{}",
                    draft.content_type, draft.id, reverted.id, public.id);
            }
            None => debug!("{} #{} is not published, nothing to revert to",
                draft.content_type, draft.id),
        }

        reverted
    }

    /// Delete a record. Must be called in a transaction, and followed by
    /// [`Publisher::finish_delete`] once it commits.
    pub(super) fn delete_locked(&self, record: &Record)
    -> Result<Option<Record>, PublishError> {
        let mut current = self.lock(record)?;

        let unpublished = current.is_draft && self.do_unpublish(&mut current)?;

        self.store.delete_record(current.id)?;

        Ok(if unpublished { Some(current) } else { None })
    }

    pub(super) fn finish_delete(&self, record: &Record, outcome: Option<Record>) {
        if let Some(unpublished) = outcome {
            self.events.notify(Event::PostUnpublish, &unpublished);
        }

        info!("Deleted {} #{}", record.content_type, record.id);
    }

    /// Create a new published copy of a dirty draft, replacing the current
    /// one. Must be called in a transaction.
    ///
    /// `published_at` is the publication date used when the draft isn't
    /// currently published, or the current time if it's `None`.
    fn do_publish(&self, mut draft: Record, published_at: Option<NaiveDateTime>)
    -> Result<(Record, Record), PublishError> {
        self.events.notify(Event::PrePublish, &draft);

        let content_type = self.content_types.get(&draft.content_type);
        let now = Utc::now().naive_utc();

        match self.twin(&draft)? {
            Some(old) => {
                content_type.repair_shared_content(&self.store, &draft, &old)
                    .map_err(content_error(&draft))?;
                self.store.delete_record(old.id)?;
            }
            None => draft.data.published_at = Some(published_at.unwrap_or(now)),
        }

        let fields = published_fields(content_type, &draft.fields);

        let public = Record::from_db(self.store.insert_record(NewRecord {
            content_type: &draft.content_type,
            is_draft: false,
            linked: Some(draft.id),
            modified_at: now,
            published_at: draft.published_at,
            publication_start: draft.publication_start,
            publication_end: draft.publication_end,
            fields: &fields,
        })?);

        content_type.clone_translations(&self.store, &draft, &public)
            .map_err(content_error(&draft))?;
        content_type.clone_embedded_content(&self.store, &draft, &public)
            .map_err(content_error(&draft))?;
        content_type.clone_relations(&self.store, &draft, &public)
            .map_err(content_error(&draft))?;

        draft.data.linked = Some(public.id);

        self.events.notify(Event::PreSaveDraft, &draft);

        draft.save_suppressed(&self.store)?;

        Ok((public, draft))
    }

    /// Delete the published copy of a draft, if there is one. Must be called
    /// in a transaction.
    ///
    /// Returns whether there was anything to unpublish.
    fn do_unpublish(&self, draft: &mut Record) -> Result<bool, PublishError> {
        let public = match self.twin(draft)? {
            Some(public) => public,
            None => return Ok(false),
        };

        self.events.notify(Event::PreUnpublish, draft);

        self.store.delete_record(public.id)?;

        draft.data.linked = None;
        draft.data.published_at = None;
        draft.save(&self.store)?;

        Ok(true)
    }

    /// Load and lock current state of a record.
    fn lock(&self, record: &Record) -> Result<Record, PublishError> {
        let current = self.store.lock_record(record.id)?
            .map(Record::from_db)
            .ok_or(PublishError::NotFound(record.id))?;

        if current.is_draft != record.is_draft {
            return Err(consistency(format!(
                "{} #{} changed sides of its pair",
                record.content_type, record.id)));
        }

        Ok(current)
    }

    /// Find the other side of a record's pair.
    fn twin(&self, record: &Record) -> Result<Option<Record>, PublishError> {
        let id = match record.linked {
            Some(id) => id,
            None => return Ok(None),
        };

        match self.store.record(id)? {
            Some(twin) if twin.is_draft != record.is_draft =>
                Ok(Some(Record::from_db(twin))),
            Some(_) => Err(consistency(format!(
                "{} #{} is linked to #{} on the same side of the pair",
                record.content_type, record.id, id))),
            None => Err(consistency(format!(
                "{} #{} is linked to missing record #{}",
                record.content_type, record.id, id))),
        }
    }
}

/// Result of [`Publisher::revert_locked`].
pub(super) struct RevertOutcome {
    draft: Record,
    public: Option<Record>,
}

impl RevertOutcome {
    /// Was the draft replaced?
    pub(super) fn reverted(&self) -> bool {
        self.public.is_some()
    }
}

/// Result of [`Publisher::publish_locked`].
pub(super) struct PublishOutcome {
    public: Record,
    draft: Record,
    changed: bool,
}

pub(super) fn assert_draft(record: &Record) -> Result<(), PublishError> {
    if record.is_draft {
        Ok(())
    } else {
        Err(PublishError::NotDraft(record.content_type.clone(), record.id))
    }
}

/// Copy of a draft's fields with those emptied on publish removed.
fn published_fields<S: Store>(content_type: &dyn ContentType<S>, fields: &Value)
-> Value {
    let mut fields = fields.clone();

    if let Value::Object(ref mut map) = fields {
        for name in content_type.empty_on_publish() {
            map.remove(name);
        }
    }

    fields
}

fn content_error(record: &Record) -> impl FnOnce(failure::Error) -> PublishError {
    let content_type = record.content_type.clone();
    move |error| {
        let err = PublishError::Content { content_type, error };
        err.log();
        err
    }
}

fn consistency(message: String) -> PublishError {
    let err = PublishError::Consistency(message);
    err.log();
    err
}

#[derive(ApiError, Debug, Fail, From)]
pub enum PublishError {
    #[fail(display = "{}", _0)]
    Store(#[cause] #[from] StoreError),
    /// Publishing operations are only defined on drafts.
    #[fail(display = "{} #{} is not a draft", _0, _1)]
    #[api(code = "publisher:not-draft", kind = "Invalid")]
    NotDraft(String, i32),
    #[fail(display = "No record #{}", _0)]
    #[api(code = "record:not-found", kind = "NotFound")]
    NotFound(i32),
    /// Content type failed to process a record.
    #[fail(display = "Error processing {} content: {}", content_type, error)]
    #[api(internal)]
    Content {
        content_type: String,
        #[cause]
        error: failure::Error,
    },
    /// Stored records don't satisfy invariants of the pairing.
    #[fail(display = "Inconsistent publishing state: {}", _0)]
    #[api(internal)]
    Consistency(String),
}
