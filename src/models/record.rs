use chrono::{NaiveDateTime, Utc};
use failure::Fail;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, ops::Deref};

use crate::{
    ApiError,
    From,
    context::ViewContext,
    db::models::{self as db, NewRecord},
    store::{RecordFilter, Store, StoreError},
};

/// One side of a draft/published pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub(super) data: db::Record,
}

/// Reference to a record of any content type.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Target {
    pub content_type: String,
    pub id: i32,
}

impl Target {
    pub fn new<T: Into<String>>(content_type: T, id: i32) -> Target {
        Target {
            content_type: content_type.into(),
            id,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{} #{}", self.content_type, self.id)
    }
}

impl Record {
    /// Construct `Record` from its database counterpart.
    pub(crate) fn from_db(data: db::Record) -> Record {
        Record { data }
    }

    /// Get the underlying model.
    pub fn into_db(self) -> db::Record {
        self.data
    }

    /// Create a new, never published draft.
    pub fn create<S: Store>(store: &S, content_type: &str, fields: Value)
    -> Result<Record, StoreError> {
        let data = store.insert_record(NewRecord {
            content_type,
            is_draft: true,
            linked: None,
            modified_at: Utc::now().naive_utc(),
            published_at: None,
            publication_start: None,
            publication_end: None,
            fields: &fields,
        })?;

        debug!("Created draft {} #{}", data.content_type, data.id);

        Ok(Record::from_db(data))
    }

    /// Find a record by ID.
    pub fn by_id<S: Store>(store: &S, id: i32) -> Result<Record, FindRecordError> {
        store.record(id)?
            .map(Record::from_db)
            .ok_or(FindRecordError::NotFound(id))
    }

    /// Find a record by a polymorphic reference.
    pub fn resolve<S: Store>(store: &S, target: &Target)
    -> Result<Record, FindRecordError> {
        match store.record(target.id)? {
            Some(data) if data.content_type == target.content_type =>
                Ok(Record::from_db(data)),
            _ => Err(FindRecordError::NotFound(target.id)),
        }
    }

    /// Get all drafts of a content type.
    pub fn drafts<S: Store>(store: &S, content_type: &str)
    -> Result<Vec<Record>, StoreError> {
        Record::query(store, RecordFilter {
            content_type: Some(content_type),
            is_draft: Some(true),
            ..RecordFilter::default()
        })
    }

    /// Get all published records of a content type, regardless of their
    /// publication window.
    pub fn published<S: Store>(store: &S, content_type: &str)
    -> Result<Vec<Record>, StoreError> {
        Record::query(store, RecordFilter {
            content_type: Some(content_type),
            is_draft: Some(false),
            ..RecordFilter::default()
        })
    }

    /// Get published records of a content type whose publication window
    /// contains `at`.
    pub fn visible<S: Store>(store: &S, content_type: &str, at: NaiveDateTime)
    -> Result<Vec<Record>, StoreError> {
        Record::query(store, RecordFilter {
            content_type: Some(content_type),
            is_draft: Some(false),
            visible_at: Some(at),
        })
    }

    /// Get records a viewer should see: drafts in draft mode, published
    /// records otherwise.
    pub fn current<S: Store>(store: &S, context: &ViewContext, content_type: &str)
    -> Result<Vec<Record>, StoreError> {
        if context.draft_mode() {
            Record::drafts(store, content_type)
        } else {
            Record::published(store, content_type)
        }
    }

    fn query<S: Store>(store: &S, filter: RecordFilter)
    -> Result<Vec<Record>, StoreError> {
        Ok(store.records(&filter)?
            .into_iter()
            .map(Record::from_db)
            .collect())
    }

    /// Reference to this record.
    pub fn target(&self) -> Target {
        Target::new(self.data.content_type.as_str(), self.data.id)
    }

    pub fn is_published(&self) -> bool {
        !self.data.is_draft
    }

    /// Get value of a content field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.fields.get(name)
    }

    /// Set value of a content field. Changes are not persisted until the
    /// record is saved.
    pub fn set_field<V: Into<Value>>(&mut self, name: &str, value: V) {
        if !self.data.fields.is_object() {
            self.data.fields = Value::Object(Map::new());
        }

        if let Value::Object(ref mut fields) = self.data.fields {
            fields.insert(name.to_string(), value.into());
        }
    }

    /// Value of the `title` field, if it is a string.
    pub fn title(&self) -> Option<&str> {
        self.field("title").and_then(Value::as_str)
    }

    /// Limit period during which this record is publicly visible. Changes
    /// are not persisted until the record is saved.
    pub fn set_publication_window(
        &mut self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) {
        self.data.publication_start = start;
        self.data.publication_end = end;
    }

    /// Save changes, marking this record as modified now.
    pub fn save<S: Store>(&mut self, store: &S) -> Result<(), StoreError> {
        self.data.modified_at = Utc::now().naive_utc();
        store.update_record(&self.data)
    }

    /// Save changes without updating modification time.
    pub fn save_suppressed<S: Store>(&self, store: &S) -> Result<(), StoreError> {
        store.update_record(&self.data)
    }

    /// Get the draft side of this record's pair.
    ///
    /// A draft resolves to itself. A published record resolves through its
    /// link, and to `None` if the link is broken.
    pub fn get_draft<S: Store>(&self, store: &S) -> Result<Option<Record>, StoreError> {
        if self.data.is_draft {
            return Ok(Some(self.clone()));
        }

        self.linked(store)
    }

    /// Get the published side of this record's pair.
    ///
    /// A published record resolves to itself. A draft resolves through its
    /// link, and to `None` if it was never published (or was unpublished).
    pub fn get_public<S: Store>(&self, store: &S) -> Result<Option<Record>, StoreError> {
        if !self.data.is_draft {
            return Ok(Some(self.clone()));
        }

        self.linked(store)
    }

    fn linked<S: Store>(&self, store: &S) -> Result<Option<Record>, StoreError> {
        match self.data.linked {
            Some(id) => Ok(store.record(id)?.map(Record::from_db)),
            None => Ok(None),
        }
    }

    /// Does this draft differ from `public`, its published copy?
    ///
    /// `content_modified_at` is the latest modification of content embedded
    /// in this draft, if any.
    pub(crate) fn differs_from(
        &self,
        public: &Record,
        content_modified_at: Option<NaiveDateTime>,
    ) -> bool {
        if self.data.modified_at > public.data.modified_at {
            return true;
        }

        content_modified_at.map_or(false, |at| at > public.data.modified_at)
    }
}

impl Deref for Record {
    type Target = db::Record;

    fn deref(&self) -> &db::Record {
        &self.data
    }
}

#[derive(ApiError, Debug, Fail, From)]
pub enum FindRecordError {
    #[fail(display = "{}", _0)]
    Store(#[cause] #[from] StoreError),
    #[fail(display = "No record #{}", _0)]
    #[api(code = "record:not-found", kind = "NotFound")]
    NotFound(i32),
}
