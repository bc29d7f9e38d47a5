//! In-process storage.

use std::{cell::RefCell, collections::BTreeMap};

use crate::db::models::{NewRecord, NewRequest, Record, Request};
use super::{RecordFilter, RequestFilter, Store, StoreError};

/// Storage keeping records and requests in memory.
///
/// A memory store behaves like a single database connection: it can't be
/// shared between threads, and since there is only one connection row locks
/// are no-ops. Transactions take a snapshot of the whole state and restore it
/// when the transaction fails.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<State>,
}

#[derive(Clone, Debug, Default)]
struct State {
    records: BTreeMap<i32, Record>,
    requests: BTreeMap<i32, Request>,
    last_record: i32,
    last_request: i32,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.state.borrow().records.len()
    }

    /// Number of stored requests.
    pub fn request_count(&self) -> usize {
        self.state.borrow().requests.len()
    }
}

impl Store for MemoryStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StoreError>,
    {
        let snapshot = self.state.borrow().clone();

        let result = f();

        if result.is_err() {
            *self.state.borrow_mut() = snapshot;
        }

        result
    }

    fn record(&self, id: i32) -> Result<Option<Record>, StoreError> {
        Ok(self.state.borrow().records.get(&id).cloned())
    }

    fn lock_record(&self, id: i32) -> Result<Option<Record>, StoreError> {
        self.record(id)
    }

    fn insert_record(&self, new: NewRecord) -> Result<Record, StoreError> {
        let mut state = self.state.borrow_mut();

        if let Some(linked) = new.linked {
            if !state.records.contains_key(&linked) {
                return Err(StoreError::Missing("record", linked));
            }
        }

        state.last_record += 1;

        let record = Record {
            id: state.last_record,
            content_type: new.content_type.to_string(),
            is_draft: new.is_draft,
            linked: new.linked,
            modified_at: new.modified_at,
            published_at: new.published_at,
            publication_start: new.publication_start,
            publication_end: new.publication_end,
            fields: new.fields.clone(),
        };

        state.records.insert(record.id, record.clone());

        Ok(record)
    }

    fn update_record(&self, record: &Record) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();

        if let Some(linked) = record.linked {
            if !state.records.contains_key(&linked) {
                return Err(StoreError::Missing("record", linked));
            }
        }

        match state.records.get_mut(&record.id) {
            Some(stored) => {
                *stored = record.clone();
                Ok(())
            }
            None => Err(StoreError::Missing("record", record.id)),
        }
    }

    fn delete_record(&self, id: i32) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();

        if state.records.remove(&id).is_none() {
            return Err(StoreError::Missing("record", id));
        }

        for record in state.records.values_mut() {
            if record.linked == Some(id) {
                record.linked = None;
            }
        }

        Ok(())
    }

    fn records(&self, filter: &RecordFilter) -> Result<Vec<Record>, StoreError> {
        Ok(self.state.borrow()
            .records
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    fn request(&self, id: i32) -> Result<Option<Request>, StoreError> {
        Ok(self.state.borrow().requests.get(&id).cloned())
    }

    fn lock_request(&self, id: i32) -> Result<Option<Request>, StoreError> {
        self.request(id)
    }

    fn insert_request(&self, new: NewRequest) -> Result<Request, StoreError> {
        let mut state = self.state.borrow_mut();

        if new.state.is_open() {
            let conflict = state.requests.values().any(|request| {
                request.state.is_open()
                    && request.target_type == new.target_type
                    && request.target_id == new.target_id
            });

            if conflict {
                return Err(StoreError::Conflict(
                    new.target_type.to_string(), new.target_id));
            }
        }

        state.last_request += 1;

        let request = Request {
            id: state.last_request,
            action: new.action,
            state: new.state,
            target_type: new.target_type.to_string(),
            target_id: new.target_id,
            request_timestamp: new.request_timestamp,
            request_user: new.request_user,
            request_note: new.request_note.map(str::to_string),
            response_timestamp: None,
            response_user: None,
            response_note: None,
        };

        state.requests.insert(request.id, request.clone());

        Ok(request)
    }

    fn update_request(&self, request: &Request) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();

        match state.requests.get_mut(&request.id) {
            Some(stored) => {
                *stored = request.clone();
                Ok(())
            }
            None => Err(StoreError::Missing("request", request.id)),
        }
    }

    fn requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        Ok(self.state.borrow()
            .requests
            .values()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect())
    }
}
