//! PostgreSQL storage.

use std::borrow::Borrow;

use diesel::{
    connection::{Connection as _Connection, TransactionManager},
    prelude::*,
    result::{DatabaseErrorKind, Error as DbError},
};

use crate::db::{
    Connection,
    models::{NewRecord, NewRequest, Record, Request},
    schema::{publisher_records, publisher_requests},
    types::RequestState,
};
use super::{RecordFilter, RequestFilter, Store, StoreError};

/// Storage backed by a PostgreSQL database.
///
/// The store either owns its connection or borrows it, as in
/// `PgStore<&Connection>`.
///
/// Open-request uniqueness relies on the partial unique index created by the
/// `publisher` migration.
pub struct PgStore<C = Connection> {
    db: C,
}

impl<C: Borrow<Connection>> PgStore<C> {
    pub fn new(db: C) -> Self {
        PgStore { db }
    }

    pub fn connection(&self) -> &Connection {
        <C as Borrow<Connection>>::borrow(&self.db)
    }
}

impl<C: Borrow<Connection>> Store for PgStore<C> {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StoreError>,
    {
        let db = self.connection();
        let manager = db.transaction_manager();

        manager.begin_transaction(db).map_err(StoreError::from)?;

        match f() {
            Ok(value) => {
                manager.commit_transaction(db).map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                manager.rollback_transaction(db).map_err(StoreError::from)?;
                Err(err)
            }
        }
    }

    fn record(&self, id: i32) -> Result<Option<Record>, StoreError> {
        publisher_records::table
            .find(id)
            .get_result::<Record>(self.connection())
            .optional()
            .map_err(From::from)
    }

    fn lock_record(&self, id: i32) -> Result<Option<Record>, StoreError> {
        publisher_records::table
            .find(id)
            .for_update()
            .get_result::<Record>(self.connection())
            .optional()
            .map_err(From::from)
    }

    fn insert_record(&self, new: NewRecord) -> Result<Record, StoreError> {
        diesel::insert_into(publisher_records::table)
            .values(&new)
            .get_result::<Record>(self.connection())
            .map_err(From::from)
    }

    fn update_record(&self, record: &Record) -> Result<(), StoreError> {
        let updated = diesel::update(record)
            .set(record)
            .execute(self.connection())?;

        if updated == 0 {
            return Err(StoreError::Missing("record", record.id));
        }

        Ok(())
    }

    fn delete_record(&self, id: i32) -> Result<(), StoreError> {
        // Links pointing at this record are cleared by the foreign key's
        // ON DELETE SET NULL.
        let deleted = diesel::delete(publisher_records::table.find(id))
            .execute(self.connection())?;

        if deleted == 0 {
            return Err(StoreError::Missing("record", id));
        }

        Ok(())
    }

    fn records(&self, filter: &RecordFilter) -> Result<Vec<Record>, StoreError> {
        let mut query = publisher_records::table
            .order_by(publisher_records::id)
            .into_boxed();

        if let Some(content_type) = filter.content_type {
            query = query.filter(publisher_records::content_type.eq(content_type));
        }

        if let Some(is_draft) = filter.is_draft {
            query = query.filter(publisher_records::is_draft.eq(is_draft));
        }

        if let Some(at) = filter.visible_at {
            query = query
                .filter(publisher_records::publication_start.is_null()
                    .or(publisher_records::publication_start.le(at)))
                .filter(publisher_records::publication_end.is_null()
                    .or(publisher_records::publication_end.gt(at)));
        }

        query.get_results::<Record>(self.connection()).map_err(From::from)
    }

    fn request(&self, id: i32) -> Result<Option<Request>, StoreError> {
        publisher_requests::table
            .find(id)
            .get_result::<Request>(self.connection())
            .optional()
            .map_err(From::from)
    }

    fn lock_request(&self, id: i32) -> Result<Option<Request>, StoreError> {
        publisher_requests::table
            .find(id)
            .for_update()
            .get_result::<Request>(self.connection())
            .optional()
            .map_err(From::from)
    }

    fn insert_request(&self, new: NewRequest) -> Result<Request, StoreError> {
        let result = diesel::insert_into(publisher_requests::table)
            .values(&new)
            .get_result::<Request>(self.connection());

        match result {
            Ok(request) => Ok(request),
            Err(DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) =>
                Err(StoreError::Conflict(new.target_type.to_string(), new.target_id)),
            Err(err) => Err(err.into()),
        }
    }

    fn update_request(&self, request: &Request) -> Result<(), StoreError> {
        let updated = diesel::update(request)
            .set(request)
            .execute(self.connection())?;

        if updated == 0 {
            return Err(StoreError::Missing("request", request.id));
        }

        Ok(())
    }

    fn requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        let mut query = publisher_requests::table
            .order_by(publisher_requests::id)
            .into_boxed();

        if let Some(target) = filter.target {
            query = query
                .filter(publisher_requests::target_type.eq(&target.content_type))
                .filter(publisher_requests::target_id.eq(target.id));
        }

        match filter.open {
            Some(true) => {
                query = query.filter(
                    publisher_requests::state.eq(RequestState::Request));
            }
            Some(false) => {
                query = query.filter(
                    publisher_requests::state.ne(RequestState::Request));
            }
            None => (),
        }

        query.get_results::<Request>(self.connection()).map_err(From::from)
    }
}
