//! Draft/publish workflow for content records, with approval requests.
//!
//! Every content entity is kept as a pair of records: an editable draft and
//! a published snapshot recreated on each publish. [`models::Publisher`]
//! moves a pair between states; [`models::Workflow`] lets users without the
//! publish permission ask for a publication, and privileged users accept or
//! reject such requests.

// TEMPORARY, see diesel-rs/diesel#1787.
#![allow(proc_macro_derive_resolution_fallback)]

#[macro_use] extern crate bitflags;
#[macro_use] extern crate diesel;
#[macro_use] extern crate log;

#[cfg(not(debug_assertions))]
#[macro_use]
extern crate diesel_migrations;

pub use publisher_macros::{From, test};

pub use self::{
    config::Config,
    error::{ApiError, ErrorKind},
};

#[macro_use] mod macros;

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod permissions;
pub mod store;

pub type Result<T, E=failure::Error> = std::result::Result<T, E>;
