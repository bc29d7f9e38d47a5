//! Classification of errors for the layer presenting them to users.

use failure::Fail;
use log::error;
use std::borrow::Cow;

pub use publisher_macros::ApiError;

/// How an error should be treated at the boundary of this crate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Actor lacks a capability required for the action.
    Forbidden,
    /// Action is not valid for the current state of the content. The caller
    /// may offer the user a corrective action.
    Invalid,
    /// A referenced record or request does not exist.
    NotFound,
    /// Storage failure or a broken internal invariant. Not recoverable by the
    /// caller.
    Internal,
}

/// An error that can be reported to whoever invoked a publishing operation.
pub trait ApiError: Fail {
    /// Classification of this error.
    fn kind(&self) -> ErrorKind;

    /// Internal code describing this error.
    ///
    /// This code is used to identify this error outside the system, and thus
    /// should only be present for errors which are intended to be reported
    /// to the user in detail.
    fn code(&self) -> Option<Cow<str>>;

    /// Is this an internal error?
    fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }

    /// Log this error if it is internal. User-facing errors are left to the
    /// caller.
    fn log(&self) {
        if self.is_internal() {
            error!("{}", self);

            let mut cause = self.cause();
            while let Some(err) = cause {
                error!("caused by: {}", err);
                cause = err.cause();
            }
        }
    }
}
