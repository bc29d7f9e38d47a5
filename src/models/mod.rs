//! Data and behaviours modelled as objects.

pub mod content;
pub mod publisher;
pub mod record;
pub mod request;

pub use self::{
    content::{BasicContentType, ContentType, ContentTypes},
    publisher::{Publisher, PublishError},
    record::{FindRecordError, Record, Target},
    request::{Request, RequestError, Workflow},
};
