//! Content-type specific behaviour of records.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::store::Store;
use super::Record;

/// Behaviour of a single content type during publishing.
///
/// Content types own data attached to records outside of the records'
/// fields: translations, embedded rich content, and relations to other
/// records. When a draft is published the publisher creates a new published
/// record, and then asks the content type to copy all such data from the
/// draft to it, calling [`ContentType::clone_translations`],
/// [`ContentType::clone_embedded_content`] and
/// [`ContentType::clone_relations`], in this order.
///
/// All methods except [`ContentType::name`] default to doing nothing.
pub trait ContentType<S> {
    /// Name of this content type, as stored in records.
    fn name(&self) -> &str;

    /// Fields which are not copied to published records.
    fn empty_on_publish(&self) -> &[String] {
        &[]
    }

    /// Latest modification of content embedded in `draft`.
    fn content_modified_at(&self, _store: &S, _draft: &Record)
    -> Result<Option<NaiveDateTime>, failure::Error> {
        Ok(None)
    }

    /// Ensure `draft` and `public` don't share any embedded content, so that
    /// deleting `public` leaves `draft` intact.
    fn repair_shared_content(&self, _store: &S, _draft: &Record, _public: &Record)
    -> Result<(), failure::Error> {
        Ok(())
    }

    /// Copy translations of `src` to `dst`.
    fn clone_translations(&self, _store: &S, _src: &Record, _dst: &Record)
    -> Result<(), failure::Error> {
        Ok(())
    }

    /// Copy embedded content of `src` to `dst`.
    fn clone_embedded_content(&self, _store: &S, _src: &Record, _dst: &Record)
    -> Result<(), failure::Error> {
        Ok(())
    }

    /// Copy relations of `src` to other records to `dst`.
    fn clone_relations(&self, _store: &S, _src: &Record, _dst: &Record)
    -> Result<(), failure::Error> {
        Ok(())
    }
}

/// A content type whose data lives entirely in record fields.
#[derive(Clone, Debug)]
pub struct BasicContentType {
    name: String,
    empty_on_publish: Vec<String>,
}

impl BasicContentType {
    pub fn new<N: Into<String>>(name: N, empty_on_publish: Vec<String>)
    -> BasicContentType {
        BasicContentType {
            name: name.into(),
            empty_on_publish,
        }
    }
}

impl<S: Store> ContentType<S> for BasicContentType {
    fn name(&self) -> &str {
        &self.name
    }

    fn empty_on_publish(&self) -> &[String] {
        &self.empty_on_publish
    }
}

/// Registry of content types, by name.
pub struct ContentTypes<S> {
    types: HashMap<String, Box<dyn ContentType<S>>>,
    fallback: BasicContentType,
}

impl<S: Store> ContentTypes<S> {
    pub fn new() -> Self {
        ContentTypes {
            types: HashMap::new(),
            fallback: BasicContentType::new("", Vec::new()),
        }
    }

    /// Register a content type, replacing any previously registered under
    /// the same name.
    pub fn register<T>(&mut self, content_type: T) -> &mut Self
    where
        T: ContentType<S> + 'static,
    {
        let name = content_type.name().to_string();

        if self.types.insert(name.clone(), Box::new(content_type)).is_some() {
            warn!("Content type {} registered twice", name);
        }

        self
    }

    /// Get a content type by name.
    ///
    /// Types which were never registered behave as a [`BasicContentType`]
    /// without special fields.
    pub fn get(&self, name: &str) -> &dyn ContentType<S> {
        match self.types.get(name) {
            Some(content_type) => content_type.as_ref(),
            None => &self.fallback,
        }
    }

    /// Is there a content type registered under this name?
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}

impl<S: Store> Default for ContentTypes<S> {
    fn default() -> Self {
        ContentTypes::new()
    }
}
