//! Publishing environment shared by integration tests.

use chrono::{NaiveDateTime, Utc};
use failure::{Error, err_msg};
use publisher::{
    events::Event,
    models::{BasicContentType, ContentType, ContentTypes, Publisher, Record, Workflow},
    permissions::{PermissionBits, StaticPermissions},
    store::{MemoryStore, Store, StoreError},
};
use serde_json::json;
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use super::support::Fixture;

/// User who can ask for records to be published.
pub const REPORTER: i32 = 1;

/// User who can publish records, and reply to requests.
pub const EDITOR: i32 = 2;

/// User without any permissions.
pub const OUTSIDER: i32 = 3;

/// Content type with a `slug` field which is not published.
pub const ARTICLE: &str = "article";

/// Content type with embedded blocks, see [`Pages`].
pub const PAGE: &str = "page";

/// Publisher with its collaborators, over a store of type `S`.
pub struct Env<S = MemoryStore> {
    pub publisher: Publisher<S>,
    pub permissions: StaticPermissions,
    pub pages: Pages,
    events: Rc<RefCell<Vec<(Event, i32)>>>,
}

impl<S: Store> Env<S> {
    pub fn new(store: S) -> Self {
        let pages = Pages::default();

        let mut types = ContentTypes::<S>::new();
        types
            .register(BasicContentType::new(ARTICLE, vec!["slug".to_string()]))
            .register(pages.clone());

        let mut publisher = Publisher::new(store, types);

        let events = Rc::new(RefCell::new(Vec::new()));
        let log = events.clone();
        publisher.register_listener(move |event: Event, draft: &Record| {
            log.borrow_mut().push((event, draft.id));
        });

        let mut permissions = StaticPermissions::new();
        for &content_type in &[ARTICLE, PAGE] {
            permissions
                .grant(REPORTER, content_type, PermissionBits::ASK_REQUEST)
                .grant(EDITOR, content_type, PermissionBits::all());
        }

        Env { publisher, permissions, pages, events }
    }

    pub fn store(&self) -> &S {
        self.publisher.store()
    }

    pub fn workflow(&self) -> Workflow<S, StaticPermissions> {
        Workflow::new(&self.publisher, &self.permissions)
    }

    /// Create a new draft with a title.
    pub fn create(&self, content_type: &str, title: &str) -> Result<Record, StoreError> {
        Record::create(self.store(), content_type, json!({ "title": title }))
    }

    /// Reload a record from the store.
    pub fn reload(&self, record: &Record) -> Result<Record, Error> {
        Ok(Record::by_id(self.store(), record.id)?)
    }

    pub fn is_dirty(&self, record: &Record) -> Result<bool, Error> {
        Ok(self.publisher.is_dirty(record)?)
    }

    /// Events fired so far, with IDs of drafts they were fired for.
    pub fn events(&self) -> Vec<(Event, i32)> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    /// Number of records in the store, drafts and published.
    pub fn counts(&self, content_type: &str) -> Result<(usize, usize), Error> {
        Ok((
            Record::drafts(self.store(), content_type)?.len(),
            Record::published(self.store(), content_type)?.len(),
        ))
    }
}

impl Fixture for Env {
    fn make() -> Result<Self, Error> {
        Ok(Env::new(MemoryStore::new()))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub id: i32,
    pub text: String,
    pub changed_at: NaiveDateTime,
}

#[derive(Debug, Default)]
struct PagesState {
    blocks: HashMap<i32, Vec<Block>>,
    last_block: i32,
    calls: Vec<&'static str>,
    fail_relations: bool,
}

impl PagesState {
    fn next_id(&mut self) -> i32 {
        self.last_block += 1;
        self.last_block
    }
}

/// Content type keeping rich content as blocks embedded in records, outside
/// of their fields.
#[derive(Clone, Debug, Default)]
pub struct Pages {
    state: Rc<RefCell<PagesState>>,
}

impl Pages {
    /// Add a new block to a record.
    pub fn add_block(&self, record: i32, text: &str) -> i32 {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();

        state.blocks.entry(record).or_default().push(Block {
            id,
            text: text.to_string(),
            changed_at: Utc::now().naive_utc(),
        });

        id
    }

    /// Change text of a record's block.
    pub fn edit_block(&self, record: i32, index: usize, text: &str) {
        let mut state = self.state.borrow_mut();
        let block = &mut state.blocks.get_mut(&record).unwrap()[index];

        block.text = text.to_string();
        block.changed_at = Utc::now().naive_utc();
    }

    pub fn blocks(&self, record: i32) -> Vec<Block> {
        self.state.borrow().blocks.get(&record).cloned().unwrap_or_default()
    }

    /// Make `dst` use the very same blocks as `src`.
    pub fn share_blocks(&self, src: i32, dst: i32) {
        let mut state = self.state.borrow_mut();
        let blocks = state.blocks.get(&src).cloned().unwrap_or_default();
        state.blocks.insert(dst, blocks);
    }

    /// Names of collaborator methods called so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Make cloning of relations fail.
    pub fn fail_relations(&self, fail: bool) {
        self.state.borrow_mut().fail_relations = fail;
    }
}

impl<S> ContentType<S> for Pages {
    fn name(&self) -> &str {
        PAGE
    }

    fn content_modified_at(&self, _: &S, draft: &Record)
    -> Result<Option<NaiveDateTime>, Error> {
        Ok(self.blocks(draft.id).iter().map(|block| block.changed_at).max())
    }

    fn repair_shared_content(&self, _: &S, draft: &Record, public: &Record)
    -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        state.calls.push("repair");

        let draft_ids = state.blocks.get(&draft.id)
            .map(|blocks| blocks.iter().map(|b| b.id).collect::<Vec<_>>())
            .unwrap_or_default();

        let mut blocks = state.blocks.remove(&public.id).unwrap_or_default();
        for block in &mut blocks {
            if draft_ids.contains(&block.id) {
                block.id = state.next_id();
            }
        }
        state.blocks.insert(public.id, blocks);

        Ok(())
    }

    fn clone_translations(&self, _: &S, _: &Record, _: &Record)
    -> Result<(), Error> {
        self.state.borrow_mut().calls.push("translations");
        Ok(())
    }

    fn clone_embedded_content(&self, _: &S, src: &Record, dst: &Record)
    -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        state.calls.push("embedded");

        let blocks = state.blocks.get(&src.id).cloned().unwrap_or_default();
        let copies = blocks.into_iter()
            .map(|block| Block { id: state.next_id(), ..block })
            .collect::<Vec<_>>();

        state.blocks.insert(dst.id, copies);

        Ok(())
    }

    fn clone_relations(&self, _: &S, _: &Record, _: &Record)
    -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        state.calls.push("relations");

        if state.fail_relations {
            return Err(err_msg("relations are unavailable"));
        }

        Ok(())
    }
}
