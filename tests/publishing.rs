//! Tests for publishing, unpublishing and reverting drafts.

use chrono::Utc;
use failure::Fallible;
use publisher::{
    ApiError,
    ErrorKind,
    events::Event,
    models::{PublishError, Record},
};
use serde_json::json;

mod common;

use self::common::{ARTICLE, Env, PAGE};

#[publisher::test]
fn publishing_creates_published_copy(env: Env) -> Fallible<()> {
    let mut draft = env.create(ARTICLE, "dog")?;
    let public = env.publisher.publish(&mut draft)?;

    let published = Record::published(env.store(), ARTICLE)?;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].title(), Some("dog"));
    assert_eq!(Record::drafts(env.store(), ARTICLE)?.len(), 1);

    assert!(public.is_published());
    assert_eq!(public.linked, Some(draft.id));
    assert_eq!(draft.linked, Some(public.id));
    assert!(draft.published_at.is_some());
    assert_eq!(public.published_at, draft.published_at);

    assert_eq!(env.reload(&draft)?, draft);

    Ok(())
}

#[publisher::test]
fn unpublish_and_publish_again(env: Env) -> Fallible<()> {
    let mut draft = env.create(ARTICLE, "donkey")?;
    env.publisher.publish(&mut draft)?;

    let unpublished_at = Utc::now().naive_utc();
    env.publisher.unpublish(&mut draft)?;

    assert_eq!(env.counts(ARTICLE)?, (1, 0));
    assert_eq!(draft.linked, None);
    assert_eq!(draft.published_at, None);
    assert_eq!(env.reload(&draft)?.published_at, None);
    assert!(env.is_dirty(&draft)?);

    env.publisher.publish(&mut draft)?;

    assert_eq!(env.counts(ARTICLE)?, (1, 1));
    assert!(draft.published_at.unwrap() >= unpublished_at);

    Ok(())
}

#[publisher::test]
fn revert_discards_draft_changes(env: Env) -> Fallible<()> {
    let mut draft = env.create(ARTICLE, "wolf")?;
    env.publisher.publish(&mut draft)?;
    let published_at = draft.published_at;

    draft.set_field("title", "white wolf");
    draft.save(env.store())?;
    assert!(env.is_dirty(&draft)?);

    let old = draft.id;
    let reverted = env.publisher.revert_to_public(draft)?;

    assert_eq!(reverted.title(), Some("wolf"));
    assert!(reverted.is_draft);
    assert_ne!(reverted.id, old);
    assert!(Record::by_id(env.store(), old).is_err());
    assert!(!env.is_dirty(&reverted)?);
    assert_eq!(reverted.published_at, published_at);

    let public = reverted.get_public(env.store())?.unwrap();
    assert_eq!(public.title(), Some("wolf"));
    assert_eq!(public.linked, Some(reverted.id));
    assert_eq!(env.counts(ARTICLE)?, (1, 1));

    Ok(())
}

#[publisher::test]
fn publishing_makes_draft_clean(env: Env) -> Fallible<()> {
    let mut draft = env.create(ARTICLE, "cat")?;
    assert!(env.is_dirty(&draft)?);

    env.publisher.publish(&mut draft)?;
    assert!(!env.is_dirty(&draft)?);

    draft.set_field("title", "black cat");
    draft.save(env.store())?;
    assert!(env.is_dirty(&draft)?);
    assert!(env.is_dirty(&env.reload(&draft)?)?);

    let public = env.publisher.publish(&mut draft)?;
    assert!(!env.is_dirty(&draft)?);
    assert_eq!(public.title(), Some("black cat"));

    Ok(())
}

#[publisher::test]
fn publishing_clean_draft_changes_nothing(env: Env) -> Fallible<()> {
    let mut draft = env.create(ARTICLE, "horse")?;
    let public = env.publisher.publish(&mut draft)?;

    env.clear_events();
    let records = env.store().record_count();

    let again = env.publisher.publish(&mut draft)?;

    assert_eq!(again, public);
    assert_eq!(again.published_at, public.published_at);
    assert_eq!(env.store().record_count(), records);
    assert!(env.events().is_empty());

    Ok(())
}

#[publisher::test]
fn republishing_keeps_publication_date(env: Env) -> Fallible<()> {
    let mut draft = env.create(ARTICLE, "goat")?;
    let first = env.publisher.publish(&mut draft)?;

    draft.set_field("title", "mountain goat");
    draft.save(env.store())?;
    let second = env.publisher.publish(&mut draft)?;

    assert_ne!(first.id, second.id);
    assert!(Record::by_id(env.store(), first.id).is_err());
    assert_eq!(second.published_at, first.published_at);
    assert_eq!(draft.published_at, first.published_at);

    Ok(())
}

#[publisher::test]
fn events_are_fired_in_order(env: Env) -> Fallible<()> {
    let mut draft = env.create(ARTICLE, "hen")?;

    env.publisher.publish(&mut draft)?;
    assert_eq!(env.events(), [
        (Event::PrePublish, draft.id),
        (Event::PreSaveDraft, draft.id),
        (Event::PostPublish, draft.id),
    ]);

    env.clear_events();
    env.publisher.unpublish(&mut draft)?;
    assert_eq!(env.events(), [
        (Event::PreUnpublish, draft.id),
        (Event::PostUnpublish, draft.id),
    ]);

    env.clear_events();
    env.publisher.unpublish(&mut draft)?;
    assert!(env.events().is_empty());

    Ok(())
}

#[publisher::test]
fn only_drafts_can_be_published(env: Env) -> Fallible<()> {
    let mut draft = env.create(ARTICLE, "pig")?;
    let mut public = env.publisher.publish(&mut draft)?;

    match env.publisher.publish(&mut public) {
        Err(ref err @ PublishError::NotDraft(..)) => {
            assert_eq!(err.kind(), ErrorKind::Invalid);
            assert_eq!(err.code().as_ref().map(|c| c.as_ref()),
                Some("publisher:not-draft"));
        }
        other => panic!("unexpected result: {:?}", other),
    }

    match env.publisher.unpublish(&mut public) {
        Err(PublishError::NotDraft(_, id)) => assert_eq!(id, public.id),
        other => panic!("unexpected result: {:?}", other),
    }

    match env.publisher.revert_to_public(public.clone()) {
        Err(PublishError::NotDraft(_, id)) => assert_eq!(id, public.id),
        other => panic!("unexpected result: {:?}", other),
    }

    assert_eq!(env.counts(ARTICLE)?, (1, 1));

    Ok(())
}

#[publisher::test]
fn empty_on_publish_fields_are_not_published(env: Env) -> Fallible<()> {
    let mut draft = Record::create(env.store(), ARTICLE, json!({
        "title": "owl",
        "slug": "night-owl",
    }))?;

    let public = env.publisher.publish(&mut draft)?;

    assert_eq!(public.title(), Some("owl"));
    assert_eq!(public.field("slug"), None);
    assert_eq!(draft.field("slug"), Some(&json!("night-owl")));

    Ok(())
}

#[publisher::test]
fn unsaved_changes_are_not_published(env: Env) -> Fallible<()> {
    let mut draft = env.create(ARTICLE, "dog")?;
    draft.set_field("title", "cat");

    let public = env.publisher.publish(&mut draft)?;

    assert_eq!(public.title(), Some("dog"));
    assert_eq!(draft.title(), Some("dog"));

    Ok(())
}

#[publisher::test]
fn unpublished_draft_has_nothing_to_revert(env: Env) -> Fallible<()> {
    let mut draft = env.create(ARTICLE, "mouse")?;

    env.publisher.unpublish(&mut draft)?;
    assert_eq!(draft.linked, None);

    let reverted = env.publisher.revert_to_public(draft.clone())?;
    assert_eq!(reverted, draft);

    assert!(env.events().is_empty());
    assert_eq!(env.counts(ARTICLE)?, (1, 0));

    Ok(())
}

#[publisher::test]
fn embedded_content_is_cloned_in_order(env: Env) -> Fallible<()> {
    let mut page = env.create(PAGE, "home")?;
    let block = env.pages.add_block(page.id, "hello");

    let public = env.publisher.publish(&mut page)?;

    assert_eq!(env.pages.calls(), ["translations", "embedded", "relations"]);

    let copies = env.pages.blocks(public.id);
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].text, "hello");
    assert_ne!(copies[0].id, block);

    env.pages.clear_calls();
    page.set_field("title", "welcome");
    page.save(env.store())?;
    let public = env.publisher.publish(&mut page)?;

    assert_eq!(env.pages.calls(), ["repair", "translations", "embedded", "relations"]);
    assert_eq!(public.title(), Some("welcome"));

    Ok(())
}

#[publisher::test]
fn embedded_content_changes_make_draft_dirty(env: Env) -> Fallible<()> {
    let mut page = env.create(PAGE, "home")?;
    env.pages.add_block(page.id, "hello");
    env.publisher.publish(&mut page)?;

    assert!(!env.is_dirty(&page)?);

    env.pages.edit_block(page.id, 0, "hello, world");
    assert!(env.is_dirty(&page)?);

    let public = env.publisher.publish(&mut page)?;
    assert!(!env.is_dirty(&page)?);
    assert_eq!(env.pages.blocks(public.id)[0].text, "hello, world");

    Ok(())
}

#[publisher::test]
fn shared_embedded_content_is_repaired(env: Env) -> Fallible<()> {
    let mut page = env.create(PAGE, "home")?;
    env.pages.add_block(page.id, "hello");
    let public = env.publisher.publish(&mut page)?;

    env.pages.share_blocks(page.id, public.id);

    page.set_field("title", "welcome");
    page.save(env.store())?;
    env.publisher.publish(&mut page)?;

    let draft_blocks = env.pages.blocks(page.id);
    assert_eq!(draft_blocks.len(), 1);
    assert_eq!(draft_blocks[0].text, "hello");

    assert!(env.pages.blocks(public.id)
        .iter()
        .all(|old| draft_blocks.iter().all(|block| block.id != old.id)));

    Ok(())
}

#[publisher::test]
fn failed_publish_changes_nothing(env: Env) -> Fallible<()> {
    let mut page = env.create(PAGE, "home")?;
    let public = env.publisher.publish(&mut page)?;

    page.set_field("title", "away");
    page.save(env.store())?;

    env.pages.fail_relations(true);
    env.clear_events();
    let before = page.clone();

    match env.publisher.publish(&mut page) {
        Err(ref err @ PublishError::Content { .. }) => {
            assert_eq!(err.kind(), ErrorKind::Internal);
            assert_eq!(err.code(), None);
        }
        other => panic!("unexpected result: {:?}", other),
    }

    assert_eq!(page, before);
    assert_eq!(env.reload(&page)?, before);
    assert_eq!(env.reload(&public)?.title(), Some("home"));
    assert_eq!(env.counts(PAGE)?, (1, 1));
    assert!(env.events().iter().all(|&(event, _)| event != Event::PostPublish));

    Ok(())
}
