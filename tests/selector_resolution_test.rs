//! Ranked-candidate resolution against a scripted page

use notescout::selector::{
    ElementKey, Locator, ResolverSettings, SelectorCatalog, SelectorResolver, SelectorSpec,
};
use notescout::{BrowserSession, ErrorKind, PipelineError, RetryPolicy};
use std::time::Duration;

mod common;
use common::{FakeSession, notes};

fn fast() -> ResolverSettings {
    ResolverSettings {
        retry: RetryPolicy::new(2, 1),
        candidate_wait: Duration::from_millis(5),
        poll_interval: Duration::from_millis(1),
    }
}

async fn opened(session: FakeSession) -> FakeSession {
    session.open("https://example.test/list").await.unwrap();
    session
}

#[tokio::test]
async fn stops_at_first_matching_candidate() {
    let session = opened(FakeSession::new(vec![notes("a", 3)])).await;
    let catalog = SelectorCatalog::default();
    let resolver = SelectorResolver::new(&session, &catalog, fast());

    let a = Locator::css(".missing-a");
    let b = Locator::xpath("//div[@id='missing-b']");
    let c = Locator::css(".grid-card");
    let d = Locator::css("#content-core-notes");
    let spec = SelectorSpec::new(vec![a.clone(), b.clone(), c.clone(), d.clone()]);

    let resolved = resolver.resolve_spec("container", &spec, None).await.unwrap();
    assert_eq!(resolved.candidate_index, 2);
    assert_eq!(resolved.locator, c);
    assert_eq!(resolved.sweep, 1);

    let queried = session.queried();
    assert!(queried.contains(&a));
    assert!(queried.contains(&b));
    assert!(!queried.contains(&d), "candidate after the winner was queried");
}

#[tokio::test]
async fn falls_back_when_primary_locator_breaks() {
    let catalog = SelectorCatalog::default();
    let primary = catalog.get(ElementKey::ListItem).candidates()[0].clone();
    let session = opened(FakeSession::new(vec![notes("a", 4)]).with_dead_locator(primary)).await;
    let resolver = SelectorResolver::new(&session, &catalog, fast());

    let items = resolver.resolve(ElementKey::ListItem).await.unwrap();
    assert_eq!(items.candidate_index, 1);
    assert_eq!(items.matches.len(), 4);
    assert_eq!(items.handle, items.matches[0]);
}

#[tokio::test]
async fn exhausts_every_candidate_for_whole_budget() {
    let catalog = SelectorCatalog::default();
    let session = opened(FakeSession::new(vec![notes("a", 1)]).without_key(ElementKey::ListItem)).await;
    let resolver = SelectorResolver::new(&session, &catalog, fast());

    let err = resolver.resolve(ElementKey::ListItem).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ElementNotFound);
    match err {
        PipelineError::ElementNotFound {
            key,
            candidates,
            attempts,
        } => {
            assert_eq!(key, "list_item");
            assert_eq!(candidates, 3);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }

    // Every candidate was polled in both sweeps.
    for locator in catalog.get(ElementKey::ListItem).candidates() {
        let polls = session.queried().iter().filter(|q| *q == locator).count();
        assert!(polls >= 2, "{locator} polled {polls} time(s)");
    }
}

#[tokio::test]
async fn empty_spec_fails_without_querying() {
    let session = opened(FakeSession::new(vec![notes("a", 1)])).await;
    let catalog = SelectorCatalog::default();
    let resolver = SelectorResolver::new(&session, &catalog, fast());

    let err = resolver
        .resolve_spec("nothing", &SelectorSpec::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ElementNotFound { candidates: 0, .. }
    ));
    assert!(session.queried().is_empty());
}

#[tokio::test]
async fn scoped_lookup_and_optional_find() {
    let session = opened(FakeSession::new(vec![vec![
        common::FakeItem::note("露营灯推荐", "n1"),
        common::FakeItem::note("无链接", "n2").without_link(),
    ]]))
    .await;
    let catalog = SelectorCatalog::default();
    let resolver = SelectorResolver::new(&session, &catalog, fast());
    let items = resolver.resolve(ElementKey::ListItem).await.unwrap();

    let title = resolver
        .resolve_in(ElementKey::ItemTitle, Some(items.matches[0]))
        .await
        .unwrap();
    assert_eq!(session.read_text(title.handle).await.unwrap(), "露营灯推荐");

    let instant = resolver.with_settings(ResolverSettings::instant());
    let link = instant
        .find_in(ElementKey::ItemLink, Some(items.matches[1]))
        .await
        .unwrap();
    assert!(link.is_none());
}
