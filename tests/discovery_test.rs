//! Extraction, validation and aggregation over scripted list pages

use notescout::config::{Complete, KeywordRules, PipelineConfigBuilder, Precedence};
use notescout::discovery::{
    CursorState, DiscoveryAggregator, SessionDiscoverer, StopReason, run_discovery,
};
use notescout::records::{DiscoveredRecord, Metrics};
use notescout::selector::ElementKey;
use notescout::{Discoverer, ErrorKind, PipelineConfig, PipelineError, RetryPolicy};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tempfile::TempDir;

mod common;
use common::{FakeItem, FakeSession, notes, test_config};

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(30)
}

type Builder = PipelineConfigBuilder<Complete>;

fn config_with(dir: &TempDir, tweak: impl FnOnce(Builder) -> Builder) -> PipelineConfig {
    let builder = PipelineConfig::builder()
        .topic("露营")
        .output_dir(dir.path())
        .selector_retry(RetryPolicy::new(2, 1))
        .selector_wait(Duration::from_millis(5))
        .page_load_timeout(Duration::from_millis(50));
    tweak(builder).build().unwrap()
}

fn record(url: &str) -> DiscoveredRecord {
    DiscoveredRecord {
        title: url.to_string(),
        url: url.to_string(),
        note_id: None,
        metrics: Metrics::default(),
        relevant: true,
        relevance_score: 1.0,
        page: 1,
    }
}

#[test]
fn aggregator_keeps_first_seen_unique_urls() {
    // Each page: 10 unique urls plus 2 repeats; two urls overlap across pages.
    let page_one: Vec<_> = (0..10)
        .map(|i| record(&format!("https://x/a{i}")))
        .chain([record("https://x/a0"), record("https://x/a1")])
        .collect();
    let page_two: Vec<_> = ["https://x/a8", "https://x/a9"]
        .into_iter()
        .map(record)
        .chain((0..8).map(|i| record(&format!("https://x/b{i}"))))
        .chain([record("https://x/b0"), record("https://x/b1")])
        .collect();
    assert_eq!(page_one.len(), 12);
    assert_eq!(page_two.len(), 12);

    let mut aggregator = DiscoveryAggregator::new(200, 5);
    let first = aggregator.accept_page(page_one);
    let second = aggregator.accept_page(page_two);
    assert_eq!(first.accepted, 10);
    assert_eq!(second.accepted, 8);
    assert_eq!(aggregator.duplicates(), 6);

    let urls: Vec<_> = aggregator.into_records().into_iter().map(|r| r.url).collect();
    let expected: Vec<_> = (0..10)
        .map(|i| format!("https://x/a{i}"))
        .chain((0..8).map(|i| format!("https://x/b{i}")))
        .collect();
    assert_eq!(urls, expected);
}

#[test]
fn aggregator_stops_at_record_cap() {
    let mut aggregator = DiscoveryAggregator::new(3, 5);
    let merge = aggregator.accept_page((0..5).map(|i| record(&format!("https://x/{i}"))).collect());
    assert_eq!(merge.accepted, 3);
    assert_eq!(merge.over_cap, 2);
    assert!(aggregator.is_full());

    let refused = aggregator.accept_page(vec![record("https://x/9")]);
    assert!(refused.refused);
    assert_eq!(aggregator.records().len(), 3);
}

#[tokio::test]
async fn two_page_run_dedupes_across_pages() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let mut first = notes("a", 10);
    first.extend(notes("a", 2));
    let mut second = notes("a", 10).split_off(8);
    second.extend(notes("b", 8));
    second.extend(notes("b", 2));
    let session = FakeSession::new(vec![first, second]);

    let outcome = run_discovery(&session, &config, deadline()).await;
    assert_eq!(outcome.records.len(), 18);
    assert_eq!(outcome.duplicates, 6);
    assert_eq!(outcome.pages_loaded, 2);
    assert_eq!(
        outcome.final_cursor,
        CursorState::NoMore(StopReason::Exhausted)
    );

    let unique: HashSet<_> = outcome.records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(unique.len(), outcome.records.len());
    assert_eq!(outcome.records[0].url, "https://www.xiaohongshu.com/explore/a0");
    assert_eq!(outcome.records[0].note_id.as_deref(), Some("a0"));
    assert_eq!(outcome.records[17].page, 2);
}

#[tokio::test]
async fn max_pages_caps_clicks() {
    let dir = TempDir::new().unwrap();
    let config = config_with(&dir, |b| b.max_pages(2));
    let session = FakeSession::new((0..6).map(|p| notes(&format!("p{p}-"), 3)).collect());

    let outcome = run_discovery(&session, &config, deadline()).await;
    assert_eq!(outcome.pages_loaded, 2);
    assert_eq!(outcome.records.len(), 6);
    assert_eq!(session.clicks(), 1);
    assert_eq!(outcome.final_cursor, CursorState::NoMore(StopReason::PageCap));
}

#[tokio::test]
async fn metrics_parse_and_invalid_records_are_logged() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let session = FakeSession::new(vec![vec![
        FakeItem::note("露营帐篷测评", "ok1")
            .with_metric("总收藏量", "3千")
            .with_metric("总评论量", "150")
            .with_metric("总阅读量", "-"),
        FakeItem::note("", "notitle"),
        FakeItem::note("外链笔记", "x").without_link(),
        FakeItem {
            href: Some("https://evil.example.com/explore/1".into()),
            ..FakeItem::note("站外链接", "y")
        },
        FakeItem::note("坏指标", "bad").with_metric("总收藏量", "很多"),
    ]]);

    let outcome = run_discovery(&session, &config, deadline()).await;
    assert_eq!(outcome.records.len(), 1);
    let metrics = outcome.records[0].metrics;
    assert_eq!(metrics.impression, 12_000);
    assert_eq!(metrics.like, 356);
    assert_eq!(metrics.collect, 3_000);
    assert_eq!(metrics.comment, 150);
    assert_eq!(metrics.click, 0);

    assert_eq!(outcome.errors.len(), 4);
    assert!(
        outcome
            .errors
            .iter()
            .all(|e| e.kind() == ErrorKind::RecordValidationFailure)
    );
    let identities: Vec<_> = outcome.errors.iter().filter_map(PipelineError::record).collect();
    assert!(identities.contains(&"page 1 item 2"));
    assert!(identities.contains(&"外链笔记"));
}

#[tokio::test]
async fn consecutive_unreadable_items_abandon_page() {
    let dir = TempDir::new().unwrap();
    let config = config_with(&dir, |b| b.max_consecutive_item_failures(2));
    let session = FakeSession::new(vec![vec![
        FakeItem::note("露营灯", "l1"),
        FakeItem::unreadable(),
        FakeItem::unreadable(),
        FakeItem::note("露营椅", "l2"),
    ]]);

    let outcome = run_discovery(&session, &config, deadline()).await;
    let urls: Vec<_> = outcome.records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["https://www.xiaohongshu.com/explore/l1"]);
    assert_eq!(outcome.errors.len(), 2);
}

#[tokio::test]
async fn relevance_filtering_honours_precedence() {
    let items = || {
        vec![vec![
            FakeItem::note("露营装备清单", "r1"),
            FakeItem::note("露营广告合集", "r2"),
            FakeItem::note("城市咖啡馆", "r3"),
        ]]
    };
    let rules = KeywordRules::new(["露营"], ["广告"]);

    let dir = TempDir::new().unwrap();
    let exclude_wins = config_with(&dir, |b| b.keywords(rules.clone()).relevant_only(true));
    let outcome = run_discovery(&FakeSession::new(items()), &exclude_wins, deadline()).await;
    let titles: Vec<_> = outcome.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["露营装备清单"]);
    assert_eq!(outcome.irrelevant_dropped, 2);

    let target_wins = config_with(&dir, |b| {
        b.keywords(rules.clone().with_precedence(Precedence::TargetWins))
            .relevant_only(true)
    });
    let outcome = run_discovery(&FakeSession::new(items()), &target_wins, deadline()).await;
    let titles: Vec<_> = outcome.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["露营装备清单", "露营广告合集"]);

    let keep_all = config_with(&dir, |b| b.keywords(rules.clone()));
    let outcome = run_discovery(&FakeSession::new(items()), &keep_all, deadline()).await;
    assert_eq!(outcome.records.len(), 3);
    assert!(!outcome.records[2].relevant);
    assert_eq!(outcome.records[2].relevance_score, 0.0);
}

#[tokio::test]
async fn modal_cards_are_gated_before_opening() {
    let dir = TempDir::new().unwrap();
    let rules = KeywordRules::new(["露营"], ["广告"]);
    let config = config_with(&dir, |b| b.keywords(rules).relevant_only(true));
    let session = FakeSession::new(vec![
        vec![
            FakeItem::note("露营装备清单", "m1").with_metric("总收藏量", "3千"),
            FakeItem::note("城市咖啡馆", "m2"),
            FakeItem::note("露营灯推荐", "m3").without_link(),
        ],
        vec![
            FakeItem::note("露营广告合集", "m4"),
            // Same title as a card already read, under another url.
            FakeItem::note("露营装备清单", "m6"),
            FakeItem::note("露营椅", "m5").without_shared_link(),
        ],
    ])
    .with_detail_modal();

    let outcome = run_discovery(&session, &config, deadline()).await;
    assert_eq!(session.detail_opens(), vec!["露营装备清单", "露营灯推荐", "露营椅"]);
    assert_eq!(session.detail_closes(), 3);
    assert_eq!(outcome.irrelevant_dropped, 2);
    assert_eq!(outcome.duplicates, 1);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);

    let urls: Vec<_> = outcome.records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://www.xiaohongshu.com/explore/m1?xsec_source=share",
            "https://www.xiaohongshu.com/explore/m3?xsec_source=share",
            "https://www.xiaohongshu.com/explore/m5",
        ]
    );
    assert_eq!(outcome.records[0].note_id.as_deref(), Some("m1"));

    // Metrics exist only inside the modal.
    let metrics = outcome.records[0].metrics;
    assert_eq!(metrics.impression, 12_000);
    assert_eq!(metrics.like, 356);
    assert_eq!(metrics.collect, 3_000);
}

#[tokio::test]
async fn modal_that_never_renders_is_still_closed() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let session = FakeSession::new(vec![notes("a", 2)])
        .with_detail_modal()
        .without_key(ElementKey::DetailTitle);

    let outcome = run_discovery(&session, &config, deadline()).await;
    assert!(outcome.records.is_empty());
    assert_eq!(session.detail_opens().len(), 2);
    assert_eq!(session.detail_closes(), 2);
    assert_eq!(outcome.errors.len(), 2);
    assert!(
        outcome
            .errors
            .iter()
            .all(|e| e.kind() == ErrorKind::RecordValidationFailure
                && e.to_string().contains("unreadable item"))
    );
}

#[tokio::test]
async fn broken_list_page_yields_empty_outcome_with_errors() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let session = FakeSession::new(vec![notes("a", 3)])
        .without_key(ElementKey::ListContainer);

    let discoverer = SessionDiscoverer::new(session);
    let outcome = discoverer.discover(&config, deadline()).await.unwrap();
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.final_cursor, CursorState::Error);
    assert_eq!(outcome.errors[0].kind(), ErrorKind::NavigationTimeout);
}

#[tokio::test]
async fn expired_deadline_stops_before_first_page() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let session = FakeSession::new(vec![notes("a", 3)]);

    let outcome = run_discovery(&session, &config, Instant::now()).await;
    assert!(outcome.timed_out);
    assert!(outcome.records.is_empty());
    assert!(session.opens().is_empty());
    assert_eq!(outcome.errors.last().unwrap().kind(), ErrorKind::StageTimeout);
}
