//! Test doubles shared by the notescout integration tests

#![allow(dead_code)]

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use notescout::collaborators::{Analyzer, BusinessContext, StrategyInput, Strategist};
use notescout::fetch::{DetailApi, DetailFields, FetchError};
use notescout::pipeline::{PipelineState, StateStore};
use notescout::records::DetailedRecord;
use notescout::selector::{ElementKey, Locator, SelectorCatalog};
use notescout::{BrowserSession, ElementHandle, PipelineConfig, PipelineError, RetryPolicy};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const KEYS: [ElementKey; 12] = [
    ElementKey::ListContainer,
    ElementKey::ListItem,
    ElementKey::ItemTitle,
    ElementKey::ItemLink,
    ElementKey::MetricCell,
    ElementKey::MetricLabel,
    ElementKey::MetricValue,
    ElementKey::NextPage,
    ElementKey::DetailTrigger,
    ElementKey::DetailTitle,
    ElementKey::DetailLink,
    ElementKey::DetailClose,
];

/// Config with millisecond-scale waits so failure paths finish quickly.
pub fn test_config(output_dir: &Path) -> PipelineConfig {
    PipelineConfig::builder()
        .topic("露营")
        .output_dir(output_dir)
        .selector_retry(RetryPolicy::new(2, 1))
        .selector_wait(Duration::from_millis(5))
        .page_load_timeout(Duration::from_millis(50))
        .fetch_retry(RetryPolicy::new(3, 1))
        .build()
        .unwrap()
}

/// One list card.
#[derive(Debug, Clone, Default)]
pub struct FakeItem {
    pub title: Option<String>,
    pub href: Option<String>,
    pub metrics: Vec<(String, String)>,
    /// Url behind the detail modal's copy-link control.
    pub shared_link: Option<String>,
    /// Reading the title fails, as with a card detached mid-read.
    pub unreadable: bool,
}

impl FakeItem {
    pub fn note(title: &str, id: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            href: Some(format!("/explore/{id}")),
            metrics: vec![
                ("总曝光量".to_string(), "1.2万".to_string()),
                ("总点赞量".to_string(), "356".to_string()),
            ],
            shared_link: Some(format!("https://www.xiaohongshu.com/explore/{id}?xsec_source=share")),
            unreadable: false,
        }
    }

    pub fn with_metric(mut self, label: &str, value: &str) -> Self {
        self.metrics.push((label.to_string(), value.to_string()));
        self
    }

    /// No link on the card itself.
    pub fn without_link(mut self) -> Self {
        self.href = None;
        self
    }

    pub fn without_shared_link(mut self) -> Self {
        self.shared_link = None;
        self
    }

    pub fn unreadable() -> Self {
        Self {
            unreadable: true,
            ..Self::note("", "0")
        }
    }
}

/// `count` relevant notes with ids `{prefix}0..`.
pub fn notes(prefix: &str, count: usize) -> Vec<FakeItem> {
    (0..count)
        .map(|i| FakeItem::note(&format!("露营装备清单 {prefix}{i}"), &format!("{prefix}{i}")))
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Container,
    Item(usize, usize),
    Title(usize, usize),
    Link(usize, usize),
    Cell(usize, usize, usize),
    Label(usize, usize, usize),
    Value(usize, usize, usize),
    Next,
    Trigger(usize, usize),
    DetailTitle(usize, usize),
    SharedLink(usize, usize),
    Close,
}

#[derive(Default)]
struct FakeState {
    current: Option<usize>,
    nodes: HashMap<u64, Node>,
    next_id: u64,
    opens: Vec<String>,
    clicks: usize,
    queried: Vec<Locator>,
    /// Card whose detail modal is showing.
    open_detail: Option<(usize, usize)>,
    detail_opens: Vec<String>,
    detail_closes: usize,
}

/// Scripted list pages answering the default selector catalog.
///
/// Every candidate of a key matches unless marked dead. `NextPage` matches
/// while another page follows the current one.
///
/// Cards carry their metrics inline by default. With `with_detail_modal`
/// they only expose a trigger; metrics, the shared link, the modal title and
/// the close control appear page-wide after the trigger is clicked.
pub struct FakeSession {
    catalog: SelectorCatalog,
    pages: Vec<Vec<FakeItem>>,
    dead: HashSet<Locator>,
    load_confirms: bool,
    modal: bool,
    inert_last_next: bool,
    state: Mutex<FakeState>,
}

impl FakeSession {
    pub fn new(pages: Vec<Vec<FakeItem>>) -> Self {
        Self {
            catalog: SelectorCatalog::default(),
            pages,
            dead: HashSet::new(),
            load_confirms: true,
            modal: false,
            inert_last_next: false,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_dead_locator(mut self, locator: Locator) -> Self {
        self.dead.insert(locator);
        self
    }

    /// Every candidate for `key` stops matching.
    pub fn without_key(mut self, key: ElementKey) -> Self {
        let candidates = self.catalog.get(key).candidates().to_vec();
        self.dead.extend(candidates);
        self
    }

    pub fn with_failing_load(mut self) -> Self {
        self.load_confirms = false;
        self
    }

    pub fn with_detail_modal(mut self) -> Self {
        self.modal = true;
        self
    }

    /// The last page keeps a next control that does nothing when clicked.
    pub fn with_inert_last_next(mut self) -> Self {
        self.inert_last_next = true;
        self
    }

    /// Next-page clicks, including ones that changed nothing.
    pub fn clicks(&self) -> usize {
        self.state.lock().unwrap().clicks
    }

    /// Titles whose detail modal was opened, in order.
    pub fn detail_opens(&self) -> Vec<String> {
        self.state.lock().unwrap().detail_opens.clone()
    }

    pub fn detail_closes(&self) -> usize {
        self.state.lock().unwrap().detail_closes
    }

    pub fn opens(&self) -> Vec<String> {
        self.state.lock().unwrap().opens.clone()
    }

    pub fn queried(&self) -> Vec<Locator> {
        self.state.lock().unwrap().queried.clone()
    }

    fn key_of(&self, locator: &Locator) -> Option<ElementKey> {
        KEYS.into_iter()
            .find(|key| self.catalog.get(*key).candidates().contains(locator))
    }

    fn item(&self, page: usize, index: usize) -> &FakeItem {
        &self.pages[page][index]
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn open(&self, url: &str) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        st.opens.push(url.to_string());
        st.nodes.clear();
        st.current = Some(0);
        st.open_detail = None;
        Ok(())
    }

    async fn query(&self, locator: &Locator, scope: Option<ElementHandle>) -> Result<Vec<ElementHandle>> {
        let mut st = self.state.lock().unwrap();
        st.queried.push(locator.clone());

        let (Some(key), Some(page)) = (self.key_of(locator), st.current) else {
            return Ok(Vec::new());
        };
        if self.dead.contains(locator) {
            return Ok(Vec::new());
        }
        let scope = match scope {
            Some(handle) => Some(
                *st.nodes
                    .get(&handle.id())
                    .ok_or_else(|| anyhow!("stale handle {}", handle.id()))?,
            ),
            None => None,
        };

        let open = st.open_detail;
        let found: Vec<Node> = match (key, scope) {
            (ElementKey::ListContainer, None) => vec![Node::Container],
            (ElementKey::ListItem, None) => (0..self.pages[page].len())
                .map(|i| Node::Item(page, i))
                .collect(),
            (ElementKey::NextPage, None)
                if self.inert_last_next || page + 1 < self.pages.len() =>
            {
                vec![Node::Next]
            }
            (ElementKey::DetailTrigger, Some(Node::Item(p, i))) if self.modal => {
                vec![Node::Trigger(p, i)]
            }
            (ElementKey::MetricCell, Some(Node::Item(..))) if self.modal => Vec::new(),
            (ElementKey::MetricCell, None) => match open {
                Some((p, i)) => (0..self.item(p, i).metrics.len())
                    .map(|j| Node::Cell(p, i, j))
                    .collect(),
                None => Vec::new(),
            },
            (ElementKey::DetailTitle, None) => open
                .map(|(p, i)| vec![Node::DetailTitle(p, i)])
                .unwrap_or_default(),
            (ElementKey::DetailLink, None) => open
                .filter(|&(p, i)| self.item(p, i).shared_link.is_some())
                .map(|(p, i)| vec![Node::SharedLink(p, i)])
                .unwrap_or_default(),
            (ElementKey::DetailClose, None) if open.is_some() => vec![Node::Close],
            (ElementKey::ItemTitle, Some(Node::Item(p, i))) => {
                let item = self.item(p, i);
                if item.title.is_some() || item.unreadable {
                    vec![Node::Title(p, i)]
                } else {
                    Vec::new()
                }
            }
            (ElementKey::ItemLink, Some(Node::Item(p, i))) if self.item(p, i).href.is_some() => {
                vec![Node::Link(p, i)]
            }
            (ElementKey::MetricCell, Some(Node::Item(p, i))) => (0..self.item(p, i).metrics.len())
                .map(|j| Node::Cell(p, i, j))
                .collect(),
            (ElementKey::MetricLabel, Some(Node::Cell(p, i, j))) => vec![Node::Label(p, i, j)],
            (ElementKey::MetricValue, Some(Node::Cell(p, i, j))) => vec![Node::Value(p, i, j)],
            _ => Vec::new(),
        };

        Ok(found
            .into_iter()
            .map(|node| {
                st.next_id += 1;
                let id = st.next_id;
                st.nodes.insert(id, node);
                ElementHandle::new(id)
            })
            .collect())
    }

    async fn read_text(&self, handle: ElementHandle) -> Result<String> {
        let st = self.state.lock().unwrap();
        match st.nodes.get(&handle.id()) {
            Some(Node::Title(p, i)) => {
                let item = self.item(*p, *i);
                if item.unreadable {
                    bail!("node detached");
                }
                Ok(item.title.clone().unwrap_or_default())
            }
            Some(Node::DetailTitle(p, i)) => Ok(self.item(*p, *i).title.clone().unwrap_or_default()),
            Some(Node::Label(p, i, j)) => Ok(self.item(*p, *i).metrics[*j].0.clone()),
            Some(Node::Value(p, i, j)) => Ok(self.item(*p, *i).metrics[*j].1.clone()),
            Some(_) => Ok(String::new()),
            None => bail!("stale handle {}", handle.id()),
        }
    }

    async fn read_attribute(&self, handle: ElementHandle, name: &str) -> Result<Option<String>> {
        let st = self.state.lock().unwrap();
        match st.nodes.get(&handle.id()) {
            Some(Node::Link(p, i)) if name == "href" => Ok(self.item(*p, *i).href.clone()),
            Some(Node::SharedLink(p, i)) if name == "data-clipboard-text" => {
                Ok(self.item(*p, *i).shared_link.clone())
            }
            Some(_) => Ok(None),
            None => bail!("stale handle {}", handle.id()),
        }
    }

    async fn click(&self, handle: ElementHandle) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        match st.nodes.get(&handle.id()).copied() {
            Some(Node::Next) => {
                st.clicks += 1;
                let page = st.current.unwrap_or(0);
                if page + 1 < self.pages.len() {
                    st.current = Some(page + 1);
                    st.nodes.clear();
                    st.open_detail = None;
                }
                Ok(())
            }
            Some(Node::Trigger(p, i)) => {
                st.open_detail = Some((p, i));
                let title = self.item(p, i).title.clone().unwrap_or_default();
                st.detail_opens.push(title);
                Ok(())
            }
            Some(Node::Close) => {
                st.open_detail = None;
                st.detail_closes += 1;
                Ok(())
            }
            Some(_) => Ok(()),
            None => bail!("stale handle {}", handle.id()),
        }
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<bool> {
        Ok(self.load_confirms)
    }
}

/// Detail API answering from a script; unscripted urls succeed.
#[derive(Default)]
pub struct ScriptedDetailApi {
    failures: Mutex<HashMap<String, (FetchError, usize)>>,
    calls: Mutex<Vec<String>>,
    unhealthy: bool,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedDetailApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `url` with `err` for the next `times` calls.
    pub fn fail(self, url: &str, err: FetchError, times: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(url.to_string(), (err, times));
        self
    }

    pub fn always_fail(self, url: &str, err: FetchError) -> Self {
        self.fail(url, err, usize::MAX)
    }

    pub fn unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls().iter().filter(|u| *u == url).count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetailApi for ScriptedDetailApi {
    async fn health(&self) -> bool {
        !self.unhealthy
    }

    async fn fetch_detail(
        &self,
        url: &str,
        _fetch_comments: bool,
    ) -> std::result::Result<DetailFields, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut failures = self.failures.lock().unwrap();
        if let Some((err, remaining)) = failures.get_mut(url)
            && *remaining > 0
        {
            *remaining = remaining.saturating_sub(1);
            return Err(err.clone());
        }
        Ok(DetailFields {
            content: format!("content of {url}"),
            tags: vec!["露营".to_string()],
            ..DetailFields::default()
        })
    }
}

/// Scores every record 85 with fixed factors; listed urls get a bad payload.
#[derive(Default)]
pub struct FakeAnalyzer {
    malformed: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn malformed_for(mut self, url: &str) -> Self {
        self.malformed.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze(
        &self,
        record: &DetailedRecord,
        context: &BusinessContext,
    ) -> notescout::Result<Value> {
        self.calls.lock().unwrap().push(record.url().to_string());
        if self.malformed.contains(record.url()) {
            return Ok(json!("not an object"));
        }
        Ok(json!({
            "topic": context.topic,
            "overall_score": 85.0,
            "success_factors": ["清单体标题", "真实场景图"],
        }))
    }
}

#[derive(Default)]
pub struct FakeStrategist {
    fail: bool,
    calls: AtomicUsize,
    seen_analyses: AtomicUsize,
}

impl FakeStrategist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_analyses(&self) -> usize {
        self.seen_analyses.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Strategist for FakeStrategist {
    async fn strategize(&self, input: &StrategyInput<'_>) -> notescout::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_analyses.store(input.analyses.len(), Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::collaborator("strategy", "model unavailable"));
        }
        Ok(json!({
            "topic": input.context.topic,
            "formulas": input.summary.success_formulas.len(),
            "titles": ["周末露营装备清单"],
        }))
    }
}

/// Keeps the last saved snapshot in memory and records each save.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<PipelineState>>,
    saves: Mutex<Vec<PipelineState>>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(state: PipelineState) -> Self {
        Self {
            snapshot: Mutex::new(Some(state)),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> Option<PipelineState> {
        self.snapshot.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<PipelineState> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> notescout::Result<Option<PipelineState>> {
        Ok(self.snapshot())
    }

    async fn save(&self, state: &PipelineState) -> notescout::Result<()> {
        if self.fail_saves {
            return Err(PipelineError::Persistence("disk full".to_string()));
        }
        self.saves.lock().unwrap().push(state.clone());
        *self.snapshot.lock().unwrap() = Some(state.clone());
        Ok(())
    }

    async fn reset(&self) -> notescout::Result<()> {
        *self.snapshot.lock().unwrap() = None;
        Ok(())
    }
}
