use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use log::{debug, info, warn};
use tokio::task::{JoinHandle, spawn_local};
use tokio::time::sleep;

use crate::modules::config::ConsoleConfig;
use crate::modules::confirm::{ConfirmationGate, Decision};
use crate::modules::focus::{FocusTrap, Key, RovingTabs, TrapOutcome};
use crate::modules::http::{HttpClient, Method, encode_segment};
use crate::modules::i18n::TranslationBridge;
use crate::modules::location::Location;
use crate::modules::notify::NotificationCenter;
use crate::modules::pagination::Pagination;
use crate::modules::query::{Capabilities, ListQuery, SortColumn, SortOrder, TagMode, parse_rating};
use crate::modules::types::{ListMeta, ListPage, Record, Source};

/// Optional detail fields, in display order.
const DETAIL_FIELDS: [&str; 15] = [
    "title",
    "title_cn",
    "slug",
    "difficulty",
    "rating",
    "ac_rate",
    "contest",
    "problem_index",
    "category",
    "tags",
    "link",
    "paid_only",
    "similar_questions",
    "content",
    "content_cn",
];

const DETAIL_CLOSE: &str = "detail-close";
const DETAIL_LINK: &str = "detail-link";
const DETAIL_DELETE: &str = "detail-delete";

/// Everything the user can do to the list.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserAction {
    /// Keystroke in the search box; applied after the search quiet period.
    SetSearch(String),
    /// Enter in the search box; applied at once.
    SubmitSearch(String),
    SetDifficulty(String),
    ToggleTag(String),
    ClearTags,
    SetTagMode(TagMode),
    /// Keystrokes in the rating bounds; applied after the rating quiet period.
    SetRatingMin(String),
    SetRatingMax(String),
    SortBy(SortColumn),
    GoToPage(u32),
    SetPerPage(u32),
    SwitchSource(Source),
    /// Key pressed while focus is on the source tab list.
    TabKey(Key),
    Reload,
}

struct DetailModal {
    source: Source,
    id: String,
    record: Option<Record>,
    trap: FocusTrap,
}

struct BrowserState {
    query: ListQuery,
    search_input: String,
    rating_min_input: String,
    rating_max_input: String,
    rows: Vec<Record>,
    meta: Option<ListMeta>,
    loading: bool,
    load_failed: bool,
    vocabulary: Vec<String>,
    tabs: RovingTabs<Source>,
    detail: Option<DetailModal>,
    focused: Option<String>,
    list_seq: u64,
    detail_seq: u64,
    search_timer: Option<JoinHandle<()>>,
    rating_timer: Option<JoinHandle<()>>,
}

impl BrowserState {
    fn new(query: ListQuery) -> Self {
        Self {
            search_input: query.search.clone(),
            rating_min_input: bound_text(query.rating_min),
            rating_max_input: bound_text(query.rating_max),
            tabs: RovingTabs::new(Source::ALL.to_vec(), query.source),
            query,
            rows: Vec::new(),
            meta: None,
            loading: false,
            load_failed: false,
            vocabulary: Vec::new(),
            detail: None,
            focused: None,
            list_seq: 0,
            detail_seq: 0,
            search_timer: None,
            rating_timer: None,
        }
    }

    /// Fresh state for `query`. Request counters and tab focus survive so
    /// responses still in flight stay recognisably stale.
    fn reset(&mut self, query: ListQuery) {
        self.cancel_timers();
        *self = BrowserState {
            list_seq: self.list_seq,
            detail_seq: self.detail_seq + 1,
            focused: self.focused.take(),
            ..BrowserState::new(query)
        };
    }

    fn cancel_timers(&mut self) {
        for timer in [self.search_timer.take(), self.rating_timer.take()]
            .into_iter()
            .flatten()
        {
            timer.abort();
        }
    }
}

struct Inner {
    client: HttpClient,
    notices: NotificationCenter,
    i18n: Rc<TranslationBridge>,
    confirm: ConfirmationGate,
    location: Rc<dyn Location>,
    config: ConsoleConfig,
    state: RefCell<BrowserState>,
    dirty: Cell<bool>,
    subscription: Cell<u64>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.i18n.unsubscribe(self.subscription.get());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabView {
    pub source: Source,
    pub active: bool,
    pub tab_index: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagOption {
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHeader {
    pub column: SortColumn,
    pub sort: Option<SortOrder>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: String,
    pub title: String,
    pub difficulty: Option<String>,
    pub rating: Option<String>,
    pub ac_rate: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableBody {
    Loading,
    Rows(Vec<RowView>),
    Empty(String),
    /// Inline error row; the filters stay as they were.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub id: String,
    pub loading: bool,
    pub fields: Vec<(String, String)>,
    pub focused: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowserView {
    pub tabs: Vec<TabView>,
    pub capabilities: Capabilities,
    pub search: String,
    pub difficulty: String,
    pub rating_min: String,
    pub rating_max: String,
    pub tags: Vec<TagOption>,
    pub tag_mode: TagMode,
    pub tag_mode_label: String,
    pub columns: Vec<ColumnHeader>,
    pub body: TableBody,
    pub total: u64,
    pub pagination: Pagination,
    pub detail: Option<DetailView>,
}

/// Problem list with filters, sorting and paging mirrored into the URL.
///
/// Every query change goes through [`FilterableListBrowser::apply`], which
/// mutates, rewrites the URL and re-fetches as one step. List responses are
/// numbered and only the newest one is rendered.
#[derive(Clone)]
pub struct FilterableListBrowser {
    inner: Rc<Inner>,
}

impl FilterableListBrowser {
    pub fn new(
        client: HttpClient,
        notices: NotificationCenter,
        i18n: Rc<TranslationBridge>,
        confirm: ConfirmationGate,
        location: Rc<dyn Location>,
        config: ConsoleConfig,
    ) -> Self {
        let query = ListQuery::from_url_query(&location.query());
        let inner = Rc::new(Inner {
            client,
            notices,
            i18n,
            confirm,
            location,
            config,
            state: RefCell::new(BrowserState::new(query)),
            dirty: Cell::new(true),
            subscription: Cell::new(0),
        });

        let weak = Rc::downgrade(&inner);
        let id = inner.i18n.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.dirty.set(true);
            }
        });
        inner.subscription.set(id);

        Self { inner }
    }

    fn state(&self) -> Ref<'_, BrowserState> {
        self.inner.state.borrow()
    }

    fn state_mut(&self) -> RefMut<'_, BrowserState> {
        self.inner.dirty.set(true);
        self.inner.state.borrow_mut()
    }

    pub fn take_dirty(&self) -> bool {
        self.inner.dirty.replace(false)
    }

    pub fn query(&self) -> ListQuery {
        self.state().query.clone()
    }

    pub fn rows(&self) -> Vec<Record> {
        self.state().rows.clone()
    }

    pub fn vocabulary(&self) -> Vec<String> {
        self.state().vocabulary.clone()
    }

    /// Element that should hold keyboard focus outside any modal.
    pub fn focused(&self) -> Option<String> {
        self.state().focused.clone()
    }

    pub fn parse_from_url(&self) {
        let query = ListQuery::from_url_query(&self.inner.location.query());
        self.state_mut().reset(query);
    }

    /// Rewrite the current history entry's query; no new entry is pushed.
    pub fn sync_to_url(&self) {
        let url = self.state().query.to_url_query();
        self.inner.location.replace_query(&url);
    }

    /// Load state from the URL and fetch the first page plus the tag list.
    pub async fn init(&self) {
        self.parse_from_url();
        self.sync_to_url();
        tokio::join!(self.fetch(), self.load_tags());
    }

    /// Mutate, sync the URL, re-fetch.
    pub async fn apply(&self, mutate: impl FnOnce(&mut ListQuery)) {
        mutate(&mut self.state_mut().query);
        self.sync_to_url();
        self.fetch().await;
    }

    /// `apply` for anything except page navigation: back to page 1.
    pub async fn set_filter(&self, mutate: impl FnOnce(&mut ListQuery)) {
        self.apply(|query| {
            mutate(query);
            query.page = 1;
        })
        .await;
    }

    pub async fn dispatch(&self, action: BrowserAction) {
        debug!("browser action {action:?}");
        match action {
            BrowserAction::SetSearch(text) => {
                self.state_mut().search_input = text;
                self.schedule_search();
            }
            BrowserAction::SubmitSearch(text) => {
                {
                    let mut state = self.state_mut();
                    if let Some(timer) = state.search_timer.take() {
                        timer.abort();
                    }
                    state.search_input = text.clone();
                }
                self.set_filter(|q| q.set_search(&text)).await;
            }
            BrowserAction::SetDifficulty(difficulty) => {
                self.set_filter(|q| q.set_difficulty(&difficulty)).await;
            }
            BrowserAction::ToggleTag(tag) => self.set_filter(|q| q.toggle_tag(&tag)).await,
            BrowserAction::ClearTags => self.set_filter(|q| q.tags.clear()).await,
            BrowserAction::SetTagMode(mode) => self.set_filter(|q| q.tag_mode = mode).await,
            BrowserAction::SetRatingMin(text) => {
                self.state_mut().rating_min_input = text;
                self.schedule_rating();
            }
            BrowserAction::SetRatingMax(text) => {
                self.state_mut().rating_max_input = text;
                self.schedule_rating();
            }
            BrowserAction::SortBy(column) => {
                let next = self.state().query.next_sort(column);
                self.set_filter(|q| q.sort = next).await;
            }
            BrowserAction::GoToPage(page) => {
                let total_pages = self.state().meta.as_ref().map_or(1, |m| m.total_pages.max(1));
                let page = page.clamp(1, total_pages);
                self.apply(|q| q.page = page).await;
            }
            BrowserAction::SetPerPage(per_page) => {
                self.set_filter(|q| q.per_page = per_page.max(1)).await;
            }
            BrowserAction::SwitchSource(source) => self.switch_source(source).await,
            BrowserAction::TabKey(key) => {
                let activated = self.state_mut().tabs.handle(key);
                if let Some(source) = activated {
                    self.state_mut().focused = Some(format!("tab-{source}"));
                    self.switch_source(source).await;
                }
            }
            BrowserAction::Reload => self.fetch().await,
        }
    }

    fn schedule_search(&self) {
        let browser = self.clone();
        let delay = self.inner.config.timings.search_debounce();
        let timer = spawn_local(async move {
            sleep(delay).await;
            let text = {
                let mut state = browser.state_mut();
                state.search_timer = None;
                state.search_input.clone()
            };
            browser.set_filter(|q| q.set_search(&text)).await;
        });
        if let Some(old) = self.state_mut().search_timer.replace(timer) {
            old.abort();
        }
    }

    fn schedule_rating(&self) {
        let browser = self.clone();
        let delay = self.inner.config.timings.rating_debounce();
        let timer = spawn_local(async move {
            sleep(delay).await;
            let (min, max) = {
                let mut state = browser.state_mut();
                state.rating_timer = None;
                (
                    parse_rating(&state.rating_min_input),
                    parse_rating(&state.rating_max_input),
                )
            };
            browser
                .set_filter(|q| {
                    q.rating_min = min;
                    q.rating_max = max;
                })
                .await;
        });
        if let Some(old) = self.state_mut().rating_timer.replace(timer) {
            old.abort();
        }
    }

    /// Reset every filter for the new source, then reload rows and tags.
    pub async fn switch_source(&self, source: Source) {
        if self.state().query.source == source {
            return;
        }
        info!("switching problem source to {source}");
        self.state_mut().reset(ListQuery::for_source(source));
        self.sync_to_url();
        tokio::join!(self.fetch(), self.load_tags());
    }

    async fn fetch(&self) {
        let (seq, path) = {
            let mut state = self.state_mut();
            state.list_seq += 1;
            state.loading = true;
            let path = self
                .inner
                .config
                .api_path(&format!("problems/{}", state.query.source));
            (state.list_seq, format!("{path}?{}", state.query.api_query()))
        };

        let result = self.inner.client.get_json::<ListPage>(&path).await;

        let mut state = self.state_mut();
        if state.list_seq != seq {
            debug!("discarding stale problem list response #{seq}");
            return;
        }
        state.loading = false;
        match result {
            Ok(page) => {
                state.rows = page.data;
                state.meta = Some(page.meta);
                state.load_failed = false;
            }
            Err(err) => {
                state.rows.clear();
                state.load_failed = true;
                drop(state);
                warn!("problem list failed: {err}");
                self.inner
                    .notices
                    .error(err.user_message(&self.inner.i18n.t("problems.load_failed")));
            }
        }
    }

    async fn load_tags(&self) {
        let source = self.state().query.source;
        if !Capabilities::of(source).tags {
            self.state_mut().vocabulary.clear();
            return;
        }
        let path = self.inner.config.api_path(&format!("tags/{source}"));
        let result = self.inner.client.get_json::<Vec<String>>(&path).await;

        let mut state = self.state_mut();
        if state.query.source != source {
            debug!("discarding tags for {source}: source changed");
            return;
        }
        match result {
            Ok(tags) => state.vocabulary = tags,
            Err(err) => {
                state.vocabulary.clear();
                drop(state);
                warn!("tag list for {source} failed: {err}");
                self.inner
                    .notices
                    .error(err.user_message(&self.inner.i18n.t("problems.tags_failed")));
            }
        }
    }

    /// Open the detail modal for `id` in the current source. `focused` is the
    /// element to return focus to on close.
    pub async fn open_detail(&self, id: &str, focused: Option<String>) {
        let (seq, source) = {
            let mut state = self.state_mut();
            state.detail_seq += 1;
            let source = state.query.source;
            state.detail = Some(DetailModal {
                source,
                id: id.to_string(),
                record: None,
                trap: FocusTrap::open(vec![DETAIL_CLOSE.to_string()], focused),
            });
            (state.detail_seq, source)
        };

        let path = self
            .inner
            .config
            .api_path(&format!("problems/{source}/{}", encode_segment(id)));
        let result = self.inner.client.get_json::<Record>(&path).await;

        let mut state = self.state_mut();
        if state.detail_seq != seq || state.detail.is_none() {
            debug!("discarding detail for {source}/{id}: modal changed");
            return;
        }
        match result {
            Ok(record) => {
                if let Some(modal) = state.detail.as_mut() {
                    let mut focusables = vec![DETAIL_CLOSE.to_string()];
                    if record.text("link").is_some() {
                        focusables.push(DETAIL_LINK.to_string());
                    }
                    focusables.push(DETAIL_DELETE.to_string());
                    let restore = modal.trap.restore_to().map(str::to_string);
                    modal.trap = FocusTrap::open(focusables, restore);
                    modal.record = Some(record);
                }
            }
            Err(err) => {
                state.focused = state
                    .detail
                    .take()
                    .and_then(|modal| modal.trap.restore_to().map(str::to_string));
                drop(state);
                warn!("problem {source}/{id} failed: {err}");
                self.inner
                    .notices
                    .error(err.user_message(&self.inner.i18n.t("problems.detail_failed")));
            }
        }
    }

    /// Key pressed inside the detail modal.
    pub fn detail_key(&self, key: Key) -> TrapOutcome {
        let outcome = match self.state_mut().detail.as_mut() {
            Some(modal) => modal.trap.handle(key),
            None => return TrapOutcome::Ignored,
        };
        if let TrapOutcome::Close(restore) = &outcome {
            self.close_detail_to(restore.clone());
        }
        outcome
    }

    pub fn detail_outside_click(&self) {
        let outcome = match self.state().detail.as_ref() {
            Some(modal) => modal.trap.outside_click(),
            None => return,
        };
        if let TrapOutcome::Close(restore) = outcome {
            self.close_detail_to(restore);
        }
    }

    fn close_detail_to(&self, restore: Option<String>) {
        let mut state = self.state_mut();
        state.detail = None;
        state.detail_seq += 1;
        state.focused = restore;
    }

    /// Ask, then delete `id` from the current source. Returns true when the
    /// record was deleted.
    pub async fn delete_record(&self, id: &str) -> bool {
        let i18n = &self.inner.i18n;
        if self.inner.confirm.confirm(i18n.t("problems.delete_confirm")).await != Decision::Confirmed {
            return false;
        }
        let source = self.state().query.source;
        let path = self
            .inner
            .config
            .api_path(&format!("problems/{source}/{}", encode_segment(id)));

        match self.inner.client.send(Method::Delete, &path, None).await {
            Ok(()) => {
                {
                    let mut state = self.state_mut();
                    state.rows.retain(|row| row.id().as_deref() != Some(id));
                    if let Some(meta) = state.meta.as_mut() {
                        meta.total = meta.total.saturating_sub(1);
                    }
                    if state
                        .detail
                        .as_ref()
                        .is_some_and(|modal| modal.source == source && modal.id == id)
                    {
                        state.detail = None;
                        state.detail_seq += 1;
                    }
                }
                info!("deleted problem {source}/{id}");
                self.inner.notices.success(i18n.t("problems.deleted"));
                true
            }
            Err(err) => {
                warn!("deleting {source}/{id} failed: {err}");
                self.inner
                    .notices
                    .error(err.user_message(&i18n.t("problems.delete_failed")));
                false
            }
        }
    }

    pub fn view(&self) -> BrowserView {
        let i18n = &self.inner.i18n;
        let state = self.state();
        let query = &state.query;
        let capabilities = Capabilities::of(query.source);

        let tabs = state
            .tabs
            .tab_indexes()
            .into_iter()
            .map(|(source, tab_index)| TabView {
                source,
                active: source == query.source,
                tab_index,
            })
            .collect();

        let mut tags: Vec<TagOption> = state
            .vocabulary
            .iter()
            .map(|name| TagOption {
                name: name.clone(),
                selected: query.tags.contains(name),
            })
            .collect();
        // Selected tags missing from the vocabulary still need a chip.
        for name in &query.tags {
            if !state.vocabulary.contains(name) {
                tags.push(TagOption {
                    name: name.clone(),
                    selected: true,
                });
            }
        }

        let columns = capabilities
            .sortable
            .iter()
            .map(|column| ColumnHeader {
                column: *column,
                sort: query
                    .sort
                    .filter(|sort| sort.column == *column)
                    .map(|sort| sort.order),
            })
            .collect();

        let body = if state.load_failed {
            TableBody::Error(i18n.t("problems.error_row"))
        } else if state.loading && state.rows.is_empty() {
            TableBody::Loading
        } else if state.rows.is_empty() {
            TableBody::Empty(i18n.t("problems.empty"))
        } else {
            TableBody::Rows(state.rows.iter().map(row_view).collect())
        };

        let (total, total_pages) = state
            .meta
            .as_ref()
            .map_or((0, 1), |meta| (meta.total, meta.total_pages));

        let detail = state.detail.as_ref().map(|modal| DetailView {
            id: modal.id.clone(),
            loading: modal.record.is_none(),
            fields: modal
                .record
                .as_ref()
                .map(|record| detail_fields(i18n, record))
                .unwrap_or_default(),
            focused: modal.trap.focused().map(str::to_string),
        });

        BrowserView {
            tabs,
            capabilities,
            search: state.search_input.clone(),
            difficulty: query.difficulty.clone(),
            rating_min: state.rating_min_input.clone(),
            rating_max: state.rating_max_input.clone(),
            tags,
            tag_mode: query.tag_mode,
            tag_mode_label: i18n.t(&format!("problems.tag_mode.{}", query.tag_mode)),
            columns,
            body,
            total,
            pagination: Pagination::new(query.page, total_pages),
            detail,
        }
    }
}

fn row_view(record: &Record) -> RowView {
    RowView {
        id: record.id().unwrap_or_default(),
        title: record.text("title").unwrap_or_default(),
        difficulty: record.text("difficulty"),
        rating: record.text("rating"),
        ac_rate: record.text("ac_rate"),
        tags: record.tags(),
    }
}

fn detail_fields(i18n: &TranslationBridge, record: &Record) -> Vec<(String, String)> {
    let id = record.id().map(|id| (i18n.t("problems.fields.id"), id));
    id.into_iter()
        .chain(DETAIL_FIELDS.iter().filter_map(|key| {
            record
                .text(key)
                .map(|value| (i18n.t(&format!("problems.fields.{key}")), value))
        }))
        .collect()
}

fn bound_text(bound: Option<f64>) -> String {
    bound.map(|b| b.to_string()).unwrap_or_default()
}
