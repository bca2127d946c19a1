use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use log::{debug, info, warn};
use tokio::task::{JoinHandle, spawn_local};
use tokio::time::MissedTickBehavior;

use crate::modules::config::ConsoleConfig;
use crate::modules::errors::ConsoleError;
use crate::modules::http::{HttpClient, Method, encode_segment};
use crate::modules::i18n::TranslationBridge;
use crate::modules::notify::NotificationCenter;
use crate::modules::schema::{ArgsError, ArgumentForm, FieldView, SchemaRegistry};
use crate::modules::types::{
    Job, JobOutput, JobStatus, Source, StatusReport, TriggerRequest, TriggerResponse,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTab {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    ShowStdout,
    ShowStderr,
    Close,
    OutsideClick,
    Escape,
}

#[derive(Debug, Clone, PartialEq)]
enum LogContent {
    Loading,
    Loaded(JobOutput),
}

#[derive(Debug, Clone, PartialEq)]
struct LogModal {
    job_id: String,
    tab: LogTab,
    content: LogContent,
}

struct PanelState {
    selected: Source,
    form: ArgumentForm,
    trigger_enabled: bool,
    trigger_in_flight: bool,
    poller: Option<JoinHandle<()>>,
    current_job: Option<Job>,
    last_job: Option<Job>,
    history: Vec<Job>,
    last_triggered: Option<String>,
    log: Option<LogModal>,
    log_seq: u64,
}

struct Inner {
    client: HttpClient,
    notices: NotificationCenter,
    i18n: Rc<TranslationBridge>,
    schemas: SchemaRegistry,
    config: ConsoleConfig,
    state: RefCell<PanelState>,
    dirty: Cell<bool>,
    subscription: Cell<u64>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.i18n.unsubscribe(self.subscription.get());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceButton {
    pub source: Source,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusCard {
    pub heading: String,
    /// Job, source, args and start time, each with its translated label.
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub job_id: String,
    pub source: String,
    pub args: String,
    pub trigger: String,
    pub started_at: String,
    pub finished_at: String,
    pub status: String,
    pub badge_class: String,
    pub can_view_log: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogView {
    pub job_id: String,
    pub active_tab: LogTab,
    pub tabs: Vec<(LogTab, String)>,
    pub loading: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub sources: Vec<SourceButton>,
    pub fields: Vec<FieldView>,
    pub trigger_enabled: bool,
    pub polling: bool,
    pub status_card: Option<StatusCard>,
    pub history: Vec<HistoryRow>,
    pub log: Option<LogView>,
}

/// Crawler trigger form, status poller and run history.
///
/// Cloning is cheap and every clone drives the same panel; the poll loop
/// holds one of them.
#[derive(Clone)]
pub struct JobControlPanel {
    inner: Rc<Inner>,
}

impl JobControlPanel {
    pub fn new(
        client: HttpClient,
        notices: NotificationCenter,
        i18n: Rc<TranslationBridge>,
        schemas: SchemaRegistry,
        config: ConsoleConfig,
    ) -> Self {
        let selected = Source::default();
        let state = PanelState {
            selected,
            form: ArgumentForm::new(schemas.get(selected)),
            trigger_enabled: true,
            trigger_in_flight: false,
            poller: None,
            current_job: None,
            last_job: None,
            history: Vec::new(),
            last_triggered: None,
            log: None,
            log_seq: 0,
        };
        let inner = Rc::new(Inner {
            client,
            notices,
            i18n,
            schemas,
            config,
            state: RefCell::new(state),
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

    fn state(&self) -> Ref<'_, PanelState> {
        self.inner.state.borrow()
    }

    fn state_mut(&self) -> RefMut<'_, PanelState> {
        self.inner.dirty.set(true);
        self.inner.state.borrow_mut()
    }

    /// True when something changed since the last call.
    pub fn take_dirty(&self) -> bool {
        self.inner.dirty.replace(false)
    }

    pub fn selected_source(&self) -> Source {
        self.state().selected
    }

    pub fn trigger_enabled(&self) -> bool {
        self.state().trigger_enabled
    }

    pub fn last_triggered(&self) -> Option<String> {
        self.state().last_triggered.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.state()
            .poller
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn select_source(&self, source: Source) {
        let schema = self.inner.schemas.get(source);
        let mut state = self.state_mut();
        state.selected = source;
        state.form = ArgumentForm::new(schema);
    }

    pub fn form_mut(&self) -> RefMut<'_, ArgumentForm> {
        RefMut::map(self.state_mut(), |state| &mut state.form)
    }

    /// Serialized arguments, or None after surfacing a validation notice.
    pub fn build_args(&self) -> Option<Vec<String>> {
        match self.validated_args() {
            Ok(args) => Some(args),
            Err(err) => {
                debug!("argument validation failed: {err}");
                let generic = self.inner.i18n.t("crawlers.fill_required");
                self.inner.notices.error(err.user_message(&generic));
                None
            }
        }
    }

    fn validated_args(&self) -> Result<Vec<String>, ConsoleError> {
        let result = self.state().form.build_args();
        result.map_err(|err| {
            let i18n = &self.inner.i18n;
            ConsoleError::validation(match &err {
                ArgsError::Missing { .. } => i18n.t("crawlers.fill_required"),
                ArgsError::Invalid { flag, reason } => i18n.t_with(
                    "crawlers.invalid_value",
                    &[("flag", flag.as_str()), ("reason", reason.as_str())],
                ),
            })
        })
    }

    /// Start a crawler run for the selected source. Returns the job id.
    pub async fn trigger(&self) -> Option<String> {
        if !self.trigger_enabled() {
            debug!("trigger ignored while disabled");
            return None;
        }
        let args = self.build_args()?;
        let source = self.selected_source();
        {
            let mut state = self.state_mut();
            state.trigger_enabled = false;
            state.trigger_in_flight = true;
        }

        info!("triggering {source} crawler with {args:?}");
        let path = self.inner.config.api_path("crawlers/trigger");
        let body = TriggerRequest { source, args };
        let result = self
            .inner
            .client
            .send_json::<_, TriggerResponse>(Method::Post, &path, &body)
            .await;

        let i18n = &self.inner.i18n;
        match result {
            Ok(response) => {
                {
                    let mut state = self.state_mut();
                    state.trigger_in_flight = false;
                    state.last_triggered = Some(response.job_id.clone());
                }
                self.inner.notices.success(
                    i18n.t_with("crawlers.triggered", &[("job_id", response.job_id.as_str())]),
                );
                self.start_polling();
                Some(response.job_id)
            }
            Err(err) => {
                {
                    let mut state = self.state_mut();
                    state.trigger_in_flight = false;
                    state.trigger_enabled = true;
                }
                warn!("trigger failed: {err}");
                self.inner
                    .notices
                    .error(err.user_message(&i18n.t("crawlers.trigger_failed")));
                None
            }
        }
    }

    /// Enter the polling state. A no-op while a loop is already running.
    pub fn start_polling(&self) -> bool {
        if self.is_polling() {
            return false;
        }
        let panel = self.clone();
        let handle = spawn_local(async move { panel.run_poll_loop().await });
        self.state_mut().poller = Some(handle);
        true
    }

    /// Abort the loop. The trigger comes back unless a trigger request is
    /// still out.
    pub fn stop_polling(&self) {
        let mut state = self.state_mut();
        if let Some(handle) = state.poller.take() {
            handle.abort();
            debug!("polling aborted");
        }
        state.trigger_enabled = !state.trigger_in_flight;
    }

    async fn run_poll_loop(self) {
        let mut ticker = tokio::time::interval(self.inner.config.timings.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(ConsoleError::Unauthorized) => {
                    warn!("status poll unauthorized, stopping");
                    break;
                }
                Err(err) => warn!("status poll failed: {err}"),
            }
        }

        let mut state = self.state_mut();
        state.poller = None;
        state.trigger_enabled = true;
        state.trigger_in_flight = false;
        debug!("polling stopped");
    }

    /// One status request applied to the card and history. Returns the
    /// backend's `running` flag.
    pub async fn poll_once(&self) -> Result<bool, ConsoleError> {
        let path = self.inner.config.api_path("crawlers/status");
        let report: StatusReport = self.inner.client.get_json(&path).await?;

        for job in report.history.iter().filter(|job| !job.is_consistent()) {
            debug!("job {} is {} but finished_at is {:?}", job.job_id, job.status, job.finished_at);
        }

        let limit = self.inner.config.history_limit;
        let mut state = self.state_mut();
        state.current_job = if report.running { report.current_job } else { None };
        state.last_job = report.last_job;
        state.history = report.history.into_iter().take(limit).collect();
        if report.running {
            state.trigger_enabled = false;
        }
        Ok(report.running)
    }

    /// Initial load: show the current status and resume polling if a job
    /// is already running.
    pub async fn init(&self) {
        match self.poll_once().await {
            Ok(true) => {
                info!("crawler already running, resuming status polling");
                self.start_polling();
            }
            Ok(false) => {}
            Err(err) => warn!("initial status load failed: {err}"),
        }
    }

    /// Open the log modal for a finished job and load its output.
    pub async fn view_log(&self, job_id: &str) {
        let seq = {
            let mut state = self.state_mut();
            state.log_seq += 1;
            state.log = Some(LogModal {
                job_id: job_id.to_string(),
                tab: LogTab::Stdout,
                content: LogContent::Loading,
            });
            state.log_seq
        };

        let path = self
            .inner
            .config
            .api_path(&format!("crawlers/{}/output", encode_segment(job_id)));
        let result = self.inner.client.get_json::<JobOutput>(&path).await;

        let mut state = self.state_mut();
        if state.log_seq != seq || state.log.is_none() {
            debug!("dropping output for {job_id}: log view changed");
            return;
        }
        match result {
            Ok(output) => {
                if let Some(modal) = state.log.as_mut() {
                    modal.content = LogContent::Loaded(output);
                }
            }
            Err(err) => {
                state.log = None;
                drop(state);
                warn!("loading output for {job_id} failed: {err}");
                self.inner
                    .notices
                    .error(err.user_message(&self.inner.i18n.t("crawlers.log_failed")));
            }
        }
    }

    pub fn log_action(&self, action: LogAction) {
        let mut state = self.state_mut();
        match action {
            LogAction::ShowStdout | LogAction::ShowStderr => {
                if let Some(modal) = state.log.as_mut() {
                    modal.tab = if action == LogAction::ShowStdout {
                        LogTab::Stdout
                    } else {
                        LogTab::Stderr
                    };
                }
            }
            LogAction::Close | LogAction::OutsideClick | LogAction::Escape => {
                state.log = None;
                state.log_seq += 1;
            }
        }
    }

    pub fn view(&self) -> PanelView {
        let i18n = &self.inner.i18n;
        let polling = self.is_polling();
        let state = self.state();

        let status_card = state.current_job.as_ref().map(|job| StatusCard {
            heading: i18n.t("crawlers.running"),
            fields: vec![
                (i18n.t("crawlers.labels.job"), job.job_id.clone()),
                (i18n.t("crawlers.labels.source"), job.source.to_string()),
                (i18n.t("crawlers.labels.args"), job.args_line()),
                (i18n.t("crawlers.labels.started"), job.started_at.clone()),
            ],
        });

        let history = state
            .history
            .iter()
            .map(|job| HistoryRow {
                job_id: job.job_id.clone(),
                source: job.source.to_string(),
                args: job.args_line(),
                trigger: job.trigger.to_string(),
                started_at: job.started_at.clone(),
                finished_at: job
                    .finished_at
                    .clone()
                    .unwrap_or_else(|| i18n.t("common.none")),
                status: job.status.to_string(),
                badge_class: format!("badge-crawler-{}", job.status),
                can_view_log: job.status != JobStatus::Running,
            })
            .collect();

        let log = state.log.as_ref().map(|modal| {
            let (loading, text) = match &modal.content {
                LogContent::Loading => (true, String::new()),
                LogContent::Loaded(output) => (
                    false,
                    match modal.tab {
                        LogTab::Stdout => output.stdout.clone(),
                        LogTab::Stderr => output.stderr.clone(),
                    },
                ),
            };
            LogView {
                job_id: modal.job_id.clone(),
                active_tab: modal.tab,
                tabs: vec![
                    (LogTab::Stdout, i18n.t("crawlers.stdout")),
                    (LogTab::Stderr, i18n.t("crawlers.stderr")),
                ],
                loading,
                text,
            }
        });

        PanelView {
            sources: Source::ALL
                .into_iter()
                .map(|source| SourceButton {
                    source,
                    active: source == state.selected,
                })
                .collect(),
            fields: state.form.fields(),
            trigger_enabled: state.trigger_enabled,
            polling,
            status_card,
            history,
            log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::http::{HttpResponse, TransportError};
    use crate::modules::testing::{StubTransport, test_client, test_config, test_i18n, test_notices};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::task::LocalSet;
    use tokio::time::sleep;

    const STATUS: &str = "/admin/api/crawlers/status";
    const TRIGGER: &str = "/admin/api/crawlers/trigger";

    fn panel_with(transport: Rc<StubTransport>) -> (JobControlPanel, NotificationCenter) {
        let (client, _) = test_client(transport);
        let notices = test_notices();
        let panel = JobControlPanel::new(
            client,
            notices.clone(),
            test_i18n(),
            SchemaRegistry::default(),
            test_config(),
        );
        (panel, notices)
    }

    fn running_job() -> Value {
        json!({
            "job_id": "abc123",
            "source": "leetcode",
            "args": ["--daily"],
            "trigger": "admin",
            "started_at": "2024-01-01T00:00:00Z",
            "finished_at": null,
            "status": "running"
        })
    }

    fn running() -> Value {
        json!({"running": true, "current_job": running_job(), "history": []})
    }

    fn finished() -> Value {
        let mut job = running_job();
        job["status"] = json!("completed");
        job["finished_at"] = json!("2024-01-01T00:03:00Z");
        json!({"running": false, "last_job": job.clone(), "history": [job]})
    }

    fn daily(panel: &JobControlPanel) {
        panel.form_mut().set_enabled("--daily", true);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_stops_after_not_running_response() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(StubTransport::default());
                transport.push_json(Method::Post, TRIGGER, 202, json!({"job_id": "abc123"}));
                transport.push_json(Method::Get, STATUS, 200, running());
                transport.push_json(Method::Get, STATUS, 200, running());
                transport.push_json(Method::Get, STATUS, 200, finished());
                let (panel, _) = panel_with(transport.clone());
                daily(&panel);

                assert_eq!(panel.trigger().await.as_deref(), Some("abc123"));
                assert!(!panel.trigger_enabled());

                sleep(Duration::from_millis(3500)).await;
                assert_eq!(transport.count(Method::Get, STATUS), 2);
                assert!(panel.is_polling());
                assert!(!panel.trigger_enabled());

                sleep(Duration::from_secs(10)).await;
                assert_eq!(transport.count(Method::Get, STATUS), 3);
                assert!(!panel.is_polling());
                assert!(panel.trigger_enabled());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_polling_twice_keeps_one_loop() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(StubTransport::default());
                transport.always_json(Method::Get, STATUS, 200, running());
                let (panel, _) = panel_with(transport.clone());

                assert!(panel.start_polling());
                assert!(!panel.start_polling());

                sleep(Duration::from_millis(3500)).await;
                assert_eq!(transport.count(Method::Get, STATUS), 2);
                panel.stop_polling();
                assert!(!panel.is_polling());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_mid_run_gives_the_trigger_back() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(StubTransport::default());
                transport.always_json(Method::Get, STATUS, 200, running());
                let (panel, _) = panel_with(transport.clone());

                panel.start_polling();
                sleep(Duration::from_millis(100)).await;
                assert!(!panel.trigger_enabled());

                panel.stop_polling();
                assert!(!panel.is_polling());
                assert!(panel.trigger_enabled());

                sleep(Duration::from_secs(10)).await;
                assert_eq!(transport.count(Method::Get, STATUS), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_poll_and_finish_end_to_end() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(StubTransport::default());
                transport.push_json(Method::Post, TRIGGER, 202, json!({"job_id": "abc123"}));
                transport.push_json(Method::Get, STATUS, 200, running());
                transport.push_json(Method::Get, STATUS, 200, finished());
                let (panel, notices) = panel_with(transport.clone());
                daily(&panel);

                panel.trigger().await;
                let body: Value = serde_json::from_str(
                    transport.last(Method::Post, TRIGGER).unwrap().body.as_deref().unwrap(),
                )
                .unwrap();
                assert_eq!(body, json!({"source": "leetcode", "args": ["--daily"]}));
                assert_eq!(notices.last().unwrap().message, "Crawler triggered: abc123");

                sleep(Duration::from_millis(10)).await;
                let card = panel.view().status_card.unwrap();
                assert_eq!(
                    card.fields,
                    vec![
                        ("Job".to_string(), "abc123".to_string()),
                        ("Source".to_string(), "leetcode".to_string()),
                        ("Args".to_string(), "--daily".to_string()),
                        ("Started".to_string(), "2024-01-01T00:00:00Z".to_string()),
                    ]
                );

                sleep(Duration::from_secs(3)).await;
                let view = panel.view();
                assert!(view.status_card.is_none());
                assert!(view.trigger_enabled);
                assert!(!view.polling);
                assert_eq!(view.history.len(), 1);
                assert_eq!(view.history[0].status, "succeeded");
                assert_eq!(view.history[0].badge_class, "badge-crawler-succeeded");
                assert_eq!(view.history[0].trigger, "manual");
                assert!(view.history[0].can_view_log);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn missing_month_blocks_the_request() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(StubTransport::default());
                let (panel, notices) = panel_with(transport.clone());
                {
                    let mut form = panel.form_mut();
                    form.set_enabled("--monthly", true);
                    form.set_month_year("--monthly", "2024", "");
                }

                assert_eq!(panel.trigger().await, None);
                assert!(transport.requests().is_empty());
                assert!(panel.trigger_enabled());
                assert_eq!(
                    notices.last().unwrap().message,
                    "Please fill in the required fields"
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_trigger_surfaces_detail_and_reenables() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(StubTransport::default());
                transport.push_json(
                    Method::Post,
                    TRIGGER,
                    409,
                    json!({"detail": "a crawler is already running"}),
                );
                let (panel, notices) = panel_with(transport.clone());
                daily(&panel);

                assert_eq!(panel.trigger().await, None);
                assert!(panel.trigger_enabled());
                assert!(!panel.is_polling());
                assert_eq!(notices.last().unwrap().message, "a crawler is already running");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_on_trigger_uses_generic_message() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(StubTransport::default());
                let (panel, notices) = panel_with(transport.clone());
                daily(&panel);

                assert_eq!(panel.trigger().await, None);
                assert_eq!(transport.count(Method::Post, TRIGGER), 3);
                assert!(panel.trigger_enabled());
                assert_eq!(notices.last().unwrap().message, "Failed to trigger crawler");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_poll_is_skipped_and_loop_continues() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(StubTransport::default());
                for _ in 0..3 {
                    transport.push(
                        Method::Get,
                        STATUS,
                        Err(TransportError::new("connection reset")),
                    );
                }
                transport.push_json(Method::Get, STATUS, 200, finished());
                let (panel, notices) = panel_with(transport.clone());

                panel.start_polling();
                sleep(Duration::from_secs(10)).await;

                assert_eq!(transport.count(Method::Get, STATUS), 4);
                assert!(!panel.is_polling());
                assert!(notices.visible().is_empty());
                assert_eq!(panel.view().history.len(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_poll_stops_the_loop() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(StubTransport::default());
                transport.push(Method::Get, STATUS, Ok(HttpResponse::new(401, "")));
                transport.always_json(Method::Get, STATUS, 200, running());
                let (panel, _) = panel_with(transport.clone());

                panel.start_polling();
                sleep(Duration::from_secs(10)).await;

                assert_eq!(transport.count(Method::Get, STATUS), 1);
                assert!(!panel.is_polling());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn init_resumes_polling_for_running_job() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(StubTransport::default());
                transport.push_json(Method::Get, STATUS, 200, running());
                transport.push_json(Method::Get, STATUS, 200, finished());
                let (panel, _) = panel_with(transport.clone());

                panel.init().await;
                assert!(panel.is_polling());
                assert!(!panel.trigger_enabled());

                sleep(Duration::from_secs(1)).await;
                assert!(!panel.is_polling());
                assert!(panel.trigger_enabled());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn log_view_defaults_to_stdout_and_closes_on_escape() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(StubTransport::default());
                transport.push_json(
                    Method::Get,
                    "/admin/api/crawlers/abc123/output",
                    200,
                    json!({"stdout": "fetched 3 problems", "stderr": "warning: slow"}),
                );
                let (panel, _) = panel_with(transport.clone());

                panel.view_log("abc123").await;
                let log = panel.view().log.unwrap();
                assert_eq!(log.active_tab, LogTab::Stdout);
                assert_eq!(log.text, "fetched 3 problems");

                panel.log_action(LogAction::ShowStderr);
                assert_eq!(panel.view().log.unwrap().text, "warning: slow");

                panel.log_action(LogAction::Escape);
                assert!(panel.view().log.is_none());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn output_arriving_after_close_is_dropped() {
        LocalSet::new()
            .run_until(async {
                let transport = Rc::new(StubTransport::default());
                transport.push_delayed(
                    Method::Get,
                    "/admin/api/crawlers/abc123/output",
                    Duration::from_secs(2),
                    json!({"stdout": "late", "stderr": ""}),
                );
                let (panel, _) = panel_with(transport.clone());

                let loading = spawn_local({
                    let panel = panel.clone();
                    async move { panel.view_log("abc123").await }
                });
                sleep(Duration::from_millis(100)).await;
                assert!(panel.view().log.unwrap().loading);

                panel.log_action(LogAction::OutsideClick);
                loading.await.unwrap();
                assert!(panel.view().log.is_none());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_source_swaps_schema() {
        LocalSet::new()
            .run_until(async {
                let (panel, _) = panel_with(Rc::new(StubTransport::default()));
                daily(&panel);
                panel.select_source(Source::Codeforces);

                let view = panel.view();
                assert!(view.sources.iter().any(|b| b.source == Source::Codeforces && b.active));
                assert_eq!(view.fields[0].flag, "--sync-problemset");
                assert!(view.fields.iter().all(|f| !f.checked));
            })
            .await;
    }

    #[test]
    fn language_change_marks_view_dirty() {
        let i18n = test_i18n();
        let (client, _) = test_client(Rc::new(StubTransport::default()));
        let panel = JobControlPanel::new(
            client,
            test_notices(),
            i18n.clone(),
            SchemaRegistry::default(),
            test_config(),
        );
        panel.take_dirty();
        assert!(!panel.take_dirty());

        i18n.set_language("zh-TW", json!({"crawlers": {"running": "執行中"}}));
        assert!(panel.take_dirty());
    }
}
