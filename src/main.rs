use std::cell::Cell;
use std::error::Error;
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info};
use simplelog::*;
use tokio::task::{LocalSet, yield_now};
use tokio::time::sleep;

use crawler_console::modules::browser::{BrowserView, FilterableListBrowser, TableBody};
use crawler_console::modules::config::ConsoleConfig;
use crawler_console::modules::confirm::{ConfirmAction, ConfirmationGate};
use crawler_console::modules::http::{HttpClient, ReqwestTransport};
use crawler_console::modules::i18n::TranslationBridge;
use crawler_console::modules::jobs::{JobControlPanel, LogAction, PanelView};
use crawler_console::modules::location::MemoryLocation;
use crawler_console::modules::notify::{NoticeKind, NotificationCenter};
use crawler_console::modules::pagination::PageLink;
use crawler_console::modules::query::{ListQuery, Sort, SortColumn, SortOrder, TagMode};
use crawler_console::modules::schema::{ArgumentForm, FlagKind, SchemaRegistry};
use crawler_console::modules::serialize::{
    load_config_or_default, load_translations, save_config, schema_registry, translation_bridge,
};
use crawler_console::modules::tokens::TokenPanel;
use crawler_console::modules::types::Source;

#[derive(Parser)]
#[command(
    name = "crawler-console",
    version,
    about = "Admin console for the problem catalog backend",
    long_about = include_str!("../help.txt")
)]
struct Cli {
    #[arg(short = 'l', long = "log-file", default_value = "crawler-console.log")]
    log_file: String,

    #[arg(short = 'c', long = "config", default_value = "./console.toml")]
    config: String,

    /// Language code for --lang-file (overrides the config)
    #[arg(long = "lang", requires = "lang_file")]
    lang: Option<String>,

    /// JSON translation table
    #[arg(long = "lang-file")]
    lang_file: Option<String>,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long = "yes")]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trigger a crawler run
    Crawl {
        source: Source,
        /// Crawler flag, optionally with a value: --arg --daily, --arg --monthly=2024-3
        #[arg(short = 'a', long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,
        /// Keep polling until the run finishes
        #[arg(short = 'w', long)]
        watch: bool,
    },
    /// Show the current run and the history
    Status {
        #[arg(short = 'w', long)]
        watch: bool,
    },
    /// Print the output of a finished run
    Log {
        job_id: String,
        #[arg(long)]
        stderr: bool,
    },
    /// List problems
    Problems(ProblemFilters),
    /// Show one problem
    Problem { source: Source, id: String },
    /// Delete one problem
    DeleteProblem { source: Source, id: String },
    /// List API tokens
    Tokens,
    /// Create an API token; the raw value is printed once
    TokenCreate {
        #[arg(long)]
        label: Option<String>,
    },
    /// Revoke an API token
    TokenRevoke { token: String },
    /// Turn API token auth on or off
    TokenAuth { state: Toggle },
    /// End the admin session
    Logout,
    /// Print crawler flag schemas
    Schemas { source: Option<Source> },
    /// Print the effective configuration
    Config {
        /// Write it to the --config path
        #[arg(long)]
        write: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Args)]
struct ProblemFilters {
    /// Browser query string to start from, e.g. "source=atcoder&page=2"
    #[arg(long = "url")]
    url: Option<String>,
    #[arg(short = 's', long)]
    source: Option<Source>,
    #[arg(short = 'p', long)]
    page: Option<u32>,
    #[arg(long)]
    per_page: Option<u32>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    difficulty: Option<String>,
    #[arg(short = 't', long = "tag")]
    tags: Vec<String>,
    /// Require every tag instead of any
    #[arg(long)]
    all_tags: bool,
    #[arg(long)]
    sort: Option<SortColumn>,
    #[arg(long, requires = "sort")]
    desc: bool,
    #[arg(long)]
    rating_min: Option<f64>,
    #[arg(long)]
    rating_max: Option<f64>,
}

impl ProblemFilters {
    fn to_query(&self) -> ListQuery {
        let mut query = ListQuery::from_url_query(self.url.as_deref().unwrap_or(""));
        if let Some(source) = self.source {
            query.source = source;
        }
        if let Some(page) = self.page {
            query.page = page.max(1);
        }
        if let Some(per_page) = self.per_page {
            query.per_page = per_page.max(1);
        }
        if let Some(search) = &self.search {
            query.set_search(search);
        }
        if let Some(difficulty) = &self.difficulty {
            query.set_difficulty(difficulty);
        }
        for tag in &self.tags {
            query.add_tag(tag);
        }
        if self.all_tags {
            query.tag_mode = TagMode::All;
        }
        if let Some(column) = self.sort {
            let order = if self.desc { SortOrder::Desc } else { SortOrder::Asc };
            query.sort = Some(Sort { column, order });
        }
        query.rating_min = self.rating_min.filter(|r| r.is_finite()).or(query.rating_min);
        query.rating_max = self.rating_max.filter(|r| r.is_finite()).or(query.rating_max);
        query
    }
}

fn init_logger(log_path: &str) -> Result<(), Box<dyn Error>> {
    WriteLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new().set_time_format_rfc3339().build(),
        OpenOptions::new().create(true).append(true).open(log_path)?,
    )?;
    Ok(())
}

/// Shared collaborators for one command.
struct Console {
    config: ConsoleConfig,
    client: HttpClient,
    notices: NotificationCenter,
    i18n: Rc<TranslationBridge>,
    confirm: ConfirmationGate,
    location: Rc<MemoryLocation>,
    schemas: SchemaRegistry,
    printed: Cell<u64>,
    failed: Cell<bool>,
}

impl Console {
    fn build(cli: &Cli, path: &str, query: &str) -> Result<Self, Box<dyn Error>> {
        let config = load_config_or_default(&cli.config)?;
        let i18n = match &cli.lang_file {
            Some(file) => TranslationBridge::new(
                cli.lang.clone().unwrap_or_else(|| config.language.clone()),
                load_translations(file)?,
            ),
            None => translation_bridge(&config)?,
        };
        let schemas = schema_registry(&config)?;
        let location = Rc::new(MemoryLocation::new(path, query));
        let transport = Rc::new(ReqwestTransport::new(&config)?);
        let client = HttpClient::new(transport, location.clone(), &config);
        info!("console ready for {}", config.base_url);

        Ok(Self {
            notices: NotificationCenter::new(&config.timings),
            client,
            i18n: Rc::new(i18n),
            confirm: ConfirmationGate::new(),
            location,
            schemas,
            config,
            printed: Cell::new(0),
            failed: Cell::new(false),
        })
    }

    fn jobs(&self) -> JobControlPanel {
        JobControlPanel::new(
            self.client.clone(),
            self.notices.clone(),
            self.i18n.clone(),
            self.schemas.clone(),
            self.config.clone(),
        )
    }

    fn browser(&self) -> FilterableListBrowser {
        FilterableListBrowser::new(
            self.client.clone(),
            self.notices.clone(),
            self.i18n.clone(),
            self.confirm.clone(),
            self.location.clone(),
            self.config.clone(),
        )
    }

    fn tokens(&self) -> TokenPanel {
        TokenPanel::new(
            self.client.clone(),
            self.notices.clone(),
            self.i18n.clone(),
            self.confirm.clone(),
            self.location.clone(),
            self.config.clone(),
        )
    }

    /// Print notifications raised since the last call.
    fn flush_notices(&self) {
        for notice in self.notices.visible() {
            if notice.id <= self.printed.get() {
                continue;
            }
            self.printed.set(notice.id);
            match notice.kind {
                NoticeKind::Success => println!("{}", notice.message),
                NoticeKind::Error => {
                    self.failed.set(true);
                    eprintln!("error: {}", notice.message);
                }
            }
        }
    }

    fn finish(&self) -> Result<(), Box<dyn Error>> {
        self.flush_notices();
        if self.location.path() == self.config.login_path {
            return Err(format!(
                "not logged in; sign in at {}{} and put the session cookie in the config",
                self.config.base_url, self.config.login_path
            )
            .into());
        }
        if self.failed.get() {
            return Err("command failed".into());
        }
        Ok(())
    }
}

/// Answer the confirmation the other half of a `join!` is waiting on.
async fn answer_prompt(gate: &ConfirmationGate, yes: bool) {
    yield_now().await;
    let Some(message) = gate.pending() else {
        return;
    };
    let action = if yes || ask(&message) {
        ConfirmAction::Confirm
    } else {
        ConfirmAction::Cancel
    };
    gate.answer(action);
}

fn ask(message: &str) -> bool {
    print!("{message} [y/N] ");
    let _ = io::stdout().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Feed `--flag` / `--flag=value` into the form.
fn apply_cli_arg(form: &mut ArgumentForm, raw: &str) -> Result<(), String> {
    let (flag, value) = match raw.split_once('=') {
        Some((flag, value)) => (flag, Some(value)),
        None => (raw, None),
    };
    let kind = form
        .schema()
        .flags
        .iter()
        .find(|spec| spec.flag == flag)
        .map(|spec| spec.kind.clone())
        .ok_or_else(|| format!("unknown flag for {}: {flag}", form.schema().source))?;
    form.set_enabled(flag, true);

    match (kind, value) {
        (FlagKind::MonthYear { .. }, Some(value)) => {
            let (year, month) = value.split_once('-').unwrap_or((value, ""));
            form.set_month_year(flag, year, month);
        }
        (_, Some(value)) => {
            form.set_value(flag, value);
        }
        (_, None) => {}
    }
    Ok(())
}

fn print_panel(view: &PanelView, i18n: &TranslationBridge) {
    match &view.status_card {
        Some(card) => {
            println!("{}", card.heading);
            for (label, value) in &card.fields {
                println!("  {label:<8} {value}");
            }
        }
        None => println!("{}", i18n.t("crawlers.idle")),
    }
    if view.history.is_empty() {
        println!("{}", i18n.t("crawlers.no_history"));
        return;
    }
    for row in &view.history {
        println!(
            "{:<14} {:<11} {:<9} {:<10} {} -> {}  {}",
            row.job_id, row.source, row.status, row.trigger, row.started_at, row.finished_at, row.args
        );
    }
}

fn print_problems(view: &BrowserView, href: &str) {
    match &view.body {
        TableBody::Rows(rows) => {
            for row in rows {
                println!(
                    "{:<14} {:<48} {:<8} {:<6} {}",
                    row.id,
                    row.title,
                    row.difficulty.as_deref().unwrap_or(""),
                    row.rating.as_deref().unwrap_or(""),
                    row.tags.join(",")
                );
            }
        }
        TableBody::Empty(message) | TableBody::Error(message) => println!("{message}"),
        TableBody::Loading => {}
    }

    let bar = &view.pagination;
    let links: Vec<String> = bar
        .links
        .iter()
        .map(|link| match link {
            PageLink::Page { number, current: true } => format!("[{number}]"),
            PageLink::Page { number, .. } => number.to_string(),
            PageLink::Ellipsis => "...".to_string(),
        })
        .collect();
    println!(
        "page {}/{} ({} total)  {}",
        bar.current,
        bar.total_pages,
        view.total,
        links.join(" ")
    );
    let hints: Vec<String> = [("prev", bar.prev()), ("next", bar.next())]
        .into_iter()
        .filter_map(|(label, page)| page.map(|page| format!("{label}: --page {page}")))
        .collect();
    if !hints.is_empty() {
        println!("{}", hints.join("  "));
    }
    if !view.tags.is_empty() {
        let selected: Vec<&str> = view
            .tags
            .iter()
            .filter(|t| t.selected)
            .map(|t| t.name.as_str())
            .collect();
        if !selected.is_empty() {
            println!("tags: {} ({})", selected.join(", "), view.tag_mode_label);
        }
    }
    println!("url: {href}");
}

async fn watch_jobs(console: &Console, panel: &JobControlPanel) {
    let period = console.config.timings.poll_interval();
    while panel.is_polling() {
        sleep(period).await;
        if panel.take_dirty() {
            print_panel(&panel.view(), &console.i18n);
        }
        console.flush_notices();
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match &cli.command {
        Command::Crawl {
            source,
            args,
            watch,
        } => {
            let console = Console::build(&cli, "/admin/", "")?;
            let panel = console.jobs();
            panel.select_source(*source);
            for raw in args {
                apply_cli_arg(&mut panel.form_mut(), raw)?;
            }
            if let Some(job_id) = panel.trigger().await {
                println!("{job_id}");
                console.flush_notices();
                if *watch {
                    watch_jobs(&console, &panel).await;
                    print_panel(&panel.view(), &console.i18n);
                } else {
                    panel.stop_polling();
                }
            }
            console.finish()
        }
        Command::Status { watch } => {
            let console = Console::build(&cli, "/admin/", "")?;
            let panel = console.jobs();
            panel.init().await;
            print_panel(&panel.view(), &console.i18n);
            panel.take_dirty();
            if *watch {
                watch_jobs(&console, &panel).await;
            } else {
                panel.stop_polling();
            }
            console.finish()
        }
        Command::Log { job_id, stderr } => {
            let console = Console::build(&cli, "/admin/", "")?;
            let panel = console.jobs();
            panel.view_log(job_id).await;
            if *stderr {
                panel.log_action(LogAction::ShowStderr);
            }
            if let Some(log) = panel.view().log {
                print!("{}", log.text);
            }
            console.finish()
        }
        Command::Problems(filters) => {
            let query = filters.to_query().to_url_query();
            let console = Console::build(&cli, "/admin/problems", &query)?;
            let browser = console.browser();
            browser.init().await;
            print_problems(&browser.view(), &console.location.href());
            console.finish()
        }
        Command::Problem { source, id } => {
            let query = ListQuery::for_source(*source).to_url_query();
            let console = Console::build(&cli, "/admin/problems", &query)?;
            let browser = console.browser();
            browser.open_detail(id, None).await;
            if let Some(detail) = browser.view().detail {
                for (label, value) in detail.fields {
                    println!("{label}: {value}");
                }
            }
            console.finish()
        }
        Command::DeleteProblem { source, id } => {
            let query = ListQuery::for_source(*source).to_url_query();
            let console = Console::build(&cli, "/admin/problems", &query)?;
            let browser = console.browser();
            tokio::join!(browser.delete_record(id), answer_prompt(&console.confirm, cli.yes));
            console.finish()
        }
        Command::Tokens => {
            let console = Console::build(&cli, "/admin/tokens", "")?;
            let panel = console.tokens();
            if panel.load().await.is_ok() {
                let view = panel.view();
                println!("token auth: {}", if view.token_auth { "on" } else { "off" });
                for row in view.rows {
                    println!(
                        "{:<20} {:<16} {:<10} {:<10} {}",
                        row.masked, row.label, row.created, row.last_used, row.badge
                    );
                }
            }
            console.finish()
        }
        Command::TokenCreate { label } => {
            let console = Console::build(&cli, "/admin/tokens", "")?;
            let panel = console.tokens();
            if let Some(token) = panel.create_token(label.as_deref().unwrap_or("")).await {
                println!("{token}");
                panel.dismiss_reveal();
            }
            console.finish()
        }
        Command::TokenRevoke { token } => {
            let console = Console::build(&cli, "/admin/tokens", "")?;
            let panel = console.tokens();
            tokio::join!(panel.revoke(token), answer_prompt(&console.confirm, cli.yes));
            console.finish()
        }
        Command::TokenAuth { state } => {
            let console = Console::build(&cli, "/admin/tokens", "")?;
            console
                .tokens()
                .set_token_auth(matches!(state, Toggle::On))
                .await;
            console.finish()
        }
        Command::Logout => {
            let console = Console::build(&cli, "/admin/", "")?;
            console.tokens().logout().await;
            console.flush_notices();
            println!("logged out");
            Ok(())
        }
        Command::Schemas { source } => {
            let config = load_config_or_default(&cli.config)?;
            let registry = schema_registry(&config)?;
            let sources = source.map(|s| vec![s]).unwrap_or_else(|| Source::ALL.to_vec());
            for source in sources {
                println!("{source}");
                for spec in registry.get(source).flags {
                    println!("  {:<32} {:<12} {}", spec.flag, kind_name(&spec.kind), spec.help);
                }
            }
            Ok(())
        }
        Command::Config { write } => {
            let config = load_config_or_default(&cli.config)?;
            if *write {
                save_config(&cli.config, &config)?;
                info!("wrote {}", cli.config);
            }
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn kind_name(kind: &FlagKind) -> &'static str {
    match kind {
        FlagKind::Checkbox => "checkbox",
        FlagKind::Text => "text",
        FlagKind::Number { .. } => "number",
        FlagKind::Date => "date",
        FlagKind::MonthYear { .. } => "month-year",
        FlagKind::Select { .. } => "select",
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_file)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = LocalSet::new().block_on(&runtime, run(cli));
    if let Err(e) = &result {
        error!("{e}");
    }
    result
}
