//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use hunter_agents::{AgentRegistry, build_client};
use hunter_core::{DispatchSummary, Dispatcher, TriageOutcome, TriageService};
use hunter_shared::{
    AppConfig, CredentialStore, DispatchConfig, LeadStatus, NewSource, SourceConfig,
    TriageDecision, expand_path, init_config, load_config, load_config_from,
};
use hunter_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use uuid::Uuid;

/// How often `hunt` polls the completion signal.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Hunter: acquire leads from external sources and triage them.
#[derive(Parser)]
#[command(
    name = "hunter",
    version,
    about = "Acquire leads from configured sources and triage them into cases.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.hunter/hunter.toml).
    #[arg(long, env = "HUNTER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding `defaults.database_path`.
    #[arg(long, env = "HUNTER_DB", global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run every active source through the acquisition pipeline.
    Hunt {
        /// Source purpose to dispatch (defaults to `defaults.purpose`).
        #[arg(short, long)]
        purpose: Option<String>,
    },

    /// Manage sources and source domains.
    Sources {
        #[command(subcommand)]
        action: SourcesAction,
    },

    /// Review staged leads.
    Triage {
        #[command(subcommand)]
        action: TriageAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Source registry subcommands.
#[derive(Subcommand)]
pub(crate) enum SourcesAction {
    /// List every source with its run state.
    List,
    /// Register a new source.
    Add {
        /// Unique source name.
        #[arg(long)]
        name: String,
        /// Agent type, e.g. reddit, gnews_io, test_data.
        #[arg(long)]
        agent: String,
        /// Subreddit, search query or file path, depending on the agent.
        #[arg(long)]
        target: String,
        /// Domain name; created if it does not exist.
        #[arg(long)]
        domain: String,
        /// Source purpose (defaults to `defaults.purpose`).
        #[arg(long)]
        purpose: Option<String>,
        /// Register the source disabled.
        #[arg(long)]
        inactive: bool,
    },
    /// Enable a source.
    Enable { id: i64 },
    /// Disable a source.
    Disable { id: i64 },
    /// Create a source domain.
    DomainAdd { name: String },
}

/// Triage subcommands.
#[derive(Subcommand)]
pub(crate) enum TriageAction {
    /// List staged leads.
    List {
        /// Only leads with this status (NEW or TRIAGED).
        #[arg(long)]
        status: Option<LeadStatus>,
    },
    /// Show one staged lead in full.
    Show {
        uuid: Uuid,
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Apply a decision: promote, ignore or skip.
    Decide {
        uuid: Uuid,
        decision: TriageDecision,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "hunter=info",
        1 => "hunter=debug",
        _ => "hunter=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Resolved config plus CLI overrides.
struct Context {
    config: AppConfig,
    db: Option<PathBuf>,
}

impl Context {
    fn load(config_path: Option<&Path>, db: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        Ok(Self { config, db })
    }

    async fn open_storage(&self) -> Result<Storage> {
        let path = match &self.db {
            Some(path) => path.clone(),
            None => expand_path(&self.config.defaults.database_path)?,
        };
        info!(path = %path.display(), "opening database");
        Ok(Storage::open(&path).await?)
    }

    fn purpose<'a>(&'a self, flag: Option<&'a str>) -> &'a str {
        flag.unwrap_or(&self.config.defaults.purpose)
    }
}

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
        };
    }

    let ctx = Context::load(cli.config.as_deref(), cli.db)?;
    match cli.command {
        Command::Hunt { purpose } => cmd_hunt(&ctx, purpose.as_deref()).await,
        Command::Sources { action } => match action {
            SourcesAction::List => cmd_sources_list(&ctx).await,
            SourcesAction::Add {
                name,
                agent,
                target,
                domain,
                purpose,
                inactive,
            } => {
                let purpose = ctx.purpose(purpose.as_deref()).to_string();
                cmd_sources_add(&ctx, name, agent, target, &domain, purpose, !inactive).await
            }
            SourcesAction::Enable { id } => cmd_sources_toggle(&ctx, id, true).await,
            SourcesAction::Disable { id } => cmd_sources_toggle(&ctx, id, false).await,
            SourcesAction::DomainAdd { name } => cmd_domain_add(&ctx, &name).await,
        },
        Command::Triage { action } => match action {
            TriageAction::List { status } => cmd_triage_list(&ctx, status).await,
            TriageAction::Show { uuid, json } => cmd_triage_show(&ctx, uuid, json).await,
            TriageAction::Decide { uuid, decision } => cmd_triage_decide(&ctx, uuid, decision).await,
        },
        Command::Config { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// hunt
// ---------------------------------------------------------------------------

async fn cmd_hunt(ctx: &Context, purpose: Option<&str>) -> Result<()> {
    let purpose = ctx.purpose(purpose);
    let storage = ctx.open_storage().await?;

    let registry = AgentRegistry::builtin(build_client(&ctx.config.http)?);
    let referenced = storage.list_referenced_agent_types().await?;
    registry.validate(referenced.as_slice())?;

    let sources = storage.list_active_sources(purpose).await?;
    if sources.is_empty() {
        println!("No active sources for purpose '{purpose}'.");
        return Ok(());
    }
    info!(purpose, sources = sources.len(), "starting hunt");

    let storage = Arc::new(storage);
    let dispatcher = Dispatcher::new(
        Arc::clone(&storage),
        registry,
        CredentialStore::from(&ctx.config),
        DispatchConfig::from(&ctx.config),
    );

    let total = sources.len();
    let signal = dispatcher.dispatch(sources);
    let spinner = spinner()?;
    spinner.set_message(format!("Hunting across {total} source(s)..."));
    while !signal.is_complete() {
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    spinner.finish_and_clear();

    let summary = signal.wait().await;
    if summary.aborted {
        return Err(eyre!("dispatch aborted before every domain finished"));
    }
    print_summary(&summary);

    println!();
    println!("  Source state after run:");
    for outcome in &summary.outcomes {
        if let Some(source) = storage.get_source(outcome.source_id).await? {
            print_source_state(&source);
        }
    }
    println!();
    Ok(())
}

fn spinner() -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    Ok(spinner)
}

fn print_summary(summary: &DispatchSummary) {
    let elapsed = summary.finished_at - summary.started_at;
    println!();
    println!(
        "  Hunt finished in {:.1}s: {} succeeded, {} failed, {} new lead(s)",
        elapsed.num_milliseconds() as f64 / 1000.0,
        summary.succeeded(),
        summary.failed(),
        summary.total_filed(),
    );
    println!();
    println!(
        "  {:<6} {:<28} {:>7} {:>6} {:>6} {:>5} {:>6}  STATUS",
        "ID", "SOURCE", "FETCHED", "LEADS", "FILED", "DUPS", "FAILED"
    );
    for o in &summary.outcomes {
        println!(
            "  {:<6} {:<28} {:>7} {:>6} {:>6} {:>5} {:>6}  {}",
            o.source_id,
            truncate(&o.source_name, 28),
            o.fetched,
            o.translated,
            o.filed,
            o.duplicates,
            o.failed,
            o.status,
        );
    }
}

fn print_source_state(source: &SourceConfig) {
    println!(
        "  {:<6} {:<28} bookmark={} failures={} checked={}",
        source.id,
        truncate(&source.name, 28),
        source.last_known_item_id.as_deref().unwrap_or("-"),
        source.consecutive_failures,
        source
            .last_checked_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into()),
    );
}

// ---------------------------------------------------------------------------
// sources
// ---------------------------------------------------------------------------

async fn cmd_sources_list(ctx: &Context) -> Result<()> {
    let storage = ctx.open_storage().await?;
    let sources = storage.list_sources().await?;
    if sources.is_empty() {
        println!("No sources registered. Add one with `hunter sources add`.");
        return Ok(());
    }

    println!(
        "  {:<6} {:<24} {:<10} {:<16} {:<8} {:>8}  BOOKMARK",
        "ID", "NAME", "AGENT", "DOMAIN", "ACTIVE", "FAILURES"
    );
    for s in &sources {
        println!(
            "  {:<6} {:<24} {:<10} {:<16} {:<8} {:>8}  {}",
            s.id,
            truncate(&s.name, 24),
            s.agent_type,
            truncate(&s.domain_name, 16),
            if s.is_active { "yes" } else { "no" },
            s.consecutive_failures,
            s.last_known_item_id.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

async fn cmd_sources_add(
    ctx: &Context,
    name: String,
    agent_type: String,
    target: String,
    domain: &str,
    purpose: String,
    is_active: bool,
) -> Result<()> {
    let registry = AgentRegistry::builtin(build_client(&ctx.config.http)?);
    registry.validate(&[agent_type.as_str()])?;

    let storage = ctx.open_storage().await?;
    let domain_id = storage.add_domain(domain).await?;
    let id = storage
        .add_source(&NewSource {
            name: name.clone(),
            agent_type,
            target,
            domain_id,
            purpose,
            is_active,
        })
        .await?;

    println!("Source '{name}' registered with id {id} (domain '{domain}').");
    Ok(())
}

async fn cmd_sources_toggle(ctx: &Context, id: i64, active: bool) -> Result<()> {
    let storage = ctx.open_storage().await?;
    storage.set_source_active(id, active).await?;
    println!(
        "Source {id} {}.",
        if active { "enabled" } else { "disabled" }
    );
    Ok(())
}

async fn cmd_domain_add(ctx: &Context, name: &str) -> Result<()> {
    let storage = ctx.open_storage().await?;
    let id = storage.add_domain(name).await?;
    println!("Domain '{name}' has id {id}.");
    Ok(())
}

// ---------------------------------------------------------------------------
// triage
// ---------------------------------------------------------------------------

async fn cmd_triage_list(ctx: &Context, status: Option<LeadStatus>) -> Result<()> {
    let storage = ctx.open_storage().await?;
    let leads = TriageService::new(&storage).list_staged_leads(status).await?;
    if leads.is_empty() {
        println!("Nothing to triage.");
        return Ok(());
    }

    println!("  {:<36} {:<8} {:<10} TITLE", "UUID", "STATUS", "PUBLISHED");
    for staged in &leads {
        let published = if staged.lead.has_sentinel_date() {
            "-".to_string()
        } else {
            staged.lead.publication_date().format("%Y-%m-%d").to_string()
        };
        println!(
            "  {:<36} {:<8} {:<10} {}",
            staged
                .lead
                .lead_uuid()
                .map(|u| u.to_string())
                .unwrap_or_default(),
            staged.status,
            published,
            truncate(staged.lead.title(), 70),
        );
    }
    println!();
    println!("  {} staged lead(s)", leads.len());
    Ok(())
}

async fn cmd_triage_show(ctx: &Context, uuid: Uuid, json: bool) -> Result<()> {
    let storage = ctx.open_storage().await?;
    let staged = storage
        .get_staged_lead(uuid)
        .await?
        .ok_or_else(|| eyre!("no staged lead {uuid}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&staged)?);
        return Ok(());
    }

    let lead = &staged.lead;
    println!();
    println!("  {}", lead.title());
    println!("  UUID:      {uuid}");
    println!("  Status:    {}", staged.status);
    println!("  Source:    {} (id {})", lead.source_name(), staged.source_id);
    println!("  URL:       {}", lead.url());
    if !lead.has_sentinel_date() {
        println!("  Published: {}", lead.publication_date().to_rfc3339());
    }
    if let Some(image) = lead.image_url() {
        println!("  Image:     {image}");
    }
    println!("  Metadata:  {}", lead.metadata().kind());
    println!();
    match lead.text() {
        Some(text) => println!("{text}"),
        None => println!("  (HTML only, {} bytes)", lead.html().map(str::len).unwrap_or(0)),
    }
    println!();
    Ok(())
}

async fn cmd_triage_decide(ctx: &Context, uuid: Uuid, decision: TriageDecision) -> Result<()> {
    let storage = ctx.open_storage().await?;
    let mut service = TriageService::new(&storage);
    if let Some(dir) = &ctx.config.triage.training_export_dir {
        service = service.with_export_dir(expand_path(dir)?);
    }

    match service.apply_triage_decision(uuid, decision).await? {
        TriageOutcome::Promoted(case) => {
            println!("Lead {uuid} promoted to case {} ({}).", case.id, case.public_uuid);
        }
        TriageOutcome::Ignored => println!("Lead {uuid} ignored."),
        TriageOutcome::Triaged => println!("Lead {uuid} marked for later review."),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let mut config: AppConfig = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    redact_credentials(&mut config);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

/// Mask literal secrets; `*_env` entries only name a variable and stay visible.
fn redact_credentials(config: &mut AppConfig) {
    for table in config.credentials.values_mut() {
        for (key, value) in table.iter_mut() {
            if !key.ends_with("_env") {
                *value = "********".into();
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_triage_decision() {
        let uuid = Uuid::now_v7();
        let cli = Cli::try_parse_from(["hunter", "triage", "decide", &uuid.to_string(), "ignore"])
            .unwrap();
        match cli.command {
            Command::Triage {
                action: TriageAction::Decide { uuid: parsed, decision },
            } => {
                assert_eq!(parsed, uuid);
                assert_eq!(decision, TriageDecision::Ignore);
            }
            _ => panic!("wrong command"),
        }
        assert!(Cli::try_parse_from(["hunter", "triage", "decide", &uuid.to_string(), "maybe"]).is_err());
    }

    #[test]
    fn parses_sources_add() {
        let cli = Cli::try_parse_from([
            "hunter", "sources", "add", "--name", "local news", "--agent", "gnews_io",
            "--target", "city council", "--domain", "GNews", "--inactive",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Sources {
                action: SourcesAction::Add { inactive: true, .. }
            }
        ));
    }

    #[test]
    fn redacts_literal_secrets_only() {
        let mut config = AppConfig::default();
        config.credentials.insert(
            "Reddit".into(),
            [
                ("client_id".to_string(), "abc".to_string()),
                ("client_secret_env".to_string(), "REDDIT_SECRET".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        redact_credentials(&mut config);
        let table = &config.credentials["Reddit"];
        assert_eq!(table["client_id"], "********");
        assert_eq!(table["client_secret_env"], "REDDIT_SECRET");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("épées et lances", 6), "épées…");
    }
}
