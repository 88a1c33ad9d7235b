//! Boardpulse - flow telemetry and ranked interventions for team boards.
//!
//! Reads a project from Jira Cloud (or a captured JSON snapshot) and
//! prints its board context, metrics, and recommended actions.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use boardpulse::core::{Config, DegradationReport};
use boardpulse::metrics::{format_hours, format_percent, format_signed_percent, TimeAggregate};
use boardpulse::recommend::{ActionId, ActionRecommendation, RecommendationEngine};
use boardpulse::source::{parse_timestamp, SnapshotSource, TrackerSource};
use boardpulse::{Dashboard, DashboardSnapshot, Narrator, Phase};

/// Flow telemetry and ranked interventions for team boards
#[derive(Parser)]
#[command(name = "boardpulse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Read the project from a JSON snapshot instead of Jira
    #[arg(short, long, global = true, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Output format (defaults to the configured format)
    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Evaluate as of this time (RFC 3339); defaults to the snapshot time or now
    #[arg(long, global = true, value_name = "TIME")]
    now: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the board model and sprint of a project
    Context {
        /// Project key
        project: String,
    },

    /// Show the workflow topology, or resolve one status
    Topology {
        /// Project key
        project: String,

        /// Status name to resolve
        #[arg(long)]
        status: Option<String>,

        /// Item type to resolve the status for
        #[arg(long = "type", requires = "status")]
        item_type: Option<String>,
    },

    /// Show pace, load, and health metrics
    Metrics {
        /// Project key
        project: String,
    },

    /// Show ranked recommendations
    Recommend {
        /// Project key
        project: String,

        /// Only consider these actions (e.g., split-ticket)
        #[arg(short, long = "action")]
        actions: Vec<ActionId>,

        /// Maximum recommendations to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Describe one item's risk factors and applicable actions
    Describe {
        /// Project key
        project: String,

        /// Item key (e.g., ENG-42)
        item: String,
    },

    /// Run a full refresh and print the dashboard
    Refresh {
        /// Project key
        project: String,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    // Logs go to stderr so JSON output stays parseable
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    // Credentials may live in a .env file
    dotenvy::dotenv().ok();

    match &cli.command {
        Commands::Config { path } => cmd_config(*path),
        Commands::Completions { shell } => {
            cmd_completions(*shell);
            Ok(())
        }
        Commands::Context { project } => cmd_context(&cli, project),
        Commands::Topology { project, status, item_type } => {
            cmd_topology(&cli, project, status.as_deref(), item_type.as_deref())
        }
        Commands::Metrics { project } => cmd_metrics(&cli, project),
        Commands::Recommend { project, actions, limit } => {
            cmd_recommend(&cli, project, actions, *limit)
        }
        Commands::Describe { project, item } => cmd_describe(&cli, project, item),
        Commands::Refresh { project } => cmd_refresh(&cli, project),
    }
}

/// Everything a data command needs.
struct Session {
    dashboard: Dashboard,
    now: DateTime<Utc>,
    format: OutputFormat,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let config = Config::load()?;

        let format = match cli.format {
            Some(format) => format,
            None if config.output.format == "json" => OutputFormat::Json,
            None => OutputFormat::Text,
        };

        let (source, captured_at): (Box<dyn TrackerSource>, Option<DateTime<Utc>>) =
            match &cli.snapshot {
                Some(path) => {
                    let source = SnapshotSource::load(path)
                        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
                    let captured_at = source.captured_at();
                    (Box::new(source) as Box<dyn TrackerSource>, captured_at)
                }
                None => (jira_source(&config)?, None),
            };

        let now = match &cli.now {
            Some(value) => parse_timestamp(value)
                .ok_or_else(|| anyhow::anyhow!("Invalid --now timestamp: {}", value))?,
            None => captured_at.unwrap_or_else(Utc::now),
        };

        Ok(Self { dashboard: Dashboard::new(source, config), now, format })
    }

    fn refresh(&self, project: &str) -> Result<DashboardSnapshot> {
        // Create tokio runtime for async operations
        let rt = tokio::runtime::Runtime::new()?;
        Ok(rt.block_on(self.dashboard.refresh(project, self.now)))
    }
}

#[cfg(feature = "jira")]
fn jira_source(config: &Config) -> Result<Box<dyn TrackerSource>> {
    use boardpulse::source::JiraSource;

    let source = JiraSource::from_env(&config.source).map_err(|e| {
        anyhow::anyhow!(
            "Jira integration not configured ({}).\n\n\
             To enable, set JIRA_BASE_URL, JIRA_EMAIL, and JIRA_API_TOKEN,\n\
             or pass --snapshot <FILE> to read a captured project.",
            e
        )
    })?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "jira"))]
fn jira_source(_config: &Config) -> Result<Box<dyn TrackerSource>> {
    anyhow::bail!("Built without Jira support. Pass --snapshot <FILE> to read a captured project.")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn warn_degraded(report: &DegradationReport) {
    for feed in report.degraded_feeds() {
        eprintln!("warning: {} {}; using: {}", feed.feed, feed.reason, feed.fallback);
    }
}

/// Show the board context.
fn cmd_context(cli: &Cli, project: &str) -> Result<()> {
    let session = Session::open(cli)?;
    let rt = tokio::runtime::Runtime::new()?;
    let (board, degraded) = rt.block_on(session.dashboard.board_context(project, session.now));

    if session.format == OutputFormat::Json {
        return print_json(&serde_json::json!({ "board": board, "degraded": degraded }));
    }

    warn_degraded(&degraded);
    println!("Project:   {}", project);
    match (&board.board_name, board.board_id) {
        (Some(name), Some(id)) => println!("Board:     {} '{}' (#{})", board.model, name, id),
        _ => println!("Board:     none ({})", board.model),
    }
    if let Some(sprint) = &board.sprint {
        match board.days_remaining {
            Some(days) if board.sprint_active => {
                println!("Sprint:    {} (active, {} days left)", sprint.name, days)
            }
            _ => println!("Sprint:    {} (upcoming)", sprint.name),
        }
    }
    match board.wip_limit {
        Some(limit) => println!("WIP limit: {}", limit),
        None => println!("WIP limit: --"),
    }

    Ok(())
}

/// Show the workflow topology.
fn cmd_topology(
    cli: &Cli,
    project: &str,
    status: Option<&str>,
    item_type: Option<&str>,
) -> Result<()> {
    let session = Session::open(cli)?;
    let rt = tokio::runtime::Runtime::new()?;
    let (topology, degraded) = rt.block_on(session.dashboard.topology(project));

    if let Some(status) = status {
        let phase = topology.resolve_phase(status, item_type);
        if session.format == OutputFormat::Json {
            return print_json(&serde_json::json!({ "status": status, "phase": phase }));
        }
        warn_degraded(&degraded);
        println!("{} -> {}", status, phase);
        return Ok(());
    }

    if session.format == OutputFormat::Json {
        return print_json(&serde_json::json!({ "topology": topology, "degraded": degraded }));
    }

    warn_degraded(&degraded);
    println!("Statuses:       {}", topology.len());
    println!("Start statuses: {}", topology.start_statuses().join(", "));
    println!("Done statuses:  {}", topology.done_statuses().join(", "));

    Ok(())
}

fn format_aggregate(label: &str, aggregate: Option<&TimeAggregate>) -> String {
    match aggregate {
        Some(agg) => format!(
            "{:<11}avg {}  median {}  p85 {}  (n={}{})",
            label,
            format_hours(Some(agg.average_hours)),
            format_hours(Some(agg.median_hours)),
            format_hours(Some(agg.p85_hours)),
            agg.samples,
            if agg.is_proxy() { ", proxy" } else { "" }
        ),
        None => format!("{:<11}--", label),
    }
}

/// Show metrics.
fn cmd_metrics(cli: &Cli, project: &str) -> Result<()> {
    let session = Session::open(cli)?;
    let snapshot = session.refresh(project)?;

    if session.format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "metrics": snapshot.metrics,
            "degraded": snapshot.degraded,
        }));
    }

    warn_degraded(&snapshot.degraded);
    let Some(metrics) = &snapshot.metrics else {
        println!("Metrics unavailable.");
        return Ok(());
    };

    println!("Health:     {}", metrics.health);
    if snapshot.board.model.is_sprint_based() {
        println!("Pace:       {}", format_signed_percent(metrics.pace_variance));
    }
    println!("Completion: {}", format_percent(Some(metrics.completion_percent)));
    println!(
        "WIP:        {} / {} ({})",
        metrics.wip_current,
        metrics.wip_limit.map_or_else(|| "--".to_string(), |l| l.to_string()),
        format_percent(metrics.wip_load)
    );
    println!("{}", format_aggregate("Cycle time:", metrics.cycle_time.as_ref()));
    println!("{}", format_aggregate("Lead time:", metrics.lead_time.as_ref()));

    if !metrics.assignee_load.is_empty() {
        println!("\nAssignee load:");
        for (assignee, load) in &metrics.assignee_load {
            println!("  {:<20} {}", assignee, format_percent(Some(*load)));
        }
    }

    Ok(())
}

fn print_recommendations(recommendations: &[ActionRecommendation]) {
    if recommendations.is_empty() {
        println!("  No recommendations.");
        return;
    }
    for rec in recommendations {
        println!(
            "  [{:<11}] {:<18} {:<10} {}",
            rec.relevance.to_string(),
            rec.action.id.as_str(),
            rec.item_key,
            rec.reason.as_deref().unwrap_or(rec.action.description)
        );
    }
}

/// Show ranked recommendations.
fn cmd_recommend(
    cli: &Cli,
    project: &str,
    actions: &[ActionId],
    limit: Option<usize>,
) -> Result<()> {
    let session = Session::open(cli)?;
    let snapshot = session.refresh(project)?;

    let mut config = session.dashboard.config().engine.clone();
    if let Some(limit) = limit {
        config.max_recommendations = limit;
        config.validate().context("Invalid --limit")?;
    }
    let subset = (!actions.is_empty()).then_some(actions);
    let recommendations =
        RecommendationEngine::new(config).recommend(&snapshot.items, &snapshot.board, subset);

    if session.format == OutputFormat::Json {
        return print_json(&recommendations);
    }

    warn_degraded(&snapshot.degraded);
    if snapshot.metrics.is_none() {
        println!("Items unavailable; no recommendations.");
        return Ok(());
    }
    println!("Recommendations for {}:\n", project);
    print_recommendations(&recommendations);

    Ok(())
}

/// Describe one item.
fn cmd_describe(cli: &Cli, project: &str, key: &str) -> Result<()> {
    let session = Session::open(cli)?;
    let snapshot = session.refresh(project)?;

    let item = snapshot
        .item(key)
        .ok_or_else(|| anyhow::anyhow!("Item '{}' not found in {}", key, project))?;

    let engine_config = &session.dashboard.config().engine;
    let narrative =
        Narrator::new(engine_config.narrator_max_clauses).describe(item, &snapshot.board);
    let evaluations: Vec<_> = RecommendationEngine::new(engine_config.clone())
        .evaluate_all(item, &snapshot.board)
        .into_iter()
        .filter(|(_, eval)| eval.is_visible())
        .collect();

    if session.format == OutputFormat::Json {
        let actions: Vec<_> = evaluations
            .iter()
            .map(|(id, eval)| {
                serde_json::json!({ "action": id, "relevance": eval.relevance, "reason": eval.reason })
            })
            .collect();
        return print_json(&serde_json::json!({
            "item": item,
            "description": narrative,
            "actions": actions,
        }));
    }

    warn_degraded(&snapshot.degraded);
    println!("{} {}", item.key, item.title);
    println!(
        "  {} ({}) | {} | {}",
        if item.status.is_empty() { "-" } else { item.status.as_str() },
        item.phase,
        item.priority,
        item.assignee.as_deref().unwrap_or("unassigned")
    );
    println!("\n{}\n", narrative);

    let mut evaluations = evaluations;
    evaluations.sort_by_key(|(_, eval)| eval.relevance);
    for (id, eval) in &evaluations {
        match &eval.reason {
            Some(reason) => println!("  [{:<11}] {:<18} {}", eval.relevance.to_string(), id.as_str(), reason),
            None => println!("  [{:<11}] {}", eval.relevance.to_string(), id.as_str()),
        }
    }
    if item.phase == Phase::Done {
        println!("  Item is done; no actions apply.");
    }

    Ok(())
}

/// Run a full refresh.
fn cmd_refresh(cli: &Cli, project: &str) -> Result<()> {
    let session = Session::open(cli)?;
    let snapshot = session.refresh(project)?;

    if session.format == OutputFormat::Json {
        return print_json(&snapshot);
    }

    warn_degraded(&snapshot.degraded);
    println!("{}\n", snapshot.summary);
    println!("Top actions:");
    print_recommendations(&snapshot.recommendations);

    Ok(())
}

/// Show configuration.
fn cmd_config(show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = Config::load()?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "boardpulse", &mut io::stdout());
}
