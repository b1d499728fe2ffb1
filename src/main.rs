use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use is_terminal::IsTerminal;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use repeater::chart::{ChartRenderer, RenderedChart, SvgBarChart};
use repeater::error::{QueryError, RankError};
use repeater::names::{JsonDirectory, NameResolver};
use repeater::rank;
use repeater::reply::{self, Command};
use repeater::{logging, status, AggregateStore, Category, Config, RepeatEvent, RepeaterService};

#[derive(Parser)]
#[command(name = "repeater")]
#[command(about = "Group chat repeat statistics", long_about = None)]
struct Cli {
    /// Data directory (default: $REPEATER_DATA_DIR or .repeater)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Entries per leaderboard
    #[arg(long, global = true)]
    top_n: Option<usize>,

    /// Distinct words kept per period bucket (0 = unlimited)
    #[arg(long, global = true)]
    max_words: Option<usize>,

    /// Do not render chart images
    #[arg(long, global = true)]
    no_charts: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read JSON-lines group messages from stdin and answer rank commands on stdout
    Run {
        /// JSON member directory: {"group": {"user": {"card": .., "nickname": ..}}}
        #[arg(long)]
        members: Option<PathBuf>,
    },
    /// Print a leaderboard from the stored counters
    Rank {
        #[arg(long)]
        group: i64,
        /// repeaters, victims or words
        #[arg(long, default_value = "repeaters")]
        category: Category,
        /// total, year, month or day
        #[arg(long, default_value = "total")]
        period: String,
        /// Explicit bucket key such as 2024-06 (overrides --period)
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        members: Option<PathBuf>,
        /// Write the chart to this file
        #[arg(long)]
        chart: Option<PathBuf>,
    },
    /// Drop day and month buckets that closed before a date
    Prune {
        /// Cutoff date (YYYY-MM-DD)
        #[arg(long)]
        before: NaiveDate,
    },
    /// Show stored groups and bucket counts
    Status,
}

/// One inbound group message
#[derive(Debug, Deserialize)]
struct InboundMessage {
    group_id: i64,
    user_id: i64,
    #[serde(alias = "message")]
    text: String,
}

/// One line written to stdout by `run`
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Outbound {
    Repeat(RepeatEvent),
    Reply {
        group_id: i64,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<PathBuf>,
    },
    Error {
        message: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(n) = cli.top_n {
        config.top_n = n;
    }
    if let Some(n) = cli.max_words {
        config.max_words_per_bucket = (n > 0).then_some(n);
    }
    if cli.no_charts {
        config.charts = false;
    }

    logging::init_logging(&config.data_dir)?;

    match cli.command {
        Commands::Run { members } => run(&config, members.as_deref()),
        Commands::Rank {
            group,
            category,
            period,
            key,
            members,
            chart,
        } => rank_once(
            &config,
            group,
            category,
            &period,
            key.as_deref(),
            members.as_deref(),
            chart.as_deref(),
        ),
        Commands::Prune { before } => {
            let store = open_store(&config)?;
            let removed = store.prune_before(before)?;
            eprintln!("Pruned {} bucket(s) closed before {}", removed, before);
            Ok(())
        }
        Commands::Status => status::run(&config),
    }
}

fn open_store(config: &Config) -> Result<AggregateStore> {
    let store = AggregateStore::load(config.data_file())
        .context("Failed to load repeat counters")?
        .with_max_words_per_bucket(config.max_words_per_bucket);
    Ok(store)
}

fn load_directory(members: Option<&Path>) -> Result<JsonDirectory> {
    match members {
        Some(path) => JsonDirectory::load(path),
        None => Ok(JsonDirectory::default()),
    }
}

fn run(config: &Config, members: Option<&Path>) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    let resolver = NameResolver::new(load_directory(members)?, config.name_cache_capacity);
    let mut service = RepeaterService::new(open_store(config)?, resolver, config.top_n);
    if config.charts {
        service = service.with_renderer(Box::new(SvgBarChart::default()));
    }

    if io::stdin().is_terminal() {
        eprintln!("Reading messages as JSON lines, e.g. {{\"group_id\": 1, \"user_id\": 2, \"text\": \"hi\"}}");
    }
    tracing::info!("Repeat tracker running on stdin");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let message: InboundMessage = match serde_json::from_str(trimmed) {
            Ok(m) => m,
            Err(e) => {
                emit(
                    &mut out,
                    &Outbound::Error {
                        message: format!("json parse: {}", e),
                    },
                )?;
                continue;
            }
        };

        // Commands are answered, never counted as chat.
        if let Some(command) = Command::parse(&message.text) {
            let reply = runtime.block_on(service.rank(message.group_id, &command));
            let image = match reply.image {
                Some(chart) => save_chart(config, message.group_id, &chart)
                    .map_err(|e| tracing::warn!("Chart not saved: {:#}", e))
                    .ok(),
                None => None,
            };
            emit(
                &mut out,
                &Outbound::Reply {
                    group_id: message.group_id,
                    text: reply.text,
                    image,
                },
            )?;
            continue;
        }

        if let Some(event) = service.handle_message(message.group_id, message.user_id, &message.text)
        {
            emit(&mut out, &Outbound::Repeat(event))?;
        }
    }

    out.flush()?;
    service.store().flush()?;
    Ok(())
}

fn emit(out: &mut impl Write, line: &Outbound) -> Result<()> {
    serde_json::to_writer(&mut *out, line)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn save_chart(config: &Config, group_id: i64, chart: &RenderedChart) -> Result<PathBuf> {
    let dir = config.charts_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create chart directory: {}", dir.display()))?;
    let path = dir.join(format!(
        "{}-{}.{}",
        group_id,
        Local::now().format("%Y%m%d%H%M%S%3f"),
        chart.extension
    ));
    std::fs::write(&path, &chart.bytes)
        .with_context(|| format!("Failed to write chart: {}", path.display()))?;
    Ok(path)
}

fn rank_once(
    config: &Config,
    group: i64,
    category: Category,
    period: &str,
    key: Option<&str>,
    members: Option<&Path>,
    chart: Option<&Path>,
) -> Result<()> {
    let store = open_store(config)?;
    let result = match key {
        Some(key) => rank::top_n_for_key(&store, group, key, category, config.top_n),
        None => rank::top_n(
            &store,
            group,
            period,
            category,
            config.top_n,
            Local::now().date_naive(),
        ),
    };

    let ranking = match result {
        Ok(ranking) => ranking,
        Err(QueryError::Rank(RankError::InvalidPeriod(_))) => {
            println!("{}", reply::INVALID_PERIOD_MESSAGE);
            return Ok(());
        }
        Err(QueryError::Rank(RankError::NoData)) => {
            println!("{}", reply::NO_DATA_MESSAGE);
            return Ok(());
        }
        Err(QueryError::Store(e)) => return Err(e.into()),
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let resolver = NameResolver::new(load_directory(members)?, config.name_cache_capacity);
    let service = RepeaterService::new(store, resolver, config.top_n);
    let rows = runtime.block_on(service.labelled_rows(group, &ranking));

    println!(
        "{}",
        reply::format_ranking(category, &ranking.period_key, &rows)
    );

    if let Some(path) = chart {
        let title = reply::chart_title(category, &ranking.period_key);
        let rendered = SvgBarChart::default().render(&title, &rows)?;
        std::fs::write(path, &rendered.bytes)
            .with_context(|| format!("Failed to write chart: {}", path.display()))?;
        eprintln!("Chart written to: {}", path.display());
    }

    Ok(())
}
