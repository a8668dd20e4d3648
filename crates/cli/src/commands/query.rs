use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Result, bail};
use clap::Args;

use sift_engine::SearchPredicate;
use sift_runtime::history::{HistoryEvent, HistoryStore, QueryEvent};
use sift_store::{Level, LevelMask, QueryOptions};

use crate::commands::SourceArgs;
use crate::printer::{OutputFormat, print_records};

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Predicate: whitespace separates AND groups, '|' separates a
    /// group's alternatives. Empty means "everything".
    #[arg(default_value = "")]
    pub predicate: String,

    /// Record source.
    #[command(flatten)]
    pub source: SourceArgs,

    /// Only these levels, comma separated (info,warn,debug,error,unknown,message).
    #[arg(long, value_name = "LEVELS")]
    pub level: Option<String>,

    /// Lower bound on the record timestamp, ms since epoch.
    #[arg(long, value_name = "MS")]
    pub since: Option<i64>,

    /// Upper bound on the record timestamp, ms since epoch.
    #[arg(long, value_name = "MS")]
    pub until: Option<i64>,

    /// Maximum number of results to display.
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,

    /// Output results as NDJSON (one JSON object per line).
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: QueryArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[error] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn parse_level_mask(spec: &str) -> Result<LevelMask> {
    let mut mask = LevelMask::empty();
    for part in spec.split(',').filter(|p| !p.trim().is_empty()) {
        let level = match part.trim().to_ascii_lowercase().as_str() {
            "info" => Level::Info,
            "warn" => Level::Warn,
            "debug" => Level::Debug,
            "error" => Level::Error,
            "unknown" => Level::Unknown,
            "message" => Level::Message,
            other => bail!("unknown level {other:?}"),
        };
        mask |= LevelMask::of(level);
    }
    Ok(mask)
}

fn execute(args: QueryArgs) -> Result<ExitCode> {
    let engine = args.source.load()?;

    let predicate = SearchPredicate::parse(&args.predicate);
    let levels = match &args.level {
        Some(spec) => parse_level_mask(spec)?,
        None => LevelMask::all(),
    };
    let window = match (args.since, args.until) {
        (None, None) => None,
        (from, to) => Some((from.unwrap_or(i64::MIN), to.unwrap_or(i64::MAX))),
    };

    let options = QueryOptions {
        levels,
        window,
        limit: Some(args.limit),
    };

    let started = Instant::now();
    let records = engine.search(&predicate, options)?;
    let elapsed_ms = started.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    print_records(&records, format)?;
    if !args.json {
        eprintln!("{} results in {} ms", records.len(), elapsed_ms);
    }

    if let Some(history) = HistoryStore::new() {
        history.log_event(HistoryEvent::Query(QueryEvent::new(
            args.predicate.clone(),
            records.len(),
            elapsed_ms,
        )));
    }

    Ok(ExitCode::SUCCESS)
}
