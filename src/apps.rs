use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, error::ErrorKind};

use crate::config::{DisplayOptions, PipelineConfig};
use crate::errors::PipelineError;
use crate::render::PlainRenderer;
use crate::request::{QueryRequest, RawResult};
use crate::response::ResponseOrchestrator;
use crate::stages::{AggregateDescriptor, LimitDescriptor, OrderDescriptor};

#[derive(Debug, Parser)]
#[command(
    name = "query_file",
    disable_help_subcommand = true,
    about = "Aggregate, sort, and limit a delimited result file, then print it",
    long_about = "Post-process a raw query result (header line first) through the aggregate, sort, and limit stages. Each stage output is memoized as a working file, so repeating a request with the same parameters skips recomputation.",
    after_help = "The working-file directory is resolved in order by --cache-dir, the TABLECACHE_DIR environment variable, then the result file's own directory."
)]
/// CLI for `query_file`.
///
/// Common usage:
/// - Group and count: `--group-by 1 --aggregate '{"count": [2]}'`
/// - Sort by column 2 descending, numerically: `--order 2,d,n`
/// - Window rows: `--limit 10` or `--limit 20,10`
struct QueryFileCli {
    #[arg(value_name = "RESULT", help = "Raw result file with a header line")]
    result: PathBuf,
    #[arg(
        long,
        value_name = "MAPPING",
        default_value = "",
        help = "Aggregate mapping literal, e.g. '{\"count\": [2], \"sum\": [3]}'"
    )]
    aggregate: String,
    #[arg(
        long = "group-by",
        value_name = "COLUMNS",
        default_value = "",
        help = "Comma-separated 1-based group-by columns"
    )]
    group_by: String,
    #[arg(
        long,
        value_name = "KEYS",
        default_value = "",
        help = "Sort keys as column,direction,mode triples separated by ';' or spaces"
    )]
    order: String,
    #[arg(
        long,
        value_name = "[OFFSET,]COUNT",
        default_value = "",
        help = "Row window: count, or offset,count"
    )]
    limit: String,
    #[arg(
        long = "cache-dir",
        value_name = "DIR",
        help = "Optional directory for working files"
    )]
    cache_dir: Option<PathBuf>,
    #[arg(
        long,
        default_value = ",",
        value_parser = parse_delimiter,
        help = "Single-byte field delimiter"
    )]
    delimiter: u8,
    #[arg(long, help = "Print one field per line")]
    vertical: bool,
    #[arg(long, help = "Copy the final file verbatim without a summary")]
    raw: bool,
    #[arg(long, help = "Append the final file path and cache marker to the summary")]
    verbose: bool,
    #[arg(long, help = "Print request fields before the summary")]
    debug: bool,
    #[arg(
        long = "header",
        value_name = "NAMES",
        help = "Comma-separated column names shown instead of the file header"
    )]
    header_override: Option<String>,
    #[arg(
        long = "elapsed-ms",
        value_name = "MILLIS",
        help = "Query time reported in the summary"
    )]
    elapsed_ms: Option<u64>,
}

/// Run the `query_file` command, writing the response to stdout.
pub fn run_query_file<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_query_file_to(args_iter, &mut out)
}

/// Run the `query_file` command against an arbitrary output stream.
///
/// Pipeline failures print their token to stderr and are returned as errors.
pub fn run_query_file_to<I>(args_iter: I, out: &mut dyn Write) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let Some(cli) =
        parse_cli::<QueryFileCli, _>(std::iter::once("query_file".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };
    match respond(cli, out) {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("{}", err.token());
            Err(err.into())
        }
    }
}

fn respond(cli: QueryFileCli, out: &mut dyn Write) -> Result<(), PipelineError> {
    let request = QueryRequest {
        request_type: "file".into(),
        display: DisplayOptions {
            vertical: cli.vertical,
            raw: cli.raw,
            verbose: cli.verbose,
            debug: cli.debug,
            header_override: cli.header_override,
        },
        aggregate: AggregateDescriptor::parse(&cli.aggregate, &cli.group_by)?,
        order: OrderDescriptor::parse(&cli.order)?,
        limit: LimitDescriptor::parse(&cli.limit)?,
        ..QueryRequest::default()
    };
    let config = PipelineConfig {
        cache_root: PipelineConfig::resolve_cache_root(cli.cache_dir),
        delimiter: cli.delimiter,
    };
    let mut raw = RawResult::new(cli.result);
    if let Some(millis) = cli.elapsed_ms {
        raw = raw.with_elapsed(Duration::from_millis(millis));
    }
    let mut orchestrator = ResponseOrchestrator::new(&config, PlainRenderer::new(config.delimiter));
    orchestrator.respond(&request, &raw, out)?;
    Ok(())
}

fn parse_delimiter(raw: &str) -> Result<u8, String> {
    match raw.as_bytes() {
        [byte] => Ok(*byte),
        _ if raw == "\\t" => Ok(b'\t'),
        _ => Err(format!("--delimiter expects a single byte, got '{raw}'")),
    }
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
