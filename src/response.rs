//! Response orchestration: aggregate → sort → limit, then render and report.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::record_set::{count_rows, read_header};
use crate::render::{Renderer, TableMeta, copy_raw};
use crate::report::{Summary, format_summary};
use crate::request::{QueryRequest, RawResult, ResponseContext, ResponseStatus, StageReport};
use crate::stages::{Stage, StageOutput, run_stage};
use crate::store::WorkingStore;

/// Drives one request from raw result file to rendered output.
#[derive(Debug)]
pub struct ResponseOrchestrator<R> {
    store: WorkingStore,
    renderer: R,
}

impl<R: Renderer> ResponseOrchestrator<R> {
    /// Orchestrator writing working files per `config` and drawing with `renderer`.
    pub fn new(config: &PipelineConfig, renderer: R) -> Self {
        Self {
            store: WorkingStore::new(config),
            renderer,
        }
    }

    /// Working store backing the stages.
    pub fn store(&self) -> &WorkingStore {
        &self.store
    }

    /// Run aggregate, sort and limit over `source` in that fixed order.
    ///
    /// Empty descriptors are skipped. The first failing stage aborts the chain.
    pub fn transform(
        &self,
        request: &QueryRequest,
        source: &Path,
    ) -> Result<(PathBuf, Vec<StageReport>), PipelineError> {
        let stages: [&dyn Stage; 3] = [&request.aggregate, &request.order, &request.limit];
        let mut current = source.to_path_buf();
        let mut reports = Vec::new();
        for stage in stages {
            match run_stage(&self.store, &current, stage)? {
                StageOutput::Skipped(_) => {}
                StageOutput::Ready { path, cache_hit } => {
                    reports.push(StageReport {
                        stage: stage.kind(),
                        path: path.clone(),
                        cache_hit,
                    });
                    current = path;
                }
            }
        }
        Ok((current, reports))
    }

    /// Produce the full response for `raw`: transforms, rendering, debug dump and summary.
    ///
    /// Raw results with no data rows skip every stage and report an empty set.
    /// A single data row is rendered as-is without running the stages.
    pub fn respond(
        &mut self,
        request: &QueryRequest,
        raw: &RawResult,
        out: &mut dyn Write,
    ) -> Result<ResponseContext, PipelineError> {
        let delimiter = self.store.delimiter();
        let options = &request.display;
        if !raw.path.is_file() {
            return Err(PipelineError::WorkingFileMissing {
                path: raw.path.clone(),
            });
        }
        let initial_rows = count_rows(&raw.path, delimiter)?;

        if initial_rows <= 1 {
            debug!(
                "[tablecache:response] {} has no data rows, skipping pipeline",
                raw.path.display()
            );
            let context = ResponseContext {
                status: ResponseStatus::Empty,
                final_path: raw.path.clone(),
                row_count: initial_rows,
                elapsed: raw.elapsed,
                cache_hit: false,
                stages: Vec::new(),
            };
            if !options.raw {
                write_summary(&context, options.verbose, out)?;
            }
            return Ok(context);
        }

        let (final_path, stages) = if initial_rows == 2 {
            debug!("[tablecache:response] single data row, stages bypassed");
            (raw.path.clone(), Vec::new())
        } else {
            self.transform(request, &raw.path)?
        };
        if !final_path.is_file() {
            return Err(PipelineError::WorkingFileMissing { path: final_path });
        }
        let row_count = count_rows(&final_path, delimiter)?;
        let columns = read_header(&final_path, delimiter)?.len();
        let cache_hit = !stages.is_empty() && stages.iter().all(|stage| stage.cache_hit);
        info!(
            "[tablecache:response] {} -> {} ({} stages, {} rows, cache_hit={})",
            raw.path.display(),
            final_path.display(),
            stages.len(),
            row_count.saturating_sub(1),
            cache_hit
        );

        if options.raw {
            copy_raw(&final_path, out)?;
        } else {
            let meta = TableMeta { row_count, columns };
            self.renderer.render(&final_path, options, &meta, out)?;
        }

        let context = ResponseContext {
            status: ResponseStatus::Rendered,
            final_path,
            row_count,
            elapsed: raw.elapsed,
            cache_hit,
            stages,
        };
        if !options.raw {
            if options.debug {
                write_debug(request, out)?;
            }
            write_summary(&context, options.verbose, out)?;
        }
        Ok(context)
    }
}

fn write_debug(request: &QueryRequest, out: &mut dyn Write) -> Result<(), PipelineError> {
    for (name, value) in request.debug_fields()? {
        writeln!(out, "{name}: {value}").map_err(|err| PipelineError::Render(err.to_string()))?;
    }
    Ok(())
}

fn write_summary(
    context: &ResponseContext,
    verbose: bool,
    out: &mut dyn Write,
) -> Result<(), PipelineError> {
    let line = format_summary(&Summary {
        path: &context.final_path,
        row_count: context.row_count,
        elapsed: context.elapsed,
        cache_hit: context.cache_hit,
        verbose,
    });
    writeln!(out, "{line}").map_err(|err| PipelineError::Render(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayOptions;
    use crate::render::PlainRenderer;
    use crate::stages::{AggregateDescriptor, LimitDescriptor, OrderDescriptor};
    use std::fs;
    use tempfile::tempdir;

    fn orchestrator() -> ResponseOrchestrator<PlainRenderer> {
        ResponseOrchestrator::new(&PipelineConfig::default(), PlainRenderer::default())
    }

    #[test]
    fn transform_chains_suffixes_in_stage_order() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("result.csv");
        fs::write(&raw, "k,v\nb,2\na,1\nb,3\n").unwrap();
        let request = QueryRequest {
            aggregate: AggregateDescriptor::parse(r#"{"sum": [2]}"#, "1").unwrap(),
            order: OrderDescriptor::parse("1,a,s").unwrap(),
            limit: LimitDescriptor::first(1),
            ..QueryRequest::default()
        };
        let (path, stages) = orchestrator().transform(&request, &raw).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let agg = request.aggregate.cache_token();
        assert_eq!(name, format!("result.agg-{agg}.sort-1as.limit-0_1.csv"));
        assert_eq!(stages.len(), 3);
        assert_eq!(fs::read_to_string(&path).unwrap(), "k,v\na,1\n");
    }

    #[test]
    fn stage_failure_aborts_remaining_stages() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("result.csv");
        fs::write(&raw, "k,v\nb,2\na,1\nb,3\n").unwrap();
        let request = QueryRequest {
            order: OrderDescriptor::parse("7,a,s").unwrap(),
            limit: LimitDescriptor::first(1),
            ..QueryRequest::default()
        };
        let mut out = Vec::new();
        let err = orchestrator()
            .respond(&request, &RawResult::new(&raw), &mut out)
            .unwrap_err();
        assert_eq!(err.token(), "order_error");
        assert!(out.is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn single_row_bypasses_stages() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("result.csv");
        fs::write(&raw, "k,v\na,1\n").unwrap();
        let request = QueryRequest {
            aggregate: AggregateDescriptor::parse(r#"{"count": [2]}"#, "").unwrap(),
            ..QueryRequest::default()
        };
        let mut out = Vec::new();
        let context = orchestrator()
            .respond(&request, &RawResult::new(&raw), &mut out)
            .unwrap();
        assert_eq!(context.final_path, raw);
        assert!(context.stages.is_empty());
        assert!(!context.cache_hit);
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("1 row in set (0.00 sec)\n"));
    }

    #[test]
    fn raw_mode_copies_bytes_without_summary() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("result.csv");
        fs::write(&raw, "k,v\nb,2\na,1\n").unwrap();
        let request = QueryRequest {
            display: DisplayOptions {
                raw: true,
                debug: true,
                ..DisplayOptions::default()
            },
            limit: LimitDescriptor::first(1),
            ..QueryRequest::default()
        };
        let mut out = Vec::new();
        orchestrator()
            .respond(&request, &RawResult::new(&raw), &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "k,v\nb,2\n");
    }

    #[test]
    fn debug_dump_precedes_summary() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("result.csv");
        fs::write(&raw, "k\n1\n2\n").unwrap();
        let request = QueryRequest {
            statement: "SELECT k FROM t".into(),
            display: DisplayOptions {
                debug: true,
                ..DisplayOptions::default()
            },
            ..QueryRequest::default()
        };
        let mut out = Vec::new();
        orchestrator()
            .respond(&request, &RawResult::new(&raw), &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("limit: unbounded\n"));
        assert!(!text.contains("SELECT k FROM t"));
        assert!(text.ends_with("2 rows in set (0.00 sec)\n"));
    }

    #[test]
    fn missing_raw_file_is_reported_distinctly() {
        let dir = tempdir().unwrap();
        let mut out = Vec::new();
        let err = orchestrator()
            .respond(
                &QueryRequest::default(),
                &RawResult::new(dir.path().join("gone.csv")),
                &mut out,
            )
            .unwrap_err();
        assert_eq!(err.token(), "working_file_missing");
    }
}
