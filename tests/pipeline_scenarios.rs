use std::fs;
use std::path::Path;
use std::time::Duration;

use tablecache::{
    AggregateDescriptor, DisplayOptions, LimitDescriptor, OrderDescriptor, PipelineConfig,
    PlainRenderer, QueryRequest, RawResult, RecordSet, ResponseOrchestrator, ResponseStatus,
};

fn write_result(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn orchestrator(cache: &Path) -> ResponseOrchestrator<PlainRenderer> {
    ResponseOrchestrator::new(
        &PipelineConfig::default().with_cache_root(cache),
        PlainRenderer::default(),
    )
}

#[test]
fn limit_only_keeps_header_and_first_row() {
    let temp = tempfile::tempdir().unwrap();
    let raw = write_result(temp.path(), "result.csv", "a,b,c\n1,2,3\n4,5,6\n");
    let request = QueryRequest {
        limit: LimitDescriptor::parse("1").unwrap(),
        ..QueryRequest::default()
    };
    let mut out = Vec::new();
    let context = orchestrator(&temp.path().join("cache"))
        .respond(&request, &RawResult::new(&raw), &mut out)
        .unwrap();

    assert_eq!(context.status, ResponseStatus::Rendered);
    assert_eq!(fs::read_to_string(&context.final_path).unwrap(), "a,b,c\n1,2,3\n");
    assert_eq!(context.row_count, 2);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("1 | 2 | 3"));
    assert!(!text.contains("4 | 5 | 6"));
    assert!(text.ends_with("1 row in set (0.00 sec)\n"));
}

#[test]
fn grouping_a_wide_result_renders_under_the_source_header() {
    let temp = tempfile::tempdir().unwrap();
    let raw = write_result(
        temp.path(),
        "result.csv",
        "zone,host,bytes\nus,a,10\neu,b,40\nus,c,5\n",
    );
    let request = QueryRequest {
        aggregate: AggregateDescriptor::parse("{count: [2]}", "1").unwrap(),
        ..QueryRequest::default()
    };
    let mut out = Vec::new();
    let context = orchestrator(&temp.path().join("cache"))
        .respond(&request, &RawResult::new(&raw), &mut out)
        .unwrap();

    assert_eq!(context.status, ResponseStatus::Rendered);
    assert_eq!(
        fs::read_to_string(&context.final_path).unwrap(),
        "zone,host,bytes\nus,2\neu,1\n"
    );
    assert_eq!(context.row_count, 3);
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("zone | host | bytes\n"));
    assert!(text.contains("us   | 2"));
    assert!(text.ends_with("2 rows in set (0.00 sec)\n"));
}

#[test]
fn group_count_emits_one_row_per_group_value() {
    let temp = tempfile::tempdir().unwrap();
    let raw = write_result(
        temp.path(),
        "result.csv",
        "zone,host\nus,a\neu,b\nus,c\nus,d\neu,e\n",
    );
    let request = QueryRequest {
        aggregate: AggregateDescriptor::parse(r#"{"count": [2]}"#, "1").unwrap(),
        ..QueryRequest::default()
    };
    let mut out = Vec::new();
    let context = orchestrator(&temp.path().join("cache"))
        .respond(&request, &RawResult::new(&raw), &mut out)
        .unwrap();

    let set = RecordSet::read(&context.final_path, b',').unwrap();
    assert_eq!(set.header, vec!["zone", "host"]);
    assert_eq!(
        set.rows,
        vec![
            vec!["us".to_string(), "3".to_string()],
            vec!["eu".to_string(), "2".to_string()],
        ]
    );
    assert_eq!(context.row_count, 3);
    assert!(String::from_utf8(out).unwrap().ends_with("2 rows in set (0.00 sec)\n"));
}

#[test]
fn header_only_result_reports_empty_set_without_running_stages() {
    let temp = tempfile::tempdir().unwrap();
    let cache = temp.path().join("cache");
    let raw = write_result(temp.path(), "result.csv", "a,b,c\n");
    let request = QueryRequest {
        aggregate: AggregateDescriptor::parse(r#"{"count": [2]}"#, "1").unwrap(),
        order: OrderDescriptor::parse("1,a,n").unwrap(),
        limit: LimitDescriptor::first(1),
        ..QueryRequest::default()
    };
    let mut out = Vec::new();
    let context = orchestrator(&cache)
        .respond(&request, &RawResult::new(&raw), &mut out)
        .unwrap();

    assert_eq!(context.status, ResponseStatus::Empty);
    assert!(context.stages.is_empty());
    assert_eq!(String::from_utf8(out).unwrap(), "Empty set (0.00 sec)\n");
    assert!(!cache.exists());
}

#[test]
fn empty_file_is_an_empty_set() {
    let temp = tempfile::tempdir().unwrap();
    let raw = write_result(temp.path(), "result.csv", "");
    let mut out = Vec::new();
    let context = orchestrator(&temp.path().join("cache"))
        .respond(
            &QueryRequest::default(),
            &RawResult::new(&raw).with_elapsed(Duration::from_millis(250)),
            &mut out,
        )
        .unwrap();
    assert_eq!(context.status, ResponseStatus::Empty);
    assert_eq!(context.row_count, 0);
    assert_eq!(String::from_utf8(out).unwrap(), "Empty set (0.25 sec)\n");
}

#[test]
fn stages_run_in_aggregate_sort_limit_order() {
    let temp = tempfile::tempdir().unwrap();
    let raw = write_result(
        temp.path(),
        "result.csv",
        "zone,bytes\nus,10\neu,40\nap,5\nus,20\nap,1\n",
    );
    // Sorting before aggregating, or limiting before sorting, would change the answer.
    let request = QueryRequest {
        aggregate: AggregateDescriptor::parse(r#"{"sum": [2]}"#, "1").unwrap(),
        order: OrderDescriptor::parse("2,d,n").unwrap(),
        limit: LimitDescriptor::window(1, 1),
        ..QueryRequest::default()
    };
    let mut out = Vec::new();
    let context = orchestrator(&temp.path().join("cache"))
        .respond(&request, &RawResult::new(&raw), &mut out)
        .unwrap();
    assert_eq!(
        fs::read_to_string(&context.final_path).unwrap(),
        "zone,bytes\nus,30\n"
    );
    let stages: Vec<&str> = context.stages.iter().map(|s| s.stage.name()).collect();
    assert_eq!(stages, vec!["agg", "sort", "limit"]);
}

#[test]
fn limit_window_row_count_matches_formula() {
    let temp = tempfile::tempdir().unwrap();
    let body: String = (1..=7).map(|idx| format!("{idx}\n")).collect();
    let raw = write_result(temp.path(), "result.csv", &format!("n\n{body}"));
    let orchestrator = orchestrator(&temp.path().join("cache"));
    for (offset, count) in [(0, 3), (2, 3), (5, 10), (7, 1), (12, 2), (0, 0)] {
        let request = QueryRequest {
            limit: LimitDescriptor::window(offset, count),
            ..QueryRequest::default()
        };
        let (path, _) = orchestrator.transform(&request, &raw).unwrap();
        let set = RecordSet::read(&path, b',').unwrap();
        let expected = 1 + count.min(7usize.saturating_sub(offset));
        assert_eq!(set.line_count(), expected, "offset {offset} count {count}");
    }
}

#[test]
fn verbose_summary_names_final_file() {
    let temp = tempfile::tempdir().unwrap();
    let raw = write_result(temp.path(), "result.csv", "n\n3\n1\n2\n");
    let request = QueryRequest {
        display: DisplayOptions {
            verbose: true,
            ..DisplayOptions::default()
        },
        order: OrderDescriptor::parse("1,a,n").unwrap(),
        ..QueryRequest::default()
    };
    let mut orchestrator = orchestrator(&temp.path().join("cache"));

    let mut first = Vec::new();
    let context = orchestrator
        .respond(&request, &RawResult::new(&raw), &mut first)
        .unwrap();
    let first = String::from_utf8(first).unwrap();
    let expected = format!(
        "3 rows in set (0.00 sec) @source {}\n",
        context.final_path.display()
    );
    assert!(first.ends_with(&expected), "{first}");

    let mut second = Vec::new();
    orchestrator
        .respond(&request, &RawResult::new(&raw), &mut second)
        .unwrap();
    assert!(String::from_utf8(second).unwrap().ends_with("@cached\n"));
}
