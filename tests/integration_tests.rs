use brc_processor::cli::{run, Cli};
use brc_processor::readers::MalformedPolicy;
use brc_processor::writers::{ReportFormat, ReportWriter};
use brc_processor::{Pipeline, PipelineConfig, ProcessingError, StationStats};
use clap::error::ErrorKind;
use clap::Parser;
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::{NamedTempFile, TempDir};

// Held by every test that reads or writes `BRC_*` variables
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn parse_cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("brc-processor").chain(args.iter().copied()))
        .expect("Failed to parse command line")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("Temp paths are UTF-8")
}

fn measurements_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn generated_measurements(lines: usize) -> String {
    let stations = [
        "Hamburg", "Bulawayo", "Palembang", "St. John's", "Cracow", "Bridgetown", "Istanbul",
        "Roseau", "Conakry", "Zürich",
    ];
    let mut out = String::new();
    for i in 0..lines {
        let value = ((i * 104_729) % 1999) as i32 - 999;
        let sign = if value < 0 { "-" } else { "" };
        out.push_str(&format!(
            "{};{}{}.{}\n",
            stations[(i * 31) % stations.len()],
            sign,
            value.abs() / 10,
            value.abs() % 10
        ));
    }
    out
}

#[test]
fn test_process_file_end_to_end() {
    let file = measurements_file("A;12.3\nB;-5.0\nA;10.1\nA;-2.0\n");
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();

    let aggregate = pipeline.run_file(file.path(), None).unwrap();
    let report = ReportWriter::new(ReportFormat::Text)
        .render(&aggregate)
        .unwrap();

    assert_eq!(report, "{A=-2.0/6.8/12.3, B=-5.0/-5.0/-5.0}");
}

#[test]
fn test_mmap_and_buffered_agree() {
    let file = measurements_file(&generated_measurements(20_000));
    let config = PipelineConfig::default()
        .with_chunk_size(4096)
        .with_batch_size(64)
        .with_workers(3, 4, 2);
    let pipeline = Pipeline::new(config).unwrap();

    let buffered = pipeline.run_file(file.path(), None).unwrap();
    let mapped = pipeline.run_mmap(file.path(), None).unwrap();

    assert_eq!(buffered, mapped);
    assert_eq!(buffered.total_records(), 20_000);
    assert_eq!(buffered.len(), 10);
}

#[test]
fn test_empty_file() {
    let file = measurements_file("");
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();

    assert!(pipeline.run_file(file.path(), None).unwrap().is_empty());
    assert!(pipeline.run_mmap(file.path(), None).unwrap().is_empty());
}

#[test]
fn test_single_record_file() {
    let file = measurements_file("Z;0.0\n");
    let aggregate = Pipeline::default().run_file(file.path(), None).unwrap();

    assert_eq!(aggregate.len(), 1);
    assert_eq!(aggregate.get(b"Z"), Some(&StationStats::new(0)));
}

#[test]
fn test_missing_input_is_io_error() {
    let result = Pipeline::default().run_file(&PathBuf::from("does/not/exist.txt"), None);
    assert!(matches!(result, Err(ProcessingError::Io(_))));
}

#[test]
fn test_config_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.toml");
    fs::write(
        &path,
        "batch_size = 250\nsplitter_workers = 4\nmalformed_policy = \"skip\"\n",
    )
    .unwrap();

    let config = {
        let _env = env_lock();
        PipelineConfig::load(Some(&path)).unwrap()
    };

    assert_eq!(config.batch_size, 250);
    assert_eq!(config.splitter_workers, 4);
    assert_eq!(config.malformed_policy, MalformedPolicy::Skip);
    // Untouched keys keep their defaults
    assert_eq!(config.chunk_size, PipelineConfig::default().chunk_size);
}

#[test]
fn test_config_file_rejects_zero_workers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.toml");
    fs::write(&path, "aggregator_workers = 0\n").unwrap();

    let _env = env_lock();
    let result = PipelineConfig::load(Some(&path));
    assert!(matches!(result, Err(ProcessingError::Validation(_))));
}

#[test]
fn test_missing_config_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let _env = env_lock();
    let result = PipelineConfig::load(Some(&dir.path().join("absent.toml")));

    assert!(matches!(result, Err(ProcessingError::Config(_))));
}

#[test]
fn test_environment_overrides_config() {
    let _env = env_lock();
    std::env::set_var("BRC_PARTIAL_QUEUE_CAPACITY", "7");
    let config = PipelineConfig::load(None).unwrap();
    std::env::remove_var("BRC_PARTIAL_QUEUE_CAPACITY");

    assert_eq!(config.partial_queue_capacity, 7);
}

#[test]
fn test_skip_policy_counts_malformed_lines_in_file() {
    let file = measurements_file("A;1.0\nA;1.00\nB;x\nB;-3.5\n;\n");
    let config = PipelineConfig::default().with_malformed_policy(MalformedPolicy::Skip);

    let aggregate = Pipeline::new(config).unwrap().run_file(file.path(), None).unwrap();

    assert_eq!(aggregate.skipped_lines, 3);
    assert_eq!(aggregate.total_records() + aggregate.skipped_lines, 5);
}

#[test]
fn test_json_report_file() {
    let file = measurements_file("Oslo;-1.5\nOslo;2.5\n");
    let aggregate = Pipeline::default().run_file(file.path(), None).unwrap();

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("report.json");
    ReportWriter::new(ReportFormat::Json)
        .write_file(&aggregate, &output)
        .unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(parsed["Oslo"]["min"], -1.5);
    assert_eq!(parsed["Oslo"]["mean"], 0.5);
    assert_eq!(parsed["Oslo"]["max"], 2.5);
    assert_eq!(parsed["Oslo"]["count"], 2);
}

#[test]
fn test_process_command_writes_text_report() {
    let file = measurements_file("A;12.3\nB;-5.0\nA;10.1\nA;-2.0\n");
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("reports").join("out.txt");

    let cli = parse_cli(&[
        "process",
        "-i",
        path_arg(file.path()),
        "-o",
        path_arg(&output),
        "-q",
    ]);
    let _env = env_lock();
    run(cli).unwrap();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "{A=-2.0/6.8/12.3, B=-5.0/-5.0/-5.0}\n"
    );
}

#[test]
fn test_process_command_writes_json_report() {
    let file = measurements_file("Oslo;-1.5\nOslo;2.5\nLima;19.0\n");
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.json");

    let cli = parse_cli(&[
        "process",
        "-i",
        path_arg(file.path()),
        "-o",
        path_arg(&output),
        "--format",
        "json",
        "--mmap",
        "-q",
    ]);
    let _env = env_lock();
    run(cli).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(parsed["Oslo"]["mean"], 0.5);
    assert_eq!(parsed["Oslo"]["count"], 2);
    assert_eq!(parsed["Lima"]["max"], 19.0);
}

#[test]
fn test_run_can_be_called_repeatedly() {
    let file = measurements_file("A;1.0\n");
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.txt");
    let args = [
        "process",
        "-i",
        path_arg(file.path()),
        "-o",
        path_arg(&output),
        "-q",
    ];

    let _env = env_lock();
    run(parse_cli(&args)).unwrap();
    run(parse_cli(&args)).unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "{A=1.0/1.0/1.0}\n");
}

#[test]
fn test_validate_command_fails_on_malformed_lines() {
    let file = measurements_file("A;1.0\nbroken\nB;2.0\nB;2.00\n");

    let cli = parse_cli(&["validate", "-i", path_arg(file.path()), "-q"]);
    let _env = env_lock();
    let result = run(cli);

    assert!(matches!(
        result,
        Err(ProcessingError::MalformedInput { count: 2 })
    ));
}

#[test]
fn test_validate_command_accepts_clean_file() {
    let file = measurements_file("A;1.0\nB;-2.5\r\n\nC;33.3");

    let cli = parse_cli(&["validate", "-i", path_arg(file.path()), "-q"]);
    let _env = env_lock();
    run(cli).unwrap();
}

#[test]
fn test_on_malformed_flag_overrides_config_file() {
    let file = measurements_file("A;1.0\nbroken\nA;3.0\n");
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("pipeline.toml");
    fs::write(&config, "malformed_policy = \"abort\"\n").unwrap();
    let output = dir.path().join("out.json");

    let base = [
        "process",
        "-i",
        path_arg(file.path()),
        "-c",
        path_arg(&config),
        "-o",
        path_arg(&output),
        "-f",
        "json",
        "-q",
    ];
    let _env = env_lock();

    // The config file alone aborts on the bad line
    let result = run(parse_cli(&base));
    assert!(matches!(
        result,
        Err(ProcessingError::MalformedRecord { .. })
    ));

    let mut with_flag = base.to_vec();
    with_flag.extend(["--on-malformed", "skip"]);
    run(parse_cli(&with_flag)).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(parsed["A"]["count"], 2);
    assert_eq!(parsed["A"]["mean"], 2.0);
}

#[test]
fn test_auto_workers_conflicts_with_worker_counts() {
    for flag in ["--splitters", "--aggregators", "--reducers"] {
        let err = Cli::try_parse_from([
            "brc-processor",
            "process",
            "-i",
            "measurements.txt",
            "--auto-workers",
            flag,
            "2",
        ])
        .err()
        .expect("conflicting flags must be rejected");
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict, "{flag}");
    }

    let cli = parse_cli(&["validate", "-i", "measurements.txt", "--auto-workers"]);
    assert!(matches!(cli.command, brc_processor::cli::Commands::Validate { .. }));
}
