use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const HEADER: &str = "timestamp,heap_alloc_mb,heap_inuse_mb,heap_objects,goroutines,gc_cycles";

fn memplot(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("memplot").unwrap();
    cmd.current_dir(dir.path())
        .env("MEMPLOT_CONFIG", dir.path().join("no-config.toml"))
        .env_remove("RUST_LOG");
    cmd
}

fn write_sample(path: &Path) {
    fs::write(
        path,
        format!(
            "{HEADER}\n\
             2024-05-01 00:00:00,10.0,8.0,1000,10,5\n\
             2024-05-01 00:01:00,30.0,25.0,1234567,14,5\n\
             2024-05-01 00:02:00,20.0,18.0,2500,12,8\n"
        ),
    )
    .unwrap();
}

fn small_figure_config(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("memplot.toml");
    fs::write(&path, "[chart]\nwidth_in = 6.0\nheight_in = 4.0\ndpi = 100\n").unwrap();
    path
}

fn have_font() -> bool {
    let found = memplot_core::locate_font(None).is_some();
    if !found {
        eprintln!("skipping: no TrueType/OpenType font on this host");
    }
    found
}

#[test]
fn no_input_prints_usage_and_exits_1() {
    let dir = tempdir().unwrap();
    memplot(&dir)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage"));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn missing_column_reports_error_and_exits_0() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("mem.csv");
    fs::write(
        &csv,
        "timestamp,heap_alloc_mb,heap_inuse_mb,goroutines,gc_cycles\n2024-05-01 00:00:00,1,1,1,1\n",
    )
    .unwrap();
    memplot(&dir)
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("❌ Error plotting data:"))
        .stdout(predicate::str::contains("heap_objects"))
        .stdout(predicate::str::contains("Plot saved").not());
    assert!(!dir.path().join("mem_plot.png").exists());
}

#[test]
fn header_only_table_is_an_error() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("mem.csv");
    fs::write(&csv, format!("{HEADER}\n")).unwrap();
    memplot(&dir)
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("❌ Error plotting data: table has no data rows"));
    assert!(!dir.path().join("mem_plot.png").exists());
}

#[test]
fn plots_and_prints_summary() {
    if !have_font() {
        return;
    }
    let dir = tempdir().unwrap();
    let csv = dir.path().join("mem.csv");
    write_sample(&csv);
    let config = small_figure_config(&dir);
    let expected = dir.path().join("mem_plot.png");

    for _ in 0..2 {
        memplot(&dir)
            .env("MEMPLOT_CONFIG", &config)
            .arg(&csv)
            .assert()
            .success()
            .stdout(predicate::str::contains(format!(
                "📊 Plot saved to: {}",
                expected.display()
            )))
            .stdout(predicate::str::contains("📈 Memory Statistics Summary:"))
            .stdout(predicate::str::contains("Peak Heap Alloc: 30.00 MB"))
            .stdout(predicate::str::contains("Min Heap Alloc: 10.00 MB"))
            .stdout(predicate::str::contains("Avg Heap Alloc: 20.00 MB"))
            .stdout(predicate::str::contains("Peak Objects: 1,234,567"))
            .stdout(predicate::str::contains("Peak Goroutines: 14"))
            .stdout(predicate::str::contains("Total GC Cycles: 3"));
        assert!(expected.is_file());
    }
}

#[test]
fn output_prefix_override() {
    if !have_font() {
        return;
    }
    let dir = tempdir().unwrap();
    let csv = dir.path().join("mem.csv");
    write_sample(&csv);
    let config = small_figure_config(&dir);
    let prefix = dir.path().join("run42");

    memplot(&dir)
        .env("MEMPLOT_CONFIG", &config)
        .arg(&csv)
        .arg("-o")
        .arg(&prefix)
        .assert()
        .success()
        .stdout(predicate::str::contains("run42_plot.png"));
    assert!(dir.path().join("run42_plot.png").is_file());
    assert!(!dir.path().join("mem_plot.png").exists());
}
