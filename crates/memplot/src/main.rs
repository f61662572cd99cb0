use anyhow::{Context, Result};
use clap::Parser;
use memplot_core::{default_prefix, load_series, output_path, Config, Figure, Summary};
use once_cell::sync::OnceCell;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{self, Command};
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plot golubsmtpd memory metrics")]
struct Args {
    /// CSV file containing memory data
    csv_file: Option<PathBuf>,
    /// Output file prefix
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Show plot interactively
    #[arg(short, long)]
    show: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let Some(csv_file) = args.csv_file.as_deref() else {
        println!("Usage: memplot <csv_file>");
        process::exit(1);
    };

    let config = Config::load(None)?;
    init_logging(&config)?;
    debug!(input = %csv_file.display(), "starting memplot");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let saved = plot_memory_data(&mut out, csv_file, args.output.as_deref(), &config);
    out.flush()?;

    if let (Some(path), true) = (saved, args.show) {
        if let Err(err) = show_plot(&path) {
            warn!("could not display {}: {err:#}", path.display());
        }
    }
    Ok(())
}

/// Loads, renders and summarizes one table. Failures are reported on `out`
/// and yield `None`; nothing is propagated.
fn plot_memory_data<W: Write>(
    out: &mut W,
    csv_file: &Path,
    output_prefix: Option<&Path>,
    config: &Config,
) -> Option<PathBuf> {
    match render_report(out, csv_file, output_prefix, config) {
        Ok(path) => Some(path),
        Err(err) => {
            let _ = writeln!(out, "❌ Error plotting data: {err}");
            None
        }
    }
}

fn render_report<W: Write>(
    out: &mut W,
    csv_file: &Path,
    output_prefix: Option<&Path>,
    config: &Config,
) -> Result<PathBuf> {
    let series = load_series(csv_file, &config.loader)?;
    let prefix = output_prefix
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_prefix(csv_file));

    let mut figure = Figure::new(&config.chart)?;
    figure.draw(&series)?;
    let output_file = figure.save(&output_path(&prefix, &config.chart.suffix))?;
    writeln!(out, "📊 Plot saved to: {}", output_file.display())?;

    writeln!(out, "\n📈 Memory Statistics Summary:")?;
    write!(out, "{}", Summary::of(&series))?;
    info!(rows = series.len(), output = %output_file.display(), "plot written");
    Ok(output_file)
}

/// Opens the image with the desktop's default viewer.
fn show_plot(path: &Path) -> Result<()> {
    #[cfg(target_os = "windows")]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]);
        cmd
    };

    #[cfg(target_os = "macos")]
    let mut cmd = Command::new("open");

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let mut cmd = Command::new("xdg-open");

    let status = cmd
        .arg(path)
        .status()
        .context("failed to launch image viewer")?;
    if !status.success() {
        anyhow::bail!("image viewer exited with {status}");
    }
    Ok(())
}

fn init_logging(config: &Config) -> Result<()> {
    let writer: BoxMakeWriter = if let Some(path) = &config.logging.file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file at {:?}", path))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        static LOG_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
        let _ = LOG_GUARD.set(guard);
        BoxMakeWriter::new(writer)
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.clone())
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .with_writer(writer)
        .finish()
        .try_init()
        .ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn run(csv_file: &Path, prefix: Option<&Path>) -> (Option<PathBuf>, String) {
        let mut buf = Vec::new();
        let saved = plot_memory_data(&mut buf, csv_file, prefix, &Config::default());
        (saved, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn missing_file_reports_single_line() {
        let dir = tempdir().unwrap();
        let (saved, text) = run(&dir.path().join("absent.csv"), None);
        assert!(saved.is_none());
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("❌ Error plotting data: file not found"));
    }

    #[test]
    fn empty_table_reports_error_and_writes_nothing() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("mem.csv");
        fs::write(
            &csv,
            "timestamp,heap_alloc_mb,heap_inuse_mb,heap_objects,goroutines,gc_cycles\n",
        )
        .unwrap();
        let (saved, text) = run(&csv, None);
        assert!(saved.is_none());
        assert!(text.contains("no data rows"));
        assert!(!dir.path().join("mem_plot.png").exists());
    }
}
