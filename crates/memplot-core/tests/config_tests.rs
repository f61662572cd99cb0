use memplot_core::config::expand_tilde;
use memplot_core::Config;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn missing_file_means_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let cfg = Config::load(Some(path.as_path())).expect("load default config");
    assert_eq!(cfg.chart.dpi, 300);
    assert_eq!(cfg.chart.suffix, "_plot.png");
    assert_eq!(cfg.chart.title, "golubsmtpd Memory Performance Over Time");
    assert_eq!(cfg.loader.delimiter, ',');
    assert_eq!(cfg.logging.level, "warn");
    assert!(cfg.chart.font.is_none());
}

#[test]
fn partial_file_keeps_other_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[chart]
dpi = 100
font = "~/fonts/Mono.ttf"

[loader]
delimiter = ";"
"#,
    )
    .unwrap();
    let cfg = Config::load(Some(path.as_path())).expect("load config");
    assert_eq!(cfg.chart.dpi, 100);
    assert_eq!(cfg.chart.width_in, 15.0);
    assert_eq!(cfg.loader.delimiter, ';');
    let font = cfg.chart.font.expect("font set");
    assert!(!font.to_string_lossy().contains('~'), "font path should be expanded");
    assert!(font.ends_with("fonts/Mono.ttf"));
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[chart]\ndpi = \"high\"\n").unwrap();
    assert!(Config::load(Some(path.as_path())).is_err());
}

#[test]
fn tilde_only_touches_home_prefix() {
    assert_eq!(expand_tilde(Path::new("/tmp/a")), Path::new("/tmp/a"));
    assert!(!expand_tilde(Path::new("~")).to_string_lossy().contains('~'));
}
