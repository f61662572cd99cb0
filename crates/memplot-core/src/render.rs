//! Four-panel memory chart.
//!
//! A [`Figure`] owns its pixel buffer for its whole life: it is allocated by
//! [`Figure::new`], painted by [`Figure::draw`] and consumed by
//! [`Figure::save`], which trims the white border and encodes a PNG. Nothing
//! touches the filesystem before `save`, so a failed render leaves no file.

use crate::config::ChartConfig;
use crate::error::{PlotError, Result};
use crate::models::{Metric, MetricSeries};
use crate::stats::group_thousands;
use crate::timeutils::{axis_seconds, clock_label};
use directories::BaseDirs;
use itertools::{Itertools, MinMaxResult};
use once_cell::sync::OnceCell;
use plotters::backend::DrawingBackend;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{register_font, FontStyle, FontTransform};
use std::fmt::Display;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use time::UtcOffset;
use tracing::{debug, warn};

const FONT_FAMILY: &str = "sans-serif";
const MAX_PIXELS: f64 = 200_000_000.0;
const POINTS_PER_INCH: f64 = 72.0;
const X_TICKS: usize = 8;
const Y_TICKS: usize = 8;

const HIDDEN: RGBAColor = RGBAColor(255, 255, 255, 0.0);

const ORANGE: RGBColor = RGBColor(255, 165, 0);
const DARK_GREEN: RGBColor = RGBColor(0, 128, 0);
const PURPLE: RGBColor = RGBColor(128, 0, 128);

const KNOWN_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONT: OnceCell<PathBuf> = OnceCell::new();

struct Line {
    metric: Metric,
    label: &'static str,
    color: RGBColor,
}

struct Panel {
    title: &'static str,
    y_desc: &'static str,
    lines: &'static [Line],
    legend: bool,
}

const PANELS: [Panel; 4] = [
    Panel {
        title: "Heap Memory Usage",
        y_desc: "Memory (MB)",
        lines: &[
            Line {
                metric: Metric::HeapAllocMb,
                label: "Heap Alloc",
                color: RED,
            },
            Line {
                metric: Metric::HeapInuseMb,
                label: "Heap InUse",
                color: ORANGE,
            },
        ],
        legend: true,
    },
    Panel {
        title: "Heap Objects",
        y_desc: "Object Count",
        lines: &[Line {
            metric: Metric::HeapObjects,
            label: "Heap Objects",
            color: BLUE,
        }],
        legend: false,
    },
    Panel {
        title: "Active Goroutines",
        y_desc: "Goroutine Count",
        lines: &[Line {
            metric: Metric::Goroutines,
            label: "Goroutines",
            color: DARK_GREEN,
        }],
        legend: false,
    },
    Panel {
        title: "Garbage Collection Cycles",
        y_desc: "GC Cycle Count",
        lines: &[Line {
            metric: Metric::GcCycles,
            label: "GC Cycles",
            color: PURPLE,
        }],
        legend: false,
    },
];

/// Converts typographic points to pixels at the figure's DPI.
#[derive(Debug, Clone, Copy)]
struct Scale(f64);

impl Scale {
    fn font(self, points: f64) -> f64 {
        points * self.0
    }

    fn px(self, points: f64) -> u32 {
        (points * self.0).round().max(1.0) as u32
    }
}

/// Shared x-axis domain of all panels, in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TimeDomain {
    start: f64,
    end: f64,
    offset: UtcOffset,
}

impl TimeDomain {
    fn of(series: &MetricSeries) -> Self {
        let (lo, hi) = series.time_bounds();
        let (mut start, mut end) = (axis_seconds(lo), axis_seconds(hi));
        if end <= start {
            start -= 30.0;
            end += 30.0;
        }
        Self {
            start,
            end,
            offset: series.first().timestamp.offset(),
        }
    }
}

pub struct Figure {
    width: u32,
    height: u32,
    scale: Scale,
    title: String,
    buffer: Vec<u8>,
}

impl Figure {
    pub fn new(config: &ChartConfig) -> Result<Self> {
        let dpi = config.dpi as f64;
        let (w, h) = (config.width_in * dpi, config.height_in * dpi);
        if !(w >= 1.0 && h >= 1.0) || w * h > MAX_PIXELS {
            return Err(PlotError::Geometry(format!(
                "{} x {} in at {} dpi",
                config.width_in, config.height_in, config.dpi
            )));
        }
        ensure_font(config.font.as_deref())?;

        let (width, height) = (w.round() as u32, h.round() as u32);
        Ok(Self {
            width,
            height,
            scale: Scale(dpi / POINTS_PER_INCH),
            title: config.title.clone(),
            buffer: vec![0; width as usize * height as usize * 3],
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn draw(&mut self, series: &MetricSeries) -> Result<()> {
        let scale = self.scale;
        let domain = TimeDomain::of(series);
        let root = BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let title_font = (FONT_FAMILY, scale.font(16.0))
            .into_font()
            .style(FontStyle::Bold);
        let body = root.titled(&self.title, title_font).map_err(render_err)?;
        for (area, panel) in body.split_evenly((2, 2)).iter().zip(PANELS.iter()) {
            let (xs, ys) = draw_panel(area, panel, series, &domain, scale)?;
            debug!(panel = panel.title, x = ?xs, y = ?ys, "drew panel");
        }
        root.present().map_err(render_err)?;
        debug!(rows = series.len(), width = self.width, height = self.height, "drew figure");
        Ok(())
    }

    /// Trims the figure to its content plus a 0.1 in border and writes it
    /// as PNG, replacing any existing file.
    pub fn save(self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(PlotError::Write {
                    path: path.to_path_buf(),
                    reason: format!("directory {} does not exist", parent.display()),
                });
            }
        }

        let pad = self.scale.px(0.1 * POINTS_PER_INCH);
        let (x0, y0, x1, y1) = content_bounds(&self.buffer, self.width, self.height, pad);
        let (w, h) = (x1 - x0, y1 - y0);
        let stride = self.width as usize * 3;
        let mut cropped = Vec::with_capacity(w as usize * h as usize * 3);
        for y in y0..y1 {
            let start = y as usize * stride + x0 as usize * 3;
            cropped.extend_from_slice(&self.buffer[start..start + w as usize * 3]);
        }

        let mut backend = BitMapBackend::new(path, (w, h));
        backend
            .blit_bitmap((0, 0), (w, h), &cropped)
            .map_err(|e| write_err(path, e))?;
        backend.present().map_err(|e| write_err(path, e))?;
        debug!(path = %path.display(), width = w, height = h, "saved figure");
        Ok(path.to_path_buf())
    }
}

/// Draws one panel and returns the pixel extent of its plotting area.
fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    panel: &Panel,
    series: &MetricSeries,
    domain: &TimeDomain,
    scale: Scale,
) -> Result<(Range<i32>, Range<i32>)> {
    let (y_lo, y_hi) = value_range(series, panel.lines);
    let counts = panel.lines.iter().all(|line| line.metric.is_count());
    let caption_font = (FONT_FAMILY, scale.font(12.0)).into_font();
    let mut chart = ChartBuilder::on(area)
        .caption(panel.title, caption_font)
        .margin(scale.px(8.0))
        .x_label_area_size(scale.px(60.0))
        .y_label_area_size(scale.px(72.0))
        .build_cartesian_2d(domain.start..domain.end, y_lo..y_hi)
        .map_err(render_err)?;

    let tick_font = (FONT_FAMILY, scale.font(10.0)).into_font();
    let count_formatter = |y: &f64| count_label(*y);
    let mut mesh = chart.configure_mesh();
    mesh.x_labels(X_TICKS)
        .y_labels(Y_TICKS)
        // time labels are drawn below, hanging from their ticks
        .x_label_style(TextStyle::from(tick_font.clone()).color(&HIDDEN))
        .y_label_style(tick_font.clone())
        .y_desc(panel.y_desc)
        .axis_desc_style(tick_font.clone())
        .bold_line_style(BLACK.mix(0.15))
        .light_line_style(WHITE.mix(0.0))
        .axis_style(BLACK.stroke_width(scale.px(0.8)));
    if counts {
        mesh.y_labels(count_ticks(y_lo, y_hi))
            .y_label_formatter(&count_formatter);
    }
    mesh.draw().map_err(render_err)?;

    let time_style = TextStyle::from(tick_font.clone())
        .transform(FontTransform::Rotate90)
        .pos(Pos::new(HPos::Left, VPos::Center));
    let (base_x, base_y) = area.get_base_pixel();
    let gap = scale.px(6.0) as i32;
    for x in chart.as_coord_spec().x_spec().key_points(X_TICKS) {
        let (px, py) = chart.backend_coord(&(x, y_lo));
        area.draw_text(
            &clock_label(x, domain.offset),
            &time_style,
            (px - base_x, py - base_y + gap),
        )
        .map_err(render_err)?;
    }

    let legend_len = scale.px(20.0) as i32;
    for line in panel.lines {
        let style = line.color.stroke_width(scale.px(2.0));
        let points: Vec<(f64, f64)> = series
            .rows()
            .iter()
            .map(|row| (axis_seconds(row.timestamp), row.get(line.metric)))
            .collect();
        let drawn = chart
            .draw_series(LineSeries::new(points, style))
            .map_err(render_err)?;
        if panel.legend {
            drawn
                .label(line.label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + legend_len, y)], style));
        }
    }

    if panel.legend {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .label_font(tick_font)
            .margin(scale.px(6.0))
            .legend_area_size(scale.px(24.0))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK.mix(0.3))
            .draw()
            .map_err(render_err)?;
    }
    Ok(chart.plotting_area().get_pixel_range())
}

/// Tick budget that keeps a count axis on whole numbers.
fn count_ticks(lo: f64, hi: f64) -> usize {
    ((hi - lo).floor() as usize + 1).clamp(2, Y_TICKS)
}

fn count_label(value: f64) -> String {
    let rounded = value.round();
    let digits = group_thousands(rounded.abs() as u64);
    if rounded < 0.0 {
        format!("-{digits}")
    } else {
        digits
    }
}

/// Value-axis range covering every line of a panel, padded by 5%.
fn value_range(series: &MetricSeries, lines: &[Line]) -> (f64, f64) {
    let values = lines.iter().flat_map(|line| series.values(line.metric));
    let (lo, hi) = match values.minmax() {
        MinMaxResult::MinMax(lo, hi) => (lo, hi),
        MinMaxResult::OneElement(v) => (v, v),
        MinMaxResult::NoElements => (0.0, 1.0),
    };
    padded(lo, hi)
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    let pad = if hi > lo {
        (hi - lo) * 0.05
    } else {
        (hi.abs() * 0.05).max(1.0)
    };
    (lo - pad, hi + pad)
}

/// Bounding box `(x0, y0, x1, y1)`, end-exclusive, of every non-white pixel
/// grown by `pad` and clamped to the canvas. A blank canvas keeps its size.
fn content_bounds(buffer: &[u8], width: u32, height: u32, pad: u32) -> (u32, u32, u32, u32) {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (y, pixels) in buffer.chunks_exact(width as usize * 3).enumerate() {
        let Some(first) = pixels.chunks_exact(3).position(is_inked) else {
            continue;
        };
        let last = pixels.chunks_exact(3).rposition(is_inked).unwrap_or(first);
        let (x, last, y) = (first as u32, last as u32, y as u32);
        bounds = Some(match bounds {
            None => (x, y, last, y),
            Some((x0, y0, x1, _)) => (x0.min(x), y0, x1.max(last), y),
        });
    }
    match bounds {
        None => (0, 0, width, height),
        Some((x0, y0, x1, y1)) => (
            x0.saturating_sub(pad),
            y0.saturating_sub(pad),
            (x1 + 1 + pad).min(width),
            (y1 + 1 + pad).min(height),
        ),
    }
}

fn is_inked(pixel: &[u8]) -> bool {
    pixel.iter().any(|&c| c != 255)
}

/// The input path with a trailing `.csv` removed.
pub fn default_prefix(input: &Path) -> PathBuf {
    match input.to_str().and_then(|s| s.strip_suffix(".csv")) {
        Some(stem) => PathBuf::from(stem),
        None => input.to_path_buf(),
    }
}

/// `prefix` with `suffix` appended to its last component.
pub fn output_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Finds a TrueType/OpenType font: the configured one, then well-known
/// system locations, then a scan of the usual font directories.
pub fn locate_font(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!(font = %path.display(), "configured font not found, searching system fonts");
    }
    if let Some(found) = KNOWN_FONTS.iter().map(PathBuf::from).find(|p| p.is_file()) {
        return Some(found);
    }
    font_dirs()
        .iter()
        .find_map(|dir| scan_font_dir(dir, 4))
}

fn font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("/System/Library/Fonts"),
    ];
    if let Some(base) = BaseDirs::new() {
        dirs.push(base.data_dir().join("fonts"));
        dirs.push(base.home_dir().join(".fonts"));
    }
    dirs
}

fn scan_font_dir(dir: &Path, depth: usize) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .collect();
    entries.sort();
    if let Some(font) = entries
        .iter()
        .filter(|p| p.is_file() && is_font_file(p))
        .min_by_key(|p| !is_regular_face(p))
    {
        return Some(font.clone());
    }
    if depth == 0 {
        return None;
    }
    entries
        .iter()
        .filter(|p| p.is_dir())
        .find_map(|p| scan_font_dir(p, depth - 1))
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
        .unwrap_or(false)
}

fn is_regular_face(path: &Path) -> bool {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    !["bold", "italic", "oblique", "light"]
        .iter()
        .any(|style| stem.contains(style))
}

/// Bold face installed beside a regular one: `DejaVuSans-Bold.ttf` next to
/// `DejaVuSans.ttf`, `LiberationSans-Bold.ttf` next to
/// `LiberationSans-Regular.ttf`, `arialbd.ttf` next to `arial.ttf`.
fn bold_face(regular: &Path) -> Option<PathBuf> {
    let stem = regular.file_stem()?.to_str()?;
    let ext = regular.extension()?.to_str()?;
    let base = stem
        .strip_suffix("-Regular")
        .or_else(|| stem.strip_suffix("Regular"))
        .unwrap_or(stem);
    ["-Bold", "Bold", " Bold", "bd"]
        .iter()
        .map(|suffix| regular.with_file_name(format!("{base}{suffix}.{ext}")))
        .find(|p| p.is_file())
}

fn read_font(path: &Path) -> Result<&'static [u8]> {
    let bytes = fs::read(path).map_err(|source| PlotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // plotters keeps registered fonts for the life of the process
    Ok(Box::leak(bytes.into_boxed_slice()))
}

/// Registers the chart font with plotters once per process.
fn ensure_font(configured: Option<&Path>) -> Result<()> {
    FONT.get_or_try_init(|| {
        let path = locate_font(configured).ok_or(PlotError::FontUnavailable)?;
        let regular = read_font(&path)?;
        register_font(FONT_FAMILY, FontStyle::Normal, regular)
            .map_err(|_| PlotError::InvalidFont(path.clone()))?;

        let bold_path = bold_face(&path).unwrap_or_else(|| path.clone());
        let bold = if bold_path == path {
            regular
        } else {
            read_font(&bold_path)?
        };
        register_font(FONT_FAMILY, FontStyle::Bold, bold)
            .map_err(|_| PlotError::InvalidFont(bold_path.clone()))?;
        debug!(font = %path.display(), bold = %bold_path.display(), "registered chart fonts");
        Ok::<_, PlotError>(path)
    })?;
    Ok(())
}

fn render_err<E: Display>(err: E) -> PlotError {
    PlotError::Render(err.to_string())
}

fn write_err<E: Display>(path: &Path, err: E) -> PlotError {
    PlotError::Write {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
