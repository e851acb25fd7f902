//! Raster line charts of training metrics (axes, grid and polylines only).

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{debug, info};

const PANEL_WIDTH: u32 = 480;
const PANEL_HEIGHT: u32 = 320;
const MARGIN: u32 = 32;
const GRID_LINES: u32 = 5;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);

pub const TRAIN_COLOR: Rgb<u8> = Rgb([0x1f, 0x77, 0xb4]);
pub const VALID_COLOR: Rgb<u8> = Rgb([0xff, 0x7f, 0x0e]);

/// Line colors for comparison charts, cycled
const PALETTE: [Rgb<u8>; 10] = [
    Rgb([0x1f, 0x77, 0xb4]),
    Rgb([0xff, 0x7f, 0x0e]),
    Rgb([0x2c, 0xa0, 0x2c]),
    Rgb([0xd6, 0x27, 0x28]),
    Rgb([0x94, 0x67, 0xbd]),
    Rgb([0x8c, 0x56, 0x4b]),
    Rgb([0xe3, 0x77, 0xc2]),
    Rgb([0x7f, 0x7f, 0x7f]),
    Rgb([0xbc, 0xbd, 0x22]),
    Rgb([0x17, 0xbe, 0xcf]),
];

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("got {series} series for {labels} labels")]
    SeriesMismatch { series: usize, labels: usize },
    #[error("need at least train and valid loss series, got {0}")]
    NotEnoughSeries(usize),
    #[error("the number of names ({names}) must match the number of CSV paths ({paths})")]
    NameMismatch { paths: usize, names: usize },
    #[error("column '{column}' not found in {}", path.display())]
    MissingColumn { column: String, path: PathBuf },
    #[error("non-numeric value '{value}' in column '{column}' of {}", path.display())]
    NotNumeric {
        value: String,
        column: String,
        path: PathBuf,
    },
    #[error("failed to read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Grid layout for `n` panels: `floor(sqrt(n))` rows, enough columns to fit
pub fn grid_shape(n: usize) -> (usize, usize) {
    let nrows = ((n as f64).sqrt() as usize).max(1);
    let ncols = n.div_ceil(nrows).max(1);
    (nrows, ncols)
}

/// Plot recorded metric series, one panel per metric.
///
/// `series[0]` and `series[1]` are the train and valid losses and share the
/// first panel (blue and orange); every further series gets its own panel.
pub fn plot_metrics(series: &[Vec<f64>], labels: &[String], out: &Path) -> Result<(), PlotError> {
    if series.len() != labels.len() {
        return Err(PlotError::SeriesMismatch {
            series: series.len(),
            labels: labels.len(),
        });
    }
    if series.len() < 2 {
        return Err(PlotError::NotEnoughSeries(series.len()));
    }

    let n = series.len() - 1;
    let (nrows, ncols) = grid_shape(n);
    let mut canvas = RgbImage::from_pixel(
        ncols as u32 * PANEL_WIDTH,
        nrows as u32 * PANEL_HEIGHT,
        BACKGROUND,
    );

    for panel in 0..n {
        let origin = (
            (panel % ncols) as u32 * PANEL_WIDTH,
            (panel / ncols) as u32 * PANEL_HEIGHT,
        );
        if panel == 0 {
            debug!("Panel 0: {} / {}", labels[0], labels[1]);
            draw_panel(
                &mut canvas,
                origin,
                &[
                    (series[0].as_slice(), TRAIN_COLOR),
                    (series[1].as_slice(), VALID_COLOR),
                ],
            );
        } else {
            debug!("Panel {}: {}", panel, labels[panel + 1]);
            draw_panel(&mut canvas, origin, &[(series[panel + 1].as_slice(), VALID_COLOR)]);
        }
    }

    save(&canvas, out)
}

/// Overlay one column of several metrics CSV files, limited to the first
/// `n_rows` rows when given
pub fn plot_comparison(
    csv_paths: &[PathBuf],
    names: &[String],
    column: &str,
    out: &Path,
    n_rows: Option<usize>,
) -> Result<(), PlotError> {
    if csv_paths.len() != names.len() {
        return Err(PlotError::NameMismatch {
            paths: csv_paths.len(),
            names: names.len(),
        });
    }

    let mut lines = Vec::with_capacity(csv_paths.len());
    for (path, name) in csv_paths.iter().zip(names) {
        let mut values = read_column(path, column)?;
        if let Some(limit) = n_rows {
            values.truncate(limit);
        }
        debug!("{}: {} values of '{}'", name, values.len(), column);
        lines.push(values);
    }

    let mut canvas = RgbImage::from_pixel(2 * PANEL_WIDTH, 2 * PANEL_HEIGHT, BACKGROUND);
    let styled: Vec<(&[f64], Rgb<u8>)> = lines
        .iter()
        .enumerate()
        .map(|(i, values)| (values.as_slice(), PALETTE[i % PALETTE.len()]))
        .collect();
    draw_panel_sized(&mut canvas, (0, 0), (2 * PANEL_WIDTH, 2 * PANEL_HEIGHT), &styled);

    save(&canvas, out)
}

fn read_column(path: &Path, column: &str) -> Result<Vec<f64>, PlotError> {
    let csv_error = |source| PlotError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let index = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| PlotError::MissingColumn {
            column: column.to_string(),
            path: path.to_path_buf(),
        })?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let field = record.get(index).unwrap_or_default().trim();
        let value = field.parse::<f64>().map_err(|_| PlotError::NotNumeric {
            value: field.to_string(),
            column: column.to_string(),
            path: path.to_path_buf(),
        })?;
        values.push(value);
    }
    Ok(values)
}

fn save(canvas: &RgbImage, out: &Path) -> Result<(), PlotError> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    canvas.save(out)?;
    info!("Plot saved to {}", out.display());
    Ok(())
}

fn draw_panel(canvas: &mut RgbImage, origin: (u32, u32), lines: &[(&[f64], Rgb<u8>)]) {
    draw_panel_sized(canvas, origin, (PANEL_WIDTH, PANEL_HEIGHT), lines);
}

/// Draw axes, grid and polylines inside the `size` box at `origin`.
/// Both axes are scaled to fit every finite value of `lines`.
fn draw_panel_sized(
    canvas: &mut RgbImage,
    origin: (u32, u32),
    size: (u32, u32),
    lines: &[(&[f64], Rgb<u8>)],
) {
    let left = (origin.0 + MARGIN) as f32;
    let top = (origin.1 + MARGIN / 2) as f32;
    let right = (origin.0 + size.0 - MARGIN / 2) as f32;
    let bottom = (origin.1 + size.1 - MARGIN) as f32;

    for i in 0..=GRID_LINES {
        let t = i as f32 / GRID_LINES as f32;
        let y = bottom - t * (bottom - top);
        let x = left + t * (right - left);
        draw_line_segment_mut(canvas, (left, y), (right, y), GRID);
        draw_line_segment_mut(canvas, (x, top), (x, bottom), GRID);
    }
    draw_line_segment_mut(canvas, (left, bottom), (right, bottom), AXIS);
    draw_line_segment_mut(canvas, (left, top), (left, bottom), AXIS);

    let finite = lines
        .iter()
        .flat_map(|(values, _)| values.iter().copied())
        .filter(|v| v.is_finite());
    let (mut lo, mut hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi {
        return;
    }
    if (hi - lo).abs() < f64::EPSILON {
        lo -= 0.5;
        hi += 0.5;
    }
    let longest = lines.iter().map(|(v, _)| v.len()).max().unwrap_or(0);
    let x_span = (longest.saturating_sub(1)).max(1) as f32;

    let to_point = |i: usize, v: f64| -> (f32, f32) {
        let x = left + (i as f32 / x_span) * (right - left);
        let y = bottom - ((v - lo) / (hi - lo)) as f32 * (bottom - top);
        (x, y)
    };

    for (values, color) in lines {
        if values.len() == 1 && values[0].is_finite() {
            let (x, y) = to_point(0, values[0]);
            draw_filled_rect_mut(
                canvas,
                Rect::at(x as i32 - 2, y as i32 - 2).of_size(5, 5),
                *color,
            );
            continue;
        }
        for (i, pair) in values.windows(2).enumerate() {
            if !(pair[0].is_finite() && pair[1].is_finite()) {
                continue;
            }
            let start = to_point(i, pair[0]);
            let end = to_point(i + 1, pair[1]);
            // two pixels thick
            draw_line_segment_mut(canvas, start, end, *color);
            draw_line_segment_mut(canvas, (start.0, start.1 + 1.0), (end.0, end.1 + 1.0), *color);
        }
    }
}
