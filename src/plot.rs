//! Distribution plots of a numeric column, drawn on a log10 axis.
//!
//! Binning and box statistics are computed separately from drawing so they
//! can be checked without producing images. Only positive finite values can
//! be placed on a log axis; everything else is dropped before plotting.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::debug;
use plotters::prelude::*;

use crate::{io_utils::ensure_parent_dir, stats::quantile};

const PLOT_SIZE: (u32, u32) = (1200, 700);
const WHISKER_SPAN: f64 = 1.5;
const DENSITY_POINTS: usize = 200;

pub fn positive_values(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect()
}

/// Equal-width bins over log10 of the sample.
#[derive(Debug, Clone, PartialEq)]
pub struct LogHistogram {
    /// `counts.len() + 1` bin edges, in log10 units.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    /// Gaussian kernel density of the log values, scaled to bin counts.
    /// Empty when the sample has fewer than two distinct values.
    pub density: Vec<(f64, f64)>,
}

impl LogHistogram {
    /// Returns `None` when no value is positive or `bins` is zero.
    pub fn build(values: &[f64], bins: usize) -> Option<Self> {
        let logs: Vec<f64> = positive_values(values).iter().map(|v| v.log10()).collect();
        if logs.is_empty() || bins == 0 {
            return None;
        }
        let mut low = logs.iter().copied().fold(f64::INFINITY, f64::min);
        let mut high = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if high - low < f64::EPSILON {
            low -= 0.5;
            high += 0.5;
        }
        let width = (high - low) / bins as f64;
        let edges = (0..=bins).map(|i| low + width * i as f64).collect();
        let mut counts = vec![0usize; bins];
        for log in &logs {
            let idx = (((log - low) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        let density = kernel_density(&logs, low, high, width);
        Some(Self {
            edges,
            counts,
            density,
        })
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Quartiles with whiskers at the furthest values within 1.5 IQR.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted = positive_values(values);
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        let q1 = quantile(&sorted, 0.25);
        let median = quantile(&sorted, 0.5);
        let q3 = quantile(&sorted, 0.75);
        let iqr = q3 - q1;
        let low_fence = q1 - WHISKER_SPAN * iqr;
        let high_fence = q3 + WHISKER_SPAN * iqr;
        let inside = sorted
            .iter()
            .copied()
            .filter(|v| *v >= low_fence && *v <= high_fence);
        let lower_whisker = inside.clone().fold(f64::INFINITY, f64::min);
        let upper_whisker = inside.fold(f64::NEG_INFINITY, f64::max);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|v| *v < low_fence || *v > high_fence)
            .collect();
        Some(Self {
            q1,
            median,
            q3,
            lower_whisker,
            upper_whisker,
            outliers,
        })
    }

    fn log_range(&self) -> (f64, f64) {
        let low = self
            .outliers
            .iter()
            .copied()
            .fold(self.lower_whisker, f64::min)
            .log10();
        let high = self
            .outliers
            .iter()
            .copied()
            .fold(self.upper_whisker, f64::max)
            .log10();
        padded(low, high)
    }
}

pub fn render_histogram(
    path: &Path,
    title: &str,
    x_label: &str,
    histogram: &LogHistogram,
) -> Result<()> {
    let (first, last) = match (histogram.edges.first(), histogram.edges.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(anyhow!("Histogram has no bins")),
    };
    ensure_parent_dir(path)?;
    let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let density_peak = histogram
        .density
        .iter()
        .map(|(_, y)| *y)
        .fold(0.0, f64::max);
    let y_top = (histogram.max_count() as f64).max(density_peak) * 1.1;
    let y_top = y_top.max(1.0);
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(16)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(first..last, 0f64..y_top)?;
    chart
        .configure_mesh()
        .x_desc(format!("{x_label} (log10)"))
        .y_desc("Number of Mines")
        .x_label_formatter(&|v| format_power(*v))
        .draw()?;
    chart.draw_series(
        histogram
            .counts
            .iter()
            .zip(histogram.edges.windows(2))
            .filter(|(count, _)| **count > 0)
            .map(|(count, edge)| {
                Rectangle::new([(edge[0], 0.0), (edge[1], *count as f64)], BLUE.mix(0.6).filled())
            }),
    )?;
    if !histogram.density.is_empty() {
        chart.draw_series(std::iter::once(PathElement::new(
            histogram.density.clone(),
            BLUE.stroke_width(2),
        )))?;
    }
    root.present()
        .with_context(|| format!("Writing histogram to {path:?}"))?;
    debug!("Histogram with {} value(s) written to {:?}", histogram.total(), path);
    Ok(())
}

pub fn render_box_plot(path: &Path, title: &str, x_label: &str, stats: &BoxStats) -> Result<()> {
    ensure_parent_dir(path)?;
    let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let (low, high) = stats.log_range();
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(16)
        .x_label_area_size(50)
        .y_label_area_size(20)
        .build_cartesian_2d(low..high, 0f64..1f64)?;
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(0)
        .x_desc(format!("{x_label} (log10)"))
        .x_label_formatter(&|v| format_power(*v))
        .draw()?;

    let (q1, median, q3) = (stats.q1.log10(), stats.median.log10(), stats.q3.log10());
    let (lower, upper) = (stats.lower_whisker.log10(), stats.upper_whisker.log10());
    chart.draw_series(std::iter::once(Rectangle::new(
        [(q1, 0.3), (q3, 0.7)],
        BLUE.mix(0.4).filled(),
    )))?;
    chart.draw_series(std::iter::once(Rectangle::new(
        [(q1, 0.3), (q3, 0.7)],
        BLACK.stroke_width(1),
    )))?;
    let segments = [
        vec![(median, 0.3), (median, 0.7)],
        vec![(lower, 0.5), (q1, 0.5)],
        vec![(q3, 0.5), (upper, 0.5)],
        vec![(lower, 0.4), (lower, 0.6)],
        vec![(upper, 0.4), (upper, 0.6)],
    ];
    chart.draw_series(
        segments
            .into_iter()
            .map(|points| PathElement::new(points, BLACK.stroke_width(2))),
    )?;
    chart.draw_series(
        stats
            .outliers
            .iter()
            .map(|v| Circle::new((v.log10(), 0.5), 3, BLACK.filled())),
    )?;
    root.present()
        .with_context(|| format!("Writing box plot to {path:?}"))?;
    Ok(())
}

// Scott's rule bandwidth; the curve integrates to `n * bin_width` so it sits
// on the same scale as the bars.
fn kernel_density(logs: &[f64], low: f64, high: f64, bin_width: f64) -> Vec<(f64, f64)> {
    let n = logs.len() as f64;
    if logs.len() < 2 {
        return Vec::new();
    }
    let mean = logs.iter().sum::<f64>() / n;
    let variance = logs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let bandwidth = variance.sqrt() * n.powf(-0.2);
    if bandwidth <= 0.0 || !bandwidth.is_finite() {
        return Vec::new();
    }
    let norm = bin_width / (bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let step = (high - low) / (DENSITY_POINTS - 1) as f64;
    (0..DENSITY_POINTS)
        .map(|i| {
            let x = low + step * i as f64;
            let y = logs
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>();
            (x, y * norm)
        })
        .collect()
}

fn padded(low: f64, high: f64) -> (f64, f64) {
    let span = (high - low).max(1.0);
    (low - span * 0.05, high + span * 0.05)
}

fn format_power(exponent: f64) -> String {
    let value = 10f64.powf(exponent);
    if value >= 1000.0 {
        format!("{value:.0}")
    } else if value >= 1.0 {
        format!("{value:.1}")
    } else {
        format!("{value:.3}")
    }
}
