//! PNG charts rendered from a batch and its analysis.
//!
//! Charts are presentational only. A failed chart is reported in its
//! [`ChartOutcome`] and never affects the data outputs.

use std::error::Error;
use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tracing::{debug, warn};

use crate::error::ExportError;
use crate::models::config::OutputConfig;
use crate::models::record::BatchResult;
use crate::models::report::{AggregateReport, TrendSeries};

type DrawResult = Result<(), Box<dyn Error>>;

const CAPTION_FONT: (&str, u32) = ("sans-serif", 30);
const LABEL_FONT: (&str, u32) = ("sans-serif", 15);

/// Result of rendering one chart.
#[derive(Debug)]
pub struct ChartOutcome {
    pub path: PathBuf,
    pub result: Result<(), ExportError>,
}

impl ChartOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Renders charts into a directory.
pub struct ChartRenderer {
    dir: PathBuf,
    size: (u32, u32),
}

impl ChartRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let defaults = OutputConfig::default();
        Self {
            dir: dir.into(),
            size: (defaults.chart_width, defaults.chart_height),
        }
    }

    /// Set the image size in pixels.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width.max(100), height.max(100));
        self
    }

    /// Render every chart the data supports.
    pub fn render(&self, batch: &BatchResult, report: &AggregateReport) -> Vec<ChartOutcome> {
        if let Err(source) = std::fs::create_dir_all(&self.dir) {
            return vec![ChartOutcome {
                path: self.dir.clone(),
                result: Err(ExportError::Io {
                    path: self.dir.clone(),
                    source,
                }),
            }];
        }

        let mut outcomes = Vec::new();

        for stats in report.fields.iter().filter(|s| s.count > 0) {
            let values: Vec<(String, f64)> = batch
                .records
                .iter()
                .filter_map(|r| r.numeric(&stats.field).map(|v| (r.source.clone(), v)))
                .collect();
            let path = self.path_for(&stats.field, "distribution");
            let result = self.draw_distribution(&path, &stats.field, &values);
            outcomes.push(self.finish(path, result));
        }

        if !report.anomalies.is_empty() {
            let path = self.dir.join("anomalies.png");
            let result = self.draw_anomalies(&path, batch, report);
            outcomes.push(self.finish(path, result));
        }

        for series in &report.trends {
            let path = self.path_for(&series.field, "trend");
            let result = self.draw_trend(&path, series);
            outcomes.push(self.finish(path, result));
        }

        if let Some(grouping) = &report.grouping {
            let field = report.fields.iter().find(|s| s.count > 0);
            if let Some(field) = field {
                let sums: Vec<(String, f64)> = grouping
                    .groups
                    .iter()
                    .map(|(key, sub)| {
                        let sum = sub.stats(&field.field).map(|s| s.sum).unwrap_or_default();
                        (key.clone(), sum)
                    })
                    .collect();
                let path = self.path_for(&grouping.field, "breakdown");
                let result = self.draw_breakdown(&path, &grouping.field, &field.field, &sums);
                outcomes.push(self.finish(path, result));
            }
        }

        outcomes
    }

    fn path_for(&self, field: &str, kind: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.png", sanitize_file_stem(field), kind))
    }

    fn finish(&self, path: PathBuf, result: DrawResult) -> ChartOutcome {
        let result = result.map_err(|e| ExportError::Chart(format!("{}: {}", path.display(), e)));
        match &result {
            Ok(()) => debug!("Rendered {}", path.display()),
            Err(e) => warn!("{}", e),
        }
        ChartOutcome { path, result }
    }

    fn draw_distribution(&self, path: &Path, field: &str, values: &[(String, f64)]) -> DrawResult {
        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE)?;

        let y_range = value_range(values.iter().map(|(_, v)| *v));
        let mut chart = ChartBuilder::on(&root)
            .caption(format!("{} per document", field), CAPTION_FONT.into_font())
            .margin(10)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(0..values.len(), y_range)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .y_desc(field)
            .x_desc("Document")
            .axis_desc_style(LABEL_FONT)
            .x_labels(values.len().min(20))
            .x_label_formatter(&|idx| {
                values
                    .get(*idx)
                    .map(|(source, _)| short_label(source))
                    .unwrap_or_default()
            })
            .draw()?;

        chart.draw_series(values.iter().enumerate().map(|(i, (_, v))| {
            Rectangle::new([(i, 0.0), (i + 1, *v)], BLUE.mix(0.7).filled())
        }))?;

        root.present()?;
        Ok(())
    }

    fn draw_anomalies(
        &self,
        path: &Path,
        batch: &BatchResult,
        report: &AggregateReport,
    ) -> DrawResult {
        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut fields: Vec<&str> = report.anomalies.iter().map(|a| a.field.as_str()).collect();
        fields.sort_unstable();
        fields.dedup();

        // Plot deviations in σ so fields of different magnitude share one axis.
        let mut series: Vec<(&str, Vec<(f64, f64, bool)>)> = Vec::new();
        let mut extent = report.threshold.abs().max(1.0);
        for field in &fields {
            let Some(stats) = report.stats(field) else {
                continue;
            };
            let (Some(mean), Some(stddev)) = (stats.mean, stats.stddev) else {
                continue;
            };
            if stddev <= 0.0 {
                continue;
            }

            let points: Vec<(f64, f64, bool)> = batch
                .records
                .iter()
                .enumerate()
                .filter_map(|(i, r)| r.numeric(field).map(|v| (i, v)))
                .map(|(i, v)| {
                    let z = (v - mean) / stddev;
                    let flagged = report
                        .anomalies
                        .iter()
                        .any(|a| a.record_index == i && a.field == *field);
                    extent = extent.max(z.abs());
                    (i as f64, z, flagged)
                })
                .collect();
            series.push((*field, points));
        }

        let x_max = batch.records.len().max(1) as f64;
        let extent = extent * 1.15;

        let mut chart = ChartBuilder::on(&root)
            .caption("Anomalies (deviation from mean)", CAPTION_FONT.into_font())
            .margin(10)
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5..x_max - 0.5, -extent..extent)?;

        chart
            .configure_mesh()
            .y_desc("σ")
            .x_desc("Record index")
            .axis_desc_style(LABEL_FONT)
            .draw()?;

        let bands = [
            (0.0, BLACK.mix(0.6)),
            (report.threshold, RED.mix(0.5)),
            (-report.threshold, RED.mix(0.5)),
        ];
        for (y, color) in bands {
            chart.draw_series(LineSeries::new(
                [(-0.5, y), (x_max - 0.5, y)],
                color.stroke_width(1),
            ))?;
        }

        for (i, (field, points)) in series.iter().enumerate() {
            let color = Palette99::pick(i).to_rgba();
            chart
                .draw_series(points.iter().filter(|p| !p.2).map(|(x, z, _)| {
                    Circle::new((*x, *z), 4, color.filled())
                }))?
                .label(*field)
                .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));

            chart.draw_series(
                points
                    .iter()
                    .filter(|p| p.2)
                    .map(|(x, z, _)| Circle::new((*x, *z), 7, RED.filled())),
            )?;
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }

    fn draw_trend(&self, path: &Path, series: &TrendSeries) -> DrawResult {
        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE)?;

        let labels: Vec<&str> = series.points.iter().map(|p| p.period.as_str()).collect();
        let y_range = value_range(series.points.iter().map(|p| p.sum));
        let last = series.points.len().saturating_sub(1).max(1);

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("Monthly {} by {}", series.field, series.date_field),
                CAPTION_FONT.into_font(),
            )
            .margin(10)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(0..last, y_range)?;

        chart
            .configure_mesh()
            .y_desc(series.field.as_str())
            .x_desc("Month")
            .axis_desc_style(LABEL_FONT)
            .x_labels(labels.len().min(24))
            .x_label_formatter(&|idx| labels.get(*idx).map(|l| l.to_string()).unwrap_or_default())
            .draw()?;

        let points: Vec<(usize, f64)> = series
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.sum))
            .collect();

        chart.draw_series(LineSeries::new(points.iter().copied(), BLUE.stroke_width(2)))?;
        chart.draw_series(
            points
                .iter()
                .map(|(x, y)| Circle::new((*x, *y), 4, BLUE.filled())),
        )?;

        root.present()?;
        Ok(())
    }

    fn draw_breakdown(
        &self,
        path: &Path,
        group_field: &str,
        value_field: &str,
        sums: &[(String, f64)],
    ) -> DrawResult {
        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE)?;

        let y_range = value_range(sums.iter().map(|(_, v)| *v));
        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("{} by {}", value_field, group_field),
                CAPTION_FONT.into_font(),
            )
            .margin(10)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(0..sums.len(), y_range)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .y_desc(value_field)
            .x_desc(group_field)
            .axis_desc_style(LABEL_FONT)
            .x_labels(sums.len().min(20))
            .x_label_formatter(&|idx| {
                sums.get(*idx)
                    .map(|(key, _)| short_label(key))
                    .unwrap_or_default()
            })
            .draw()?;

        chart.draw_series(sums.iter().enumerate().map(|(i, (_, v))| {
            let color = Palette99::pick(i).to_rgba();
            Rectangle::new([(i, 0.0), (i + 1, *v)], color.filled())
        }))?;

        root.present()?;
        Ok(())
    }
}

/// Y axis range covering zero and every value, with headroom.
fn value_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = if hi - lo > 0.0 { hi - lo } else { 1.0 };
    let lo = if lo < 0.0 { lo - span * 0.1 } else { lo };
    lo..hi + span * 0.1
}

/// Make a field name safe for use in a file name.
fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn short_label(s: &str) -> String {
    let s = s.strip_suffix(".pdf").unwrap_or(s);
    if s.chars().count() > 14 {
        let head: String = s.chars().take(13).collect();
        format!("{}…", head)
    } else {
        s.to_string()
    }
}
