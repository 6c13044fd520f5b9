//! Aggregate statistics, anomaly detection, grouping and trends.

pub mod stats;

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::PatternConfigError;
use crate::extraction::PatternSet;
use crate::models::config::AnalysisConfig;
use crate::models::record::{BatchResult, Record};
use crate::models::report::{
    AggregateReport, Anomaly, FieldStats, GroupBreakdown, TrendPoint, TrendSeries,
};

use stats::{Summary, summarize};

/// Group key for records that lack the grouping field.
pub const NO_GROUP: &str = "(none)";

/// Default deviation threshold in standard deviations.
pub const DEFAULT_THRESHOLD: f64 = 2.0;

/// Computes an [`AggregateReport`] from a batch result.
#[derive(Debug, Clone)]
pub struct Analyzer<'a> {
    patterns: &'a PatternSet,
    threshold: f64,
    group_by: Vec<String>,
    trend_field: Option<String>,
}

/// A record together with its index in the batch.
type Indexed<'r> = (usize, &'r Record);

impl<'a> Analyzer<'a> {
    /// Analyzer with the default threshold, no grouping, and trends over the
    /// first date field.
    pub fn new(patterns: &'a PatternSet) -> Self {
        let trend_field = patterns.date_fields().first().map(|f| f.to_string());
        Self {
            patterns,
            threshold: DEFAULT_THRESHOLD,
            group_by: Vec::new(),
            trend_field,
        }
    }

    /// Build an analyzer from configuration, validating every referenced field.
    pub fn from_config(
        patterns: &'a PatternSet,
        config: &AnalysisConfig,
    ) -> Result<Self, PatternConfigError> {
        let mut analyzer = Self::new(patterns)
            .with_threshold(config.anomaly_threshold)?
            .with_group_by(config.group_by(patterns.document_type()).to_vec())?;

        analyzer = if !config.trends {
            analyzer.with_trend_field(None)?
        } else if let Some(field) = &config.trend_field {
            analyzer.with_trend_field(Some(field.clone()))?
        } else {
            analyzer
        };

        Ok(analyzer)
    }

    /// Set the deviation threshold. Must be positive and finite.
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self, PatternConfigError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(PatternConfigError::InvalidThreshold(threshold));
        }
        self.threshold = threshold;
        Ok(self)
    }

    /// Set the grouping keys, outermost first.
    pub fn with_group_by(mut self, keys: Vec<String>) -> Result<Self, PatternConfigError> {
        for key in &keys {
            self.patterns.require_field(key, "group_by")?;
        }
        self.group_by = keys;
        Ok(self)
    }

    /// Set the date field trends are computed over, or disable trends.
    pub fn with_trend_field(mut self, field: Option<String>) -> Result<Self, PatternConfigError> {
        if let Some(name) = &field {
            self.patterns.require_field(name, "trend_field")?;
            if self.patterns.date_fields().iter().all(|f| f != name) {
                return Err(PatternConfigError::UnknownField {
                    field: name.clone(),
                    context: "trend_field (not a date field)".to_string(),
                });
            }
        }
        self.trend_field = field;
        Ok(self)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Analyze a batch. Pure: the same batch always yields the same report.
    pub fn analyze(&self, batch: &BatchResult) -> AggregateReport {
        let records: Vec<Indexed<'_>> = batch.records.iter().enumerate().collect();
        let mut report = self.aggregate(&records, &self.group_by);
        report.failure_count = batch.failures.len();

        debug!(
            "Analyzed {} records: {} anomalies",
            report.record_count,
            report.anomalies.len()
        );
        report
    }

    fn aggregate(&self, records: &[Indexed<'_>], keys: &[String]) -> AggregateReport {
        let mut fields = Vec::new();
        let mut anomalies = Vec::new();

        for field in self.patterns.numeric_fields() {
            let samples: Vec<(usize, &Record, f64)> = records
                .iter()
                .filter_map(|(i, r)| r.numeric(field).map(|v| (*i, *r, v)))
                .collect();
            let values: Vec<f64> = samples.iter().map(|(_, _, v)| *v).collect();
            let summary = summarize(&values);

            fields.push(field_stats(field, summary.as_ref()));

            let Some(summary) = summary else { continue };
            let Some(stddev) = summary.stddev else { continue };

            for (index, record, value) in samples {
                if !summary.is_outlier(value, self.threshold) {
                    continue;
                }
                let z_score = summary.z_score(value).unwrap_or_default();
                anomalies.push(Anomaly {
                    record_index: index,
                    source: record.source.clone(),
                    field: field.to_string(),
                    value,
                    z_score,
                    mean: summary.mean,
                    stddev,
                    reason: format!(
                        "{} {} deviates {:.2}σ from mean {:.2}",
                        field,
                        value,
                        z_score.abs(),
                        summary.mean
                    ),
                });
            }
        }

        anomalies.sort_by_key(|a| a.record_index);

        let grouping = keys
            .split_first()
            .map(|(key, rest)| self.breakdown(records, key, rest));

        AggregateReport {
            document_type: self.patterns.document_type(),
            record_count: records.len(),
            failure_count: 0,
            threshold: self.threshold,
            fields,
            anomalies,
            grouping,
            trends: self.trends(records),
        }
    }

    fn breakdown(&self, records: &[Indexed<'_>], key: &str, rest: &[String]) -> GroupBreakdown {
        let mut partitions: BTreeMap<String, Vec<Indexed<'_>>> = BTreeMap::new();

        for &(i, record) in records {
            let group = record
                .get(key)
                .map(|f| f.value.group_key())
                .unwrap_or_else(|| NO_GROUP.to_string());
            partitions.entry(group).or_default().push((i, record));
        }

        let groups = partitions
            .into_iter()
            .map(|(group, subset)| (group, self.aggregate(&subset, rest)))
            .collect();

        GroupBreakdown {
            field: key.to_string(),
            groups,
        }
    }

    fn trends(&self, records: &[Indexed<'_>]) -> Vec<TrendSeries> {
        let Some(date_field) = &self.trend_field else {
            return Vec::new();
        };

        self.patterns
            .numeric_fields()
            .into_iter()
            .filter_map(|field| {
                let mut months: BTreeMap<String, f64> = BTreeMap::new();
                for (_, record) in records {
                    if let (Some(date), Some(value)) =
                        (record.date(date_field), record.numeric(field))
                    {
                        *months.entry(date.format("%Y-%m").to_string()).or_default() += value;
                    }
                }
                if months.is_empty() {
                    return None;
                }

                let mut previous: Option<f64> = None;
                let points = months
                    .into_iter()
                    .map(|(period, sum)| {
                        let change_pct = previous
                            .filter(|p| *p != 0.0)
                            .map(|p| (sum - p) / p.abs() * 100.0);
                        previous = Some(sum);
                        TrendPoint {
                            period,
                            sum,
                            change_pct,
                        }
                    })
                    .collect();

                Some(TrendSeries {
                    field: field.to_string(),
                    date_field: date_field.clone(),
                    points,
                })
            })
            .collect()
    }
}

fn field_stats(field: &str, summary: Option<&Summary>) -> FieldStats {
    match summary {
        Some(s) => FieldStats {
            field: field.to_string(),
            count: s.count,
            sum: s.sum,
            mean: Some(s.mean),
            stddev: s.stddev,
            min: Some(s.min),
            max: Some(s.max),
        },
        None => FieldStats {
            field: field.to_string(),
            count: 0,
            sum: 0.0,
            mean: None,
            stddev: None,
            min: None,
            max: None,
        },
    }
}
