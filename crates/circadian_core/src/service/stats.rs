//! Aggregate statistics over measurement records.
//!
//! # Invariants
//! - Standard deviation is the sample deviation (n - 1) and is `None` for a
//!   single observation.
//! - Hourly buckets are sorted by hour and only cover hours that have data.

use crate::model::record::{canonical_timestamp, MeasurementRecord};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Distribution summary for one integer metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std_dev: Option<f64>,
    pub min: i32,
    pub max: i32,
}

/// Dataset-level summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_entries: usize,
    pub unique_people: usize,
    #[serde(with = "canonical_timestamp")]
    pub first_timestamp: NaiveDateTime,
    #[serde(with = "canonical_timestamp")]
    pub last_timestamp: NaiveDateTime,
    pub heart_rate: MetricSummary,
    pub systolic_bp: MetricSummary,
    pub diastolic_bp: MetricSummary,
    pub energy_level: MetricSummary,
}

/// Mean metric values for one hour of the day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyAverage {
    /// 0-23.
    pub hour: u32,
    pub count: usize,
    pub heart_rate: f64,
    pub systolic_bp: f64,
    pub diastolic_bp: f64,
    pub energy_level: f64,
}

/// Summarizes `records`; returns `None` when empty.
pub fn summarize(records: &[MeasurementRecord]) -> Option<SummaryStats> {
    let first_timestamp = records.iter().map(|record| record.timestamp).min()?;
    let last_timestamp = records.iter().map(|record| record.timestamp).max()?;
    let unique_people = records
        .iter()
        .map(|record| record.person_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    Some(SummaryStats {
        total_entries: records.len(),
        unique_people,
        first_timestamp,
        last_timestamp,
        heart_rate: summarize_metric(records, |record| record.heart_rate)?,
        systolic_bp: summarize_metric(records, |record| record.systolic_bp)?,
        diastolic_bp: summarize_metric(records, |record| record.diastolic_bp)?,
        energy_level: summarize_metric(records, |record| record.energy_level)?,
    })
}

/// Groups records by hour of day and averages each metric.
pub fn hourly_profile(records: &[MeasurementRecord]) -> Vec<HourlyAverage> {
    let mut buckets: BTreeMap<u32, Vec<&MeasurementRecord>> = BTreeMap::new();
    for record in records {
        buckets.entry(record.hour()).or_default().push(record);
    }

    buckets
        .into_iter()
        .map(|(hour, bucket)| {
            let average = |metric: fn(&MeasurementRecord) -> i32| {
                mean(bucket.iter().map(|record| metric(*record)))
            };
            HourlyAverage {
                hour,
                count: bucket.len(),
                heart_rate: average(|record| record.heart_rate),
                systolic_bp: average(|record| record.systolic_bp),
                diastolic_bp: average(|record| record.diastolic_bp),
                energy_level: average(|record| record.energy_level),
            }
        })
        .collect()
}

fn summarize_metric(
    records: &[MeasurementRecord],
    metric: impl Fn(&MeasurementRecord) -> i32,
) -> Option<MetricSummary> {
    let values = records.iter().map(metric).collect::<Vec<_>>();
    let min = values.iter().copied().min()?;
    let max = values.iter().copied().max()?;
    let mean = mean(values.iter().copied());

    let std_dev = if values.len() > 1 {
        let squared = values
            .iter()
            .map(|value| (f64::from(*value) - mean).powi(2))
            .sum::<f64>();
        Some((squared / (values.len() - 1) as f64).sqrt())
    } else {
        None
    };

    Some(MetricSummary {
        mean,
        std_dev,
        min,
        max,
    })
}

fn mean(values: impl Iterator<Item = i32>) -> f64 {
    let (sum, count) = values.fold((0_i64, 0_usize), |(sum, count), value| {
        (sum + i64::from(value), count + 1)
    });
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::{hourly_profile, summarize};
    use crate::model::record::{parse_timestamp, MeasurementRecord};

    fn record(person: &str, ts: &str, heart_rate: i32, energy: i32) -> MeasurementRecord {
        MeasurementRecord::new(person, parse_timestamp(ts).unwrap(), heart_rate, 120, 80, energy)
    }

    #[test]
    fn summarize_empty_is_none() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn summarize_uses_sample_deviation() {
        let records = vec![
            record("alice", "2024-01-02 08:00:00", 60, 4),
            record("bob", "2024-01-01 09:00:00", 70, 6),
            record("alice", "2024-01-03 21:00:00", 80, 8),
        ];
        let stats = summarize(&records).unwrap();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.unique_people, 2);
        assert_eq!(
            stats.first_timestamp,
            parse_timestamp("2024-01-01 09:00:00").unwrap()
        );
        assert_eq!(stats.heart_rate.mean, 70.0);
        assert_eq!(stats.heart_rate.std_dev, Some(10.0));
        assert_eq!((stats.heart_rate.min, stats.heart_rate.max), (60, 80));
        assert_eq!(stats.energy_level.std_dev, Some(2.0));
    }

    #[test]
    fn single_record_has_no_deviation() {
        let stats = summarize(&[record("alice", "2024-01-01 08:00:00", 65, 7)]).unwrap();
        assert_eq!(stats.heart_rate.std_dev, None);
    }

    #[test]
    fn hourly_profile_groups_by_hour() {
        let records = vec![
            record("alice", "2024-01-01 21:15:00", 60, 3),
            record("alice", "2024-01-01 08:00:00", 70, 8),
            record("alice", "2024-01-02 08:45:00", 80, 6),
        ];
        let profile = hourly_profile(&records);
        assert_eq!(profile.len(), 2);
        assert_eq!(profile[0].hour, 8);
        assert_eq!(profile[0].count, 2);
        assert_eq!(profile[0].heart_rate, 75.0);
        assert_eq!(profile[0].energy_level, 7.0);
        assert_eq!(profile[1].hour, 21);
    }
}
