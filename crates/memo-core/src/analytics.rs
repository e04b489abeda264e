//! Pure aggregation helpers shared by the analytics queries.
//!
//! SQL produces sparse grouped counts; these functions turn them into
//! the reported shapes: percentages, winners with explicit tie-breaks
//! and zero-filled daily series.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::defaults::NOT_AVAILABLE;
use crate::models::{CategoryShare, DailyCount, MetricCategoryShare, MetricsByCategory};

/// Split 100% across `counts` in hundredths of a percent.
///
/// Uses largest-remainder rounding so the parts sum to exactly 10_000
/// when the total is positive. Ties in remainder go to the earlier index.
/// Returns all zeros when the total is zero.
pub fn share_hundredths(counts: &[i64]) -> Vec<i64> {
    let total: i64 = counts.iter().map(|c| (*c).max(0)).sum();
    if total == 0 {
        return vec![0; counts.len()];
    }

    let mut parts: Vec<i64> = Vec::with_capacity(counts.len());
    let mut remainders: Vec<(usize, i64)> = Vec::with_capacity(counts.len());
    for (idx, count) in counts.iter().enumerate() {
        let scaled = (*count).max(0) * 10_000;
        parts.push(scaled / total);
        remainders.push((idx, scaled % total));
    }

    let assigned: i64 = parts.iter().sum();
    let mut leftover = 10_000 - assigned;
    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for (idx, _) in remainders {
        if leftover == 0 {
            break;
        }
        parts[idx] += 1;
        leftover -= 1;
    }
    parts
}

fn to_percentage(hundredths: i64) -> f64 {
    hundredths as f64 / 100.0
}

/// Ordering by count descending, then label ascending.
fn by_count_then_label(a: &(String, i64), b: &(String, i64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Category distribution sorted by percentage descending, then name.
pub fn category_shares(counts: Vec<(String, i64)>) -> Vec<CategoryShare> {
    let mut counts = counts;
    counts.sort_by(by_count_then_label);
    let raw: Vec<i64> = counts.iter().map(|(_, c)| *c).collect();
    let shares = share_hundredths(&raw);

    let mut out: Vec<CategoryShare> = counts
        .into_iter()
        .zip(shares)
        .map(|((category, count), hundredths)| CategoryShare {
            category,
            count,
            percentage: to_percentage(hundredths),
        })
        .collect();
    out.sort_by(|a, b| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    out
}

/// The label with the highest count; ties go to the smallest label.
///
/// Returns `"N/A"` when no label has a positive count.
pub fn most_used(counts: &[(String, i64)]) -> String {
    counts
        .iter()
        .filter(|(_, c)| *c > 0)
        .min_by(|a, b| by_count_then_label(a, b))
        .map(|(label, _)| label.clone())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// The busiest day formatted `YYYY-MM-DD`; ties go to the earliest date.
///
/// Returns `"N/A"` when no day has entries.
pub fn most_active_day(days: &[DailyCount]) -> String {
    days.iter()
        .filter(|d| d.count > 0)
        .min_by(|a, b| b.count.cmp(&a.count).then_with(|| a.date.cmp(&b.date)))
        .map(|d| d.date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Zero-fill a sparse daily series over `[start, end]`, ascending.
///
/// Days outside the range are dropped.
pub fn fill_daily_counts(sparse: &[DailyCount], start: NaiveDate, end: NaiveDate) -> Vec<DailyCount> {
    if start > end {
        return Vec::new();
    }
    let by_date: HashMap<NaiveDate, i64> = sparse.iter().map(|d| (d.date, d.count)).collect();
    let mut out = Vec::with_capacity(((end - start).num_days() + 1) as usize);
    let mut day = start;
    while day <= end {
        out.push(DailyCount {
            date: day,
            count: by_date.get(&day).copied().unwrap_or(0),
        });
        day += Duration::days(1);
    }
    out
}

/// Whole days between two instants, never less than one.
pub fn days_in_range(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_days().max(1)
}

/// `total / days` with the one-day floor applied to `days`.
pub fn average_per_day(total: i64, days: i64) -> f64 {
    total as f64 / days.max(1) as f64
}

/// One grouped row of metric statistics: label, count, sum of values.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricGroup {
    pub category: Option<String>,
    pub count: i64,
    pub total: f64,
}

/// Metric distribution over category labels.
///
/// Groups are sorted by percentage descending, then by label with the
/// uncategorized group last.
pub fn metric_category_shares(groups: Vec<MetricGroup>) -> MetricsByCategory {
    let mut groups: Vec<MetricGroup> = groups.into_iter().filter(|g| g.count > 0).collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| label_order(&a.category, &b.category)));

    let total_metrics: i64 = groups.iter().map(|g| g.count).sum();
    let raw: Vec<i64> = groups.iter().map(|g| g.count).collect();
    let shares = share_hundredths(&raw);

    let mut categories: Vec<MetricCategoryShare> = groups
        .into_iter()
        .zip(shares)
        .map(|(g, hundredths)| MetricCategoryShare {
            average: g.total / g.count as f64,
            category: g.category,
            count: g.count,
            total: g.total,
            percentage: to_percentage(hundredths),
        })
        .collect();
    categories.sort_by(|a, b| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(Ordering::Equal)
            .then_with(|| label_order(&a.category, &b.category))
    });

    MetricsByCategory {
        total_metrics,
        categories,
    }
}

fn label_order(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
