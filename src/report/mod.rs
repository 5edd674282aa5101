//! Reporting utilities: daily series, fund rankings, and formatted terminal output.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{AggregateMode, Measure, Record};

pub mod format;

pub use format::*;

/// One point of a daily series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// A fund's summed measure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFund {
    pub run_fm: String,
    pub short_name: String,
    pub administrator: String,
    pub total: f64,
}

/// Top-N funds plus the number of distinct funds before truncation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub measure: Measure,
    pub rows: Vec<RankedFund>,
    pub total_funds: usize,
}

/// Sum `measure` per calendar date, in date order.
///
/// Dates without rows are omitted (sparse). Rows without a `report_date` are
/// skipped; a null measure counts as zero but still marks its date.
/// `Cumulative` turns the per-date sums into a running total.
pub fn daily_aggregate(subset: &[&Record], measure: Measure, mode: AggregateMode) -> Vec<DailyPoint> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in subset {
        let Some(date) = record.report_date else { continue };
        *by_date.entry(date).or_insert(0.0) += measure.value(record).unwrap_or(0.0);
    }

    let mut running = 0.0;
    by_date
        .into_iter()
        .map(|(date, sum)| {
            let value = match mode {
                AggregateMode::Plain => sum,
                AggregateMode::Cumulative => {
                    running += sum;
                    running
                }
            };
            DailyPoint { date, value }
        })
        .collect()
}

/// Rank `(RUN_FM, Nombre_Corto, NOM_ADM)` triples by summed `measure`.
///
/// Sorted descending by total; ties go to the smaller fund id.
pub fn rank_funds(subset: &[&Record], measure: Measure, limit: usize) -> Ranking {
    let mut totals: HashMap<(&str, &str, &str), f64> = HashMap::new();
    for record in subset {
        let key = (
            record.run_fm.as_str(),
            record.short_name.as_deref().unwrap_or(""),
            record.administrator.as_deref().unwrap_or(""),
        );
        *totals.entry(key).or_insert(0.0) += measure.value(record).unwrap_or(0.0);
    }

    let mut rows: Vec<RankedFund> = totals
        .into_iter()
        .map(|((run, name, adm), total)| RankedFund {
            run_fm: run.to_string(),
            short_name: name.to_string(),
            administrator: adm.to_string(),
            total,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| compare_fund_ids(&a.run_fm, &b.run_fm))
            .then_with(|| a.short_name.cmp(&b.short_name))
            .then_with(|| a.administrator.cmp(&b.administrator))
    });

    let total_funds = rows.len();
    rows.truncate(limit);

    Ranking {
        measure,
        rows,
        total_funds,
    }
}

/// `RUN_FM` values are numeric in practice; compare them as numbers when both
/// parse, so `"900"` sorts before `"8001"`.
pub fn compare_fund_ids(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<u64>(), b.trim().parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}
