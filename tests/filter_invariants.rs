use std::collections::HashSet;

use chrono::NaiveDate;
use ffmm_dash::app::pipeline::{ViewConfig, build_view, export_filtered, with_quick_range};
use ffmm_dash::domain::{
    AggregateMode, Capabilities, DateRange, Dimension, FilterState, Measure, QuickRange, RawRecord,
    Selection,
};
use ffmm_dash::filter::{apply_filters, options_for};
use ffmm_dash::io::Dataset;
use ffmm_dash::report::{compare_fund_ids, daily_aggregate, rank_funds};

const TYPES: [&str; 2] = ["RF", "RV"];
const CATEGORIES: [&str; 3] = ["Deuda < 90", "Accionario", "Balanceado"];
const ADMINS: [&str; 4] = ["ADM A", "ADM B", "ADM C", "ADM D"];
const SERIES: [&str; 5] = ["A", "B", "APV", "I", "F"];

/// Small deterministic generator so every run sees the same table.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next() % items.len() as u64) as usize]
    }
}

fn synthetic_dataset() -> Dataset {
    let mut rng = Lcg(42);
    let start = NaiveDate::from_ymd_opt(2023, 11, 1).unwrap();
    let mut raw = Vec::new();
    for i in 0..400 {
        let run = 8000 + rng.next() % 12;
        let date = start + chrono::Days::new(rng.next() % 150);
        let fecha = if i % 97 == 0 {
            "n/a".to_string()
        } else {
            date.format("%Y%m%d").to_string()
        };
        raw.push(RawRecord {
            fecha_inf: fecha,
            run_fm: run.to_string(),
            short_name: Some(format!("FONDO {run}")),
            // Administrator is a function of the fund, as in the filings.
            administrator: Some(ADMINS[(run % 4) as usize].to_string()),
            fund_type: Some(TYPES[(run % 2) as usize].to_string()),
            category: (i % 13 != 0).then(|| rng.pick(&CATEGORIES).to_string()),
            series: Some(rng.pick(&SERIES).to_string()),
            net_assets_mm: Some((rng.next() % 10_000) as f64),
            net_sales_mm: (i % 11 != 0).then(|| (rng.next() % 200) as f64 - 100.0),
        });
    }
    Dataset::from_raw(raw, Capabilities::ALL)
}

fn states(dataset: &Dataset) -> Vec<FilterState> {
    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
    );
    let base = FilterState::new();
    let rf = base.with_selection(Dimension::FundType, Selection::only(["RF"]));
    let adm = rf.with_selection(Dimension::Administrator, Selection::only(["ADM A", "ADM C"]));
    let series = base.with_selection(Dimension::Series, Selection::only(["APV", "I"]));
    let cat = base.with_selection(Dimension::Category, Selection::only(["Accionario"]));
    let quick = with_quick_range(dataset, &adm, QuickRange::ThreeMonths);
    vec![
        base.clone(),
        rf.clone(),
        adm.clone(),
        series.clone(),
        cat,
        adm.with_date_range(range),
        series.with_date_range(range),
        quick,
        base.with_selection(Dimension::Series, Selection::None),
    ]
}

fn config() -> ViewConfig {
    ViewConfig {
        rank_measure: Measure::NetSales,
        top_n: 5,
    }
}

#[test]
fn subset_rows_satisfy_every_predicate() {
    let dataset = synthetic_dataset();
    for state in states(&dataset) {
        let subset = apply_filters(&dataset.records, &state);
        for r in &subset {
            for dim in Dimension::CHAIN {
                assert!(
                    state.selection(dim).accepts(r.value(dim)),
                    "{dim:?} rejected a row in the subset"
                );
            }
            if let Some(range) = state.date_range() {
                assert!(r.report_date.is_some_and(|d| range.contains(d)));
            }
        }
    }
}

#[test]
fn selecting_every_option_equals_selecting_nothing() {
    let dataset = synthetic_dataset();
    let base = FilterState::new();
    for dim in Dimension::CHAIN {
        let options = options_for(&dataset.records, dim, &base);
        let explicit = base.with_selection(dim, Selection::only(options));
        assert_eq!(
            apply_filters(&dataset.records, &explicit),
            apply_filters(&dataset.records, &base)
        );
    }
}

#[test]
fn upstream_selections_only_narrow_options() {
    let dataset = synthetic_dataset();
    let base = FilterState::new();
    for state in states(&dataset) {
        for dim in Dimension::CHAIN {
            let all: HashSet<String> = options_for(&dataset.records, dim, &base).into_iter().collect();
            let narrowed = options_for(&dataset.records, dim, &state);
            assert!(narrowed.iter().all(|o| all.contains(o)));

            let mut sorted = narrowed.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted, narrowed, "options must be sorted and distinct");
        }
    }
}

#[test]
fn cumulative_series_ends_at_the_total() {
    let dataset = synthetic_dataset();
    for state in states(&dataset) {
        let subset = apply_filters(&dataset.records, &state);
        let cum = daily_aggregate(&subset, Measure::NetSales, AggregateMode::Cumulative);
        let expected: f64 = subset
            .iter()
            .filter(|r| r.report_date.is_some())
            .map(|r| r.net_sales_mm.unwrap_or(0.0))
            .sum();
        match cum.last() {
            Some(last) => assert!((last.value - expected).abs() < 1e-9),
            None => assert_eq!(expected, 0.0),
        }
        assert!(cum.windows(2).all(|w| w[0].date < w[1].date));
    }
}

#[test]
fn ranking_is_sorted_and_unique() {
    let dataset = synthetic_dataset();
    for state in states(&dataset) {
        let subset = apply_filters(&dataset.records, &state);
        let ranking = rank_funds(&subset, Measure::NetAssets, 100);
        assert!(ranking.rows.windows(2).all(|w| {
            w[0].total > w[1].total
                || (w[0].total == w[1].total && compare_fund_ids(&w[0].run_fm, &w[1].run_fm).is_le())
        }));
        let keys: HashSet<(&str, &str, &str)> = ranking
            .rows
            .iter()
            .map(|r| (r.run_fm.as_str(), r.short_name.as_str(), r.administrator.as_str()))
            .collect();
        assert_eq!(keys.len(), ranking.rows.len());

        let top = rank_funds(&subset, Measure::NetAssets, 3);
        assert!(top.rows.len() <= 3);
        assert_eq!(top.rows.as_slice(), &ranking.rows[..top.rows.len()]);
    }
}

#[test]
fn view_matches_the_standalone_functions() {
    let dataset = synthetic_dataset();
    for state in states(&dataset) {
        let view = build_view(&dataset, &state, config());
        let subset = apply_filters(&dataset.records, &state);
        assert_eq!(view.subset_rows, subset.len());
        assert_eq!(
            view.net_assets,
            daily_aggregate(&subset, Measure::NetAssets, AggregateMode::Plain)
        );
        assert_eq!(view.ranking, rank_funds(&subset, Measure::NetSales, 5));
        if let (Some(bounds), Some(range)) = (view.date_bounds, view.date_range) {
            assert!(bounds.start <= bounds.end);
            assert!(range.start <= range.end);
        }
    }
}

#[test]
fn export_cap_is_a_hard_limit() {
    let dataset = synthetic_dataset();
    for state in states(&dataset) {
        let rows = apply_filters(&dataset.records, &state).len();
        if rows > 0 {
            let err = export_filtered(&dataset, &state, rows - 1).unwrap_err();
            assert!(err.is_export_too_large());
        }
        let bytes = export_filtered(&dataset, &state, rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut reader = csv::Reader::from_reader(text.trim_start_matches('\u{feff}').as_bytes());
        assert_eq!(reader.records().count(), rows);
    }
}

#[test]
fn open_range_matches_the_all_dates_quick_range() {
    let dataset = synthetic_dataset();
    for state in states(&dataset) {
        let open = state.with_date_range(None);
        let all = with_quick_range(&dataset, &open, QuickRange::All);

        let a = build_view(&dataset, &open, config());
        let b = build_view(&dataset, &all, config());
        assert_eq!(a.subset_rows, b.subset_rows);
        assert_eq!(a.net_assets, b.net_assets);
        assert_eq!(a.net_sales_cumulative, b.net_sales_cumulative);
        assert_eq!(a.ranking, b.ranking);

        let ranked: f64 = rank_funds(
            &apply_filters(&dataset.records, &open),
            Measure::NetAssets,
            usize::MAX,
        )
        .rows
        .iter()
        .map(|r| r.total)
        .sum();
        let charted: f64 = a.net_assets.iter().map(|p| p.value).sum();
        assert!((ranked - charted).abs() < 1e-6);
    }
}
