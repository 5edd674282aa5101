//! Cascading option lists.
//!
//! Each dimension's options come from rows that already satisfy every
//! dimension upstream of it in `Dimension::CHAIN`. Options are recomputed from
//! the base table on every call; the table is bounded (regulatory filings), so
//! there is no incremental bookkeeping to drift out of sync.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::{Capabilities, Dimension, FilterState, Record, SMALL_OPTION_THRESHOLD, Selection};

/// Distinct, non-null values of `dimension` among rows matching the upstream
/// selections in `state`, sorted ascending.
///
/// Selections on `dimension` itself and on downstream dimensions are ignored,
/// as is the date range.
pub fn options_for(records: &[Record], dimension: Dimension, state: &FilterState) -> Vec<String> {
    let upstream: Vec<(Dimension, Selection)> = Cascade::resolve_upstream(records, dimension, state);
    collect_options(records, dimension, &upstream)
}

/// Small dimensions are rendered as single-select by the front-end.
pub fn is_small(options: &[String]) -> bool {
    options.len() < SMALL_OPTION_THRESHOLD
}

/// One resolved level of the cascade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeLevel {
    pub dimension: Dimension,
    pub options: Vec<String>,
    /// The state's selection collapsed against `options`.
    pub selection: Selection,
}

impl CascadeLevel {
    pub fn is_small(&self) -> bool {
        is_small(&self.options)
    }

    /// Number of options the selection keeps.
    pub fn chosen_count(&self) -> usize {
        self.options.iter().filter(|o| self.selection.is_chosen(o)).count()
    }
}

/// All dimensions of the chain, resolved against one `FilterState`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cascade {
    pub levels: Vec<CascadeLevel>,
}

impl Cascade {
    /// Walk the chain, computing each level's options from the rows that pass
    /// every level before it.
    pub fn resolve(records: &[Record], capabilities: Capabilities, state: &FilterState) -> Self {
        let mut levels = Vec::new();
        let mut applied: Vec<(Dimension, Selection)> = Vec::new();

        for dimension in capabilities.dimensions() {
            let options = collect_options(records, dimension, &applied);
            let selection = state.selection(dimension).normalized(&options);
            applied.push((dimension, selection.clone()));
            levels.push(CascadeLevel {
                dimension,
                options,
                selection,
            });
        }

        Self { levels }
    }

    pub fn level(&self, dimension: Dimension) -> Option<&CascadeLevel> {
        self.levels.iter().find(|l| l.dimension == dimension)
    }

    pub fn is_small(&self, dimension: Dimension) -> bool {
        self.level(dimension).is_some_and(CascadeLevel::is_small)
    }

    /// Effective predicates, skipping pass-through levels.
    pub fn active(&self) -> impl Iterator<Item = &CascadeLevel> {
        self.levels.iter().filter(|l| l.selection != Selection::All)
    }

    /// Whether `record` passes every level.
    pub fn accepts(&self, record: &Record) -> bool {
        self.active()
            .all(|l| l.selection.accepts(record.value(l.dimension)))
    }

    fn resolve_upstream(
        records: &[Record],
        dimension: Dimension,
        state: &FilterState,
    ) -> Vec<(Dimension, Selection)> {
        let mut applied: Vec<(Dimension, Selection)> = Vec::new();
        for upstream in dimension.upstream() {
            let options = collect_options(records, upstream, &applied);
            let selection = state.selection(upstream).normalized(&options);
            applied.push((upstream, selection));
        }
        applied
    }
}

fn collect_options(
    records: &[Record],
    dimension: Dimension,
    applied: &[(Dimension, Selection)],
) -> Vec<String> {
    let mut out: BTreeSet<&str> = BTreeSet::new();
    for record in records {
        if !applied
            .iter()
            .all(|(d, sel)| sel.accepts(record.value(*d)))
        {
            continue;
        }
        if let Some(v) = record.value(dimension) {
            out.insert(v);
        }
    }
    out.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawRecord;

    fn rec(tipo: &str, adm: &str, run: &str, serie: Option<&str>) -> Record {
        Record::from_raw(RawRecord {
            fecha_inf: "20240301".into(),
            run_fm: run.into(),
            short_name: Some(format!("F{run}")),
            administrator: Some(adm.into()),
            fund_type: Some(tipo.into()),
            series: serie.map(str::to_string),
            ..RawRecord::default()
        })
    }

    fn table() -> Vec<Record> {
        vec![
            rec("RV", "ADM1", "1", Some("A")),
            rec("RV", "ADM1", "1", Some("B")),
            rec("RF", "ADM2", "2", Some("A")),
            rec("RF", "ADM1", "3", Some("I")),
            rec("RF", "ADM3", "4", None),
        ]
    }

    #[test]
    fn options_are_sorted_distinct_and_non_null() {
        let t = table();
        let series = options_for(&t, Dimension::Series, &FilterState::new());
        assert_eq!(series, vec!["A", "B", "I"]);
    }

    #[test]
    fn downstream_options_follow_upstream_selection() {
        let t = table();
        let state = FilterState::new().with_selection(Dimension::FundType, Selection::only(["RV"]));
        assert_eq!(options_for(&t, Dimension::Administrator, &state), vec!["ADM1"]);
        assert_eq!(options_for(&t, Dimension::Fund, &state), vec!["1 - F1"]);
        assert_eq!(options_for(&t, Dimension::Series, &state), vec!["A", "B"]);
    }

    #[test]
    fn own_and_downstream_selections_do_not_narrow_options() {
        let t = table();
        let state = FilterState::new()
            .with_selection(Dimension::Administrator, Selection::only(["ADM2"]))
            .with_selection(Dimension::Series, Selection::only(["I"]));
        let adm = options_for(&t, Dimension::Administrator, &state);
        assert_eq!(adm, vec!["ADM1", "ADM2", "ADM3"]);
    }

    #[test]
    fn cascade_collapses_full_selection() {
        let t = table();
        let state = FilterState::new()
            .with_selection(Dimension::FundType, Selection::only(["RF"]))
            .with_selection(Dimension::Administrator, Selection::only(["ADM1", "ADM2", "ADM3"]));
        let cascade = Cascade::resolve(&t, Capabilities { fund_type: true, category: false }, &state);
        let adm = cascade.level(Dimension::Administrator).unwrap();
        assert_eq!(adm.selection, Selection::All);
        assert_eq!(adm.chosen_count(), 3);
        assert!(cascade.level(Dimension::Category).is_none());
        assert!(cascade.is_small(Dimension::FundType));
    }

    #[test]
    fn small_threshold_is_five() {
        let four: Vec<String> = (0..4).map(|i| i.to_string()).collect();
        let five: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert!(is_small(&four));
        assert!(!is_small(&five));
    }
}
