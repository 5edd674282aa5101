//! Row selection.

use crate::domain::{Capabilities, DateRange, FilterState, Record};
use crate::filter::cascade::Cascade;

/// Rows passing every categorical selection and the closed date interval.
///
/// A dimension that is absent from `state`, or whose selection covers every
/// option it is offered, passes everything. Rows without a parsable
/// `report_date` are always dropped, with or without a date range. No match is
/// an empty `Vec`, never an error.
pub fn apply_filters<'a>(records: &'a [Record], state: &FilterState) -> Vec<&'a Record> {
    // Dimensions missing from the schema have no options, so any selection on
    // them collapses to `All`.
    let cascade = Cascade::resolve(records, Capabilities::ALL, state);
    filter_with(records, &cascade, state.date_range())
}

/// Same as [`apply_filters`] with an already-resolved cascade.
pub fn filter_with<'a>(
    records: &'a [Record],
    cascade: &Cascade,
    range: Option<DateRange>,
) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|r| in_range(r, range))
        .filter(|r| cascade.accepts(r))
        .collect()
}

/// Earliest and latest `report_date` among rows passing the categorical
/// selections. The date range itself is not applied.
pub fn date_bounds(records: &[Record], cascade: &Cascade) -> Option<DateRange> {
    let mut dates = records
        .iter()
        .filter(|r| cascade.accepts(r))
        .filter_map(|r| r.report_date);
    let first = dates.next()?;
    let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
    DateRange::new(min, max)
}

/// Undated rows never pass; `None` means every available date.
fn in_range(record: &Record, range: Option<DateRange>) -> bool {
    match (record.report_date, range) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(d), Some(range)) => range.contains(d),
    }
}
