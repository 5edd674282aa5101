//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the pipeline code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::DashboardView;
use crate::domain::Selection;
use crate::report::{DailyPoint, Ranking};

/// Format a CLP figure for display: `.` as thousands separator, no decimals.
///
/// Only the display path uses this; CSV exports keep raw values.
pub fn format_clp(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    if rounded < 0.0 {
        out.insert(0, '-');
    }
    out
}

/// Dataset + filter summary printed above the tables.
pub fn format_view_summary(view: &DashboardView) -> String {
    let mut out = String::new();

    out.push_str("=== ffmm - Dashboard Fondos Mutuos ===\n");
    out.push_str(&format!(
        "Snapshot: {} | rows={}\n",
        view.source,
        view.total_rows
    ));

    for level in &view.cascade.levels {
        let chosen = match &level.selection {
            Selection::All => format!("all ({})", level.options.len()),
            Selection::None => "none".to_string(),
            Selection::Only(_) => format!("{} of {}", level.chosen_count(), level.options.len()),
        };
        out.push_str(&format!("{:<18} {chosen}\n", format!("{}:", level.dimension.display_name())));
    }

    let bounds = view
        .date_bounds
        .map(|b| format!("{} .. {}", b.start, b.end))
        .unwrap_or_else(|| "-".to_string());
    let range = view
        .date_range
        .map(|r| format!("{} .. {}", r.start, r.end))
        .unwrap_or_else(|| "all dates".to_string());
    out.push_str(&format!("Available dates: {bounds}\n"));
    out.push_str(&format!("Selected dates:  {range}\n"));
    out.push_str(&format!("Matching rows:   {}\n", view.subset_rows));

    if let Some(last) = view.net_assets.last() {
        out.push_str(&format!(
            "Patrimonio neto @ {}: {} MM CLP\n",
            last.date,
            format_clp(last.value)
        ));
    }
    if let Some(last) = view.net_sales_cumulative.last() {
        out.push_str(&format!(
            "Venta neta acumulada @ {}: {} MM CLP\n",
            last.date,
            format_clp(last.value)
        ));
    }

    out
}

/// Format the ranking table.
pub fn format_ranking(ranking: &Ranking) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Top {} of {} funds by {}:\n",
        ranking.rows.len(),
        ranking.total_funds,
        ranking.measure.display_name()
    ));

    if ranking.rows.is_empty() {
        out.push_str("(no data for the selected filters)\n");
        return out;
    }

    out.push_str(
        format!(
            "{:>4} {:<10} {:<28} {:<28} {:>16}",
            "#", "RUN_FM", "Fondo", "Administradora", "MM CLP"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<4} {:-<10} {:-<28} {:-<28} {:-<16}", "", "", "", "", "").trim_end());
    out.push('\n');

    for (i, row) in ranking.rows.iter().enumerate() {
        out.push_str(
            format!(
                "{:>4} {:<10} {:<28} {:<28} {:>16}",
                i + 1,
                truncate(&row.run_fm, 10),
                truncate(&row.short_name, 28),
                truncate(&row.administrator, 28),
                format_clp(row.total),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Two-column listing of a daily series (used when plots are disabled).
pub fn format_series(title: &str, series: &[DailyPoint]) -> String {
    let mut out = format!("{title}:\n");
    if series.is_empty() {
        out.push_str("(no data)\n");
        return out;
    }
    for p in series {
        out.push_str(&format!("{}  {:>16}\n", p.date, format_clp(p.value)));
    }
    out
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
