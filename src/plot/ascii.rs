//! ASCII bar charts for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - bars: `#`, drawn from the zero line towards the value
//! - zero line: `-` (only when the range crosses zero)

use crate::report::{DailyPoint, format_clp};

/// Render a daily series as vertical bars, one column per date bucket.
///
/// When there are more dates than columns, the last date mapped onto a column
/// wins (for cumulative series that is the column's closing value).
pub fn render_bar_chart(title: &str, series: &[DailyPoint], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let mut out = String::new();
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        out.push_str(&format!("{title}: (no data)\n"));
        return out;
    };

    let columns = bucket_columns(series, width);
    let (y_min, y_max) = y_range(&columns);

    let mut grid = vec![vec![' '; width]; height];
    let zero = map_y(0.0, y_min, y_max, height);

    if y_min < 0.0 && y_max > 0.0 {
        for cell in grid[zero].iter_mut() {
            *cell = '-';
        }
    }

    for (x, value) in columns.iter().enumerate() {
        let Some(v) = value else { continue };
        let top = map_y(*v, y_min, y_max, height);
        let (lo, hi) = if top <= zero { (top, zero) } else { (zero, top) };
        for row in grid.iter_mut().take(hi + 1).skip(lo) {
            row[x] = '#';
        }
    }

    out.push_str(&format!(
        "{title}: {} .. {} | y=[{}, {}] MM CLP\n",
        first.date,
        last.date,
        format_clp(y_min),
        format_clp(y_max)
    ));
    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }

    out
}

fn bucket_columns(series: &[DailyPoint], width: usize) -> Vec<Option<f64>> {
    let mut columns = vec![None; width];
    if series.len() <= width {
        for (i, p) in series.iter().enumerate() {
            columns[i] = Some(p.value);
        }
        columns.truncate(series.len());
        return columns;
    }

    let n = series.len();
    for (i, p) in series.iter().enumerate() {
        let x = map_x(i, n, width);
        columns[x] = Some(p.value);
    }
    columns
}

fn y_range(columns: &[Option<f64>]) -> (f64, f64) {
    // Bars grow from zero, so zero is always in range.
    let mut y_min = 0.0_f64;
    let mut y_max = 0.0_f64;
    for v in columns.iter().flatten() {
        y_min = y_min.min(*v);
        y_max = y_max.max(*v);
    }
    if (y_max - y_min).abs() < 1e-12 {
        y_max = y_min + 1.0;
    }
    (y_min, y_max)
}

fn map_x(i: usize, n: usize, width: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let u = i as f64 / (n as f64 - 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn p(day: u32, value: f64) -> DailyPoint {
        DailyPoint {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            value,
        }
    }

    #[test]
    fn bar_chart_golden_snapshot_small() {
        let series = vec![p(1, 1000.0), p(2, 2000.0), p(3, 4000.0)];
        let txt = render_bar_chart("NAV", &series, 10, 5);
        let expected = concat!(
            "NAV: 2024-03-01 .. 2024-03-03 | y=[0, 4.000] MM CLP\n",
            "  #\n",
            "  #\n",
            " ##\n",
            "###\n",
            "###\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn negative_values_hang_below_zero_line() {
        let series = vec![p(1, 10.0), p(2, -10.0)];
        let txt = render_bar_chart("Ventas", &series, 10, 5);
        let rows: Vec<&str> = txt.lines().skip(1).collect();
        assert_eq!(rows[0], "#");
        assert_eq!(rows[2], "##--------");
        assert_eq!(rows[4], " #");
    }

    #[test]
    fn empty_series_renders_placeholder() {
        assert_eq!(render_bar_chart("NAV", &[], 20, 5), "NAV: (no data)\n");
    }
}
