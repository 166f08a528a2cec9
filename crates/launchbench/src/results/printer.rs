//! Terminal summary of aggregated results.

use std::io::Write;

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use owo_colors::OwoColorize;

use crate::results::stats::compute_stats;
use crate::results::ResultAggregator;

/// Format a statistic compactly: integers without a fraction, others with
/// up to four significant decimals.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

/// Build the summary table, one row per metric.
pub fn summary_table(results: &ResultAggregator, color: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header = ["Metric", "Units", "n", "Mean", "Std Dev", "Min", "Max"]
        .into_iter()
        .map(|title| {
            let cell = Cell::new(title).add_attribute(Attribute::Bold);
            if color { cell.fg(Color::Cyan) } else { cell }
        })
        .collect::<Vec<_>>();
    table.set_header(header);

    for ((graph, trace), series) in results.iter() {
        let stats = compute_stats(&series.samples);
        table.add_row(vec![
            Cell::new(format!("{graph}: {trace}")),
            Cell::new(&series.units),
            Cell::new(stats.count).set_alignment(CellAlignment::Right),
            Cell::new(format_value(stats.mean)).set_alignment(CellAlignment::Right),
            Cell::new(format_value(stats.std_dev)).set_alignment(CellAlignment::Right),
            Cell::new(format_value(stats.min)).set_alignment(CellAlignment::Right),
            Cell::new(format_value(stats.max)).set_alignment(CellAlignment::Right),
        ]);
    }

    table
}

/// Write a titled summary table to `writer`. Nothing is written when no
/// sample was recorded.
pub fn print_summary<W: Write>(
    writer: &mut W,
    results: &ResultAggregator,
    completed_iterations: usize,
    color: bool,
) -> std::io::Result<()> {
    if results.is_empty() {
        return Ok(());
    }

    writeln!(writer)?;
    let title = format!(" SUMMARY ({completed_iterations} iterations) ");
    if color {
        writeln!(writer, "{}", format!("{title:=^60}").yellow().bold())?;
    } else {
        writeln!(writer, "{title:=^60}")?;
    }
    writeln!(writer, "{}", summary_table(results, color))?;
    Ok(())
}
