//! Console rendering of a run report.

use oispin_core::{RunReport, Symbol};

pub fn render(report: &RunReport) {
    if report.roster_refreshed {
        println!(
            "Roster refreshed: {} members cached.",
            report.roster_size
        );
        if !report.diff.is_empty() {
            println!("  Additions: {}", join_or_none(&report.diff.added));
            println!("  Deletions: {}", join_or_none(&report.diff.removed));
        }
    }

    if report.table_refreshed && report.unmeasured > 0 {
        println!(
            "Warning: {} symbol(s) had no option data and were recorded as zero.",
            report.unmeasured
        );
    }

    println!();
    println!("==============================");
    println!("Median OI: {}", human(report.median_open_interest as u64));
    println!("Random pick ({}):", report.selection.len());
    println!();
    for record in &report.selection {
        println!(
            "{:<5} | OI {:>6} | #{:>3} | {:>5.1}%",
            record.symbol,
            human(record.open_interest),
            record.rank,
            record.pct_of_max
        );
    }
    println!();
    println!("Done!");
}

fn join_or_none(symbols: &[Symbol]) -> String {
    if symbols.is_empty() {
        return String::from("None");
    }
    symbols
        .iter()
        .map(Symbol::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format big counts like 78.9k or 1.2m.
fn human(value: u64) -> String {
    if value >= 1_000_000 {
        format!("{:.1}m", value as f64 / 1_000_000.0)
    } else if value >= 1_000 {
        format!("{:.1}k", value as f64 / 1_000.0)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_formats_magnitudes() {
        assert_eq!(human(950), "950");
        assert_eq!(human(78_900), "78.9k");
        assert_eq!(human(1_200_000), "1.2m");
    }

    #[test]
    fn join_or_none_falls_back() {
        assert_eq!(join_or_none(&[]), "None");
        let symbols = vec![
            Symbol::parse("ABNB").expect("valid"),
            Symbol::parse("GEV").expect("valid"),
        ];
        assert_eq!(join_or_none(&symbols), "ABNB, GEV");
    }
}
