use std::io::Write;

use anyhow::Result;
use prettytable::format::consts::FORMAT_CLEAN;
use prettytable::{Row, Table, cell, row};
use serde::Serialize;

use syllabus_service::caching::CacheStats;
use syllabus_service::content::CatalogItem;
use syllabus_service::service::PreloadReport;

use crate::settings::OutputFormat;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

pub fn print_items<T: CatalogItem + Serialize>(items: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(items),
        OutputFormat::Table => {
            print_item_table(items);
            Ok(())
        }
    }
}

fn print_item_table<T: CatalogItem>(items: &[T]) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    let mut table = Table::new();
    table.set_format(*FORMAT_CLEAN);
    table.set_titles(row![b => "Id", "Title", "Category", "Difficulty", "Tags"]);

    for item in items {
        let title = item.text().first().copied().unwrap_or_default();
        let difficulty = item
            .difficulty()
            .map(|d| d.to_string())
            .unwrap_or_default();
        table.add_row(row![
            item.id(),
            title,
            item.category(),
            difficulty,
            item.tags().join(", ")
        ]);
    }

    table.printstd();
}

#[derive(Serialize)]
struct WarmOutput<'a> {
    #[serde(flatten)]
    report: &'a PreloadReport,
    stats: CacheStats,
}

pub fn print_warm(report: &PreloadReport, stats: CacheStats, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(&WarmOutput { report, stats });
    }

    let mut table = Table::new();
    table.set_format(*FORMAT_CLEAN);
    table.set_titles(row![b => "Module", "Status"]);
    for key in &report.loaded {
        table.add_row(row![key, "loaded"]);
    }
    for failure in &report.failures {
        table.add_row(Row::new(vec![
            cell!(failure.key),
            cell!(Fr->failure.error),
        ]));
    }
    table.printstd();

    println!();
    let mut totals = Table::new();
    totals.set_format(*FORMAT_CLEAN);
    totals.add_row(row![r->"Cached modules:", stats.entry_count]);
    totals.add_row(row![r->"Approximate size:", format!("{} bytes", stats.approximate_size_bytes)]);
    totals.add_row(row![r->"Failed modules:", report.failures.len()]);
    totals.printstd();
    Ok(())
}

