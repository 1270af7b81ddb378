use partsheet_core::inventory::PriceUpdateReport;

use crate::commands::inspect::PageReport;

pub fn print_pages(backend: &str, pages: &[PageReport]) {
    println!("=== {} page(s), {} backend ===\n", pages.len(), backend);

    let max_layout = pages
        .iter()
        .map(|p| p.layout.len())
        .max()
        .unwrap_or(10)
        .max("layout".len());

    println!(
        "  {:>4}  {:<width$}  {:>6}  {:>4}  {:>4}",
        "page",
        "layout",
        "tables",
        "rows",
        "cols",
        width = max_layout
    );
    for p in pages {
        println!(
            "  {:>4}  {:<width$}  {:>6}  {:>4}  {:>4}",
            p.page,
            p.layout,
            p.tables,
            p.rows,
            p.columns,
            width = max_layout
        );
        if !p.header.is_empty() {
            println!("        header: {}", p.header.join(" | "));
        }
    }
    println!();
}

pub fn print_price_report(report: &PriceUpdateReport) {
    println!("=== Price update ===\n");
    println!("  Successful: {}", report.successful);
    println!("  Failed:     {}", report.failed);
    println!("  Not found:  {}", report.not_found.len());

    if !report.not_found.is_empty() {
        println!("\n  Stock numbers without an inventory item:");
        for stock in &report.not_found {
            println!("    {stock}");
        }
    }
    println!();
}
