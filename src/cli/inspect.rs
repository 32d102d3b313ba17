//! `puzzle inspect`: print a page's classification table.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{Result, anyhow};
use owo_colors::OwoColorize;

use super::common::Site;
use crate::compose::{CompiledHandler, Strategy};

/// Compile `name` for the default versions and print its fragments.
pub async fn inspect_page(site: &Site, name: &str) -> Result<()> {
    let page = site.page(name).ok_or_else(|| anyhow!("no page named `{name}`"))?;
    let handler = page.handler(&BTreeMap::new()).await?;
    print!("{}", format_table(name, &handler));
    Ok(())
}

fn format_table(name: &str, handler: &CompiledHandler) -> String {
    let rows: Vec<[String; 5]> = handler
        .summary()
        .iter()
        .map(|row| {
            [
                row.identity.name.clone(),
                row.identity.gateway.clone(),
                row.classification.name().to_string(),
                row.version.clone(),
                row.partials.join(", "),
            ]
        })
        .collect();

    let header = ["fragment", "gateway", "classification", "version", "partials"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let strategy = match handler.strategy() {
        Strategy::Buffered => "buffered".green().to_string(),
        Strategy::Streaming => "streaming".cyan().to_string(),
    };
    let _ = writeln!(out, "{} ({})", name.bold(), strategy);

    let line = |cells: [&str; 5]| {
        let mut line = String::new();
        for (cell, width) in cells.iter().zip(widths) {
            let _ = write!(line, "{cell:<width$}  ");
        }
        line.trim_end().to_string()
    };
    let _ = writeln!(out, "{}", line(header).dimmed());
    for row in &rows {
        let _ = writeln!(out, "{}", line(row.each_ref().map(String::as_str)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::common::tests::write_site;

    #[tokio::test]
    async fn test_table_lists_every_fragment() {
        owo_colors::set_override(false);
        let dir = tempfile::tempdir().unwrap();
        let site = Site::load(&write_site(dir.path())).unwrap();
        let page = site.page("product-detail").unwrap();
        let handler = page.handler(&BTreeMap::new()).await.unwrap();

        let table = format_table("product-detail", &handler);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines[0], "product-detail (streaming)");
        assert!(lines[1].starts_with("fragment"));
        assert!(lines[2].starts_with("product "));
        assert!(lines[2].contains("primary"));
        assert!(lines[3].starts_with("reviews "));
        assert!(lines[3].contains("chunked"));
        assert_eq!(lines.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_page() {
        let dir = tempfile::tempdir().unwrap();
        let site = Site::load(&write_site(dir.path())).unwrap();
        assert!(inspect_page(&site, "cart").await.is_err());
    }
}
