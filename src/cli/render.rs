//! `puzzle render`: compose one request and print what was written.

use std::fmt::Write as _;

use anyhow::{Result, anyhow};
use owo_colors::OwoColorize;

use super::common::{Site, parse_cookie_args};
use crate::compose::BufferedSink;
use crate::page::RequestContext;

/// Compose `url` and print status, headers and every written chunk.
pub async fn render_url(site: &Site, url: &str, cookies: &[String]) -> Result<()> {
    let sink = render_to_sink(site, url, cookies).await?;
    print!("{}", format_response(&sink));
    Ok(())
}

async fn render_to_sink(site: &Site, url: &str, cookies: &[String]) -> Result<BufferedSink> {
    let mut request = RequestContext::get(url);
    for (name, value) in parse_cookie_args(cookies)? {
        request = request.with_cookie(&name, &value);
    }
    let page = site
        .page_for_url(&request.path)
        .ok_or_else(|| anyhow!("no page answers `{}`", request.path))?;

    let mut sink = BufferedSink::new();
    page.handle(&request, &mut sink).await;
    Ok(sink)
}

fn format_response(sink: &BufferedSink) -> String {
    let mut out = String::new();
    if let Some(head) = &sink.head {
        let _ = writeln!(out, "{} {}", "status".bold(), head.status);
        for (name, value) in &head.headers {
            let _ = writeln!(out, "{}: {}", name.cyan(), value);
        }
        if head.chunked {
            let _ = writeln!(out, "{}: chunked", "transfer-encoding".cyan());
        }
    }
    for (i, chunk) in sink.chunks.iter().enumerate() {
        let _ = writeln!(out, "\n{}", format!("--- chunk {} ---", i + 1).dimmed());
        let _ = writeln!(out, "{chunk}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::common::tests::write_site;

    #[tokio::test]
    async fn test_render_product_page() {
        owo_colors::set_override(false);
        let dir = tempfile::tempdir().unwrap();
        let site = Site::load(&write_site(dir.path())).unwrap();

        let sink = render_to_sink(&site, "/product?id=1", &["puzzle_product_version=1".into()])
            .await
            .unwrap();
        assert_eq!(sink.status(), Some(200));
        // one chunk for the first flush, one per chunked fragment, one closing
        assert_eq!(sink.chunks.len(), 3);

        let out = format_response(&sink);
        assert!(out.starts_with("status 200\n"));
        assert!(out.contains("transfer-encoding: chunked"));
        assert!(out.contains("<h1>Shoes</h1>"));
        assert!(out.contains("<div>Product</div>"));
        assert!(out.contains("<ul>Reviews</ul>"));
        assert!(out.contains("--- chunk 3 ---"));
    }

    #[tokio::test]
    async fn test_render_unknown_url() {
        let dir = tempfile::tempdir().unwrap();
        let site = Site::load(&write_site(dir.path())).unwrap();
        let err = render_to_sink(&site, "/cart", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "no page answers `/cart`");
    }
}
