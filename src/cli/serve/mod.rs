//! HTTP server answering configured pages.
//!
//! tiny_http accepts connections; each request is handed to a rayon pool
//! thread which starts the composition on the tokio runtime and copies the
//! sink's output to the socket as it arrives.

mod body;
mod lifecycle;
mod response;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tiny_http::{Request, Server};
use tokio::runtime::Handle;

use super::common::Site;
use crate::config::PuzzleConfig;
use crate::page::RequestContext;
use crate::{debug, log};

/// Bind, precompile in the background, and answer requests until Ctrl+C.
pub fn serve_site(config: &PuzzleConfig, site: Arc<Site>, runtime: &tokio::runtime::Runtime) -> Result<()> {
    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);
    crate::core::register_server(Arc::clone(&server));
    log!("serve"; "http://{}", addr);

    let precompiling = Arc::clone(&site);
    runtime.spawn(async move {
        if let Err(e) = precompiling.precompile().await {
            log!("error"; "{:#}", e);
        }
    });

    run_request_loop(&server, &site, runtime.handle(), config.serve.workers)
}

fn run_request_loop(server: &Server, site: &Arc<Site>, runtime: &Handle, workers: usize) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .context("failed to create thread pool")?;

    for request in server.incoming_requests() {
        let site = Arc::clone(site);
        let runtime = runtime.clone();
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &site, &runtime) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, site: &Site, runtime: &Handle) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    let context = request_context(&request);
    let Some(page) = site.page_for_url(&context.path).cloned() else {
        debug!("serve"; "{} {} 404", context.method, context.path);
        return response::respond_not_found(request);
    };

    let started = Instant::now();
    let (mut sink, rx) = body::channel();
    let method = context.method.clone();
    let path = context.path.clone();
    runtime.spawn(async move {
        page.handle(&context, &mut sink).await;
    });

    let status = response::respond_composed(request, rx)?;
    log!("serve"; "{} {} {} {:?}", method, path, status, started.elapsed());
    Ok(())
}

fn request_context(request: &Request) -> RequestContext {
    let mut context = RequestContext::new(request.method().as_str(), request.url());
    for header in request.headers() {
        context = context.with_header(header.field.as_str().as_str(), header.value.as_str());
    }
    context
}
