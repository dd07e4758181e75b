use std::convert::Infallible;
use std::thread;

use spinserve::config::Config;
use spinserve::handler::handler_fn;
use spinserve::http::codec::HttpCodec;
use spinserve::http::request::Request;
use spinserve::http::response::{Response, StatusCode};
use spinserve::poll::ready;
use spinserve::server::{Server, ShutdownHandle};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let server = Server::bind(cfg.clone(), HttpCodec::new(cfg.http.clone()))?;

    watch_ctrl_c(server.shutdown_handle())?;

    server.serve(|| {
        handler_fn(|_req: Request| {
            ready::<_, Infallible>(
                Response::builder(StatusCode::OK)
                    .header("Content-Type", "text/html")
                    .body("<h1>Hello, World</h1>")
                    .build(),
            )
        })
    })?;

    Ok(())
}

/// Trips `handle` on the first Ctrl-C.
fn watch_ctrl_c(handle: ShutdownHandle) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("spinserve-signal".to_string())
        .spawn(move || {
            rt.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutdown signal received");
                    handle.shutdown();
                }
            });
        })?;

    Ok(())
}
