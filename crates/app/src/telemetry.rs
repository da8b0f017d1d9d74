//! Tracing subscriber and Prometheus exporter setup for the host binary.
//!
//! Logs go to stderr so stdout stays reserved for JSON results.

use std::{io, net::SocketAddr, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::Subscriber;
use tracing_subscriber::{
    Layer,
    filter::{EnvFilter, filter_fn},
    fmt,
    layer::SubscriberExt,
    prelude::*,
    registry::LookupSpan,
};

use crate::cli::TelemetryOptions;

static METRICS_ADDR: OnceLock<SocketAddr> = OnceLock::new();

/// Keeps the subscriber installed and flushes the Chrome trace on drop.
pub struct TelemetryGuard {
    _default_guard: tracing::subscriber::DefaultGuard,
    _chrome_guard: Option<tracing_chrome::FlushGuard>,
}

/// Install the tracing subscriber for the current thread.
///
/// Worker threads pick it up through `video_ingest::exec::spawn_thread`.
pub fn enter_runtime(opts: &TelemetryOptions) -> TelemetryGuard {
    let chrome = opts
        .chrome_trace_path
        .as_deref()
        .and_then(|path| match build_chrome_layer(path) {
            Ok(parts) => Some(parts),
            Err(err) => {
                eprintln!(
                    "failed to initialise chrome trace writer at {}: {err}",
                    path.display()
                );
                None
            }
        });

    match chrome {
        Some((layer, guard)) => {
            let default_guard = tracing::subscriber::set_default(
                tracing_subscriber::registry()
                    .with(layer.with_filter(filter_fn(|metadata| metadata.is_span())))
                    .with(fmt_layer())
                    .with(tracing_error::ErrorLayer::default()),
            );
            TelemetryGuard {
                _default_guard: default_guard,
                _chrome_guard: Some(guard),
            }
        }
        None => {
            let default_guard = tracing::subscriber::set_default(
                tracing_subscriber::registry()
                    .with(fmt_layer())
                    .with(tracing_error::ErrorLayer::default()),
            );
            TelemetryGuard {
                _default_guard: default_guard,
                _chrome_guard: None,
            }
        }
    }
}

/// Install the global Prometheus recorder serving `addr`. Later calls are no-ops.
pub fn init_metrics(addr: SocketAddr) -> Result<()> {
    if METRICS_ADDR.get().is_some() {
        return Ok(());
    }
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("failed to start the metrics endpoint on {addr}"))?;
    let _ = METRICS_ADDR.set(addr);
    tracing::info!("serving Prometheus metrics on http://{addr}/metrics");
    Ok(())
}

/// Human readable log lines, filtered by `RUST_LOG` (default `info`).
fn fmt_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_filter(env_filter)
}

fn build_chrome_layer(
    path: &Path,
) -> io::Result<(
    tracing_chrome::ChromeLayer<tracing_subscriber::Registry>,
    tracing_chrome::FlushGuard,
)> {
    let file = std::fs::File::create(path)?;
    let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .writer(file)
        .include_args(true)
        .trace_style(tracing_chrome::TraceStyle::Threaded)
        .build();
    Ok((layer, guard))
}
