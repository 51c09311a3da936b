//! Tracing subscriber setup for the harness binary.

use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Base level from `CAULDRON_LOG`, used when `RUST_LOG` is not set.
fn base_level(value: Option<&str>) -> &'static str {
    match value {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    }
}

fn filter_directives(level: &str) -> String {
    format!("cauldron={level},cauldron_cli={level}")
}

/// Install the global subscriber. Logs go to stderr so reports on stdout stay
/// machine readable; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = base_level(std::env::var("CAULDRON_LOG").ok().as_deref());
        EnvFilter::new(filter_directives(level))
    };

    let output: Box<dyn Layer<Registry> + Send + Sync> =
        if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
            fmt::layer().json().with_writer(std::io::stderr).boxed()
        } else {
            fmt::layer().with_writer(std::io::stderr).boxed()
        };

    // Keeps an already installed subscriber.
    let _ = tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init();
}
