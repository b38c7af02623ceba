use color_eyre::{eyre::Context, Result};
use tracing_subscriber::{prelude::*, EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

/// Starts Sentry when `SENTRY_DSN` is set. Keep the guard alive for the whole
/// process or events are dropped on exit.
pub fn setup_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok()?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            traces_sample_rate: 0.0,
            ..Default::default()
        },
    ));

    Some(guard)
}

pub fn setup_tracing(crate_name: &str) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        format!("warn,{crate_name}=trace,db=debug,gemini=debug,tower_http=debug")
    });

    let env_filter = EnvFilter::builder()
        .parse(&rust_log)
        .wrap_err_with(|| format!("Couldn't create env filter from {rust_log}"))?;

    let heirarchical = HierarchicalLayer::default()
        .with_writer(std::io::stdout)
        .with_indent_lines(true)
        .with_indent_amount(2)
        .with_thread_names(true)
        .with_thread_ids(true)
        .with_verbose_exit(true)
        .with_verbose_entry(true)
        .with_targets(true);

    Registry::default()
        .with(heirarchical)
        .with(sentry_tracing::layer())
        .with(env_filter)
        .try_init()
        .wrap_err("Failed to install tracing subscriber")?;

    Ok(())
}
