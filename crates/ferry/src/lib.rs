pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;
pub mod ui;

/// Install the stderr log subscriber. `FERRY_LOG` selects the level (default `warn`).
pub fn init() {
    let level = std::env::var("FERRY_LOG")
        .ok()
        .and_then(|value| value.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::WARN);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}
