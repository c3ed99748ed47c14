use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    // A second init (e.g. from tests) is harmless; ignore it.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Timing of one command processed by a town actor.
#[derive(Debug, Clone)]
pub struct CommandMetrics {
    pub town: String,
    pub kind: &'static str,
    pub duration_us: u128,
    pub ok: bool,
}

impl CommandMetrics {
    pub const BUDGET_US: u128 = 5_000;

    pub fn over_budget(&self) -> bool {
        self.duration_us > Self::BUDGET_US
    }

    pub fn log(&self) {
        if self.over_budget() {
            tracing::warn!(
                town = %self.town,
                kind = self.kind,
                duration_us = self.duration_us,
                ok = self.ok,
                "command exceeded budget ({}us > {}us)",
                self.duration_us,
                Self::BUDGET_US
            );
        } else {
            tracing::debug!(
                town = %self.town,
                kind = self.kind,
                duration_us = self.duration_us,
                ok = self.ok,
                "command processed"
            );
        }
    }
}
