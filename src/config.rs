use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SeedKind {
    /// Mock school: staff, 20 students, classes, catalogs and records.
    Demo,
    /// Only the super-admin account.
    Bootstrap,
    Empty,
}

#[derive(Debug, Parser, Clone)]
#[clap(name = "disiplind", version, about = "School discipline tracking sidecar")]
pub struct Config {
    /// Folder holding the persisted session and settings.
    #[clap(long, env = "DISIPLIND_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    #[clap(long, env = "DISIPLIND_SEED", value_enum, default_value_t = SeedKind::Demo)]
    pub seed: SeedKind,

    /// Delay applied to login, logout, password and backup flows.
    #[clap(long, env = "DISIPLIND_SIMULATED_LATENCY_MS", default_value_t = 1000)]
    pub simulated_latency_ms: u64,

    #[clap(long, env = "DISIPLIND_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

/// Logs go to stderr; stdout carries IPC responses only.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level)
        .unwrap_or_else(|_| EnvFilter::new(format!("disiplind={level}")));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(false),
        )
        .try_init();
}
