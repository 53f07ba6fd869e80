mod access;
mod activity;
mod backup;
mod calc;
mod config;
mod db;
mod errors;
mod export;
mod facade;
mod import;
mod ipc;
mod model;
mod seed;
mod store;

use clap::Parser;
use std::io::{self, BufRead, Write};

use crate::config::Config;
use crate::facade::Dashboard;

fn main() {
    let config = Config::parse();
    config::init_tracing(&config.log_level);

    let today = chrono::Local::now().date_naive();
    let store = match seed::build(config.seed, today) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to build seed data");
            std::process::exit(1);
        }
    };
    let mut state = ipc::AppState {
        dashboard: Dashboard::new(store, config.simulated_latency()),
    };
    if let Some(path) = &config.workspace {
        if let Err(e) = state.dashboard.open_workspace(path) {
            tracing::error!(error = %e, path = %path.to_string_lossy(), "failed to open workspace");
            std::process::exit(1);
        }
    }
    tracing::info!(seed = ?config.seed, version = env!("CARGO_PKG_VERSION"), "disiplind ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to answer to.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        tracing::debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
