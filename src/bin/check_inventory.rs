use std::process::ExitCode;
use std::time::{Duration, Instant};

use farmbot::client::GameConnection;
use farmbot::config::{BotConfig, DIAGNOSTIC_USERNAME};
use farmbot::diagnostics::{
    InventoryReport, POLL_INTERVAL, CheckResult, SPAWN_TIMEOUT, await_spawn, settle,
};
use farmbot::session::Session;

/// Inventory packets trail the spawn.
const INVENTORY_WAIT: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    println!("=== Bot Inventory & Equipment Checker ===");
    println!();

    let config = match BotConfig::load_as(DIAGNOSTIC_USERNAME) {
        Ok(config) => config,
        Err(e) => {
            println!("[FATAL] {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let started = Instant::now();
    let mut connection = match GameConnection::connect(&config) {
        Ok(connection) => connection,
        Err(e) => {
            println!("[ERROR] {e}");
            return ExitCode::FAILURE;
        }
    };

    let timeout = SPAWN_TIMEOUT.saturating_sub(started.elapsed());
    let result = match await_spawn(&mut connection, timeout, POLL_INTERVAL) {
        CheckResult::Spawned => {
            println!("[OK] Connected to server and spawned!");
            println!();
            settle(&mut connection, INVENTORY_WAIT, POLL_INTERVAL)
        }
        other => Some(other),
    };

    match result {
        None => {
            println!("{}", InventoryReport::from_session(&connection));
            connection.quit("Inventory check complete");
            ExitCode::SUCCESS
        }
        Some(CheckResult::Kicked { reason, .. }) => {
            println!("[ERROR] Kicked: {reason}");
            ExitCode::FAILURE
        }
        Some(CheckResult::Errored(e)) => {
            println!("[ERROR] {e}");
            ExitCode::FAILURE
        }
        Some(CheckResult::TimedOut) => {
            println!("[TIMEOUT] Took too long to connect");
            connection.quit("Inventory check timed out");
            ExitCode::FAILURE
        }
        Some(CheckResult::Spawned | CheckResult::Ended) => {
            println!("[ERROR] Connection ended unexpectedly");
            ExitCode::FAILURE
        }
    }
}
