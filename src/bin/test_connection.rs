use std::process::ExitCode;
use std::time::Instant;

use farmbot::client::GameConnection;
use farmbot::config::{BotConfig, DIAGNOSTIC_USERNAME};
use farmbot::diagnostics::{
    KickCategory, POLL_INTERVAL, CheckResult, SPAWN_TIMEOUT, await_spawn, troubleshooting,
};
use farmbot::session::{Session, SessionError};

fn main() -> ExitCode {
    println!("=== Minecraft Bot - Connection Tester ===");
    println!();

    let config = match BotConfig::load_as(DIAGNOSTIC_USERNAME) {
        Ok(config) => config,
        Err(e) => {
            println!("[FATAL] {e:#}");
            return ExitCode::FAILURE;
        }
    };

    println!("Testing with configuration:");
    println!("  Host:     {}", config.host);
    println!("  Port:     {}", config.port);
    println!("  Username: {}", config.username);
    println!(
        "  Password: {}",
        if config.password.is_some() {
            "***hidden***"
        } else {
            "none (offline-mode)"
        }
    );
    println!("  Version:  {}", config.version_label());
    println!();
    println!("Attempting to connect...");
    println!();

    let started = Instant::now();
    let mut connection = match GameConnection::connect(&config) {
        Ok(connection) => connection,
        Err(e) => {
            report_error(&e);
            return ExitCode::FAILURE;
        }
    };
    println!("[OK] Connected to server");

    let timeout = SPAWN_TIMEOUT.saturating_sub(started.elapsed());
    match await_spawn(&mut connection, timeout, POLL_INTERVAL) {
        CheckResult::Spawned => {
            let world = connection.world();
            println!("[OK] Bot spawned successfully");
            println!();
            println!("Bot Information:");
            if let Some(id) = world.self_id {
                println!("  Entity ID: {id}");
            }
            if let Some(p) = world.self_position {
                println!("  Position:  X={:.1}, Y={:.1}, Z={:.1}", p.x, p.y, p.z);
            }
            println!("  Dimension: {}", world.dimension);
            println!("  Mode:      {}", world.game_mode);
            println!();
            println!("[OK] All tests passed! Your bot can connect to this server.");
            connection.quit("Connection test complete");
            ExitCode::SUCCESS
        }
        CheckResult::Kicked {
            reason,
            display_reason,
        } => {
            println!("[WARN] Bot was kicked from server");
            println!("Reason: {reason}");
            if let Some(message) = display_reason {
                println!("Message: {message}");
            }
            if let Some(hint) = KickCategory::classify(&reason).hint() {
                println!();
                println!("Possible cause: {hint}");
            }
            ExitCode::FAILURE
        }
        CheckResult::Errored(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
        CheckResult::Ended => {
            println!("[ERROR] Connection ended unexpectedly");
            ExitCode::FAILURE
        }
        CheckResult::TimedOut => {
            println!("[TIMEOUT] Connection took too long (30 seconds)");
            println!("  Possible causes:");
            println!("  - Wrong server IP/port");
            println!("  - Firewall blocking connection");
            println!("  - Server is offline");
            connection.quit("Connection test timed out");
            ExitCode::FAILURE
        }
    }
}

fn report_error(error: &SessionError) {
    println!("[ERROR] Bot error: {error}");
    if let Some(hint) = troubleshooting(error) {
        println!();
        println!("Troubleshooting: {hint}");
    }
}
