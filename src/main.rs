use std::{panic, process};

use bevy::{
    app::{ScheduleRunnerPlugin, TerminalCtrlCHandlerPlugin},
    log::{Level, LogPlugin},
    prelude::*,
    state::app::StatesPlugin,
};
use farmbot::{BotPlugin, client::SessionGuard, config::BotConfig, frame_time};

fn main() -> AppExit {
    let config = match BotConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[FATAL] {e:#}");
            return AppExit::error();
        }
    };

    print_banner(&config);

    let guard = SessionGuard::default();
    let panic_guard = guard.clone();
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        error!("[FATAL] {info}");
        if panic_guard.close("Bot crashed") {
            error!("Closed the game session");
        }
        default_hook(info);
        process::exit(1);
    }));

    let level = if config.debug { Level::DEBUG } else { Level::INFO };
    App::new()
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(frame_time(&config))),
            LogPlugin {
                level,
                ..default()
            },
            StatesPlugin,
            TerminalCtrlCHandlerPlugin,
        ))
        .insert_resource(guard)
        .add_plugins(BotPlugin::new(config))
        .run()
}

fn print_banner(config: &BotConfig) {
    println!("Minecraft AFK farm bot");
    println!("  Server:   {}:{}", config.host, config.port);
    println!("  Username: {}", config.username);
    println!(
        "  Password: {}",
        if config.password.is_some() {
            "***hidden***"
        } else {
            "none (offline-mode)"
        }
    );
    println!(
        "  Auto-login: {}",
        if config.login_password.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Version:  {}", config.version_label());
    println!("  Attack radius: {} blocks", config.attack_radius);
    println!("  Attack interval: {:?}", config.tick_interval);
    println!();
}
