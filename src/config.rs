use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, ensure};
use bevy::prelude::Resource;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

/// Optional settings file in the working directory, e.g. `farmbot.toml`.
pub const CONFIG_FILE: &str = "farmbot";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 25565;
pub const DEFAULT_USERNAME: &str = "AFKBot";
/// Used by the diagnostic tools so they do not kick a running bot.
pub const DIAGNOSTIC_USERNAME: &str = "TestBot";
pub const DEFAULT_ATTACK_RADIUS: f64 = 3.0;
pub const DEFAULT_ATTACK_SPEED_SECS: f64 = 0.01;
pub const DEFAULT_RECONNECT_DELAY_SECS: f64 = 10.0;
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Startup configuration. Never mutated after load.
#[derive(Resource, Debug, Clone)]
pub struct BotConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Account password. None connects in offline mode.
    pub password: Option<String>,
    /// Password for an auth plugin's `/login` command. None disables auto-login.
    pub login_password: Option<String>,
    pub attack_radius: f64,
    pub tick_interval: Duration,
    pub debug: bool,
    /// None lets the gateway autodetect.
    pub protocol_version: Option<String>,
    /// Skip the attack when no weapon could be equipped.
    pub require_weapon: bool,
    pub reconnect_delay: Duration,
    /// When set, reconnect delays double up to this cap.
    pub reconnect_max_delay: Option<Duration>,
    pub connect_timeout: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: None,
            login_password: None,
            attack_radius: DEFAULT_ATTACK_RADIUS,
            tick_interval: Duration::from_secs_f64(DEFAULT_ATTACK_SPEED_SECS),
            debug: false,
            protocol_version: None,
            require_weapon: false,
            reconnect_delay: Duration::from_secs_f64(DEFAULT_RECONNECT_DELAY_SECS),
            reconnect_max_delay: None,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

/// Keys as they appear in the environment, lowercased.
#[derive(Deserialize)]
struct RawConfig {
    server_ip: String,
    server_port: u16,
    bot_username: String,
    bot_password: Option<String>,
    login_password: Option<String>,
    mob_attack_distance: f64,
    attack_speed: f64,
    /// Only "true" enables debug output; other values such as `app:*` are off.
    debug: String,
    minecraft_version: Option<String>,
    require_weapon: bool,
    reconnect_delay: f64,
    reconnect_max_delay: Option<f64>,
}

impl BotConfig {
    /// Defaults, then `farmbot.toml` if present, then the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_as(DEFAULT_USERNAME)
    }

    /// Like `load` with a different username when none is configured.
    pub fn load_as(default_username: &str) -> anyhow::Result<Self> {
        let builder = defaults(default_username)?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::default().ignore_empty(true));
        Self::from_builder(builder)
    }

    /// Like `load`, reading variables from `vars` instead of the environment
    /// and skipping the settings file.
    pub fn from_vars(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        Self::from_vars_as(vars, DEFAULT_USERNAME)
    }

    pub fn from_vars_as(
        vars: HashMap<String, String>,
        default_username: &str,
    ) -> anyhow::Result<Self> {
        let builder = defaults(default_username)?.add_source(
            Environment::default()
                .source(Some(vars.into_iter().collect()))
                .ignore_empty(true),
        );
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
        let raw: RawConfig = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration value")?;

        ensure!(
            raw.mob_attack_distance.is_finite() && raw.mob_attack_distance >= 0.0,
            "MOB_ATTACK_DISTANCE must be a non-negative number, got {}",
            raw.mob_attack_distance
        );
        ensure!(
            raw.attack_speed.is_finite() && raw.attack_speed > 0.0,
            "ATTACK_SPEED must be a positive number of seconds, got {}",
            raw.attack_speed
        );
        ensure!(
            raw.reconnect_delay.is_finite() && raw.reconnect_delay >= 0.0,
            "RECONNECT_DELAY must be a non-negative number of seconds, got {}",
            raw.reconnect_delay
        );
        if let Some(max) = raw.reconnect_max_delay {
            ensure!(
                max.is_finite() && max >= raw.reconnect_delay,
                "RECONNECT_MAX_DELAY must be at least RECONNECT_DELAY ({}), got {max}",
                raw.reconnect_delay
            );
        }

        Ok(BotConfig {
            host: raw.server_ip,
            port: raw.server_port,
            username: raw.bot_username,
            password: raw.bot_password.filter(|p| !p.is_empty()),
            login_password: raw.login_password.filter(|p| !p.is_empty()),
            attack_radius: raw.mob_attack_distance,
            tick_interval: Duration::from_secs_f64(raw.attack_speed),
            debug: raw.debug.trim().eq_ignore_ascii_case("true"),
            protocol_version: raw
                .minecraft_version
                .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("auto")),
            require_weapon: raw.require_weapon,
            reconnect_delay: Duration::from_secs_f64(raw.reconnect_delay),
            reconnect_max_delay: raw.reconnect_max_delay.map(Duration::from_secs_f64),
            connect_timeout: CONNECT_TIMEOUT,
        })
    }

    /// Version string for display.
    pub fn version_label(&self) -> &str {
        self.protocol_version.as_deref().unwrap_or("auto")
    }
}

fn defaults(username: &str) -> anyhow::Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("server_ip", DEFAULT_HOST)?
        .set_default("server_port", DEFAULT_PORT as i64)?
        .set_default("bot_username", username)?
        .set_default("mob_attack_distance", DEFAULT_ATTACK_RADIUS)?
        .set_default("attack_speed", DEFAULT_ATTACK_SPEED_SECS)?
        .set_default("debug", "false")?
        .set_default("require_weapon", false)?
        .set_default("reconnect_delay", DEFAULT_RECONNECT_DELAY_SECS)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = BotConfig::from_vars(HashMap::new()).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 25565);
        assert_eq!(config.username, "AFKBot");
        assert_eq!(config.password, None);
        assert_eq!(config.login_password, None);
        assert_eq!(config.attack_radius, 3.0);
        assert_eq!(config.tick_interval, Duration::from_millis(10));
        assert!(!config.debug);
        assert!(!config.require_weapon);
        assert_eq!(config.reconnect_delay, Duration::from_secs(10));
        assert_eq!(config.reconnect_max_delay, None);
        assert_eq!(config.version_label(), "auto");
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = BotConfig::from_vars(vars(&[
            ("SERVER_IP", "play.example.net"),
            ("SERVER_PORT", "25570"),
            ("BOT_USERNAME", "Farmer"),
            ("BOT_PASSWORD", "0012"),
            ("LOGIN_PASSWORD", "hunter2"),
            ("MOB_ATTACK_DISTANCE", "4.5"),
            ("ATTACK_SPEED", "0.5"),
            ("DEBUG", "true"),
            ("MINECRAFT_VERSION", "1.21.1"),
            ("REQUIRE_WEAPON", "true"),
        ]))
        .unwrap();
        assert_eq!(config.host, "play.example.net");
        assert_eq!(config.port, 25570);
        assert_eq!(config.username, "Farmer");
        // Numeric-looking passwords are kept verbatim.
        assert_eq!(config.password.as_deref(), Some("0012"));
        assert_eq!(config.login_password.as_deref(), Some("hunter2"));
        assert_eq!(config.attack_radius, 4.5);
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert!(config.debug);
        assert_eq!(config.version_label(), "1.21.1");
        assert!(config.require_weapon);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = BotConfig::from_vars(vars(&[
            ("BOT_PASSWORD", ""),
            ("LOGIN_PASSWORD", ""),
            ("MOB_ATTACK_DISTANCE", ""),
        ]))
        .unwrap();
        assert_eq!(config.password, None);
        assert_eq!(config.login_password, None);
        assert_eq!(config.attack_radius, 3.0);
    }

    #[test]
    fn auto_version_means_autodetect() {
        let config = BotConfig::from_vars(vars(&[("MINECRAFT_VERSION", "auto")])).unwrap();
        assert_eq!(config.protocol_version, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(BotConfig::from_vars(vars(&[("SERVER_PORT", "not-a-port")])).is_err());
        assert!(BotConfig::from_vars(vars(&[("ATTACK_SPEED", "0")])).is_err());
        assert!(BotConfig::from_vars(vars(&[("MOB_ATTACK_DISTANCE", "-1")])).is_err());
        assert!(BotConfig::from_vars(vars(&[("RECONNECT_MAX_DELAY", "5")])).is_err());
    }

    #[test]
    fn debug_is_on_only_for_true() {
        for value in ["true", "TRUE", "True"] {
            let config = BotConfig::from_vars(vars(&[("DEBUG", value)])).unwrap();
            assert!(config.debug, "{value}");
        }
        for value in ["app:*", "1", "yes", "false"] {
            let config = BotConfig::from_vars(vars(&[("DEBUG", value)])).unwrap();
            assert!(!config.debug, "{value}");
        }
    }

    #[test]
    fn diagnostic_tools_default_to_their_own_username() {
        let config = BotConfig::from_vars_as(HashMap::new(), DIAGNOSTIC_USERNAME).unwrap();
        assert_eq!(config.username, "TestBot");

        let config =
            BotConfig::from_vars_as(vars(&[("BOT_USERNAME", "Farmer")]), DIAGNOSTIC_USERNAME)
                .unwrap();
        assert_eq!(config.username, "Farmer");
    }
}
