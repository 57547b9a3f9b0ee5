//! Process configuration
//!
//! Read once from the environment at startup and shared immutably afterwards.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

pub const DEFAULT_BOT_USERNAME: &str = "thorunimorebot";
pub const DEFAULT_GROUP_LINK: &str = "https://t.me/joinchat/AYAGH08KHLjBe1QbxNHLwA";
pub const DEFAULT_LOGIN_URL: &str = "https://thor.steffo.eu/";
pub const DEFAULT_SUPPORT_CONTACT: &str = "@Steffo";
pub const DEFAULT_EMAIL_DOMAIN: &str = "studenti.unimore.it";
const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Settings the dialog steps need to phrase their replies
#[derive(Debug, Clone)]
pub struct DialogConfig {
    /// Chat handle of the bot, without the leading `@`
    pub bot_username: String,
    /// Invite link handed out once verification succeeds
    pub group_link: String,
    /// Web page where the identity login starts
    pub login_url: String,
    pub support_contact: String,
    /// Domain appended to a student's e-mail prefix
    pub email_domain: String,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            bot_username: DEFAULT_BOT_USERNAME.to_string(),
            group_link: DEFAULT_GROUP_LINK.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
            support_contact: DEFAULT_SUPPORT_CONTACT.to_string(),
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
        }
    }
}

impl DialogConfig {
    pub fn email_of(&self, email_prefix: &str) -> String {
        format!("{email_prefix}@{}", self.email_domain)
    }

    /// Deep link that opens a private chat with the bot and sends `/start <token>`
    pub fn deep_link(&self, token: &str) -> String {
        format!("https://t.me/{}?start={token}", self.bot_username)
    }
}

/// Full service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Secret the deep-link tokens are sealed with
    pub secret_key: String,
    pub db_path: String,
    pub bind: IpAddr,
    pub port: u16,
    pub dialog: DialogConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret_key = lookup("THOR_SECRET_KEY")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("THOR_SECRET_KEY"))?;

        let db_path = lookup("THOR_DB_PATH").unwrap_or_else(|| {
            let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
            format!("{home}/.thorunimore/thor.db")
        });

        let bind = match lookup("THOR_BIND") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "THOR_BIND",
                value,
            })?,
            None => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };

        let port = match lookup("THOR_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "THOR_PORT",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let defaults = DialogConfig::default();
        let dialog = DialogConfig {
            bot_username: lookup("THOR_BOT_USERNAME")
                .map(|name| name.trim_start_matches('@').to_string())
                .unwrap_or(defaults.bot_username),
            group_link: lookup("THOR_GROUP_LINK").unwrap_or(defaults.group_link),
            login_url: lookup("THOR_LOGIN_URL").unwrap_or(defaults.login_url),
            support_contact: lookup("THOR_SUPPORT_CONTACT").unwrap_or(defaults.support_contact),
            email_domain: lookup("THOR_EMAIL_DOMAIN").unwrap_or(defaults.email_domain),
        };

        Ok(Self {
            secret_key,
            db_path,
            bind,
            port,
            dialog,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
