use std::collections::HashSet;

use teloxide::types::ChatId;
use url::Url;

const DEFAULT_DATABASE_URL: &str = "sqlite:submissions.sqlite";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Everything the bot needs to know that isn't hardcoded. Built once on
/// startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    /// Public channel approved submissions get posted to.
    pub channel_id: ChatId,
    /// Chats that receive submissions for review. Also the only users allowed
    /// to press the buttons.
    pub admin_chat_ids: Vec<ChatId>,
    pub database_url: String,
    /// Link appended to every channel post. `None` until the bot's username
    /// is known, see [`Config::with_bot_username`].
    pub call_to_action_url: Option<Url>,
}

impl Config {
    /// Read the config from the process environment, loading a `.env` file
    /// first if there is one.
    pub fn from_env() -> Result<Config, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => log::info!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => log::warn!("Failed to load .env file: {e}"),
        }
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the config out of whatever `lookup` returns for each variable name.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let required = |var: &'static str| {
            lookup(var)
                .map(|x| x.trim().to_string())
                .filter(|x| !x.is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let bot_token = required("BOT_TOKEN")?;

        let channel_id = required("CHANNEL_ID")?;
        let channel_id = ChatId(parse_chat_id("CHANNEL_ID", &channel_id)?);

        let admin_chat_ids = parse_admin_list(&required("ADMIN_CHAT_IDS")?)?;

        let database_url = lookup("DATABASE_URL")
            .filter(|x| !x.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let call_to_action_url = match lookup("CALL_TO_ACTION_URL") {
            Some(url) if !url.trim().is_empty() => {
                Some(Url::parse(url.trim()).map_err(|e| ConfigError::Invalid {
                    var: "CALL_TO_ACTION_URL",
                    reason: e.to_string(),
                })?)
            }
            _ => None,
        };

        Ok(Config {
            bot_token,
            channel_id,
            admin_chat_ids,
            database_url,
            call_to_action_url,
        })
    }

    /// Fill in the call-to-action link pointing at the bot itself, unless one
    /// was configured explicitly.
    pub fn with_bot_username(mut self, username: &str) -> Result<Config, ConfigError> {
        if self.call_to_action_url.is_none() {
            let url = format!("https://t.me/{username}?start=send");
            self.call_to_action_url = Some(Url::parse(&url).map_err(|e| ConfigError::Invalid {
                var: "CALL_TO_ACTION_URL",
                reason: format!("bad bot username {username:?}: {e}"),
            })?);
        }
        Ok(self)
    }

    pub fn is_admin(&self, chat: ChatId) -> bool {
        self.admin_chat_ids.contains(&chat)
    }
}

fn parse_chat_id(var: &'static str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        reason: format!("{value:?} is not a chat ID"),
    })
}

/// Comma separated, blanks ignored, duplicates dropped.
fn parse_admin_list(value: &str) -> Result<Vec<ChatId>, ConfigError> {
    let mut seen = HashSet::new();
    let mut admins = Vec::new();

    for part in value.split(',').map(str::trim).filter(|x| !x.is_empty()) {
        let id = ChatId(parse_chat_id("ADMIN_CHAT_IDS", part)?);
        if seen.insert(id) {
            admins.push(id);
        }
    }

    if admins.is_empty() {
        return Err(ConfigError::Invalid {
            var: "ADMIN_CHAT_IDS",
            reason: "no admin chat IDs listed".to_string(),
        });
    }

    Ok(admins)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|x| x.to_string())
    }

    #[test]
    fn full_config() {
        let config = Config::from_vars(lookup(&[
            ("BOT_TOKEN", "123:abc"),
            ("CHANNEL_ID", "-1002573803802"),
            ("ADMIN_CHAT_IDS", " 42, ,1337,42,"),
            ("DATABASE_URL", "sqlite:elsewhere.sqlite"),
        ]))
        .unwrap();

        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.channel_id, ChatId(-1002573803802));
        assert_eq!(config.admin_chat_ids, vec![ChatId(42), ChatId(1337)]);
        assert_eq!(config.database_url, "sqlite:elsewhere.sqlite");
        assert!(config.is_admin(ChatId(1337)));
        assert!(!config.is_admin(ChatId(7)));

        let config = config.with_bot_username("relay_bot").unwrap();
        assert_eq!(
            config.call_to_action_url.unwrap().as_str(),
            "https://t.me/relay_bot?start=send"
        );
    }

    #[test]
    fn defaults_and_overrides() {
        let config = Config::from_vars(lookup(&[
            ("BOT_TOKEN", "123:abc"),
            ("CHANNEL_ID", "-100"),
            ("ADMIN_CHAT_IDS", "1"),
            ("CALL_TO_ACTION_URL", "https://example.com/send"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);

        // Explicit link wins over the username one.
        let config = config.with_bot_username("relay_bot").unwrap();
        assert_eq!(
            config.call_to_action_url.unwrap().as_str(),
            "https://example.com/send"
        );
    }

    #[test]
    fn bad_configs() {
        assert!(matches!(
            Config::from_vars(lookup(&[("CHANNEL_ID", "-100"), ("ADMIN_CHAT_IDS", "1")])),
            Err(ConfigError::Missing("BOT_TOKEN"))
        ));
        assert!(matches!(
            Config::from_vars(lookup(&[
                ("BOT_TOKEN", "t"),
                ("CHANNEL_ID", "@channel"),
                ("ADMIN_CHAT_IDS", "1")
            ])),
            Err(ConfigError::Invalid { var: "CHANNEL_ID", .. })
        ));
        assert!(matches!(
            Config::from_vars(lookup(&[
                ("BOT_TOKEN", "t"),
                ("CHANNEL_ID", "-100"),
                ("ADMIN_CHAT_IDS", " , ")
            ])),
            Err(ConfigError::Invalid { var: "ADMIN_CHAT_IDS", .. })
        ));
        assert!(matches!(
            Config::from_vars(lookup(&[
                ("BOT_TOKEN", "t"),
                ("CHANNEL_ID", "-100"),
                ("ADMIN_CHAT_IDS", "1,two")
            ])),
            Err(ConfigError::Invalid { var: "ADMIN_CHAT_IDS", .. })
        ));
    }
}
