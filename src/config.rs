use anyhow::Context;
use std::collections::HashSet;

/// Startup configuration. Loaded once from the environment, shared read-only
/// by every handler for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub tmdb_api_key: String,
    /// Reserved for a ratings lookup; no handler reads it yet.
    #[allow(dead_code)]
    pub omdb_api_key: String,
    authorized_users: HashSet<u64>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bot_token = required("TELOXIDE_TOKEN")?;
        let tmdb_api_key = required("TMDB_API_KEY")?;
        let omdb_api_key = required("OMDB_API_KEY")?;
        let authorized_users = parse_user_ids(&required("AUTH_USER_IDS")?)
            .context("AUTH_USER_IDS is invalid")?;
        Ok(Self {
            bot_token,
            tmdb_api_key,
            omdb_api_key,
            authorized_users,
        })
    }

    pub fn is_authorized(&self, user_id: u64) -> bool {
        self.authorized_users.contains(&user_id)
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} is missing"))
}

/// Comma-separated numeric Telegram user ids, e.g. `"123456,789012"`.
fn parse_user_ids(raw: &str) -> anyhow::Result<HashSet<u64>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .with_context(|| format!("bad user id: {s:?}"))
        })
        .collect::<anyhow::Result<HashSet<u64>>>()?;
    if ids.is_empty() {
        anyhow::bail!("no user ids given");
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_ids() {
        let ids = parse_user_ids("111,222").unwrap();
        assert_eq!(ids, HashSet::from([111, 222]));
    }

    #[test]
    fn tolerates_whitespace_and_trailing_comma() {
        let ids = parse_user_ids(" 111 , 222 ,").unwrap();
        assert_eq!(ids, HashSet::from([111, 222]));
    }

    #[test]
    fn rejects_non_numeric_ids() {
        assert!(parse_user_ids("111,abc").is_err());
    }

    #[test]
    fn rejects_empty_list() {
        assert!(parse_user_ids("").is_err());
        assert!(parse_user_ids(" , ").is_err());
    }

    #[test]
    fn membership_check() {
        let config = Config {
            bot_token: "t".into(),
            tmdb_api_key: "k".into(),
            omdb_api_key: "o".into(),
            authorized_users: HashSet::from([42]),
        };
        assert!(config.is_authorized(42));
        assert!(!config.is_authorized(43));
    }
}
