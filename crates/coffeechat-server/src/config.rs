use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    /// Browser origin allowed by CORS. Permissive when unset.
    pub client_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("COFFEECHAT_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("COFFEECHAT_JWT_SECRET is unset or still a placeholder; it must match the identity provider's signing secret");
        }

        let db_path = get("COFFEECHAT_DB_PATH").unwrap_or_else(|| "coffeechat.db".into());
        let host = get("COFFEECHAT_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("COFFEECHAT_PORT")
            .unwrap_or_else(|| "3001".into())
            .parse()
            .context("COFFEECHAT_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path: db_path.into(),
            addr,
            client_url: get("COFFEECHAT_CLIENT_URL").filter(|url| !url.is_empty()),
        })
    }
}
