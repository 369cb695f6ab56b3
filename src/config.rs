use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::ssrf::{DEFAULT_ALLOWED_HOSTNAMES, DEFAULT_ALLOWED_NETWORKS, SsrfPolicy};

/// Main configuration structure loaded from ctf_gallery.toml and environment variables
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    pub public: PublicConfig,
    pub admin: AdminConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Public image gallery and fetch proxy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublicConfig {
    pub bind: SocketAddr,
    pub allowed_networks: Vec<String>,
    pub allowed_hostnames: Vec<String>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// localhost/127.0.0.1 on this port is rewritten to `admin_upstream`
    pub admin_alias_port: u16,
    pub admin_upstream: String,
    /// Where the Swagger UI is pinned when proxied
    pub spec_url: String,
    pub thumbs_dir: PathBuf,
}

impl Default for PublicConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            allowed_networks: DEFAULT_ALLOWED_NETWORKS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_hostnames: DEFAULT_ALLOWED_HOSTNAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            user_agent: "CTF-Fetcher/1.0".to_string(),
            request_timeout_secs: 10,
            admin_alias_port: 9000,
            admin_upstream: "admin_api:9000".to_string(),
            spec_url: "http://localhost:9000/openapi/openapi.json".to_string(),
            thumbs_dir: PathBuf::from("static/thumbs"),
        }
    }
}

/// Internal admin API
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub bind: SocketAddr,
    pub templates_dir: PathBuf,
    pub pages_dir: PathBuf,
    pub log_dir: PathBuf,
    pub status_dir: PathBuf,
    pub max_template_bytes: usize,
    /// Characters of each submission kept in the submissions log
    pub log_truncate: usize,
    /// Case-insensitive substrings rejected before rendering
    pub forbidden_keywords: Vec<String>,
    /// Seeded with the stage flag at startup when set
    pub flag_file: Option<PathBuf>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 9000)),
            templates_dir: PathBuf::from("templates"),
            pages_dir: PathBuf::from("pages"),
            log_dir: PathBuf::from("/var/log/ctf_admin"),
            status_dir: PathBuf::from("/var/ctf_status"),
            max_template_bytes: 64 * 1024,
            log_truncate: 2000,
            forbidden_keywords: Vec::new(),
            flag_file: None,
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "ctf_gallery=info,tower_http=info".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn load_from_env() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "ctf_gallery=info,tower_http=info".to_string()),
        }
    }
}

fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses CTF_GALLERY_CONFIG environment variable or defaults to "ctf_gallery.toml"
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(env_path) = std::env::var("CTF_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::dotenv();
        }

        let config_path = std::env::var("CTF_GALLERY_CONFIG")
            .unwrap_or_else(|_| "ctf_gallery.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            toml::from_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();
        config.runtime = RuntimeConfig::load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply CTF_* environment overrides (env-first)
    pub fn apply_env_overrides(&mut self) {
        if let Some(bind) = env_parse::<SocketAddr>("CTF_PUBLIC_BIND") {
            self.public.bind = bind;
        }
        if let Some(bind) = env_parse::<SocketAddr>("CTF_ADMIN_BIND") {
            self.admin.bind = bind;
        }
        if let Some(hosts) = env_list("CTF_ALLOWED_HOSTNAMES") {
            self.public.allowed_hostnames = hosts;
        }
        if let Some(nets) = env_list("CTF_ALLOWED_NETWORKS") {
            self.public.allowed_networks = nets;
        }
        if let Some(timeout) = env_parse::<u64>("CTF_FETCH_TIMEOUT_SECS") {
            self.public.request_timeout_secs = timeout;
        }
        if let Ok(ua) = std::env::var("CTF_USER_AGENT") {
            self.public.user_agent = ua;
        }
        if let Ok(upstream) = std::env::var("CTF_ADMIN_UPSTREAM") {
            self.public.admin_upstream = upstream;
        }
        if let Ok(dir) = std::env::var("CTF_TEMPLATES_DIR") {
            self.admin.templates_dir = dir.into();
        }
        if let Ok(dir) = std::env::var("CTF_PAGES_DIR") {
            self.admin.pages_dir = dir.into();
        }
        if let Ok(dir) = std::env::var("CTF_LOG_DIR") {
            self.admin.log_dir = dir.into();
        }
        if let Ok(dir) = std::env::var("CTF_STATUS_DIR") {
            self.admin.status_dir = dir.into();
        }
        if let Some(max) = env_parse::<usize>("CTF_MAX_TEMPLATE_BYTES") {
            self.admin.max_template_bytes = max;
        }
        if let Some(words) = env_list("CTF_FORBIDDEN_KEYWORDS") {
            self.admin.forbidden_keywords = words;
        }
        if let Ok(path) = std::env::var("CTF_FLAG_FILE") {
            self.admin.flag_file = Some(path.into());
        }
    }

    /// Validate and clamp; fails on unparsable networks or a zero template limit
    pub fn validate(&mut self) -> anyhow::Result<()> {
        if self.public.request_timeout_secs == 0 {
            self.public.request_timeout_secs = 1;
        } else if self.public.request_timeout_secs > 120 {
            tracing::warn!(
                "request_timeout_secs {} exceeds max 120, clamping to 120",
                self.public.request_timeout_secs
            );
            self.public.request_timeout_secs = 120;
        }

        if self.admin.max_template_bytes == 0 {
            anyhow::bail!("max_template_bytes must be > 0");
        }

        self.ssrf_policy()?;

        if url::Url::parse(&self.public.spec_url).is_err() {
            tracing::warn!("spec_url '{}' is not an absolute URL", self.public.spec_url);
        }
        Ok(())
    }

    pub fn ssrf_policy(&self) -> anyhow::Result<SsrfPolicy> {
        SsrfPolicy::new(
            &self.public.allowed_networks,
            self.public.allowed_hostnames.iter().cloned(),
        )
        .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_stock_deployment() {
        let config = Config::default();
        assert_eq!(config.public.bind.port(), 8080);
        assert_eq!(config.admin.bind.port(), 9000);
        assert_eq!(config.public.user_agent, "CTF-Fetcher/1.0");
        assert_eq!(config.admin.max_template_bytes, 65536);
        assert!(
            config
                .public
                .allowed_hostnames
                .contains(&"res.cloudinary.com".to_string())
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [public]
            request_timeout_secs = 3
            allowed_hostnames = ["admin-api"]

            [admin]
            forbidden_keywords = ["lookup"]
            "#,
        )
        .unwrap();
        assert_eq!(config.public.request_timeout_secs, 3);
        assert_eq!(config.public.allowed_hostnames, vec!["admin-api"]);
        assert_eq!(config.public.allowed_networks.len(), 4);
        assert_eq!(config.admin.forbidden_keywords, vec!["lookup"]);
        assert_eq!(config.admin.log_truncate, 2000);
    }

    #[test]
    fn validate_clamps_timeout_and_rejects_bad_networks() {
        let mut config = Config::default();
        config.public.request_timeout_secs = 900;
        config.validate().unwrap();
        assert_eq!(config.public.request_timeout_secs, 120);

        config.public.allowed_networks.push("10.0.0.0/99".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_template_limit_is_rejected() {
        let mut config = Config::default();
        config.admin.max_template_bytes = 0;
        assert!(config.validate().is_err());
    }
}
