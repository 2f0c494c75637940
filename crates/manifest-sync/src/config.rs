//! Configuration for the manifest sync service.

use std::env;
use std::fmt;
use thiserror::Error;

const DEFAULT_FILE_PATH: &str = "prompt_manifest.json";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_WEB_URL: &str = "https://github.com";
const DEFAULT_PORT: u16 = 8000;

/// Errors raised while loading configuration at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// The repository manifests are published to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCoordinates {
    pub owner: String,
    pub name: String,
    /// Branch direct commits land on and PRs merge into.
    pub base_branch: String,
    /// Path of the manifest file inside the repository.
    pub file_path: String,
}

/// Service configuration, read once at startup and shared read-only.
#[derive(Clone)]
pub struct Config {
    pub repository: RepositoryCoordinates,
    /// GitHub token sent as a bearer credential.
    pub github_token: String,
    /// GitHub REST API base URL.
    pub api_url: String,
    /// GitHub web base URL, used for PR search links.
    pub web_url: String,
    /// HTTP server port.
    pub port: u16,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("repository", &self.repository)
            .field("github_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("web_url", &self.web_url)
            .field("port", &self.port)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if present;
    /// variables already set in the environment win.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case in deployed environments.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            repository: RepositoryCoordinates {
                owner: require("GITHUB_REPO_OWNER")?,
                name: require("GITHUB_REPO_NAME")?,
                base_branch: get("GITHUB_BRANCH").unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
                file_path: get("GITHUB_FILE_PATH")
                    .unwrap_or_else(|| DEFAULT_FILE_PATH.to_string()),
            },
            github_token: require("GITHUB_TOKEN")?,
            api_url: get("GITHUB_API_URL")
                .map_or_else(|| DEFAULT_API_URL.to_string(), |u| trim_url(&u)),
            web_url: get("GITHUB_WEB_URL")
                .map_or_else(|| DEFAULT_WEB_URL.to_string(), |u| trim_url(&u)),
            port,
        })
    }
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("GITHUB_TOKEN", "ghp_test"),
        ("GITHUB_REPO_OWNER", "acme"),
        ("GITHUB_REPO_NAME", "prompts"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.repository.owner, "acme");
        assert_eq!(config.repository.name, "prompts");
        assert_eq!(config.repository.base_branch, "main");
        assert_eq!(config.repository.file_path, "prompt_manifest.json");
        assert_eq!(config.api_url, "https://api.github.com");
        assert_eq!(config.web_url, "https://github.com");
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("GITHUB_BRANCH", "develop"),
            ("GITHUB_FILE_PATH", "config/manifest.json"),
            ("GITHUB_API_URL", "http://127.0.0.1:9000/"),
            ("PORT", "9100"),
        ]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.repository.base_branch, "develop");
        assert_eq!(config.repository.file_path, "config/manifest.json");
        assert_eq!(config.api_url, "http://127.0.0.1:9000");
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn test_missing_required() {
        let vars = [("GITHUB_TOKEN", "t"), ("GITHUB_REPO_OWNER", "acme")];
        assert_eq!(
            Config::from_lookup(lookup(&vars)).unwrap_err(),
            ConfigError::Missing("GITHUB_REPO_NAME")
        );
    }

    #[test]
    fn test_empty_counts_as_missing() {
        let vars = [
            ("GITHUB_TOKEN", "  "),
            ("GITHUB_REPO_OWNER", "acme"),
            ("GITHUB_REPO_NAME", "prompts"),
        ];
        assert_eq!(
            Config::from_lookup(lookup(&vars)).unwrap_err(),
            ConfigError::Missing("GITHUB_TOKEN")
        );
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "eighty"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("ghp_test"));
        assert!(debug.contains("<redacted>"));
    }
}
