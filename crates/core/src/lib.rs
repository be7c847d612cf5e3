pub mod analysis;
pub mod domain;
pub mod error;
pub mod llm;
pub mod movers;
pub mod narrative;
pub mod news;
pub mod prices;
pub mod sentiment;
pub mod session;
pub mod universe;

pub mod config {
    use anyhow::Context;
    use std::path::Path;

    pub const DEFAULT_SECRETS_FILE: &str = ".streamlit/secrets.toml";

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub llm_provider: Option<String>,
        pub gemini_api_key: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub hf_api_token: Option<String>,
        pub sentry_dsn: Option<String>,
        pub price_provider_base_url: Option<String>,
        pub sentiment_base_url: Option<String>,
    }

    impl Settings {
        /// Reads the secrets file (`SECRETS_FILE`, default `.streamlit/secrets.toml`) first
        /// and falls back to environment variables for keys it does not carry.
        pub fn from_env() -> anyhow::Result<Self> {
            let path =
                non_empty_var("SECRETS_FILE").unwrap_or_else(|| DEFAULT_SECRETS_FILE.to_string());
            let secrets = match Secrets::load(Path::new(&path)) {
                Ok(secrets) => secrets.unwrap_or_default(),
                Err(e) => {
                    tracing::warn!(%path, error = %e, "secrets file unreadable; using environment");
                    Secrets::default()
                }
            };

            Ok(Self::from_lookup(|key| secrets.get(key).or_else(|| non_empty_var(key))))
        }

        fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
            Self {
                llm_provider: lookup("LLM_PROVIDER"),
                gemini_api_key: lookup("GEMINI_API_KEY"),
                anthropic_api_key: lookup("ANTHROPIC_API_KEY"),
                hf_api_token: lookup("HF_API_TOKEN"),
                sentry_dsn: lookup("SENTRY_DSN"),
                price_provider_base_url: lookup("PRICE_PROVIDER_BASE_URL"),
                sentiment_base_url: lookup("SENTIMENT_BASE_URL"),
            }
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .context("GEMINI_API_KEY is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }
    }

    /// Top-level string keys of a TOML secrets file.
    #[derive(Debug, Clone, Default)]
    pub struct Secrets {
        values: toml::Table,
    }

    impl Secrets {
        pub fn parse(content: &str) -> anyhow::Result<Self> {
            let values =
                toml::from_str::<toml::Table>(content).context("secrets file is not valid TOML")?;
            Ok(Self { values })
        }

        /// `Ok(None)` when the file does not exist.
        pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
            match std::fs::read_to_string(path) {
                Ok(content) => Self::parse(&content)
                    .with_context(|| format!("failed to load {}", path.display()))
                    .map(Some),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
            }
        }

        pub fn get(&self, key: &str) -> Option<String> {
            self.values
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        }
    }

    // Blank values in .env files count as unset.
    pub(crate) fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
        std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::collections::HashMap;

        const SAMPLE: &str = r#"
GEMINI_API_KEY = "from-file"
HF_API_TOKEN = "   "
PORT = 8080

[connections]
GEMINI_API_KEY = "nested-is-ignored"
"#;

        #[test]
        fn secrets_parse_top_level_strings_only() {
            let secrets = Secrets::parse(SAMPLE).unwrap();
            assert_eq!(secrets.get("GEMINI_API_KEY").as_deref(), Some("from-file"));
            assert_eq!(secrets.get("HF_API_TOKEN"), None);
            assert_eq!(secrets.get("PORT"), None);
            assert_eq!(secrets.get("MISSING"), None);
        }

        #[test]
        fn invalid_secrets_file_is_an_error() {
            assert!(Secrets::parse("GEMINI_API_KEY = ").is_err());
        }

        #[test]
        fn missing_secrets_file_is_not_an_error() {
            let path = Path::new("definitely/not/here/secrets.toml");
            assert!(Secrets::load(path).unwrap().is_none());
        }

        #[test]
        fn secrets_file_wins_over_environment() {
            let secrets = Secrets::parse(SAMPLE).unwrap();
            let env: HashMap<&str, &str> = HashMap::from([
                ("GEMINI_API_KEY", "from-env"),
                ("HF_API_TOKEN", "hf-from-env"),
                ("ANTHROPIC_API_KEY", "a-from-env"),
            ]);

            let settings = Settings::from_lookup(|key| {
                secrets
                    .get(key)
                    .or_else(|| env.get(key).map(|v| v.to_string()))
            });

            assert_eq!(settings.gemini_api_key.as_deref(), Some("from-file"));
            assert_eq!(settings.hf_api_token.as_deref(), Some("hf-from-env"));
            assert_eq!(settings.anthropic_api_key.as_deref(), Some("a-from-env"));
            assert_eq!(settings.sentry_dsn, None);
        }

        #[test]
        fn blank_environment_values_count_as_unset() {
            std::env::set_var("SPIKE_CORE_TEST_BLANK_VALUE", "   ");
            assert_eq!(non_empty_var("SPIKE_CORE_TEST_BLANK_VALUE"), None);
            std::env::set_var("SPIKE_CORE_TEST_SET_VALUE", " x ");
            assert_eq!(non_empty_var("SPIKE_CORE_TEST_SET_VALUE").as_deref(), Some("x"));
        }
    }
}
