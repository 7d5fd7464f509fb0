pub mod analysis;
pub mod domain;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod resilience;
pub mod storage;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_MARKET_CAP_CEILING: f64 = 500_000_000.0;
    const DEFAULT_SMTP_PORT: u16 = 465;
    const DEFAULT_REPORT_DIR: &str = "reports";
    const DEFAULT_SEC_USER_AGENT: &str = "sitscout research (ops@sitscout.local)";
    const DEFAULT_LLM_MAX_PER_SECOND: f64 = 5.0;

    const REQUIRED_KEYS: [&str; 5] = [
        "OPENROUTER_API_KEY",
        "EXA_API_KEY",
        "FAST_LLM",
        "SMART_LLM",
        "RSS_FEEDS",
    ];
    const EMAIL_KEYS: [&str; 4] = [
        "SMTP_SERVER",
        "EMAIL_SENDER",
        "EMAIL_PASSWORD",
        "EMAIL_RECIPIENT",
    ];

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ReportChannel {
        Email,
        File,
        Postgres,
    }

    impl ReportChannel {
        fn parse(raw: &str) -> anyhow::Result<Self> {
            match raw.trim().to_ascii_lowercase().as_str() {
                "email" | "smtp" => Ok(Self::Email),
                "file" => Ok(Self::File),
                "postgres" | "db" | "database" => Ok(Self::Postgres),
                other => anyhow::bail!("unknown REPORT_CHANNEL {other:?} (expected email|file|postgres)"),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub openrouter_api_key: Option<String>,
        pub openrouter_base_url: Option<String>,
        pub exa_api_key: Option<String>,
        pub fast_llm: Option<String>,
        pub smart_llm: Option<String>,
        pub rss_feeds: Vec<String>,
        pub smtp_server: Option<String>,
        pub smtp_port: u16,
        pub email_sender: Option<String>,
        pub email_password: Option<String>,
        pub email_recipient: Option<String>,
        pub report_channel: ReportChannel,
        pub report_dir: String,
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub market_cap_ceiling: f64,
        pub sec_user_agent: String,
        pub llm_max_per_second: f64,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Builds settings from an arbitrary key lookup. Blank values count as unset.
        pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
        where
            F: Fn(&str) -> Option<String>,
        {
            let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

            let smtp_port = match get("SMTP_PORT") {
                Some(raw) => raw
                    .trim()
                    .parse::<u16>()
                    .with_context(|| format!("SMTP_PORT must be a port number (got {raw:?})"))?,
                None => DEFAULT_SMTP_PORT,
            };

            let market_cap_ceiling = match get("MARKET_CAP_CEILING") {
                Some(raw) => raw.trim().replace('_', "").parse::<f64>().with_context(|| {
                    format!("MARKET_CAP_CEILING must be a number (got {raw:?})")
                })?,
                None => DEFAULT_MARKET_CAP_CEILING,
            };
            anyhow::ensure!(
                market_cap_ceiling > 0.0,
                "MARKET_CAP_CEILING must be positive (got {market_cap_ceiling})"
            );

            let llm_max_per_second = match get("LLM_MAX_PER_SECOND") {
                Some(raw) => raw.trim().parse::<f64>().with_context(|| {
                    format!("LLM_MAX_PER_SECOND must be a number (got {raw:?})")
                })?,
                None => DEFAULT_LLM_MAX_PER_SECOND,
            };
            anyhow::ensure!(
                llm_max_per_second > 0.0
                    && Duration::try_from_secs_f64(1.0 / llm_max_per_second).is_ok(),
                "LLM_MAX_PER_SECOND must be a positive usable rate (got {llm_max_per_second})"
            );

            let report_channel = match get("REPORT_CHANNEL") {
                Some(raw) => ReportChannel::parse(&raw)?,
                None => ReportChannel::Email,
            };

            let rss_feeds = get("RSS_FEEDS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            Ok(Self {
                openrouter_api_key: get("OPENROUTER_API_KEY"),
                openrouter_base_url: get("OPENROUTER_BASE_URL"),
                exa_api_key: get("EXA_API_KEY"),
                fast_llm: get("FAST_LLM"),
                smart_llm: get("SMART_LLM"),
                rss_feeds,
                smtp_server: get("SMTP_SERVER"),
                smtp_port,
                email_sender: get("EMAIL_SENDER"),
                email_password: get("EMAIL_PASSWORD"),
                email_recipient: get("EMAIL_RECIPIENT"),
                report_channel,
                report_dir: get("REPORT_DIR").unwrap_or_else(|| DEFAULT_REPORT_DIR.to_string()),
                database_url: get("DATABASE_URL"),
                sentry_dsn: get("SENTRY_DSN"),
                market_cap_ceiling,
                sec_user_agent: get("SEC_USER_AGENT")
                    .unwrap_or_else(|| DEFAULT_SEC_USER_AGENT.to_string()),
                llm_max_per_second,
            })
        }

        /// Names every required key that is missing for a pipeline run.
        pub fn missing_keys(&self) -> Vec<&'static str> {
            let mut missing = Vec::new();
            let present = [
                self.openrouter_api_key.is_some(),
                self.exa_api_key.is_some(),
                self.fast_llm.is_some(),
                self.smart_llm.is_some(),
                !self.rss_feeds.is_empty(),
            ];
            for (key, ok) in REQUIRED_KEYS.iter().zip(present) {
                if !ok {
                    missing.push(*key);
                }
            }

            match self.report_channel {
                ReportChannel::Email => {
                    let present = [
                        self.smtp_server.is_some(),
                        self.email_sender.is_some(),
                        self.email_password.is_some(),
                        self.email_recipient.is_some(),
                    ];
                    for (key, ok) in EMAIL_KEYS.iter().zip(present) {
                        if !ok {
                            missing.push(*key);
                        }
                    }
                }
                ReportChannel::Postgres => {
                    if self.database_url.is_none() {
                        missing.push("DATABASE_URL");
                    }
                }
                ReportChannel::File => {}
            }

            missing
        }

        pub fn ensure_pipeline_ready(&self) -> anyhow::Result<()> {
            let missing = self.missing_keys();
            anyhow::ensure!(
                missing.is_empty(),
                "missing required settings: {}",
                missing.join(", ")
            );
            Ok(())
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_openrouter_api_key(&self) -> anyhow::Result<&str> {
            self.openrouter_api_key
                .as_deref()
                .context("OPENROUTER_API_KEY is required")
        }

        pub fn require_exa_api_key(&self) -> anyhow::Result<&str> {
            self.exa_api_key.as_deref().context("EXA_API_KEY is required")
        }

        pub fn require_fast_llm(&self) -> anyhow::Result<&str> {
            self.fast_llm.as_deref().context("FAST_LLM is required")
        }

        pub fn require_smart_llm(&self) -> anyhow::Result<&str> {
            self.smart_llm.as_deref().context("SMART_LLM is required")
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::collections::HashMap;

        fn settings(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
            let map: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            Settings::from_lookup(|key| map.get(key).cloned())
        }

        const CORE: [(&str, &str); 5] = [
            ("OPENROUTER_API_KEY", "or-key"),
            ("EXA_API_KEY", "exa-key"),
            ("FAST_LLM", "fast/model"),
            ("SMART_LLM", "smart/model"),
            ("RSS_FEEDS", "https://a.example/rss, https://b.example/rss,"),
        ];

        #[test]
        fn names_every_missing_key() {
            let s = settings(&[("FAST_LLM", "fast/model")]).unwrap();
            let err = s.ensure_pipeline_ready().unwrap_err().to_string();
            for key in [
                "OPENROUTER_API_KEY",
                "EXA_API_KEY",
                "SMART_LLM",
                "RSS_FEEDS",
                "SMTP_SERVER",
                "EMAIL_RECIPIENT",
            ] {
                assert!(err.contains(key), "{key} missing from {err}");
            }
            assert!(!err.contains("FAST_LLM"));
        }

        #[test]
        fn email_keys_only_required_for_email_channel() {
            let mut pairs = CORE.to_vec();
            pairs.push(("REPORT_CHANNEL", "file"));
            let s = settings(&pairs).unwrap();
            assert!(s.ensure_pipeline_ready().is_ok());
            assert_eq!(s.report_channel, ReportChannel::File);

            let s = settings(&CORE).unwrap();
            assert_eq!(s.report_channel, ReportChannel::Email);
            assert_eq!(
                s.missing_keys(),
                vec!["SMTP_SERVER", "EMAIL_SENDER", "EMAIL_PASSWORD", "EMAIL_RECIPIENT"]
            );
        }

        #[test]
        fn postgres_channel_requires_database_url() {
            let mut pairs = CORE.to_vec();
            pairs.push(("REPORT_CHANNEL", "postgres"));
            let s = settings(&pairs).unwrap();
            assert_eq!(s.missing_keys(), vec!["DATABASE_URL"]);
        }

        #[test]
        fn applies_defaults_and_splits_feeds() {
            let s = settings(&CORE).unwrap();
            assert_eq!(
                s.rss_feeds,
                vec!["https://a.example/rss", "https://b.example/rss"]
            );
            assert_eq!(s.market_cap_ceiling, 500_000_000.0);
            assert_eq!(s.smtp_port, 465);
            assert_eq!(s.report_dir, "reports");
            assert_eq!(s.llm_max_per_second, 5.0);
        }

        #[test]
        fn blank_values_count_as_missing() {
            let s = settings(&[("OPENROUTER_API_KEY", "   ")]).unwrap();
            assert!(s.openrouter_api_key.is_none());
            assert!(s.require_openrouter_api_key().is_err());
        }

        #[test]
        fn rejects_bad_numbers_and_channels() {
            assert!(settings(&[("SMTP_PORT", "abc")]).is_err());
            assert!(settings(&[("MARKET_CAP_CEILING", "-1")]).is_err());
            assert!(settings(&[("REPORT_CHANNEL", "pigeon")]).is_err());
            assert!(settings(&[("LLM_MAX_PER_SECOND", "fast")]).is_err());
            assert!(settings(&[("LLM_MAX_PER_SECOND", "0")]).is_err());
            assert!(settings(&[("LLM_MAX_PER_SECOND", "1e-300")]).is_err());
            let s = settings(&[("LLM_MAX_PER_SECOND", "0.5")]).unwrap();
            assert_eq!(s.llm_max_per_second, 0.5);
            let s = settings(&[("MARKET_CAP_CEILING", "100_000_000")]).unwrap();
            assert_eq!(s.market_cap_ceiling, 100_000_000.0);
        }
    }
}
