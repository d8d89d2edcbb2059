use std::{collections::HashMap, env, fs, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Result};

use crate::logging;

const CONFIG_PATH: &str = "config.env";

const BASE_URL: &str = "BASE_URL";
const CRON_SECRET: &str = "CRON_SECRET";
const REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// 單次執行所需的設定值，載入後不再變動
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub cron_secret: String,
    pub request_timeout: u64,
}

impl Config {
    /// Resolves the configuration from the process environment, optionally
    /// supplemented by a colocated `config.env` file. Values already present
    /// in the environment always win over the file; the process environment
    /// itself is never mutated.
    pub fn load() -> Result<Self> {
        let env_vars: HashMap<String, String> = env::vars().collect();
        let file_vars = match read_config_file() {
            Some(text) => {
                logging::info(format!("Loading config from {}", CONFIG_PATH));
                parse_env_file(&text)
            }
            None => HashMap::new(),
        };

        Config::resolve(&env_vars, &file_vars)
    }

    /// 合併 env 與設定檔的值，env 優先
    fn resolve(
        env_vars: &HashMap<String, String>,
        file_vars: &HashMap<String, String>,
    ) -> Result<Self> {
        let lookup = |key: &str| -> Option<&String> { env_vars.get(key).or_else(|| file_vars.get(key)) };

        let base_url = lookup(BASE_URL)
            .ok_or_else(|| anyhow!("{} environment variable is required", BASE_URL))?;
        let cron_secret = lookup(CRON_SECRET)
            .ok_or_else(|| anyhow!("{} environment variable is required", CRON_SECRET))?;
        let request_timeout = match lookup(REQUEST_TIMEOUT) {
            Some(val) => u64::from_str(val).unwrap_or_else(|_| {
                logging::error(format!(
                    "Ignoring invalid {} value {:?}, using default {}",
                    REQUEST_TIMEOUT, val, DEFAULT_TIMEOUT_SECS
                ));
                DEFAULT_TIMEOUT_SECS
            }),
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Config {
            base_url: normalize_base_url(base_url),
            cron_secret: cron_secret.to_string(),
            request_timeout,
        })
    }
}

/// 移除網址尾端的單一斜線
fn normalize_base_url(url: &str) -> String {
    url.strip_suffix('/').unwrap_or(url).to_string()
}

/// Parses `KEY=VALUE` lines into a map. Blank lines, `#`-prefixed comment
/// lines and lines without a `=` are ignored; the split happens at the
/// first `=` so values may themselves contain `=`.
fn parse_env_file(text: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            vars.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    vars
}

fn read_config_file() -> Option<String> {
    fs::read_to_string(PathBuf::from(CONFIG_PATH)).ok()
}
