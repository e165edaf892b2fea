use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern"));

/// 兩條 pipeline 共用的不可變設定，建構元件時注入
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub store: StoreSettings,
    pub email: EmailSettings,
    pub split: SplitSettings,
    pub limits: FieldLimits,
    pub calendly_links: CalendlyLinks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub base_url: String,
    pub api_token: String,
    pub raw_table: String,
    pub clean_table: String,
    pub timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/v0".to_string(),
            api_token: String::new(),
            raw_table: "Candidates".to_string(),
            clean_table: "Interview Rounds".to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub base_url: String,
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub timeout_ms: u64,
    pub rate_limit_delay_ms: u64,
    pub max_error_length: usize,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.mailersend.com".to_string(),
            api_key: String::new(),
            from_email: "recruiting@example.com".to_string(),
            from_name: "Recruiting Team".to_string(),
            max_retries: 3,
            retry_base_delay_ms: 1000,
            timeout_ms: 30_000,
            rate_limit_delay_ms: 500,
            max_error_length: 500,
        }
    }
}

impl EmailSettings {
    /// 取得 API 金鑰；空值、`YOUR_...` 佔位字串或未替換的 `${VAR}` 都視為未設定
    pub fn require_api_key(&self) -> Result<&str> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(PipelineError::config("email.api_key is not set"));
        }
        if key.to_ascii_uppercase().starts_with("YOUR_") || key.contains("${") {
            return Err(PipelineError::config(
                "email.api_key still holds a placeholder value",
            ));
        }
        Ok(key)
    }

    pub fn send_endpoint(&self) -> String {
        format!("{}/v1/email", self.base_url.trim_end_matches('/'))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSettings {
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldLimits {
    pub max_name_length: usize,
    pub max_round_length: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            max_name_length: validation::MAX_NAME_LENGTH,
            max_round_length: validation::MAX_ROUND_LENGTH,
        }
    }
}

/// 面試輪次 → Calendly 預約連結
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendlyLinks(BTreeMap<String, String>);

impl CalendlyLinks {
    pub fn new(links: BTreeMap<String, String>) -> Self {
        Self(links)
    }

    /// 未列出的輪次回傳空字串
    pub fn link_for(&self, round: &str) -> String {
        self.0.get(round).cloned().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

impl Default for CalendlyLinks {
    fn default() -> Self {
        let links = [
            ("HR", "https://calendly.com/recruiting-team/hr-interview"),
            ("Tech", "https://calendly.com/recruiting-team/technical-interview"),
            ("Manager", "https://calendly.com/recruiting-team/manager-interview"),
        ];
        Self(
            links
                .into_iter()
                .map(|(round, url)| (round.to_string(), url.to_string()))
                .collect(),
        )
    }
}

impl PipelineSettings {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置，未填的欄位使用預設值
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content)
            .map_err(|e| PipelineError::config(format!("TOML parsing error: {}", e)))
    }

    /// 替換環境變數 (例如 ${EMAIL_API_KEY})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn store_retry_delay(&self) -> Duration {
        Duration::from_millis(self.split.retry_delay_ms)
    }

    /// 驗證配置的合理性（API 金鑰在建立寄信元件時另外檢查）
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("store.base_url", &self.store.base_url)?;
        validation::validate_url("email.base_url", &self.email.base_url)?;
        validation::validate_non_empty_string("store.raw_table", &self.store.raw_table)?;
        validation::validate_non_empty_string("store.clean_table", &self.store.clean_table)?;

        if !validation::is_valid_email(&self.email.from_email) {
            return Err(PipelineError::config(format!(
                "email.from_email: '{}' is not a valid address",
                self.email.from_email
            )));
        }

        validation::validate_positive_number("split.batch_size", self.split.batch_size, 1)?;
        validation::validate_positive_number(
            "split.max_retries",
            self.split.max_retries as usize,
            1,
        )?;
        validation::validate_positive_number(
            "email.max_retries",
            self.email.max_retries as usize,
            1,
        )?;
        validation::validate_positive_number("email.timeout_ms", self.email.timeout_ms as usize, 1)?;
        validation::validate_positive_number(
            "limits.max_name_length",
            self.limits.max_name_length,
            1,
        )?;
        validation::validate_positive_number(
            "limits.max_round_length",
            self.limits.max_round_length,
            1,
        )?;

        for (round, url) in self.calendly_links.iter() {
            if !validation::is_valid_calendly_url(url) {
                return Err(PipelineError::config(format!(
                    "calendly_links.{}: '{}' is not an https calendly.com link",
                    round, url
                )));
            }
        }

        Ok(())
    }
}

impl Validate for PipelineSettings {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
