use crate::utils::error::{PipelineError, Result};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_ROUND_LENGTH: usize = 50;
pub const MAX_URL_LENGTH: usize = 500;
pub const MAX_RECORD_ID_LENGTH: usize = 100;

/// 不經 fallback 規則即可接受的面試輪次
pub const KNOWN_ROUNDS: [&str; 7] = [
    "HR",
    "Tech",
    "Manager",
    "Technical",
    "Technical Round",
    "HR Round",
    "Manager Round",
];

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s\-'.]+$").expect("name pattern"));
static ROUND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s]+$").expect("round pattern"));

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 移除角括號、去除前後空白並截斷至 `max_length` 個字元。
///
/// 對同一字串重複呼叫結果不變。
pub fn sanitize(text: &str, max_length: usize) -> String {
    let stripped: String = text.chars().filter(|c| *c != '<' && *c != '>').collect();
    let truncated: String = stripped.trim().chars().take(max_length).collect();
    truncated.trim_end().to_string()
}

/// 資料表欄位版本的 [`sanitize`]：非字串值一律視為空字串
pub fn sanitize_value(value: &serde_json::Value, max_length: usize) -> String {
    match value {
        serde_json::Value::String(s) => sanitize(s, max_length),
        _ => String::new(),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let cleaned = sanitize(email, MAX_EMAIL_LENGTH);
    EMAIL_RE.is_match(&cleaned)
}

pub fn is_valid_name(name: &str) -> bool {
    is_valid_name_within(name, MAX_NAME_LENGTH)
}

pub fn is_valid_name_within(name: &str, max_length: usize) -> bool {
    let cleaned = sanitize(name, max_length);
    !cleaned.is_empty() && NAME_RE.is_match(&cleaned)
}

pub fn is_valid_round(round: &str) -> bool {
    is_valid_round_within(round, MAX_ROUND_LENGTH)
}

/// 允許清單之外，只含字母與空白的自訂輪次名稱也視為有效
pub fn is_valid_round_within(round: &str, max_length: usize) -> bool {
    let cleaned = sanitize(round, max_length);
    if cleaned.is_empty() {
        return false;
    }
    KNOWN_ROUNDS.contains(&cleaned.as_str()) || ROUND_RE.is_match(&cleaned)
}

pub fn is_valid_calendly_url(url_str: &str) -> bool {
    let cleaned = sanitize(url_str, MAX_URL_LENGTH);
    match Url::parse(&cleaned) {
        Ok(url) => {
            url.scheme() == "https"
                && url
                    .host_str()
                    .map(|host| host.contains("calendly.com"))
                    .unwrap_or(false)
        }
        Err(_) => false,
    }
}

/// 資料表 record id：英數字、`-`、`_`
pub fn is_valid_record_id(id: &str) -> bool {
    let cleaned = sanitize(id, MAX_RECORD_ID_LENGTH);
    !cleaned.is_empty()
        && cleaned
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(PipelineError::config(format!(
            "{}: URL cannot be empty",
            field_name
        )));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(PipelineError::config(format!(
                "{}: unsupported URL scheme '{}'",
                field_name, scheme
            ))),
        },
        Err(e) => Err(PipelineError::config(format!(
            "{}: invalid URL format '{}': {}",
            field_name, url_str, e
        ))),
    }
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(PipelineError::config(format!(
            "{}: value {} must be at least {}",
            field_name, value, min_value
        )));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PipelineError::config(format!(
            "{}: value cannot be empty or whitespace-only",
            field_name
        )));
    }
    Ok(())
}
