use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::sanitize_value;

pub mod fields {
    pub const CANDIDATE_NAME: &str = "Candidate Name";
    pub const EMAIL: &str = "Email";
    pub const INTERVIEW_ROUNDS: &str = "Interview Rounds";
    pub const INTERVIEW_ROUND: &str = "Interview Round";
    pub const CALENDLY_LINK: &str = "Calendly Link";
    pub const ADDED_ON: &str = "Added On";
    pub const MAIL_SENT_AT: &str = "Mail Sent At";
    pub const EMAIL_STATUS: &str = "Email Status";
    pub const EMAIL_MESSAGE_ID: &str = "Email Message ID";
    pub const EMAIL_ERROR: &str = "Email Error";
}

pub type FieldMap = Map<String, Value>;

/// 資料表中的一列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: FieldMap,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn email_status(&self) -> Result<EmailStatus> {
        EmailStatus::from_field(self.fields.get(fields::EMAIL_STATUS))
    }
}

/// 原始候選人資料，面試輪次以逗號分隔
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidateRow {
    pub id: String,
    pub candidate_name: String,
    pub email: String,
    pub interview_rounds_raw: String,
    /// 原樣保留，不解析日期格式
    pub added_on: Option<Value>,
}

impl RawCandidateRow {
    /// 從資料表列讀取欄位；缺少或非字串的欄位以空字串表示
    pub fn from_record(record: &Record, max_name_length: usize) -> Self {
        let text = |key: &str, max: usize| {
            record
                .fields
                .get(key)
                .map(|v| sanitize_value(v, max))
                .unwrap_or_default()
        };

        Self {
            id: record.id.clone(),
            candidate_name: text(fields::CANDIDATE_NAME, max_name_length),
            email: text(fields::EMAIL, crate::utils::validation::MAX_EMAIL_LENGTH),
            interview_rounds_raw: record
                .fields
                .get(fields::INTERVIEW_ROUNDS)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            added_on: record
                .fields
                .get(fields::ADDED_ON)
                .filter(|v| !v.is_null())
                .cloned(),
        }
    }

    /// 第一個缺少的必要欄位名稱
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.candidate_name.trim().is_empty() {
            Some(fields::CANDIDATE_NAME)
        } else if self.email.trim().is_empty() {
            Some(fields::EMAIL)
        } else if self.interview_rounds_raw.trim().is_empty() {
            Some(fields::INTERVIEW_ROUNDS)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailStatus {
    Pending,
    Sent,
    Failed,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "Pending",
            EmailStatus::Sent => "Sent",
            EmailStatus::Failed => "Failed",
        }
    }

    /// 欄位缺少或空白時視為 Pending
    pub fn from_field(value: Option<&Value>) -> Result<Self> {
        match value.and_then(Value::as_str).map(str::trim) {
            None | Some("") | Some("Pending") => Ok(EmailStatus::Pending),
            Some("Sent") => Ok(EmailStatus::Sent),
            Some("Failed") => Ok(EmailStatus::Failed),
            Some(other) => Err(PipelineError::ValidationError {
                failures: vec![format!("Unknown email status '{}'", other)],
            }),
        }
    }

    /// 只允許 Pending → Sent 或 Pending → Failed
    pub fn can_transition_to(&self, next: EmailStatus) -> bool {
        matches!(
            (self, next),
            (EmailStatus::Pending, EmailStatus::Sent) | (EmailStatus::Pending, EmailStatus::Failed)
        )
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 每個面試輪次一筆的整理後資料
#[derive(Debug, Clone, PartialEq)]
pub struct InterviewRoundRecord {
    pub id: Option<String>,
    pub candidate_name: String,
    pub email: String,
    pub round: String,
    pub calendly_link: String,
    pub added_on: Option<Value>,
    pub mail_sent_at: Option<DateTime<Utc>>,
    pub email_status: EmailStatus,
    pub email_message_id: String,
    pub email_error: String,
}

impl InterviewRoundRecord {
    pub fn draft(raw: &RawCandidateRow, round: String, calendly_link: String) -> Self {
        Self {
            id: None,
            candidate_name: raw.candidate_name.clone(),
            email: raw.email.clone(),
            round,
            calendly_link,
            added_on: raw.added_on.clone(),
            mail_sent_at: None,
            email_status: EmailStatus::Pending,
            email_message_id: String::new(),
            email_error: String::new(),
        }
    }

    /// 建立新資料列時寫入的欄位
    pub fn to_fields(&self) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert(fields::CANDIDATE_NAME.into(), self.candidate_name.clone().into());
        map.insert(fields::EMAIL.into(), self.email.clone().into());
        map.insert(fields::INTERVIEW_ROUND.into(), self.round.clone().into());
        map.insert(fields::CALENDLY_LINK.into(), self.calendly_link.clone().into());
        if let Some(added_on) = &self.added_on {
            map.insert(fields::ADDED_ON.into(), added_on.clone());
        }
        map.insert(fields::EMAIL_STATUS.into(), self.email_status.as_str().into());
        map
    }
}

/// 寄信成功或失敗後寫回資料表的狀態欄位
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Sent {
        sent_at: DateTime<Utc>,
        message_id: String,
    },
    Failed {
        error: String,
    },
}

impl StatusUpdate {
    pub fn status(&self) -> EmailStatus {
        match self {
            StatusUpdate::Sent { .. } => EmailStatus::Sent,
            StatusUpdate::Failed { .. } => EmailStatus::Failed,
        }
    }

    pub fn to_fields(&self) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert(fields::EMAIL_STATUS.into(), self.status().as_str().into());
        match self {
            StatusUpdate::Sent {
                sent_at,
                message_id,
            } => {
                map.insert(fields::MAIL_SENT_AT.into(), sent_at.to_rfc3339().into());
                map.insert(fields::EMAIL_MESSAGE_ID.into(), message_id.clone().into());
                map.insert(fields::EMAIL_ERROR.into(), "".into());
            }
            StatusUpdate::Failed { error } => {
                map.insert(fields::EMAIL_ERROR.into(), error.clone().into());
            }
        }
        map
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailAddress {
    pub email: String,
    pub name: String,
}

/// 送往郵件 API 的訊息，不會被保存
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEmail {
    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl OutboundEmail {
    pub fn recipient(&self) -> &str {
        self.to.first().map(|to| to.email.as_str()).unwrap_or("")
    }
}

/// 單筆資料的處理結果
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Created { id: String },
    Errored { message: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingSummary {
    pub success: bool,
    pub processed_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    pub total_input: usize,
    pub errors: Vec<String>,
    pub fatal_error: Option<String>,
}

impl ProcessingSummary {
    pub fn new(total_input: usize) -> Self {
        Self {
            success: true,
            total_input,
            ..Default::default()
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            errors: vec![message.clone()],
            fatal_error: Some(message),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Created { id } => {
                tracing::trace!("created record {}", id);
                self.processed_count += 1;
            }
            RecordOutcome::Errored { message } => {
                self.error_count += 1;
                self.errors.push(message);
            }
            RecordOutcome::Skipped { reason } => {
                tracing::trace!("skipped row: {}", reason);
                self.skipped_count += 1;
            }
        }
    }

    pub fn status_line(&self) -> String {
        match &self.fatal_error {
            Some(error) => format!("❌ Split run failed: {}", error),
            None => format!(
                "✅ Split run finished: {} created, {} errors, {} skipped ({} input rows)",
                self.processed_count, self.error_count, self.skipped_count, self.total_input
            ),
        }
    }
}

/// 成功寄出的結果；全部失敗時改回傳 `DeliveryError`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SendResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub attempts: u32,
}

impl SendResult {
    pub fn sent(message_id: String, attempts: u32) -> Self {
        Self {
            success: true,
            message_id: Some(message_id),
            attempts,
        }
    }
}
