use crate::adapters::email_api::HttpEmailTransport;
use crate::config::{FieldLimits, PipelineSettings};
use crate::core::content::build_email;
use crate::core::dispatcher::EmailDispatcher;
use crate::domain::model::{EmailAddress, EmailStatus, OutboundEmail, StatusUpdate};
use crate::domain::ports::{DataStore, EmailTransport, Sleeper, TokioSleeper};
use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::{
    is_valid_calendly_url, is_valid_email, is_valid_name_within, is_valid_record_id,
    is_valid_round_within, sanitize, Validate, MAX_RECORD_ID_LENGTH,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 一次寄信所需的輸入，五個欄位都必填
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub email: String,
    pub name: String,
    pub round: String,
    pub calendly: String,
    pub record_id: String,
}

impl DispatchRequest {
    /// 一次檢查所有欄位，回傳全部失敗項目
    pub fn validate(&self, limits: &FieldLimits) -> Result<()> {
        let mut failures = Vec::new();

        if !is_valid_email(&self.email) {
            failures.push("Invalid email address".to_string());
        }
        if !is_valid_name_within(&self.name, limits.max_name_length) {
            failures.push("Invalid candidate name".to_string());
        }
        if !is_valid_round_within(&self.round, limits.max_round_length) {
            failures.push("Invalid interview round".to_string());
        }
        if !is_valid_calendly_url(&self.calendly) {
            failures.push("Invalid Calendly URL (must be an https calendly.com link)".to_string());
        }
        if !is_valid_record_id(&self.record_id) {
            failures.push("Invalid record ID".to_string());
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::ValidationError { failures })
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchReport {
    pub success: bool,
    pub record_id: String,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl DispatchReport {
    pub fn failure(record_id: impl Into<String>, message: String) -> Self {
        Self {
            success: false,
            record_id: record_id.into(),
            message_id: None,
            error: Some(message),
        }
    }

    pub fn status_line(&self) -> String {
        if self.success {
            format!(
                "✅ Invitation sent for record {} (message id: {})",
                self.record_id,
                self.message_id.as_deref().unwrap_or("-")
            )
        } else {
            format!(
                "❌ Invitation failed for record {}: {}",
                self.record_id,
                self.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

/// 驗證輸入、寄出邀請信，並把結果寫回資料表
pub struct DispatchPipeline<S: DataStore, T: EmailTransport = HttpEmailTransport, Z: Sleeper = TokioSleeper>
{
    store: S,
    dispatcher: EmailDispatcher<T, Z>,
    sleeper: Z,
    sender: EmailAddress,
    clean_table: String,
    limits: FieldLimits,
    rate_limit_delay: Duration,
    max_error_length: usize,
}

impl<S: DataStore> DispatchPipeline<S> {
    /// 金鑰未設定時在任何寄信之前回傳 `ConfigError`
    pub fn new(store: S, settings: &PipelineSettings) -> Result<Self> {
        let dispatcher = EmailDispatcher::new(&settings.email)?;
        Ok(Self::with_dispatcher(store, settings, dispatcher, TokioSleeper))
    }
}

impl<S: DataStore, T: EmailTransport, Z: Sleeper + Clone> DispatchPipeline<S, T, Z> {
    pub fn with_dispatcher(
        store: S,
        settings: &PipelineSettings,
        dispatcher: EmailDispatcher<T, Z>,
        sleeper: Z,
    ) -> Self {
        Self {
            store,
            dispatcher,
            sleeper,
            sender: EmailAddress {
                email: settings.email.from_email.clone(),
                name: settings.email.from_name.clone(),
            },
            clean_table: settings.store.clean_table.clone(),
            limits: settings.limits.clone(),
            rate_limit_delay: settings.email.rate_limit_delay(),
            max_error_length: settings.email.max_error_length,
        }
    }

    /// 永遠回傳結果物件，錯誤不會往外拋
    pub async fn run(&self, request: &DispatchRequest) -> DispatchReport {
        let record_id = sanitize(&request.record_id, MAX_RECORD_ID_LENGTH);
        tracing::info!(
            "🚀 Starting dispatch for record {} ({} round)",
            record_id,
            sanitize(&request.round, self.limits.max_round_length)
        );

        if let Err(e) = request.validate(&self.limits) {
            tracing::error!("❌ {}", e);
            return self.fail(&record_id, e).await;
        }

        // 已寄出或已失敗的紀錄不再寄送，也不改寫狀態
        if let Err(e) = self.ensure_transition(&record_id, EmailStatus::Sent).await {
            tracing::error!("❌ {}", e);
            return DispatchReport::failure(&record_id, e.sanitized_message(self.max_error_length));
        }

        let content = build_email(&request.name, &request.round, &request.calendly, &self.limits);
        let email = OutboundEmail::new(
            self.sender.clone(),
            &request.email,
            &request.name,
            content,
            &self.limits,
        );

        let result = match self.dispatcher.send(&email).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("❌ {}", e);
                return self.fail(&record_id, e).await;
            }
        };

        let message_id = result.message_id.unwrap_or_default();
        let update = StatusUpdate::Sent {
            sent_at: chrono::Utc::now(),
            message_id: message_id.clone(),
        };
        if let Err(e) = self.write_status(&record_id, &update).await {
            // 信已寄出，寫回失敗只記錄警告
            tracing::warn!("⚠️ Email sent but status update for {} failed: {}", record_id, e);
        }

        tracing::debug!("Rate limit pause {:?}", self.rate_limit_delay);
        self.sleeper.sleep(self.rate_limit_delay).await;

        DispatchReport {
            success: true,
            record_id,
            message_id: Some(message_id),
            error: None,
        }
    }

    async fn fail(&self, record_id: &str, error: PipelineError) -> DispatchReport {
        let message = error.sanitized_message(self.max_error_length);

        if !is_valid_record_id(record_id) {
            tracing::warn!("⚠️ No usable record ID, skipping Failed status update");
        } else if let Err(e) = self.ensure_transition(record_id, EmailStatus::Failed).await {
            tracing::warn!("⚠️ Not marking {} as Failed: {}", record_id, e);
        } else {
            let update = StatusUpdate::Failed {
                error: message.clone(),
            };
            if let Err(e) = self.write_status(record_id, &update).await {
                tracing::error!("❌ Could not mark {} as Failed: {}", record_id, e);
            }
        }

        DispatchReport::failure(record_id, message)
    }

    /// 讀取目前的 Email Status，只允許從 Pending 往前走
    async fn ensure_transition(&self, record_id: &str, next: EmailStatus) -> Result<()> {
        let record = self
            .store
            .get_record(&self.clean_table, record_id)
            .await?
            .ok_or_else(|| PipelineError::StoreAccessError {
                table: self.clean_table.clone(),
                message: format!("record {} not found", record_id),
            })?;

        let current = record.email_status()?;
        if current.can_transition_to(next) {
            Ok(())
        } else {
            Err(PipelineError::StatusTransitionError {
                record_id: record_id.to_string(),
                current,
                next,
            })
        }
    }

    async fn write_status(&self, record_id: &str, update: &StatusUpdate) -> Result<()> {
        tracing::debug!("Marking {} as {}", record_id, update.status());
        self.store
            .update_record(&self.clean_table, record_id, update.to_fields())
            .await
    }
}

/// 先檢查設定再寄信；設定錯誤也回傳失敗結果，不碰資料表
pub async fn execute_dispatch<S: DataStore>(
    store: S,
    settings: &PipelineSettings,
    request: &DispatchRequest,
) -> DispatchReport {
    let pipeline = settings
        .validate()
        .and_then(|_| DispatchPipeline::new(store, settings));

    match pipeline {
        Ok(pipeline) => pipeline.run(request).await,
        Err(e) => {
            tracing::error!("❌ {}", e);
            DispatchReport::failure(
                sanitize(&request.record_id, MAX_RECORD_ID_LENGTH),
                e.sanitized_message(settings.email.max_error_length),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailSettings;
    use crate::domain::model::{fields, Record};
    use crate::utils::test_support::{MemoryStore, RecordingSleeper};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const ROUNDS: &str = "Interview Rounds";

    #[derive(Clone)]
    struct FakeTransport {
        succeed: bool,
        calls: Arc<Mutex<Vec<OutboundEmail>>>,
    }

    impl FakeTransport {
        fn new(succeed: bool) -> Self {
            Self {
                succeed,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn calls(&self) -> Vec<OutboundEmail> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailTransport for FakeTransport {
        async fn deliver(
            &self,
            email: &OutboundEmail,
            _timeout: Duration,
        ) -> std::result::Result<String, String> {
            self.calls.lock().unwrap().push(email.clone());
            if self.succeed {
                Ok("msg-42".to_string())
            } else {
                Err("HTTP 500: upstream unavailable".to_string())
            }
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            email: EmailSettings {
                api_key: "mlsn.test".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// `rec1` 目前的狀態為 `status`
    fn store_with_status(status: &str) -> MemoryStore {
        let row = Record::new(
            "rec1",
            json!({"Interview Round": "HR", "Email Status": status})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        );
        MemoryStore::with_rows(ROUNDS, vec![row])
    }

    fn stored_status(store: &MemoryStore) -> String {
        store.rows(ROUNDS)[0].fields[fields::EMAIL_STATUS]
            .as_str()
            .unwrap()
            .to_string()
    }

    fn pipeline(
        store: MemoryStore,
        transport: FakeTransport,
        sleeper: RecordingSleeper,
    ) -> DispatchPipeline<MemoryStore, FakeTransport, RecordingSleeper> {
        let settings = settings();
        let dispatcher =
            EmailDispatcher::with_transport(&settings.email, transport, sleeper.clone()).unwrap();
        DispatchPipeline::with_dispatcher(store, &settings, dispatcher, sleeper)
    }

    fn request() -> DispatchRequest {
        DispatchRequest {
            email: "jane@example.com".to_string(),
            name: "Jane Doe".to_string(),
            round: "HR".to_string(),
            calendly: "https://calendly.com/acme/hr".to_string(),
            record_id: "rec1".to_string(),
        }
    }

    #[test]
    fn test_new_without_api_key_is_config_error() {
        let result = DispatchPipeline::new(MemoryStore::new(), &PipelineSettings::default());
        assert!(matches!(result, Err(PipelineError::ConfigError { .. })));
    }

    #[test]
    fn test_validation_aggregates_every_failure() {
        let invalid = DispatchRequest {
            email: "not-an-email".to_string(),
            name: "Jane Doe".to_string(),
            round: "Round #2".to_string(),
            calendly: "http://calendly.com/acme".to_string(),
            record_id: "rec1".to_string(),
        };

        match invalid.validate(&FieldLimits::default()) {
            Err(PipelineError::ValidationError { failures }) => {
                assert_eq!(
                    failures,
                    vec![
                        "Invalid email address".to_string(),
                        "Invalid interview round".to_string(),
                        "Invalid Calendly URL (must be an https calendly.com link)".to_string(),
                    ]
                );
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(request().validate(&FieldLimits::default()).is_ok());
    }

    #[tokio::test]
    async fn test_successful_dispatch_marks_record_sent_and_pauses() {
        let store = store_with_status("Pending");
        let transport = FakeTransport::new(true);
        let sleeper = RecordingSleeper::default();
        let pipeline = pipeline(store.clone(), transport.clone(), sleeper.clone());

        let report = pipeline.run(&request()).await;

        assert!(report.success);
        assert_eq!(report.message_id.as_deref(), Some("msg-42"));
        assert_eq!(
            report.status_line(),
            "✅ Invitation sent for record rec1 (message id: msg-42)"
        );

        let sent = transport.calls();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Interview Invitation – HR Round");
        assert_eq!(sent[0].recipient(), "jane@example.com");

        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        let (table, id, values) = &updates[0];
        assert_eq!(table, ROUNDS);
        assert_eq!(id, "rec1");
        assert_eq!(values[fields::EMAIL_STATUS], "Sent");
        assert_eq!(values[fields::EMAIL_MESSAGE_ID], "msg-42");
        assert!(values.contains_key(fields::MAIL_SENT_AT));
        assert_eq!(stored_status(&store), "Sent");

        assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(500)]);
    }

    #[tokio::test]
    async fn test_row_without_status_counts_as_pending() {
        let store = MemoryStore::with_rows(ROUNDS, vec![Record::new("rec1", Default::default())]);
        let pipeline = pipeline(store.clone(), FakeTransport::new(true), RecordingSleeper::default());

        let report = pipeline.run(&request()).await;

        assert!(report.success);
        assert_eq!(stored_status(&store), "Sent");
    }

    #[tokio::test]
    async fn test_invalid_round_makes_no_network_call_and_marks_failed() {
        let store = store_with_status("Pending");
        let transport = FakeTransport::new(true);
        let sleeper = RecordingSleeper::default();
        let pipeline = pipeline(store.clone(), transport.clone(), sleeper.clone());

        let report = pipeline
            .run(&DispatchRequest {
                round: "<script>1</script>".to_string(),
                name: "J4ne".to_string(),
                ..request()
            })
            .await;

        assert!(!report.success);
        let error = report.error.unwrap();
        assert!(error.starts_with("Validation failed"));
        assert!(error.contains("Invalid interview round"));
        assert!(error.contains("Invalid candidate name"));
        assert!(transport.calls().is_empty());
        assert!(sleeper.sleeps().is_empty());

        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].2[fields::EMAIL_STATUS], "Failed");
        assert_eq!(updates[0].2[fields::EMAIL_ERROR], error.as_str());
    }

    #[tokio::test]
    async fn test_delivery_failure_marks_failed_after_retries() {
        let store = store_with_status("Pending");
        let transport = FakeTransport::new(false);
        let sleeper = RecordingSleeper::default();
        let pipeline = pipeline(store.clone(), transport.clone(), sleeper.clone());

        let report = pipeline.run(&request()).await;

        assert!(!report.success);
        assert_eq!(transport.calls().len(), 3);
        // 只有重試間的兩次退避，失敗時不做 rate limit 暫停
        assert_eq!(sleeper.sleeps().len(), 2);
        assert!(report
            .status_line()
            .contains("Email delivery failed after 3 attempt(s): HTTP 500: upstream unavailable"));
        assert_eq!(stored_status(&store), "Failed");
    }

    #[tokio::test]
    async fn test_sent_record_is_never_resent_or_moved_back() {
        let store = store_with_status("Sent");
        let transport = FakeTransport::new(false);
        let pipeline = pipeline(store.clone(), transport.clone(), RecordingSleeper::default());

        let report = pipeline.run(&request()).await;

        assert!(!report.success);
        assert!(report
            .error
            .unwrap()
            .contains("Record rec1 is already Sent; it cannot be marked Sent"));
        assert!(transport.calls().is_empty());
        assert!(store.updates().is_empty());
        assert_eq!(stored_status(&store), "Sent");
    }

    #[tokio::test]
    async fn test_invalid_input_does_not_overwrite_sent_record() {
        let store = store_with_status("Sent");
        let transport = FakeTransport::new(true);
        let pipeline = pipeline(store.clone(), transport.clone(), RecordingSleeper::default());

        let report = pipeline
            .run(&DispatchRequest {
                email: "broken".to_string(),
                ..request()
            })
            .await;

        assert!(report.error.unwrap().contains("Invalid email address"));
        assert!(transport.calls().is_empty());
        assert!(store.updates().is_empty());
        assert_eq!(stored_status(&store), "Sent");
    }

    #[tokio::test]
    async fn test_failed_record_is_not_retried() {
        let store = store_with_status("Failed");
        let transport = FakeTransport::new(true);
        let pipeline = pipeline(store.clone(), transport.clone(), RecordingSleeper::default());

        let report = pipeline.run(&request()).await;

        assert!(!report.success);
        assert!(transport.calls().is_empty());
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_record_is_not_sent() {
        let store = MemoryStore::new();
        let transport = FakeTransport::new(true);
        let pipeline = pipeline(store.clone(), transport.clone(), RecordingSleeper::default());

        let report = pipeline.run(&request()).await;

        assert!(!report.success);
        assert!(report.error.unwrap().contains("record rec1 not found"));
        assert!(transport.calls().is_empty());
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_status_update_failure_after_send_is_still_success() {
        let store = store_with_status("Pending");
        store.fail_updates();
        let transport = FakeTransport::new(true);
        let pipeline = pipeline(store.clone(), transport, RecordingSleeper::default());

        let report = pipeline.run(&request()).await;

        assert!(report.success);
        assert_eq!(store.updates().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_status_update_failure_is_swallowed() {
        let store = store_with_status("Pending");
        store.fail_updates();
        let pipeline = pipeline(store.clone(), FakeTransport::new(false), RecordingSleeper::default());

        let report = pipeline.run(&request()).await;

        assert!(!report.success);
        assert!(report.error.is_some());
        assert_eq!(store.updates().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_record_id_skips_status_write() {
        let store = store_with_status("Pending");
        let pipeline = pipeline(store.clone(), FakeTransport::new(true), RecordingSleeper::default());

        let report = pipeline
            .run(&DispatchRequest {
                record_id: "   ".to_string(),
                ..request()
            })
            .await;

        assert!(!report.success);
        assert!(report.error.unwrap().contains("Invalid record ID"));
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_error_written_to_store_is_truncated() {
        let store = store_with_status("Pending");
        let settings = settings();
        let transport = FakeTransport::new(false);
        let sleeper = RecordingSleeper::default();
        let dispatcher = EmailDispatcher::with_transport(
            &EmailSettings {
                max_retries: 1,
                ..settings.email.clone()
            },
            transport,
            sleeper.clone(),
        )
        .unwrap();
        let mut settings = settings;
        settings.email.max_error_length = 20;
        let pipeline = DispatchPipeline::with_dispatcher(store.clone(), &settings, dispatcher, sleeper);

        let report = pipeline.run(&request()).await;

        assert_eq!(report.error.as_deref().map(|e| e.chars().count()), Some(20));
        assert_eq!(
            store.updates()[0].2[fields::EMAIL_ERROR]
                .as_str()
                .unwrap()
                .chars()
                .count(),
            20
        );
    }

    #[tokio::test]
    async fn test_execute_dispatch_reports_missing_api_key() {
        let store = store_with_status("Pending");

        let report = execute_dispatch(store.clone(), &PipelineSettings::default(), &request()).await;

        assert!(!report.success);
        assert_eq!(
            report.status_line(),
            "❌ Invitation failed for record rec1: Configuration error: email.api_key is not set"
        );
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_execute_dispatch_reports_invalid_settings() {
        let store = store_with_status("Pending");
        let mut settings = settings();
        settings.email.from_email = "not-an-address".to_string();

        let report = execute_dispatch(store.clone(), &settings, &request()).await;

        assert!(report
            .status_line()
            .starts_with("❌ Invitation failed for record rec1: Configuration error: email.from_email"));
        assert!(store.updates().is_empty());
        assert_eq!(stored_status(&store), "Pending");
    }
}
