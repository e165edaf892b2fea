use crate::adapters::email_api::HttpEmailTransport;
use crate::config::EmailSettings;
use crate::domain::model::{OutboundEmail, SendResult};
use crate::domain::ports::{EmailTransport, Sleeper, TokioSleeper};
use crate::utils::error::{PipelineError, Result};
use rand::Rng;
use std::time::Duration;

const MAX_JITTER_MS: u64 = 1000;

/// 寄送單封郵件，逾時或失敗時以指數退避重試
pub struct EmailDispatcher<T: EmailTransport = HttpEmailTransport, Z: Sleeper = TokioSleeper> {
    transport: T,
    sleeper: Z,
    max_retries: u32,
    base_delay: Duration,
    timeout: Duration,
}

impl EmailDispatcher {
    /// API 金鑰在這裡檢查一次，未設定時回傳 `ConfigError`
    pub fn new(settings: &EmailSettings) -> Result<Self> {
        let api_key = settings.require_api_key()?;
        let transport = HttpEmailTransport::new(settings.send_endpoint(), api_key.to_string());
        Self::with_transport(settings, transport, TokioSleeper)
    }
}

impl<T: EmailTransport, Z: Sleeper> EmailDispatcher<T, Z> {
    pub fn with_transport(settings: &EmailSettings, transport: T, sleeper: Z) -> Result<Self> {
        settings.require_api_key()?;
        Ok(Self {
            transport,
            sleeper,
            max_retries: settings.max_retries.max(1),
            base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            timeout: settings.timeout(),
        })
    }

    pub async fn send(&self, email: &OutboundEmail) -> Result<SendResult> {
        let recipient = email.recipient();
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            tracing::info!(
                "📧 Sending attempt {}/{} to {}",
                attempt,
                self.max_retries,
                recipient
            );

            match self.transport.deliver(email, self.timeout).await {
                Ok(message_id) => {
                    tracing::info!(
                        "✅ Attempt {} to {} succeeded (message id: {})",
                        attempt,
                        recipient,
                        message_id
                    );
                    return Ok(SendResult::sent(message_id, attempt));
                }
                Err(reason) => {
                    tracing::warn!("⚠️ Attempt {} to {} failed: {}", attempt, recipient, reason);
                    last_error = reason;
                }
            }

            if attempt < self.max_retries {
                let delay = backoff_delay(self.base_delay, attempt, jitter());
                tracing::debug!("Retrying in {:?}", delay);
                self.sleeper.sleep(delay).await;
            }
        }

        Err(PipelineError::DeliveryError {
            attempts: self.max_retries,
            reason: last_error,
        })
    }
}

/// `base * 2^(attempt-1) + jitter`
pub fn backoff_delay(base: Duration, attempt: u32, jitter: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor) + jitter
}

fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS))
}
