use crate::domain::model::OutboundEmail;
use crate::domain::ports::EmailTransport;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

/// 以 HTTP POST 呼叫郵件服務的 `/v1/email`
pub struct HttpEmailTransport {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl HttpEmailTransport {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            endpoint,
            api_key,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn deliver(
        &self,
        email: &OutboundEmail,
        timeout: Duration,
    ) -> std::result::Result<String, String> {
        tracing::debug!("POST {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(email)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("request timed out after {}ms", timeout.as_millis())
                } else {
                    format!("network error: {}", e)
                }
            })?;

        let status = response.status();
        tracing::debug!("Email API response status: {}", status);

        let header_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read response body: {}", e))?;

        if status.is_success() {
            let body_id = serde_json::from_str::<SendResponse>(&body)
                .ok()
                .and_then(|r| r.message_id);
            return Ok(body_id.or(header_id).unwrap_or_default());
        }

        // 盡量取出服務回傳的錯誤訊息
        let reason = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|r| r.message)
            .unwrap_or_else(|| status.to_string());
        Err(format!("HTTP {}: {}", status.as_u16(), reason))
    }
}
