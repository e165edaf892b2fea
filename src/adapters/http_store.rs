use crate::config::StoreSettings;
use crate::domain::model::{FieldMap, Record};
use crate::domain::ports::DataStore;
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<Record>,
    offset: Option<String>,
}

#[derive(Debug, Serialize)]
struct FieldsBody<'a> {
    fields: &'a FieldMap,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

/// REST 風格的表格資料庫：`GET/POST {base}/{table}`、`PATCH {base}/{table}/{id}`
pub struct HttpTableStore {
    base_url: String,
    api_token: String,
    timeout: Duration,
    client: Client,
}

impl HttpTableStore {
    pub fn new(settings: &StoreSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_token: settings.api_token.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
            client: Client::new(),
        }
    }

    fn table_url(&self, table: &str, id: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PipelineError::config(format!("store.base_url: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| PipelineError::config("store.base_url cannot be a base URL"))?;
            segments.pop_if_empty().push(table);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.timeout(self.timeout);
        if self.api_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.api_token)
        }
    }

    async fn fetch_page(&self, table: &str, offset: Option<&str>) -> Result<ListResponse> {
        let access_error = |message: String| PipelineError::StoreAccessError {
            table: table.to_string(),
            message,
        };

        let mut request = self.authorize(self.client.get(self.table_url(table, None)?));
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| access_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(access_error(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        response
            .json::<ListResponse>()
            .await
            .map_err(|e| access_error(format!("invalid list response: {}", e)))
    }

    async fn send_write(&self, table: &str, request: RequestBuilder) -> Result<reqwest::Response> {
        let write_error = |message: String| PipelineError::StoreWriteError {
            table: table.to_string(),
            message,
        };

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| write_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(write_error(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        Ok(response)
    }
}

#[async_trait]
impl DataStore for HttpTableStore {
    async fn select_all(&self, table: &str) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        // 依 offset 逐頁讀取直到沒有下一頁
        loop {
            let page = self.fetch_page(table, offset.as_deref()).await?;
            tracing::debug!("Fetched {} records from '{}'", page.records.len(), table);
            records.extend(page.records);

            match page.offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }

    async fn get_record(&self, table: &str, id: &str) -> Result<Option<Record>> {
        let access_error = |message: String| PipelineError::StoreAccessError {
            table: table.to_string(),
            message,
        };

        let request = self.authorize(self.client.get(self.table_url(table, Some(id))?));
        let response = request
            .send()
            .await
            .map_err(|e| access_error(e.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(access_error(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        response
            .json::<Record>()
            .await
            .map(Some)
            .map_err(|e| access_error(format!("invalid record response: {}", e)))
    }

    async fn create_record(&self, table: &str, fields: FieldMap) -> Result<String> {
        let url = self.table_url(table, None)?;
        let request = self.client.post(url).json(&FieldsBody { fields: &fields });
        let response = self.send_write(table, request).await?;

        let created: CreatedResponse =
            response
                .json()
                .await
                .map_err(|e| PipelineError::StoreWriteError {
                    table: table.to_string(),
                    message: format!("invalid create response: {}", e),
                })?;
        Ok(created.id)
    }

    async fn update_record(&self, table: &str, id: &str, fields: FieldMap) -> Result<()> {
        let url = self.table_url(table, Some(id))?;
        let request = self.client.patch(url).json(&FieldsBody { fields: &fields });
        self.send_write(table, request).await?;
        Ok(())
    }
}
