use crate::domain::model::{FieldMap, OutboundEmail, Record};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// 外部表格資料庫
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select_all(&self, table: &str) -> Result<Vec<Record>>;

    /// 找不到該 id 時回傳 `None`
    async fn get_record(&self, table: &str, id: &str) -> Result<Option<Record>>;

    /// 建立一筆資料並回傳資料庫指派的 id
    async fn create_record(&self, table: &str, fields: FieldMap) -> Result<String>;

    async fn update_record(&self, table: &str, id: &str, fields: FieldMap) -> Result<()>;
}

/// 單次寄信呼叫。失敗時回傳可讀的失敗原因
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn deliver(
        &self,
        email: &OutboundEmail,
        timeout: Duration,
    ) -> std::result::Result<String, String>;
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

