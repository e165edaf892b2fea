use crate::config::{CalendlyLinks, PipelineSettings};
use crate::domain::model::{
    InterviewRoundRecord, ProcessingSummary, RawCandidateRow, Record, RecordOutcome,
};
use crate::domain::ports::{DataStore, Sleeper, TokioSleeper};
use crate::utils::error::Result;
use crate::utils::validation::sanitize;
use std::time::Duration;

/// 將逗號分隔的輪次字串展開成一輪一筆的草稿
///
/// 缺少必要欄位或沒有任何有效輪次時回傳空陣列。
pub fn split_rounds(
    raw: &RawCandidateRow,
    calendly_links: &CalendlyLinks,
    max_round_length: usize,
) -> Vec<InterviewRoundRecord> {
    if raw.missing_field().is_some() {
        return Vec::new();
    }

    clean_round_tokens(&raw.interview_rounds_raw, max_round_length)
        .into_iter()
        .map(|round| {
            let link = calendly_links.link_for(&round);
            InterviewRoundRecord::draft(raw, round, link)
        })
        .collect()
}

/// 以逗號切開，去頭尾空白、合併連續空白，丟棄空字串
pub fn clean_round_tokens(raw: &str, max_round_length: usize) -> Vec<String> {
    raw.split(',')
        .map(|token| token.split_whitespace().collect::<Vec<_>>().join(" "))
        .map(|token| sanitize(&token, max_round_length))
        .filter(|token| !token.is_empty())
        .collect()
}

pub struct RoundSplitter<S: DataStore, Z: Sleeper = TokioSleeper> {
    store: S,
    sleeper: Z,
    clean_table: String,
    batch_size: usize,
    max_retries: u32,
    retry_delay: Duration,
    max_name_length: usize,
    max_round_length: usize,
    calendly_links: CalendlyLinks,
}

impl<S: DataStore> RoundSplitter<S> {
    pub fn new(store: S, settings: &PipelineSettings) -> Self {
        Self::with_sleeper(store, settings, TokioSleeper)
    }
}

impl<S: DataStore, Z: Sleeper> RoundSplitter<S, Z> {
    pub fn with_sleeper(store: S, settings: &PipelineSettings, sleeper: Z) -> Self {
        Self {
            store,
            sleeper,
            clean_table: settings.store.clean_table.clone(),
            batch_size: settings.split.batch_size.max(1),
            max_retries: settings.split.max_retries.max(1),
            retry_delay: settings.store_retry_delay(),
            max_name_length: settings.limits.max_name_length,
            max_round_length: settings.limits.max_round_length,
            calendly_links: settings.calendly_links.clone(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 分批處理原始資料；單筆寫入失敗只計入錯誤，不中斷整個 run
    pub async fn run_split(&self, rows: &[Record]) -> ProcessingSummary {
        let mut summary = ProcessingSummary::new(rows.len());
        let total_batches = rows.len().div_ceil(self.batch_size);

        for (batch_index, batch) in rows.chunks(self.batch_size).enumerate() {
            tracing::info!(
                "📦 Processing batch {}/{} ({} rows)",
                batch_index + 1,
                total_batches,
                batch.len()
            );

            for record in batch {
                for outcome in self.process_row(record).await {
                    summary.record(outcome);
                }
            }
        }

        tracing::info!(
            "📊 Split finished: {} created, {} errors, {} skipped",
            summary.processed_count,
            summary.error_count,
            summary.skipped_count
        );
        summary
    }

    async fn process_row(&self, record: &Record) -> Vec<RecordOutcome> {
        let raw = RawCandidateRow::from_record(record, self.max_name_length);

        if let Some(field) = raw.missing_field() {
            let reason = format!("missing {}", field);
            tracing::warn!("⏭️ Skipping row {}: {}", raw.id, reason);
            return vec![RecordOutcome::Skipped { reason }];
        }

        let drafts = split_rounds(&raw, &self.calendly_links, self.max_round_length);
        if drafts.is_empty() {
            let reason = "no interview rounds after cleaning".to_string();
            tracing::warn!("⏭️ Skipping row {}: {}", raw.id, reason);
            return vec![RecordOutcome::Skipped { reason }];
        }

        let mut outcomes = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let outcome = match self.create_with_retry(&draft).await {
                Ok(id) => {
                    tracing::debug!(
                        "Created {} round for {} as {}",
                        draft.round,
                        draft.email,
                        id
                    );
                    RecordOutcome::Created { id }
                }
                Err(e) => {
                    let message = format!(
                        "Row {} ({}, {} round): {}",
                        raw.id, draft.candidate_name, draft.round, e
                    );
                    tracing::error!("❌ {}", message);
                    RecordOutcome::Errored { message }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// 線性退避：第 n 次失敗後等待 n * retry_delay
    async fn create_with_retry(&self, draft: &InterviewRoundRecord) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self
                .store
                .create_record(&self.clean_table, draft.to_fields())
                .await
            {
                Ok(id) => return Ok(id),
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(
                        "⚠️ Create attempt {}/{} for {} round failed: {}",
                        attempt,
                        self.max_retries,
                        draft.round,
                        e
                    );
                    self.sleeper.sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
