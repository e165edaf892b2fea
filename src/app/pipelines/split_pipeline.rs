use crate::config::PipelineSettings;
use crate::core::splitter::RoundSplitter;
use crate::domain::model::ProcessingSummary;
use crate::domain::ports::{DataStore, Sleeper, TokioSleeper};
use crate::utils::validation::Validate;

/// 讀取原始候選人資料表並展開成每輪一筆
pub struct SplitPipeline<S: DataStore, Z: Sleeper = TokioSleeper> {
    splitter: RoundSplitter<S, Z>,
    raw_table: String,
    max_error_length: usize,
}

impl<S: DataStore> SplitPipeline<S> {
    pub fn new(store: S, settings: &PipelineSettings) -> Self {
        Self::with_sleeper(store, settings, TokioSleeper)
    }
}

impl<S: DataStore, Z: Sleeper> SplitPipeline<S, Z> {
    pub fn with_sleeper(store: S, settings: &PipelineSettings, sleeper: Z) -> Self {
        Self {
            splitter: RoundSplitter::with_sleeper(store, settings, sleeper),
            raw_table: settings.store.raw_table.clone(),
            max_error_length: settings.email.max_error_length,
        }
    }

    pub async fn run(&self) -> ProcessingSummary {
        tracing::info!("🚀 Starting split run from table '{}'", self.raw_table);

        let rows = match self.splitter.store().select_all(&self.raw_table).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("❌ Cannot load raw rows: {}", e);
                return ProcessingSummary::fatal(e.sanitized_message(self.max_error_length));
            }
        };
        tracing::info!("📂 Loaded {} raw rows", rows.len());

        self.splitter.run_split(&rows).await
    }
}

/// 設定不合法時直接回傳 fatal summary，不讀取任何資料表
pub async fn execute_split<S: DataStore>(store: S, settings: &PipelineSettings) -> ProcessingSummary {
    if let Err(e) = settings.validate() {
        tracing::error!("❌ {}", e);
        return ProcessingSummary::fatal(e.sanitized_message(settings.email.max_error_length));
    }
    SplitPipeline::new(store, settings).run().await
}
