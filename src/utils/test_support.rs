//! In-memory doubles for the store and timing ports, shared by unit tests.

use crate::domain::model::{fields, FieldMap, Record};
use crate::domain::ports::{DataStore, Sleeper};
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct StoreState {
    tables: HashMap<String, Vec<Record>>,
    next_id: usize,
    fail_next_creates: usize,
    failing_round: Option<String>,
    round_attempts: HashMap<String, usize>,
    fail_select: bool,
    fail_updates: bool,
    updates: Vec<(String, String, FieldMap)>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(table: &str, rows: Vec<Record>) -> Self {
        let store = Self::new();
        store
            .state
            .lock()
            .unwrap()
            .tables
            .insert(table.to_string(), rows);
        store
    }

    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_next_creates(&self, count: usize) {
        self.state.lock().unwrap().fail_next_creates = count;
    }

    pub fn fail_creates_for_round(&self, round: &str) {
        self.state.lock().unwrap().failing_round = Some(round.to_string());
    }

    pub fn create_attempts_for_round(&self, round: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .round_attempts
            .get(round)
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_select(&self) {
        self.state.lock().unwrap().fail_select = true;
    }

    pub fn fail_updates(&self) {
        self.state.lock().unwrap().fail_updates = true;
    }

    /// 所有 update 呼叫 (table, id, fields)，包含失敗的
    pub fn updates(&self) -> Vec<(String, String, FieldMap)> {
        self.state.lock().unwrap().updates.clone()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select_all(&self, table: &str) -> Result<Vec<Record>> {
        let state = self.state.lock().unwrap();
        if state.fail_select {
            return Err(PipelineError::StoreAccessError {
                table: table.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(state.tables.get(table).cloned().unwrap_or_default())
    }

    async fn get_record(&self, table: &str, id: &str) -> Result<Option<Record>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .cloned())
    }

    async fn create_record(&self, table: &str, values: FieldMap) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let round = values
            .get(fields::INTERVIEW_ROUND)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        *state.round_attempts.entry(round.clone()).or_default() += 1;

        let write_error = PipelineError::StoreWriteError {
            table: table.to_string(),
            message: "429 Too Many Requests".to_string(),
        };
        if state.fail_next_creates > 0 {
            state.fail_next_creates -= 1;
            return Err(write_error);
        }
        if state.failing_round.as_deref() == Some(round.as_str()) {
            return Err(write_error);
        }

        state.next_id += 1;
        let id = format!("rec{}", state.next_id);
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(Record::new(id.clone(), values));
        Ok(id)
    }

    async fn update_record(&self, table: &str, id: &str, values: FieldMap) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .updates
            .push((table.to_string(), id.to_string(), values.clone()));
        if state.fail_updates {
            return Err(PipelineError::StoreWriteError {
                table: table.to_string(),
                message: "503 Service Unavailable".to_string(),
            });
        }
        if let Some(record) = state
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
        {
            record.fields.extend(values);
        }
        Ok(())
    }
}

/// 只記錄延遲時間，不真的等待
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
