use crate::domain::model::{FieldMap, Record};
use crate::domain::ports::DataStore;
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

/// 以本機目錄模擬資料庫，每個資料表存成一個 `{table}.json`
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn table_path(&self, table: &str) -> PathBuf {
        Path::new(&self.base_path).join(format!("{}.json", table))
    }

    fn read_table(&self, table: &str) -> Result<Vec<Record>> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn write_table(&self, table: &str, records: &[Record]) -> Result<()> {
        fs::create_dir_all(&self.base_path)?;
        let data = serde_json::to_vec_pretty(records)?;
        fs::write(self.table_path(table), data)?;
        Ok(())
    }

    fn next_id(records: &[Record]) -> String {
        let max = records
            .iter()
            .filter_map(|r| r.id.strip_prefix("rec"))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("rec{}", max + 1)
    }
}

#[async_trait]
impl DataStore for LocalStore {
    async fn select_all(&self, table: &str) -> Result<Vec<Record>> {
        if !self.base_path.is_dir() {
            return Err(PipelineError::StoreAccessError {
                table: table.to_string(),
                message: format!("directory {} does not exist", self.base_path.display()),
            });
        }
        self.read_table(table)
            .map_err(|e| PipelineError::StoreAccessError {
                table: table.to_string(),
                message: e.to_string(),
            })
    }

    async fn get_record(&self, table: &str, id: &str) -> Result<Option<Record>> {
        let records = self.select_all(table).await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    async fn create_record(&self, table: &str, fields: FieldMap) -> Result<String> {
        let write = || -> Result<String> {
            let mut records = self.read_table(table)?;
            let id = Self::next_id(&records);
            records.push(Record::new(id.clone(), fields));
            self.write_table(table, &records)?;
            Ok(id)
        };
        write().map_err(|e| PipelineError::StoreWriteError {
            table: table.to_string(),
            message: e.to_string(),
        })
    }

    async fn update_record(&self, table: &str, id: &str, fields: FieldMap) -> Result<()> {
        let write_error = |message: String| PipelineError::StoreWriteError {
            table: table.to_string(),
            message,
        };

        let mut records = self.read_table(table).map_err(|e| write_error(e.to_string()))?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| write_error(format!("record {} not found", id)))?;
        record.fields.extend(fields);
        self.write_table(table, &records)
            .map_err(|e| write_error(e.to_string()))
    }
}
