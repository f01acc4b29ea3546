use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use form_spec::FormValues;

use crate::error::SinkError;

/// Accepts validated values and answers with a submission id.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn submit(&self, form_id: &str, values: &FormValues) -> Result<String, SinkError>;
}

/// A stored submission, as consumed by the submissions table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: String,
    pub form_id: String,
    pub values: FormValues,
    pub timestamp: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn new(id: impl Into<String>, form_id: impl Into<String>, values: FormValues) -> Self {
        Self {
            id: id.into(),
            form_id: form_id.into(),
            values,
            timestamp: Utc::now(),
        }
    }
}

/// Keeps submissions in memory and hands out random ids.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<SubmissionRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<SubmissionRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl SubmissionSink for MemorySink {
    async fn submit(&self, form_id: &str, values: &FormValues) -> Result<String, SinkError> {
        let id = Uuid::new_v4().to_string();
        self.records
            .lock()
            .await
            .push(SubmissionRecord::new(id.clone(), form_id, values.clone()));
        Ok(id)
    }
}

/// Flat view of submissions with a column per value key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl SubmissionTable {
    const FIXED: [&'static str; 3] = ["id", "formId", "timestamp"];

    /// Columns are `id`, `formId`, `timestamp`, then every value key in
    /// first-seen order. Missing values are `null`.
    pub fn from_records(records: &[SubmissionRecord]) -> Self {
        let mut columns: Vec<String> = Self::FIXED.iter().map(|name| name.to_string()).collect();
        for record in records {
            for key in record.values.keys() {
                if !columns[Self::FIXED.len()..].contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                let mut row = vec![
                    Value::String(record.id.clone()),
                    Value::String(record.form_id.clone()),
                    Value::String(record.timestamp.to_rfc3339()),
                ];
                row.extend(
                    columns[Self::FIXED.len()..]
                        .iter()
                        .map(|key| record.values.get(key).cloned().unwrap_or(Value::Null)),
                );
                row
            })
            .collect();

        Self { columns, rows }
    }
}
