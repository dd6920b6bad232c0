use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use dashmap::DashMap;
use serde::Deserialize;

use crate::catalog::Facility;
use crate::model::Selection;
use crate::pipeline::PipelineError;

/// Key holding the serialized form submission.
pub const FORM_DATA_KEY: &str = "formData";
/// Key holding the user id (student/staff number).
pub const USER_ID_KEY: &str = "rnumber";

/// Raw stored values. Compared as-is by the change detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub form_data: String,
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormData {
    selected_library: String,
    date: String,
}

impl Snapshot {
    /// Decode the stored values into a selection.
    pub fn decode(&self) -> Result<Selection, PipelineError> {
        let form: FormData = serde_json::from_str(&self.form_data)
            .map_err(|e| PipelineError::StoreRead(format!("corrupt {FORM_DATA_KEY}: {e}")))?;
        let facility: Facility = form.selected_library.parse()?;
        let date = parse_date(&form.date)?;
        let user_id = self
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PipelineError::StoreRead(format!("no {USER_ID_KEY} stored")))?;
        Ok(Selection {
            facility,
            date,
            user_id: user_id.to_string(),
        })
    }
}

/// `YYYY-MM-DD`, or an RFC 3339 instant taken as a local calendar day.
fn parse_date(raw: &str) -> Result<NaiveDate, PipelineError> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Local).date_naive())
        .map_err(|e| PipelineError::StoreRead(format!("bad date {raw:?}: {e}")))
}

/// Where the submitted selection lives. Written elsewhere, only read here.
#[async_trait]
pub trait SelectionStore: Send + Sync + 'static {
    /// `Ok(None)` until a selection has been submitted.
    async fn read_snapshot(&self) -> Result<Option<Snapshot>, PipelineError>;
}

/// One file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read_key(&self, key: &str) -> Result<Option<String>, PipelineError> {
        match tokio::fs::read_to_string(self.dir.join(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PipelineError::StoreRead(format!("{key}: {e}"))),
        }
    }

    /// Write a key. Used by the submission side and by tests.
    pub async fn write(&self, key: &str, value: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(key), value).await
    }
}

#[async_trait]
impl SelectionStore for FileStore {
    async fn read_snapshot(&self) -> Result<Option<Snapshot>, PipelineError> {
        let Some(form_data) = self.read_key(FORM_DATA_KEY).await? else {
            return Ok(None);
        };
        let user_id = self.read_key(USER_ID_KEY).await?;
        Ok(Some(Snapshot { form_data, user_id }))
    }
}

/// In-process key-value store. Clones of the `Arc` can write from any task.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Store a selection the way the submission form does.
    pub fn submit(&self, facility: Facility, date: NaiveDate) {
        let form = serde_json::json!({
            "selectedLibrary": facility.as_str(),
            "date": date.format("%Y-%m-%d").to_string(),
        });
        self.set(FORM_DATA_KEY, form.to_string());
    }
}

#[async_trait]
impl SelectionStore for MemoryStore {
    async fn read_snapshot(&self) -> Result<Option<Snapshot>, PipelineError> {
        let Some(form_data) = self.entries.get(FORM_DATA_KEY).map(|v| v.value().clone()) else {
            return Ok(None);
        };
        let user_id = self.entries.get(USER_ID_KEY).map(|v| v.value().clone());
        Ok(Some(Snapshot { form_data, user_id }))
    }
}
