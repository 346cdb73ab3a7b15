//! In-memory document store with optional JSON file persistence.

use crate::error::{StoreError, StoreResult};
use crate::models::{AnswerRecord, Form, FormPayload};
use crate::realtime::Hub;
use crate::store::FormStore;
use crate::validation::{validate_answers, validate_form};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Everything the store holds; also the on-disk JSON layout.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub forms: HashMap<String, Form>,
    #[serde(default)]
    pub responses: HashMap<String, Vec<AnswerRecord>>,
}

/// Form store backed by a `RwLock<StoreData>`.
pub struct MemoryStore {
    data: RwLock<StoreData>,
    hub: Hub,
    data_file: Option<PathBuf>,
}

impl MemoryStore {
    /// Create an empty, non-persistent store.
    pub fn new(hub: Hub) -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            hub,
            data_file: None,
        }
    }

    /// Open a store persisted at `path`, loading it if the file exists.
    pub async fn open(path: impl Into<PathBuf>, hub: Hub) -> StoreResult<Self> {
        let path = path.into();
        let data = load_data(&path).await?;
        info!(
            "Opened store at {} ({} forms)",
            path.display(),
            data.forms.len()
        );

        Ok(Self {
            data: RwLock::new(data),
            hub,
            data_file: Some(path),
        })
    }

    /// Create a new form from a validated payload.
    pub async fn create_form(&self, payload: FormPayload) -> StoreResult<Form> {
        validate_form(&payload)?;

        let now = Utc::now();
        let form = Form {
            id: uuid::Uuid::new_v4().to_string(),
            title: payload.title,
            fields: payload.fields,
            created_at: now,
            updated_at: now,
            response_count: 0,
            last_response_at: None,
        };

        let mut data = self.data.write().await;
        data.forms.insert(form.id.clone(), form.clone());
        if let Err(e) = self.persist(&data).await {
            data.forms.remove(&form.id);
            return Err(e);
        }

        info!("Created form {} ({} fields)", form.id, form.fields.len());
        Ok(form)
    }

    /// Replace the title and schema of an existing form.
    pub async fn update_form(&self, form_id: &str, payload: FormPayload) -> StoreResult<Form> {
        validate_form(&payload)?;

        let mut data = self.data.write().await;
        let form = data
            .forms
            .get_mut(form_id)
            .ok_or_else(|| StoreError::FormNotFound(form_id.to_string()))?;
        let previous = form.clone();
        form.title = payload.title;
        form.fields = payload.fields;
        form.updated_at = Utc::now();
        let updated = form.clone();
        if let Err(e) = self.persist(&data).await {
            data.forms.insert(form_id.to_string(), previous);
            return Err(e);
        }

        Ok(updated)
    }

    /// Accept a submission, bump the form's response metadata and notify waiters.
    pub async fn submit_response(
        &self,
        form_id: &str,
        answers: BTreeMap<String, Value>,
    ) -> StoreResult<AnswerRecord> {
        let record = {
            let mut data = self.data.write().await;
            let form = data
                .forms
                .get_mut(form_id)
                .ok_or_else(|| StoreError::FormNotFound(form_id.to_string()))?;

            let errors = validate_answers(form, &answers);
            if !errors.is_empty() {
                debug!("Rejected submission for {}: {:?}", form_id, errors);
                return Err(StoreError::InvalidAnswers(errors));
            }

            // The freshness marker must strictly advance, even within one millisecond.
            let mut now = Utc::now();
            if let Some(prev) = form.last_response_at {
                if now.timestamp_millis() <= prev.timestamp_millis() {
                    now = prev + Duration::milliseconds(1);
                }
            }

            let previous = form.clone();
            form.response_count += 1;
            form.last_response_at = Some(now);
            form.updated_at = now;

            let record = AnswerRecord {
                id: uuid::Uuid::new_v4().to_string(),
                form_id: form_id.to_string(),
                submitted_at: now,
                answers,
            };
            data.responses
                .entry(form_id.to_string())
                .or_default()
                .push(record.clone());

            // Nothing is visible to readers until the file write succeeded.
            if let Err(e) = self.persist(&data).await {
                warn!("Rolling back response for {}: {}", form_id, e);
                data.forms.insert(form_id.to_string(), previous);
                if let Some(records) = data.responses.get_mut(form_id) {
                    records.pop();
                    if records.is_empty() {
                        data.responses.remove(form_id);
                    }
                }
                return Err(e);
            }
            record
        };

        self.hub.notify(form_id);
        debug!("Accepted response {} for form {}", record.id, form_id);
        Ok(record)
    }

    /// All stored responses for a form.
    pub async fn list_responses(&self, form_id: &str) -> Vec<AnswerRecord> {
        self.data
            .read()
            .await
            .responses
            .get(form_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn persist(&self, data: &StoreData) -> StoreResult<()> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(data)?;
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };

        // Write-then-rename so a failed write never leaves a torn file behind.
        let tmp = temp_path(path);
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)
    }
}

#[async_trait]
impl FormStore for MemoryStore {
    async fn get_form(&self, form_id: &str) -> StoreResult<Form> {
        self.data
            .read()
            .await
            .forms
            .get(form_id)
            .cloned()
            .ok_or_else(|| StoreError::FormNotFound(form_id.to_string()))
    }

    async fn get_records(&self, form_id: &str) -> StoreResult<Vec<AnswerRecord>> {
        Ok(self.list_responses(form_id).await)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read a persisted store file. A missing file yields an empty store.
pub async fn load_data(path: &Path) -> StoreResult<StoreData> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreData::default()),
        Err(source) => Err(StoreError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}
