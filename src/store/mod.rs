//! Form and response storage.
//!
//! The aggregation core only reads through [`FormStore`]. The write path
//! lives on [`MemoryStore`], which also pulses the notification hub once a
//! submission is accepted.

pub mod memory;

use crate::error::StoreResult;
use crate::models::{AnswerRecord, Form};
use async_trait::async_trait;

pub use memory::{load_data, MemoryStore};

/// Read interface consumed by the long-poll coordinator.
#[async_trait]
pub trait FormStore: Send + Sync {
    /// Load a form. Fails with `StoreError::FormNotFound` if absent.
    async fn get_form(&self, form_id: &str) -> StoreResult<Form>;

    /// Load every accepted record for a form. May be empty.
    async fn get_records(&self, form_id: &str) -> StoreResult<Vec<AnswerRecord>>;
}
