//! Anomaly Stores
//!
//! A store takes ownership of each anomaly record and persists it. A failed
//! `persist` is reported to the caller and never retried here.

mod jsonl;
mod memory;
mod postgres;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use postgres::{DEFAULT_DATABASE_URL, PostgresStore};

use crate::error::StoreError;
use crate::record::AnomalyRecord;
use async_trait::async_trait;
use std::sync::Arc;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AnomalyStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    async fn persist(&self, record: AnomalyRecord) -> StoreResult<()>;
}

#[async_trait]
impl<S: AnomalyStore + ?Sized> AnomalyStore for Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn persist(&self, record: AnomalyRecord) -> StoreResult<()> {
        (**self).persist(record).await
    }
}

#[async_trait]
impl<S: AnomalyStore + ?Sized> AnomalyStore for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn persist(&self, record: AnomalyRecord) -> StoreResult<()> {
        (**self).persist(record).await
    }
}
