use super::{AnomalyStore, StoreResult};
use crate::error::StoreError;
use crate::record::AnomalyRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::info;

/// Append-only JSON-lines files, one per local hour:
/// `<dir>/anomalies_YYYYMMDDHH.jsonl`.
pub struct JsonlStore {
    dir: PathBuf,
    current: Mutex<Option<(String, BufWriter<File>)>>,
}

impl JsonlStore {
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        info!(dir = %dir.display(), "JSONL anomaly store ready");
        Ok(Self {
            dir,
            current: Mutex::new(None),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_for_hour(&self, hour: &str) -> PathBuf {
        self.dir.join(format!("anomalies_{}.jsonl", hour))
    }

    async fn open_hour(&self, hour: &str) -> StoreResult<BufWriter<File>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for_hour(hour))
            .await?;
        Ok(BufWriter::with_capacity(16 * 1024, file))
    }
}

#[async_trait]
impl AnomalyStore for JsonlStore {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn persist(&self, record: AnomalyRecord) -> StoreResult<()> {
        let mut line =
            serde_json::to_vec(&record).map_err(|e| StoreError::Serialize(e.to_string()))?;
        line.push(b'\n');

        let hour = chrono::Local::now().format("%Y%m%d%H").to_string();
        let mut current = self.current.lock().await;

        let rotate = match current.as_ref() {
            Some((open_hour, _)) => *open_hour != hour,
            None => true,
        };
        if rotate {
            if let Some((_, mut old)) = current.take() {
                old.flush().await?;
            }
            let writer = self.open_hour(&hour).await?;
            *current = Some((hour, writer));
        }

        if let Some((_, writer)) = current.as_mut() {
            writer.write_all(&line).await?;
            writer.flush().await?;
        }
        Ok(())
    }
}
