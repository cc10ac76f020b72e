//! Output sinks for scraped product records

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::models::ProductRecord;

/// Trait for anything that accepts finished records
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, record: &ProductRecord) -> Result<()>;

    /// Flush buffered output at the end of a run
    async fn finish(&self) -> Result<()> {
        Ok(())
    }
}

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Writes one JSON object per line
pub struct JsonLinesSink {
    writer: Mutex<Writer>,
}

impl JsonLinesSink {
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self::from_writer(tokio::io::BufWriter::new(file)))
    }

    pub fn stdout() -> Self {
        Self::from_writer(tokio::io::stdout())
    }

    pub fn from_writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    async fn emit(&self, record: &ProductRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.writer.lock().await.write_all(&line).await?;
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ProductRecord {
        ProductRecord {
            name: "Pure Cotton Shirt - Navy".to_string(),
            product_id: id.to_string(),
            url: "https://www.marksandspencer.in/p/P60639245.html".to_string(),
            price: "1299".to_string(),
            color_name: Some("Navy".to_string()),
            color_code: Some("NY".to_string()),
            image_urls: vec!["https://assets.digitalcontent.marksandspencer.app/SD_01_NY_X_EC_0".to_string()],
            image_count: 1,
            image_url: Some("https://assets.digitalcontent.marksandspencer.app/SD_01_NY_X_EC_0".to_string()),
        }
    }

    #[tokio::test]
    async fn test_json_lines_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("products.jsonl");

        let sink = JsonLinesSink::create(&path).await.unwrap();
        sink.emit(&record("P60639245-NY")).await.unwrap();
        sink.emit(&record("P60639245-Y0")).await.unwrap();
        sink.finish().await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let ids: Vec<String> = written
            .lines()
            .map(|line| serde_json::from_str::<ProductRecord>(line).unwrap().product_id)
            .collect();
        assert_eq!(ids, vec!["P60639245-NY", "P60639245-Y0"]);
    }
}
