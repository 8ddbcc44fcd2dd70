/// Append-only CSV output of accepted records
use crate::admission::AcceptedRecord;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const CSV_HEADER: [&str; 2] = ["Title", "URL"];

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Called once when a run starts, with the topic the run searches for
    fn begin_run(&self, _topic: &str) {}

    /// Append `records` in order. Called once per admitted batch, after the store write.
    async fn append(&self, records: &[AcceptedRecord]) -> Result<()>;

    /// File the records end up in, for reporting
    fn location(&self) -> Option<PathBuf>;
}

/// `<topic>_<YYYY>年<MM>月<DD>日-<HH>时<mm>分.csv`, with path separators and
/// other characters illegal in file names replaced by `_`
pub fn csv_file_name(topic: &str, timestamp: &DateTime<Local>) -> String {
    let safe_topic: String = topic
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{}_{}.csv", safe_topic, timestamp.format("%Y年%m月%d日-%H时%M分"))
}

/// `dir/name.csv` -> `dir/name_bom.csv`
fn bom_sibling_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}_bom.{}", stem, ext.to_string_lossy()),
        None => format!("{}_bom", stem),
    };
    path.with_file_name(file_name)
}

/// Make sure an existing CSV starts with a UTF-8 BOM so spreadsheet tools pick
/// the right encoding. Returns the path to keep writing to: the original file,
/// or a `_bom` sibling when the original cannot be replaced.
pub async fn ensure_bom(path: &Path) -> Result<PathBuf> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(path.to_path_buf()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    if content.starts_with(UTF8_BOM) {
        return Ok(path.to_path_buf());
    }

    let mut repaired = Vec::with_capacity(UTF8_BOM.len() + content.len());
    repaired.extend_from_slice(UTF8_BOM);
    repaired.extend_from_slice(&content);

    let tmp_path = path.with_extension("csv.tmp");
    let replaced = async {
        tokio::fs::write(&tmp_path, &repaired).await?;
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    match replaced {
        Ok(()) => {
            info!("🔧 Added UTF-8 BOM to {}", path.display());
            Ok(path.to_path_buf())
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            let sibling = bom_sibling_path(path);
            tokio::fs::write(&sibling, &repaired)
                .await
                .with_context(|| format!("Failed to write {}", sibling.display()))?;
            warn!(
                "⚠️ Cannot replace {}, continuing in {}",
                path.display(),
                sibling.display()
            );
            Ok(sibling)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to add BOM to {}", path.display())),
    }
}

/// Two-column (`Title`, `URL`) CSV, UTF-8 with BOM, header written once per file
pub struct CsvSink {
    dir: PathBuf,
    path: Mutex<Option<PathBuf>>,
}

impl CsvSink {
    /// Sink writing to a fixed file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            path: Mutex::new(Some(path)),
        }
    }

    /// Sink whose file is named in `dir` once the run topic is known
    pub fn in_directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            path: Mutex::new(None),
        }
    }

    fn current_path(&self) -> Result<PathBuf> {
        self.path
            .lock()
            .map_err(|_| anyhow!("CSV sink path lock poisoned"))?
            .clone()
            .ok_or_else(|| anyhow!("CSV sink has no output file, begin_run was never called"))
    }

    fn encode_rows(records: &[AcceptedRecord], with_header: bool) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        if with_header {
            buffer.extend_from_slice(UTF8_BOM);
        }

        let mut writer = csv::WriterBuilder::new().from_writer(buffer);
        if with_header {
            writer.write_record(CSV_HEADER)?;
        }
        for record in records {
            writer.write_record([record.title.as_str(), record.url.as_str()])?;
        }
        writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush CSV rows: {}", e.error()))
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    fn begin_run(&self, topic: &str) {
        if let Ok(mut path) = self.path.lock() {
            if path.is_none() {
                let file = self.dir.join(csv_file_name(topic, &Local::now()));
                info!("📄 CSV output: {}", file.display());
                *path = Some(file);
            }
        }
    }

    async fn append(&self, records: &[AcceptedRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let path = ensure_bom(&self.current_path()?).await?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let is_new = !tokio::fs::try_exists(&path).await.unwrap_or(false);
        let bytes = Self::encode_rows(records, is_new)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        debug!("Appended {} rows to {}", records.len(), path.display());
        info!("📝 Wrote {} rows to CSV", records.len());

        if let Ok(mut current) = self.path.lock() {
            *current = Some(path);
        }
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        self.current_path().ok()
    }
}
