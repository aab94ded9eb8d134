//! Model load progress and load lifecycle events.

use serde::{Deserialize, Serialize};

use super::pipeline::PipelineHandle;
use crate::error::EmbeddingError;

/// Stage of a model load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    /// A file is about to be read.
    Initiate,
    /// A file read has started.
    Download,
    /// Bytes of a file have been read.
    Progress,
    /// A file has been fully read.
    Done,
    /// The pipeline is usable.
    Ready,
}

/// One progress notification emitted while a pipeline loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadProgress {
    /// Stage.
    pub status: ProgressStatus,
    /// Model identifier.
    pub name: String,
    /// File being loaded, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Percentage of the current file read, 0 to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    /// Bytes read so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded: Option<u64>,
    /// Total bytes of the current file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl LoadProgress {
    fn new(status: ProgressStatus, name: &str, file: Option<&str>) -> Self {
        Self {
            status,
            name: name.to_string(),
            file: file.map(str::to_string),
            progress: None,
            loaded: None,
            total: None,
        }
    }

    /// A file is about to be loaded.
    #[must_use]
    pub fn initiate(name: &str, file: &str) -> Self {
        Self::new(ProgressStatus::Initiate, name, Some(file))
    }

    /// A file read has started.
    #[must_use]
    pub fn download(name: &str, file: &str) -> Self {
        Self::new(ProgressStatus::Download, name, Some(file))
    }

    /// `loaded` of `total` bytes of a file have been read.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(name: &str, file: &str, loaded: u64, total: u64) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            (loaded as f64 / total as f64 * 100.0) as f32
        };
        Self {
            progress: Some(percent),
            loaded: Some(loaded),
            total: Some(total),
            ..Self::new(ProgressStatus::Progress, name, Some(file))
        }
    }

    /// A file has been fully loaded.
    #[must_use]
    pub fn done(name: &str, file: &str) -> Self {
        Self::new(ProgressStatus::Done, name, Some(file))
    }

    /// The pipeline is ready.
    #[must_use]
    pub fn ready(name: &str) -> Self {
        Self::new(ProgressStatus::Ready, name, None)
    }
}

/// Event in a model load's lifecycle.
///
/// A load produces zero or more `Progress` events followed by exactly one
/// terminal `Ready` or `Failed`.
#[derive(Debug, Clone)]
pub enum LoadEvent {
    /// Loader-defined progress.
    Progress(LoadProgress),
    /// The shared pipeline is available.
    Ready(PipelineHandle),
    /// The load failed.
    Failed(EmbeddingError),
}

impl LoadEvent {
    /// Whether this event ends the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let p = LoadProgress::progress("gte-small", "model.onnx", 50, 200);
        assert_eq!(p.status, ProgressStatus::Progress);
        assert_eq!(p.progress, Some(25.0));
        assert_eq!(p.loaded, Some(50));
        assert_eq!(p.total, Some(200));
    }

    #[test]
    fn test_progress_empty_file_is_complete() {
        let p = LoadProgress::progress("gte-small", "tokenizer.json", 0, 0);
        assert_eq!(p.progress, Some(100.0));
    }

    #[test]
    fn test_progress_serialization() {
        let json = serde_json::to_value(LoadProgress::initiate("gte-small", "model.onnx")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "initiate",
                "name": "gte-small",
                "file": "model.onnx",
            })
        );

        let ready = serde_json::to_value(LoadProgress::ready("gte-small")).unwrap();
        assert_eq!(ready["status"], "ready");
        assert!(ready.get("file").is_none());
    }

    #[test]
    fn test_event_terminal() {
        assert!(!LoadEvent::Progress(LoadProgress::ready("m")).is_terminal());
        assert!(LoadEvent::Failed(EmbeddingError::ModelLoad("x".to_string())).is_terminal());
    }
}
