use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::api::ApiClient;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Uploading,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileUploadResponse {
    pub id: String,
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub url: Option<String>,
}

/// Local view of one file sent for processing. Starts with a temporary id
/// and adopts the server-assigned one once the upload completes; the status
/// is mutated in place as the pipeline advances.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub status: FileStatus,
    pub progress: Option<u8>,
    pub checksum: String,
}

impl FileDescriptor {
    fn pending_upload(filename: &str, size: u64, mime_type: &str, checksum: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            size,
            mime_type: mime_type.to_string(),
            status: FileStatus::Uploading,
            progress: None,
            checksum,
        }
    }

    fn adopt_server_id(&mut self, upload: &FileUploadResponse) {
        self.id = upload.id.clone();
        self.status = FileStatus::Pending;
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ProcessOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessStatus {
    pub id: String,
    pub status: FileStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CsvAnalysisOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(rename = "analysisType", skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsvParseResponse {
    pub success: bool,
    pub data: Vec<Value>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsvAnalysis {
    pub summary: String,
    #[serde(default)]
    pub insights: Option<Vec<String>>,
    #[serde(default)]
    pub statistics: Option<Value>,
    #[serde(rename = "sampleData", default)]
    pub sample_data: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsvAnalysisResponse {
    pub success: bool,
    pub data: CsvAnalysis,
}

/// Bounded status polling. The original front-end polled every second with
/// no upper limit; the timeout here closes that liveness hole.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Continue,
    Done,
    Failed(String),
}

/// Terminal decision for one observed status.
pub fn classify_status(status: &ProcessStatus) -> PollOutcome {
    match status.status {
        FileStatus::Completed => PollOutcome::Done,
        FileStatus::Failed => PollOutcome::Failed(
            status
                .error
                .clone()
                .unwrap_or_else(|| "File processing failed".to_string()),
        ),
        _ => PollOutcome::Continue,
    }
}

/// Coarse progress figure reported to callers, per the original mapping.
pub fn progress_percent(status: FileStatus) -> u8 {
    match status {
        FileStatus::Completed => 100,
        FileStatus::Processing => 50,
        _ => 25,
    }
}

pub struct FileService<'a> {
    api: &'a ApiClient,
}

impl<'a> FileService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Multipart upload. The descriptor carries a sha-256 checksum of the
    /// local bytes and adopts the server id on completion.
    pub fn upload(&self, path: &Path) -> Result<FileDescriptor> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.bin".to_string());
        let checksum = hex::encode(Sha256::digest(&bytes));
        let mime_type = mime_for(&filename);
        let mut descriptor =
            FileDescriptor::pending_upload(&filename, bytes.len() as u64, mime_type, checksum);

        let part = MultipartPart::bytes(bytes)
            .file_name(filename.clone())
            .mime_str(mime_type)
            .context("invalid mime type for upload")?;
        let form = MultipartForm::new().part("file", part);
        let response = self.api.post_multipart("files/upload", form)?;
        let upload: FileUploadResponse =
            serde_json::from_value(response).context("upload response had unexpected shape")?;
        descriptor.adopt_server_id(&upload);
        Ok(descriptor)
    }

    pub fn process(&self, id: &str, options: &ProcessOptions) -> Result<ProcessStatus> {
        let response = self
            .api
            .post_json(&format!("files/{id}/process"), &serde_json::to_value(options)?)?;
        serde_json::from_value(response).context("process response had unexpected shape")
    }

    pub fn status(&self, id: &str) -> Result<ProcessStatus> {
        let response = self.api.get_json(&format!("files/{id}/status"), &[])?;
        serde_json::from_value(response).context("status response had unexpected shape")
    }

    pub fn download(&self, id: &str) -> Result<Vec<u8>> {
        self.api.get_bytes(&format!("files/{id}/download"))
    }

    pub fn parse_csv(&self, csv_data: &str) -> Result<CsvParseResponse> {
        let response = self
            .api
            .post_json("csv/parse", &serde_json::json!({ "csvData": csv_data }))?;
        serde_json::from_value(response).context("csv parse response had unexpected shape")
    }

    pub fn generate_csv(&self, rows: &[Value]) -> Result<Vec<u8>> {
        self.api
            .post_for_bytes("csv/generate", &serde_json::json!({ "data": rows }))
    }

    pub fn analyze_csv(
        &self,
        csv_data: &str,
        options: &CsvAnalysisOptions,
    ) -> Result<CsvAnalysisResponse> {
        let payload = serde_json::json!({
            "csvData": csv_data,
            "options": serde_json::to_value(options)?,
        });
        let response = self.api.post_json("csv/analyze", &payload)?;
        serde_json::from_value(response).context("csv analysis response had unexpected shape")
    }

    /// Upload, request processing, poll to a terminal state within the
    /// policy's bound, then download and decode the analysis result.
    pub fn upload_and_analyze(
        &self,
        path: &Path,
        options: &CsvAnalysisOptions,
        policy: PollPolicy,
        mut on_progress: Option<&mut dyn FnMut(u8)>,
    ) -> Result<CsvAnalysisResponse> {
        let mut descriptor = self.upload(path)?;
        let process_options = ProcessOptions {
            model: options.model.clone(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };
        self.process(&descriptor.id, &process_options)?;

        let started = Instant::now();
        loop {
            let status = self.status(&descriptor.id)?;
            descriptor.status = status.status;
            descriptor.progress = Some(progress_percent(status.status));
            if let Some(report) = on_progress.as_deref_mut() {
                report(progress_percent(status.status));
            }
            match classify_status(&status) {
                PollOutcome::Done => break,
                PollOutcome::Failed(message) => bail!("file processing failed: {message}"),
                PollOutcome::Continue => {}
            }
            if started.elapsed() >= policy.timeout {
                bail!(
                    "file processing timed out after {:.0}s",
                    policy.timeout.as_secs_f64()
                );
            }
            thread::sleep(policy.interval);
        }

        let bytes = self.download(&descriptor.id)?;
        serde_json::from_slice(&bytes).context("analysis result was not valid JSON")
    }
}

fn mime_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => "text/csv",
        "json" => "application/json",
        "txt" | "md" => "text/plain",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}
