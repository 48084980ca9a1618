use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SUPPORTED_FORMATS: [&str; 3] = ["pdf", "docx", "txt"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
}

impl DocumentFormat {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|v| v.to_str())
            .map(|v| v.to_ascii_lowercase())?;

        match extension.as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "txt" => Some(DocumentFormat::Txt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Txt => "txt",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SectionSet {
    pub skills: String,
    pub experience: String,
    pub education: String,
    pub full_text: String,
}

impl SectionSet {
    pub fn combined_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.skills, self.experience, self.education, self.full_text
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub candidate_id: String,
    pub name: String,
    pub file_name: String,
    pub sections: SectionSet,
    pub cleaned_text: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    File,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub title: String,
    pub file_name: Option<String>,
    pub sections: SectionSet,
    pub cleaned_text: String,
    pub source: JobSource,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedMatch {
    pub job_id: String,
    pub candidate_id: String,
    pub similarity_score: f64,
    pub rank: usize,
}

impl RankedMatch {
    pub fn match_percentage(&self) -> f64 {
        round_to(self.similarity_score * 100.0, 2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecommendation {
    pub rank: usize,
    pub candidate_id: String,
    pub name: String,
    pub similarity_score: f64,
    pub match_percentage: f64,
    pub summary: String,
    pub skills: String,
    pub experience: String,
    pub education: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecommendations {
    pub job_id: String,
    pub job_title: String,
    pub candidates: Vec<CandidateRecommendation>,
    pub total_matches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationReport {
    pub jobs: Vec<JobRecommendations>,
    pub total_jobs: usize,
    pub total_candidates: usize,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    pub file_name: String,
    pub id: String,
    pub name: String,
    pub text_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpload {
    pub file_name: String,
    pub error_kind: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUploadReport {
    pub successful: Vec<UploadedDocument>,
    pub failed: Vec<FailedUpload>,
    pub total_cvs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUploadResponse {
    pub job_id: String,
    pub title: String,
    pub text_length: usize,
    pub total_jobs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
    pub candidate_id: String,
    pub name: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: String,
    pub title: String,
    pub source: JobSource,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub pipeline_loaded: bool,
    pub supported_formats: Vec<String>,
    pub total_cvs: usize,
    pub total_jobs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub documents_used: usize,
    pub vocabulary_size: usize,
    pub vectorizer_path: PathBuf,
    pub failed: Vec<FailedUpload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeSettings {
    pub vectorizer_path: PathBuf,
    pub max_features: usize,
    pub default_top_n: usize,
    pub max_upload_bytes: usize,
    pub pdftotext_path: String,
    pub extraction_timeout_seconds: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            vectorizer_path: super::settings_store::app_data_root()
                .join("models")
                .join("vectorizer.json"),
            max_features: 5000,
            default_top_n: 5,
            max_upload_bytes: 50 * 1024 * 1024,
            pdftotext_path: "pdftotext".to_string(),
            extraction_timeout_seconds: 120,
        }
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
