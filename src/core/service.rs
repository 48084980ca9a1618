use anyhow::Context;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::document_parser::{file_stem, DocumentParser};
use super::errors::{error_kind, CoreError};
use super::model_store::JsonVectorizerStore;
use super::models::{
    round_to, BulkUploadReport, Candidate, CandidateRecommendation, CandidateSummary,
    DocumentUpload, FailedUpload, HealthStatus, Job, JobRecommendations, JobSource, JobSummary,
    JobUploadResponse, RecommendationReport, RuntimeSettings, SectionSet, TrainingReport,
    UploadedDocument, SUPPORTED_FORMATS,
};
use super::normalizer::normalize;
use super::repository::{new_record_id, TalentRepository};
use super::sections::extract_sections;
use super::similarity::rank_batch;
use super::summary::{generate_candidate_summary, preview};
use super::vectorizer::{SparseVector, TfidfVectorizer};

pub const DEFAULT_JOB_TITLE: &str = "Untitled Position";

const SKILLS_PREVIEW_CHARS: usize = 300;
const EXPERIENCE_PREVIEW_CHARS: usize = 300;
const EDUCATION_PREVIEW_CHARS: usize = 200;

struct ParsedUpload {
    sections: SectionSet,
    text_length: usize,
}

pub struct ScreeningService {
    settings: RuntimeSettings,
    parser: DocumentParser,
    model_store: JsonVectorizerStore,
    vectorizer: RwLock<Option<TfidfVectorizer>>,
    repository: Mutex<TalentRepository>,
}

impl ScreeningService {
    /// A missing or unreadable vectorizer only disables ranking.
    pub async fn new(settings: RuntimeSettings) -> Self {
        let parser = DocumentParser::from_settings(&settings);
        let model_store = JsonVectorizerStore::new(settings.vectorizer_path.clone());

        let vectorizer = match model_store.load().await {
            Ok(Some(vectorizer)) => {
                info!(
                    path = %model_store.path().display(),
                    vocabulary = vectorizer.vocabulary_size(),
                    "vectorizer loaded"
                );
                Some(vectorizer)
            }
            Ok(None) => {
                warn!(
                    path = %model_store.path().display(),
                    "no trained vectorizer found; ranking disabled"
                );
                None
            }
            Err(err) => {
                warn!(
                    path = %model_store.path().display(),
                    "failed to load vectorizer; ranking disabled: {err:#}"
                );
                None
            }
        };

        Self {
            settings,
            parser,
            model_store,
            vectorizer: RwLock::new(vectorizer),
            repository: Mutex::new(TalentRepository::new()),
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub async fn is_pipeline_loaded(&self) -> bool {
        self.vectorizer.read().await.is_some()
    }

    pub async fn health(&self) -> HealthStatus {
        let pipeline_loaded = self.is_pipeline_loaded().await;
        let repository = self.repository.lock().await;
        HealthStatus {
            status: "healthy".to_string(),
            pipeline_loaded,
            supported_formats: SUPPORTED_FORMATS.iter().map(|f| f.to_string()).collect(),
            total_cvs: repository.candidate_count(),
            total_jobs: repository.job_count(),
        }
    }

    pub async fn parse_document(&self, upload: DocumentUpload) -> anyhow::Result<SectionSet> {
        Ok(self.parse_upload(upload).await?.sections)
    }

    pub async fn upload_cvs_bulk(
        &self,
        files: Vec<DocumentUpload>,
    ) -> anyhow::Result<BulkUploadReport> {
        if files.is_empty() {
            return Err(CoreError::InvalidRequest("No files provided".to_string()).into());
        }

        let mut report = BulkUploadReport::default();
        for upload in files {
            if upload.file_name.trim().is_empty() {
                continue;
            }

            let file_name = upload.file_name.clone();
            match self.parse_upload(upload).await {
                Ok(parsed) => {
                    let candidate = Candidate {
                        candidate_id: new_record_id(),
                        name: file_stem(&file_name),
                        file_name: file_name.clone(),
                        cleaned_text: normalize(parsed.sections.combined_text().as_str()),
                        sections: parsed.sections,
                        uploaded_at: Utc::now(),
                    };

                    report.successful.push(UploadedDocument {
                        file_name,
                        id: candidate.candidate_id.clone(),
                        name: candidate.name.clone(),
                        text_length: parsed.text_length,
                    });
                    self.repository.lock().await.insert_candidate(candidate);
                }
                Err(err) => {
                    warn!(file = %file_name, "failed to parse CV: {err:#}");
                    report.failed.push(failed_upload(file_name, &err));
                }
            }
        }

        report.total_cvs = self.repository.lock().await.candidate_count();
        info!(
            successful = report.successful.len(),
            failed = report.failed.len(),
            total = report.total_cvs,
            "bulk CV upload processed"
        );
        Ok(report)
    }

    pub async fn upload_job_file(
        &self,
        upload: DocumentUpload,
    ) -> anyhow::Result<JobUploadResponse> {
        if upload.file_name.trim().is_empty() {
            return Err(CoreError::InvalidRequest("No file selected".to_string()).into());
        }

        let file_name = upload.file_name.clone();
        let parsed = self
            .parse_upload(upload)
            .await
            .with_context(|| format!("failed to parse job description {file_name}"))?;

        let job = Job {
            job_id: new_record_id(),
            title: file_stem(&file_name),
            file_name: Some(file_name),
            cleaned_text: normalize(parsed.sections.combined_text().as_str()),
            sections: parsed.sections,
            source: JobSource::File,
            uploaded_at: Utc::now(),
        };

        Ok(self.store_job(job, parsed.text_length).await)
    }

    pub async fn add_job_text(
        &self,
        title: Option<&str>,
        text: &str,
    ) -> anyhow::Result<JobUploadResponse> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::InvalidRequest(
                "Job description text is required".to_string(),
            )
            .into());
        }

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_JOB_TITLE);
        let sections = extract_sections(text);

        let job = Job {
            job_id: new_record_id(),
            title: title.to_string(),
            file_name: None,
            cleaned_text: normalize(sections.combined_text().as_str()),
            sections,
            source: JobSource::Text,
            uploaded_at: Utc::now(),
        };

        Ok(self.store_job(job, text.chars().count()).await)
    }

    /// `None` ranks every job and every candidate.
    pub async fn recommend(
        &self,
        job_id: Option<&str>,
        top_n: Option<usize>,
    ) -> anyhow::Result<RecommendationReport> {
        let repository = self.repository.lock().await;
        if repository.candidate_count() == 0 {
            return Err(CoreError::EmptyInput("No CVs uploaded yet".to_string()).into());
        }
        if repository.job_count() == 0 {
            return Err(CoreError::EmptyInput("No jobs uploaded yet".to_string()).into());
        }

        let vectorizer_guard = self.vectorizer.read().await;
        let vectorizer = vectorizer_guard.as_ref().ok_or_else(|| {
            CoreError::VectorizerNotLoaded("train or install a vectorizer first".to_string())
        })?;

        let jobs: Vec<&Job> = match job_id {
            Some(id) => vec![repository
                .job(id)
                .ok_or_else(|| CoreError::JobNotFound(id.to_string()))?],
            None => repository.jobs().iter().collect(),
        };

        let job_vectors = jobs
            .iter()
            .map(|job| Ok((job.job_id.clone(), vectorizer.transform(&job.cleaned_text)?)))
            .collect::<Result<Vec<(String, SparseVector)>, CoreError>>()?;
        let candidate_vectors = repository
            .candidates()
            .iter()
            .map(|c| Ok((c.candidate_id.clone(), vectorizer.transform(&c.cleaned_text)?)))
            .collect::<Result<Vec<(String, SparseVector)>, CoreError>>()?;

        let top_n = top_n.unwrap_or(candidate_vectors.len());
        let ranked = rank_batch(&job_vectors, &candidate_vectors, top_n);

        let mut groups = Vec::with_capacity(jobs.len());
        for (job, (_, matches)) in jobs.iter().zip(ranked) {
            let candidates: Vec<CandidateRecommendation> = matches
                .iter()
                .filter_map(|m| {
                    let candidate = repository.candidate(&m.candidate_id)?;
                    Some(CandidateRecommendation {
                        rank: m.rank,
                        candidate_id: candidate.candidate_id.clone(),
                        name: candidate.name.clone(),
                        similarity_score: round_to(m.similarity_score, 4),
                        match_percentage: m.match_percentage(),
                        summary: generate_candidate_summary(candidate, m.similarity_score),
                        skills: preview(&candidate.sections.skills, SKILLS_PREVIEW_CHARS)
                            .to_string(),
                        experience: preview(
                            &candidate.sections.experience,
                            EXPERIENCE_PREVIEW_CHARS,
                        )
                        .to_string(),
                        education: preview(&candidate.sections.education, EDUCATION_PREVIEW_CHARS)
                            .to_string(),
                    })
                })
                .collect();

            groups.push(JobRecommendations {
                job_id: job.job_id.clone(),
                job_title: job.title.clone(),
                total_matches: candidates.len(),
                candidates,
            });
        }

        info!(
            jobs = groups.len(),
            candidates = repository.candidate_count(),
            "recommendations generated"
        );

        Ok(RecommendationReport {
            total_jobs: groups.len(),
            total_candidates: repository.candidate_count(),
            jobs: groups,
            generated_at: Utc::now(),
        })
    }

    pub async fn list_candidates(&self) -> Vec<CandidateSummary> {
        self.repository.lock().await.candidate_summaries()
    }

    pub async fn list_jobs(&self) -> Vec<JobSummary> {
        self.repository.lock().await.job_summaries()
    }

    pub async fn clear(&self) {
        let mut repository = self.repository.lock().await;
        let (cvs, jobs) = (repository.candidate_count(), repository.job_count());
        repository.clear();
        info!(cvs, jobs, "repository cleared");
    }

    pub async fn train_from_documents(
        &self,
        files: Vec<DocumentUpload>,
    ) -> anyhow::Result<TrainingReport> {
        let mut corpus = Vec::new();
        let mut failed = Vec::new();

        for upload in files {
            let file_name = upload.file_name.clone();
            match self.parse_upload(upload).await {
                Ok(parsed) => corpus.push(normalize(parsed.sections.combined_text().as_str())),
                Err(err) => {
                    warn!(file = %file_name, "skipping training document: {err:#}");
                    failed.push(failed_upload(file_name, &err));
                }
            }
        }

        if corpus.is_empty() {
            return Err(CoreError::EmptyInput(format!(
                "no training documents could be parsed: {}",
                describe_failures(&failed)
            ))
            .into());
        }

        let mut vectorizer = TfidfVectorizer::new(self.settings.max_features);
        vectorizer.fit(&corpus)?;
        self.model_store
            .save(&vectorizer)
            .await
            .context("failed to persist trained vectorizer")?;

        let report = TrainingReport {
            documents_used: corpus.len(),
            vocabulary_size: vectorizer.vocabulary_size(),
            vectorizer_path: self.model_store.path().to_path_buf(),
            failed,
        };
        self.install_vectorizer(vectorizer).await;
        Ok(report)
    }

    pub async fn install_vectorizer(&self, vectorizer: TfidfVectorizer) {
        let mut current = self.vectorizer.write().await;
        if current.is_some() {
            warn!("replacing active vectorizer; earlier similarity scores are invalidated");
        }
        info!(vocabulary = vectorizer.vocabulary_size(), "vectorizer installed");
        *current = Some(vectorizer);
    }

    async fn parse_upload(&self, upload: DocumentUpload) -> anyhow::Result<ParsedUpload> {
        let text = self
            .parser
            .parse_bytes(&upload.file_name, upload.data)
            .await?;
        debug!(file = %upload.file_name, chars = text.len(), "document parsed");

        Ok(ParsedUpload {
            text_length: text.chars().count(),
            sections: extract_sections(&text),
        })
    }

    async fn store_job(&self, job: Job, text_length: usize) -> JobUploadResponse {
        let mut repository = self.repository.lock().await;
        let job_id = job.job_id.clone();
        let title = job.title.clone();
        let total_jobs = repository.insert_job(job);
        info!(job_id = %job_id, title = %title, "job description stored");

        JobUploadResponse {
            job_id,
            title,
            text_length,
            total_jobs,
        }
    }
}

pub fn failed_upload(file_name: String, err: &anyhow::Error) -> FailedUpload {
    FailedUpload {
        file_name,
        error_kind: error_kind(err).to_string(),
        error: format!("{err:#}"),
    }
}

pub fn describe_failures(failed: &[FailedUpload]) -> String {
    if failed.is_empty() {
        return "no documents given".to_string();
    }

    failed
        .iter()
        .map(|f| format!("{} ({}: {})", f.file_name, f.error_kind, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn settings(root: &Path) -> RuntimeSettings {
        RuntimeSettings {
            vectorizer_path: root.join("models").join("vectorizer.json"),
            pdftotext_path: "/nonexistent/cv-match/pdftotext".to_string(),
            extraction_timeout_seconds: 5,
            ..RuntimeSettings::default()
        }
    }

    fn cv(name: &str, body: &str) -> DocumentUpload {
        DocumentUpload::new(format!("{name}.txt"), body.as_bytes().to_vec())
    }

    fn sample_cvs() -> Vec<DocumentUpload> {
        vec![
            cv(
                "Bob Java",
                "Skills: Java, Spring Boot, Hibernate\n\nExperience: 5 years building Java services",
            ),
            cv(
                "Alice Python",
                "Skills: Python, machine learning, data science\n\nExperience: 3 years as data scientist using Python",
            ),
        ]
    }

    async fn trained_service(root: &Path) -> ScreeningService {
        let service = ScreeningService::new(settings(root)).await;
        let mut corpus = sample_cvs();
        corpus.push(cv(
            "job",
            "Skills: Python, machine learning, data science, statistics",
        ));
        service.train_from_documents(corpus).await.unwrap();
        service
    }

    #[tokio::test]
    async fn new_service_without_vectorizer_is_healthy_but_not_loaded() {
        let temp = tempfile::tempdir().unwrap();
        let service = ScreeningService::new(settings(temp.path())).await;

        let health = service.health().await;
        assert_eq!(health.status, "healthy");
        assert!(!health.pipeline_loaded);
        assert_eq!(health.supported_formats, vec!["pdf", "docx", "txt"]);
        assert_eq!(health.total_cvs, 0);
    }

    #[tokio::test]
    async fn bulk_upload_collects_successes_and_failures() {
        let temp = tempfile::tempdir().unwrap();
        let service = ScreeningService::new(settings(temp.path())).await;

        let mut files = sample_cvs();
        files.push(DocumentUpload::new("resume.doc", b"old format".to_vec()));
        files.push(DocumentUpload::new("broken.txt", b"a\0b".to_vec()));
        files.push(DocumentUpload::new("", b"ignored".to_vec()));

        let report = service.upload_cvs_bulk(files).await.unwrap();
        assert_eq!(report.successful.len(), 2);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.total_cvs, 2);
        assert_eq!(report.successful[0].name, "Bob Java");
        assert_eq!(report.successful[0].id.len(), 8);
        assert_eq!(report.failed[0].error_kind, "unsupported_format");
        assert_eq!(report.failed[1].error_kind, "encoding_error");

        let listed = service.list_candidates().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].name, "Alice Python");
    }

    #[tokio::test]
    async fn bulk_upload_without_files_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let service = ScreeningService::new(settings(temp.path())).await;

        let err = service.upload_cvs_bulk(Vec::new()).await.unwrap_err();
        assert_eq!(error_kind(&err), "invalid_request");
    }

    #[tokio::test]
    async fn job_text_defaults_title_and_rejects_blank_text() {
        let temp = tempfile::tempdir().unwrap();
        let service = ScreeningService::new(settings(temp.path())).await;

        let response = service
            .add_job_text(None, "Skills: Python\n\nEducation: BSc")
            .await
            .unwrap();
        assert_eq!(response.title, DEFAULT_JOB_TITLE);
        assert_eq!(response.total_jobs, 1);

        let err = service.add_job_text(Some("Empty"), "   ").await.unwrap_err();
        assert_eq!(error_kind(&err), "invalid_request");

        let jobs = service.list_jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].source, JobSource::Text);
    }

    #[tokio::test]
    async fn job_file_title_comes_from_file_stem() {
        let temp = tempfile::tempdir().unwrap();
        let service = ScreeningService::new(settings(temp.path())).await;

        let response = service
            .upload_job_file(DocumentUpload::new(
                "Senior Data Scientist.txt",
                b"Skills: Python".to_vec(),
            ))
            .await
            .unwrap();
        assert_eq!(response.title, "Senior Data Scientist");
        assert_eq!(response.text_length, "Skills: Python".len());
        assert_eq!(service.list_jobs().await[0].source, JobSource::File);
    }

    #[tokio::test]
    async fn recommend_requires_candidates_jobs_and_vectorizer() {
        let temp = tempfile::tempdir().unwrap();
        let service = ScreeningService::new(settings(temp.path())).await;

        let err = service.recommend(None, None).await.unwrap_err();
        assert_eq!(error_kind(&err), "empty_input");

        service.upload_cvs_bulk(sample_cvs()).await.unwrap();
        let err = service.recommend(None, None).await.unwrap_err();
        assert_eq!(error_kind(&err), "empty_input");

        service.add_job_text(None, "Skills: Python").await.unwrap();
        let err = service.recommend(None, None).await.unwrap_err();
        assert_eq!(error_kind(&err), "vectorizer_not_loaded");
    }

    #[tokio::test]
    async fn recommend_ranks_closest_candidate_first() {
        let temp = tempfile::tempdir().unwrap();
        let service = trained_service(temp.path()).await;

        service.upload_cvs_bulk(sample_cvs()).await.unwrap();
        let job = service
            .add_job_text(
                Some("Data Scientist"),
                "Skills: Python, machine learning, data science",
            )
            .await
            .unwrap();

        let report = service.recommend(Some(job.job_id.as_str()), None).await.unwrap();
        assert_eq!(report.total_jobs, 1);
        assert_eq!(report.total_candidates, 2);

        let group = &report.jobs[0];
        assert_eq!(group.job_title, "Data Scientist");
        assert_eq!(group.total_matches, 2);
        assert_eq!(group.candidates[0].name, "Alice Python");
        assert_eq!(group.candidates[0].rank, 1);
        assert_eq!(group.candidates[1].rank, 2);
        assert!(group.candidates[0].similarity_score > group.candidates[1].similarity_score);
        assert!(group.candidates[0].summary.contains("Key skills: Python"));
        assert_eq!(group.candidates[0].skills, "Python, machine learning, data science");

        let top_one = service.recommend(None, Some(1)).await.unwrap();
        assert_eq!(top_one.jobs[0].candidates.len(), 1);

        let none = service.recommend(None, Some(0)).await.unwrap();
        assert_eq!(none.jobs.len(), 1);
        assert!(none.jobs[0].candidates.is_empty());
        assert_eq!(none.jobs[0].total_matches, 0);
    }

    #[tokio::test]
    async fn recommend_unknown_job_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let service = trained_service(temp.path()).await;
        service.upload_cvs_bulk(sample_cvs()).await.unwrap();
        service.add_job_text(None, "Skills: Python").await.unwrap();

        let err = service.recommend(Some("nope"), None).await.unwrap_err();
        assert_eq!(error_kind(&err), "job_not_found");
    }

    #[tokio::test]
    async fn trained_vectorizer_is_persisted_and_reloaded() {
        let temp = tempfile::tempdir().unwrap();
        let service = trained_service(temp.path()).await;
        assert!(service.is_pipeline_loaded().await);

        let reloaded = ScreeningService::new(settings(temp.path())).await;
        assert!(reloaded.is_pipeline_loaded().await);
    }

    #[tokio::test]
    async fn training_reports_failures_and_rejects_empty_corpus() {
        let temp = tempfile::tempdir().unwrap();
        let service = ScreeningService::new(settings(temp.path())).await;

        let err = service
            .train_from_documents(vec![DocumentUpload::new("cv.doc", b"x".to_vec())])
            .await
            .unwrap_err();
        assert_eq!(error_kind(&err), "empty_input");
        assert!(err.to_string().contains("cv.doc (unsupported_format"));
        assert!(!service.is_pipeline_loaded().await);

        let mut files = sample_cvs();
        files.push(DocumentUpload::new("cv.doc", b"x".to_vec()));
        let report = service.train_from_documents(files).await.unwrap();
        assert_eq!(report.documents_used, 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.vocabulary_size > 0);
        assert!(report.vectorizer_path.exists());
    }

    #[tokio::test]
    async fn clear_empties_repository() {
        let temp = tempfile::tempdir().unwrap();
        let service = ScreeningService::new(settings(temp.path())).await;
        service.upload_cvs_bulk(sample_cvs()).await.unwrap();
        service.add_job_text(None, "Skills: Python").await.unwrap();

        service.clear().await;
        let health = service.health().await;
        assert_eq!(health.total_cvs, 0);
        assert_eq!(health.total_jobs, 0);
    }
}
