use uuid::Uuid;

use super::models::{Candidate, CandidateSummary, Job, JobSummary};

#[derive(Debug, Default)]
pub struct TalentRepository {
    candidates: Vec<Candidate>,
    jobs: Vec<Job>,
}

impl TalentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_candidate(&mut self, candidate: Candidate) -> usize {
        self.candidates.push(candidate);
        self.candidates.len()
    }

    pub fn insert_job(&mut self, job: Job) -> usize {
        self.jobs.push(job);
        self.jobs.len()
    }

    pub fn candidate(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates
            .iter()
            .find(|c| c.candidate_id == candidate_id)
    }

    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.job_id == job_id)
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn candidate_summaries(&self) -> Vec<CandidateSummary> {
        self.candidates
            .iter()
            .map(|c| CandidateSummary {
                candidate_id: c.candidate_id.clone(),
                name: c.name.clone(),
                file_name: c.file_name.clone(),
                uploaded_at: c.uploaded_at,
            })
            .collect()
    }

    pub fn job_summaries(&self) -> Vec<JobSummary> {
        self.jobs
            .iter()
            .map(|j| JobSummary {
                job_id: j.job_id.clone(),
                title: j.title.clone(),
                source: j.source,
                uploaded_at: j.uploaded_at,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.jobs.clear();
    }
}

pub fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}
