use super::models::RankedMatch;
use super::vectorizer::SparseVector;

pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let norm_product = a.l2_norm() * b.l2_norm();
    if norm_product == 0.0 {
        return 0.0;
    }

    (a.dot(b) / norm_product).clamp(0.0, 1.0)
}

pub fn rank_candidates(
    job_id: &str,
    job_vector: &SparseVector,
    candidates: &[(String, SparseVector)],
    top_n: usize,
) -> Vec<RankedMatch> {
    let mut scored: Vec<(&str, f64)> = candidates
        .iter()
        .map(|(id, vector)| (id.as_str(), cosine_similarity(job_vector, vector)))
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_n);

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (candidate_id, score))| RankedMatch {
            job_id: job_id.to_string(),
            candidate_id: candidate_id.to_string(),
            similarity_score: score,
            rank: i + 1,
        })
        .collect()
}

pub fn rank_batch(
    jobs: &[(String, SparseVector)],
    candidates: &[(String, SparseVector)],
    top_n: usize,
) -> Vec<(String, Vec<RankedMatch>)> {
    jobs.iter()
        .map(|(job_id, vector)| {
            (
                job_id.clone(),
                rank_candidates(job_id, vector, candidates, top_n),
            )
        })
        .collect()
}
