use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::errors::CoreError;

pub const DEFAULT_MAX_FEATURES: usize = 5000;
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn from_entries(mut entries: Vec<(usize, f64)>) -> Self {
        entries.retain(|(_, weight)| *weight != 0.0);
        entries.sort_by_key(|(index, _)| *index);
        entries.dedup_by_key(|(index, _)| *index);
        Self { entries }
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> f64 {
        self.entries
            .binary_search_by_key(&index, |(i, _)| *i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut a, mut b) = (0, 0);
        let mut sum = 0.0;
        while a < self.entries.len() && b < other.entries.len() {
            let (ia, wa) = self.entries[a];
            let (ib, wb) = other.entries[b];
            match ia.cmp(&ib) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => {
                    sum += wa * wb;
                    a += 1;
                    b += 1;
                }
            }
        }
        sum
    }

    pub fn l2_norm(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyTerm {
    pub term: String,
    pub idf: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorizerArtifact {
    pub format_version: u32,
    pub max_features: usize,
    pub document_count: usize,
    pub terms: Vec<VocabularyTerm>,
}

#[derive(Debug, Clone)]
struct FittedVocabulary {
    document_count: usize,
    terms: Vec<VocabularyTerm>,
    index: HashMap<String, usize>,
}

impl FittedVocabulary {
    fn new(document_count: usize, terms: Vec<VocabularyTerm>) -> Self {
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.term.clone(), i))
            .collect();
        Self {
            document_count,
            terms,
            index,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    max_features: usize,
    fitted: Option<FittedVocabulary>,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features: max_features.max(1),
            fitted: None,
        }
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.fitted.as_ref().map(|v| v.terms.len()).unwrap_or(0)
    }

    pub fn document_count(&self) -> usize {
        self.fitted.as_ref().map(|v| v.document_count).unwrap_or(0)
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        let fitted = self.fitted.as_ref()?;
        fitted.index.get(term).map(|&i| fitted.terms[i].idf)
    }

    pub fn fit<S: AsRef<str>>(&mut self, corpus: &[S]) -> Result<(), CoreError> {
        if corpus.is_empty() {
            return Err(CoreError::EmptyInput(
                "cannot fit a vectorizer on an empty corpus".to_string(),
            ));
        }

        let mut term_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for document in corpus {
            let counts = count_tokens(document.as_ref());
            for (term, count) in counts {
                *doc_freq.entry(term.to_string()).or_insert(0) += 1;
                *term_counts.entry(term.to_string()).or_insert(0) += count;
            }
        }

        if term_counts.is_empty() {
            return Err(CoreError::EmptyInput(
                "training corpus produced an empty vocabulary".to_string(),
            ));
        }

        // BTreeMap iteration is alphabetical, and the sort is stable, so ties keep term order.
        let mut ranked: Vec<(String, usize)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(self.max_features);

        let mut selected: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        selected.sort();

        let n = corpus.len() as f64;
        let terms = selected
            .into_iter()
            .map(|term| {
                let df = doc_freq.get(&term).copied().unwrap_or(0) as f64;
                // smoothed idf
                let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
                VocabularyTerm { term, idf }
            })
            .collect::<Vec<_>>();

        if self.fitted.is_some() {
            warn!("refitting vectorizer; previously computed scores are no longer comparable");
        }
        info!(
            documents = corpus.len(),
            vocabulary = terms.len(),
            "vectorizer fitted"
        );

        self.fitted = Some(FittedVocabulary::new(corpus.len(), terms));
        Ok(())
    }

    pub fn transform(&self, text: &str) -> Result<SparseVector, CoreError> {
        let fitted = self.fitted.as_ref().ok_or_else(|| {
            CoreError::VectorizerNotLoaded("transform called before fit or load".to_string())
        })?;

        let entries: Vec<(usize, f64)> = count_tokens(text)
            .into_iter()
            .filter_map(|(term, count)| {
                fitted
                    .index
                    .get(term)
                    .map(|&i| (i, count as f64 * fitted.terms[i].idf))
            })
            .collect();

        let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        let normalized = if norm > 0.0 {
            entries.into_iter().map(|(i, w)| (i, w / norm)).collect()
        } else {
            Vec::new()
        };

        Ok(SparseVector::from_entries(normalized))
    }

    pub fn to_artifact(&self) -> Result<VectorizerArtifact, CoreError> {
        let fitted = self.fitted.as_ref().ok_or_else(|| {
            CoreError::VectorizerNotLoaded("nothing to persist before fit".to_string())
        })?;

        Ok(VectorizerArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            max_features: self.max_features,
            document_count: fitted.document_count,
            terms: fitted.terms.clone(),
        })
    }

    pub fn from_artifact(artifact: VectorizerArtifact) -> Result<Self, CoreError> {
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(CoreError::VectorizerNotLoaded(format!(
                "unsupported vectorizer format version {}",
                artifact.format_version
            )));
        }
        if artifact.terms.is_empty() {
            return Err(CoreError::VectorizerNotLoaded(
                "vectorizer artifact has an empty vocabulary".to_string(),
            ));
        }

        Ok(Self {
            max_features: artifact.max_features.max(1),
            fitted: Some(FittedVocabulary::new(
                artifact.document_count,
                artifact.terms,
            )),
        })
    }
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FEATURES)
    }
}

fn count_tokens(text: &str) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for token in TOKEN_RE.find_iter(text) {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fitted(corpus: &[&str], max_features: usize) -> TfidfVectorizer {
        let mut vectorizer = TfidfVectorizer::new(max_features);
        vectorizer.fit(corpus).unwrap();
        vectorizer
    }

    #[test]
    fn transform_before_fit_is_not_loaded_error() {
        let vectorizer = TfidfVectorizer::default();
        let err = vectorizer.transform("python").unwrap_err();
        assert!(matches!(err, CoreError::VectorizerNotLoaded(_)));
    }

    #[test]
    fn fit_on_empty_corpus_fails() {
        let mut vectorizer = TfidfVectorizer::default();
        let corpus: [&str; 0] = [];
        assert!(matches!(
            vectorizer.fit(&corpus),
            Err(CoreError::EmptyInput(_))
        ));
        assert!(matches!(
            vectorizer.fit(&["", "a b c"]),
            Err(CoreError::EmptyInput(_))
        ));
    }

    #[test]
    fn smoothed_idf_matches_formula() {
        let vectorizer = fitted(&["python sql", "python java", "rust"], 100);
        let expected_python = (4.0_f64 / 3.0).ln() + 1.0;
        let expected_rust = (4.0_f64 / 2.0).ln() + 1.0;
        assert!((vectorizer.idf("python").unwrap() - expected_python).abs() < 1e-12);
        assert!((vectorizer.idf("rust").unwrap() - expected_rust).abs() < 1e-12);
        assert_eq!(vectorizer.document_count(), 3);
    }

    #[test]
    fn vocabulary_is_capped_by_corpus_frequency() {
        let vectorizer = fitted(
            &["python python python sql sql java", "python sql rust"],
            2,
        );
        assert_eq!(vectorizer.vocabulary_size(), 2);
        assert!(vectorizer.idf("python").is_some());
        assert!(vectorizer.idf("sql").is_some());
        assert!(vectorizer.idf("java").is_none());
    }

    #[test]
    fn single_character_tokens_are_ignored() {
        let vectorizer = fitted(&["c r python"], 100);
        assert_eq!(vectorizer.vocabulary_size(), 1);
    }

    #[test]
    fn transform_is_unit_length_and_ignores_unknown_terms() {
        let vectorizer = fitted(&["python machine learning", "java spring boot"], 100);
        let vector = vectorizer.transform("python learning kubernetes").unwrap();
        assert_eq!(vector.nnz(), 2);
        assert!((vector.l2_norm() - 1.0).abs() < 1e-12);

        let unknown = vectorizer.transform("kubernetes terraform").unwrap();
        assert!(unknown.is_zero());
    }

    #[test]
    fn artifact_restores_identical_vectors() {
        let vectorizer = fitted(&["python machine learning", "java spring boot"], 100);
        let restored =
            TfidfVectorizer::from_artifact(vectorizer.to_artifact().unwrap()).unwrap();

        let text = "python spring learning";
        assert_eq!(
            vectorizer.transform(text).unwrap(),
            restored.transform(text).unwrap()
        );
    }

    #[test]
    fn artifact_with_unknown_version_is_rejected() {
        let mut artifact = fitted(&["python"], 10).to_artifact().unwrap();
        artifact.format_version = 99;
        assert!(TfidfVectorizer::from_artifact(artifact).is_err());
    }

    #[test]
    fn sparse_dot_only_multiplies_shared_indices() {
        let a = SparseVector::from_entries(vec![(3, 2.0), (0, 1.0)]);
        let b = SparseVector::from_entries(vec![(3, 0.5), (7, 4.0)]);
        assert_eq!(a.dot(&b), 1.0);
        assert_eq!(a.get(0), 1.0);
        assert_eq!(a.get(5), 0.0);
    }
}
