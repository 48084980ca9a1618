use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
        "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
        "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
        "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
        "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
        "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
        "for", "with", "about", "against", "between", "into", "through", "during", "before",
        "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
        "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
        "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
        "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will",
        "just", "don", "should", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren",
        "couldn", "didn", "doesn", "hadn", "hasn", "haven", "isn", "ma", "mightn", "mustn",
        "needn", "shan", "shouldn", "wasn", "weren", "won", "wouldn",
    ]
    .into_iter()
    .collect()
});

// Irregular plurals plus words that only look plural. Every value is left
// untouched by the suffix rules.
static LEMMA_EXCEPTIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("children", "child"),
        ("people", "person"),
        ("men", "man"),
        ("women", "woman"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("mice", "mouse"),
        ("geese", "goose"),
        ("analyses", "analysis"),
        ("theses", "thesis"),
        ("crises", "crisis"),
        ("diagnoses", "diagnosis"),
        ("criteria", "criterion"),
        ("phenomena", "phenomenon"),
        ("indices", "index"),
        ("matrices", "matrix"),
        ("vertices", "vertex"),
        ("lives", "life"),
        ("wives", "wife"),
        ("knives", "knife"),
        ("leaves", "leaf"),
        ("halves", "half"),
        ("movies", "movie"),
        ("cookies", "cookie"),
        ("caches", "cache"),
        ("niches", "niche"),
        ("series", "series"),
        ("species", "species"),
        ("news", "news"),
        ("physics", "physics"),
        ("mathematics", "mathematics"),
        ("economics", "economics"),
        ("analytics", "analytics"),
        ("statistics", "statistics"),
        ("electronics", "electronics"),
        ("logistics", "logistics"),
        ("ethics", "ethics"),
        ("kubernetes", "kubernetes"),
        ("windows", "windows"),
        ("sales", "sales"),
    ]
    .into_iter()
    .collect()
});

const MAX_REDUCTIONS: usize = 8;

pub fn normalize<'a>(text: impl Into<Option<&'a str>>) -> String {
    let Some(text) = text.into() else {
        return String::new();
    };

    let lowered = text.to_lowercase();
    let letters_only: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_whitespace())
        .collect();

    letters_only
        .split_whitespace()
        .filter(|token| !is_stopword(token))
        .map(lemmatize)
        .filter(|lemma| !is_stopword(lemma))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

// lemmatize(lemmatize(w)) == lemmatize(w)
pub fn lemmatize(token: &str) -> String {
    let mut current = token.to_string();
    for _ in 0..MAX_REDUCTIONS {
        let next = reduce_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn reduce_once(word: &str) -> String {
    if let Some(lemma) = LEMMA_EXCEPTIONS.get(word) {
        return (*lemma).to_string();
    }

    if word.len() <= 3 || word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }

    if word.len() > 4 {
        if let Some(stem) = word.strip_suffix("ies") {
            return format!("{stem}y");
        }
    }

    for suffix in ["sses", "ches", "shes", "xes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }

    match word.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => word.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_missing_input_yield_empty_string() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(None), "");
        assert_eq!(normalize("   \n\t "), "");
    }

    #[test]
    fn strips_digits_punctuation_and_stopwords() {
        assert_eq!(
            normalize("I have 5+ years of Python, SQL & Machine-Learning!"),
            "year python sql machinelearning"
        );
    }

    #[test]
    fn lemmatizes_plural_nouns() {
        assert_eq!(
            normalize("Databases, processes, batches, policies and children"),
            "database process batch policy child"
        );
    }

    #[test]
    fn guarded_endings_are_left_alone() {
        assert_eq!(lemmatize("business"), "business");
        assert_eq!(lemmatize("status"), "status");
        assert_eq!(lemmatize("analysis"), "analysis");
        assert_eq!(lemmatize("gas"), "gas");
    }

    #[test]
    fn lemma_that_becomes_stopword_is_dropped() {
        assert_eq!(normalize("others"), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "Skills: Python, TensorFlow, Machine Learning\n\nExperience: 4 years as Data Scientist",
            "Women in tech: analyses of indices, matrices & series (2019-2023)",
            "Mens' shoes, glasses, classes, boxes, wishes, buses, mice, movies",
            "Ünïcödé TEXT with ÄCCENTS and İstanbul",
            "others ours theirs hers yours",
        ];

        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(once.as_str()), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn lemmatize_reaches_a_fixed_point() {
        for word in [
            "mens", "glasses", "classes", "boxes", "wishes", "buses", "movies", "ties", "analyses",
            "statistics", "watches", "caches",
        ] {
            let lemma = lemmatize(word);
            assert_eq!(lemmatize(&lemma), lemma, "unstable lemma for {word}");
        }
    }
}
