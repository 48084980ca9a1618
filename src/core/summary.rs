use super::models::Candidate;

const SUMMARY_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchLevel {
    Excellent,
    Good,
    Moderate,
    Low,
}

impl MatchLevel {
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            MatchLevel::Excellent
        } else if score > 0.5 {
            MatchLevel::Good
        } else if score > 0.3 {
            MatchLevel::Moderate
        } else {
            MatchLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchLevel::Excellent => "Excellent",
            MatchLevel::Good => "Good",
            MatchLevel::Moderate => "Moderate",
            MatchLevel::Low => "Low",
        }
    }
}

pub fn generate_candidate_summary(candidate: &Candidate, score: f64) -> String {
    let mut summary = format!("{} match. ", MatchLevel::from_score(score).as_str());

    let skills = preview(&candidate.sections.skills, SUMMARY_PREVIEW_CHARS);
    let skills = skills.trim();
    if !skills.is_empty() {
        summary.push_str(&format!("Key skills: {skills}... "));
    }

    let experience = preview(&candidate.sections.experience, SUMMARY_PREVIEW_CHARS);
    let experience = experience.trim();
    if !experience.is_empty() {
        summary.push_str(&format!("Experience: {experience}..."));
    }

    summary
}

pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
