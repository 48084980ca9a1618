use once_cell::sync::Lazy;
use regex::Regex;

use super::models::SectionSet;

// Header, then separators, then the first line and every following non-blank line.
const BODY: &str = r"[\s:]+([^\n]+(?:\n[^\n]+)*)";

fn section_regex(headers: &str) -> Regex {
    Regex::new(&format!(r"(?i)(?:{headers}){BODY}")).unwrap()
}

static SKILLS_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        section_regex(r"skills?|technical skills?|competencies"),
        section_regex(r"expertise|proficiencies"),
    ]
});

static EXPERIENCE_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        section_regex(r"experience|work experience|employment history"),
        section_regex(r"professional experience|career history"),
    ]
});

static EDUCATION_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        section_regex(r"education|academic background|qualifications?"),
        section_regex(r"degrees?|certifications?"),
    ]
});

pub fn extract_sections(text: &str) -> SectionSet {
    SectionSet {
        skills: first_match(&SKILLS_REGEXES, text),
        experience: first_match(&EXPERIENCE_REGEXES, text),
        education: first_match(&EDUCATION_REGEXES, text),
        full_text: text.to_string(),
    }
}

fn first_match(regexes: &[Regex], text: &str) -> String {
    for regex in regexes {
        if let Some(captures) = regex.captures(text) {
            if let Some(body) = captures.get(1) {
                return body.as_str().trim().to_string();
            }
        }
    }

    String::new()
}
