use crate::WorkspaceError;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::BTreeMap;

static READY_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https://paiza\.jp/challenges/[0-9]+/ready$").unwrap());
static PROBLEM_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z][0-9]+):").unwrap());
static CHALLENGE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/challenges/([0-9]+)/").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

/// Metadata of a single paiza problem, scraped from its ready page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemMetadata {
    challenge_id: String,
    problem_id: String,
    ready_url: String,
}

impl ProblemMetadata {
    pub fn challenge_id(&self) -> &str {
        &self.challenge_id
    }

    pub fn problem_id(&self) -> &str {
        &self.problem_id
    }

    pub fn ready_url(&self) -> &str {
        &self.ready_url
    }

    /// Flat key-value projection of the record.
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("challenge_id", self.challenge_id.clone()),
            ("problem_id", self.problem_id.clone()),
            ("ready_url", self.ready_url.clone()),
        ])
    }
}

/// Fails unless `url` is exactly `https://paiza.jp/challenges/<digits>/ready`.
pub fn validate_ready_url(url: &str) -> Result<(), WorkspaceError> {
    if !READY_URL.is_match(url) {
        return Err(WorkspaceError::InvalidReadyUrl(url.to_string()));
    }
    Ok(())
}

/// Extracts the problem id (e.g. `B106`) from a page title such as `B106:席替えの席決め`.
///
/// The first `<letter><digits>:` wins, wherever it sits in the title.
pub fn parse_problem_id(title: &str) -> Result<String, WorkspaceError> {
    PROBLEM_ID
        .captures(title)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| WorkspaceError::ProblemId(title.to_string()))
}

pub fn parse_challenge_id(ready_url: &str) -> Result<String, WorkspaceError> {
    CHALLENGE_ID
        .captures(ready_url)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| WorkspaceError::ChallengeId(ready_url.to_string()))
}

pub fn create_metadata(title: &str, ready_url: &str) -> Result<ProblemMetadata, WorkspaceError> {
    let problem_id = parse_problem_id(title)?;
    let challenge_id = parse_challenge_id(ready_url)?;
    Ok(ProblemMetadata {
        challenge_id,
        problem_id,
        ready_url: ready_url.to_string(),
    })
}

/// Reads the document title out of a saved ready page.
pub fn title_from_html(html: &str) -> Result<String, WorkspaceError> {
    let document = Html::parse_document(html);
    document
        .select(&TITLE)
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
        .ok_or(WorkspaceError::TitleNotFound)
}

/// Builds metadata from a saved ready page instead of a live browser session.
pub fn metadata_from_page(html: &str, ready_url: &str) -> Result<ProblemMetadata, WorkspaceError> {
    validate_ready_url(ready_url)?;
    let title = title_from_html(html)?;
    create_metadata(&title, ready_url)
}
