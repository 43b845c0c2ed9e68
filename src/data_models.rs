use chrono::{DateTime, Utc};
use nanoid::nanoid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TERM: &str = "seguros colectivos";
pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const MAX_RESULTS_CAP: usize = 50;
pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("invalid request body: {0}")]
    MalformedBody(String),
}

/// One matched item from the target site. Never mutated after it is stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub search_term: String,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionResult {
    pub fn new(title: String, description: String, url: String, search_term: String) -> Self {
        ExtractionResult {
            id: nanoid!(),
            title,
            description,
            url,
            search_term,
            extracted_at: Utc::now(),
        }
    }

    /// Case-insensitive substring match over title and description.
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    pub max_results: usize,
    pub headless: bool,
}

impl SearchQuery {
    pub fn new(term: &str, max_results: usize, headless: bool) -> Result<Self, ValidationError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ValidationError::MissingField("term"));
        }
        if max_results == 0 || max_results > MAX_RESULTS_CAP {
            return Err(ValidationError::OutOfRange {
                field: "max_results",
                expected: "between 1 and 50",
                value: max_results.to_string(),
            });
        }
        Ok(SearchQuery {
            term: term.to_string(),
            max_results,
            headless,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    limit: u64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Result<Self, ValidationError> {
        if page < 1 {
            return Err(ValidationError::OutOfRange {
                field: "page",
                expected: ">= 1",
                value: page.to_string(),
            });
        }
        if limit < 1 {
            return Err(ValidationError::OutOfRange {
                field: "limit",
                expected: "> 0",
                value: limit.to_string(),
            });
        }
        Ok(Pagination {
            page: page as u64,
            limit: limit as u64,
        })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Number of entries to skip, saturating for absurd page numbers.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn pages_for(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultQuery {
    pub term: Option<String>,
    pub pagination: Pagination,
}

impl ResultQuery {
    pub fn new(term: Option<&str>, pagination: Pagination) -> Self {
        let term = term
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        ResultQuery { term, pagination }
    }

    /// The filter term, lowercased for matching.
    pub fn needle(&self) -> Option<String> {
        self.term.as_ref().map(|t| t.to_lowercase())
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ResultPage {
    pub items: Vec<ExtractionResult>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
    pub last_updated: Option<DateTime<Utc>>,
}
