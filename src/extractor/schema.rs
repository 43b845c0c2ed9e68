use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("results container `{0}` not found, the page layout may have changed")]
    MissingContainer(String),

    #[error("result #{index} has no {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("result #{index} has an unusable link `{href}`")]
    InvalidLink { index: usize, href: String },
}

/// CSS selectors describing the search results markup of the target site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchemaSelectors {
    pub container: String,
    pub item: String,
    pub title: String,
    pub link: String,
    pub description: String,
}

impl Default for SchemaSelectors {
    fn default() -> Self {
        SchemaSelectors {
            container: "div.search-results".to_string(),
            item: "article.result-item".to_string(),
            title: ".result-title".to_string(),
            link: "a.result-link".to_string(),
            description: ".result-description".to_string(),
        }
    }
}

/// A parsed search hit, not yet stamped into an `ExtractionResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedItem {
    pub title: String,
    pub description: String,
    pub url: String,
}

/// Items parsed before the first malformed one, plus that failure if any.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub items: Vec<ParsedItem>,
    pub failure: Option<ParseError>,
}

#[derive(Debug, Clone)]
pub struct ResultSchema {
    selectors: SchemaSelectors,
    container: Selector,
    item: Selector,
    title: Selector,
    link: Selector,
    description: Selector,
}

impl ResultSchema {
    pub fn compile(selectors: SchemaSelectors) -> Result<Self, ParseError> {
        Ok(ResultSchema {
            container: compile_selector(&selectors.container)?,
            item: compile_selector(&selectors.item)?,
            title: compile_selector(&selectors.title)?,
            link: compile_selector(&selectors.link)?,
            description: compile_selector(&selectors.description)?,
            selectors,
        })
    }

    pub fn selectors(&self) -> &SchemaSelectors {
        &self.selectors
    }

    /// Selector the browser waits for before reading the page.
    pub fn ready_selector(&self) -> &str {
        &self.selectors.container
    }

    /// Parses at most `max` items in document order.
    ///
    /// A missing container is a hard error. A malformed item stops parsing,
    /// keeping everything parsed before it.
    pub fn parse(&self, html: &str, page_url: &Url, max: usize) -> Result<ParseOutcome, ParseError> {
        let document = Html::parse_document(html);
        let container = document
            .select(&self.container)
            .next()
            .ok_or_else(|| ParseError::MissingContainer(self.selectors.container.clone()))?;

        let mut outcome = ParseOutcome::default();
        for (index, element) in container.select(&self.item).take(max).enumerate() {
            match self.parse_item(element, index + 1, page_url) {
                Ok(item) => outcome.items.push(item),
                Err(e) => {
                    outcome.failure = Some(e);
                    break;
                }
            }
        }
        Ok(outcome)
    }

    fn parse_item(
        &self,
        element: ElementRef<'_>,
        index: usize,
        page_url: &Url,
    ) -> Result<ParsedItem, ParseError> {
        let title = element
            .select(&self.title)
            .next()
            .map(collapsed_text)
            .filter(|t| !t.is_empty())
            .ok_or(ParseError::MissingField {
                index,
                field: "title",
            })?;

        // the item itself may be the link
        let href = element
            .select(&self.link)
            .next()
            .or_else(|| self.link.matches(&element).then_some(element))
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(ParseError::MissingField {
                index,
                field: "link",
            })?;

        let url = page_url
            .join(href)
            .ok()
            .filter(|u| u.scheme() == "http" || u.scheme() == "https")
            .ok_or_else(|| ParseError::InvalidLink {
                index,
                href: href.to_string(),
            })?;

        let description = element
            .select(&self.description)
            .next()
            .map(collapsed_text)
            .unwrap_or_default();

        Ok(ParsedItem {
            title,
            description,
            url: url.to_string(),
        })
    }
}

impl Default for ResultSchema {
    fn default() -> Self {
        // built-in selectors are known to be valid
        ResultSchema::compile(SchemaSelectors::default()).expect("default selectors compile")
    }
}

fn compile_selector(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}

fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
