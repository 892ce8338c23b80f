//! Link extraction collaborator
//!
//! The pipeline turns a response body into raw link strings through the
//! [`LinkExtractor`] trait. Resolution, scheme filtering and fragment handling
//! happen afterwards in the policy chain, so extractors return attribute
//! values untouched.

use scraper::{Html, Selector};

/// Reads link-like attribute values out of a response body
pub trait LinkExtractor: Send + Sync {
    fn extract_links(&self, body: &str) -> Vec<String>;
}

/// Extracts every `href` and `src` attribute from an HTML document
///
/// Attributes are returned in document order; an element carrying both
/// yields its `href` first.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlLinkExtractor;

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_links(&self, body: &str) -> Vec<String> {
        let document = Html::parse_document(body);

        let selector = match Selector::parse("[href], [src]") {
            Ok(selector) => selector,
            Err(_) => return Vec::new(),
        };

        let mut links = Vec::new();
        for element in document.select(&selector) {
            for attribute in ["href", "src"] {
                if let Some(value) = element.value().attr(attribute) {
                    if !value.trim().is_empty() {
                        links.push(value.to_string());
                    }
                }
            }
        }
        links
    }
}

/// Adapts a plain function or closure into a [`LinkExtractor`]
pub struct FnLinkExtractor<F>(pub F);

impl<F> LinkExtractor for FnLinkExtractor<F>
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn extract_links(&self, body: &str) -> Vec<String> {
        (self.0)(body)
    }
}
