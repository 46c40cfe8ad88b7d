use scraper::{Html, Selector};

use crate::{Error, Result};

/// Pulls the result links out of a search results page.
///
/// Holds a pre-parsed selector and the result cap, so a single extractor is reused for every
/// page of a run.
#[derive(Debug, Clone)]
pub struct ResultExtractor {
    selector: Selector,
    cap: usize,
}

impl ResultExtractor {
    pub fn new(selector: &str, cap: usize) -> Result<Self> {
        Ok(Self {
            selector: create_selector(selector)?,
            cap,
        })
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Returns the `href` of every anchor matching the selector, in document order,
    /// truncated to the cap.
    /// Malformed markup never fails, a page without matching anchors simply yields nothing.
    pub fn extract(&self, html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        doc.select(&self.selector)
            .filter_map(|anchor| anchor.value().attr("href"))
            .map(str::to_string)
            .take(self.cap)
            .collect()
    }
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECTOR: &str = "a.result__url";

    fn results_page(n: usize) -> String {
        let mut body = String::from(r#"<html><body><div id="links"><a href="/settings">Settings</a>"#);
        for i in 1..=n {
            body.push_str(&format!(
                r#"<div class="result"><a class="result__a" href="https://title{i}.example">Title {i}</a>
                   <a class="result__url" href="https://site{i}.example/page">site{i}.example</a></div>"#
            ));
        }
        body.push_str("</div></body></html>");
        body
    }

    #[test]
    fn extracts_links_in_document_order() {
        let extractor = ResultExtractor::new(SELECTOR, 25).unwrap();
        let urls = extractor.extract(&results_page(3));
        assert_eq!(
            urls,
            vec![
                "https://site1.example/page",
                "https://site2.example/page",
                "https://site3.example/page",
            ]
        );
    }

    #[test]
    fn truncates_to_cap() {
        let extractor = ResultExtractor::new(SELECTOR, 5).unwrap();
        let urls = extractor.extract(&results_page(30));
        assert_eq!(urls.len(), 5);
        assert_eq!(urls[4], "https://site5.example/page");
    }

    #[test]
    fn never_returns_more_than_matching_anchors() {
        let extractor = ResultExtractor::new(SELECTOR, 25).unwrap();
        assert_eq!(extractor.extract(&results_page(7)).len(), 7);
    }

    #[test]
    fn anchors_without_href_are_skipped() {
        let extractor = ResultExtractor::new(SELECTOR, 25).unwrap();
        let html = r#"<a class="result__url">no link</a><a class="result__url" href="https://a.example">a</a>"#;
        assert_eq!(extractor.extract(html), vec!["https://a.example"]);
    }

    #[test]
    fn hrefs_are_returned_verbatim() {
        let extractor = ResultExtractor::new(SELECTOR, 25).unwrap();
        let html = r#"<a class="result__url" href="  https://r1.example/?a=1&amp;b=2  ">r1</a>"#;
        assert_eq!(extractor.extract(html), vec!["  https://r1.example/?a=1&b=2  "]);
    }

    #[test]
    fn malformed_or_foreign_markup_yields_nothing() {
        let extractor = ResultExtractor::new(SELECTOR, 25).unwrap();
        assert!(extractor.extract("<html><body><div><a href=").is_empty());
        assert!(extractor.extract("").is_empty());
        assert!(extractor
            .extract(r#"<div class="captcha"><a href="https://duckduckgo.com">retry</a></div>"#)
            .is_empty());
    }

    #[test]
    fn bad_selector_is_an_error() {
        assert!(matches!(
            ResultExtractor::new("a[[", 10),
            Err(Error::ParseMissingSelector(_))
        ));
    }
}
