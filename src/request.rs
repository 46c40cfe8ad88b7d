use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use tracing::error;

use crate::parse::ResultExtractor;
use crate::{Error, Result};

/// The endpoint serves a stripped or blocked page to clients it doesn't recognize.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SearchEngine {
    #[value(name = "duckduckgo")]
    DuckDuckGo,
}

impl SearchEngine {
    /// Results page URL, the percent-encoded term is appended to it.
    pub fn endpoint(&self) -> &'static str {
        match self {
            SearchEngine::DuckDuckGo => "https://duckduckgo.com/html/?q=",
        }
    }

    pub fn result_selector(&self) -> &'static str {
        match self {
            SearchEngine::DuckDuckGo => "a.result__url",
        }
    }

    pub fn search_url(&self, term: &str) -> String {
        format!("{}{}", self.endpoint(), urlencoding::encode(term))
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchEngine::DuckDuckGo => write!(f, "DuckDuckGo"),
        }
    }
}

/// A fetched results page.
#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn get_page(&self, url: &str) -> Result<Page>;
}

pub struct HttpSearchClient {
    client: Client,
}

impl HttpSearchClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn get_page(&self, url: &str) -> Result<Page> {
        let res = self.client.get(url).send().await?;
        let status = res.status().as_u16();
        let body = res.text().await?;
        Ok(Page { status, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    /// Pages with fewer results than this are treated as degraded or rate limited.
    pub min_acceptable: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(10),
            min_acceptable: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(Vec<String>),
    Exhausted { attempts: u32 },
}

impl FetchOutcome {
    /// Empty when every attempt failed.
    pub fn results(&self) -> &[String] {
        match self {
            FetchOutcome::Found(urls) => urls,
            FetchOutcome::Exhausted { .. } => &[],
        }
    }
}

/// Fetch-with-retry over a `SearchClient`. One request in flight at a time.
pub struct Fetcher<C> {
    client: C,
    engine: SearchEngine,
    extractor: ResultExtractor,
    policy: RetryPolicy,
}

impl<C: SearchClient> Fetcher<C> {
    pub fn new(client: C, engine: SearchEngine, cap: usize, policy: RetryPolicy) -> Result<Self> {
        let extractor = ResultExtractor::new(engine.result_selector(), cap)?;
        Ok(Self {
            client,
            engine,
            extractor,
            policy,
        })
    }

    pub fn cap(&self) -> usize {
        self.extractor.cap()
    }

    pub fn engine(&self) -> SearchEngine {
        self.engine
    }

    /// Tries the term up to `attempts` times, sleeping `delay` between failed attempts.
    pub async fn fetch(&self, term: &str) -> FetchOutcome {
        let url = self.engine.search_url(term);
        let attempts = self.policy.attempts;

        for attempt in 1..=attempts {
            match self.attempt(&url).await {
                Ok(urls) => return FetchOutcome::Found(urls),
                Err(e) => {
                    error!(
                        "Error processing search term '{term}' on {} (attempt {attempt}/{attempts}): {e}",
                        self.engine
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }
        FetchOutcome::Exhausted { attempts }
    }

    async fn attempt(&self, url: &str) -> Result<Vec<String>> {
        let page = self.client.get_page(url).await?;
        if !page.is_success() {
            return Err(Error::BadStatus(page.status));
        }

        let urls = self.extractor.extract(&page.body);
        if urls.len() < self.policy.min_acceptable {
            return Err(Error::InsufficientResults {
                found: urls.len(),
                expected: self.policy.min_acceptable,
            });
        }
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with(n: usize) -> Page {
        let links: String = (1..=n)
            .map(|i| format!(r#"<a class="result__url" href="https://r{i}.example">r{i}</a>"#))
            .collect();
        Page {
            status: 200,
            body: format!("<html><body>{links}</body></html>"),
        }
    }

    fn policy(attempts: u32, min_acceptable: usize) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::ZERO,
            min_acceptable,
        }
    }

    #[test]
    fn search_url_percent_encodes_the_term() {
        assert_eq!(
            SearchEngine::DuckDuckGo.search_url("cats & dogs/2024?"),
            "https://duckduckgo.com/html/?q=cats%20%26%20dogs%2F2024%3F"
        );
    }

    #[tokio::test]
    async fn failing_fetch_uses_every_attempt() {
        let mut client = MockSearchClient::new();
        client
            .expect_get_page()
            .times(4)
            .returning(|_| Err(Error::BadStatus(503)));

        let fetcher = Fetcher::new(client, SearchEngine::DuckDuckGo, 25, policy(4, 20)).unwrap();
        assert_eq!(fetcher.fetch("cats").await, FetchOutcome::Exhausted { attempts: 4 });
    }

    #[tokio::test]
    async fn good_first_page_is_fetched_once() {
        let mut client = MockSearchClient::new();
        client
            .expect_get_page()
            .withf(|url| url.starts_with("https://duckduckgo.com/html/") && url.ends_with("?q=cats"))
            .times(1)
            .returning(|_| Ok(page_with(22)));

        let fetcher = Fetcher::new(client, SearchEngine::DuckDuckGo, 25, policy(3, 20)).unwrap();
        let outcome = fetcher.fetch("cats").await;
        let expected: Vec<String> = (1..=22).map(|i| format!("https://r{i}.example")).collect();
        assert_eq!(outcome, FetchOutcome::Found(expected));
    }

    #[tokio::test]
    async fn short_page_is_retried_until_enough_results() {
        let mut client = MockSearchClient::new();
        let mut seq = mockall::Sequence::new();
        client
            .expect_get_page()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page_with(4)));
        client
            .expect_get_page()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page_with(30)));

        let fetcher = Fetcher::new(client, SearchEngine::DuckDuckGo, 25, policy(3, 20)).unwrap();
        let outcome = fetcher.fetch("cats").await;
        assert_eq!(outcome.results().len(), 25);
    }

    #[tokio::test]
    async fn error_status_counts_as_failed_attempt() {
        let mut client = MockSearchClient::new();
        client.expect_get_page().times(2).returning(|_| {
            let mut page = page_with(25);
            page.status = 429;
            Ok(page)
        });

        let fetcher = Fetcher::new(client, SearchEngine::DuckDuckGo, 25, policy(2, 20)).unwrap();
        let outcome = fetcher.fetch("cats").await;
        assert!(outcome.results().is_empty());
    }

    #[tokio::test]
    async fn zero_threshold_accepts_empty_page() {
        let mut client = MockSearchClient::new();
        client
            .expect_get_page()
            .times(1)
            .returning(|_| Ok(page_with(0)));

        let fetcher = Fetcher::new(client, SearchEngine::DuckDuckGo, 25, policy(3, 0)).unwrap();
        assert_eq!(fetcher.fetch("rare term").await, FetchOutcome::Found(vec![]));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_the_delay_between_attempts_only() {
        let delay = Duration::from_millis(300);
        let calls = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut client = MockSearchClient::new();
        client.expect_get_page().times(3).returning({
            let calls = calls.clone();
            move |_| {
                calls.lock().unwrap().push(tokio::time::Instant::now());
                Ok(page_with(0))
            }
        });

        let policy = RetryPolicy {
            attempts: 3,
            delay,
            min_acceptable: 20,
        };
        let fetcher = Fetcher::new(client, SearchEngine::DuckDuckGo, 25, policy).unwrap();
        let started = tokio::time::Instant::now();
        let outcome = fetcher.fetch("dogs").await;
        let total = started.elapsed();

        assert_eq!(outcome, FetchOutcome::Exhausted { attempts: 3 });
        let calls = calls.lock().unwrap();
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= delay);
        }
        // No sleep after the last attempt.
        assert!(total >= delay * 2);
        assert!(total < delay * 3);
    }

    #[tokio::test]
    async fn http_client_sends_browser_agent_and_keeps_status() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 429 Too Many Requests\r\ncontent-length: 4\r\nconnection: close\r\n\r\nslow")
                .await
                .unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        let client = HttpSearchClient::new(Duration::from_secs(5)).unwrap();
        let page = client
            .get_page(&format!("http://{addr}/html/?q=cats"))
            .await
            .unwrap();
        let request = server.await.unwrap().to_lowercase();

        assert!(request.starts_with("get /html/?q=cats "));
        assert!(request.contains(&format!("user-agent: {}\r\n", BROWSER_USER_AGENT.to_lowercase())));
        assert_eq!(page.status, 429);
        assert!(!page.is_success());
        assert_eq!(page.body, "slow");
    }
}
