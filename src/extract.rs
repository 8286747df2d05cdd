use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{Html, Node, Selector};

use crate::config::PipelineConfig;
use crate::error::{Stage, StageError};
use crate::events::{EventSink, PipelineEvent};
use crate::record::RawRecord;

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

/// Elements whose text never shows up on the rendered page.
const HIDDEN_TAGS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// Fetches one page and pulls its title and visible text.
pub struct Extractor {
    client: Client,
    max_content_length: usize,
    sink: Arc<dyn EventSink>,
}

impl Extractor {
    pub fn new(config: &PipelineConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            max_content_length: config.max_content_length,
            sink,
        })
    }

    pub async fn extract(&self, url: &str) -> Result<RawRecord, StageError> {
        self.sink.emit(&PipelineEvent::StageStarted {
            stage: Stage::Extract,
            url: url.to_string(),
        });

        let result = self.fetch(url).await;
        match &result {
            Ok(_) => self.sink.emit(&PipelineEvent::StageSucceeded {
                stage: Stage::Extract,
                url: url.to_string(),
            }),
            Err(e) => self.sink.emit(&PipelineEvent::StageFailed {
                stage: Stage::Extract,
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
        result
    }

    async fn fetch(&self, url: &str) -> Result<RawRecord, StageError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::Fetch(format!("HTTP {status}")));
        }

        if let Some(ct) = response.headers().get(CONTENT_TYPE) {
            let ct = ct.to_str().unwrap_or_default();
            if !is_markup(ct) {
                return Err(StageError::Parse(format!("unsupported content type: {ct}")));
            }
        }

        let body = response.text().await?;
        let (title, content) = parse_page(&body, self.max_content_length);

        Ok(RawRecord {
            url: url.to_string(),
            title,
            content,
            fetched_at: Utc::now(),
        })
    }
}

fn is_markup(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.is_empty()
        || mime.starts_with("text/")
        || mime == "application/xhtml+xml"
        || mime == "application/xml"
}

/// Returns `(title, visible_text)` with the text capped at `max_chars`.
pub fn parse_page(html: &str, max_chars: usize) -> (String, String) {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();

    let mut content = String::new();
    let mut taken = 0usize;
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_TAGS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        for ch in text.chars() {
            if taken == max_chars {
                return (title, content);
            }
            content.push(ch);
            taken += 1;
        }
    }

    (title, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    fn extractor(sink: &RecordingSink, timeout: Duration) -> Extractor {
        let cfg = PipelineConfig {
            http_timeout: timeout,
            ..PipelineConfig::default()
        };
        Extractor::new(&cfg, Arc::new(sink.clone())).unwrap()
    }

    #[test]
    fn title_and_body_text() {
        let (title, content) =
            parse_page("<html><title>T</title><body>hello world</body></html>", 1000);
        assert_eq!(title, "T");
        assert_eq!(content, "hello world");
    }

    #[test]
    fn missing_title_is_empty() {
        let (title, content) = parse_page("<p>just text</p>", 1000);
        assert_eq!(title, "");
        assert_eq!(content, "just text");
    }

    #[test]
    fn skips_scripts_and_styles() {
        let (title, content) = parse_page(&fixture("article"), 1000);
        assert_eq!(title.trim(), "Release notes");
        assert!(content.contains("Version 2.0 ships today."));
        assert!(!content.contains("console.log"));
        assert!(!content.contains("font-family"));
        assert!(!content.contains("Release notes"));
    }

    #[test]
    fn content_capped_at_max_chars() {
        let (_, content) = parse_page(&fixture("long"), 1000);
        assert_eq!(content.chars().count(), 1000);

        let (_, content) = parse_page("<body>héllo wörld</body>", 4);
        assert_eq!(content, "héll");
    }

    #[test]
    fn markup_content_types() {
        assert!(is_markup("text/html; charset=utf-8"));
        assert!(is_markup("application/xhtml+xml"));
        assert!(is_markup("TEXT/PLAIN"));
        assert!(!is_markup("image/png"));
        assert!(!is_markup("application/json"));
    }

    #[tokio::test]
    async fn fetches_with_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("user-agent", crate::config::DEFAULT_USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<title>Hi</title><body>there</body>", "text/html"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sink = RecordingSink::new();
        let url = format!("{}/page", server.uri());
        let raw = extractor(&sink, Duration::from_secs(5)).extract(&url).await.unwrap();
        assert_eq!(raw.url, url);
        assert_eq!(raw.title, "Hi");
        assert_eq!(raw.content, "there");
        assert!(sink.failures().is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sink = RecordingSink::new();
        let err = extractor(&sink, Duration::from_secs(5))
            .extract(&server.uri())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Fetch(ref m) if m.contains("503")));
        assert_eq!(sink.failures().len(), 1);
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<title>late</title>", "text/html")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let sink = RecordingSink::new();
        let err = extractor(&sink, Duration::from_millis(200))
            .extract(&server.uri())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Fetch(_)));
    }

    #[tokio::test]
    async fn binary_body_is_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2], "image/png"))
            .mount(&server)
            .await;

        let sink = RecordingSink::new();
        let err = extractor(&sink, Duration::from_secs(5))
            .extract(&server.uri())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Parse(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_fetch_failure() {
        let sink = RecordingSink::new();
        let err = extractor(&sink, Duration::from_secs(2))
            .extract("http://127.0.0.1:9/")
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Fetch(_)));
    }
}
