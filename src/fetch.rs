//! Network side of a piece: one GET, optionally ranged, body read to the end.
use crate::config::DownloadConfig;
use crate::error::PieceError;
use crate::layout::ByteRange;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{RANGE, USER_AGENT};

/// Something that can fetch a byte range of the target resource.
///
/// `None` asks for the whole body without a `Range` header.
#[async_trait]
pub trait RangeFetcher: Send + Sync {
    async fn fetch(&self, range: Option<ByteRange>) -> Result<Bytes, PieceError>;
}

/// Builds the HTTP client shared by the negotiation request and every worker.
pub fn build_client(config: &DownloadConfig) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .danger_accept_invalid_certs(config.accept_invalid_certs);
    if let Some(timeout) = config.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }
    builder.build()
}

/// [`RangeFetcher`] over a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl RangeFetcher for HttpFetcher {
    async fn fetch(&self, range: Option<ByteRange>) -> Result<Bytes, PieceError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(USER_AGENT, &self.user_agent);
        if let Some(range) = range {
            request = request.header(RANGE, range.header_value());
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(PieceError::Status(status.as_u16()));
        }

        response
            .bytes()
            .await
            .map_err(|e| PieceError::Body(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(server: &MockServer) -> HttpFetcher {
        HttpFetcher::new(reqwest::Client::new(), server.uri(), "piecefetch-test")
    }

    #[tokio::test]
    async fn test_fetch_sends_range_and_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Range", "bytes=5-9"))
            .and(header("User-Agent", "piecefetch-test"))
            .respond_with(ResponseTemplate::new(206).set_body_string("World"))
            .mount(&server)
            .await;

        let body = fetcher(&server)
            .fetch(Some(ByteRange { start: 5, end: 9 }))
            .await
            .unwrap();
        assert_eq!(&body[..], b"World");
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetcher(&server).fetch(None).await.unwrap_err();
        assert!(matches!(err, PieceError::Status(503)));
    }

    #[tokio::test]
    async fn test_fetch_whole_body_accepts_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("everything"))
            .mount(&server)
            .await;

        let body = fetcher(&server).fetch(None).await.unwrap();
        assert_eq!(&body[..], b"everything");
    }
}
