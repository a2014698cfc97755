//! HTTP(S) media source backed by reqwest

use super::traits::{MediaSource, MediaStream};
use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::types::Item;
use async_trait::async_trait;
use futures::StreamExt;
use url::Url;

/// Streams each item's `permalink_url` with a GET request
///
/// When a client id is configured it is appended to every request as the
/// `client_id` query parameter.
pub struct HttpMediaSource {
    client: reqwest::Client,
    client_id: Option<String>,
}

impl HttpMediaSource {
    /// Build a source from configuration
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().map_err(|e| Error::Config {
            message: format!("failed to create HTTP client: {}", e),
            key: Some("source".to_string()),
        })?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
        })
    }

    /// Resolve the request URL for `item`
    pub fn request_url(&self, item: &Item) -> Result<Url> {
        let mut url = Url::parse(item.permalink_url.trim()).map_err(|e| {
            Error::InvalidSource(format!("'{}': {}", item.permalink_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidSource(format!(
                "'{}': unsupported scheme '{}'",
                item.permalink_url,
                url.scheme()
            )));
        }
        if let Some(client_id) = &self.client_id {
            url.query_pairs_mut().append_pair("client_id", client_id);
        }
        Ok(url)
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn open(&self, item: &Item) -> Result<MediaStream> {
        let url = self.request_url(item)?;

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        tracing::debug!(
            url = %item.permalink_url,
            content_length = ?response.content_length(),
            "Source stream opened"
        );

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from))
            .boxed())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(client_id: Option<&str>) -> HttpMediaSource {
        HttpMediaSource::new(&SourceConfig {
            client_id: client_id.map(str::to_string),
            ..SourceConfig::default()
        })
        .unwrap()
    }

    async fn collect(mut stream: MediaStream) -> Vec<u8> {
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        body
    }

    #[test]
    fn request_url_appends_client_id() {
        let item = Item::new("a", "t", "https://example.com/artist/track?ref=x");
        let url = source(Some("secret")).request_url(&item).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/artist/track?ref=x&client_id=secret"
        );
    }

    #[test]
    fn request_url_rejects_garbage_and_other_schemes() {
        let src = source(None);
        let bad = Item::new("a", "t", "not a url");
        assert!(matches!(src.request_url(&bad), Err(Error::InvalidSource(_))));

        let ftp = Item::new("a", "t", "ftp://example.com/file.mp3");
        assert!(matches!(src.request_url(&ftp), Err(Error::InvalidSource(_))));
    }

    #[tokio::test]
    async fn open_streams_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artist/track"))
            .and(query_param("client_id", "cid"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 4096]))
            .mount(&server)
            .await;

        let item = Item::new("artist", "track", format!("{}/artist/track", server.uri()));
        let stream = source(Some("cid")).open(&item).await.unwrap();

        assert_eq!(collect(stream).await, vec![1u8; 4096]);
    }

    #[tokio::test]
    async fn open_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let item = Item::new("artist", "gone", format!("{}/gone", server.uri()));
        let err = match source(None).open(&item).await {
            Err(e) => e,
            Ok(_) => panic!("404 must not open a stream"),
        };

        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
    }
}
