//! Image lookup against the NASA image library.
//!
//! The search term is reduced to the object name with a stop-word filter,
//! then the first result whose preview link actually answers is returned.
//! Failures here never fail a request: they are logged and reported as
//! "no image".

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;

use stargaze_core::ImageResult;

use crate::error::ArchiveError;

static NON_KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9 ]").expect("Invalid keyword regex"));

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "show", "me", "an", "a", "of", "the", "image", "please", "give", "picture", "photo",
        "send",
    ]
    .into_iter()
    .collect()
});

/// Reduce a request like "Show me an image of the sun" to its subject ("sun").
///
/// Falls back to the cleaned text when every word is a stop word.
pub fn extract_keyword(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned = NON_KEYWORD_RE.replace_all(&lowered, "");
    let keywords: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w))
        .collect();
    if keywords.is_empty() {
        cleaned.trim().to_string()
    } else {
        keywords.join(" ")
    }
}

/// Looks up a picture for a free-text request.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    async fn find_image(&self, text: &str) -> Option<ImageResult>;
}

// ============================================================================
// Response shapes
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    collection: Collection,
}

#[derive(Debug, Default, Deserialize)]
struct Collection {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    data: Vec<ItemData>,
    #[serde(default)]
    links: Vec<ItemLink>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct ItemData {
    title: Option<String>,
    description: Option<String>,
    date_created: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemLink {
    href: Option<String>,
}

// ============================================================================
// NasaImageSearch
// ============================================================================

/// Client for `images-api.nasa.gov/search`.
pub struct NasaImageSearch {
    http: reqwest::Client,
    search_url: String,
    probe_timeout: Duration,
    allowed_schemes: &'static [&'static str],
}

impl NasaImageSearch {
    pub fn new(
        search_url: impl Into<String>,
        search_timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, ArchiveError> {
        let http = reqwest::Client::builder()
            .timeout(search_timeout)
            .build()
            .map_err(|e| ArchiveError::ClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            search_url: search_url.into(),
            probe_timeout,
            allowed_schemes: &["https://"],
        })
    }

    /// Accept plain `http://` image links too (local mirrors).
    pub fn allow_plain_http(mut self) -> Self {
        self.allowed_schemes = &["https://", "http://"];
        self
    }

    async fn search(&self, keyword: &str) -> Result<Vec<Item>, ArchiveError> {
        let transport = |e: reqwest::Error| ArchiveError::Transport {
            service: "Image archive",
            message: e.to_string(),
        };

        let resp = self
            .http
            .get(&self.search_url)
            .query(&[
                ("q", keyword),
                ("media_type", "image"),
                ("year_start", "1900"),
                ("page", "1"),
            ])
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ArchiveError::Upstream {
                service: "Image archive",
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = resp.json().await.map_err(|e| ArchiveError::InvalidJson {
            service: "Image archive",
            message: e.to_string(),
        })?;
        Ok(parsed.collection.items)
    }

    async fn is_reachable(&self, url: &str) -> bool {
        match self.http.get(url).timeout(self.probe_timeout).send().await {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(e) => {
                tracing::warn!(url, error = %e, "Skipping image candidate");
                false
            }
        }
    }
}

#[async_trait]
impl ImageSearch for NasaImageSearch {
    async fn find_image(&self, text: &str) -> Option<ImageResult> {
        let keyword = extract_keyword(text);
        tracing::info!(keyword = %keyword, "Searching image archive");

        let items = match self.search(&keyword).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Image archive search failed");
                return None;
            }
        };
        tracing::debug!(count = items.len(), keyword = %keyword, "Image candidates found");

        for item in items {
            let Some(url) = item.links.first().and_then(|l| l.href.clone()) else {
                continue;
            };
            if !self.allowed_schemes.iter().any(|s| url.starts_with(s)) {
                continue;
            }
            if !self.is_reachable(&url).await {
                continue;
            }
            let data = item.data.first().cloned().unwrap_or_default();
            return Some(ImageResult {
                title: data.title.unwrap_or_else(|| "Untitled".to_string()),
                description: data.description.unwrap_or_default(),
                date_created: data.date_created.unwrap_or_default(),
                url,
            });
        }

        tracing::info!(keyword = %keyword, "No reachable image found");
        None
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::Query;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::test_server;

    // ---- extract_keyword ----

    #[test]
    fn test_extract_keyword_strips_stopwords() {
        assert_eq!(extract_keyword("Show me an image of the sun"), "sun");
        assert_eq!(extract_keyword("Give me a picture of Saturn's rings"), "saturns rings");
    }

    #[test]
    fn test_extract_keyword_drops_punctuation() {
        assert_eq!(extract_keyword("Photo of M31, please!"), "m31");
    }

    #[test]
    fn test_extract_keyword_falls_back_to_cleaned_text() {
        assert_eq!(extract_keyword("  Show me a photo  "), "show me a photo");
    }

    #[test]
    fn test_extract_keyword_empty() {
        assert_eq!(extract_keyword(""), "");
        assert_eq!(extract_keyword("?!"), "");
    }

    // ---- NasaImageSearch ----

    async fn archive_server(items: serde_json::Value, seen: Arc<Mutex<Vec<String>>>) -> String {
        let router = Router::new()
            .route(
                "/search",
                get(move |Query(params): Query<HashMap<String, String>>| {
                    let items = items.clone();
                    let seen = Arc::clone(&seen);
                    async move {
                        assert_eq!(params.get("media_type").map(String::as_str), Some("image"));
                        assert_eq!(params.get("year_start").map(String::as_str), Some("1900"));
                        seen.lock().unwrap().push(params["q"].clone());
                        Json(json!({ "collection": { "items": items } }))
                    }
                }),
            )
            .route("/img/ok.jpg", get(|| async { "jpeg-bytes" }))
            .route("/img/gone.jpg", get(|| async { AxumStatus::NOT_FOUND }));
        test_server::spawn(router).await
    }

    fn client(base: &str) -> NasaImageSearch {
        NasaImageSearch::new(
            format!("{}/search", base),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_find_image_skips_unreachable_candidates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        // The image links need a live address, so they point at a first
        // server while the search itself is answered by a second one.
        let items_base = archive_server(json!([]), Arc::clone(&seen)).await;
        let items = json!([
            { "data": [{ "title": "No links" }], "links": [] },
            {
                "data": [{ "title": "Broken" }],
                "links": [{ "href": format!("{}/img/gone.jpg", items_base) }]
            },
            {
                "data": [{
                    "title": "The Sun",
                    "description": "Solar disk",
                    "date_created": "2015-01-01T00:00:00Z"
                }],
                "links": [{ "href": format!("{}/img/ok.jpg", items_base) }]
            }
        ]);
        let server = archive_server(items, Arc::clone(&seen)).await;

        let search = client(&server).allow_plain_http();
        let image = search.find_image("Show me an image of the sun").await.unwrap();

        assert_eq!(image.title, "The Sun");
        assert_eq!(image.description, "Solar disk");
        assert_eq!(image.date_created, "2015-01-01T00:00:00Z");
        assert!(image.url.ends_with("/img/ok.jpg"));
        assert_eq!(seen.lock().unwrap().as_slice(), ["sun"]);
    }

    #[tokio::test]
    async fn test_find_image_defaults_missing_metadata() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let links_base = archive_server(json!([]), Arc::clone(&seen)).await;
        let items = json!([
            { "links": [{ "href": format!("{}/img/ok.jpg", links_base) }] }
        ]);
        let server = archive_server(items, seen).await;

        let image = client(&server)
            .allow_plain_http()
            .find_image("mars")
            .await
            .unwrap();
        assert_eq!(image.title, "Untitled");
        assert_eq!(image.description, "");
        assert_eq!(image.date_created, "");
    }

    #[tokio::test]
    async fn test_find_image_requires_https_by_default() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let links_base = archive_server(json!([]), Arc::clone(&seen)).await;
        let items = json!([
            { "data": [{ "title": "Plain" }], "links": [{ "href": format!("{}/img/ok.jpg", links_base) }] }
        ]);
        let server = archive_server(items, seen).await;

        assert!(client(&server).find_image("moon").await.is_none());
    }

    #[tokio::test]
    async fn test_find_image_search_failure_is_none() {
        let router = Router::new().route(
            "/search",
            get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "down") }),
        );
        let server = test_server::spawn(router).await;
        assert!(client(&server).find_image("jupiter").await.is_none());
    }

    #[tokio::test]
    async fn test_find_image_no_items() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let server = archive_server(json!([]), Arc::clone(&seen)).await;
        assert!(client(&server).find_image("photo of nothing").await.is_none());
        assert_eq!(seen.lock().unwrap().as_slice(), ["nothing"]);
    }
}
