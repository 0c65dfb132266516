//! TAP sync clients for the exoplanet table and the Gaia star catalog.
//!
//! Both archives expose a synchronous `GET` endpoint that takes the query
//! as a URL parameter and answers with JSON. The JSON body is handed back
//! untouched; callers pass it through to their own clients.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use stargaze_core::{GeneratedQuery, QueryKind};

use crate::error::ArchiveError;

/// A remote tabular dataset that executes validated queries.
#[async_trait]
pub trait TabularArchive: Send + Sync {
    /// Human-readable service name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Dialect this archive executes.
    fn dialect(&self) -> QueryKind;

    /// Run `query` and return the archive's JSON body unchanged.
    async fn query(&self, query: &GeneratedQuery) -> Result<Value, ArchiveError>;
}

// ============================================================================
// Shared TAP endpoint
// ============================================================================

struct TapEndpoint {
    http: reqwest::Client,
    url: String,
    service: &'static str,
}

impl TapEndpoint {
    fn new(service: &'static str, url: String, timeout: Duration) -> Result<Self, ArchiveError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArchiveError::ClientBuild(e.to_string()))?;
        Ok(Self { http, url, service })
    }

    fn check_dialect(&self, expected: QueryKind, query: &GeneratedQuery) -> Result<(), ArchiveError> {
        if query.kind != expected {
            return Err(ArchiveError::WrongDialect {
                service: self.service,
                expected,
                got: query.kind,
            });
        }
        Ok(())
    }

    async fn get_json(&self, params: &[(&str, &str)]) -> Result<Value, ArchiveError> {
        let transport = |e: reqwest::Error| ArchiveError::Transport {
            service: self.service,
            message: e.to_string(),
        };

        let resp = self
            .http
            .get(&self.url)
            .query(params)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        tracing::debug!(service = self.service, status = status.as_u16(), "Archive responded");

        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(ArchiveError::Upstream {
                service: self.service,
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await.map_err(transport)?;
        serde_json::from_str(&body).map_err(|e| ArchiveError::InvalidJson {
            service: self.service,
            message: e.to_string(),
        })
    }
}

// ============================================================================
// NASA Exoplanet Archive
// ============================================================================

/// NASA Exoplanet Archive (`ps` table) over TAP sync.
pub struct ExoplanetArchive {
    endpoint: TapEndpoint,
}

impl ExoplanetArchive {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ArchiveError> {
        Ok(Self {
            endpoint: TapEndpoint::new("Exoplanet archive", url.into(), timeout)?,
        })
    }
}

#[async_trait]
impl TabularArchive for ExoplanetArchive {
    fn name(&self) -> &'static str {
        self.endpoint.service
    }

    fn dialect(&self) -> QueryKind {
        QueryKind::Sql
    }

    async fn query(&self, query: &GeneratedQuery) -> Result<Value, ArchiveError> {
        self.endpoint.check_dialect(QueryKind::Sql, query)?;
        tracing::info!(sql = %query.text, "Querying exoplanet archive");
        self.endpoint
            .get_json(&[("query", query.text.as_str()), ("format", "json")])
            .await
    }
}

// ============================================================================
// ESA Gaia archive
// ============================================================================

/// ESA Gaia TAP+ service (`gaiadr3.gaia_source`).
pub struct GaiaArchive {
    endpoint: TapEndpoint,
}

impl GaiaArchive {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ArchiveError> {
        Ok(Self {
            endpoint: TapEndpoint::new("Gaia archive", url.into(), timeout)?,
        })
    }
}

#[async_trait]
impl TabularArchive for GaiaArchive {
    fn name(&self) -> &'static str {
        self.endpoint.service
    }

    fn dialect(&self) -> QueryKind {
        QueryKind::Adql
    }

    async fn query(&self, query: &GeneratedQuery) -> Result<Value, ArchiveError> {
        self.endpoint.check_dialect(QueryKind::Adql, query)?;
        tracing::info!(adql = %query.text, "Querying Gaia archive");
        self.endpoint
            .get_json(&[
                ("REQUEST", "doQuery"),
                ("LANG", "ADQL"),
                ("FORMAT", "json"),
                ("QUERY", query.text.as_str()),
            ])
            .await
    }
}
