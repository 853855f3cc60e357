//! REST binding of the document store.
//!
//! [`RestExecutor`] implements [`QueryExecutor`] over the store's HTTP
//! interface:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `execute` | `POST {url}` with the query wrapped in a `<query>` envelope |
//! | `add_document` | `PUT {url}{db}/{name}` |
//! | `delete_document` | `DELETE {url}{db}/{name}` (404 tolerated) |
//! | `exists` | `GET {url}{db}` (404 means absent) |
//! | `create_or_reset` | `DELETE {url}{db}` then `PUT {url}{db}` |
//! | `create_indexes` | `GET {url}{db}?command=optimize` |
//!
//! Every request carries HTTP basic auth and the configured timeout.
//! Nothing is retried; failures surface as [`Error::Query`].

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use tracing::{debug, trace};

use yams_core::{Error, QueryExecutor, Result};

use crate::config::StoreConfig;

const MAX_ERROR_BODY: usize = 500;

/// Wrap query text in the store's request envelope.
///
/// A literal `]]>` in the query would end the CDATA section early, so it is
/// split across two sections.
pub fn query_envelope(query: &str) -> String {
    format!(
        "<query xmlns=\"http://basex.org/rest\"><text><![CDATA[{}]]></text></query>",
        query.replace("]]>", "]]]]><![CDATA[>")
    )
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let mut cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        cut.push_str("...");
        cut
    }
}

pub struct RestExecutor {
    client: Client,
    base: Url,
    user: String,
    password: String,
    recursive_queries: bool,
}

impl RestExecutor {
    pub fn new(store: &StoreConfig) -> anyhow::Result<Self> {
        let base = Url::parse(&store.url)
            .with_context(|| format!("Invalid store.url: {}", store.url))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("store.url must be an http(s) URL: {}", store.url);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(store.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base,
            user: store.user.clone(),
            password: store.password.clone(),
            recursive_queries: store.recursive_queries,
        })
    }

    /// `{url}{db}/{name}`, each `/`-separated part percent-encoded.
    fn url(&self, database: &str, name: Option<&str>) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::query("store url", "url cannot carry a path"))?;
            path.pop_if_empty();
            path.push(database);
            if let Some(name) = name {
                path.extend(name.split('/'));
            }
        }
        Ok(url)
    }

    async fn send(&self, context: &str, request: RequestBuilder) -> Result<Response> {
        request
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| Error::query(context, e))
    }

    /// Body of a 2xx response, or `None` for a tolerated 404.
    async fn check(&self, context: &str, response: Response, allow_missing: bool) -> Result<Option<String>> {
        let status = response.status();
        debug!(context, status = %status, "store response");
        if allow_missing && status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| Error::query(context, e))?;
        if status.is_success() {
            Ok(Some(body))
        } else {
            Err(Error::query(
                context,
                format!("store returned {}: {}", status, truncate(&body)),
            ))
        }
    }
}

#[async_trait]
impl QueryExecutor for RestExecutor {
    async fn execute(&self, database: &str, query: &str) -> Result<String> {
        trace!(database, query, "posting query");
        let request = self
            .client
            .post(self.base.clone())
            .header(CONTENT_TYPE, "application/xml")
            .body(query_envelope(query));
        let response = self.send("query", request).await?;
        Ok(self
            .check("query", response, false)
            .await?
            .unwrap_or_default())
    }

    async fn add_document(&self, database: &str, name: &str, content: &str) -> Result<()> {
        let url = self.url(database, Some(name))?;
        let request = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/xml")
            .body(content.to_string());
        let response = self.send("add document", request).await?;
        self.check("add document", response, false).await?;
        Ok(())
    }

    async fn delete_document(&self, database: &str, name: &str) -> Result<()> {
        let url = self.url(database, Some(name))?;
        let response = self
            .send("delete document", self.client.delete(url))
            .await?;
        self.check("delete document", response, true).await?;
        Ok(())
    }

    async fn exists(&self, database: &str) -> Result<bool> {
        let url = self.url(database, None)?;
        let response = self.send("database exists", self.client.get(url)).await?;
        Ok(self
            .check("database exists", response, true)
            .await?
            .is_some())
    }

    async fn create_or_reset(&self, database: &str) -> Result<()> {
        let url = self.url(database, None)?;
        let response = self
            .send("drop database", self.client.delete(url.clone()))
            .await?;
        self.check("drop database", response, true).await?;
        let response = self
            .send("create database", self.client.put(url))
            .await?;
        self.check("create database", response, false).await?;
        Ok(())
    }

    async fn create_indexes(&self, database: &str) -> Result<()> {
        let mut url = self.url(database, None)?;
        url.query_pairs_mut().append_pair("command", "optimize");
        let response = self.send("optimize", self.client.get(url)).await?;
        self.check("optimize", response, false).await?;
        Ok(())
    }

    fn supports_recursive_queries(&self) -> bool {
        self.recursive_queries
    }
}
