//! Status endpoint client.
//!
//! [`StatusClient`] performs the raw `GET {address}/api/v1/status/tsdb` request;
//! [`fetch_snapshot`] wraps it with URL construction and parsing so that callers only
//! ever see a complete [`Snapshot`] or a typed error.

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, Url};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{body_snippet, CardinalityError};
use crate::instance::InstanceIdentity;
use crate::snapshot::Snapshot;

/// Path of the TSDB status endpoint, relative to the instance address.
pub const STATUS_PATH: &str = "/api/v1/status/tsdb";

/// Query parameters for a status request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusQuery {
    matchers: Vec<String>,
}

impl StatusQuery {
    /// The unfiltered primary query.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the status to series carrying `label`.
    pub fn label_present(label: &str) -> Self {
        Self {
            matchers: vec![format!(r#"{{{label}!=""}}"#)],
        }
    }

    /// Restricts the status to series of metric `metric`.
    pub fn metric_name(metric: &str) -> Self {
        Self {
            matchers: vec![format!(r#"{{__name__="{metric}"}}"#)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn matchers(&self) -> &[String] {
        &self.matchers
    }

    /// Full request URL for an instance address.
    pub fn url_for(&self, address: &str) -> Result<Url, CardinalityError> {
        let base = format!("{}{}", address.trim_end_matches('/'), STATUS_PATH);
        let parsed = if self.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, self.matchers.iter().map(|m| ("match[]", m)))
        };
        parsed.map_err(|e| CardinalityError::Fetch {
            url: base,
            status: None,
            message: format!("invalid instance address: {e}"),
        })
    }
}

/// Raw access to a status endpoint.
#[async_trait]
pub trait StatusClient: Send + Sync {
    /// Fetches the body of a 2xx response for `url`.
    async fn get_status(&self, url: &Url, auth: Option<&str>) -> Result<String, CardinalityError>;
}

/// reqwest-backed [`StatusClient`].
#[derive(Debug, Clone)]
pub struct HttpStatusClient {
    client: Client,
}

impl HttpStatusClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StatusClient for HttpStatusClient {
    async fn get_status(&self, url: &Url, auth: Option<&str>) -> Result<String, CardinalityError> {
        let mut request = self.client.get(url.clone());
        if let Some(value) = auth.filter(|v| !v.is_empty()) {
            request = request.header(AUTHORIZATION, value);
        }

        let response = request.send().await.map_err(|e| CardinalityError::Fetch {
            url: url.to_string(),
            status: None,
            message: format!("can't connect: {e}"),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CardinalityError::Fetch {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: body_snippet(&body),
            });
        }
        debug!("Request to {} returned status {}", url, status);

        response.text().await.map_err(|e| CardinalityError::Fetch {
            url: url.to_string(),
            status: Some(status.as_u16()),
            message: format!("can't read response body: {e}"),
        })
    }
}

/// Fetches and parses one status snapshot for an instance.
#[instrument(skip(client, identity), fields(instance = %identity.name))]
pub async fn fetch_snapshot<C>(
    client: &C,
    identity: &InstanceIdentity,
    query: &StatusQuery,
) -> Result<Snapshot, CardinalityError>
where
    C: StatusClient + ?Sized,
{
    let url = query.url_for(&identity.address)?;
    let body = client.get_status(&url, identity.auth.as_deref()).await?;
    Snapshot::from_json(&body).map_err(|source| CardinalityError::Parse {
        url: url.to_string(),
        snippet: body_snippet(&body),
        source,
    })
}
