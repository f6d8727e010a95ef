//! Error types for the cardinality reconciliation core.

use crate::store::LabelSet;

/// Maximum number of response body bytes carried inside an error.
pub const BODY_SNIPPET_LEN: usize = 256;

/// Errors raised while fetching, parsing or exposing cardinality statistics.
#[derive(Debug, thiserror::Error)]
pub enum CardinalityError {
    /// Transport failure or non-2xx response from the status endpoint.
    #[error("request to {url} failed{}: {message}", status_suffix(.status))]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// The status endpoint answered with a body that is not a TSDB status document.
    #[error("can't parse TSDB status from {url} (body starts with {snippet:?}): {source}")]
    Parse {
        url: String,
        snippet: String,
        #[source]
        source: serde_json::Error,
    },

    /// The gauge store refused to hand out a gauge for a label set.
    #[error("error updating metric with labels {}: {source}", format_labels(.labels))]
    Store {
        labels: LabelSet,
        #[source]
        source: prometheus::Error,
    },

    /// Fail-fast expansion stopped at `key`.
    #[error("expansion aborted at {key:?}: {source}")]
    Expansion {
        key: String,
        #[source]
        source: Box<CardinalityError>,
    },

    /// Best-effort expansion finished with some keys failing.
    #[error("expansion failed for {} key(s): {}", .failures.len(), failed_keys(.failures))]
    PartialExpansion { failures: Vec<ExpansionFailure> },
}

/// One key that could not be expanded during a best-effort pass.
#[derive(Debug)]
pub struct ExpansionFailure {
    pub key: String,
    pub error: CardinalityError,
}

impl CardinalityError {
    /// True for errors raised before any tracked state could have been touched.
    pub fn is_fetch_stage(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Parse { .. })
    }
}

/// Cuts a response body down to something that fits in a log line.
pub fn body_snippet(body: &str) -> String {
    if body.len() <= BODY_SNIPPET_LEN {
        return body.to_string();
    }
    let mut end = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {s}")).unwrap_or_default()
}

fn failed_keys(failures: &[ExpansionFailure]) -> String {
    failures
        .iter()
        .map(|f| f.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_labels(labels: &LabelSet) -> String {
    let pairs: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v:?}")).collect();
    format!("{{{}}}", pairs.join(", "))
}
