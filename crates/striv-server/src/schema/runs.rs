//! Run listing query parameters and responses.

use serde::{Deserialize, Serialize};
use striv_store::{PageRequest, Range};

/// Query string of paginated listings.
///
/// `lower` / `upper` bound the sort key (a run's `created_at`) and may not
/// be combined with `page_token`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u64>,
    pub lower: Option<String>,
    pub upper: Option<String>,
    pub page_token: Option<String>,
}

impl PageQuery {
    pub fn to_page_request(&self) -> PageRequest {
        let range = if self.lower.is_some() || self.upper.is_some() {
            Some(Range::desc(self.lower.as_deref(), self.upper.as_deref()))
        } else {
            None
        };
        PageRequest {
            range,
            token: self.page_token.clone(),
            limit: self.limit,
        }
    }

    /// `Link` header value pointing `path` at the next page.
    pub fn next_link(&self, path: &str, token: &str) -> String {
        match self.limit {
            Some(limit) => format!("<{path}?page_token={token}&limit={limit}>; rel=\"next\""),
            None => format!("<{path}?page_token={token}>; rel=\"next\""),
        }
    }
}

/// Response from refreshing runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRunsResponse {
    pub processed: usize,
}
