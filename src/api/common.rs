//! Common API utilities and shared types

use serde::Deserialize;

use crate::api::middleware::ApiError;
use crate::models::{ArticleStatus, ListParams};

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size
pub fn default_per_page() -> u32 {
    10
}

/// Pagination query parameters, with an optional article status filter
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub status: Option<String>,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }

    /// Parse the `status` filter. Empty means no filter.
    pub fn article_status(&self) -> Result<Option<ArticleStatus>, ApiError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => ArticleStatus::from_str(s)
                .map(Some)
                .ok_or_else(|| ApiError::validation_error(format!("Unknown status: {}", s))),
        }
    }
}

/// Notification listing query
#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default)]
    pub unread_only: bool,
}

impl NotificationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(status: Option<&str>) -> PaginationQuery {
        PaginationQuery {
            page: 1,
            per_page: 10,
            status: status.map(String::from),
        }
    }

    #[test]
    fn test_status_filter() {
        assert_eq!(query(None).article_status().unwrap(), None);
        assert_eq!(query(Some("")).article_status().unwrap(), None);
        assert_eq!(
            query(Some("pending")).article_status().unwrap(),
            Some(ArticleStatus::Pending)
        );
        assert!(query(Some("published")).article_status().is_err());
    }
}
