use serde::{Deserialize, Serialize};

use crate::db::Page;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            status: "success",
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            status: "success",
            data: Some(data),
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            data: None,
            message: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            data: None,
            message: Some(message.into()),
        }
    }
}

/// List payload with the page that was served.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub status: &'static str,
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl<T> Paginated<T> {
    pub const fn new(data: Vec<T>, total: u64, page: Page) -> Self {
        Self {
            status: "success",
            data,
            total,
            page: page.page,
            limit: page.limit,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    #[must_use]
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    #[serde(default)]
    pub id: String,
}
