//! Extractors whose rejections use the JSON error envelope.

use axum::extract::{FromRequest, FromRequestParts};
use db::models::pagination::Page;
use serde::Deserialize;

use crate::error::ApiError;

/// `axum::Json` with body rejections reported as validation errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// `axum::extract::Query` with rejections reported as validation errors.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    /// Out-of-range values are clamped rather than rejected.
    pub fn page(&self, default_per_page: u64) -> Page {
        Page::new(
            self.page.map(|page| page.max(1) as u64),
            self.per_page.map(|per_page| per_page.max(1) as u64),
            default_per_page,
        )
    }
}

/// Parses loose boolean query values. Anything unrecognised is ignored.
pub fn parse_bool_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
