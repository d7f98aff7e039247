//! Offset cursor tokens for invoice listings.
//!
//! A token is the URL-safe base64 of the decimal row offset. It is a position
//! marker only and carries no integrity protection.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};

use crate::error::InvoicingError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

pub fn encode(offset: u64) -> String {
    URL_SAFE.encode(offset.to_string())
}

/// Decode a token, treating anything unreadable as the start of the list.
pub fn decode(token: &str) -> u64 {
    try_decode(token).unwrap_or(0)
}

/// Decode a token, rejecting malformed input. An empty token is offset 0.
pub fn try_decode(token: &str) -> Result<u64, InvoicingError> {
    if token.is_empty() {
        return Ok(0);
    }

    let bytes = URL_SAFE
        .decode(token)
        .map_err(|_| InvoicingError::InvalidRequest("malformed page token".to_string()))?;

    std::str::from_utf8(&bytes)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| InvoicingError::InvalidRequest("malformed page token".to_string()))
}

/// Position and size of the page a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u64,
}

impl PageRequest {
    /// Resolve raw list parameters. Page size is clamped to
    /// `[1, MAX_PAGE_SIZE]`; a bad token restarts at 0 unless `strict`.
    pub fn resolve(
        page_size: Option<u32>,
        page_token: Option<&str>,
        strict: bool,
    ) -> Result<Self, InvoicingError> {
        let limit = page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let token = page_token.unwrap_or_default();
        let offset = if strict {
            try_decode(token)?
        } else {
            decode(token)
        };

        Ok(Self { limit, offset })
    }

    /// Token for the following page. Empty unless the page came back full.
    pub fn next_token(&self, returned: usize) -> String {
        if returned == self.limit as usize {
            encode(self.offset.saturating_add(u64::from(self.limit)))
        } else {
            String::new()
        }
    }
}
