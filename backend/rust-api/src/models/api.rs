use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

const MAX_PAGE_SIZE: u64 = 100;

/// Success envelope: `{"success": true, "data": ..., "message"?, "pagination"?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
            pagination: None,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::ok(data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Envelope for operations that return nothing but a confirmation.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

impl IntoResponse for MessageResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

/// Normalised `page`/`limit` query values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u64,
    pub limit: u64,
}

impl PageParams {
    /// `page` is capped so the skip offset always fits the driver's i64.
    pub fn new(page: Option<u64>, limit: Option<u64>, default_limit: u64) -> Self {
        let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
        let max_page = i64::MAX as u64 / limit;
        Self {
            page: page.unwrap_or(1).clamp(1, max_page),
            limit,
        }
    }

    pub fn skip(&self) -> u64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.limit)
            .min(i64::MAX as u64)
    }

    /// Driver-friendly limit
    pub fn limit_i64(&self) -> i64 {
        self.limit as i64
    }

    pub fn paginate(&self, total: u64) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
            total,
            pages: total.div_ceil(self.limit),
        }
    }
}

/// `page` + `limit` as they arrive in a query string.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_params_defaults_and_clamping() {
        assert_eq!(
            PageParams::new(None, None, 10),
            PageParams { page: 1, limit: 10 }
        );
        assert_eq!(
            PageParams::new(Some(0), Some(0), 10),
            PageParams { page: 1, limit: 1 }
        );
        assert_eq!(PageParams::new(Some(3), Some(500), 20).limit, 100);
    }

    #[test]
    fn test_skip_and_pages() {
        let params = PageParams::new(Some(3), Some(10), 10);
        assert_eq!(params.skip(), 20);

        let pagination = params.paginate(21);
        assert_eq!(pagination.pages, 3);
        assert_eq!(params.paginate(0).pages, 0);
        assert_eq!(params.paginate(30).pages, 3);
    }

    #[test]
    fn test_huge_page_keeps_skip_in_range() {
        let params = PageParams::new(Some(u64::MAX), Some(10), 10);
        assert!(params.skip() <= i64::MAX as u64);
        assert_eq!(params.page, i64::MAX as u64 / 10);

        let params = PageParams::new(Some(u64::MAX), Some(100), 10);
        assert!(params.skip() <= i64::MAX as u64);
        assert_eq!(params.paginate(5).page, params.page);
    }

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::ok(json!({ "a": 1 }))).unwrap();
        assert_eq!(body, json!({ "success": true, "data": { "a": 1 } }));

        let body = serde_json::to_value(ApiResponse::paginated(
            Vec::<u8>::new(),
            PageParams::new(None, None, 10).paginate(0),
        ))
        .unwrap();
        assert_eq!(
            body["pagination"],
            json!({ "page": 1, "limit": 10, "total": 0, "pages": 0 })
        );

        let body = serde_json::to_value(MessageResponse::new("done")).unwrap();
        assert_eq!(body, json!({ "success": true, "message": "done" }));
    }
}
