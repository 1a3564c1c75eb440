use crate::{config::AppConfig, errors::ServiceError, ApiResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// 200 with the success envelope
pub fn success_response<T: Serialize>(message: &str, data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::with_message(data, message))).into_response()
}

/// 201 with the success envelope
pub fn created_response<T: Serialize>(message: &str, data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::with_message(data, message))).into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(ServiceError::from)
}

/// Unwraps a field the request must carry
pub fn required<T>(value: Option<T>, message: &str) -> Result<T, ServiceError> {
    value.ok_or_else(|| ServiceError::ValidationError(message.to_string()))
}

/// Treats blank strings as absent
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`). Use with `#[serde(default)]`.
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Rejects negative amounts and amounts with more fractional digits than
/// `max_scale`
pub fn check_amount(
    field: &str,
    value: Decimal,
    max_scale: u32,
    upper: Decimal,
) -> Result<(), ServiceError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be negative",
            field
        )));
    }
    if value.normalize().scale() > max_scale {
        return Err(ServiceError::ValidationError(format!(
            "{} allows at most {} decimal places",
            field, max_scale
        )));
    }
    if value > upper {
        return Err(ServiceError::ValidationError(format!(
            "{} must not exceed {}",
            field, upper
        )));
    }
    Ok(())
}

/// Query string for list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

impl PaginationParams {
    /// Page (from 1) and page size clamped to the configured bounds.
    ///
    /// The page is also capped so that the row offset fits a signed 64-bit
    /// SQL `OFFSET`.
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        let limit = self
            .limit
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size);
        let last_page = i64::MAX as u64 / limit;
        let page = self.page.unwrap_or(1).clamp(1, last_page);
        (page, limit)
    }

    pub fn search(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

impl PaginationMeta {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let pages = if limit == 0 { 0 } else { (total + limit - 1) / limit };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

/// List payload: `{items, pagination}`
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: u64, limit: u64, total: u64) -> Self {
        Self {
            items,
            pagination: PaginationMeta::new(page, limit, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "x".repeat(64),
            "test".into(),
        )
    }

    #[rstest]
    #[case(None, None, (1, 10))]
    #[case(Some(0), Some(0), (1, 1))]
    #[case(Some(3), Some(25), (3, 25))]
    #[case(Some(2), Some(5000), (2, 100))]
    #[case(Some(u64::MAX), Some(100), (i64::MAX as u64 / 100, 100))]
    #[case(Some(99_999_999_999_999_999), Some(1), (99_999_999_999_999_999, 1))]
    fn pagination_is_clamped(
        #[case] page: Option<u64>,
        #[case] limit: Option<u64>,
        #[case] expected: (u64, u64),
    ) {
        let params = PaginationParams {
            page,
            limit,
            search: None,
        };
        assert_eq!(params.resolve(&config()), expected);
    }

    #[rstest]
    #[case(0, 10, 0)]
    #[case(10, 10, 1)]
    #[case(11, 10, 2)]
    #[case(1, 1, 1)]
    fn page_count_rounds_up(#[case] total: u64, #[case] limit: u64, #[case] pages: u64) {
        assert_eq!(PaginationMeta::new(1, limit, total).pages, pages);
    }

    #[test]
    fn blank_search_is_ignored() {
        let params = PaginationParams {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(params.search(), None);
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        note: Option<Option<String>>,
    }

    #[test]
    fn double_option_tells_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.note, None);

        let null: Patch = serde_json::from_str(r#"{"note": null}"#).unwrap();
        assert_eq!(null.note, Some(None));

        let set: Patch = serde_json::from_str(r#"{"note": "x"}"#).unwrap();
        assert_eq!(set.note, Some(Some("x".into())));
    }

    #[test]
    fn amounts_are_checked() {
        assert!(check_amount("Weight", dec!(12.345), 3, dec!(1000000)).is_ok());
        assert!(check_amount("Weight", dec!(0), 3, dec!(1000000)).is_ok());
        assert!(check_amount("Weight", dec!(-1), 3, dec!(1000000)).is_err());
        assert!(check_amount("Weight", dec!(1.2345), 3, dec!(1000000)).is_err());
        assert!(check_amount("Price", dec!(10.50), 2, dec!(1000000)).is_ok());
        assert!(check_amount("Price", dec!(1000001), 2, dec!(1000000)).is_err());
    }
}
