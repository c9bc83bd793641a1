/// List filters: pagination, sorting and response metadata
///
/// The sort key comes from the query string and ends up in the `ORDER BY`
/// clause, which cannot be parameterized. [`Filters::sort_column`] therefore
/// never returns the client's text: it returns the matching entry of the
/// static allow-list, or an error.

use serde::Serialize;
use validator::ValidationErrors;

use super::{field_error as error, ModelError};

/// Largest accepted page number
pub const MAX_PAGE: i64 = 10_000_000;

/// Largest accepted page size
pub const MAX_PAGE_SIZE: i64 = 100;

/// Pagination and sort request
#[derive(Debug, Clone)]
pub struct Filters {
    /// 1-based page number
    pub page: i64,

    /// Records per page
    pub page_size: i64,

    /// Sort key, optionally prefixed with `-` for descending order
    pub sort: String,

    /// Accepted sort keys
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    /// Checks page bounds and the sort key against the allow-list
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.page <= 0 {
            errors.add("page", error("range", "must be greater than zero"));
        } else if self.page > MAX_PAGE {
            errors.add("page", error("range", "must be a maximum of 10 million"));
        }

        if self.page_size <= 0 {
            errors.add("page_size", error("range", "must be greater than zero"));
        } else if self.page_size > MAX_PAGE_SIZE {
            errors.add("page_size", error("range", "must be a maximum of 100"));
        }

        if !self.sort_safelist.contains(&self.sort.as_str()) {
            errors.add("sort", error("safelist", "invalid sort value"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Column to order by, taken from the allow-list
    ///
    /// # Errors
    ///
    /// `ModelError::UnsafeSort` if the sort key is not allow-listed
    pub fn sort_column(&self) -> Result<&'static str, ModelError> {
        self.sort_safelist
            .iter()
            .copied()
            .find(|safe| *safe == self.sort)
            .map(|safe| safe.trim_start_matches('-'))
            .ok_or_else(|| ModelError::UnsafeSort(self.sort.clone()))
    }

    /// `DESC` for `-`-prefixed keys, `ASC` otherwise
    pub fn sort_direction(&self) -> &'static str {
        if self.sort.starts_with('-') {
            "DESC"
        } else {
            "ASC"
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Pagination metadata returned alongside a page of records
///
/// All fields are zero (and omitted from JSON) when nothing matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,

    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,

    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,

    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,

    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl Metadata {
    /// Builds metadata from the total match count
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 {
            return Self::default();
        }

        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAFELIST: &[&str] = &["id", "title", "-id", "-title"];

    fn filters(page: i64, page_size: i64, sort: &str) -> Filters {
        Filters {
            page,
            page_size,
            sort: sort.to_string(),
            sort_safelist: SAFELIST,
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(filters(1, 20, "id").validate().is_ok());
        assert!(filters(MAX_PAGE, MAX_PAGE_SIZE, "-title").validate().is_ok());
    }

    #[test]
    fn test_validate_reports_each_field() {
        let errors = filters(0, 101, "year").validate().unwrap_err();
        let fields = errors.field_errors();

        assert!(fields.contains_key("page"));
        assert!(fields.contains_key("page_size"));
        assert!(fields.contains_key("sort"));
    }

    #[test]
    fn test_sort_column_comes_from_safelist() {
        let f = filters(1, 20, "-title");
        assert_eq!(f.sort_column().unwrap(), "title");
        assert_eq!(f.sort_direction(), "DESC");

        let f = filters(1, 20, "id");
        assert_eq!(f.sort_column().unwrap(), "id");
        assert_eq!(f.sort_direction(), "ASC");
    }

    #[test]
    fn test_sort_column_rejects_injection() {
        let f = filters(1, 20, "id; DROP TABLE movies");
        assert!(matches!(f.sort_column(), Err(ModelError::UnsafeSort(_))));
    }

    #[test]
    fn test_limit_and_offset() {
        let f = filters(3, 20, "id");
        assert_eq!(f.limit(), 20);
        assert_eq!(f.offset(), 40);
    }

    #[test]
    fn test_metadata_calculate() {
        assert_eq!(Metadata::calculate(0, 1, 20), Metadata::default());

        let m = Metadata::calculate(41, 2, 20);
        assert_eq!(m.current_page, 2);
        assert_eq!(m.first_page, 1);
        assert_eq!(m.last_page, 3);
        assert_eq!(m.total_records, 41);
    }

    #[test]
    fn test_empty_metadata_serializes_to_empty_object() {
        assert_eq!(serde_json::to_string(&Metadata::default()).unwrap(), "{}");
    }
}
