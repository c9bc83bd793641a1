/// Movie model and versioned database operations
///
/// Movies are mutated under optimistic concurrency control. Every row carries
/// a `version` that starts at 1 and is bumped by exactly one on each
/// successful update. An update names the version it read; if another writer
/// got there first, zero rows match and the caller gets
/// [`ModelError::EditConflict`]. Nothing is locked and nothing is merged.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE movies (
///     id bigserial PRIMARY KEY,
///     created_at timestamp(0) with time zone NOT NULL DEFAULT NOW(),
///     title text NOT NULL,
///     year integer NOT NULL,
///     runtime integer NOT NULL,
///     genres text[] NOT NULL,
///     version integer NOT NULL DEFAULT 1
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use greenlight_shared::models::{movie::Movie, ModelError};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), ModelError> {
/// let mut session_a = Movie::get(&pool, 1).await?;
/// let mut session_b = Movie::get(&pool, 1).await?;
///
/// session_a.year = 1985;
/// Movie::update(&pool, &mut session_a).await?; // version 1 -> 2
///
/// session_b.year = 1984;
/// let stale = Movie::update(&pool, &mut session_b).await;
/// assert!(matches!(stale, Err(ModelError::EditConflict)));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashSet;
use validator::{Validate, ValidationErrors};

use super::filters::{Filters, Metadata};
use super::runtime::Runtime;
use super::{field_error, with_deadline, ModelError};

/// Sort keys accepted by [`Movie::list`]
pub const SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

/// Movie record
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Movie {
    /// Server-assigned identifier
    pub id: i64,

    /// Server-assigned creation time, never sent to clients
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,

    pub title: String,

    /// Release year
    #[serde(skip_serializing_if = "is_zero")]
    pub year: i32,

    #[serde(skip_serializing_if = "Runtime::is_zero")]
    pub runtime: Runtime,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,

    /// Optimistic concurrency fence
    pub version: i32,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

/// Input for creating a new movie
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateMovie {
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
}

/// Title-text and genre filter for [`Movie::list`]
#[derive(Debug, Clone, Default)]
pub struct MovieFilter {
    /// Full-text match on the title; empty matches everything
    pub title: String,

    /// Movies must carry all of these genres; empty matches everything
    pub genres: Vec<String>,
}

impl Validate for Movie {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_fields(&self.title, self.year, self.runtime, &self.genres)
    }
}

impl Validate for CreateMovie {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_fields(&self.title, self.year, self.runtime, &self.genres)
    }
}

fn validate_fields(
    title: &str,
    year: i32,
    runtime: Runtime,
    genres: &[String],
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if title.is_empty() {
        errors.add("title", field_error("required", "must be provided"));
    } else if title.len() > 500 {
        errors.add("title", field_error("length", "must not be more than 500 bytes long"));
    }

    if year == 0 {
        errors.add("year", field_error("required", "must be provided"));
    } else if year < 1888 {
        errors.add("year", field_error("range", "must be greater than 1888"));
    } else if year > Utc::now().year() {
        errors.add("year", field_error("range", "must not be in the future"));
    }

    if runtime.is_zero() {
        errors.add("runtime", field_error("required", "must be provided"));
    } else if runtime.minutes() < 0 {
        errors.add("runtime", field_error("range", "must be a positive integer"));
    }

    if genres.is_empty() {
        errors.add("genres", field_error("length", "must contain at least 1 genre"));
    } else if genres.len() > 5 {
        errors.add("genres", field_error("length", "must not contain more than 5 genres"));
    } else if genres.iter().collect::<HashSet<_>>().len() != genres.len() {
        errors.add("genres", field_error("unique", "must not contain duplicate values"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[derive(sqlx::FromRow)]
struct CountedMovie {
    total: i64,
    #[sqlx(flatten)]
    movie: Movie,
}

impl Movie {
    /// Inserts a movie
    ///
    /// `id`, `created_at` and `version` are assigned by the database and read
    /// back in the same round trip.
    pub async fn create(pool: &PgPool, data: CreateMovie) -> Result<Self, ModelError> {
        with_deadline(
            sqlx::query_as::<_, Movie>(
                r#"
                INSERT INTO movies (title, year, runtime, genres)
                VALUES ($1, $2, $3, $4)
                RETURNING id, created_at, title, year, runtime, genres, version
                "#,
            )
            .bind(data.title)
            .bind(data.year)
            .bind(data.runtime)
            .bind(data.genres)
            .fetch_one(pool),
        )
        .await
    }

    /// Fetches a movie by ID
    ///
    /// # Errors
    ///
    /// `ModelError::NotFound` for a missing movie and, identically, for a
    /// non-positive ID
    pub async fn get(pool: &PgPool, id: i64) -> Result<Self, ModelError> {
        if id < 1 {
            return Err(ModelError::NotFound);
        }

        with_deadline(
            sqlx::query_as::<_, Movie>(
                r#"
                SELECT id, created_at, title, year, runtime, genres, version
                FROM movies
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(pool),
        )
        .await?
        .ok_or(ModelError::NotFound)
    }

    /// Writes the movie back if nobody else has since
    ///
    /// The update only applies while the stored version still equals
    /// `movie.version`. On success `movie.version` is replaced by the new
    /// stored version.
    ///
    /// # Errors
    ///
    /// `ModelError::EditConflict` when no row matched the ID/version pair.
    /// Existence is established by the earlier [`Movie::get`], so a deleted
    /// row also reports as a conflict here.
    pub async fn update(pool: &PgPool, movie: &mut Movie) -> Result<(), ModelError> {
        let version = with_deadline(
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE movies
                SET title = $1, year = $2, runtime = $3, genres = $4, version = version + 1
                WHERE id = $5 AND version = $6
                RETURNING version
                "#,
            )
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime)
            .bind(&movie.genres)
            .bind(movie.id)
            .bind(movie.version)
            .fetch_optional(pool),
        )
        .await?
        .ok_or(ModelError::EditConflict)?;

        movie.version = version;
        Ok(())
    }

    /// Deletes a movie by ID
    ///
    /// # Errors
    ///
    /// `ModelError::NotFound` if no row was deleted, so a repeated delete is
    /// reported rather than silently accepted
    pub async fn delete(pool: &PgPool, id: i64) -> Result<(), ModelError> {
        if id < 1 {
            return Err(ModelError::NotFound);
        }

        let result = with_deadline(
            sqlx::query("DELETE FROM movies WHERE id = $1")
                .bind(id)
                .execute(pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(ModelError::NotFound);
        }
        Ok(())
    }

    /// Lists movies matching `filter`, one page at a time
    ///
    /// The total match count comes from the same statement as the page
    /// (`COUNT(*) OVER()`), so both describe the same snapshot.
    ///
    /// # Errors
    ///
    /// `ModelError::UnsafeSort` if `filters.sort` is not in [`SORT_SAFELIST`]
    pub async fn list(
        pool: &PgPool,
        filter: &MovieFilter,
        filters: &Filters,
    ) -> Result<(Vec<Self>, Metadata), ModelError> {
        let query = format!(
            r#"
            SELECT COUNT(*) OVER() AS total, id, created_at, title, year, runtime, genres, version
            FROM movies
            WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '')
            AND (genres @> $2 OR $2 = '{{}}')
            ORDER BY {} {}, id ASC
            LIMIT $3 OFFSET $4
            "#,
            filters.sort_column()?,
            filters.sort_direction(),
        );

        let rows = with_deadline(
            sqlx::query_as::<_, CountedMovie>(&query)
                .bind(&filter.title)
                .bind(&filter.genres)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(pool),
        )
        .await?;

        let total = rows.first().map(|row| row.total).unwrap_or(0);
        let movies = rows.into_iter().map(|row| row.movie).collect();

        Ok((movies, Metadata::calculate(total, filters.page, filters.page_size)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakfast_club() -> CreateMovie {
        CreateMovie {
            title: "The Breakfast Club".to_string(),
            year: 1986,
            runtime: Runtime(96),
            genres: vec!["drama".to_string()],
        }
    }

    #[test]
    fn test_valid_movie_passes() {
        assert!(breakfast_club().validate().is_ok());
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let errors = CreateMovie::default().validate().unwrap_err();
        let fields = errors.field_errors();

        for field in ["title", "year", "runtime", "genres"] {
            assert!(fields.contains_key(field), "missing error for {field}");
        }
    }

    #[test]
    fn test_year_bounds() {
        let mut movie = breakfast_club();
        movie.year = 1887;
        assert!(movie.validate().is_err());

        movie.year = Utc::now().year() + 1;
        let errors = movie.validate().unwrap_err();
        let year_errors = &errors.field_errors()["year"];
        assert_eq!(
            year_errors[0].message.as_deref(),
            Some("must not be in the future")
        );
    }

    #[test]
    fn test_negative_runtime_is_rejected() {
        let mut movie = breakfast_club();
        movie.runtime = Runtime(-5);
        assert!(movie.validate().unwrap_err().field_errors().contains_key("runtime"));
    }

    #[test]
    fn test_genre_rules() {
        let mut movie = breakfast_club();
        movie.genres = vec!["drama".to_string(), "drama".to_string()];
        assert!(movie.validate().is_err());

        movie.genres = (0..6).map(|i| format!("genre-{i}")).collect();
        assert!(movie.validate().is_err());
    }

    #[test]
    fn test_title_limit_counts_bytes() {
        let mut movie = breakfast_club();
        movie.title = "a".repeat(500);
        assert!(movie.validate().is_ok());

        movie.title = "é".repeat(251); // 502 bytes
        assert!(movie.validate().is_err());
    }

    #[test]
    fn test_serialization_shape() {
        let movie = Movie {
            id: 1,
            created_at: Utc::now(),
            title: "The Breakfast Club".to_string(),
            year: 1986,
            runtime: Runtime(96),
            genres: vec!["drama".to_string()],
            version: 1,
        };

        let json = serde_json::to_value(&movie).unwrap();
        assert_eq!(json["runtime"], "96 mins");
        assert_eq!(json["version"], 1);
        assert_eq!(json["id"], 1);
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn test_sort_safelist_is_symmetric() {
        for key in SORT_SAFELIST.iter().filter(|k| !k.starts_with('-')) {
            assert!(SORT_SAFELIST.contains(&format!("-{key}").as_str()));
        }
    }
}
