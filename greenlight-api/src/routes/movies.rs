/// Movie endpoints
///
/// ```text
/// GET    /v1/movies       movies:read
/// POST   /v1/movies       movies:write
/// GET    /v1/movies/:id   movies:read
/// PUT    /v1/movies/:id   movies:write
/// PATCH  /v1/movies/:id   movies:write
/// DELETE /v1/movies/:id   movies:write
/// ```
///
/// Updates are fenced on the stored version: if another request changed the
/// movie between our read and our write, the write fails with 409 and the
/// client retries. A client can also send `X-Expected-Version` to fail fast
/// when its own copy is stale.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use greenlight_shared::models::filters::{Filters, Metadata};
use greenlight_shared::models::movie::{CreateMovie, Movie, MovieFilter, SORT_SAFELIST};
use greenlight_shared::models::runtime::Runtime;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use super::guard::{MoviesRead, MoviesWrite, Permitted};
use crate::{
    app::AppState,
    codec::{self, QueryParams, StrictJson},
    error::{ApiError, ApiResult},
};

/// Header carrying the version the client last saw
pub const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

/// Body of `POST /v1/movies` and `PUT /v1/movies/:id`
///
/// Missing fields decode to their zero value and are reported by
/// validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MovieRequest {
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
}

/// Body of `PATCH /v1/movies/:id`; absent fields are left untouched
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MoviePatch {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

impl MoviePatch {
    fn apply(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(runtime) = self.runtime {
            movie.runtime = runtime;
        }
        if let Some(genres) = self.genres {
            movie.genres = genres;
        }
    }
}

/// Response of `GET /v1/movies`
#[derive(Debug, Serialize)]
pub struct MovieList {
    pub movies: Vec<Movie>,
    pub metadata: Metadata,
}

/// Parses a path id; anything but a positive integer is a 404
pub fn parse_id(raw: &str) -> ApiResult<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::not_found()),
    }
}

/// Fails with 409 if the client sent a version other than the stored one
fn check_expected_version(headers: &HeaderMap, movie: &Movie) -> ApiResult<()> {
    match headers.get(EXPECTED_VERSION_HEADER) {
        Some(expected) if expected.as_bytes() != movie.version.to_string().as_bytes() => {
            Err(ApiError::edit_conflict())
        }
        _ => Ok(()),
    }
}

/// `GET /v1/movies?title=&genres=&page=&page_size=&sort=`
pub async fn list_movies(
    _: Permitted<MoviesRead>,
    State(state): State<AppState>,
    Query(qs): Query<QueryParams>,
) -> ApiResult<Response> {
    let mut errors = ValidationErrors::new();

    let filter = MovieFilter {
        title: codec::read_string(&qs, "title", ""),
        genres: codec::read_csv(&qs, "genres", &[]),
    };

    let filters = Filters {
        page: codec::read_int(&qs, "page", 1, &mut errors),
        page_size: codec::read_int(&qs, "page_size", 20, &mut errors),
        sort: codec::read_string(&qs, "sort", "id"),
        sort_safelist: SORT_SAFELIST,
    };

    if let Err(filter_errors) = filters.validate() {
        for (field, field_errors) in filter_errors.field_errors() {
            for error in field_errors {
                errors.add(field, error.clone());
            }
        }
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let (movies, metadata) = Movie::list(&state.db, &filter, &filters).await?;

    Ok(codec::encode_document(
        StatusCode::OK,
        &MovieList { movies, metadata },
        HeaderMap::new(),
    ))
}

/// `POST /v1/movies`
pub async fn create_movie(
    _: Permitted<MoviesWrite>,
    State(state): State<AppState>,
    StrictJson(input): StrictJson<MovieRequest>,
) -> ApiResult<Response> {
    let data = CreateMovie {
        title: input.title,
        year: input.year,
        runtime: input.runtime,
        genres: input.genres,
    };
    data.validate()?;

    let movie = Movie::create(&state.db, data).await?;
    tracing::info!(movie_id = movie.id, "movie created");

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id)) {
        headers.insert(header::LOCATION, location);
    }

    Ok(codec::encode(StatusCode::CREATED, "movie", &movie, headers))
}

/// `GET /v1/movies/:id`
pub async fn show_movie(
    _: Permitted<MoviesRead>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let movie = Movie::get(&state.db, parse_id(&id)?).await?;

    Ok(codec::encode(StatusCode::OK, "movie", &movie, HeaderMap::new()))
}

/// `PUT /v1/movies/:id`, replaces every field
pub async fn replace_movie(
    _: Permitted<MoviesWrite>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    StrictJson(input): StrictJson<MovieRequest>,
) -> ApiResult<Response> {
    let mut movie = Movie::get(&state.db, parse_id(&id)?).await?;
    check_expected_version(&headers, &movie)?;

    movie.title = input.title;
    movie.year = input.year;
    movie.runtime = input.runtime;
    movie.genres = input.genres;

    save(&state, movie).await
}

/// `PATCH /v1/movies/:id`, replaces only the fields present
pub async fn update_movie(
    _: Permitted<MoviesWrite>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    StrictJson(patch): StrictJson<MoviePatch>,
) -> ApiResult<Response> {
    let mut movie = Movie::get(&state.db, parse_id(&id)?).await?;
    check_expected_version(&headers, &movie)?;

    patch.apply(&mut movie);

    save(&state, movie).await
}

async fn save(state: &AppState, mut movie: Movie) -> ApiResult<Response> {
    movie.validate()?;
    Movie::update(&state.db, &mut movie).await?;

    Ok(codec::encode(StatusCode::OK, "movie", &movie, HeaderMap::new()))
}

/// `DELETE /v1/movies/:id`
pub async fn delete_movie(
    _: Permitted<MoviesWrite>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    Movie::delete(&state.db, id).await?;
    tracing::info!(movie_id = id, "movie deleted");

    Ok(codec::encode(
        StatusCode::OK,
        "message",
        "movie successfully deleted",
        HeaderMap::new(),
    ))
}
