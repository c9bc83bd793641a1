/// Integration tests for the versioned models, tokens and permissions
///
/// Skipped when DATABASE_URL is unset. Every test creates its own rows, so
/// they can share one database and run in parallel.

use chrono::Duration;
use greenlight_shared::auth::token::generate_token;
use greenlight_shared::db::migrations::{ensure_database_exists, run_migrations};
use greenlight_shared::db::pool::{create_pool, DatabaseConfig};
use greenlight_shared::models::filters::Filters;
use greenlight_shared::models::movie::{CreateMovie, Movie, MovieFilter, SORT_SAFELIST};
use greenlight_shared::models::permission::{Permissions, MOVIES_READ, MOVIES_WRITE};
use greenlight_shared::models::runtime::Runtime;
use greenlight_shared::models::token::{Token, TokenScope};
use greenlight_shared::models::user::{CreateUser, User};
use greenlight_shared::models::ModelError;
use sqlx::PgPool;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    ensure_database_exists(&url)
        .await
        .expect("Failed to create database");

    let pool = create_pool(DatabaseConfig {
        url,
        max_connections: 5,
        ..Default::default()
    })
    .await
    .expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");

    Some(pool)
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", generate_token().0.to_lowercase())
}

async fn create_movie(pool: &PgPool, title: &str, genres: &[&str]) -> Movie {
    Movie::create(
        pool,
        CreateMovie {
            title: title.to_string(),
            year: 1986,
            runtime: Runtime(96),
            genres: genres.iter().map(|g| g.to_string()).collect(),
        },
    )
    .await
    .expect("Failed to create movie")
}

async fn create_user(pool: &PgPool) -> User {
    User::create(
        pool,
        CreateUser {
            name: "Alice Smith".to_string(),
            email: format!("{}@example.com", unique("alice")),
            password_hash: "$argon2id$v=19$m=65536,t=3,p=4$c2FsdA$aGFzaA".to_string(),
        },
    )
    .await
    .expect("Failed to create user")
}

#[tokio::test]
async fn test_movie_create_starts_at_version_one() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let movie = create_movie(&pool, "The Breakfast Club", &["drama"]).await;
    assert_eq!(movie.version, 1);
    assert!(movie.id > 0);

    let fetched = Movie::get(&pool, movie.id).await.unwrap();
    assert_eq!(fetched, movie);
}

#[tokio::test]
async fn test_stale_update_is_an_edit_conflict() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let movie = create_movie(&pool, "Black Panther", &["action"]).await;
    let mut session_a = Movie::get(&pool, movie.id).await.unwrap();
    let mut session_b = Movie::get(&pool, movie.id).await.unwrap();

    session_a.year = 2018;
    Movie::update(&pool, &mut session_a).await.unwrap();
    assert_eq!(session_a.version, 2);

    session_b.title = "Black Panther II".to_string();
    let stale = Movie::update(&pool, &mut session_b).await;
    assert!(matches!(stale, Err(ModelError::EditConflict)));
    assert_eq!(session_b.version, 1);

    let stored = Movie::get(&pool, movie.id).await.unwrap();
    assert_eq!(stored.title, "Black Panther");
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn test_concurrent_updates_have_one_winner() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let movie = create_movie(&pool, "Deadpool", &["comedy"]).await;

    let attempts = (0..8).map(|i| {
        let pool = pool.clone();
        let mut copy = movie.clone();
        tokio::spawn(async move {
            copy.runtime = Runtime(100 + i);
            Movie::update(&pool, &mut copy).await
        })
    });

    let mut winners = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        match attempt.await.unwrap() {
            Ok(()) => winners += 1,
            Err(ModelError::EditConflict) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(Movie::get(&pool, movie.id).await.unwrap().version, 2);
}

#[tokio::test]
async fn test_delete_twice_reports_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let movie = create_movie(&pool, "Moana", &["animation"]).await;

    Movie::delete(&pool, movie.id).await.unwrap();
    assert!(matches!(Movie::delete(&pool, movie.id).await, Err(ModelError::NotFound)));
    assert!(matches!(Movie::get(&pool, movie.id).await, Err(ModelError::NotFound)));
}

#[tokio::test]
async fn test_non_positive_ids_are_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };

    assert!(matches!(Movie::get(&pool, 0).await, Err(ModelError::NotFound)));
    assert!(matches!(Movie::delete(&pool, -1).await, Err(ModelError::NotFound)));
}

#[tokio::test]
async fn test_list_filters_by_genre_and_reports_totals() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let genre = unique("genre");
    for title in ["Alpha", "Bravo", "Charlie"] {
        create_movie(&pool, title, &[genre.as_str()]).await;
    }

    let filter = MovieFilter {
        title: String::new(),
        genres: vec![genre.clone()],
    };
    let filters = Filters {
        page: 1,
        page_size: 2,
        sort: "-title".to_string(),
        sort_safelist: SORT_SAFELIST,
    };

    let (movies, metadata) = Movie::list(&pool, &filter, &filters).await.unwrap();
    let titles: Vec<_> = movies.iter().map(|m| m.title.as_str()).collect();

    assert_eq!(titles, ["Charlie", "Bravo"]);
    assert_eq!(metadata.total_records, 3);
    assert_eq!(metadata.last_page, 2);
}

#[tokio::test]
async fn test_list_rejects_sort_outside_safelist() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let filters = Filters {
        page: 1,
        page_size: 20,
        sort: "created_at".to_string(),
        sort_safelist: SORT_SAFELIST,
    };

    let result = Movie::list(&pool, &MovieFilter::default(), &filters).await;
    assert!(matches!(result, Err(ModelError::UnsafeSort(_))));
}

#[tokio::test]
async fn test_duplicate_email_is_case_insensitive() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let user = create_user(&pool).await;
    assert!(!user.activated);

    let duplicate = User::create(
        &pool,
        CreateUser {
            name: "Alice Again".to_string(),
            email: user.email.to_uppercase(),
            password_hash: user.password_hash.clone(),
        },
    )
    .await;
    assert!(matches!(duplicate, Err(ModelError::DuplicateEmail)));

    let found = User::find_by_email(&pool, &user.email.to_uppercase()).await.unwrap();
    assert_eq!(found.id, user.id);
}

#[tokio::test]
async fn test_token_scopes_are_isolated() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let user = create_user(&pool).await;
    let activation = Token::issue(&pool, user.id, Duration::days(3), TokenScope::Activation)
        .await
        .unwrap();

    let found = User::find_for_token(&pool, TokenScope::Activation, &activation.token)
        .await
        .unwrap();
    assert_eq!(found.id, user.id);

    let wrong_scope =
        User::find_for_token(&pool, TokenScope::Authentication, &activation.token).await;
    assert!(matches!(wrong_scope, Err(ModelError::NotFound)));
}

#[tokio::test]
async fn test_expired_tokens_do_not_resolve() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let user = create_user(&pool).await;
    let expired = Token::issue(&pool, user.id, Duration::hours(-1), TokenScope::Authentication)
        .await
        .unwrap();

    let result = User::find_for_token(&pool, TokenScope::Authentication, &expired.token).await;
    assert!(matches!(result, Err(ModelError::NotFound)));
}

#[tokio::test]
async fn test_activation_flow() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let user = create_user(&pool).await;
    let activation = Token::issue(&pool, user.id, Duration::days(3), TokenScope::Activation)
        .await
        .unwrap();
    let login = Token::issue(&pool, user.id, Duration::hours(24), TokenScope::Authentication)
        .await
        .unwrap();

    let mut user = User::find_for_token(&pool, TokenScope::Activation, &activation.token)
        .await
        .unwrap();
    user.activated = true;
    User::update(&pool, &mut user).await.unwrap();
    assert_eq!(user.version, 2);

    let removed = Token::delete_all_for_user(&pool, TokenScope::Activation, user.id)
        .await
        .unwrap();
    assert_eq!(removed, 1);

    assert!(User::find_for_token(&pool, TokenScope::Activation, &activation.token)
        .await
        .is_err());
    assert!(User::find_for_token(&pool, TokenScope::Authentication, &login.token)
        .await
        .unwrap()
        .activated);
}

#[tokio::test]
async fn test_permissions_grant_and_lookup() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let user = create_user(&pool).await;
    assert_eq!(Permissions::for_user(&pool, user.id).await.unwrap(), Permissions::default());

    Permissions::grant(&pool, user.id, &[MOVIES_READ]).await.unwrap();
    Permissions::grant(&pool, user.id, &[MOVIES_READ, "movies:unknown"]).await.unwrap();

    let permissions = Permissions::for_user(&pool, user.id).await.unwrap();
    assert!(permissions.includes(MOVIES_READ));
    assert!(!permissions.includes(MOVIES_WRITE));
    assert_eq!(permissions.0.len(), 1);
}
