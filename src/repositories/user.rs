use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use crate::{
    error::{AppError, Result},
    models::user::User,
};

/// Creates a new user in the database.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `hash` - The credential hash the user will log in with.
/// * `kek` - The user's freshly generated wrapping key.
///
/// # Returns
///
/// A `Result` containing the created `User`. A credential that is already
/// registered yields `AppError::Validation`.
pub async fn create_user(pool: &Pool, hash: &str, kek: &[u8]) -> Result<User> {
    let client = pool.get().await?;
    let statement = client
        .prepare_cached("INSERT INTO users (hash, kek) VALUES ($1, $2) RETURNING id, hash, kek")
        .await?;

    let row = client
        .query_one(&statement, &[&hash, &kek])
        .await
        .map_err(|e| {
            if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                AppError::Validation("User already exists".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

    Ok(User::from_row(&row)?)
}

/// Finds a user by their credential hash.
pub async fn find_by_hash(pool: &Pool, hash: &str) -> Result<Option<User>> {
    let client = pool.get().await?;
    let statement = client
        .prepare_cached("SELECT id, hash, kek FROM users WHERE hash = $1")
        .await?;

    let row = client.query_opt(&statement, &[&hash]).await?;
    Ok(row.map(|r| User::from_row(&r)).transpose()?)
}
