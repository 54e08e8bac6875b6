use deadpool_postgres::Pool;
use crate::{
    crypto::envelope::WrappingKey,
    error::Result,
    models::paste::{DurableRecord, PasteListing},
};
use zeroize::Zeroizing;

/// Inserts the metadata row of a durable entry.
pub async fn insert_record(pool: &Pool, record: &DurableRecord) -> Result<()> {
    let client = pool.get().await?;
    let statement = client
        .prepare_cached(
            r#"
            INSERT INTO data (uid, pid, fname, key, nonce, ct, expire)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .await?;

    let data_key: &[u8] = &record.keys.data_key;
    let nonce: &[u8] = &record.keys.nonce;
    client
        .execute(
            &statement,
            &[
                &record.user_id,
                &record.public_id,
                &record.filename,
                &data_key,
                &nonce,
                &record.content_type,
                &record.expire_at,
            ],
        )
        .await?;
    Ok(())
}

/// Finds a readable entry together with its owner's wrapping key.
///
/// Rows whose expiry has passed are treated as absent even before the
/// sweeper removes them.
pub async fn find_readable(
    pool: &Pool,
    public_id: &str,
    now: i64,
) -> Result<Option<(DurableRecord, WrappingKey)>> {
    let client = pool.get().await?;
    let statement = client
        .prepare_cached(
            r#"
            SELECT d.uid, d.pid, d.fname, d.key, d.nonce, d.ct, d.expire, u.kek
            FROM data d
            JOIN users u ON u.id = d.uid
            WHERE d.pid = $1 AND (d.expire IS NULL OR d.expire > $2)
            "#,
        )
        .await?;

    match client.query_opt(&statement, &[&public_id, &now]).await? {
        Some(row) => {
            let record = DurableRecord::from_row(&row)?;
            let kek: Vec<u8> = row.try_get("kek")?;
            Ok(Some((record, Zeroizing::new(kek))))
        }
        None => Ok(None),
    }
}

/// Deletes a row by public id, optionally scoped to an owner.
///
/// # Returns
///
/// The internal filename of the deleted row, `None` if nothing matched.
pub async fn delete_by_public_id(
    pool: &Pool,
    public_id: &str,
    owner: Option<i64>,
) -> Result<Option<String>> {
    let client = pool.get().await?;
    let statement = client
        .prepare_cached(
            r#"
            DELETE FROM data
            WHERE pid = $1 AND ($2::BIGINT IS NULL OR uid = $2)
            RETURNING fname
            "#,
        )
        .await?;

    let row = client.query_opt(&statement, &[&public_id, &owner]).await?;
    Ok(row.map(|r| r.get("fname")))
}

/// Deletes the row with the smallest internal id.
pub async fn delete_oldest(pool: &Pool) -> Result<Option<String>> {
    let client = pool.get().await?;
    let statement = client
        .prepare_cached(
            r#"
            DELETE FROM data
            WHERE id = (SELECT id FROM data ORDER BY id LIMIT 1)
            RETURNING fname
            "#,
        )
        .await?;

    let row = client.query_opt(&statement, &[]).await?;
    Ok(row.map(|r| r.get("fname")))
}

/// Deletes every row whose expiry is set and not after `now`.
///
/// # Returns
///
/// The internal filenames of the deleted rows.
pub async fn delete_expired(pool: &Pool, now: i64) -> Result<Vec<String>> {
    let client = pool.get().await?;
    let statement = client
        .prepare_cached(
            r#"
            DELETE FROM data
            WHERE expire IS NOT NULL AND expire <= $1
            RETURNING fname
            "#,
        )
        .await?;

    let rows = client.query(&statement, &[&now]).await?;
    Ok(rows.iter().map(|r| r.get("fname")).collect())
}

/// Sets the expiry of a row owned by `user_id`.
///
/// # Returns
///
/// The number of rows updated.
pub async fn set_expiry(pool: &Pool, public_id: &str, user_id: i64, expire_at: i64) -> Result<u64> {
    let client = pool.get().await?;
    let statement = client
        .prepare_cached("UPDATE data SET expire = $1 WHERE pid = $2 AND uid = $3")
        .await?;

    Ok(client
        .execute(&statement, &[&expire_at, &public_id, &user_id])
        .await?)
}

/// Lists a user's entries in insertion order.
pub async fn list_for_user(pool: &Pool, user_id: i64) -> Result<Vec<PasteListing>> {
    let client = pool.get().await?;
    let statement = client
        .prepare_cached("SELECT pid, expire, ct FROM data WHERE uid = $1 ORDER BY id")
        .await?;

    let rows = client.query(&statement, &[&user_id]).await?;
    Ok(rows.iter().map(PasteListing::from).collect())
}

/// Counts all rows of the `data` table.
pub async fn count(pool: &Pool) -> Result<i64> {
    let client = pool.get().await?;
    let row = client.query_one("SELECT COUNT(id) FROM data", &[]).await?;
    Ok(row.get(0))
}
