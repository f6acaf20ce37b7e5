//! Database operations for the changes table.

use sqlx::{PgExecutor, Row};
use tally_engine::{Change, ChangeKind, Timestamp};

/// A stored change row from the database.
///
/// Columns are signed in PostgreSQL; rows that do not map back onto a valid
/// [`Change`] are reported by [`StoredChange::to_change`] rather than trusted.
#[derive(Debug)]
pub struct StoredChange {
    pub id: i64,
    pub list_id: String,
    pub item_name: String,
    pub kind: String,
    pub target: i64,
    pub bought: i64,
    pub replica: String,
    pub timestamp: i64,
    #[allow(dead_code)]
    pub received_at: chrono::DateTime<chrono::Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredChange {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredChange {
            id: row.try_get("id")?,
            list_id: row.try_get("list_id")?,
            item_name: row.try_get("item_name")?,
            kind: row.try_get("kind")?,
            target: row.try_get("target")?,
            bought: row.try_get("bought")?,
            replica: row.try_get("replica")?,
            timestamp: row.try_get("timestamp")?,
            received_at: row.try_get("received_at")?,
        })
    }
}

impl StoredChange {
    /// Convert database row to a tally-engine Change.
    pub fn to_change(&self) -> Result<Change, String> {
        let kind: ChangeKind = self.kind.parse().map_err(|e| format!("row {}: {}", self.id, e))?;
        let target = unsigned(self.id, "target", self.target)?;
        let bought = unsigned(self.id, "bought", self.bought)?;
        let timestamp = unsigned(self.id, "timestamp", self.timestamp)?;

        Ok(Change::new(
            kind,
            &self.list_id,
            &self.item_name,
            target,
            bought,
            &self.replica,
            timestamp,
        ))
    }
}

fn unsigned(id: i64, column: &str, value: i64) -> Result<u64, String> {
    u64::try_from(value).map_err(|_| format!("row {}: negative {} {}", id, column, value))
}

/// Convert an unsigned engine value to a BIGINT column value.
pub fn to_column(column: &str, value: u64) -> Result<i64, String> {
    i64::try_from(value).map_err(|_| format!("{} {} exceeds the storable range", column, value))
}

/// Insert a change unless its idempotency key is already stored.
///
/// Returns `true` if a row was inserted, `false` for a duplicate.
pub async fn insert_change<'e, E>(executor: E, change: &Change) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let target = to_column("target", change.target).map_err(sqlx::Error::Protocol)?;
    let bought = to_column("bought", change.bought).map_err(sqlx::Error::Protocol)?;
    let timestamp = to_column("timestamp", change.timestamp).map_err(sqlx::Error::Protocol)?;

    let result = sqlx::query(
        r#"
        INSERT INTO changes (list_id, item_name, kind, target, bought, replica, timestamp)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (replica, timestamp, list_id, item_name, kind) DO NOTHING
        "#,
    )
    .bind(&change.list_id)
    .bind(&change.item_name)
    .bind(change.kind.as_str())
    .bind(target)
    .bind(bought)
    .bind(&change.replica)
    .bind(timestamp)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Every stored change for a list, in insertion order.
pub async fn get_changes<'e, E>(
    executor: E,
    list_id: &str,
) -> Result<Vec<StoredChange>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, StoredChange>(
        r#"
        SELECT id, list_id, item_name, kind, target, bought, replica, timestamp, received_at
        FROM changes
        WHERE list_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(list_id)
    .fetch_all(executor)
    .await
}

/// Whether the list has ever received a change.
pub async fn list_exists<'e, E>(executor: E, list_id: &str) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM changes WHERE list_id = $1)")
            .bind(list_id)
            .fetch_one(executor)
            .await?;
    Ok(row.0)
}

/// A timestamp later than every change stored for the list.
pub async fn next_timestamp<'e, E>(executor: E, list_id: &str) -> Result<Timestamp, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row: (Option<i64>,) =
        sqlx::query_as("SELECT MAX(timestamp) FROM changes WHERE list_id = $1")
            .bind(list_id)
            .fetch_one(executor)
            .await?;

    let max = row.0.and_then(|ts| u64::try_from(ts).ok()).unwrap_or(0);
    Ok(max.saturating_add(1))
}

/// Serialize appends to one list for the rest of the transaction.
pub async fn lock_list<'e, E>(executor: E, list_id: &str) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(list_id)
        .execute(executor)
        .await?;
    Ok(())
}
