//! MySQL implementation of the EventStore trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySql, MySqlConnection, MySqlPool, QueryBuilder};

use crate::adapters::sql::{push_filters, push_order_and_page, EventRow};
use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::models::{Event, EventPage, EventQuery, StoreOutcome};
use crate::domain::ports::EventStore;

const SELECT_EVENTS: &str = "SELECT id, event_type, CAST(headers AS CHAR) AS headers, payload, \
     created_at, forwarded_at, error, repository, sender, replayed_from, original_time FROM events";

/// MySQL has no bare OFFSET; this is the documented "all remaining rows" limit.
const UNBOUNDED_LIMIT: &str = "18446744073709551615";

#[derive(Clone)]
pub struct MySqlEventRepository {
    pool: MySqlPool,
}

impl MySqlEventRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl EventStore for MySqlEventRepository {
    async fn store_event(&self, event: &Event) -> StorageResult<StoreOutcome> {
        event.check_storable()?;
        // Plain INSERT: IGNORE would also swallow truncation and bad values.
        let result = sqlx::query(
            r#"
            INSERT INTO events (id, event_type, headers, payload, created_at, forwarded_at,
                                error, repository, sender, replayed_from, original_time)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&event.event_type)
        .bind(&event.headers)
        .bind(&event.payload)
        .bind(event.created_at)
        .bind(event.forwarded_at)
        .bind(&event.error)
        .bind(&event.repository)
        .bind(&event.sender)
        .bind(&event.replayed_from)
        .bind(event.original_time)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(StoreOutcome::Inserted),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Ok(StoreOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_event(&self, id: &str) -> StorageResult<Option<Event>> {
        let row: Option<EventRow> = sqlx::query_as(&format!("{SELECT_EVENTS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Event::from))
    }

    async fn list_events(&self, query: &EventQuery) -> StorageResult<EventPage> {
        // InnoDB's REPEATABLE READ default keeps one snapshot for both reads.
        let mut tx = self.pool.begin().await?;

        let mut builder = QueryBuilder::<MySql>::new(SELECT_EVENTS);
        push_filters(&mut builder, query);
        push_order_and_page(&mut builder, query, Some(UNBOUNDED_LIMIT));

        let rows: Vec<EventRow> = builder.build_query_as().fetch_all(&mut *tx).await?;
        let total = count_matching(&mut tx, query).await?;
        tx.commit().await?;

        Ok(EventPage {
            events: rows.into_iter().map(Event::from).collect(),
            total,
        })
    }

    async fn count_events(&self, query: &EventQuery) -> StorageResult<u64> {
        let mut conn = self.pool.acquire().await?;
        count_matching(&mut conn, query).await
    }

    async fn get_stats(&self, since: Option<DateTime<Utc>>) -> StorageResult<BTreeMap<String, u64>> {
        let mut builder =
            QueryBuilder::<MySql>::new("SELECT event_type, COUNT(*) AS count FROM events");
        if let Some(since) = since {
            builder.push(" WHERE created_at >= ").push_bind(since);
        }
        builder.push(" GROUP BY event_type");

        let rows: Vec<(String, i64)> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(event_type, count)| (event_type, count.max(0) as u64))
            .collect())
    }

    async fn mark_forwarded(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE events SET forwarded_at = ?, error = NULL WHERE id = ? AND forwarded_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 && !self.exists(id).await? {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn record_error(&self, id: &str, error: &str) -> StorageResult<()> {
        let result =
            sqlx::query("UPDATE events SET error = ? WHERE id = ? AND forwarded_at IS NULL")
                .bind(error)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 && !self.exists(id).await? {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn create_schema(&self) -> StorageResult<()> {
        sqlx::raw_sql(include_str!("../../../migrations/mysql/001_events.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

async fn count_matching(conn: &mut MySqlConnection, query: &EventQuery) -> StorageResult<u64> {
    let mut builder = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM events");
    push_filters(&mut builder, query);

    let (count,): (i64,) = builder.build_query_as().fetch_one(&mut *conn).await?;
    Ok(count.max(0) as u64)
}
