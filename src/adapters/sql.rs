//! Pieces shared by the sqlx-backed adapters.
//!
//! Only dialect-neutral SQL lives here. Placeholder style is left to
//! `QueryBuilder`; column types, upsert syntax and pagination quirks stay in
//! each backend module.

use chrono::{DateTime, Utc};
use sqlx::{Database, Encode, QueryBuilder, Type};

use crate::domain::models::{Event, EventQuery};

/// Append the `WHERE` clause for `query`.
pub fn push_filters<'args, DB>(builder: &mut QueryBuilder<'args, DB>, query: &EventQuery)
where
    DB: Database,
    String: Encode<'args, DB> + Type<DB>,
    DateTime<Utc>: Encode<'args, DB> + Type<DB>,
{
    builder.push(" WHERE 1=1");

    if !query.types.is_empty() {
        builder.push(" AND event_type IN (");
        let mut separated = builder.separated(", ");
        for event_type in &query.types {
            separated.push_bind(event_type.clone());
        }
        separated.push_unseparated(")");
    }
    if let Some(repository) = &query.repository {
        builder.push(" AND repository = ").push_bind(repository.clone());
    }
    if let Some(sender) = &query.sender {
        builder.push(" AND sender = ").push_bind(sender.clone());
    }
    if let Some(since) = query.since {
        builder.push(" AND created_at >= ").push_bind(since);
    }
    if let Some(until) = query.until {
        builder.push(" AND created_at <= ").push_bind(until);
    }
    if query.only_pending {
        builder.push(" AND forwarded_at IS NULL");
    }
}

/// Append ordering and pagination.
///
/// `unbounded_limit` is the dialect's spelling of "no limit", needed by
/// backends that reject a bare `OFFSET`.
pub fn push_order_and_page<DB: Database>(
    builder: &mut QueryBuilder<'_, DB>,
    query: &EventQuery,
    unbounded_limit: Option<&str>,
) {
    builder.push(" ORDER BY created_at DESC, id DESC");

    let offset = query.offset.unwrap_or(0);
    match query.page_limit() {
        Some(limit) => {
            builder.push(format!(" LIMIT {limit}"));
            if offset > 0 {
                builder.push(format!(" OFFSET {offset}"));
            }
        }
        None if offset > 0 => {
            if let Some(unbounded) = unbounded_limit {
                builder.push(format!(" LIMIT {unbounded}"));
            }
            builder.push(format!(" OFFSET {offset}"));
        }
        None => {}
    }
}

/// Column-for-column image of an `events` row.
#[derive(Debug, sqlx::FromRow)]
pub struct EventRow {
    pub id: String,
    pub event_type: String,
    pub headers: Option<String>,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub forwarded_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub repository: Option<String>,
    pub sender: Option<String>,
    pub replayed_from: Option<String>,
    pub original_time: Option<DateTime<Utc>>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            event_type: row.event_type,
            headers: row.headers,
            payload: row.payload,
            created_at: row.created_at,
            forwarded_at: row.forwarded_at,
            error: row.error,
            repository: row.repository,
            sender: row.sender,
            replayed_from: row.replayed_from,
            original_time: row.original_time,
        }
    }
}
