//! PostgreSQL implementation of the term catalog.
//!
//! Batch writes bind one array per column and expand them with `UNNEST`,
//! [`WRITE_BATCH_SIZE`] rows per statement. Every write method runs in its
//! own transaction, so a failed call leaves its table untouched while
//! earlier calls stay committed.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use termsync_core::defaults::WRITE_BATCH_SIZE;
use termsync_core::{
    Error, NewTerm, PersistedTerm, RelationRow, RelationUpsert, Result, TermStore, TermUpdate,
    TerminologyInfo,
};

const TERM_COLUMNS: &str = r#"
    term_id, uri, semantic_uri, name, description, last_harvested_at,
    terminology_id, term_status_id, term_category_id,
    created_by, created_at, updated_by, updated_at
"#;

/// `term`, `term_relation` and `terminology` tables.
#[derive(Clone)]
pub struct PgTermRepository {
    pool: Pool<Postgres>,
}

impl PgTermRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn term_from_row(r: &PgRow) -> PersistedTerm {
    PersistedTerm {
        term_id: r.get("term_id"),
        uri: r.get("uri"),
        semantic_uri: r.get("semantic_uri"),
        name: r.get("name"),
        description: r.get("description"),
        last_harvested_at: r.get("last_harvested_at"),
        terminology_id: r.get("terminology_id"),
        term_status_id: r.get("term_status_id"),
        term_category_id: r.get("term_category_id"),
        created_by: r.get("created_by"),
        created_at: r.get("created_at"),
        updated_by: r.get("updated_by"),
        updated_at: r.get("updated_at"),
    }
}

/// Collapse rows sharing a key, keeping the last stamp. PostgreSQL rejects
/// an upsert that touches the same row twice in one statement.
fn collapse_relations(rows: &[RelationUpsert]) -> Vec<RelationUpsert> {
    let mut order: Vec<RelationRow> = Vec::with_capacity(rows.len());
    let mut latest: HashMap<RelationRow, RelationUpsert> = HashMap::with_capacity(rows.len());
    for upsert in rows {
        if latest.insert(upsert.row, *upsert).is_none() {
            order.push(upsert.row);
        }
    }
    order.into_iter().filter_map(|k| latest.remove(&k)).collect()
}

#[async_trait]
impl TermStore for PgTermRepository {
    async fn terminology_ids(&self) -> Result<BTreeSet<i32>> {
        let rows = sqlx::query("SELECT terminology_id FROM terminology")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(|r| r.get::<i32, _>("terminology_id")).collect())
    }

    async fn terminology(&self, terminology_id: i32) -> Result<Option<TerminologyInfo>> {
        let row = sqlx::query(
            "SELECT terminology_id, name, uri, semantic_uri FROM terminology WHERE terminology_id = $1",
        )
        .bind(terminology_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| TerminologyInfo {
            terminology_id: r.get("terminology_id"),
            name: r.get("name"),
            uri: r.get("uri"),
            semantic_uri: r.get("semantic_uri"),
        }))
    }

    async fn terms_for_terminologies(&self, terminology_ids: &[i32]) -> Result<Vec<PersistedTerm>> {
        let start = Instant::now();
        let sql = format!(
            "SELECT {TERM_COLUMNS} FROM term WHERE terminology_id = ANY($1) ORDER BY term_id"
        );
        let rows = sqlx::query(&sql)
            .bind(terminology_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "terms",
            op = "read_terms",
            db_table = "term",
            result_count = rows.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Terms read"
        );
        Ok(rows.iter().map(term_from_row).collect())
    }

    async fn insert_terms(&self, rows: &[NewTerm]) -> Result<u64> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut written = 0;

        for chunk in rows.chunks(WRITE_BATCH_SIZE) {
            let uris: Vec<&str> = chunk.iter().map(|t| t.uri.as_str()).collect();
            let semantic_uris: Vec<&str> = chunk.iter().map(|t| t.semantic_uri.as_str()).collect();
            let names: Vec<&str> = chunk.iter().map(|t| t.name.as_str()).collect();
            let descriptions: Vec<&str> = chunk.iter().map(|t| t.description.as_str()).collect();
            let harvested: Vec<DateTime<Utc>> = chunk.iter().map(|t| t.last_harvested_at).collect();
            let terminologies: Vec<i32> = chunk.iter().map(|t| t.terminology_id).collect();
            let statuses: Vec<i32> = chunk.iter().map(|t| t.term_status_id).collect();
            let categories: Vec<i32> = chunk.iter().map(|t| t.term_category_id).collect();
            let created_by: Vec<i32> = chunk.iter().map(|t| t.created_by).collect();
            let created_at: Vec<DateTime<Utc>> = chunk.iter().map(|t| t.created_at).collect();
            let updated_by: Vec<i32> = chunk.iter().map(|t| t.updated_by).collect();
            let updated_at: Vec<DateTime<Utc>> = chunk.iter().map(|t| t.updated_at).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO term (
                    uri, semantic_uri, name, description, last_harvested_at,
                    terminology_id, term_status_id, term_category_id,
                    created_by, created_at, updated_by, updated_at
                )
                SELECT * FROM UNNEST(
                    $1::text[], $2::text[], $3::text[], $4::text[], $5::timestamptz[],
                    $6::int4[], $7::int4[], $8::int4[],
                    $9::int4[], $10::timestamptz[], $11::int4[], $12::timestamptz[]
                )
                "#,
            )
            .bind(&uris)
            .bind(&semantic_uris)
            .bind(&names)
            .bind(&descriptions)
            .bind(&harvested)
            .bind(&terminologies)
            .bind(&statuses)
            .bind(&categories)
            .bind(&created_by)
            .bind(&created_at)
            .bind(&updated_by)
            .bind(&updated_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            written += result.rows_affected();
        }

        tx.commit().await.map_err(Error::Database)?;
        debug!(
            subsystem = "db",
            component = "terms",
            op = "insert_terms",
            db_table = "term",
            insert_count = written,
            duration_ms = start.elapsed().as_millis() as u64,
            "Terms inserted"
        );
        Ok(written)
    }

    async fn update_terms(&self, rows: &[TermUpdate]) -> Result<u64> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut written = 0;

        for chunk in rows.chunks(WRITE_BATCH_SIZE) {
            let ids: Vec<i32> = chunk.iter().map(|t| t.term_id).collect();
            let uris: Vec<&str> = chunk.iter().map(|t| t.uri.as_str()).collect();
            let semantic_uris: Vec<&str> = chunk.iter().map(|t| t.semantic_uri.as_str()).collect();
            let names: Vec<&str> = chunk.iter().map(|t| t.name.as_str()).collect();
            let descriptions: Vec<&str> = chunk.iter().map(|t| t.description.as_str()).collect();
            let harvested: Vec<DateTime<Utc>> = chunk.iter().map(|t| t.last_harvested_at).collect();
            let statuses: Vec<i32> = chunk.iter().map(|t| t.term_status_id).collect();
            let updated_by: Vec<i32> = chunk.iter().map(|t| t.updated_by).collect();
            let updated_at: Vec<DateTime<Utc>> = chunk.iter().map(|t| t.updated_at).collect();

            let result = sqlx::query(
                r#"
                UPDATE term SET
                    uri = u.uri,
                    semantic_uri = u.semantic_uri,
                    name = u.name,
                    description = u.description,
                    last_harvested_at = u.last_harvested_at,
                    term_status_id = u.term_status_id,
                    updated_by = u.updated_by,
                    updated_at = u.updated_at
                FROM UNNEST(
                    $1::int4[], $2::text[], $3::text[], $4::text[], $5::text[],
                    $6::timestamptz[], $7::int4[], $8::int4[], $9::timestamptz[]
                ) AS u(term_id, uri, semantic_uri, name, description,
                       last_harvested_at, term_status_id, updated_by, updated_at)
                WHERE term.term_id = u.term_id
                "#,
            )
            .bind(&ids)
            .bind(&uris)
            .bind(&semantic_uris)
            .bind(&names)
            .bind(&descriptions)
            .bind(&harvested)
            .bind(&statuses)
            .bind(&updated_by)
            .bind(&updated_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            written += result.rows_affected();
        }

        tx.commit().await.map_err(Error::Database)?;
        debug!(
            subsystem = "db",
            component = "terms",
            op = "update_terms",
            db_table = "term",
            update_count = written,
            duration_ms = start.elapsed().as_millis() as u64,
            "Terms updated"
        );
        Ok(written)
    }

    async fn upsert_relations(&self, rows: &[RelationUpsert]) -> Result<u64> {
        let start = Instant::now();
        let collapsed = collapse_relations(rows);
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut written = 0;

        for chunk in collapsed.chunks(WRITE_BATCH_SIZE) {
            let sources: Vec<i32> = chunk.iter().map(|r| r.row.source_term_id).collect();
            let targets: Vec<i32> = chunk.iter().map(|r| r.row.target_term_id).collect();
            let types: Vec<i32> = chunk.iter().map(|r| r.row.relation_type_id).collect();
            let actors: Vec<i32> = chunk.iter().map(|r| r.actor_id).collect();
            let stamps: Vec<DateTime<Utc>> = chunk.iter().map(|r| r.at).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO term_relation (
                    source_term_id, target_term_id, relation_type_id,
                    created_by, created_at, updated_by, updated_at
                )
                SELECT s.source, s.target, s.kind, s.actor, s.at, s.actor, s.at
                FROM UNNEST($1::int4[], $2::int4[], $3::int4[], $4::int4[], $5::timestamptz[])
                    AS s(source, target, kind, actor, at)
                ON CONFLICT (source_term_id, target_term_id, relation_type_id) DO UPDATE SET
                    updated_by = EXCLUDED.updated_by,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&sources)
            .bind(&targets)
            .bind(&types)
            .bind(&actors)
            .bind(&stamps)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            written += result.rows_affected();
        }

        tx.commit().await.map_err(Error::Database)?;
        debug!(
            subsystem = "db",
            component = "terms",
            op = "upsert_relations",
            db_table = "term_relation",
            relation_count = written,
            collapsed = rows.len() - collapsed.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Relations upserted"
        );
        Ok(written)
    }
}
