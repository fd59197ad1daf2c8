//! Ledger and vote storage using SQLite
//!
//! Timestamps are stored as Unix milliseconds so range predicates compare
//! numerically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use super::{LedgerStore, VoteStore};
use crate::ban_vote::{Ballot, BanVote, VoteOutcome, VoteStatus};
use crate::error::{Error, Result};
use crate::ledger::{ActorKey, AdvisoryWarning, GrantAdjustment, GrantFilter, PointGrant};

/// SQLite-based discipline store
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Create a new store from database path
    pub async fn from_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Configuration(format!("Failed to create directory: {}", e))
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and run migrations
    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS point_grants (
                id TEXT PRIMARY KEY,
                community_id INTEGER NOT NULL,
                actor_id INTEGER NOT NULL,
                points INTEGER NOT NULL CHECK (points >= 0),
                reason TEXT NOT NULL,
                granted_at INTEGER NOT NULL,
                moderator_id INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS advisory_warnings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                community_id INTEGER NOT NULL,
                actor_id INTEGER NOT NULL,
                issued_at INTEGER NOT NULL,
                moderator_id INTEGER,
                note TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ban_votes (
                id TEXT PRIMARY KEY,
                community_id INTEGER NOT NULL,
                actor_id INTEGER NOT NULL,
                opened_at INTEGER NOT NULL,
                window_secs INTEGER NOT NULL,
                status TEXT NOT NULL,
                closed_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ban_ballots (
                vote_id TEXT NOT NULL,
                voter_id INTEGER NOT NULL,
                ballot TEXT NOT NULL,
                PRIMARY KEY (vote_id, voter_id),
                FOREIGN KEY (vote_id) REFERENCES ban_votes(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_grants_key ON point_grants(community_id, actor_id, granted_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_warnings_key ON advisory_warnings(community_id, actor_id)",
        )
        .execute(&self.pool)
        .await?;

        // at most one open vote per actor, enforced by the database as well
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_votes_open ON ban_votes(community_id, actor_id) WHERE status = 'open'",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn db_id(id: u64) -> i64 {
    id as i64
}

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| Error::StoreUnavailable(format!("timestamp out of range: {}", ms)))
}

#[derive(FromRow)]
struct GrantRow {
    id: String,
    community_id: i64,
    actor_id: i64,
    points: i64,
    reason: String,
    granted_at: i64,
    moderator_id: Option<i64>,
}

impl TryFrom<GrantRow> for PointGrant {
    type Error = Error;

    fn try_from(row: GrantRow) -> Result<Self> {
        Ok(Self {
            id: Uuid::parse_str(&row.id)?,
            community_id: row.community_id as u64,
            actor_id: row.actor_id as u64,
            points: row.points,
            reason: row.reason,
            granted_at: from_millis(row.granted_at)?,
            moderator_id: row.moderator_id.map(|m| m as u64),
        })
    }
}

#[derive(FromRow)]
struct WarningRow {
    issued_at: i64,
    moderator_id: Option<i64>,
    note: Option<String>,
}

impl TryFrom<WarningRow> for AdvisoryWarning {
    type Error = Error;

    fn try_from(row: WarningRow) -> Result<Self> {
        Ok(Self {
            issued_at: from_millis(row.issued_at)?,
            moderator_id: row.moderator_id.map(|m| m as u64),
            note: row.note,
        })
    }
}

#[derive(FromRow)]
struct VoteRow {
    id: String,
    community_id: i64,
    actor_id: i64,
    opened_at: i64,
    window_secs: i64,
    status: String,
    closed_at: Option<i64>,
}

#[derive(FromRow)]
struct BallotRow {
    vote_id: String,
    voter_id: i64,
    ballot: String,
}

impl TryFrom<VoteRow> for BanVote {
    type Error = Error;

    fn try_from(row: VoteRow) -> Result<Self> {
        let status = VoteStatus::parse(&row.status)
            .ok_or_else(|| Error::StoreUnavailable(format!("unknown vote status: {}", row.status)))?;
        Ok(Self {
            id: Uuid::parse_str(&row.id)?,
            community_id: row.community_id as u64,
            actor_id: row.actor_id as u64,
            opened_at: from_millis(row.opened_at)?,
            window_secs: row.window_secs,
            ballots: HashMap::new(),
            status,
            closed_at: row.closed_at.map(from_millis).transpose()?,
        })
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn insert_grant(&self, grant: &PointGrant) -> Result<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO point_grants (
                id, community_id, actor_id, points, reason, granted_at, moderator_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(grant.id.to_string())
        .bind(db_id(grant.community_id))
        .bind(db_id(grant.actor_id))
        .bind(grant.points)
        .bind(&grant.reason)
        .bind(millis(grant.granted_at))
        .bind(grant.moderator_id.map(db_id))
        .execute(&self.pool)
        .await?;

        Ok(grant.id)
    }

    async fn query_grants(&self, key: ActorKey) -> Result<Vec<PointGrant>> {
        let rows: Vec<GrantRow> = sqlx::query_as(
            r#"
            SELECT id, community_id, actor_id, points, reason, granted_at, moderator_id
            FROM point_grants
            WHERE community_id = ? AND actor_id = ?
            ORDER BY granted_at ASC, rowid ASC
            "#,
        )
        .bind(db_id(key.community_id))
        .bind(db_id(key.actor_id))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn delete_grants(&self, key: ActorKey, filter: GrantFilter) -> Result<u64> {
        let removed = match filter {
            GrantFilter::All => {
                sqlx::query("DELETE FROM point_grants WHERE community_id = ? AND actor_id = ?")
                    .bind(db_id(key.community_id))
                    .bind(db_id(key.actor_id))
                    .execute(&self.pool)
                    .await?
                    .rows_affected()
            }
            GrantFilter::GrantedAtOrBefore(cutoff) => sqlx::query(
                "DELETE FROM point_grants WHERE community_id = ? AND actor_id = ? AND granted_at <= ?",
            )
            .bind(db_id(key.community_id))
            .bind(db_id(key.actor_id))
            .bind(millis(cutoff))
            .execute(&self.pool)
            .await?
            .rows_affected(),
            GrantFilter::Ids(ids) => {
                let mut tx = self.pool.begin().await?;
                let mut removed = 0;
                for id in ids {
                    removed += sqlx::query(
                        "DELETE FROM point_grants WHERE id = ? AND community_id = ? AND actor_id = ?",
                    )
                    .bind(id.to_string())
                    .bind(db_id(key.community_id))
                    .bind(db_id(key.actor_id))
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
                }
                tx.commit().await?;
                removed
            }
        };

        debug!(key = %key, removed, "Deleted point grants");
        Ok(removed)
    }

    async fn apply_adjustments(
        &self,
        key: ActorKey,
        adjustments: &[GrantAdjustment],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for adj in adjustments {
            let result = if adj.points <= 0 {
                sqlx::query(
                    "DELETE FROM point_grants WHERE id = ? AND community_id = ? AND actor_id = ?",
                )
                .bind(adj.id.to_string())
                .bind(db_id(key.community_id))
                .bind(db_id(key.actor_id))
                .execute(&mut *tx)
                .await?
            } else {
                sqlx::query(
                    "UPDATE point_grants SET points = ? WHERE id = ? AND community_id = ? AND actor_id = ?",
                )
                .bind(adj.points)
                .bind(adj.id.to_string())
                .bind(db_id(key.community_id))
                .bind(db_id(key.actor_id))
                .execute(&mut *tx)
                .await?
            };

            if result.rows_affected() == 0 {
                // dropping the transaction rolls back earlier adjustments
                return Err(Error::NotFound(format!("grant {}", adj.id)));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn push_warning(&self, key: ActorKey, warning: &AdvisoryWarning) -> Result<u32> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO advisory_warnings (community_id, actor_id, issued_at, moderator_id, note)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(db_id(key.community_id))
        .bind(db_id(key.actor_id))
        .bind(millis(warning.issued_at))
        .bind(warning.moderator_id.map(db_id))
        .bind(&warning.note)
        .execute(&mut *tx)
        .await?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM advisory_warnings WHERE community_id = ? AND actor_id = ?",
        )
        .bind(db_id(key.community_id))
        .bind(db_id(key.actor_id))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(count as u32)
    }

    async fn warnings(&self, key: ActorKey) -> Result<Vec<AdvisoryWarning>> {
        let rows: Vec<WarningRow> = sqlx::query_as(
            r#"
            SELECT issued_at, moderator_id, note
            FROM advisory_warnings
            WHERE community_id = ? AND actor_id = ?
            ORDER BY issued_at ASC, id ASC
            "#,
        )
        .bind(db_id(key.community_id))
        .bind(db_id(key.actor_id))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn clear_warnings(&self, key: ActorKey) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM advisory_warnings WHERE community_id = ? AND actor_id = ?")
                .bind(db_id(key.community_id))
                .bind(db_id(key.actor_id))
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl VoteStore for SqliteStore {
    async fn save_vote(&self, vote: &BanVote) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO ban_votes (
                id, community_id, actor_id, opened_at, window_secs, status, closed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(vote.id.to_string())
        .bind(db_id(vote.community_id))
        .bind(db_id(vote.actor_id))
        .bind(millis(vote.opened_at))
        .bind(vote.window_secs)
        .bind(vote.status.as_str())
        .bind(vote.closed_at.map(millis))
        .execute(&mut *tx)
        .await;

        if let Err(sqlx::Error::Database(db)) = &inserted {
            if db.is_unique_violation() {
                return Err(Error::Conflict(format!(
                    "a ban vote is already open for {}",
                    vote.key()
                )));
            }
        }
        inserted?;

        for (voter_id, ballot) in &vote.ballots {
            sqlx::query("INSERT INTO ban_ballots (vote_id, voter_id, ballot) VALUES (?, ?, ?)")
                .bind(vote.id.to_string())
                .bind(db_id(*voter_id))
                .bind(ballot.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn record_ballot(&self, vote_id: Uuid, voter_id: u64, ballot: Ballot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ban_ballots (vote_id, voter_id, ballot) VALUES (?, ?, ?)
            ON CONFLICT(vote_id, voter_id) DO UPDATE SET ballot = excluded.ballot
            "#,
        )
        .bind(vote_id.to_string())
        .bind(db_id(voter_id))
        .bind(ballot.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn close_vote(
        &self,
        vote_id: Uuid,
        outcome: VoteOutcome,
        closed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE ban_votes SET status = ?, closed_at = ? WHERE id = ? AND status = 'open'",
        )
        .bind(outcome.as_str())
        .bind(millis(closed_at))
        .bind(vote_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM ban_votes WHERE id = ?")
            .bind(vote_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(Error::NotFound(format!("ban vote {}", vote_id))),
        }
    }

    async fn load_open_votes(&self) -> Result<Vec<BanVote>> {
        let rows: Vec<VoteRow> = sqlx::query_as(
            r#"
            SELECT id, community_id, actor_id, opened_at, window_secs, status, closed_at
            FROM ban_votes
            WHERE status = 'open'
            ORDER BY opened_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut votes: Vec<BanVote> = rows
            .into_iter()
            .map(|r| r.try_into())
            .collect::<Result<_>>()?;

        let ballots: Vec<BallotRow> = sqlx::query_as(
            r#"
            SELECT b.vote_id, b.voter_id, b.ballot
            FROM ban_ballots b
            JOIN ban_votes v ON v.id = b.vote_id
            WHERE v.status = 'open'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        for row in ballots {
            let Some(ballot) = Ballot::parse(&row.ballot) else {
                continue;
            };
            if let Some(vote) = votes.iter_mut().find(|v| v.id.to_string() == row.vote_id) {
                vote.ballots.insert(row.voter_id as u64, ballot);
            }
        }

        Ok(votes)
    }
}
