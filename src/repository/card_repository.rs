use chrono::{DateTime, Months, Utc};
use sqlx::{pool::PoolConnection, PgConnection, PgPool, Postgres, Transaction};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::db::PoolStats;
use crate::error::{AppError, Result};
use crate::models::card::{mask_card_number, Card, CardToken, CardTokenView, NewCard, NewCardToken};

/// How long an issued card stays valid.
pub const CARD_VALIDITY: Months = Months::new(5 * 12);

/// Card and token persistence.
///
/// Writes take the caller's open transaction; reads run on a pooled
/// connection. Commit and rollback decisions belong to the caller.
#[derive(Clone)]
pub struct CardRepository {
    pool: PgPool,
    acquire_count: Arc<AtomicU64>,
}

impl CardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            acquire_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Begins a transaction on a dedicated connection. Dropping the
    /// transaction without committing rolls it back and releases the connection.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.acquire_count.fetch_add(1, Ordering::Relaxed);
        let tx = self.pool.begin().await?;
        Ok(tx)
    }

    async fn acquire(&self) -> Result<PoolConnection<Postgres>> {
        self.acquire_count.fetch_add(1, Ordering::Relaxed);
        let conn = self.pool.acquire().await?;
        Ok(conn)
    }

    /// Connection pool gauges
    pub fn stat(&self) -> PoolStats {
        PoolStats::collect(&self.pool, self.acquire_count.load(Ordering::Relaxed))
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }

    /// Inserts a new card. `atc`, `created_at` and `expired_at` are always
    /// set here, never taken from the caller.
    #[tracing::instrument(skip(self, tx, card), fields(card_number = %mask_card_number(&card.card_number)))]
    pub async fn add_card(
        &self,
        tx: &mut PgConnection,
        card: &NewCard,
        fk_account_id: i32,
    ) -> Result<Card> {
        let created_at = Utc::now();
        let expired_at = card_expiry(created_at);

        let card = sqlx::query_as::<_, Card>(
            r#"
            INSERT INTO card (
                fk_account_id, card_number, card_type, holder, card_model,
                status, atc, expired_at, created_at, tenant_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(fk_account_id)
        .bind(&card.card_number)
        .bind(&card.card_type)
        .bind(&card.holder)
        .bind(&card.card_model)
        .bind(&card.status)
        .bind(expired_at)
        .bind(created_at)
        .bind(&card.tenant_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to insert card");
            AppError::from(e)
        })?;

        tracing::debug!(card_id = card.id, "Card inserted");

        Ok(card)
    }

    /// Looks up a card by number on the given connection.
    pub async fn find_card(&self, conn: &mut PgConnection, card_number: &str) -> Result<Card> {
        let card = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, fk_account_id, card_number, card_type, holder, card_model,
                   status, atc, expired_at, created_at, updated_at, tenant_id
            FROM card
            WHERE card_number = $1
            "#,
        )
        .bind(card_number)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to query card");
            AppError::from(e)
        })?;

        card.ok_or(AppError::NotFound)
    }

    /// Looks up a card by number on a pooled connection.
    #[tracing::instrument(skip(self, card_number), fields(card_number = %mask_card_number(card_number)))]
    pub async fn get_card(&self, card_number: &str) -> Result<Card> {
        let mut conn = self.acquire().await?;
        self.find_card(&mut conn, card_number).await
    }

    /// Increments the card's ATC and stamps `updated_at`.
    ///
    /// Zero affected rows is reported as [`AppError::UpdateFailed`].
    #[tracing::instrument(skip(self, tx, card_number), fields(card_number = %mask_card_number(card_number)))]
    pub async fn update_card(&self, tx: &mut PgConnection, card_number: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE card
            SET atc = atc + 1, updated_at = $2
            WHERE card_number = $1
            "#,
        )
        .bind(card_number)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to update card atc");
            AppError::from(e)
        })?;

        let rows_affected = result.rows_affected();
        if rows_affected == 0 {
            tracing::warn!("Card atc update affected 0 rows");
            return Err(AppError::UpdateFailed);
        }

        tracing::debug!(rows_affected, "Card atc updated");

        Ok(rows_affected)
    }

    #[tracing::instrument(skip(self, tx, token), fields(card_id = token.fk_id_card))]
    pub async fn create_card_token(
        &self,
        tx: &mut PgConnection,
        token: &NewCardToken,
    ) -> Result<CardToken> {
        let token = sqlx::query_as::<_, CardToken>(
            r#"
            INSERT INTO card_token (fk_id_card, token, status, created_at, expired_at, tenant_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(token.fk_id_card)
        .bind(&token.token)
        .bind(&token.status)
        .bind(token.created_at)
        .bind(token.expired_at)
        .bind(&token.tenant_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to insert card token");
            AppError::from(e)
        })?;

        Ok(token)
    }

    /// Returns every token row matching `token`, newest first. No match is an
    /// empty list.
    #[tracing::instrument(skip(self, token))]
    pub async fn get_card_token(&self, token: &str) -> Result<Vec<CardTokenView>> {
        let mut conn = self.acquire().await?;

        let tokens = sqlx::query_as::<_, CardTokenView>(
            r#"
            SELECT ct.id, ca.card_number, ca.card_model, ct.token, ct.status,
                   ct.expired_at, ct.created_at, ct.updated_at, ct.tenant_id
            FROM card_token ct
            JOIN card ca ON ca.id = ct.fk_id_card
            WHERE ct.token = $1
            ORDER BY ct.created_at DESC, ct.id DESC
            "#,
        )
        .bind(token)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to query card tokens");
            AppError::from(e)
        })?;

        tracing::debug!(count = tokens.len(), "Card tokens fetched");

        Ok(tokens)
    }
}

pub fn card_expiry(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + CARD_VALIDITY
}
