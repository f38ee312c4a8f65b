use chrono::Utc;
use sqlx::{Postgres, Transaction};
use std::future::Future;
use tokio::time::Instant;

use crate::db::PoolStats;
use crate::error::{AppError, Result};
use crate::models::card::{mask_card_number, Card, CardToken, CardTokenView, NewCard, NewCardToken};
use crate::repository::CardRepository;
use crate::services::account_client::DynAccountClient;
use crate::services::context::RequestContext;
use crate::services::tokenization::{derive_token, token_expiry, TOKEN_STATUS_ACTIVE};

/// Card issuance, ATC updates and tokenization.
///
/// Every write runs inside one database transaction that is committed only
/// when all of its steps succeed, and rolled back otherwise. The account
/// service is called at most once per operation and never retried.
#[derive(Clone)]
pub struct CardService {
    repository: CardRepository,
    accounts: DynAccountClient,
}

impl CardService {
    pub fn new(repository: CardRepository, accounts: DynAccountClient) -> Self {
        Self {
            repository,
            accounts,
        }
    }

    pub fn stat(&self) -> PoolStats {
        self.repository.stat()
    }

    /// Issues a card linked to the account named by `card.account_id`.
    ///
    /// The card is never inserted unless the account resolves.
    #[tracing::instrument(
        skip(self, ctx, card),
        fields(request_id = %ctx.request_id, card_number = %mask_card_number(&card.card_number))
    )]
    pub async fn add_card(&self, ctx: &RequestContext, card: NewCard) -> Result<Card> {
        let start = Instant::now();
        tracing::info!("Adding card");

        let card = with_deadline(ctx, async {
            let mut tx = self.repository.begin().await?;

            let outcome: Result<Card> = async {
                let account = self
                    .accounts
                    .account_by_account_id(ctx, &card.account_id)
                    .await?;

                tracing::debug!(fk_account_id = account.id, "Resolved account");

                let mut persisted = self.repository.add_card(&mut tx, &card, account.id).await?;
                persisted.account_id = Some(account.account_id);
                Ok(persisted)
            }
            .await;

            settle(tx, outcome).await
        })
        .await?;

        tracing::info!(
            card_id = card.id,
            duration_ms = start.elapsed().as_millis(),
            "Card added"
        );

        Ok(card)
    }

    /// Fetches a card and attaches its external account id.
    #[tracing::instrument(
        skip(self, ctx, card_number),
        fields(request_id = %ctx.request_id, card_number = %mask_card_number(card_number))
    )]
    pub async fn get_card(&self, ctx: &RequestContext, card_number: &str) -> Result<Card> {
        with_deadline(ctx, async {
            let mut card = self.repository.get_card(card_number).await?;

            let account = self.accounts.account_by_id(ctx, card.fk_account_id).await?;
            card.account_id = Some(account.account_id);

            Ok(card)
        })
        .await
    }

    /// Increments the card's ATC and returns the card as stored afterwards.
    ///
    /// The increment is committed before the card is read back, so a failing
    /// read-back returns an error while the increment stays durable.
    #[tracing::instrument(
        skip(self, ctx, card_number),
        fields(request_id = %ctx.request_id, card_number = %mask_card_number(card_number))
    )]
    pub async fn update_card(&self, ctx: &RequestContext, card_number: &str) -> Result<Card> {
        with_deadline(ctx, async {
            let mut tx = self.repository.begin().await?;

            let outcome: Result<u64> = async {
                self.repository.find_card(&mut tx, card_number).await?;
                self.repository.update_card(&mut tx, card_number).await
            }
            .await;

            settle(tx, outcome).await?;

            let card = self.repository.get_card(card_number).await?;
            tracing::info!(card_id = card.id, atc = card.atc, "Card atc updated");

            Ok(card)
        })
        .await
    }

    /// Mints a token for an existing card.
    ///
    /// Returns the record as built here, carrying the id assigned on insert.
    #[tracing::instrument(
        skip(self, ctx, card_number),
        fields(request_id = %ctx.request_id, card_number = %mask_card_number(card_number))
    )]
    pub async fn create_card_token(
        &self,
        ctx: &RequestContext,
        card_number: &str,
    ) -> Result<CardToken> {
        let token = with_deadline(ctx, async {
            let mut tx = self.repository.begin().await?;

            let outcome: Result<CardToken> = async {
                let card = self.repository.find_card(&mut tx, card_number).await?;

                let created_at = Utc::now();
                let new_token = NewCardToken {
                    fk_id_card: card.id,
                    token: derive_token(&card.card_number),
                    status: TOKEN_STATUS_ACTIVE.to_string(),
                    created_at,
                    expired_at: token_expiry(created_at),
                    tenant_id: card.tenant_id,
                };

                let row = self.repository.create_card_token(&mut tx, &new_token).await?;

                Ok(CardToken {
                    id: row.id,
                    fk_id_card: new_token.fk_id_card,
                    card_number: Some(card.card_number),
                    token: new_token.token,
                    status: new_token.status,
                    created_at: new_token.created_at,
                    expired_at: new_token.expired_at,
                    updated_at: None,
                    tenant_id: new_token.tenant_id,
                })
            }
            .await;

            settle(tx, outcome).await
        })
        .await?;

        tracing::info!(token_id = token.id, card_id = token.fk_id_card, "Card token created");

        Ok(token)
    }

    /// Token history for `token`, newest first. No match is an empty list.
    #[tracing::instrument(skip(self, ctx, token), fields(request_id = %ctx.request_id))]
    pub async fn get_card_token(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<Vec<CardTokenView>> {
        with_deadline(ctx, self.repository.get_card_token(token)).await
    }

    /// Checks the database and the account service.
    ///
    /// Which dependency failed is only logged; callers see [`AppError::HealthCheck`].
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn health_check(&self, ctx: &RequestContext) -> Result<()> {
        let result = with_deadline(ctx, async {
            if let Err(e) = self.repository.ping().await {
                tracing::error!(error = %e, "Database health check failed");
                return Err(AppError::HealthCheck);
            }
            tracing::info!("Database health check succeeded");

            if let Err(e) = self.accounts.health(ctx).await {
                tracing::error!(error = %e, "Account service health check failed");
                return Err(AppError::HealthCheck);
            }
            tracing::info!("Account service health check succeeded");

            Ok(())
        })
        .await;

        result.map_err(|e| match e {
            AppError::HealthCheck => e,
            other => {
                tracing::error!(error = %other, "Health check did not complete");
                AppError::HealthCheck
            }
        })
    }
}

/// Runs `operation` until the request deadline. On expiry the operation is
/// dropped, which rolls back any open transaction and frees its connection.
async fn with_deadline<T, F>(ctx: &RequestContext, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout_at(ctx.deadline(), operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(request_id = %ctx.request_id, "Request deadline exceeded");
            Err(AppError::Timeout)
        }
    }
}

/// Commits when every step succeeded, rolls back otherwise.
async fn settle<T>(tx: Transaction<'_, Postgres>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            tracing::debug!(error = %err, "Rolling back transaction");
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(err)
        }
    }
}
