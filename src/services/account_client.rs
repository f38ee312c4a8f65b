use async_trait::async_trait;
use reqwest::{
    header::{CONTENT_TYPE, HOST},
    Client, Method,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use url::Url;

use crate::config::AccountServiceConfig;
use crate::error::{AppError, Result};
use crate::models::Account;
use crate::services::context::RequestContext;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";
pub const API_GATEWAY_ID_HEADER: &str = "x-apigw-api-id";

/// Lookups against the external account service.
///
/// Each call is a single attempt; any non-success is returned as a
/// classified [`AppError`] and never retried here.
#[async_trait]
pub trait AccountClient: Send + Sync {
    /// Resolves an account (and so its internal numeric id) from its external id.
    async fn account_by_account_id(&self, ctx: &RequestContext, account_id: &str)
        -> Result<Account>;

    /// Resolves an account (and so its external id) from its internal numeric id.
    async fn account_by_id(&self, ctx: &RequestContext, id: i32) -> Result<Account>;

    /// Liveness probe against the service's `/health` endpoint.
    async fn health(&self, ctx: &RequestContext) -> Result<()>;
}

pub type DynAccountClient = Arc<dyn AccountClient>;

/// [`AccountClient`] over HTTP.
#[derive(Clone)]
pub struct HttpAccountClient {
    client: Client,
    config: AccountServiceConfig,
    method: Method,
}

impl HttpAccountClient {
    pub fn new(config: AccountServiceConfig) -> Result<Self> {
        let method = Method::from_bytes(config.method.as_bytes()).map_err(|_| {
            AppError::RemoteService {
                service: config.name.clone(),
                message: format!("invalid account service method: {}", config.method),
            }
        })?;

        Ok(Self {
            client: Client::new(),
            config,
            method,
        })
    }

    fn service_error(&self, message: impl Into<String>) -> AppError {
        AppError::RemoteService {
            service: self.config.name.clone(),
            message: message.into(),
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::Timeout
        } else {
            self.service_error(err.to_string())
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.url).map_err(|e| self.service_error(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| self.service_error("account service url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, ctx: &RequestContext, url: Url) -> Result<reqwest::Response> {
        let timeout = self.config.timeout().min(ctx.remaining());
        if timeout.is_zero() {
            return Err(AppError::Timeout);
        }

        tracing::debug!(
            url = %url,
            request_id = %ctx.request_id,
            timeout_ms = timeout.as_millis(),
            "Calling account service"
        );

        let mut request = self
            .client
            .request(self.method.clone(), url)
            .header(CONTENT_TYPE, "application/json;charset=UTF-8")
            .header(REQUEST_ID_HEADER, ctx.request_id.as_str())
            .timeout(timeout);

        if let Some(api_id) = &self.config.api_id {
            request = request.header(API_GATEWAY_ID_HEADER, api_id.expose_secret().as_str());
        }
        if let Some(host_name) = &self.config.host_name {
            request = request.header(HOST, host_name.as_str());
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                service = %self.config.name,
                status = %status,
                error = %error_text,
                "Account service request failed"
            );
            return Err(AppError::from_upstream_status(
                status.as_u16(),
                &self.config.name,
                format!("Status {}: {}", status, error_text),
            ));
        }

        Ok(response)
    }

    async fn fetch_account(&self, ctx: &RequestContext, url: Url) -> Result<Account> {
        let response = self.send(ctx, url).await?;
        response.json::<Account>().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout
            } else {
                self.service_error(format!("Failed to parse response: {}", e))
            }
        })
    }
}

#[async_trait]
impl AccountClient for HttpAccountClient {
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    async fn account_by_account_id(
        &self,
        ctx: &RequestContext,
        account_id: &str,
    ) -> Result<Account> {
        let url = self.url(&["get", account_id])?;
        self.fetch_account(ctx, url).await
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    async fn account_by_id(&self, ctx: &RequestContext, id: i32) -> Result<Account> {
        let id = id.to_string();
        let url = self.url(&["getId", id.as_str()])?;
        self.fetch_account(ctx, url).await
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    async fn health(&self, ctx: &RequestContext) -> Result<()> {
        let url = self.url(&["health"])?;
        self.send(ctx, url).await?;
        Ok(())
    }
}
