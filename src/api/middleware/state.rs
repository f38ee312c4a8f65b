use crate::config::Config;
use crate::services::card_lifecycle::CardService;
use crate::services::context::RequestContext;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub service: CardService,
    pub config: Config,
}

impl AppState {
    /// Builds the per-request context, with the configured deadline.
    pub fn request_context(&self, request_id: String) -> RequestContext {
        RequestContext::new(request_id, self.config.ctx_timeout())
    }
}
