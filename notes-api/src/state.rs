//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use notes_storage::{KvStore, Storage};

use crate::auth::AuthConfig;
use crate::cache::ResponseCache;
use crate::config::ApiConfig;
use crate::middleware::{AuthMiddlewareState, RateLimitState};
use crate::rate_limit::RateLimiter;
use crate::ws::{ChatState, WsState};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Users and notes.
    pub storage: Arc<dyn Storage>,
    /// Backing store of the cache and the rate-limit counters.
    pub kv: Arc<dyn KvStore>,
    pub cache: ResponseCache,
    pub rate_limiter: Arc<RateLimiter>,
    pub auth: Arc<AuthConfig>,
    pub config: Arc<ApiConfig>,
    /// Anonymous `/ws` channel.
    pub ws_lobby: Arc<WsState>,
    /// Authenticated `/ws/chat` channel.
    pub ws_chat: Arc<WsState>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        kv: Arc<dyn KvStore>,
        auth: AuthConfig,
        config: ApiConfig,
    ) -> Self {
        let cache = ResponseCache::new(kv.clone(), config.cache_ttl);
        let rate_limiter = Arc::new(RateLimiter::new(
            kv.clone(),
            config.rate_limit_requests,
            config.rate_limit_window,
        ));
        let ws_lobby = Arc::new(WsState::new("lobby", config.ws_channel_capacity));
        let ws_chat = Arc::new(WsState::new("chat", config.ws_channel_capacity));

        Self {
            storage,
            kv,
            cache,
            rate_limiter,
            auth: Arc::new(auth),
            config: Arc::new(config),
            ws_lobby,
            ws_chat,
            start_time: Instant::now(),
        }
    }

    pub fn auth_middleware_state(&self) -> AuthMiddlewareState {
        AuthMiddlewareState::new(self.auth.clone(), self.storage.clone())
    }

    pub fn rate_limit_state(&self) -> RateLimitState {
        RateLimitState::new(self.rate_limiter.clone(), self.config.trust_proxy_headers)
    }

    pub fn chat_state(&self) -> ChatState {
        ChatState {
            ws: self.ws_chat.clone(),
            auth_config: self.auth.clone(),
            storage: self.storage.clone(),
        }
    }
}

crate::impl_from_ref!(Arc<dyn Storage>, storage);
crate::impl_from_ref!(Arc<dyn KvStore>, kv);
crate::impl_from_ref!(ResponseCache, cache);
crate::impl_from_ref!(Arc<AuthConfig>, auth);
crate::impl_from_ref!(Arc<ApiConfig>, config);
