use std::cell::RefCell;
use std::rc::Rc;

use chrono::DateTime;
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;

use crate::modules::config::ConsoleConfig;
use crate::modules::confirm::{ConfirmationGate, Decision};
use crate::modules::errors::ConsoleError;
use crate::modules::http::{HttpClient, HttpRequest, Method, encode_segment};
use crate::modules::i18n::TranslationBridge;
use crate::modules::location::Location;
use crate::modules::notify::NotificationCenter;
use crate::modules::types::{ApiToken, mask_token};

#[derive(Debug, Deserialize)]
struct TokenAuthSetting {
    enabled: bool,
}

#[derive(Debug, Default)]
struct TokenState {
    tokens: Vec<ApiToken>,
    token_auth: bool,
    /// Raw value of a token just created; shown once.
    revealed: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenRow {
    pub token: String,
    pub masked: String,
    pub label: String,
    pub created: String,
    pub last_used: String,
    pub badge: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenView {
    pub token_auth: bool,
    pub rows: Vec<TokenRow>,
    pub revealed: Option<String>,
}

/// API token management plus the session logout.
#[derive(Clone)]
pub struct TokenPanel {
    client: HttpClient,
    notices: NotificationCenter,
    i18n: Rc<TranslationBridge>,
    confirm: ConfirmationGate,
    location: Rc<dyn Location>,
    config: ConsoleConfig,
    state: Rc<RefCell<TokenState>>,
}

impl TokenPanel {
    pub fn new(
        client: HttpClient,
        notices: NotificationCenter,
        i18n: Rc<TranslationBridge>,
        confirm: ConfirmationGate,
        location: Rc<dyn Location>,
        config: ConsoleConfig,
    ) -> Self {
        Self {
            client,
            notices,
            i18n,
            confirm,
            location,
            config,
            state: Rc::default(),
        }
    }

    pub fn tokens(&self) -> Vec<ApiToken> {
        self.state.borrow().tokens.clone()
    }

    pub fn token_auth(&self) -> bool {
        self.state.borrow().token_auth
    }

    pub async fn load(&self) -> Result<(), ConsoleError> {
        let tokens_path = self.config.api_path("tokens");
        let setting_path = self.config.api_path("settings/token-auth");
        let (tokens, setting) = tokio::join!(
            self.client.get_json::<Vec<ApiToken>>(&tokens_path),
            self.client.get_json::<TokenAuthSetting>(&setting_path),
        );
        let result = tokens.and_then(|tokens| Ok((tokens, setting?.enabled)));
        match result {
            Ok((tokens, enabled)) => {
                let mut state = self.state.borrow_mut();
                state.tokens = tokens;
                state.token_auth = enabled;
                Ok(())
            }
            Err(err) => {
                warn!("loading tokens failed: {err}");
                self.notices
                    .error(err.user_message(&self.i18n.t("tokens.load_failed")));
                Err(err)
            }
        }
    }

    /// Flip the token-auth switch. The switch snaps back if the backend
    /// refuses.
    pub async fn set_token_auth(&self, enabled: bool) -> bool {
        let previous = std::mem::replace(&mut self.state.borrow_mut().token_auth, enabled);
        let path = self.config.api_path("settings/token-auth");
        let body = json!({ "enabled": enabled });

        match self.client.send(Method::Put, &path, Some(&body)).await {
            Ok(()) => {
                let key = if enabled {
                    "tokens.auth_enabled"
                } else {
                    "tokens.auth_disabled"
                };
                self.notices.success(self.i18n.t(key));
                true
            }
            Err(err) => {
                self.state.borrow_mut().token_auth = previous;
                warn!("token auth update failed: {err}");
                self.notices
                    .error(err.user_message(&self.i18n.t("tokens.auth_failed")));
                false
            }
        }
    }

    /// Create a token. The raw value is returned and revealed once; the
    /// table only ever shows it masked.
    pub async fn create_token(&self, label: &str) -> Option<String> {
        let label = label.trim();
        let body = json!({ "label": (!label.is_empty()).then_some(label) });
        let path = self.config.api_path("tokens");

        match self
            .client
            .send_json::<_, ApiToken>(Method::Post, &path, &body)
            .await
        {
            Ok(token) => {
                info!("created token {}", mask_token(&token.token));
                let raw = token.token.clone();
                let mut state = self.state.borrow_mut();
                state.revealed = Some(raw.clone());
                state.tokens.insert(0, token);
                Some(raw)
            }
            Err(err) => {
                warn!("token creation failed: {err}");
                self.notices
                    .error(err.user_message(&self.i18n.t("tokens.create_failed")));
                None
            }
        }
    }

    pub fn dismiss_reveal(&self) {
        self.state.borrow_mut().revealed = None;
    }

    pub async fn revoke(&self, token: &str) -> bool {
        if self.confirm.confirm(self.i18n.t("tokens.revoke_confirm")).await != Decision::Confirmed {
            return false;
        }
        let path = self
            .config
            .api_path(&format!("tokens/{}", encode_segment(token)));

        match self.client.send(Method::Delete, &path, None).await {
            Ok(()) => {
                self.state.borrow_mut().tokens.retain(|t| t.token != token);
                info!("revoked token {}", mask_token(token));
                self.notices.success(self.i18n.t("tokens.revoked"));
                true
            }
            Err(err) => {
                warn!("revoking token failed: {err}");
                self.notices
                    .error(err.user_message(&self.i18n.t("tokens.revoke_failed")));
                false
            }
        }
    }

    /// End the admin session and go to the login page whatever the backend
    /// answered.
    pub async fn logout(&self) {
        let request = HttpRequest::new(Method::Post, self.config.logout_path.clone());
        if let Err(err) = self.client.request(request).await {
            warn!("logout request failed: {err}");
        }
        self.location.assign(&self.config.login_path);
    }

    pub fn view(&self) -> TokenView {
        let state = self.state.borrow();
        let none = self.i18n.t("common.none");
        let rows = state
            .tokens
            .iter()
            .map(|token| {
                let active = token.is_active != 0;
                TokenRow {
                    token: token.token.clone(),
                    masked: mask_token(&token.token),
                    label: token.label.clone().unwrap_or_else(|| none.clone()),
                    created: format_date(token.created_at).unwrap_or_else(|| none.clone()),
                    last_used: token
                        .last_used_at
                        .and_then(format_date)
                        .unwrap_or_else(|| none.clone()),
                    badge: self.i18n.t(if active {
                        "tokens.active"
                    } else {
                        "tokens.revoked_badge"
                    }),
                    active,
                }
            })
            .collect();

        TokenView {
            token_auth: state.token_auth,
            rows,
            revealed: state.revealed.clone(),
        }
    }
}

fn format_date(secs: i64) -> Option<String> {
    DateTime::from_timestamp(secs, 0).map(|at| at.format("%Y-%m-%d").to_string())
}
