//! Login and registration.

use crate::error::{StoreError, StoreResult};
use crate::events::{EventBus, Resource, StoreEvent};
use crate::session::Session;
use paperdesk_transport::{ApiClient, ApiRequest, TransportError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    status: String,
    user: Option<LoginUser>,
}

#[derive(Deserialize)]
struct LoginUser {
    id: i64,
}

fn require_non_blank(value: &str, message: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation(message.to_string()));
    }
    Ok(())
}

/// Authentication against the paper service.
#[derive(Debug, Clone)]
pub struct AuthClient {
    api: ApiClient,
    session: Arc<Session>,
    events: EventBus,
}

impl AuthClient {
    pub fn new(api: ApiClient, session: Arc<Session>, events: EventBus) -> Self {
        Self {
            api,
            session,
            events,
        }
    }

    /// Log in and bind the session to the returned user id.
    pub async fn login(&self, email: &str, password: &str) -> StoreResult<i64> {
        let result = self.try_login(email.trim(), password).await;
        if let Err(e) = &result {
            self.events.report_failure(Resource::Auth, e);
        }
        result
    }

    async fn try_login(&self, email: &str, password: &str) -> StoreResult<i64> {
        require_non_blank(email, "Email cannot be empty")?;
        require_non_blank(password, "Password cannot be empty")?;

        let request = ApiRequest::post("/login", &LoginRequest { email, password })?;
        let body = match self.api.json_or_client_error(request).await {
            Ok(body) => body,
            Err(TransportError::Server {
                status: 400..=499, ..
            }) => return Err(StoreError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };
        let response: LoginResponse = serde_json::from_value(body)
            .map_err(|e| TransportError::Parse(format!("login response: {e}")))?;

        if response.status != "success" {
            return Err(StoreError::InvalidCredentials);
        }
        let user = response
            .user
            .ok_or_else(|| TransportError::Parse("login response has no user".to_string()))?;

        self.session.establish(user.id)?;
        info!(user_id = user.id, "Logged in");
        self.events
            .publish(StoreEvent::SessionEstablished { user_id: user.id });
        Ok(user.id)
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> StoreResult<()> {
        let result = self.try_register(name.trim(), email.trim(), password).await;
        if let Err(e) = &result {
            self.events.report_failure(Resource::Auth, e);
        }
        result
    }

    async fn try_register(&self, name: &str, email: &str, password: &str) -> StoreResult<()> {
        require_non_blank(email, "Email cannot be empty")?;
        require_non_blank(password, "Password cannot be empty")?;

        let request = ApiRequest::post(
            "/register",
            &RegisterRequest {
                name,
                email,
                password,
            },
        )?;
        self.api.confirm(request).await?;
        info!(email = %email, "Registered account");
        Ok(())
    }
}
