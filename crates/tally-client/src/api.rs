//! Typed REST client for the chat backend.
//!
//! Every call authenticates with the session bearer token. Failures map to
//! [`ApiError`]; callers catch and log them, leaving prior state untouched.

use serde::de::DeserializeOwned;
use thiserror::Error;

use tally_shared::constants::{DEBT_FETCH_LIMIT, DEBT_STATUS_FILTER, HISTORY_FETCH_LIMIT};
use tally_shared::protocol::InboundMessage;
use tally_shared::types::UserId;
use tally_store::{DebtBalance, DebtRecord, Task, User};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(reqwest::StatusCode),
}

/// REST client bound to one API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// List all chat participants (including the local user).
    pub async fn list_users(&self, token: &str) -> Result<Vec<User>, ApiError> {
        self.get_json(token, "/api/users/", &[]).await
    }

    /// Historical messages with one counterpart, most recent first.
    pub async fn message_history(
        &self,
        token: &str,
        other_user: UserId,
    ) -> Result<Vec<InboundMessage>, ApiError> {
        self.get_json(
            token,
            "/api/messages/",
            &[
                ("other_user_id", other_user.to_string()),
                ("limit", HISTORY_FETCH_LIMIT.to_string()),
            ],
        )
        .await
    }

    /// All tasks involving the local user.
    pub async fn list_tasks(&self, token: &str) -> Result<Vec<Task>, ApiError> {
        self.get_json(token, "/api/tasks/", &[]).await
    }

    /// Active debt records involving the local user.
    pub async fn debt_history(&self, token: &str) -> Result<Vec<DebtRecord>, ApiError> {
        self.get_json(
            token,
            "/api/debts/history",
            &[
                ("status_filter", DEBT_STATUS_FILTER.to_string()),
                ("limit", DEBT_FETCH_LIMIT.to_string()),
            ],
        )
        .await
    }

    /// Aggregate debt balance of the local user.
    pub async fn balance(&self, token: &str) -> Result<DebtBalance, ApiError> {
        self.get_json(token, "/api/debts/balance", &[]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .get(format!("{}{}", self.base, path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(client.base, "http://localhost:8000");
    }
}
