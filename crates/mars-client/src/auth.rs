use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value;

use crate::api::ApiClient;

#[derive(Debug, Clone, Serialize)]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Authentication operations over the shared client. Token storage lives in
/// the client's credential provider, so success here is immediately visible
/// to every other service.
pub struct AuthService<'a> {
    api: &'a ApiClient,
}

impl<'a> AuthService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Posts credentials and stores the returned bearer token with its
    /// seven-day expiry. The response body is returned for display.
    pub fn login(&self, email: &str, password: &str) -> Result<Value> {
        let payload = serde_json::json!({ "email": email, "password": password });
        let response = self.api.post_json("auth/login", &payload)?;
        let Some(token) = response.get("token").and_then(Value::as_str) else {
            bail!("login response missing token");
        };
        self.api.credentials().store(token)?;
        Ok(response)
    }

    /// Creates the account and, when the backend hands a token back the way
    /// login does, stores it so registration logs the user in.
    pub fn register(&self, data: &RegisterData) -> Result<Value> {
        let payload = serde_json::to_value(data)?;
        let response = self.api.post_json("auth/register", &payload)?;
        if let Some(token) = response.get("token").and_then(Value::as_str) {
            self.api.credentials().store(token)?;
        }
        Ok(response)
    }

    /// Requests server-side invalidation, then deletes the local credential
    /// unconditionally; a failed server call still logs out locally.
    pub fn logout(&self) -> Result<()> {
        let result = self.api.post_json("auth/logout", &serde_json::json!({}));
        self.api.credentials().clear()?;
        result.map(|_| ())
    }

    pub fn current_user(&self) -> Result<Value> {
        self.api.get_json("users/me", &[])
    }

    /// Presence check only; the token is not verified against the server.
    pub fn is_authenticated(&self) -> bool {
        self.api.credentials().is_authenticated()
    }

    /// Opportunistic validation: fetch the profile and treat any failure as
    /// an invalid token, clearing the local credential.
    pub fn validate_token(&self) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        match self.current_user() {
            Ok(_) => true,
            Err(_) => {
                let _ = self.api.credentials().clear();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_payload_carries_all_fields() {
        let data = RegisterData {
            email: "ada@example.com".to_string(),
            password: "hunter2".to_string(),
            name: "Ada".to_string(),
        };
        let payload = serde_json::to_value(&data).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({
                "email": "ada@example.com",
                "password": "hunter2",
                "name": "Ada",
            })
        );
    }
}
