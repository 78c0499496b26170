//! Google OAuth 2.0 client (authorization code flow).

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Deserialize;

use katana_forge_core::Email;

use super::AuthError;
use crate::config::GoogleOAuthConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Profile returned by the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    /// Stable Google account id.
    pub sub: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<Verified>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

/// `email_verified` arrives as a boolean or as `"true"`/`"false"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Verified {
    Bool(bool),
    Text(String),
}

impl GoogleProfile {
    /// Whether Google vouches for the email address.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        match &self.email_verified {
            Some(Verified::Bool(verified)) => *verified,
            Some(Verified::Text(text)) => text == "true",
            None => false,
        }
    }

    /// Display name, falling back to given + family name and then to the
    /// local part of the email.
    #[must_use]
    pub fn display_name(&self, email: &Email) -> String {
        let joined = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| joined.trim());

        if name.is_empty() {
            email
                .as_str()
                .split('@')
                .next()
                .unwrap_or_default()
                .to_owned()
        } else {
            name.to_owned()
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client for Google's OAuth endpoints.
#[derive(Clone)]
pub struct GoogleClient {
    inner: Arc<GoogleClientInner>,
}

struct GoogleClientInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleClient {
    /// Create a client whose callback lives under `base_url`.
    #[must_use]
    pub fn new(config: &GoogleOAuthConfig, base_url: &str) -> Self {
        Self {
            inner: Arc::new(GoogleClientInner {
                client: reqwest::Client::new(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.expose_secret().to_string(),
                redirect_uri: format!("{base_url}/auth/google/callback"),
            }),
        }
    }

    /// URL of Google's consent screen.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?\
            client_id={}&\
            redirect_uri={}&\
            response_type=code&\
            scope={}&\
            access_type=offline&\
            prompt=select_account&\
            state={}",
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(&self.inner.redirect_uri),
            urlencoding::encode("openid email profile"),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code and fetch the user's profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OAuth` if Google rejects the code, or
    /// `AuthError::Http` on transport failures.
    pub async fn fetch_profile(&self, code: &str) -> Result<GoogleProfile, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.inner.redirect_uri.as_str()),
        ];

        let response = self.inner.client.post(TOKEN_URL).form(&params).send().await?;
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::OAuth(format!("Token exchange failed: {text}")));
        }
        let token: TokenResponse = response.json().await?;

        let response = self
            .inner
            .client
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(AuthError::OAuth(format!("Userinfo request failed ({status})")));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn profile(json: &str) -> GoogleProfile {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_verified_accepts_bool_and_string() {
        assert!(profile(r#"{"sub":"1","email_verified":true}"#).is_verified());
        assert!(profile(r#"{"sub":"1","email_verified":"true"}"#).is_verified());
        assert!(!profile(r#"{"sub":"1","email_verified":"false"}"#).is_verified());
        assert!(!profile(r#"{"sub":"1"}"#).is_verified());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let email = Email::parse("hattori@example.com").unwrap();
        assert_eq!(
            profile(r#"{"sub":"1","name":" Hattori Hanzo "}"#).display_name(&email),
            "Hattori Hanzo"
        );
        assert_eq!(
            profile(r#"{"sub":"1","given_name":"Hattori","family_name":"Hanzo"}"#)
                .display_name(&email),
            "Hattori Hanzo"
        );
        assert_eq!(profile(r#"{"sub":"1"}"#).display_name(&email), "hattori");
    }

    #[test]
    fn test_authorization_url() {
        let client = GoogleClient::new(
            &GoogleOAuthConfig {
                client_id: "client-123".to_string(),
                client_secret: SecretString::from("secret"),
            },
            "https://kfor.ge",
        );
        let url = client.authorization_url("st4te");
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fkfor.ge%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("state=st4te"));
        assert!(url.contains("scope=openid%20email%20profile"));
    }
}
