use super::PortalUrls;
use crate::app::ports::{Clock, PortalHttp};
use crate::config::Credentials;
use crate::constants::{
    LOGIN_COMMAND, LOGIN_FIELD_PASSWORD, LOGIN_FIELD_SUBMIT, LOGIN_FIELD_SUBMITTED,
    LOGIN_FIELD_USERNAME,
};
use crate::error::{Result, ScraperError};
use crate::metrics::ScrapeMetrics;
use crate::storage::SessionStore;
use crate::types::Session;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Owns the portal login and hands out a valid session on demand.
///
/// All callers go through one async mutex, so a refresh happens at most once
/// at a time and everybody waiting on it gets the same new session.
pub struct Authenticator {
    portal: Arc<dyn PortalHttp>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    credentials: Credentials,
    urls: PortalUrls,
    ttl: chrono::Duration,
    current: Mutex<Option<Session>>,
}

impl Authenticator {
    pub fn new(
        portal: Arc<dyn PortalHttp>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        credentials: Credentials,
        urls: PortalUrls,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            portal,
            sessions,
            clock,
            credentials,
            urls,
            ttl,
            current: Mutex::new(None),
        }
    }

    /// Returns an unexpired session, logging in first if there is none.
    pub async fn get_valid_session(&self) -> Result<Session> {
        let mut current = self.current.lock().await;
        let now = self.clock.now();

        if let Some(session) = current.as_ref().filter(|s| s.is_valid_at(now)) {
            return Ok(session.clone());
        }

        // A previous process may have left a session that is still good
        if current.is_none() {
            if let Some(stored) = self.sessions.load_session().await? {
                if stored.is_valid_at(now) {
                    debug!(expires_at = %stored.expires_at, "Reusing stored portal session");
                    *current = Some(stored.clone());
                    return Ok(stored);
                }
            }
        }

        let fresh = self.login().await?;
        *current = Some(fresh.clone());
        Ok(fresh)
    }

    /// Logs in unconditionally and installs the result as the only session.
    pub async fn authenticate(&self) -> Result<Session> {
        let mut current = self.current.lock().await;
        let fresh = self.login().await?;
        *current = Some(fresh.clone());
        Ok(fresh)
    }

    #[instrument(skip(self), fields(username = %self.credentials.username))]
    async fn login(&self) -> Result<Session> {
        let form = vec![
            ("command".to_string(), LOGIN_COMMAND.to_string()),
            (LOGIN_FIELD_SUBMITTED.to_string(), "true".to_string()),
            (LOGIN_FIELD_USERNAME.to_string(), self.credentials.username.clone()),
            (LOGIN_FIELD_PASSWORD.to_string(), self.credentials.password.clone()),
            (LOGIN_FIELD_SUBMIT.to_string(), "LOGIN".to_string()),
        ];

        let response = match self.portal.login(&self.urls.login(), &form).await {
            Ok(response) => response,
            Err(e) => {
                ScrapeMetrics::record_login_failure();
                warn!("Login request failed: {}", e);
                return Err(ScraperError::Authentication(format!("login request failed: {}", e)));
            }
        };

        if !response.is_success() {
            ScrapeMetrics::record_login_failure();
            return Err(ScraperError::Authentication(format!(
                "login returned status {}",
                response.status
            )));
        }
        if response.cookies.is_empty() {
            ScrapeMetrics::record_login_failure();
            return Err(ScraperError::Authentication(
                "login response carried no cookies".to_string(),
            ));
        }

        let session = Session::new(response.cookies, self.clock.now() + self.ttl);
        self.sessions.replace_session(&session).await?;
        ScrapeMetrics::record_login();
        info!(
            cookie_count = session.cookies.len(),
            expires_at = %session.expires_at,
            "Logged in to portal"
        );
        Ok(session)
    }
}
