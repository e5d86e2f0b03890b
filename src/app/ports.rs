use crate::error::Result;
use crate::types::CookieJar;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Response from the portal, body already decoded to text.
#[derive(Clone, Debug, Default)]
pub struct PortalResponse {
    pub status: u16,
    pub body: String,
    /// Cookies the portal set while serving the request.
    pub cookies: CookieJar,
}

impl PortalResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The HTTP surface of the booking portal.
#[async_trait]
pub trait PortalHttp: Send + Sync {
    /// Posts the login form from a clean cookie jar and returns every
    /// cookie collected along the way.
    async fn login(&self, url: &str, form: &[(String, String)]) -> Result<PortalResponse>;

    async fn get(&self, url: &str, cookies: &CookieJar) -> Result<PortalResponse>;

    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        cookies: &CookieJar,
    ) -> Result<PortalResponse>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|e| *e.into_inner())
    }
}
