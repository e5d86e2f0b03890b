use crate::app::ports::{PortalHttp, PortalResponse};
use crate::constants::USER_AGENT;
use crate::error::{Result, ScraperError};
use crate::metrics::ScrapeMetrics;
use crate::types::{cookie_header, parse_cookie_pairs, CookieJar};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, COOKIE, SET_COOKIE};
use reqwest::{Client, Response, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// `PortalHttp` over reqwest.
///
/// Regular requests go through one shared client without a cookie store and
/// carry the session explicitly. Login builds a throwaway client with its own
/// jar so that cookies set across the redirect chain are all collected.
pub struct ReqwestPortal {
    client: Client,
    timeout: Duration,
}

impl ReqwestPortal {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    async fn into_portal_response(response: Response) -> Result<PortalResponse> {
        let status = response.status().as_u16();
        let mut cookies = CookieJar::new();
        for header in response.headers().get_all(SET_COOKIE) {
            if let Ok(raw) = header.to_str() {
                // Only the leading name=value pair; attributes follow the first ';'
                if let Some(pair) = raw.split(';').next() {
                    cookies.extend(parse_cookie_pairs(pair));
                }
            }
        }
        let body = response.text().await?;
        Ok(PortalResponse { status, body, cookies })
    }
}

#[async_trait]
impl PortalHttp for ReqwestPortal {
    async fn login(&self, url: &str, form: &[(String, String)]) -> Result<PortalResponse> {
        let login_url = Url::parse(url)
            .map_err(|e| ScraperError::Config(format!("Invalid login url '{}': {}", url, e)))?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .cookie_provider(jar.clone())
            .build()?;

        ScrapeMetrics::record_request();
        let response = client
            .post(login_url.clone())
            .header(ACCEPT, "*/*")
            .form(form)
            .send()
            .await?;
        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let body = response.text().await?;

        let mut cookies = CookieJar::new();
        let root = login_url.join("/").unwrap_or_else(|_| login_url.clone());
        for scope in [&root, &login_url, &final_url] {
            if let Some(header) = jar.cookies(scope) {
                if let Ok(raw) = header.to_str() {
                    cookies.extend(parse_cookie_pairs(raw));
                }
            }
        }
        debug!(status, cookie_count = cookies.len(), "Login response received");

        Ok(PortalResponse { status, body, cookies })
    }

    async fn get(&self, url: &str, cookies: &CookieJar) -> Result<PortalResponse> {
        ScrapeMetrics::record_request();
        let mut request = self.client.get(url).header(ACCEPT, "text/html,*/*");
        if !cookies.is_empty() {
            request = request.header(COOKIE, cookie_header(cookies));
        }
        let response = request.send().await?;
        Self::into_portal_response(response).await
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        cookies: &CookieJar,
    ) -> Result<PortalResponse> {
        ScrapeMetrics::record_request();
        let mut request = self
            .client
            .post(url)
            .header(ACCEPT, "text/html,*/*")
            .form(form);
        if !cookies.is_empty() {
            request = request.header(COOKIE, cookie_header(cookies));
        }
        let response = request.send().await?;
        Self::into_portal_response(response).await
    }
}
