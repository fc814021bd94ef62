// src/services/http.rs
use std::env;
use std::time::Duration;

use log::info;
use reqwest::{Client, Proxy};

use crate::BoxError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Outbound transport settings, built once in main and injected into each
/// adapter. The proxy applies only to clients built from this config, not
/// to the whole process.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub proxy_url: Option<String>,
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            proxy_url: None,
            timeout: FETCH_TIMEOUT,
        }
    }
}

impl HttpConfig {
    pub fn from_env() -> Self {
        let proxy_url = env::var("HTTP_PROXY")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();

        if let Some(url) = &proxy_url {
            info!("using proxy: {}", url);
        }

        HttpConfig {
            proxy_url,
            timeout: FETCH_TIMEOUT,
        }
    }

    pub fn build_client(&self) -> Result<Client, BoxError> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout);

        if let Some(url) = &self.proxy_url {
            builder = builder.proxy(Proxy::all(url)?);
        }

        Ok(builder.build()?)
    }
}
