use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_GATEWAY_URL: &str = "ws://127.0.0.1:18789";
const CONFIG_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Deserialize, Debug)]
struct DashboardConfig {
    #[serde(default, rename = "gatewayWs")]
    gateway_ws: Option<String>,
}

pub fn default_endpoint() -> Url {
    Url::parse(DEFAULT_GATEWAY_URL).expect("default gateway url is valid")
}

/// Accepts only `ws://` and `wss://` targets.
pub fn parse_gateway_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "ws" | "wss" => Some(url),
        _ => None,
    }
}

pub fn parse_config_body(body: &str) -> Result<Url> {
    let config: DashboardConfig =
        serde_json::from_str(body).context("config body is not valid JSON")?;
    let raw = config
        .gateway_ws
        .ok_or_else(|| anyhow!("config body has no gatewayWs"))?;
    parse_gateway_url(&raw).ok_or_else(|| anyhow!("gatewayWs is not a websocket url: {raw}"))
}

pub async fn fetch_endpoint(config_url: &Url) -> Result<Url> {
    let client = reqwest::Client::builder()
        .timeout(CONFIG_FETCH_TIMEOUT)
        .build()
        .context("build http client")?;
    let body = client
        .get(config_url.clone())
        .send()
        .await
        .with_context(|| format!("GET {config_url}"))?
        .error_for_status()?
        .text()
        .await?;
    parse_config_body(&body)
}

/// Explicit override first, then the dashboard config endpoint, then the
/// built-in default. Never fails.
pub async fn resolve_endpoint(explicit: Option<&str>, config_url: Option<&Url>) -> Url {
    if let Some(raw) = explicit {
        match parse_gateway_url(raw) {
            Some(url) => return url,
            None => warn!("gateway_url_invalid: {raw}; resolving from config"),
        }
    }
    let Some(config_url) = config_url else {
        return default_endpoint();
    };
    match fetch_endpoint(config_url).await {
        Ok(url) => {
            info!("gateway_config_fetched: {url}");
            url
        }
        Err(err) => {
            warn!("gateway_config_fetch_error: {err:#}; using {DEFAULT_GATEWAY_URL}");
            default_endpoint()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status_line: &'static str, body: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 2048];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        });
        Url::parse(&format!("http://{addr}/api/config")).expect("config url")
    }

    #[test]
    fn config_body_yields_gateway_url() {
        let url = parse_config_body(r#"{"gatewayWs":"ws://10.0.0.5:18789"}"#).expect("parse");
        assert_eq!(url.as_str(), "ws://10.0.0.5:18789/");
    }

    #[test]
    fn malformed_config_bodies_are_rejected() {
        assert!(parse_config_body("<html>").is_err());
        assert!(parse_config_body("{}").is_err());
        assert!(parse_config_body(r#"{"gatewayWs":"http://10.0.0.5"}"#).is_err());
        assert!(parse_config_body(r#"{"gatewayWs":"not a url"}"#).is_err());
    }

    #[tokio::test]
    async fn invalid_override_and_missing_config_fall_back_to_default() {
        let url = resolve_endpoint(Some("localhost:18789"), None).await;
        assert_eq!(url, default_endpoint());
        let url = resolve_endpoint(Some("wss://gateway.local/ws"), None).await;
        assert_eq!(url.as_str(), "wss://gateway.local/ws");
    }

    #[tokio::test]
    async fn fetched_config_is_used() {
        let config_url = serve_once("HTTP/1.1 200 OK", r#"{"gatewayWs":"ws://127.0.0.1:4555"}"#).await;
        let url = resolve_endpoint(None, Some(&config_url)).await;
        assert_eq!(url.as_str(), "ws://127.0.0.1:4555/");
    }

    #[tokio::test]
    async fn failed_config_fetch_uses_default() {
        let config_url = serve_once("HTTP/1.1 500 Internal Server Error", "{}").await;
        let url = resolve_endpoint(None, Some(&config_url)).await;
        assert_eq!(url, default_endpoint());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let refused = Url::parse(&format!("http://{addr}/api/config")).expect("url");
        assert_eq!(resolve_endpoint(None, Some(&refused)).await, default_endpoint());
    }
}
