use crate::{
    config::ApiConfig,
    error::{ProbeError, Result, TransportFailure},
    tls,
};
use reqwest::header::HOST;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

pub const SERIAL_PLACEHOLDER: &str = "{sn}";

const SUMMARY_UNAVAILABLE: &str = "(summary unavailable)";

/// Candidate URLs for one serial number, in attempt order: HTTPS without a
/// port, HTTPS with the configured port, then plain HTTP with the port.
pub fn candidate_urls(config: &ApiConfig, serial: &str) -> Result<Vec<String>> {
    if !config.path_template.contains(SERIAL_PLACEHOLDER) {
        return Err(ProbeError::Config(format!(
            "API_PATH must contain {SERIAL_PLACEHOLDER}: '{}'",
            config.path_template
        )));
    }

    let path = config.path_template.replace(SERIAL_PLACEHOLDER, serial);
    let host = &config.host;
    let port = config.port;

    let mut urls: Vec<String> = Vec::with_capacity(3);
    for url in [
        format!("https://{host}{path}"),
        format!("https://{host}:{port}{path}"),
        format!("http://{host}:{port}{path}"),
    ] {
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    Ok(urls)
}

/// One HTTP session shared by every attempt of every lookup.
pub struct ApiClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        builder = match tls::client_config(&config)? {
            Some(tls) => builder.use_preconfigured_tls(tls),
            None => {
                warn!(host = %config.host, "API certificate verification is disabled");
                builder.danger_accept_invalid_certs(true)
            }
        };

        let client = builder
            .build()
            .map_err(|err| ProbeError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self { config, client })
    }

    /// Tries each candidate URL once, in order, and returns the first
    /// successful payload. A body that is not JSON comes back as
    /// `{"status": <code>, "text": <body>}`.
    pub async fn fetch(&self, serial: &str) -> Result<Value> {
        let urls = candidate_urls(&self.config, serial)?;
        let mut last_error = String::new();

        for url in &urls {
            match self.attempt(url).await {
                Ok(payload) => {
                    info!(url = %url, "API lookup succeeded");
                    return Ok(payload);
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "API attempt failed");
                    last_error = format!("{url} -> {err}");
                }
            }
        }

        Err(ProbeError::TransportExhausted(Box::new(TransportFailure {
            attempted: urls,
            last_error,
            settings: self.settings(),
        })))
    }

    async fn attempt(&self, url: &str) -> reqwest::Result<Value> {
        let mut request = self.client.get(url);
        if let Some(header) = &self.config.host_header {
            request = request.header(HOST, header);
        }

        let response = request.send().await?.error_for_status()?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        match serde_json::from_str(&text) {
            Ok(payload) => Ok(payload),
            Err(_) => Ok(json!({ "status": status, "text": text })),
        }
    }

    fn settings(&self) -> String {
        let config = &self.config;
        let host_aware = config.host_header.is_some()
            && config.verification.is_enabled()
            && cfg!(feature = "host-header-tls");

        format!(
            "host={} port={} timeout={}s use_system_proxy={} verify={} host_header={} \
             sni_adapter={}",
            config.host,
            config.port,
            config.timeout.as_secs(),
            config.use_system_proxy,
            config.verification,
            config.host_header.as_deref().unwrap_or("<none>"),
            if host_aware { "on" } else { "off" },
        )
    }
}

/// Short human summary of an asset payload: the status plus repair and WIP
/// row counts, and highlights from the last row of each.
pub fn summarize_payload(payload: &Value) -> String {
    summarize(payload).unwrap_or_else(|| SUMMARY_UNAVAILABLE.to_string())
}

fn summarize(payload: &Value) -> Option<String> {
    let payload = payload.as_object()?;
    let results: &[Value] = match payload.get("result") {
        None => &[],
        Some(Value::Array(items)) => items,
        Some(_) => return None,
    };

    let mut repair: Vec<&Map<String, Value>> = Vec::new();
    let mut wip: Vec<&Map<String, Value>> = Vec::new();
    for row in results {
        let row = row.as_object()?;
        match row.get("TABLES").and_then(Value::as_str) {
            Some("REPAIR STATUS") => repair.push(row),
            Some("WIP STATUS") => wip.push(row),
            _ => {}
        }
    }

    let mut lines = vec![
        format!("status: {}", field(payload, "status")),
        format!("REPAIR STATUS rows: {}", repair.len()),
        format!("WIP STATUS rows: {}", wip.len()),
    ];
    if let Some(last) = wip.last() {
        lines.push(format!("MODEL_NAME: {}", field(last, "MODEL_NAME")));
        lines.push(format!("WIP_GROUP: {}", field(last, "WIP_GROUP")));
    }
    if let Some(last) = repair.last() {
        lines.push(format!("last test TEST_CODE: {}", field(last, "TEST_CODE")));
        lines.push(format!("last test DATA1: {}", field(last, "DATA1")));
    }
    Some(lines.join("\n"))
}

fn field(row: &Map<String, Value>, key: &str) -> String {
    match row.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsVerification;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn config(path: &str) -> ApiConfig {
        ApiConfig {
            host: "api.local".to_string(),
            port: 8080,
            path_template: path.to_string(),
            timeout: Duration::from_secs(3),
            use_system_proxy: false,
            host_header: None,
            verification: TlsVerification::Disabled,
        }
    }

    #[test]
    fn candidates_follow_transport_order() {
        let urls =
            candidate_urls(&config("/assets?sn={sn}"), "ABC123").expect("template is valid");
        assert_eq!(
            urls,
            vec![
                "https://api.local/assets?sn=ABC123",
                "https://api.local:8080/assets?sn=ABC123",
                "http://api.local:8080/assets?sn=ABC123",
            ]
        );
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let err = candidate_urls(&config("/assets"), "ABC123").expect_err("no placeholder");
        assert!(matches!(err, ProbeError::Config(msg) if msg.contains("{sn}")));
    }

    #[test]
    fn settings_describe_the_effective_policy() {
        let mut api = config("/a?sn={sn}");
        api.host_header = Some("assets.corp.local".to_string());
        let client = ApiClient::new(api).expect("client builds");

        assert_eq!(
            client.settings(),
            "host=api.local port=8080 timeout=3s use_system_proxy=false verify=off \
             host_header=assets.corp.local sni_adapter=off"
        );
    }

    #[test]
    fn summary_counts_rows_by_table() {
        let payload = json!({
            "status": "OK",
            "result": [
                {"TABLES": "WIP STATUS", "MODEL_NAME": "M1", "WIP_GROUP": "SMT"},
                {"TABLES": "REPAIR STATUS", "TEST_CODE": "T01", "DATA1": "old"},
                {"TABLES": "WIP STATUS", "MODEL_NAME": "M2", "WIP_GROUP": "PACK"},
                {"TABLES": "REPAIR STATUS", "TEST_CODE": "T09", "DATA1": 42},
                {"TABLES": "OTHER"}
            ]
        });

        assert_eq!(
            summarize_payload(&payload),
            "status: OK\n\
             REPAIR STATUS rows: 2\n\
             WIP STATUS rows: 2\n\
             MODEL_NAME: M2\n\
             WIP_GROUP: PACK\n\
             last test TEST_CODE: T09\n\
             last test DATA1: 42"
        );
    }

    #[test]
    fn summary_without_results_only_counts() {
        assert_eq!(
            summarize_payload(&json!({"status": 200, "text": "<html>"})),
            "status: 200\nREPAIR STATUS rows: 0\nWIP STATUS rows: 0"
        );
    }

    #[test]
    fn summary_of_wrong_shape_is_unavailable() {
        assert_eq!(summarize_payload(&json!([1, 2])), SUMMARY_UNAVAILABLE);
        assert_eq!(summarize_payload(&json!({"result": "nope"})), SUMMARY_UNAVAILABLE);
        assert_eq!(summarize_payload(&json!({"result": [1]})), SUMMARY_UNAVAILABLE);
    }
}
