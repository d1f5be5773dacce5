// =====================================================================================
// File: core-siem/src/splunk.rs
// Description: Splunk connector (HEC ingestion + REST search/alerts)
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::connector::{
    AlertCreation, AlertRequest, BatchResult, ConnectionTest, SiemConnector, SiemType,
};
use crate::{SiemError, SiemResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_config::SiemConnectorConfig;
use core_events::{DlpEvent, SiemEnvelope};
use reqwest::header::AUTHORIZATION;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

/// Maximum poll attempts while waiting for a search job
const SEARCH_POLL_ATTEMPTS: usize = 30;

/// Splunk connector.
///
/// Ingestion goes through the HTTP Event Collector with token auth;
/// searches and alert creation go through the REST API with a session key
/// obtained from username/password credentials.
pub struct SplunkConnector {
    name: String,
    base_url: Url,
    hec_token: Option<String>,
    username: Option<String>,
    password: Option<String>,
    source: String,
    sourcetype: String,
    index: String,
    poll_interval: Duration,
    client: reqwest::Client,
    connected: AtomicBool,
    session_key: RwLock<Option<String>>,
}

impl SplunkConnector {
    pub fn from_config(config: &SiemConnectorConfig) -> SiemResult<Self> {
        let scheme = if config.use_ssl { "https" } else { "http" };
        let base_url = Url::parse(&format!("{}://{}:{}/", scheme, config.host, config.port))?;

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_certs)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(SiemError::from)?;

        Ok(Self {
            name: config.name.clone(),
            base_url,
            hec_token: config.hec_token.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            source: config
                .source
                .clone()
                .unwrap_or_else(|| "sentinel_dlp".to_string()),
            sourcetype: config
                .sourcetype
                .clone()
                .unwrap_or_else(|| "dlp:event".to_string()),
            index: config.index.clone().unwrap_or_else(|| "dlp".to_string()),
            poll_interval: Duration::from_secs(1),
            client,
            connected: AtomicBool::new(false),
            session_key: RwLock::new(None),
        })
    }

    /// Shorten the search-job poll interval; used by tests
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn endpoint(&self, path: &str) -> SiemResult<Url> {
        self.base_url.join(path).map_err(SiemError::from)
    }

    fn hec_auth(&self) -> SiemResult<String> {
        match &self.hec_token {
            Some(token) => Ok(format!("Splunk {}", token)),
            // Test-only deployments may run HEC without a token
            None => Ok("Splunk".to_string()),
        }
    }

    async fn rest_auth(&self) -> SiemResult<String> {
        self.session_key
            .read()
            .await
            .as_ref()
            .map(|key| format!("Splunk {}", key))
            .ok_or_else(|| {
                SiemError::authentication_error("session key required for the search API")
            })
    }

    /// Build the HEC payload for one event
    fn hec_payload(&self, event: &DlpEvent, index: Option<&str>) -> Value {
        let envelope = SiemEnvelope::from_event(event, &self.source);
        let host = envelope.hostname().unwrap_or("unknown").to_string();
        json!({
            "time": event.timestamp.timestamp(),
            "host": host,
            "source": self.source,
            "sourcetype": self.sourcetype,
            "index": index.unwrap_or(&self.index),
            "event": envelope.into_value(),
        })
    }
}

#[async_trait]
impl SiemConnector for SplunkConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn siem_type(&self) -> SiemType {
        SiemType::Splunk
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> SiemResult<()> {
        // REST credentials are optional: HEC ingestion only needs the token
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            let url = self.endpoint("services/auth/login")?;
            let response = self
                .client
                .post(url)
                .form(&[
                    ("username", username.as_str()),
                    ("password", password.as_str()),
                    ("output_mode", "json"),
                ])
                .send()
                .await?;

            if response.status().is_success() {
                let body: Value = response.json().await?;
                let key = body
                    .get("sessionKey")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                *self.session_key.write().await = key;
            } else {
                warn!(
                    connector = %self.name,
                    status = %response.status(),
                    "Splunk REST login failed, search API unavailable"
                );
            }
        }

        self.connected.store(true, Ordering::SeqCst);
        info!(connector = %self.name, host = %self.base_url, "Connected to Splunk");
        Ok(())
    }

    async fn disconnect(&self) -> SiemResult<()> {
        *self.session_key.write().await = None;
        self.connected.store(false, Ordering::SeqCst);
        info!(connector = %self.name, "Disconnected from Splunk");
        Ok(())
    }

    async fn test_connection(&self) -> SiemResult<ConnectionTest> {
        let url = self.endpoint("services/collector/health")?;
        let response = match self
            .client
            .get(url)
            .header(AUTHORIZATION, self.hec_auth()?)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(ConnectionTest::failed(format!("HEC unreachable: {}", e))),
        };

        if response.status().is_success() {
            Ok(ConnectionTest::ok("Connected to Splunk HEC")
                .with_detail("hec_status", json!("healthy")))
        } else {
            Ok(ConnectionTest::failed(format!(
                "HEC health returned status {}",
                response.status()
            )))
        }
    }

    async fn send_event(&self, event: &DlpEvent, index: Option<&str>) -> SiemResult<()> {
        let payload = self.hec_payload(event, index);
        let url = self.endpoint("services/collector")?;
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, self.hec_auth()?)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SiemError::transport_error(format!(
                "HEC returned status {}",
                response.status()
            )))
        }
    }

    async fn send_batch(
        &self,
        events: &[DlpEvent],
        index: Option<&str>,
    ) -> SiemResult<BatchResult> {
        if events.is_empty() {
            return Ok(BatchResult::complete(0, 0, None));
        }

        // Newline-delimited payloads in a single HEC request
        let mut body = String::new();
        for event in events {
            body.push_str(&serde_json::to_string(&self.hec_payload(event, index))?);
            body.push('\n');
        }

        let url = self.endpoint("services/collector")?;
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, self.hec_auth()?)
            .body(body)
            .send()
            .await?;

        let target_index = index.unwrap_or(&self.index).to_string();
        if response.status().is_success() {
            info!(
                connector = %self.name,
                total = events.len(),
                index = %target_index,
                "Batch sent to Splunk"
            );
            Ok(BatchResult::complete(
                events.len(),
                events.len(),
                Some(target_index),
            ))
        } else {
            let status = response.status();
            warn!(connector = %self.name, status = %status, "Splunk batch rejected");
            Ok(BatchResult::rejected(
                events.len(),
                format!("HEC returned status {}", status),
            ))
        }
    }

    async fn query_events(
        &self,
        query: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        limit: usize,
    ) -> SiemResult<Vec<Value>> {
        let auth = self.rest_auth().await?;

        let search = format!(
            "search {} earliest={} latest={} | head {}",
            query,
            start_time.to_rfc3339(),
            end_time.to_rfc3339(),
            limit
        );

        // Create the search job
        let url = self.endpoint("services/search/jobs")?;
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, auth.clone())
            .form(&[("search", search.as_str()), ("output_mode", "json")])
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::CREATED {
            return Err(SiemError::query_error(format!(
                "search job creation returned status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let sid = body
            .get("sid")
            .and_then(Value::as_str)
            .ok_or_else(|| SiemError::query_error("search job response had no sid"))?
            .to_string();

        // Poll for completion
        let job_url = self.endpoint(&format!("services/search/jobs/{}", sid))?;
        let mut done = false;
        for _ in 0..SEARCH_POLL_ATTEMPTS {
            let response = self
                .client
                .get(job_url.clone())
                .header(AUTHORIZATION, auth.clone())
                .query(&[("output_mode", "json")])
                .send()
                .await?;

            if response.status().is_success() {
                let status: Value = response.json().await?;
                if status
                    .pointer("/entry/0/content/isDone")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                {
                    done = true;
                    break;
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        if !done {
            return Err(SiemError::query_error("search job did not complete in time"));
        }

        // Fetch results
        let results_url = self.endpoint(&format!("services/search/jobs/{}/results", sid))?;
        let response = self
            .client
            .get(results_url)
            .header(AUTHORIZATION, auth)
            .query(&[("output_mode", "json")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SiemError::query_error(format!(
                "results fetch returned status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        Ok(body
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_alert(&self, request: &AlertRequest) -> SiemResult<AlertCreation> {
        let auth = self.rest_auth().await?;

        let severity = request.severity.as_str().to_string();
        let cron = request
            .cron
            .clone()
            .unwrap_or_else(|| "*/5 * * * *".to_string());
        let expires = request.expires.clone().unwrap_or_else(|| "24h".to_string());

        let mut form: Vec<(&str, String)> = vec![
            ("name", request.name.clone()),
            ("search", request.query.clone()),
            ("description", request.description.clone()),
            ("alert_type", "always".to_string()),
            ("alert_severity", severity),
            ("alert.track", "1".to_string()),
            ("alert.expires", expires),
            ("cron_schedule", cron),
            ("is_scheduled", "1".to_string()),
            ("output_mode", "json".to_string()),
        ];
        if let Some(email_to) = &request.email_to {
            form.push(("action.email.to", email_to.clone()));
            form.push((
                "action.email.subject",
                format!("DLP Alert: {}", request.name),
            ));
            form.push(("actions", "email".to_string()));
        }

        let url = self.endpoint("services/saved/searches")?;
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, auth)
            .form(&form)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::CREATED {
            info!(connector = %self.name, alert = %request.name, "Splunk alert created");
            Ok(AlertCreation {
                success: true,
                alert_id: request.name.clone(),
                message: "Alert created successfully".to_string(),
            })
        } else {
            Err(SiemError::alert_error(format!(
                "saved search creation returned status {}",
                response.status()
            )))
        }
    }
}
