// =====================================================================================
// File: core-siem/src/elk.rs
// Description: Elasticsearch/ELK stack connector
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use crate::connector::{
    AlertCreation, AlertRequest, BatchResult, ConnectionTest, SiemConnector, SiemType,
};
use crate::{SiemError, SiemResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use core_config::SiemConnectorConfig;
use core_events::{DlpEvent, SiemEnvelope};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use url::Url;

/// Documents per bulk request chunk
const BULK_CHUNK_SIZE: usize = 500;

/// Elasticsearch/ELK stack connector.
///
/// Ingests into daily indices `<prefix>-YYYY.MM.DD`, bulk-indexes through
/// `_bulk`, queries through `_search`, and installs alerts as Watcher
/// definitions.
pub struct ElkConnector {
    name: String,
    base_url: Url,
    index_prefix: String,
    source: String,
    authorization: Option<HeaderValue>,
    client: reqwest::Client,
    connected: AtomicBool,
}

impl ElkConnector {
    pub fn from_config(config: &SiemConnectorConfig) -> SiemResult<Self> {
        let scheme = if config.use_ssl { "https" } else { "http" };
        let base_url = Url::parse(&format!("{}://{}:{}/", scheme, config.host, config.port))?;

        let authorization = if let Some(api_key) = &config.api_key {
            Some(
                HeaderValue::from_str(&format!("ApiKey {}", api_key))
                    .map_err(|e| SiemError::configuration_error(e.to_string()))?,
            )
        } else if let (Some(username), Some(password)) = (&config.username, &config.password) {
            let credentials = BASE64.encode(format!("{}:{}", username, password));
            Some(
                HeaderValue::from_str(&format!("Basic {}", credentials))
                    .map_err(|e| SiemError::configuration_error(e.to_string()))?,
            )
        } else {
            None
        };

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_certs)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(SiemError::from)?;

        Ok(Self {
            name: config.name.clone(),
            base_url,
            index_prefix: config
                .index_prefix
                .clone()
                .unwrap_or_else(|| "dlp-events".to_string()),
            source: config
                .source
                .clone()
                .unwrap_or_else(|| "sentinel_dlp".to_string()),
            authorization,
            client,
            connected: AtomicBool::new(false),
        })
    }

    fn endpoint(&self, path: &str) -> SiemResult<Url> {
        self.base_url.join(path).map_err(SiemError::from)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(auth) = &self.authorization {
            builder = builder.header(AUTHORIZATION, auth.clone());
        }
        builder
    }

    /// Daily index for the current UTC date
    fn daily_index(&self) -> String {
        format!("{}-{}", self.index_prefix, Utc::now().format("%Y.%m.%d"))
    }

    /// Create the index template mapping the common envelope to typed fields
    pub async fn create_index_template(&self) -> SiemResult<bool> {
        let template = json!({
            "index_patterns": [format!("{}-*", self.index_prefix)],
            "template": {
                "settings": {
                    "number_of_shards": 3,
                    "number_of_replicas": 1,
                    "index.refresh_interval": "5s"
                },
                "mappings": {
                    "properties": {
                        "timestamp": {"type": "date"},
                        "event_id": {"type": "keyword"},
                        "event_type": {"type": "keyword"},
                        "source": {"type": "keyword"},
                        "severity": {"type": "keyword"},
                        "agent": {
                            "properties": {
                                "id": {"type": "keyword"},
                                "name": {"type": "keyword"},
                                "hostname": {"type": "keyword"},
                                "ip": {"type": "ip"},
                                "os": {"type": "keyword"}
                            }
                        },
                        "dlp": {
                            "properties": {
                                "classification_type": {"type": "keyword"},
                                "confidence": {"type": "float"},
                                "blocked": {"type": "boolean"},
                                "policy_id": {"type": "keyword"},
                                "policy_name": {"type": "text"},
                                "rule_id": {"type": "keyword"}
                            }
                        },
                        "user": {
                            "properties": {
                                "username": {"type": "keyword"},
                                "domain": {"type": "keyword"},
                                "email": {"type": "keyword"}
                            }
                        },
                        "network": {
                            "properties": {
                                "source_ip": {"type": "ip"},
                                "destination_ip": {"type": "ip"},
                                "destination_host": {"type": "keyword"},
                                "destination_country": {"type": "keyword"}
                            }
                        },
                        "file": {
                            "properties": {
                                "name": {"type": "keyword"},
                                "path": {"type": "text"},
                                "size": {"type": "long"},
                                "hash": {"type": "keyword"},
                                "type": {"type": "keyword"}
                            }
                        },
                        "actions": {"type": "keyword"},
                        "metadata": {"type": "object", "enabled": false}
                    }
                }
            }
        });

        let url = self.endpoint(&format!("_index_template/{}-template", self.index_prefix))?;
        let response = self
            .request(reqwest::Method::PUT, url)
            .json(&template)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SiemError::transport_error(format!(
                "template creation failed with status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        info!(template = format!("{}-template", self.index_prefix), "ELK index template created");
        Ok(body.get("acknowledged").and_then(Value::as_bool).unwrap_or(false))
    }
}

#[async_trait]
impl SiemConnector for ElkConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn siem_type(&self) -> SiemType {
        SiemType::Elk
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> SiemResult<()> {
        let url = self.endpoint("")?;
        let response = self.request(reqwest::Method::GET, url).send().await?;

        if !response.status().is_success() {
            self.connected.store(false, Ordering::SeqCst);
            return Err(SiemError::connection_error(format!(
                "cluster info returned status {}",
                response.status()
            )));
        }

        let info_body: Value = response.json().await?;
        self.connected.store(true, Ordering::SeqCst);
        info!(
            connector = %self.name,
            cluster_name = info_body.get("cluster_name").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
            version = info_body
                .pointer("/version/number")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown"),
            "Connected to Elasticsearch"
        );
        Ok(())
    }

    async fn disconnect(&self) -> SiemResult<()> {
        // The HTTP transport is stateless; dropping the flag releases the
        // connector from the active set.
        self.connected.store(false, Ordering::SeqCst);
        info!(connector = %self.name, "Disconnected from Elasticsearch");
        Ok(())
    }

    async fn test_connection(&self) -> SiemResult<ConnectionTest> {
        let url = self.endpoint("_cluster/health")?;
        let response = match self.request(reqwest::Method::GET, url).send().await {
            Ok(response) => response,
            Err(e) => return Ok(ConnectionTest::failed(format!("cluster unreachable: {}", e))),
        };

        if !response.status().is_success() {
            return Ok(ConnectionTest::failed(format!(
                "cluster health returned status {}",
                response.status()
            )));
        }

        let health: Value = response.json().await?;
        Ok(ConnectionTest::ok("Connected to Elasticsearch")
            .with_detail(
                "cluster_health",
                health.get("status").cloned().unwrap_or(Value::Null),
            )
            .with_detail(
                "number_of_nodes",
                health.get("number_of_nodes").cloned().unwrap_or(Value::Null),
            ))
    }

    async fn send_event(&self, event: &DlpEvent, index: Option<&str>) -> SiemResult<()> {
        let target_index = index.map(str::to_string).unwrap_or_else(|| self.daily_index());
        let envelope = SiemEnvelope::from_event(event, &self.source);

        let url = self.endpoint(&format!("{}/_doc", target_index))?;
        let response = self
            .request(reqwest::Method::POST, url)
            .json(envelope.as_value())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SiemError::transport_error(format!(
                "index request returned status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let result = body.get("result").and_then(Value::as_str).unwrap_or("");
        if matches!(result, "created" | "updated") {
            Ok(())
        } else {
            Err(SiemError::transport_error(format!(
                "unexpected index result '{}'",
                result
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

        let target_index = index.map(str::to_string).unwrap_or_else(|| self.daily_index());
        let mut indexed = 0usize;
        let mut failed = 0usize;

        for chunk in events.chunks(BULK_CHUNK_SIZE) {
            let mut body = String::new();
            for event in chunk {
                let envelope = SiemEnvelope::from_event(event, &self.source);
                body.push_str(&serde_json::to_string(&json!({
                    "index": {"_index": target_index}
                }))?);
                body.push('\n');
                body.push_str(&serde_json::to_string(envelope.as_value())?);
                body.push('\n');
            }

            let url = self.endpoint("_bulk")?;
            let response = self
                .request(reqwest::Method::POST, url)
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(body)
                .send()
                .await?;

            if !response.status().is_success() {
                warn!(
                    connector = %self.name,
                    status = %response.status(),
                    "Bulk request rejected"
                );
                failed += chunk.len();
                continue;
            }

            let bulk: Value = response.json().await?;
            let items = bulk.get("items").and_then(Value::as_array);
            match items {
                Some(items) => {
                    for item in items {
                        let status = item
                            .pointer("/index/status")
                            .and_then(Value::as_u64)
                            .unwrap_or(500);
                        if status < 300 {
                            indexed += 1;
                        } else {
                            failed += 1;
                        }
                    }
                }
                None => indexed += chunk.len(),
            }
        }

        info!(
            connector = %self.name,
            total = events.len(),
            indexed,
            failed,
            index = %target_index,
            "Batch sent to Elasticsearch"
        );

        Ok(BatchResult {
            success: failed == 0,
            total: events.len(),
            indexed,
            failed,
            index: Some(target_index),
            error: None,
        })
    }

    async fn query_events(
        &self,
        query: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        limit: usize,
    ) -> SiemResult<Vec<Value>> {
        let search_body = json!({
            "query": {
                "bool": {
                    "must": [
                        {"query_string": {"query": query}},
                        {"range": {"timestamp": {
                            "gte": start_time.to_rfc3339(),
                            "lte": end_time.to_rfc3339()
                        }}}
                    ]
                }
            },
            "size": limit,
            "sort": [{"timestamp": "desc"}]
        });

        let url = self.endpoint(&format!("{}-*/_search", self.index_prefix))?;
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&search_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SiemError::query_error(format!(
                "search returned status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let events = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| hit.get("_source").cloned())
                    .collect()
            })
            .unwrap_or_default();

        Ok(events)
    }

    async fn create_alert(&self, request: &AlertRequest) -> SiemResult<AlertCreation> {
        let watcher_id = request.name.to_lowercase().replace(' ', "_");

        let mut actions = json!({
            "log_alert": {
                "logging": {
                    "text": format!(
                        "{} - {{{{ctx.payload.hits.total}}}} events matched",
                        request.description
                    )
                }
            }
        });
        if let Some(email_to) = &request.email_to {
            actions["email_alert"] = json!({
                "email": {
                    "to": email_to,
                    "subject": format!("DLP Alert: {}", request.name),
                    "body": {"text": request.description}
                }
            });
        }

        let watcher_body = json!({
            "trigger": {
                "schedule": {"interval": request.interval.clone().unwrap_or_else(|| "5m".to_string())}
            },
            "input": {
                "search": {
                    "request": {
                        "indices": [format!("{}-*", self.index_prefix)],
                        "body": {"query": {"query_string": {"query": request.query}}}
                    }
                }
            },
            "condition": {
                "compare": {
                    "ctx.payload.hits.total": {"gt": request.threshold.unwrap_or(0)}
                }
            },
            "actions": actions
        });

        let url = self.endpoint(&format!("_watcher/watch/{}", watcher_id))?;
        let response = self
            .request(reqwest::Method::PUT, url)
            .json(&watcher_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SiemError::alert_error(format!(
                "watcher creation returned status {}",
                response.status()
            )));
        }

        info!(connector = %self.name, alert = %request.name, watcher_id = %watcher_id, "ELK alert created");
        Ok(AlertCreation {
            success: true,
            alert_id: watcher_id,
            message: "Alert created successfully".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SiemConnectorConfig {
        SiemConnectorConfig {
            name: "ELK Stack".to_string(),
            siem_type: "elk".to_string(),
            host: "localhost".to_string(),
            port: 9200,
            use_ssl: false,
            verify_certs: false,
            index_prefix: Some("dlp-events".to_string()),
            ..SiemConnectorConfig::default()
        }
    }

    #[test]
    fn test_daily_index_shape() {
        let connector = ElkConnector::from_config(&config()).unwrap();
        let index = connector.daily_index();
        assert!(index.starts_with("dlp-events-"));
        // dlp-events-YYYY.MM.DD
        assert_eq!(index.len(), "dlp-events-".len() + 10);
    }

    #[test]
    fn test_basic_auth_header_built_from_credentials() {
        let mut cfg = config();
        cfg.username = Some("elastic".to_string());
        cfg.password = Some("changeme".to_string());
        let connector = ElkConnector::from_config(&cfg).unwrap();
        let header = connector.authorization.as_ref().unwrap();
        assert!(header.to_str().unwrap().starts_with("Basic "));
    }

    #[test]
    fn test_api_key_takes_precedence() {
        let mut cfg = config();
        cfg.api_key = Some("encoded-key".to_string());
        cfg.username = Some("elastic".to_string());
        cfg.password = Some("changeme".to_string());
        let connector = ElkConnector::from_config(&cfg).unwrap();
        let header = connector.authorization.as_ref().unwrap();
        assert_eq!(header.to_str().unwrap(), "ApiKey encoded-key");
    }

    #[test]
    fn test_starts_disconnected() {
        let connector = ElkConnector::from_config(&config()).unwrap();
        assert!(!connector.connected());
        assert_eq!(connector.siem_type(), SiemType::Elk);
    }
}
