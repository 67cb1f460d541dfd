//! `ExposeTunnel` backed by the Cloudflare API.
//!
//! Exposure is two idempotent writes: a proxied CNAME pointing the
//! repository's hostname at the tunnel, and an ingress rule routing that
//! hostname to the published host port.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::{ExecutorError, ExecutorErrorKind, StepContext, StepExecutor, StepOutcome};
use crate::cancellation::CancellationToken;
use crate::core::Stage;
use crate::credentials::{ResolveError, Secret, ZoneResolver};
use crate::repository::{RepositoryKey, StateDelta};

const CATCH_ALL_SERVICE: &str = "http_status:404";

fn default_api_base() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_service_host() -> String {
    "localhost".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Settings of the tunnel executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudflareConfig {
    /// API root.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Account owning the tunnel.
    pub account_id: String,
    /// Tunnel receiving the ingress rules.
    pub tunnel_id: String,
    /// Zone to publish under. `None` picks the token's first zone.
    #[serde(default)]
    pub zone: Option<String>,
    /// Host the tunnel connector reaches published ports on.
    #[serde(default = "default_service_host")]
    pub service_host: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl CloudflareConfig {
    /// Creates a config for a tunnel.
    #[must_use]
    pub fn new(account_id: impl Into<String>, tunnel_id: impl Into<String>) -> Self {
        Self {
            api_base: default_api_base(),
            account_id: account_id.into(),
            tunnel_id: tunnel_id.into(),
            zone: None,
            service_host: default_service_host(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Pins the zone instead of resolving it from the token.
    #[must_use]
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Overrides the API root.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }
}

fn build_client(timeout_secs: u64) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

/// Publishes a running container through a Cloudflare tunnel.
pub struct CloudflareTunnel {
    client: Client,
    config: CloudflareConfig,
    token: Secret,
    zones: Arc<dyn ZoneResolver>,
}

impl CloudflareTunnel {
    /// Creates the executor.
    pub fn new(config: CloudflareConfig, token: Secret, zones: Arc<dyn ZoneResolver>) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
            token,
            zones,
        })
    }

    async fn send(&self, request: RequestBuilder, cancel: &CancellationToken) -> Result<Value, StepOutcome> {
        let request = request.bearer_auth(self.token.expose());
        let response = cancel
            .run_until_cancelled(request.send())
            .await
            .ok_or_else(|| StepOutcome::Fatal(ExecutorError::cancelled()))?
            .map_err(transport_error)?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            Ok(body)
        } else {
            Err(classify_status(status, &api_errors(&body)))
        }
    }

    async fn pick_zone(&self) -> Result<String, StepOutcome> {
        if let Some(zone) = &self.config.zone {
            return Ok(zone.clone());
        }
        match self.zones.resolve_zones(&self.token).await {
            Ok(zones) => zones.into_iter().next().ok_or_else(|| {
                StepOutcome::Fatal(ExecutorError::internal("token has no zones to publish under"))
            }),
            Err(ResolveError::Unauthorized(msg)) => Err(StepOutcome::Fatal(ExecutorError::auth(msg))),
            Err(ResolveError::NotFound(what)) => Err(StepOutcome::Fatal(ExecutorError::internal(format!(
                "{what} not found"
            )))),
            Err(ResolveError::Upstream(msg)) => Err(StepOutcome::Retryable(ExecutorError::network(msg))),
        }
    }

    async fn zone_id(&self, zone: &str, cancel: &CancellationToken) -> Result<String, StepOutcome> {
        let url = format!("{}/zones", self.config.api_base);
        let body = self.send(self.client.get(&url).query(&[("name", zone)]), cancel).await?;
        body["result"][0]["id"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| StepOutcome::Fatal(ExecutorError::internal(format!("zone {zone} not found"))))
    }

    async fn ensure_dns_record(&self, zone_id: &str, hostname: &str, cancel: &CancellationToken) -> Result<(), StepOutcome> {
        let url = format!("{}/zones/{zone_id}/dns_records", self.config.api_base);
        let target = format!("{}.cfargotunnel.com", self.config.tunnel_id);
        let record = json!({
            "type": "CNAME",
            "name": hostname,
            "content": target,
            "proxied": true,
        });

        let existing = self
            .send(self.client.get(&url).query(&[("type", "CNAME"), ("name", hostname)]), cancel)
            .await?;
        match existing["result"][0]["id"].as_str() {
            Some(_) if existing["result"][0]["content"].as_str() == Some(target.as_str()) => {
                debug!(hostname = %hostname, "DNS record already points at tunnel");
            }
            Some(record_id) => {
                let url = format!("{url}/{record_id}");
                self.send(self.client.put(&url).json(&record), cancel).await?;
            }
            None => {
                self.send(self.client.post(&url).json(&record), cancel).await?;
            }
        }
        Ok(())
    }

    async fn ensure_ingress(&self, hostname: &str, service: &str, cancel: &CancellationToken) -> Result<(), StepOutcome> {
        let url = format!(
            "{}/accounts/{}/cfd_tunnel/{}/configurations",
            self.config.api_base, self.config.account_id, self.config.tunnel_id
        );
        let current = self.send(self.client.get(&url), cancel).await?;
        let rules = current["result"]["config"]["ingress"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let merged = merge_ingress(rules, hostname, service);
        let mut config = current["result"]["config"].clone();
        if !config.is_object() {
            config = json!({});
        }
        config["ingress"] = Value::Array(merged);
        self.send(self.client.put(&url).json(&json!({ "config": config })), cancel)
            .await?;
        Ok(())
    }

    async fn expose(&self, ctx: &StepContext<'_>) -> Result<String, StepOutcome> {
        let zone = self.pick_zone().await?;
        let hostname = tunnel_hostname(ctx.key, &zone);
        ctx.info(format!("routing {hostname} through tunnel"));

        let zone_id = self.zone_id(&zone, ctx.cancel).await?;
        self.ensure_dns_record(&zone_id, &hostname, ctx.cancel).await?;

        let service = format!("http://{}:{}", self.config.service_host, ctx.config.ports.host);
        self.ensure_ingress(&hostname, &service, ctx.cancel).await?;
        Ok(format!("https://{hostname}"))
    }
}

impl std::fmt::Debug for CloudflareTunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareTunnel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StepExecutor for CloudflareTunnel {
    fn stage(&self) -> Stage {
        Stage::Expose
    }

    #[instrument(skip(self, ctx), fields(repository = %ctx.key, attempt = ctx.attempt))]
    async fn execute(&self, ctx: &StepContext<'_>) -> StepOutcome {
        match self.expose(ctx).await {
            Ok(url) => {
                info!(url = %url, "Tunnel route ready");
                StepOutcome::Success(StateDelta::exposed(url))
            }
            Err(outcome) => {
                warn!(outcome = ?outcome, "Expose failed");
                outcome
            }
        }
    }
}

/// Lists the zones a token can manage.
#[derive(Debug, Clone)]
pub struct CloudflareZones {
    client: Client,
    api_base: String,
}

impl CloudflareZones {
    /// Creates a resolver against `api_base`.
    pub fn new(api_base: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(default_timeout_secs())?,
            api_base: api_base.into().trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl ZoneResolver for CloudflareZones {
    async fn resolve_zones(&self, token: &Secret) -> Result<Vec<String>, ResolveError> {
        let url = format!("{}/zones", self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|err| ResolveError::Upstream(err.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let body: Value = response
                    .json()
                    .await
                    .map_err(|err| ResolveError::Upstream(err.to_string()))?;
                Ok(zone_names(&body))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ResolveError::Unauthorized("zone token rejected".to_string()))
            }
            status => Err(ResolveError::Upstream(format!("zone listing failed: {status}"))),
        }
    }
}

/// Public hostname of a repository under `zone`, one label deep.
fn tunnel_hostname(key: &RepositoryKey, zone: &str) -> String {
    format!("{}.{zone}", key.dns_label())
}

/// Inserts or replaces the rule for `hostname`, keeping a catch-all last.
fn merge_ingress(rules: Vec<Value>, hostname: &str, service: &str) -> Vec<Value> {
    let (catch_all, mut routed): (Vec<Value>, Vec<Value>) = rules
        .into_iter()
        .filter(|rule| rule["hostname"].as_str() != Some(hostname))
        .partition(|rule| rule.get("hostname").is_none());

    routed.push(json!({ "hostname": hostname, "service": service }));
    match catch_all.into_iter().last() {
        Some(rule) => routed.push(rule),
        None => routed.push(json!({ "service": CATCH_ALL_SERVICE })),
    }
    routed
}

fn zone_names(body: &Value) -> Vec<String> {
    body["result"]
        .as_array()
        .map(|zones| {
            zones
                .iter()
                .filter_map(|zone| zone["name"].as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn api_errors(body: &Value) -> String {
    let messages: Vec<String> = body["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["message"].as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default();
    messages.join("; ")
}

fn transport_error(err: reqwest::Error) -> StepOutcome {
    StepOutcome::Retryable(ExecutorError::network(format!("cloudflare request failed: {err}")))
}

/// Maps a non-success API status to an outcome.
fn classify_status(status: StatusCode, detail: &str) -> StepOutcome {
    let message = if detail.is_empty() {
        format!("cloudflare API returned {status}")
    } else {
        format!("cloudflare API returned {status}: {detail}")
    };
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            StepOutcome::Retryable(ExecutorError::new(ExecutorErrorKind::RateLimited, message))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StepOutcome::Fatal(ExecutorError::auth(message)),
        s if s.is_server_error() => StepOutcome::Retryable(ExecutorError::network(message)),
        _ => StepOutcome::Fatal(ExecutorError::command(message)),
    }
}
