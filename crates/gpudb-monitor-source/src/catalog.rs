//! GPUdb catalog and table monitor endpoints.
//!
//! [`MonitorCatalog`] is the slice of the GPUdb API the monitor source needs.
//! [`GpudbClient`] implements it over the JSON REST interface; tests use the
//! in-memory implementation in [`crate::testing`].

use crate::config::MonitorSourceConfig;
use crate::error::{Error, Result};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Table description flag marking a collection (a container of tables).
pub const COLLECTION_DESCRIPTION: &str = "COLLECTION";

/// Metadata returned by `/show/table`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableInfo {
    pub table_name: String,
    /// One description list per returned table
    pub descriptions: Vec<Vec<String>>,
}

impl TableInfo {
    /// Whether the requested table is a collection rather than a table.
    pub fn is_collection(&self) -> bool {
        self.descriptions
            .first()
            .is_some_and(|d| d.iter().any(|flag| flag == COLLECTION_DESCRIPTION))
    }
}

/// A table monitor created by `/create/tablemonitor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMonitor {
    /// Opaque subscription identifier, also the pub/sub topic prefix
    pub topic_id: String,
    pub table_name: String,
    /// Avro record schema (JSON text) of the streamed rows
    pub type_schema: String,
}

/// Remote catalog operations used by the monitor source.
#[async_trait::async_trait]
pub trait MonitorCatalog: Send + Sync {
    /// Fetch table metadata. Fails if the table does not exist.
    async fn show_table(&self, table_name: &str) -> Result<TableInfo>;

    /// Look up a single system property; `None` when the server does not
    /// report it.
    async fn show_system_property(&self, key: &str) -> Result<Option<String>>;

    /// Create a table monitor streaming inserts into `table_name`.
    async fn create_table_monitor(&self, table_name: &str) -> Result<TableMonitor>;

    /// Release a table monitor.
    async fn clear_table_monitor(&self, topic_id: &str) -> Result<()>;
}

#[derive(Serialize)]
struct ShowTableRequest<'a> {
    table_name: &'a str,
    options: HashMap<&'static str, &'static str>,
}

#[derive(Deserialize)]
struct ShowTableResponse {
    table_name: String,
    #[serde(default)]
    table_descriptions: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct ShowSystemPropertiesRequest<'a> {
    options: HashMap<&'static str, &'a str>,
}

#[derive(Deserialize)]
struct ShowSystemPropertiesResponse {
    #[serde(default)]
    property_map: HashMap<String, String>,
}

#[derive(Serialize)]
struct CreateTableMonitorRequest<'a> {
    table_name: &'a str,
    options: HashMap<&'static str, &'static str>,
}

#[derive(Deserialize)]
struct CreateTableMonitorResponse {
    topic_id: String,
    table_name: String,
    type_schema: String,
}

#[derive(Serialize)]
struct ClearTableMonitorRequest<'a> {
    topic_id: &'a str,
    options: HashMap<&'static str, &'static str>,
}

/// Every GPUdb response is wrapped in this envelope; the endpoint-specific
/// payload is JSON text in `data_str`.
#[derive(Deserialize)]
struct ResponseEnvelope {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data_str: String,
}

/// GPUdb JSON REST client.
pub struct GpudbClient {
    url: Url,
    http: reqwest::Client,
    username: String,
    password: String,
}

impl GpudbClient {
    pub fn new(config: &MonitorSourceConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            url: config.url()?,
            http: builder.build()?,
            username: config.gpudb_username.clone(),
            password: config.gpudb_password.clone(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn submit<Req, Resp>(&self, endpoint: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let request_url = format!("{}{endpoint}", self.url.as_str().trim_end_matches('/'));
        debug!("Submitting GPUdb request to {request_url}");

        let mut http_request = self.http.post(&request_url).json(request);
        if !self.username.is_empty() {
            http_request = http_request.basic_auth(&self.username, Some(&self.password));
        }

        let response = http_request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope: ResponseEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(Error::Gpudb {
                    endpoint: endpoint.to_string(),
                    message: format!("HTTP {status}"),
                })
            }
            Err(e) => return Err(e.into()),
        };

        if envelope.status != "OK" {
            return Err(Error::Gpudb {
                endpoint: endpoint.to_string(),
                message: envelope.message,
            });
        }

        Ok(serde_json::from_str(&envelope.data_str)?)
    }
}

#[async_trait::async_trait]
impl MonitorCatalog for GpudbClient {
    async fn show_table(&self, table_name: &str) -> Result<TableInfo> {
        let request = ShowTableRequest {
            table_name,
            options: HashMap::from([("show_children", "false")]),
        };
        let response: ShowTableResponse = self.submit("/show/table", &request).await?;
        Ok(TableInfo {
            table_name: response.table_name,
            descriptions: response.table_descriptions,
        })
    }

    async fn show_system_property(&self, key: &str) -> Result<Option<String>> {
        let request = ShowSystemPropertiesRequest {
            options: HashMap::from([("properties", key)]),
        };
        let mut response: ShowSystemPropertiesResponse =
            self.submit("/show/system/properties", &request).await?;
        Ok(response.property_map.remove(key))
    }

    async fn create_table_monitor(&self, table_name: &str) -> Result<TableMonitor> {
        let request = CreateTableMonitorRequest {
            table_name,
            options: HashMap::new(),
        };
        let response: CreateTableMonitorResponse =
            self.submit("/create/tablemonitor", &request).await?;
        Ok(TableMonitor {
            topic_id: response.topic_id,
            table_name: response.table_name,
            type_schema: response.type_schema,
        })
    }

    async fn clear_table_monitor(&self, topic_id: &str) -> Result<()> {
        let request = ClearTableMonitorRequest {
            topic_id,
            options: HashMap::new(),
        };
        let _: serde_json::Value = self.submit("/clear/tablemonitor", &request).await?;
        Ok(())
    }
}
