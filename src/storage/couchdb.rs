use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use super::types::SinkError;
use crate::feed::normalize::normalize;
use crate::feed::{Record, Value};

/// Per-request timeout for document writes.
pub const SINK_TIMEOUT: Duration = Duration::from_secs(20);

/// Fields never stored in the document store.
const EXCLUDED_FIELDS: &[&str] = &["image", "enclosure"];

/// Writes article records into a CouchDB database, one document per record.
///
/// Each record is stored under a freshly generated UUID. There is no
/// ordering, whitelist, or retry: a write either succeeds or its error is
/// returned to the caller.
pub struct CouchDbSink {
    client: reqwest::Client,
    host: String,
    database: String,
    user: Option<String>,
    password: Option<SecretString>,
}

impl CouchDbSink {
    pub fn new(client: reqwest::Client, host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
            database: database.into(),
            user: None,
            password: None,
        }
    }

    /// Authenticates writes with HTTP basic auth.
    pub fn with_credentials(mut self, user: impl Into<String>, password: Option<SecretString>) -> Self {
        self.user = Some(user.into());
        self.password = password;
        self
    }

    fn document_url(&self, id: &Uuid) -> String {
        format!("{}/{}/{}", self.host.trim_end_matches('/'), self.database, id)
    }

    /// Stores `record` and returns the id it was stored under.
    pub async fn export_item(&self, record: &Record) -> Result<Uuid, SinkError> {
        let id = Uuid::new_v4();
        let body = serde_json::to_vec(&document(record))?;

        let mut request = self
            .client
            .put(self.document_url(&id))
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref().map(|p| p.expose_secret()));
        }

        let response = tokio::time::timeout(SINK_TIMEOUT, request.send())
            .await
            .map_err(|_| SinkError::Timeout)?
            .map_err(SinkError::Network)?;

        if !response.status().is_success() {
            return Err(SinkError::HttpStatus(response.status().as_u16()));
        }

        tracing::debug!(id = %id, database = %self.database, "Stored article document");
        Ok(id)
    }
}

/// Builds the JSON document stored for a record.
///
/// Every field except the image is kept and normalized like feed output:
/// timestamps become RFC 2822 strings and nulls become empty strings.
pub fn document(record: &Record) -> serde_json::Value {
    let fields = record
        .iter()
        .filter(|(name, _)| !EXCLUDED_FIELDS.contains(name))
        .map(|(name, value)| (name.to_string(), to_json(&normalize(value))))
        .collect();
    serde_json::Value::Object(fields)
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Scalar(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
    }
}
