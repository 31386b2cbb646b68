//! Output pipelines fed with crawled articles.
//!
//! `RssPipeline` writes one feed document per run and only publishes it once
//! it is complete. `CouchDbPipeline` stores every article as it arrives.
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::article::ArticleRecord;
use crate::config::CouchDbConfig;
use crate::feed::{ChannelMetadata, ExportError, RssExporter};
use crate::storage::{CouchDbSink, SinkError};

/// Writes articles into `<dir>/<name>.xml`.
///
/// The document is built in a temporary file beside the target and renamed
/// over it by [`RssPipeline::close`]. Dropping the pipeline without closing
/// it discards the temporary file.
pub struct RssPipeline {
    exporter: Option<RssExporter<BufWriter<File>>>,
    temp_path: PathBuf,
    path: PathBuf,
}

impl RssPipeline {
    pub fn open(dir: &Path, name: &str, channel: ChannelMetadata, indent: usize) -> Result<Self> {
        let path = dir.join(format!("{name}.xml"));

        // Randomized temp filename to prevent TOCTOU race conditions
        let random_suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = path.with_extension(format!("xml.tmp.{:016x}", random_suffix));

        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .with_context(|| {
                format!(
                    "Failed to create temporary file '{}': check directory permissions",
                    temp_path.display()
                )
            })?;

        // From here on, Drop owns the cleanup of temp_path
        let mut pipeline = Self {
            exporter: None,
            temp_path,
            path,
        };

        let mut exporter = RssExporter::with_indent(BufWriter::new(file), channel, indent);
        exporter
            .start_exporting()
            .context("Failed to write feed header")?;
        pipeline.exporter = Some(exporter);

        tracing::debug!(path = %pipeline.path.display(), "Opened RSS pipeline");
        Ok(pipeline)
    }

    /// Final location of the feed once closed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maps the article onto RSS fields and buffers it for the feed.
    pub fn process_item(&mut self, article: &ArticleRecord) -> Result<(), ExportError> {
        match self.exporter.as_mut() {
            Some(exporter) => exporter.export_item(article.to_rss_record()),
            None => Err(ExportError::InvalidState {
                operation: "export_item",
                state: "closed",
            }),
        }
    }

    /// Writes the sorted feed and atomically moves it into place.
    ///
    /// Returns the number of items written.
    pub fn close(mut self) -> Result<usize> {
        let exporter = self
            .exporter
            .take()
            .context("RSS pipeline was never started")?;
        let count = exporter.buffered();

        let writer = exporter
            .finish_exporting()
            .with_context(|| format!("Failed to write feed to '{}'", self.temp_path.display()))?;
        let file = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("Failed to flush '{}'", self.temp_path.display()))?;
        file.sync_all().with_context(|| {
            format!(
                "Failed to sync temporary file '{}' to disk",
                self.temp_path.display()
            )
        })?;
        drop(file);

        std::fs::rename(&self.temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename '{}' to '{}'",
                self.temp_path.display(),
                self.path.display()
            )
        })?;

        tracing::info!(path = %self.path.display(), items = count, "Wrote RSS feed");
        Ok(count)
    }
}

impl Drop for RssPipeline {
    fn drop(&mut self) {
        // Missing after a successful rename
        if self.temp_path.exists() {
            tracing::debug!(path = %self.temp_path.display(), "Discarding unpublished feed");
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

/// Stores every article in CouchDB as soon as it is processed.
pub struct CouchDbPipeline {
    sink: CouchDbSink,
}

impl CouchDbPipeline {
    pub fn new(sink: CouchDbSink) -> Self {
        Self { sink }
    }

    pub fn from_config(client: reqwest::Client, config: &CouchDbConfig) -> Self {
        let mut sink = CouchDbSink::new(client, config.host.clone(), config.database.clone());
        if let Some(user) = &config.user {
            let password = config
                .password
                .as_ref()
                .map(|p| SecretString::from(p.expose_secret().to_string()));
            sink = sink.with_credentials(user.clone(), password);
        }
        Self::new(sink)
    }

    /// Stores the article with its RSS field aliases and returns the document id.
    pub async fn process_item(&self, article: &ArticleRecord) -> Result<Uuid, SinkError> {
        self.sink.export_item(&article.to_rss_record()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("newsfeed_pipeline_test_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn article(title: &str, timestamp: &str) -> ArticleRecord {
        ArticleRecord {
            url: Some(format!("https://news.example.com/{title}")),
            title: Some(title.to_string()),
            timestamp: Some(DateTime::parse_from_rfc3339(timestamp).unwrap()),
            ..Default::default()
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_close_publishes_sorted_feed() {
        let dir = test_dir("close");
        let channel = ChannelMetadata::new().with("title", "News");

        let mut pipeline = RssPipeline::open(&dir, "news", channel, 2).unwrap();
        assert_eq!(pipeline.path(), dir.join("news.xml"));
        pipeline.process_item(&article("older", "2020-12-02T08:00:00+00:00")).unwrap();
        pipeline.process_item(&article("newer", "2020-12-03T08:00:00+00:00")).unwrap();
        assert_eq!(pipeline.close().unwrap(), 2);

        assert_eq!(entries(&dir), vec!["news.xml"]);
        let xml = std::fs::read_to_string(dir.join("news.xml")).unwrap();
        let newer = xml.find("newer]]>").unwrap();
        let older = xml.find("older]]>").unwrap();
        assert!(newer < older);
        assert!(xml.contains("<link>https://news.example.com/newer</link>"));
        assert!(xml.ends_with("</rss>\n"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_drop_without_close_leaves_nothing() {
        let dir = test_dir("drop");

        let mut pipeline = RssPipeline::open(&dir, "news", ChannelMetadata::new(), 2).unwrap();
        pipeline.process_item(&article("a", "2020-12-02T08:00:00+00:00")).unwrap();
        assert_eq!(entries(&dir).len(), 1);
        drop(pipeline);

        assert!(entries(&dir).is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_failed_close_keeps_previous_feed() {
        let dir = test_dir("failed_close");
        std::fs::write(dir.join("news.xml"), "previous").unwrap();

        let mut pipeline = RssPipeline::open(&dir, "news", ChannelMetadata::new(), 2).unwrap();
        pipeline.process_item(&ArticleRecord::default()).unwrap();
        let err = pipeline.close().unwrap_err();
        assert!(format!("{err:#}").contains("pubDate"));

        assert_eq!(entries(&dir), vec!["news.xml"]);
        assert_eq!(std::fs::read_to_string(dir.join("news.xml")).unwrap(), "previous");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_open_fails_for_missing_directory() {
        let dir = std::env::temp_dir().join("newsfeed_pipeline_test_does_not_exist");
        std::fs::remove_dir_all(&dir).ok();
        assert!(RssPipeline::open(&dir, "news", ChannelMetadata::new(), 2).is_err());
    }

    #[tokio::test]
    async fn test_couchdb_pipeline_stores_mapped_record() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = CouchDbConfig {
            host: mock_server.uri(),
            ..Default::default()
        };
        let pipeline = CouchDbPipeline::from_config(reqwest::Client::new(), &config);
        pipeline
            .process_item(&article("a", "2020-12-02T08:00:00+00:00"))
            .await
            .unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        assert!(requests[0].url.path().starts_with("/articles/"));
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["link"], "https://news.example.com/a");
        assert_eq!(body["pubDate"], "Wed, 02 Dec 2020 08:00:00 +0000");
    }
}
