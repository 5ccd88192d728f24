//! Loads the topic document from a file path or an `http(s)` URL.
//!
//! A load is a single attempt with no retry. Failures surface as
//! [`DataUnavailable`]; [`load_with_recovery`] turns them into a
//! [`LoadOutcome`] according to the configured [`RecoveryPolicy`].

use crate::{CollectionError, TopicCollection, fallback_collection};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_DATA_PATH: &str = "data/topics.json";
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Url(String),
    Path(PathBuf),
}

impl DataSource {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            DataSource::Url(trimmed.to_string())
        } else {
            DataSource::Path(PathBuf::from(trimmed))
        }
    }
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::Path(PathBuf::from(DEFAULT_DATA_PATH))
    }
}

impl FromStr for DataSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DataSource::parse(s))
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Url(url) => write!(f, "{url}"),
            DataSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// What the caller shows when the document cannot be loaded.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum RecoveryPolicy {
    /// Substitute the built-in fallback collection.
    #[default]
    Fallback,
    /// Show a "could not load" notice instead of the topic list.
    Message,
}

impl fmt::Display for RecoveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryPolicy::Fallback => write!(f, "fallback"),
            RecoveryPolicy::Message => write!(f, "message"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub source: DataSource,
    pub recovery: RecoveryPolicy,
    /// Upper bound for the whole load. `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            source: DataSource::default(),
            recovery: RecoveryPolicy::default(),
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
        }
    }
}

#[derive(Debug)]
pub enum DataUnavailable {
    Network(reqwest::Error),
    Status(u16),
    Io(std::io::Error),
    Malformed(CollectionError),
    TimedOut(Duration),
}

impl fmt::Display for DataUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataUnavailable::Network(err) => write!(f, "network error: {err}"),
            DataUnavailable::Status(status) => write!(f, "unexpected HTTP status {status}"),
            DataUnavailable::Io(err) => write!(f, "io error: {err}"),
            DataUnavailable::Malformed(err) => write!(f, "{err}"),
            DataUnavailable::TimedOut(limit) => {
                write!(f, "timed out after {}ms", limit.as_millis())
            }
        }
    }
}

impl std::error::Error for DataUnavailable {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataUnavailable::Network(err) => Some(err),
            DataUnavailable::Io(err) => Some(err),
            DataUnavailable::Malformed(err) => Some(err),
            DataUnavailable::Status(_) | DataUnavailable::TimedOut(_) => None,
        }
    }
}

impl From<reqwest::Error> for DataUnavailable {
    fn from(value: reqwest::Error) -> Self {
        DataUnavailable::Network(value)
    }
}

impl From<std::io::Error> for DataUnavailable {
    fn from(value: std::io::Error) -> Self {
        DataUnavailable::Io(value)
    }
}

impl From<CollectionError> for DataUnavailable {
    fn from(value: CollectionError) -> Self {
        DataUnavailable::Malformed(value)
    }
}

/// Result of a load after the recovery policy has been applied.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(TopicCollection),
    Fallback {
        collection: TopicCollection,
        cause: DataUnavailable,
    },
    Unavailable(DataUnavailable),
}

impl LoadOutcome {
    pub fn collection(&self) -> Option<&TopicCollection> {
        match self {
            LoadOutcome::Loaded(collection) | LoadOutcome::Fallback { collection, .. } => {
                Some(collection)
            }
            LoadOutcome::Unavailable(_) => None,
        }
    }

    pub fn cause(&self) -> Option<&DataUnavailable> {
        match self {
            LoadOutcome::Loaded(_) => None,
            LoadOutcome::Fallback { cause, .. } | LoadOutcome::Unavailable(cause) => Some(cause),
        }
    }
}

/// Fetches and parses the topic document once.
pub async fn load(
    source: &DataSource,
    timeout: Option<Duration>,
) -> Result<TopicCollection, DataUnavailable> {
    let bytes = match timeout {
        Some(limit) => tokio::time::timeout(limit, read_source(source))
            .await
            .map_err(|_| DataUnavailable::TimedOut(limit))??,
        None => read_source(source).await?,
    };
    Ok(TopicCollection::from_json(&bytes)?)
}

async fn read_source(source: &DataSource) -> Result<Vec<u8>, DataUnavailable> {
    match source {
        DataSource::Url(url) => {
            let response = reqwest::get(url.as_str()).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(DataUnavailable::Status(status.as_u16()));
            }
            Ok(response.bytes().await?.to_vec())
        }
        DataSource::Path(path) => Ok(tokio::fs::read(path).await?),
    }
}

/// Loads the configured source and applies the recovery policy on failure.
pub async fn load_with_recovery(config: &LoaderConfig) -> LoadOutcome {
    match load(&config.source, config.fetch_timeout).await {
        Ok(collection) => {
            info!(source = %config.source, topics = collection.len(), "Loaded topic document");
            LoadOutcome::Loaded(collection)
        }
        Err(cause) => match config.recovery {
            RecoveryPolicy::Fallback => {
                warn!(
                    source = %config.source,
                    error = %cause,
                    "Failed to load topics; using fallback collection"
                );
                LoadOutcome::Fallback {
                    collection: fallback_collection(),
                    cause,
                }
            }
            RecoveryPolicy::Message => {
                warn!(source = %config.source, error = %cause, "Failed to load topics");
                LoadOutcome::Unavailable(cause)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{PageOptions, render_document};
    use crate::{Catalog, Provenance};
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::{NamedTempFile, TempDir};
    use tracing_subscriber::fmt::MakeWriter;

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn missing_source(dir: &TempDir) -> DataSource {
        DataSource::Path(dir.path().join("topics.json"))
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn parses_sources() {
        assert_eq!(
            DataSource::parse("https://example.com/topics.json"),
            DataSource::Url("https://example.com/topics.json".to_string())
        );
        assert_eq!(
            DataSource::parse(" data/topics.json "),
            DataSource::Path(PathBuf::from("data/topics.json"))
        );
        assert_eq!(DataSource::default().to_string(), DEFAULT_DATA_PATH);
    }

    #[tokio::test]
    async fn loads_collection_from_file() {
        let file = temp_file(
            r#"[{"id":"basics","name":"Electronics Fundamentals","description":"Ohm law, transistors",
                 "links":[{"title":"Basics course","url":"https://example.com"}]}]"#,
        );
        let source = DataSource::Path(file.path().to_path_buf());
        let collection = load(&source, None).await.unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.topics()[0].name, "Electronics Fundamentals");
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = missing_source(&dir);
        let err = load(&source, Some(Duration::from_secs(5))).await.unwrap_err();
        assert!(matches!(err, DataUnavailable::Io(_)));
    }

    #[tokio::test]
    async fn malformed_document_is_unavailable() {
        let file = temp_file("[{\"id\": 1}");
        let source = DataSource::Path(file.path().to_path_buf());
        let err = load(&source, None).await.unwrap_err();
        assert!(matches!(err, DataUnavailable::Malformed(_)));
    }

    #[tokio::test]
    async fn fallback_policy_substitutes_builtin_topics() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = LoaderConfig {
            source: missing_source(&dir),
            ..LoaderConfig::default()
        };
        let outcome = load_with_recovery(&config).await;
        let ids: Vec<_> = outcome
            .collection()
            .unwrap()
            .topics()
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, ["analog", "microcontrollers", "basics"]);
        assert!(matches!(outcome, LoadOutcome::Fallback { .. }));
        assert!(outcome.cause().is_some());
    }

    #[tokio::test]
    async fn message_policy_reports_unavailable() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = LoaderConfig {
            source: missing_source(&dir),
            recovery: RecoveryPolicy::Message,
            fetch_timeout: None,
        };
        let outcome = load_with_recovery(&config).await;
        assert!(outcome.collection().is_none());
        assert!(matches!(
            outcome,
            LoadOutcome::Unavailable(DataUnavailable::Io(_))
        ));
    }

    #[tokio::test]
    async fn failed_load_renders_fallback_and_logs_warning() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = LoaderConfig {
            source: missing_source(&dir),
            ..LoaderConfig::default()
        };
        let catalog = Catalog::from_outcome(load_with_recovery(&config).await);
        assert_eq!(catalog.provenance(), &Provenance::Fallback);

        let html = render_document(&catalog, &PageOptions::default()).unwrap();
        assert_eq!(html.matches("class=\"topic-btn\"").count(), 3);
        assert!(html.contains("<span>Electronics Fundamentals</span>"));
        assert!(!html.contains("class=\"muted\">Could not load"));

        let output = logs.contents();
        assert!(output.contains("WARN"));
        assert!(output.contains("Failed to load topics; using fallback collection"));
    }
}
