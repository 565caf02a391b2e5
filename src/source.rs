use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

use crate::record::{RawUserRecord, UserRecord, ValidationError, normalize_batch};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Transport(String),
    #[error("HTTP error! status: {status}{}", .message.as_deref().map(|m| format!(" ({m})")).unwrap_or_default())]
    Status { status: u16, message: Option<String> },
    #[error("Response parse error: {0}")]
    Decode(String),
}

/// Anything that can go wrong while loading the record set. The viewer shows all of
/// them the same way.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to fetch data: {0}")]
    Fetch(#[from] FetchError),
    #[error("Failed to fetch data: {0}")]
    Validation(#[from] ValidationError),
}

pub type LoadResult = Result<Vec<UserRecord>, LoadError>;

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetches the raw payload. Shape checks happen in [`load_records`].
    async fn fetch(&self) -> Result<Value, FetchError>;
}

pub struct HttpSource {
    url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    async fn fetch(&self) -> Result<Value, FetchError> {
        debug!("GET {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // The server reports validation failures as {error, message}
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Fetches and normalizes the full record set. The first invalid record fails the batch.
pub async fn load_records(source: &dyn RecordSource) -> LoadResult {
    let payload = source.fetch().await?;
    let Value::Array(items) = payload else {
        return Err(ValidationError::NotAnArray.into());
    };
    let raw = items
        .into_iter()
        .map(serde_json::from_value::<RawUserRecord>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;
    let records = normalize_batch(raw)?;
    info!("Loaded {} user records", records.len());
    Ok(records)
}

type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

/// Runs at most one load at a time. Callers arriving while a load is in flight
/// await that load and receive its outcome.
pub struct SingleFlight {
    source: Arc<dyn RecordSource>,
    in_flight: Arc<Mutex<Option<SharedLoad>>>,
}

impl SingleFlight {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Returns the in-flight load, or a new one. The flag is true if a new load was created.
    pub fn begin(&self) -> (SharedLoad, bool) {
        let mut slot = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(load) = slot.as_ref() {
            debug!("Joining in-flight load");
            return (load.clone(), false);
        }

        let source = Arc::clone(&self.source);
        let in_flight = Arc::clone(&self.in_flight);
        let load = async move {
            let result = load_records(source.as_ref()).await;
            *in_flight.lock().unwrap_or_else(|e| e.into_inner()) = None;
            result
        }
        .boxed()
        .shared();
        *slot = Some(load.clone());
        (load, true)
    }

    pub async fn load(&self) -> LoadResult {
        let (load, _) = self.begin();
        load.await
    }
}

/// Drives loads for the synchronous terminal loop. Outcomes arrive through
/// [`Loader::try_recv`].
pub struct Loader {
    flight: Arc<SingleFlight>,
    handle: Handle,
    pending: Arc<AtomicBool>,
    tx: UnboundedSender<LoadResult>,
    rx: UnboundedReceiver<LoadResult>,
}

impl Loader {
    pub fn new(source: Arc<dyn RecordSource>, handle: Handle) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            flight: Arc::new(SingleFlight::new(source)),
            handle,
            pending: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    /// Starts a load unless one is already running. Returns false when coalesced.
    pub fn trigger(&self) -> bool {
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Load already in flight, coalescing");
            return false;
        }

        let (load, _) = self.flight.begin();
        let pending = Arc::clone(&self.pending);
        let tx = self.tx.clone();
        self.handle.spawn(async move {
            let result = load.await;
            pending.store(false, Ordering::Release);
            if tx.send(result).is_err() {
                warn!("Load finished after the viewer closed");
            }
        });
        true
    }

    pub fn is_loading(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub fn try_recv(&mut self) -> Option<LoadResult> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct StubSource {
        payload: Value,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(payload: Value) -> Arc<Self> {
            Arc::new(Self {
                payload,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecordSource for StubSource {
        async fn fetch(&self) -> Result<Value, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(self.payload.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl RecordSource for FailingSource {
        async fn fetch(&self) -> Result<Value, FetchError> {
            Err(FetchError::Transport("connection refused".into()))
        }
    }

    fn users() -> Value {
        json!([
            {"id": 1, "name": "Anna", "email": "anna@example.com", "mobile": "111", "status": "Active"},
            {"id": "2", "name": "Bob", "email": "bob@example.com", "mobile": "222", "status": "INACTIVE", "avatar": "https://example.com/bob.png"}
        ])
    }

    #[tokio::test]
    async fn load_normalizes_payload() {
        let source = StubSource::new(users());
        let records = load_records(source.as_ref()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, 2);
        assert_eq!(records[1].status, crate::record::Status::Inactive);
        assert_eq!(records[0].avatar, "https://i.pravatar.cc/150?img=1");
        assert_eq!(records[1].avatar, "https://example.com/bob.png");
    }

    #[tokio::test]
    async fn non_array_payload_is_a_validation_error() {
        let source = StubSource::new(json!({"users": []}));
        let err = load_records(source.as_ref()).await.unwrap_err();
        assert_eq!(err, LoadError::Validation(ValidationError::NotAnArray));
    }

    #[tokio::test]
    async fn malformed_element_fails_the_batch() {
        let source = StubSource::new(json!([{"id": 1, "name": 42}]));
        let err = load_records(source.as_ref()).await.unwrap_err();
        assert!(matches!(err, LoadError::Validation(ValidationError::Malformed(_))));
    }

    #[tokio::test]
    async fn transport_failure_is_a_fetch_error() {
        let err = load_records(&FailingSource).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch data: Network error: connection refused");
    }

    #[test]
    fn status_error_includes_server_message() {
        let err = FetchError::Status {
            status: 500,
            message: Some("Data is not an array".into()),
        };
        assert_eq!(err.to_string(), "HTTP error! status: 500 (Data is not an array)");
        let err = FetchError::Status {
            status: 404,
            message: None,
        };
        assert_eq!(err.to_string(), "HTTP error! status: 404");
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let source = StubSource::new(users());
        let flight = SingleFlight::new(source.clone());

        let (a, b) = tokio::join!(flight.load(), flight.load());
        assert_eq!(source.calls(), 1);
        assert_eq!(a, b);
        assert!(!flight.is_in_flight());

        flight.load().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn loader_coalesces_triggers_and_delivers_once() {
        let source = StubSource::new(users());
        let mut loader = Loader::new(source.clone(), Handle::current());

        assert!(loader.trigger());
        assert!(!loader.trigger());
        assert!(loader.is_loading());

        let result = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(result) = loader.try_recv() {
                    return result;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(result.unwrap().len(), 2);
        assert_eq!(source.calls(), 1);
        assert!(loader.try_recv().is_none());
        assert!(!loader.is_loading());
        assert!(loader.trigger());
    }
}
