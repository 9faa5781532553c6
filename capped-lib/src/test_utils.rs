use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use crate::gate::AdmissionGate;
use crate::transport::{Connection, Transport};
use crate::{ErrorKind, RequestOptions, Result};

/// Something a [`MockTransport`] observed, together with the number of
/// admission slots in use at that moment
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Connect { path: String, in_flight: usize },
    Close { path: String, in_flight: usize },
}

impl Event {
    pub(crate) fn connect(path: &str, in_flight: usize) -> Self {
        Self::Connect {
            path: path.to_string(),
            in_flight,
        }
    }

    pub(crate) fn close(path: &str, in_flight: usize) -> Self {
        Self::Close {
            path: path.to_string(),
            in_flight,
        }
    }
}

#[derive(Debug, Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
    gate: Mutex<Option<Arc<dyn AdmissionGate>>>,
    dropped: AtomicUsize,
}

impl Recorder {
    fn in_flight(&self) -> usize {
        self.gate
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, |gate| gate.in_flight())
    }

    fn record(&self, event: impl FnOnce(usize) -> Event) {
        let event = event(self.in_flight());
        self.events.lock().unwrap().push(event);
    }
}

/// A scripted [`Transport`]; the URL path selects the behavior:
///
/// - `/refuse`: connecting fails after the attempt was recorded
/// - `/broken`: one chunk, then a read error
/// - `/hang`: reading the body never finishes
/// - `/close-fails`: body `ok`, closing fails
/// - `/slow-close`: body `hello world`, closing takes a second
/// - `/sleep/<ms>`: body `done` after `<ms>` milliseconds
/// - `/status/<code>`: empty body with the given status
/// - anything else: body `hello world` in two chunks
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    recorder: Arc<Recorder>,
}

impl MockTransport {
    /// Record slot usage of `gate` along with every event
    pub(crate) fn observe(&self, gate: Arc<dyn AdmissionGate>) {
        *self.recorder.gate.lock().unwrap() = Some(gate);
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.recorder.events.lock().unwrap().clone()
    }

    pub(crate) fn connects(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Connect { .. }))
            .count()
    }

    /// Connections dropped without being closed
    pub(crate) fn dropped(&self) -> usize {
        self.recorder.dropped.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
enum Step {
    Data(&'static str),
    Sleep(Duration),
    Fail,
    Hang,
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &Url, _options: &RequestOptions) -> Result<Box<dyn Connection>> {
        let path = url.path().to_string();
        self.recorder.record(|in_flight| Event::connect(&path, in_flight));
        if path == "/refuse" {
            return Err(ErrorKind::Connect {
                url: url.clone(),
                source: "connection refused".into(),
            });
        }

        let mut status = StatusCode::OK;
        let steps = match path.as_str() {
            "/broken" => vec![Step::Data("partial"), Step::Fail],
            "/hang" => vec![Step::Hang],
            "/close-fails" => vec![Step::Data("ok")],
            p if p.starts_with("/sleep/") => {
                let ms = p.trim_start_matches("/sleep/").parse().unwrap();
                vec![Step::Sleep(Duration::from_millis(ms)), Step::Data("done")]
            }
            p if p.starts_with("/status/") => {
                status = p.trim_start_matches("/status/").parse().unwrap();
                vec![]
            }
            _ => vec![Step::Data("hello"), Step::Data(" world")],
        };

        Ok(Box::new(MockConnection {
            url: url.clone(),
            path,
            status,
            headers: HeaderMap::new(),
            steps: steps.into(),
            recorder: self.recorder.clone(),
            closed: false,
        }))
    }
}

#[derive(Debug)]
struct MockConnection {
    url: Url,
    path: String,
    status: StatusCode,
    headers: HeaderMap,
    steps: VecDeque<Step>,
    recorder: Arc<Recorder>,
    closed: bool,
}

#[async_trait]
impl Connection for MockConnection {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn url(&self) -> &Url {
        &self.url
    }

    async fn chunk(&mut self) -> Result<Option<Bytes>> {
        while let Some(step) = self.steps.pop_front() {
            match step {
                Step::Data(data) => return Ok(Some(Bytes::from_static(data.as_bytes()))),
                Step::Sleep(duration) => tokio::time::sleep(duration).await,
                Step::Fail => {
                    return Err(ErrorKind::ReadBody {
                        url: self.url.clone(),
                        source: "connection reset".into(),
                    });
                }
                Step::Hang => std::future::pending::<()>().await,
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.path == "/slow-close" {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        self.closed = true;
        self.recorder
            .record(|in_flight| Event::close(&self.path, in_flight));
        if self.path == "/close-fails" {
            return Err(ErrorKind::Close {
                url: self.url.clone(),
                source: "broken pipe".into(),
            });
        }
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.recorder.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }
}
