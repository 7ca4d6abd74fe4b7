//! Tokio-backed transport: WebSocket via tokio-tungstenite, event stream via reqwest

use std::collections::HashMap;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::config::{ClientConfig, TransportMode};
use crate::error::FeedError;

use super::event_stream::EventStreamParser;
use super::state::ConnectionId;
use super::transport::{Transport, TransportEvent};

/// Events from every connection task, tagged with their attempt
pub type EventSender = mpsc::Sender<(ConnectionId, TransportEvent)>;
pub type EventReceiver = mpsc::Receiver<(ConnectionId, TransportEvent)>;

/// Frames buffered between the socket reader and the client before readers block
const EVENT_BUFFER: usize = 1024;

struct Link {
    outgoing: Option<mpsc::UnboundedSender<String>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Link {
    fn abort(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Spawns one task per connection attempt on the current tokio runtime
pub struct TokioTransport {
    ws_url: String,
    stream_url: String,
    state_url: String,
    http: reqwest::Client,
    events: EventSender,
    links: HashMap<ConnectionId, Link>,
}

impl TokioTransport {
    pub fn new(config: &ClientConfig) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::channel(EVENT_BUFFER);
        let transport = Self {
            ws_url: config.ws_url(),
            stream_url: config.endpoint("/events"),
            state_url: config.endpoint("/api/platforms"),
            http: reqwest::Client::new(),
            events,
            links: HashMap::new(),
        };
        (transport, rx)
    }

    pub fn open_links(&self) -> usize {
        self.links.len()
    }
}

impl Transport for TokioTransport {
    fn open(&mut self, id: ConnectionId, mode: TransportMode) {
        let link = match mode {
            TransportMode::Duplex => {
                let (tx, rx) = mpsc::unbounded_channel();
                let task = tokio::spawn(run_duplex(self.ws_url.clone(), id, self.events.clone(), rx));
                Link {
                    outgoing: Some(tx),
                    tasks: vec![task],
                }
            }
            TransportMode::Stream => {
                let task = tokio::spawn(run_stream(
                    self.http.clone(),
                    self.stream_url.clone(),
                    id,
                    self.events.clone(),
                ));
                Link {
                    outgoing: None,
                    tasks: vec![task],
                }
            }
        };
        if let Some(previous) = self.links.insert(id, link) {
            previous.abort();
        }
    }

    fn send(&mut self, id: ConnectionId, text: String) -> Result<(), FeedError> {
        let outgoing = self
            .links
            .get(&id)
            .and_then(|link| link.outgoing.as_ref())
            .ok_or_else(|| FeedError::transport(format!("no duplex link for {}", id)))?;
        outgoing
            .send(text)
            .map_err(|_| FeedError::transport("connection task ended"))
    }

    fn close(&mut self, id: ConnectionId) {
        if let Some(link) = self.links.remove(&id) {
            debug!("Closing link {}", id);
            link.abort();
        }
    }

    fn fetch_initial_state(&mut self, id: ConnectionId) {
        let task = tokio::spawn(fetch_initial(
            self.http.clone(),
            self.state_url.clone(),
            id,
            self.events.clone(),
        ));
        match self.links.get_mut(&id) {
            Some(link) => link.tasks.push(task),
            None => task.abort(),
        }
    }
}

impl Drop for TokioTransport {
    fn drop(&mut self) {
        for (_, link) in self.links.drain() {
            link.abort();
        }
    }
}

async fn run_duplex(
    url: String,
    id: ConnectionId,
    events: EventSender,
    mut outgoing: mpsc::UnboundedReceiver<String>,
) {
    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            let _ = events.send((id, TransportEvent::Failed(e.to_string()))).await;
            return;
        }
    };
    if events.send((id, TransportEvent::Opened)).await.is_err() {
        return;
    }

    let (mut sink, mut stream) = ws.split();
    let end = loop {
        tokio::select! {
            out = outgoing.recv() => match out {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        break TransportEvent::Failed(e.to_string());
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if events.send((id, TransportEvent::Frame(text))).await.is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break TransportEvent::Closed,
                // Protocol pings are answered by tungstenite
                Some(Ok(_)) => {
                    if events.send((id, TransportEvent::KeepAlive)).await.is_err() {
                        return;
                    }
                }
                Some(Err(e)) => break TransportEvent::Failed(e.to_string()),
            },
        }
    };
    let _ = events.send((id, end)).await;
}

async fn run_stream(http: reqwest::Client, url: String, id: ConnectionId, events: EventSender) {
    let response = match http
        .get(&url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            let reason = format!("event stream returned HTTP {}", response.status());
            let _ = events.send((id, TransportEvent::Failed(reason))).await;
            return;
        }
        Err(e) => {
            let _ = events.send((id, TransportEvent::Failed(e.to_string()))).await;
            return;
        }
    };
    if events.send((id, TransportEvent::Opened)).await.is_err() {
        return;
    }

    let mut parser = EventStreamParser::new();
    let mut body = response.bytes_stream();
    let end = loop {
        match body.next().await {
            Some(Ok(chunk)) => {
                let frames = parser.feed(&chunk);
                if frames.is_empty() {
                    if events.send((id, TransportEvent::KeepAlive)).await.is_err() {
                        return;
                    }
                }
                for data in frames {
                    if events.send((id, TransportEvent::Frame(data))).await.is_err() {
                        return;
                    }
                }
            }
            Some(Err(e)) => break TransportEvent::Failed(e.to_string()),
            None => break TransportEvent::Closed,
        }
    };
    let _ = events.send((id, end)).await;
}

async fn fetch_initial(http: reqwest::Client, url: String, id: ConnectionId, events: EventSender) {
    let response = match http.get(&url).send().await.and_then(|r| r.error_for_status()) {
        Ok(response) => response,
        Err(e) => {
            warn!("Initial state request failed: {}", e);
            return;
        }
    };
    match response.text().await {
        Ok(body) => {
            let _ = events.send((id, TransportEvent::InitialState(body))).await;
        }
        Err(e) => warn!("Initial state body unreadable: {}", e),
    }
}
