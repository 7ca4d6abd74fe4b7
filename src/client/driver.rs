//! Runs a `TransportClient` on a tokio runtime
//!
//! The client and its listeners are single-threaded, so the driver future is not
//! `Send`; await it directly or run it on a `LocalSet`.

use std::future;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::error::FeedError;
use crate::types::Category;
use crate::visibility::Viewport;

use super::connection::TransportClient;
use super::net::EventReceiver;
use super::transport::Transport;

/// Commands accepted by a running driver
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Connect,
    Disconnect,
    Reset,
    Viewport { bounds: Viewport, zoom: Option<f64> },
    Filter(Vec<Category>),
    StartSimulation,
    StopSimulation,
    Shutdown,
}

/// Cloneable handle for steering a running driver
#[derive(Debug, Clone)]
pub struct ClientHandle {
    tx: mpsc::Sender<ClientCommand>,
}

impl ClientHandle {
    pub async fn send(&self, command: ClientCommand) -> Result<(), FeedError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| FeedError::transport("client driver stopped"))
    }

    /// Queue a command without waiting. Usable from client listeners, which run
    /// inside the driver and must not block it.
    pub fn try_send(&self, command: ClientCommand) -> Result<(), FeedError> {
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => FeedError::Capacity("client command queue full".into()),
            TrySendError::Closed(_) => FeedError::transport("client driver stopped"),
        })
    }

    pub async fn shutdown(&self) -> Result<(), FeedError> {
        self.send(ClientCommand::Shutdown).await
    }
}

enum Wake {
    Event(super::state::ConnectionId, super::transport::TransportEvent),
    Command(Option<ClientCommand>),
    Timer,
}

pub struct ClientDriver<T: Transport> {
    client: TransportClient<T>,
    events: EventReceiver,
    commands: mpsc::Receiver<ClientCommand>,
    epoch: Instant,
}

impl<T: Transport> ClientDriver<T> {
    pub fn new(client: TransportClient<T>, events: EventReceiver) -> (Self, ClientHandle) {
        let (tx, commands) = mpsc::channel(32);
        let driver = Self {
            client,
            events,
            commands,
            epoch: Instant::now(),
        };
        (driver, ClientHandle { tx })
    }

    pub fn client(&self) -> &TransportClient<T> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut TransportClient<T> {
        &mut self.client
    }

    /// Connect and process events, timers and commands until shutdown.
    /// Returns the client, disconnected.
    pub async fn run(mut self) -> TransportClient<T> {
        self.client.connect();
        loop {
            let deadline = self.client.next_deadline().map(|at| self.epoch + at);
            let wake = tokio::select! {
                Some((id, event)) = self.events.recv() => Wake::Event(id, event),
                command = self.commands.recv() => Wake::Command(command),
                _ = sleep_until_deadline(deadline) => Wake::Timer,
            };

            self.client.advance(self.elapsed());
            match wake {
                Wake::Event(id, event) => self.client.handle(id, event),
                Wake::Command(None) | Wake::Command(Some(ClientCommand::Shutdown)) => break,
                Wake::Command(Some(command)) => self.apply(command),
                Wake::Timer => {}
            }
        }
        self.client.disconnect();
        self.client
    }

    fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn apply(&mut self, command: ClientCommand) {
        debug!("Client command {:?}", command);
        let result = match command {
            ClientCommand::Connect => {
                self.client.connect();
                Ok(())
            }
            ClientCommand::Disconnect => {
                self.client.disconnect();
                Ok(())
            }
            ClientCommand::Reset => {
                self.client.reset();
                Ok(())
            }
            ClientCommand::Viewport { bounds, zoom } => self.client.send_viewport(bounds, zoom),
            ClientCommand::Filter(categories) => self.client.send_filter(categories),
            ClientCommand::StartSimulation => self.client.start_simulation(),
            ClientCommand::StopSimulation => self.client.stop_simulation(),
            ClientCommand::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            warn!("Command not delivered: {}", e);
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
