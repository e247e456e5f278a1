//! Selector service: runs a [`ConfigurationSelector`] on its own task.
//!
//! Every transition happens inside one task, in arrival order, and applies
//! are awaited there too, so no two applies ever overlap. The debounce timer
//! lives in the same loop as a single optional deadline.

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::engine::{
    ConfigurationSelector, EnterOutcome, ErrorObservation, ErrorReport, SelectorStatus,
    SwitchOutcome,
};
use crate::configuration::{ProxyConfiguration, ProxyEngine};
use crate::transport::TransportEndpoints;

const COMMAND_BUFFER: usize = 256;

enum Command {
    Enter {
        url: String,
        reply: oneshot::Sender<EnterOutcome>,
    },
    Leave {
        reply: oneshot::Sender<bool>,
    },
    Abandon,
    Error {
        report: ErrorReport,
        reply: Option<oneshot::Sender<ErrorObservation>>,
    },
    ManualSwitch {
        reply: oneshot::Sender<SwitchOutcome>,
    },
    ApplyUser {
        configuration: ProxyConfiguration,
        reply: oneshot::Sender<bool>,
    },
    SetEnabled(bool),
    SetEndpoints(TransportEndpoints),
    ClearOverrides {
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<SelectorStatus>,
    },
}

/// Spawns and drives the selector task.
pub struct SelectorService;

impl SelectorService {
    /// Moves the selector onto a new task and returns a handle to it.
    ///
    /// The task stops once every handle has been dropped.
    pub fn spawn(selector: ConfigurationSelector) -> (SelectorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(run(selector, rx));
        (SelectorHandle { tx }, task)
    }
}

async fn run(mut selector: ConfigurationSelector, mut rx: mpsc::Receiver<Command>) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else { break };
                handle(&mut selector, command, &mut deadline).await;
                if !selector.session().is_active() {
                    deadline = None;
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                selector.process_buffer().await;
            }
        }
    }

    debug!("Selector service stopped");
}

async fn handle(
    selector: &mut ConfigurationSelector,
    command: Command,
    deadline: &mut Option<Instant>,
) {
    match command {
        Command::Enter { url, reply } => {
            let _ = reply.send(selector.enter_site(&url).await);
        }
        Command::Leave { reply } => {
            let _ = reply.send(selector.leave_site().await);
        }
        Command::Abandon => selector.abandon(),
        Command::Error { report, reply } => {
            let observation = selector.observe_error(&report);
            if observation.buffered {
                *deadline = Some(Instant::now() + selector.config().debounce);
            }
            if let Some(reply) = reply {
                let _ = reply.send(observation);
            }
        }
        Command::ManualSwitch { reply } => {
            let _ = reply.send(selector.manual_switch().await);
        }
        Command::ApplyUser {
            configuration,
            reply,
        } => {
            let _ = reply.send(selector.apply_user_configuration(configuration).await);
        }
        Command::SetEnabled(enabled) => {
            selector.set_enabled(enabled);
            if !enabled {
                *deadline = None;
            }
        }
        Command::SetEndpoints(endpoints) => selector.set_endpoints(endpoints),
        Command::ClearOverrides { reply } => {
            selector.clear_overrides();
            let _ = reply.send(());
        }
        Command::Status { reply } => {
            let _ = reply.send(selector.status());
        }
    }
}

/// Cloneable handle to a running selector.
///
/// Methods never fail: if the service has stopped, the call is logged and
/// answers as if no site were entered.
#[derive(Debug, Clone)]
pub struct SelectorHandle {
    tx: mpsc::Sender<Command>,
}

impl SelectorHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(build(reply)).await.is_err() {
            warn!("Selector service is not running");
            return None;
        }
        rx.await.ok()
    }

    async fn notify(&self, command: Command) {
        if self.tx.send(command).await.is_err() {
            warn!("Selector service is not running");
        }
    }

    /// Enters a site. `None` when the service has stopped.
    pub async fn enter_site(&self, url: impl Into<String>) -> Option<EnterOutcome> {
        let url = url.into();
        self.request(|reply| Command::Enter { url, reply }).await
    }

    /// Leaves the current site, restoring the original configuration.
    pub async fn leave_site(&self) -> bool {
        self.request(|reply| Command::Leave { reply })
            .await
            .unwrap_or(false)
    }

    /// Drops the session without restoring anything.
    pub async fn abandon(&self) {
        self.notify(Command::Abandon).await;
    }

    /// Reports an error and returns how it was classified.
    pub async fn report_error(&self, report: ErrorReport) -> Option<ErrorObservation> {
        self.request(|reply| Command::Error {
            report,
            reply: Some(reply),
        })
        .await
    }

    /// Forwards every report from `source` until it ends or the service stops.
    pub fn attach_source<S>(&self, source: S) -> JoinHandle<()>
    where
        S: Stream<Item = ErrorReport> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut source = Box::pin(source);
            while let Some(report) = source.next().await {
                if tx.send(Command::Error { report, reply: None }).await.is_err() {
                    break;
                }
            }
        })
    }

    /// Switches to the next candidate on user request.
    pub async fn manual_switch(&self) -> SwitchOutcome {
        self.request(|reply| Command::ManualSwitch { reply })
            .await
            .unwrap_or(SwitchOutcome::Inactive)
    }

    /// Installs a user-chosen configuration. Returns whether it was applied.
    pub async fn apply_user_configuration(&self, configuration: ProxyConfiguration) -> bool {
        self.request(|reply| Command::ApplyUser {
            configuration,
            reply,
        })
        .await
        .unwrap_or(false)
    }

    /// Turns dynamic selection on or off.
    pub async fn set_enabled(&self, enabled: bool) {
        self.notify(Command::SetEnabled(enabled)).await;
    }

    /// Replaces the transport endpoints.
    pub async fn set_endpoints(&self, endpoints: TransportEndpoints) {
        self.notify(Command::SetEndpoints(endpoints)).await;
    }

    /// Forgets every saved override.
    pub async fn clear_overrides(&self) {
        let _ = self.request(|reply| Command::ClearOverrides { reply }).await;
    }

    /// Number of saved overrides.
    pub async fn override_count(&self) -> usize {
        self.status().await.map(|s| s.override_count).unwrap_or(0)
    }

    /// Engine of the installed configuration.
    pub async fn active_engine(&self) -> Option<ProxyEngine> {
        self.status().await.map(|s| s.active.proxy_engine)
    }

    /// Current selector snapshot.
    pub async fn status(&self) -> Option<SelectorStatus> {
        self.request(|reply| Command::Status { reply }).await
    }
}
