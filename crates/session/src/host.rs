//! The execution window: whatever hosts the remote session client.

use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, info};

use chattray_channel::{Endpoint, Router};
use chattray_protocol::constants::{READY, READY_TIMEOUT};

use crate::error::HostError;

pub type HostFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, HostError>> + Send + 'a>>;

/// Creates execution windows.
pub trait ExecutionHost: Send + Sync {
    /// Opens a new window and resolves once it has finished loading.
    fn open(&self) -> HostFuture<'_, ExecutionWindow>;
}

/// A live execution context and the control side of its channel.
///
/// Dropping the window destroys it.
pub struct ExecutionWindow {
    endpoint: Endpoint,
    process: Option<Child>,
}

impl ExecutionWindow {
    /// A window with no process of its own (in-process pair).
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            process: None,
        }
    }

    pub fn with_process(endpoint: Endpoint, process: Child) -> Self {
        Self {
            endpoint,
            process: Some(process),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether the platform has closed the window.
    pub fn is_closed(&self) -> bool {
        self.endpoint.is_closed()
    }

    /// Closes the link and kills the process.
    pub fn destroy(mut self) {
        self.endpoint.close();
        if let Some(Err(e)) = self.process.as_mut().map(Child::start_kill) {
            debug!("execution process already gone: {e}");
        }
    }
}

/// Runs the remote session client as a child process speaking the
/// channel protocol over stdin/stdout.
pub struct ProcessHost {
    program: PathBuf,
    args: Vec<OsString>,
    ready_timeout: Duration,
}

impl ProcessHost {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            ready_timeout: READY_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }
}

impl ExecutionHost for ProcessHost {
    fn open(&self) -> HostFuture<'_, ExecutionWindow> {
        Box::pin(async move {
            let mut child = Command::new(&self.program)
                .args(&self.args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .kill_on_drop(true)
                .spawn()?;
            let stdin = child.stdin.take().ok_or(HostError::MissingPipe("stdin"))?;
            let stdout = child.stdout.take().ok_or(HostError::MissingPipe("stdout"))?;

            let router = Router::new();
            let (tx, rx) = oneshot::channel();
            router.once(READY, move |_| {
                let _ = tx.send(());
            });
            let endpoint = Endpoint::over_io_with_router(stdout, stdin, router);

            match tokio::time::timeout(self.ready_timeout, rx).await {
                Ok(Ok(())) => {
                    info!(pid = ?child.id(), program = %self.program.display(), "execution process ready");
                    Ok(ExecutionWindow::with_process(endpoint, child))
                }
                Ok(Err(_)) => Err(HostError::Exited),
                Err(_) => Err(HostError::ReadyTimeout(self.ready_timeout)),
            }
        })
    }
}
