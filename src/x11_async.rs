//! X11 Async Event Stream
//!
//! A blocking worker polls the X11 socket with mio and wakes the event loop
//! through a [`Notify`]; the loop then drains the connection's buffer
//! without blocking.

use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{oneshot, Notify};
use tracing::{info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use crate::error::WmError;
use crate::wm::events::{translate, WmEvent};

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Readiness-driven stream of X events
pub struct X11EventStream {
    conn: Arc<RustConnection>,
    notify: Arc<Notify>,
    /// Dropping the stream stops the polling worker
    _worker_guard: oneshot::Receiver<()>,
}

impl X11EventStream {
    pub fn new(conn: Arc<RustConnection>) -> Result<Self> {
        let fd = conn.stream().as_raw_fd();
        let notify = Arc::new(Notify::new());
        let worker_notify = Arc::clone(&notify);

        let (guard, worker_guard) = oneshot::channel::<()>();
        let mut poll = mio::Poll::new().context("Failed to create mio Poll")?;
        let mut events = mio::Events::with_capacity(1);
        poll.registry()
            .register(
                &mut mio::unix::SourceFd(&fd),
                mio::Token(0),
                mio::Interest::READABLE,
            )
            .context("Failed to register the X11 socket with mio")?;

        tokio::task::spawn_blocking(move || {
            loop {
                if guard.is_closed() {
                    info!("X11 socket worker stopping");
                    return;
                }
                if let Err(e) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                    warn!("X11 socket poll failed: {}", e);
                    continue;
                }
                if events.iter().any(|event| event.token() == mio::Token(0)) {
                    worker_notify.notify_one();
                }
            }
        });

        Ok(Self {
            conn,
            notify,
            _worker_guard: worker_guard,
        })
    }

    /// Resolves once the socket has become readable
    pub async fn wait_readable(&self) {
        self.notify.notified().await;
    }

    /// Next buffered event, without blocking
    pub fn poll_next_event(&self) -> Result<Option<Event>> {
        self.conn
            .poll_for_event()
            .map_err(|_| WmError::ConnectionLost.into())
    }

    /// Drain everything buffered, translated for the window manager
    pub fn drain(&self) -> Result<Vec<WmEvent>> {
        let mut batch = Vec::new();
        while let Some(event) = self.poll_next_event()? {
            batch.extend(translate(&event));
        }
        Ok(batch)
    }

    pub fn flush(&self) -> Result<()> {
        self.conn
            .flush()
            .map_err(|_| WmError::ConnectionLost.into())
    }
}
