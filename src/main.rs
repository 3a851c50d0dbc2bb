//! Area Window Manager
//!
//! Session binary: connects to the display, takes over window management
//! and runs the event loop until a signal or the quit shortcut ends it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use area_wm::config::{Config, WallpaperConfig};
use area_wm::error::WmError;
use area_wm::wm::click::SystemClock;
use area_wm::wm::conn::XConn;
use area_wm::wm::display::X11Conn;
use area_wm::wm::pending::{self, GeometryRequest, PendingGeometry};
use area_wm::wm::render::{Bitmap, SolidRenderer};
use area_wm::wm::shutdown::ShutdownReason;
use area_wm::wm::wallpaper;
use area_wm::wm::{ShortcutRequest, WindowManager};
use area_wm::x11_async::X11EventStream;

/// Everything the event loop waits on besides the X socket
struct Channels {
    geometry: mpsc::UnboundedReceiver<Vec<GeometryRequest>>,
    shortcuts: mpsc::UnboundedReceiver<ShortcutRequest>,
    wallpaper_tx: mpsc::UnboundedSender<Bitmap>,
    wallpaper: mpsc::UnboundedReceiver<Bitmap>,
    signals: mpsc::Receiver<&'static str>,
}

/// Run one window manager operation. Non-fatal errors are logged and
/// dropped; a panic hands every window back to the root before unwinding.
fn dispatch<T: Default>(
    wm: &mut WindowManager,
    what: &str,
    f: impl FnOnce(&mut WindowManager) -> Result<T>,
) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(|| f(wm))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) if WmError::is_fatal(&e) => Err(e),
        Ok(Err(e)) => {
            warn!("{} failed: {:#}", what, e);
            Ok(T::default())
        }
        Err(payload) => {
            error!("Panic while handling {}, releasing windows", what);
            wm.release_all();
            panic::resume_unwind(payload)
        }
    }
}

async fn run(
    wm: &mut WindowManager,
    stream: &X11EventStream,
    channels: &mut Channels,
    wallpaper_config: &WallpaperConfig,
) -> Result<()> {
    info!("Starting main event loop");
    loop {
        for event in stream.drain()? {
            dispatch(wm, "event", |wm| wm.handle_event(event))?;
        }
        if let Some(outcome) = dispatch(wm, "shutdown", |wm| wm.poll_shutdown(Instant::now()))? {
            info!("Shutdown finished: {:?}", outcome);
            return Ok(());
        }
        if let Some((width, height)) = wm.take_wallpaper_request() {
            wallpaper::spawn_render(wallpaper_config, width, height, channels.wallpaper_tx.clone());
        }
        stream.flush()?;

        let deadline = wm.shutdown_deadline();
        let wake_at = tokio::time::Instant::from_std(
            deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600)),
        );

        tokio::select! {
            () = stream.wait_readable() => {}
            Some(batch) = channels.geometry.recv() => {
                dispatch(wm, "geometry batch", |wm| wm.apply_pending(batch))?;
            }
            Some(request) = channels.shortcuts.recv() => {
                dispatch(wm, "shortcut", |wm| wm.run_shortcut(request, Instant::now()))?;
            }
            Some(bitmap) = channels.wallpaper.recv() => {
                dispatch(wm, "wallpaper", |wm| wm.apply_wallpaper(&bitmap))?;
            }
            Some(name) = channels.signals.recv() => {
                info!("Received {}, shutting down gracefully", name);
                dispatch(wm, "shutdown", |wm| wm.begin_shutdown(ShutdownReason::Signal, Instant::now()))?;
            }
            () = tokio::time::sleep_until(wake_at), if deadline.is_some() => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "area_wm=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Area Window Manager");

    let args: Vec<String> = std::env::args().collect();
    let replace = args.iter().any(|arg| arg == "--replace" || arg == "-r");
    if replace {
        info!("--replace flag detected: will attempt to replace existing WM");
    }

    let config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {:#}", e);
        Config::default()
    });

    let display = X11Conn::connect(replace)?;
    let stream = X11EventStream::new(display.connection())?;
    let check_window = display.check_window();
    let conn: Arc<dyn XConn> = Arc::new(display);

    let renderer = Arc::new(SolidRenderer::new(
        config.colors.clone(),
        config.decorations.button_size as u32,
        config.decorations.button_padding as u32,
        config.decorations.button_side,
    ));
    let (pending, pending_rx) = PendingGeometry::new(config.behavior.geometry_queue_depth);
    let (geometry_tx, geometry_rx) = mpsc::unbounded_channel();
    tokio::spawn(pending::drain(pending_rx, geometry_tx));
    let (shortcut_tx, shortcut_rx) = mpsc::unbounded_channel();
    let (wallpaper_tx, wallpaper_rx) = mpsc::unbounded_channel();
    let (signal_tx, signal_rx) = mpsc::channel(1);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            loop {
                let name = tokio::select! {
                    _ = sigterm.recv() => "SIGTERM",
                    _ = sigint.recv() => "SIGINT",
                };
                if signal_tx.send(name).await.is_err() {
                    return;
                }
            }
        });
    }

    let wallpaper_config = config.wallpaper.clone();
    let mut wm = WindowManager::new(
        conn,
        config,
        renderer,
        Arc::new(SystemClock),
        pending,
        shortcut_tx,
    )?;
    wm.start(check_window)?;

    let mut channels = Channels {
        geometry: geometry_rx,
        shortcuts: shortcut_rx,
        wallpaper_tx,
        wallpaper: wallpaper_rx,
        signals: signal_rx,
    };
    let result = run(&mut wm, &stream, &mut channels, &wallpaper_config).await;
    if let Err(e) = &result {
        error!("Window manager stopped: {:#}", e);
    }
    wm.release_all();
    info!("Goodbye");
    result
}
