//! Pending geometry queue
//!
//! Client ConfigureRequests for managed windows go through a bounded queue.
//! A drain task batches whatever has accumulated, keeps only the latest
//! request per window, and hands the batch back to the event loop.

use tokio::sync::mpsc;
use tracing::debug;
use x11rb::protocol::xproto::Window;

/// Requested position and size; `None` fields keep the current value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryRequest {
    pub window: Window,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl GeometryRequest {
    /// Fold a later request for the same window into this one
    fn merge(&mut self, later: &GeometryRequest) {
        self.x = later.x.or(self.x);
        self.y = later.y.or(self.y);
        self.width = later.width.or(self.width);
        self.height = later.height.or(self.height);
    }
}

/// One request per window, in order of first appearance, with later
/// fields overriding earlier ones
pub fn coalesce(requests: Vec<GeometryRequest>) -> Vec<GeometryRequest> {
    let mut merged: Vec<GeometryRequest> = Vec::with_capacity(requests.len());
    for request in requests {
        match merged.iter_mut().find(|r| r.window == request.window) {
            Some(existing) => existing.merge(&request),
            None => merged.push(request),
        }
    }
    merged
}

/// Producer side of the queue
#[derive(Debug, Clone)]
pub struct PendingGeometry {
    tx: mpsc::Sender<GeometryRequest>,
}

impl PendingGeometry {
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<GeometryRequest>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self { tx }, rx)
    }

    /// Queue a request. A full or closed queue hands the request back so
    /// the caller can apply it directly.
    pub fn submit(&self, request: GeometryRequest) -> Result<(), GeometryRequest> {
        self.tx.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(request) => {
                debug!("Geometry queue full, applying 0x{:x} directly", request.window);
                request
            }
            mpsc::error::TrySendError::Closed(request) => request,
        })
    }
}

/// Drain loop: wait for a request, take everything else already queued,
/// coalesce, and forward the batch. Ends when either side closes.
pub async fn drain(
    mut rx: mpsc::Receiver<GeometryRequest>,
    out: mpsc::UnboundedSender<Vec<GeometryRequest>>,
) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(request) = rx.try_recv() {
            batch.push(request);
        }
        let batch = coalesce(batch);
        if out.send(batch).is_err() {
            break;
        }
    }
    debug!("Geometry drain loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(window: Window, x: Option<i32>, width: Option<u32>) -> GeometryRequest {
        GeometryRequest {
            window,
            x,
            y: None,
            width,
            height: None,
        }
    }

    #[test]
    fn test_coalesce_keeps_latest_fields() {
        let batch = coalesce(vec![
            request(1, Some(10), Some(100)),
            request(2, None, Some(50)),
            request(1, None, Some(120)),
            request(1, Some(30), None),
        ]);
        assert_eq!(
            batch,
            vec![request(1, Some(30), Some(120)), request(2, None, Some(50))]
        );
    }

    #[test]
    fn test_full_queue_returns_request() {
        let (queue, _rx) = PendingGeometry::new(1);
        assert!(queue.submit(request(1, Some(1), None)).is_ok());
        let rejected = queue.submit(request(2, Some(2), None)).unwrap_err();
        assert_eq!(rejected.window, 2);
    }

    #[tokio::test]
    async fn test_drain_coalesces_burst() {
        let (queue, rx) = PendingGeometry::new(16);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        for width in [100, 110, 120, 130] {
            queue.submit(request(7, None, Some(width))).unwrap();
        }
        let task = tokio::spawn(drain(rx, out_tx));

        let batch = out_rx.recv().await.unwrap();
        assert_eq!(batch, vec![request(7, None, Some(130))]);

        drop(queue);
        task.await.unwrap();
        assert!(out_rx.recv().await.is_none());
    }
}
