//! Stamp service - owns the worker thread and the render cache

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use log::debug;

use super::cache::PageCache;
use super::request::{RenderParams, RequestId, WorkRequest, WorkResponse};
use super::types::{DocumentBuffer, Position};
use super::worker::stamp_worker;
use super::DEFAULT_CACHE_SIZE;
use crate::error::{Result, StampError};

/// Kind of work a request id stands for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingRequest {
    Stamp,
    Render,
}

/// Runs stamping and rendering on a worker thread
pub struct StampService {
    request_tx: Sender<WorkRequest>,
    response_rx: Receiver<WorkResponse>,
    next_request_id: u64,
    pending_requests: HashMap<RequestId, PendingRequest>,
    cache: Arc<Mutex<PageCache>>,
}

impl Default for StampService {
    fn default() -> Self {
        Self::new()
    }
}

impl StampService {
    /// Create a new service with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_CACHE_SIZE)
    }

    /// Create a new service with a custom render cache size
    #[must_use]
    pub fn with_cache_size(cache_size: usize) -> Self {
        let cache = Arc::new(Mutex::new(PageCache::new(cache_size)));

        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        // One worker: edits must apply in order against the latest buffer.
        let cache_clone = cache.clone();
        std::thread::spawn(move || {
            stamp_worker(request_rx, response_tx, cache_clone);
        });

        Self {
            request_tx,
            response_rx,
            next_request_id: 1,
            pending_requests: HashMap::new(),
            cache,
        }
    }

    /// Queue a stamp of `stamp` onto `document` at `position`
    pub fn request_stamp(
        &mut self,
        document: DocumentBuffer,
        stamp: Arc<[u8]>,
        position: Position,
        params: RenderParams,
    ) -> Result<RequestId> {
        let id = self.next_id();
        self.request_tx
            .send(WorkRequest::Stamp {
                id,
                document,
                stamp,
                position,
                params,
            })
            .map_err(|_| StampError::WorkerGone)?;
        self.pending_requests.insert(id, PendingRequest::Stamp);

        Ok(id)
    }

    /// Queue a render of `document`
    pub fn request_render(
        &mut self,
        document: DocumentBuffer,
        params: RenderParams,
    ) -> Result<RequestId> {
        let id = self.next_id();
        self.request_tx
            .send(WorkRequest::Render {
                id,
                document,
                params,
            })
            .map_err(|_| StampError::WorkerGone)?;
        self.pending_requests.insert(id, PendingRequest::Render);

        Ok(id)
    }

    /// Kind of an in-flight request, if it is still pending
    #[must_use]
    pub fn pending(&self, id: RequestId) -> Option<PendingRequest> {
        self.pending_requests.get(&id).copied()
    }

    /// Whether any request is still in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        !self.pending_requests.is_empty()
    }

    /// Poll for completed responses without blocking
    pub fn poll_responses(&mut self) -> Vec<(PendingRequest, WorkResponse)> {
        let mut responses = vec![];

        while let Ok(response) = self.response_rx.try_recv() {
            if let Some(tracked) = self.track(response) {
                responses.push(tracked);
            }
        }

        responses
    }

    /// Block for the next response, up to `timeout`
    pub fn wait_response(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(PendingRequest, WorkResponse)>> {
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => Ok(self.track(response)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(StampError::WorkerGone),
        }
    }

    fn track(&mut self, response: WorkResponse) -> Option<(PendingRequest, WorkResponse)> {
        match self.pending_requests.remove(&response.id()) {
            Some(kind) => Some((kind, response)),
            None => {
                debug!("Dropping response for unknown request {:?}", response.id());
                None
            }
        }
    }

    /// Forget rasters of buffers older than `generation`
    pub fn retain_generation(&self, generation: u64) {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain_generation(generation);
    }

    /// Number of cached rasters
    #[must_use]
    pub fn cached_pages(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Shutdown the worker
    pub fn shutdown(&self) {
        let _ = self.request_tx.send(WorkRequest::Shutdown);
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for StampService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;

    const WAIT: Duration = Duration::from_secs(30);

    fn params() -> RenderParams {
        RenderParams {
            page: 1,
            scale: 1.0,
            stamp_size: 128.0,
        }
    }

    #[test]
    fn render_round_trips_through_worker() {
        let mut service = StampService::new();
        let doc = DocumentBuffer::new(fixtures::letter_pdf());

        let id = service.request_render(doc, params()).unwrap();
        assert!(service.is_busy());
        assert_eq!(service.pending(id), Some(PendingRequest::Render));

        let (kind, response) = service.wait_response(WAIT).unwrap().unwrap();
        assert_eq!(kind, PendingRequest::Render);
        assert!(matches!(response, WorkResponse::Rendered { id: got, .. } if got == id));
        assert!(!service.is_busy());
    }

    #[test]
    fn second_render_of_same_generation_hits_cache() {
        let mut service = StampService::new();
        let doc = DocumentBuffer::new(fixtures::letter_pdf());

        service.request_render(doc.clone(), params()).unwrap();
        let (_, first) = service.wait_response(WAIT).unwrap().unwrap();
        service.request_render(doc, params()).unwrap();
        let (_, second) = service.wait_response(WAIT).unwrap().unwrap();

        match (first, second) {
            (WorkResponse::Rendered { raster: a, .. }, WorkResponse::Rendered { raster: b, .. }) => {
                assert!(Arc::ptr_eq(&a, &b));
            }
            other => panic!("unexpected responses: {other:?}"),
        }
        assert_eq!(service.cached_pages(), 1);
    }

    #[test]
    fn stamp_returns_successor_buffer() {
        let mut service = StampService::new();
        let doc = DocumentBuffer::new(fixtures::letter_pdf());
        let stamp: Arc<[u8]> = fixtures::solid_png(128, [255, 0, 0, 255]).into();

        service
            .request_stamp(doc.clone(), stamp, Position::new(10.0, 10.0), params())
            .unwrap();
        let (kind, response) = service.wait_response(WAIT).unwrap().unwrap();

        assert_eq!(kind, PendingRequest::Stamp);
        match response {
            WorkResponse::Stamped { document, .. } => {
                assert_eq!(document.generation(), doc.generation() + 1);
                assert_ne!(document.bytes(), doc.bytes());
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn failed_stamp_reports_error() {
        let mut service = StampService::new();
        let doc = DocumentBuffer::new(b"garbage".to_vec());
        let stamp: Arc<[u8]> = fixtures::solid_png(8, [0, 0, 0, 255]).into();

        service
            .request_stamp(doc, stamp, Position::default(), params())
            .unwrap();
        let (_, response) = service.wait_response(WAIT).unwrap().unwrap();

        assert!(matches!(
            response,
            WorkResponse::Error {
                error: StampError::MalformedDocument { .. },
                ..
            }
        ));
    }
}
