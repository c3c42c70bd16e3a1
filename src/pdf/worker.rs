//! Stamp worker - runs edits and renders off the widget's thread

use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use log::{debug, error};

use super::cache::{CacheKey, PageCache};
use super::editor;
use super::renderer::render_page;
use super::request::{RenderParams, RequestId, WorkRequest, WorkResponse};
use super::types::{DocumentBuffer, Position};

/// Main worker function - runs in a dedicated thread.
///
/// Requests are handled strictly in arrival order, so a render queued after
/// a stamp always sees the stamped buffer.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn stamp_worker(
    requests: Receiver<WorkRequest>,
    responses: Sender<WorkResponse>,
    cache: Arc<Mutex<PageCache>>,
) {
    for request in requests {
        let response = match request {
            WorkRequest::Stamp {
                id,
                document,
                stamp,
                position,
                params,
            } => handle_stamp(id, &document, &stamp, position, &params),

            WorkRequest::Render {
                id,
                document,
                params,
            } => handle_render(id, &document, &params, &cache),

            WorkRequest::Shutdown => break,
        };

        if responses.send(response).is_err() {
            debug!("Response channel closed, stopping stamp worker");
            break;
        }
    }
}

fn handle_stamp(
    id: RequestId,
    document: &DocumentBuffer,
    stamp: &[u8],
    position: Position,
    params: &RenderParams,
) -> WorkResponse {
    match editor::stamp(
        document.bytes(),
        stamp,
        position,
        params.scale,
        params.stamp_size,
    ) {
        Ok(bytes) => WorkResponse::Stamped {
            id,
            document: document.successor(bytes),
        },
        Err(e) => {
            error!("Stamp request {id:?} failed: {e}");
            WorkResponse::Error { id, error: e }
        }
    }
}

fn handle_render(
    id: RequestId,
    document: &DocumentBuffer,
    params: &RenderParams,
    cache: &Arc<Mutex<PageCache>>,
) -> WorkResponse {
    let key = CacheKey::from_params(document.generation(), params);

    let cached = cache
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&key);
    if let Some(raster) = cached {
        return WorkResponse::Rendered { id, raster };
    }

    match render_page(document, params.page, params.scale) {
        Ok(raster) => {
            let raster = cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(key, raster);
            WorkResponse::Rendered { id, raster }
        }
        Err(e) => {
            error!("Render request {id:?} failed: {e}");
            WorkResponse::Error { id, error: e }
        }
    }
}
