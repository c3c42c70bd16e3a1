//! Stamp widget
//!
//! Owns the current document buffer, the canvas and the display handle, and
//! drives the worker through the state machine in `pdf::state`. All buffer
//! swaps happen on the thread that owns the widget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use log::{debug, error, info, warn};

use super::coords::CanvasRect;
use super::overlay;
use crate::assets::{AssetNames, AssetSource, load_assets};
use crate::display::{DisplayHandle, DisplayHandles};
use crate::error::{Result, StampError};
use crate::event_source::{EventSource, PointerEvent};
use crate::pdf::editor::STAMPED_PAGE;
use crate::pdf::{
    Canvas, Command, DEFAULT_CACHE_SIZE, DEFAULT_STAMP_SIZE, DocumentBuffer, Effect,
    PendingRequest, Phase, Position, RenderParams, RequestId, StampService, WidgetState,
    WorkResponse,
};

/// Widget configuration
#[derive(Clone, Debug, PartialEq)]
pub struct StampConfig {
    /// Render scale factor
    pub scale: f32,
    /// Stamp edge length in page points
    pub stamp_size: u32,
    /// Rendered rasters kept in memory
    pub cache_size: usize,
    /// Which assets to load
    pub assets: AssetNames,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            stamp_size: DEFAULT_STAMP_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
            assets: AssetNames::default(),
        }
    }
}

impl StampConfig {
    fn render_params(&self) -> RenderParams {
        RenderParams {
            page: STAMPED_PAGE,
            scale: self.scale,
            stamp_size: self.stamp_size as f32,
        }
    }

    /// Stamp edge length on the canvas, in pixels
    #[must_use]
    pub fn footprint_px(&self) -> u32 {
        (self.stamp_size as f32 * crate::pdf::Viewport::clamp_scale(self.scale)).round() as u32
    }
}

/// What happened to a click
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    /// A stamp request was queued
    Accepted(RequestId),
    /// The widget was busy or not ready; nothing happens
    Dropped,
}

/// Counters from replaying an event script
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub accepted_clicks: usize,
    pub dropped_clicks: usize,
}

/// A PDF page on a canvas that stamps an image where it is clicked
pub struct StampWidget {
    config: StampConfig,
    state: WidgetState,
    service: StampService,
    document: Option<DocumentBuffer>,
    stamp: Option<Arc<[u8]>>,
    preview: Option<RgbaImage>,
    canvas: Canvas,
    canvas_rect: CanvasRect,
    display: DisplayHandles,
    in_flight: Option<RequestId>,
    last_error: Option<StampError>,
}

impl StampWidget {
    #[must_use]
    pub fn new(config: StampConfig) -> Self {
        let service = StampService::with_cache_size(config.cache_size);
        Self {
            config,
            state: WidgetState::new(),
            service,
            document: None,
            stamp: None,
            preview: None,
            canvas: Canvas::new(),
            canvas_rect: CanvasRect::default(),
            display: DisplayHandles::new(),
            in_flight: None,
            last_error: None,
        }
    }

    /// Fetch the assets and queue the initial render.
    ///
    /// Returns once the assets are in memory; the first page is on the
    /// canvas after `poll` or `settle` sees the render finish.
    pub fn load(&mut self, source: &dyn AssetSource) -> Result<()> {
        let effects = self.state.apply(Command::BeginLoading);
        self.execute_effects(effects);

        let assets = match load_assets(source, &self.config.assets) {
            Ok(assets) => assets,
            Err(e) => {
                let effects = self.state.apply(Command::LoadFailed);
                self.execute_effects(effects);
                self.last_error = Some(e.clone());
                return Err(e);
            }
        };

        info!(
            "Loaded {} and {}",
            self.config.assets.document, self.config.assets.stamp
        );
        self.document = Some(DocumentBuffer::new(assets.document));
        self.stamp = Some(assets.stamp.into());

        let effects = self.state.apply(Command::AssetsLoaded);
        self.execute_effects(effects);
        Ok(())
    }

    /// Place the canvas in client coordinates (origin only; size follows renders)
    pub fn set_canvas_origin(&mut self, x: f32, y: f32) {
        self.canvas_rect.x = x;
        self.canvas_rect.y = y;
    }

    pub fn handle_event(&mut self, event: PointerEvent) -> Option<ClickOutcome> {
        match event {
            PointerEvent::Enter { x, y } => {
                self.on_pointer_enter(x, y);
                None
            }
            PointerEvent::Move { x, y } => {
                self.on_pointer_move(x, y);
                None
            }
            PointerEvent::Leave => {
                self.on_pointer_leave();
                None
            }
            PointerEvent::Click { x, y } => Some(self.on_click(x, y)),
        }
    }

    pub fn on_pointer_enter(&mut self, client_x: f32, client_y: f32) {
        let pos = self.position_of(client_x, client_y);
        let effects = self.state.apply(Command::PointerEntered(pos));
        self.execute_effects(effects);
    }

    pub fn on_pointer_move(&mut self, client_x: f32, client_y: f32) {
        let pos = self.position_of(client_x, client_y);
        let effects = self.state.apply(Command::PointerMoved(pos));
        self.execute_effects(effects);
    }

    pub fn on_pointer_leave(&mut self) {
        let effects = self.state.apply(Command::PointerLeft);
        self.execute_effects(effects);
    }

    /// Stamp at the clicked point, unless an edit is already in flight or
    /// the point is off the canvas
    pub fn on_click(&mut self, client_x: f32, client_y: f32) -> ClickOutcome {
        if !self.canvas_rect.contains(client_x, client_y) {
            warn!("Click at ({client_x}, {client_y}) is outside the canvas {:?}", self.canvas_rect);
            return ClickOutcome::Dropped;
        }

        let pos = self.position_of(client_x, client_y);
        let effects = self.state.apply(Command::Clicked(pos));
        let stamping = effects.iter().any(|e| matches!(e, Effect::StampAt(_)));
        self.execute_effects(effects);

        match self.in_flight {
            Some(id) if stamping && self.service.pending(id) == Some(PendingRequest::Stamp) => {
                ClickOutcome::Accepted(id)
            }
            _ => ClickOutcome::Dropped,
        }
    }

    /// Handle every response that has already arrived; returns how many
    pub fn poll(&mut self) -> usize {
        let responses = self.service.poll_responses();
        let count = responses.len();
        for (kind, response) in responses {
            self.handle_response(kind, response);
        }
        count
    }

    /// Block until no work is in flight, or `timeout` passes
    pub fn settle(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while self.in_flight.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(StampError::Timeout { waited: timeout });
            }
            if let Some((kind, response)) = self.service.wait_response(remaining)? {
                self.handle_response(kind, response);
            }
        }
        Ok(())
    }

    /// Feed every event from `source`, settling after each accepted click
    pub fn replay<E: EventSource>(
        &mut self,
        source: &mut E,
        settle_timeout: Duration,
    ) -> anyhow::Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();
        while source.poll(Duration::ZERO)? {
            let event = source.read()?;
            summary.events += 1;
            match self.handle_event(event) {
                Some(ClickOutcome::Accepted(_)) => {
                    summary.accepted_clicks += 1;
                    self.settle(settle_timeout)?;
                }
                Some(ClickOutcome::Dropped) => summary.dropped_clicks += 1,
                None => {}
            }
        }
        Ok(summary)
    }

    fn position_of(&self, client_x: f32, client_y: f32) -> Position {
        self.canvas_rect
            .to_position(client_x, client_y, self.config.footprint_px() as f32)
    }

    fn handle_response(&mut self, kind: PendingRequest, response: WorkResponse) {
        if self.in_flight != Some(response.id()) {
            debug!("Ignoring stale response {:?}", response.id());
            return;
        }
        self.in_flight = None;

        let command = match response {
            WorkResponse::Stamped { document, .. } => {
                debug!(
                    "Swapping in document generation {} ({} bytes)",
                    document.generation(),
                    document.len()
                );
                self.service.retain_generation(document.generation());
                self.document = Some(document);
                Command::StampFinished
            }
            WorkResponse::Rendered { raster, .. } => {
                self.canvas.draw(&raster);
                self.canvas_rect.width = self.canvas.width() as f32;
                self.canvas_rect.height = self.canvas.height() as f32;
                debug!(
                    "Canvas now {}x{} for generation {} ({} rasters cached)",
                    self.canvas.width(),
                    self.canvas.height(),
                    raster.generation,
                    self.service.cached_pages()
                );
                Command::RenderFinished
            }
            WorkResponse::Error { error, .. } => {
                error!("{kind:?} failed: {error}");
                self.last_error = Some(error);
                match kind {
                    PendingRequest::Stamp => Command::StampFailed,
                    PendingRequest::Render => Command::RenderFailed,
                }
            }
        };

        let effects = self.state.apply(command);
        self.execute_effects(effects);
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RenderCurrentPage => self.request_render(),
                Effect::StampAt(pos) => self.request_stamp(pos),
                Effect::PublishDisplayHandle => self.publish_display_handle(),
                Effect::DropClick => {
                    warn!("Click dropped while {:?}", self.state.phase);
                }
            }
        }
    }

    fn request_render(&mut self) {
        let Some(document) = self.document.clone() else {
            error!("Render requested without a document");
            self.fail(PendingRequest::Render, StampError::malformed("no document loaded"));
            return;
        };

        match self
            .service
            .request_render(document, self.config.render_params())
        {
            Ok(id) => self.in_flight = Some(id),
            Err(e) => self.fail(PendingRequest::Render, e),
        }
    }

    fn request_stamp(&mut self, pos: Position) {
        let (Some(document), Some(stamp)) = (self.document.clone(), self.stamp.clone()) else {
            self.fail(PendingRequest::Stamp, StampError::malformed("no document loaded"));
            return;
        };

        debug!("Stamping at {pos:?}");
        match self
            .service
            .request_stamp(document, stamp, pos, self.config.render_params())
        {
            Ok(id) => self.in_flight = Some(id),
            Err(e) => self.fail(PendingRequest::Stamp, e),
        }
    }

    fn fail(&mut self, kind: PendingRequest, error: StampError) {
        error!("{kind:?} could not be queued: {error}");
        self.last_error = Some(error);
        let command = match kind {
            PendingRequest::Stamp => Command::StampFailed,
            PendingRequest::Render => Command::RenderFailed,
        };
        let effects = self.state.apply(command);
        self.execute_effects(effects);
    }

    fn publish_display_handle(&mut self) {
        let Some(document) = self.document.as_ref() else {
            return;
        };
        if let Err(e) = self.display.publish(document) {
            error!("Failed to publish display handle: {e}");
        }
    }

    /// Canvas with the stamp preview under the cursor, when the overlay is shown
    #[must_use]
    pub fn compose_frame(&mut self) -> RgbaImage {
        if !self.state.overlay_visible {
            return self.canvas.surface().clone();
        }

        if self.preview.is_none() {
            if let Some(stamp) = &self.stamp {
                match overlay::preview_image(stamp, self.config.footprint_px()) {
                    Ok(img) => self.preview = Some(img),
                    Err(e) => warn!("Stamp preview unavailable: {e}"),
                }
            }
        }

        match &self.preview {
            Some(preview) => overlay::compose(&self.canvas, preview, self.state.cursor),
            None => self.canvas.surface().clone(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub fn cursor(&self) -> Position {
        self.state.cursor
    }

    #[must_use]
    pub fn is_overlay_visible(&self) -> bool {
        self.state.overlay_visible
    }

    #[must_use]
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    #[must_use]
    pub fn canvas_rect(&self) -> CanvasRect {
        self.canvas_rect
    }

    #[must_use]
    pub fn document(&self) -> Option<&DocumentBuffer> {
        self.document.as_ref()
    }

    #[must_use]
    pub fn display_handle(&self) -> Option<&DisplayHandle> {
        self.display.current()
    }

    #[must_use]
    pub fn released_handles(&self) -> usize {
        self.display.released()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&StampError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &StampConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetSource;
    use crate::test_utils::fixtures;

    const WAIT: Duration = Duration::from_secs(30);

    fn ready_widget() -> StampWidget {
        let mut widget = StampWidget::new(StampConfig::default());
        widget.load(&fixtures::asset_source()).unwrap();
        widget.settle(WAIT).unwrap();
        widget
    }

    #[test]
    fn footprint_follows_scale() {
        let config = StampConfig {
            scale: 1.5,
            ..StampConfig::default()
        };
        assert_eq!(config.footprint_px(), 192);
    }

    #[test]
    fn renders_the_page_it_stamps() {
        let params = StampConfig::default().render_params();
        assert_eq!(params.page, STAMPED_PAGE);
    }

    #[test]
    fn click_outside_canvas_is_dropped() {
        let mut widget = ready_widget();

        assert_eq!(widget.on_click(5000.0, 5000.0), ClickOutcome::Dropped);
        assert_eq!(widget.on_click(612.0, 10.0), ClickOutcome::Dropped);
        assert_eq!(widget.phase(), Phase::Ready);
        assert!(!widget.is_busy());
        assert_eq!(widget.document().map(DocumentBuffer::generation), Some(0));
    }

    #[test]
    fn load_failure_leaves_widget_failed() {
        let mut widget = StampWidget::new(StampConfig::default());
        let err = widget.load(&MemoryAssetSource::new()).unwrap_err();

        assert!(matches!(err, StampError::ResourceUnavailable { .. }));
        assert_eq!(widget.phase(), Phase::Failed);
        assert!(widget.document().is_none());
        assert_eq!(widget.on_click(10.0, 10.0), ClickOutcome::Dropped);
    }

    #[test]
    fn click_during_initial_render_is_dropped() {
        let mut widget = StampWidget::new(StampConfig::default());
        widget.load(&fixtures::asset_source()).unwrap();

        assert_eq!(widget.phase(), Phase::Loading);
        assert_eq!(widget.on_click(200.0, 300.0), ClickOutcome::Dropped);

        widget.settle(WAIT).unwrap();
        assert_eq!(widget.phase(), Phase::Ready);
        assert_eq!(widget.document().map(DocumentBuffer::generation), Some(0));
    }

    #[test]
    fn initial_render_publishes_display_handle() {
        let widget = ready_widget();
        let handle = widget.display_handle().unwrap();

        assert_eq!(handle.generation(), 0);
        assert_eq!(widget.released_handles(), 0);
    }

    #[test]
    fn overlapping_click_is_dropped_not_raced() {
        let mut widget = ready_widget();

        let first = widget.on_click(200.0, 300.0);
        let second = widget.on_click(400.0, 500.0);

        assert!(matches!(first, ClickOutcome::Accepted(_)));
        assert_eq!(second, ClickOutcome::Dropped);
        assert!(widget.is_busy());

        widget.settle(WAIT).unwrap();
        assert!(!widget.is_busy());
        let doc = widget.document().unwrap();
        assert_eq!(doc.generation(), 1);
        assert_eq!(
            crate::pdf::editor::stamp_names(doc.bytes()).unwrap().len(),
            1
        );
    }

    #[test]
    fn failed_stamp_keeps_previous_buffer() {
        let source = MemoryAssetSource::new()
            .with("document.pdf", fixtures::letter_pdf())
            .with("stamp.png", b"not an image".to_vec());
        let mut widget = StampWidget::new(StampConfig::default());
        widget.load(&source).unwrap();
        widget.settle(WAIT).unwrap();
        let before = widget.document().unwrap().bytes().to_vec();

        assert!(matches!(widget.on_click(200.0, 300.0), ClickOutcome::Accepted(_)));
        widget.settle(WAIT).unwrap();

        assert_eq!(widget.phase(), Phase::Ready);
        assert_eq!(widget.document().unwrap().bytes(), before.as_slice());
        assert_eq!(widget.document().unwrap().generation(), 0);
        assert!(matches!(
            widget.last_error(),
            Some(StampError::MalformedDocument { .. })
        ));
        assert_eq!(widget.display_handle().map(DisplayHandle::generation), Some(0));
    }

    #[test]
    fn overlay_shows_only_between_enter_and_leave() {
        let mut widget = ready_widget();
        let plain = widget.compose_frame();

        widget.on_pointer_enter(300.0, 300.0);
        let with_overlay = widget.compose_frame();
        assert_ne!(plain, with_overlay);
        // stamp preview covers (172..300, 172..300)
        assert_eq!(with_overlay.get_pixel(236, 236).0, [255, 0, 0, 255]);

        widget.on_pointer_leave();
        assert_eq!(widget.compose_frame(), plain);
    }
}
