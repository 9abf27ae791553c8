//! Foreign-language surface of the dive map core.
//!
//! The host UI implements [`ForeignMapSurface`] on top of its map SDK and
//! drives a [`MapController`] from its event loop.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{Config, MapConfig, MarkerStyle};
use crate::error::{CoordinateError, MapError};
use crate::geo::{parse_coordinates, LatLng, LatLngBounds};
use crate::info::info_overlay_html;
use crate::logging::{init_logging, Verbosity};
use crate::models::{DiveId, DiveRecord};
use crate::reconciler::{MapEvent, MarkerReconciler, ReconcileSummary};
use crate::surface::MapSurface;
use crate::visual::{marker_visual, render_marker_html, MarkerVisual};

/// Map SDK commands implemented by the host. Marker handles are opaque ids
/// chosen by the host.
#[uniffi::export(with_foreign)]
pub trait ForeignMapSurface: Send + Sync {
    fn initialize(&self) -> Result<(), MapError>;
    fn create_marker(
        &self,
        id: DiveId,
        position: LatLng,
        visual: MarkerVisual,
    ) -> Result<u64, MapError>;
    fn update_marker(&self, handle: u64, visual: MarkerVisual) -> Result<(), MapError>;
    fn destroy_marker(&self, handle: u64) -> Result<(), MapError>;
    fn pan_to(&self, position: LatLng) -> Result<(), MapError>;
    fn fit_bounds(
        &self,
        bounds: LatLngBounds,
        padding_px: u32,
        max_zoom: f64,
    ) -> Result<(), MapError>;
    fn open_info_overlay(&self, handle: u64, html: String) -> Result<(), MapError>;
    fn release(&self);
}

/// Adapts a host surface to the reconciler's [`MapSurface`] seam.
pub struct ForeignSurface {
    inner: Arc<dyn ForeignMapSurface>,
}

impl fmt::Debug for ForeignSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignSurface").finish_non_exhaustive()
    }
}

impl MapSurface for ForeignSurface {
    type Handle = u64;

    fn initialize(&mut self) -> Result<(), MapError> {
        self.inner.initialize()
    }

    fn create_marker(
        &mut self,
        id: &DiveId,
        position: LatLng,
        visual: &MarkerVisual,
    ) -> Result<u64, MapError> {
        self.inner.create_marker(id.clone(), position, visual.clone())
    }

    fn update_marker(&mut self, handle: &u64, visual: &MarkerVisual) -> Result<(), MapError> {
        self.inner.update_marker(*handle, visual.clone())
    }

    fn destroy_marker(&mut self, handle: u64) -> Result<(), MapError> {
        self.inner.destroy_marker(handle)
    }

    fn pan_to(&mut self, position: LatLng) -> Result<(), MapError> {
        self.inner.pan_to(position)
    }

    fn fit_bounds(
        &mut self,
        bounds: LatLngBounds,
        padding_px: u32,
        max_zoom: f64,
    ) -> Result<(), MapError> {
        self.inner.fit_bounds(bounds, padding_px, max_zoom)
    }

    fn open_info_overlay(&mut self, handle: &u64, html: &str) -> Result<(), MapError> {
        self.inner.open_info_overlay(*handle, html.to_string())
    }

    fn release(&mut self) {
        self.inner.release();
    }
}

/// Thread-safe handle on a marker reconciler bound to a host surface.
#[derive(Debug, uniffi::Object)]
pub struct MapController {
    inner: Mutex<MarkerReconciler<ForeignSurface>>,
}

impl MapController {
    fn lock(&self) -> MutexGuard<'_, MarkerReconciler<ForeignSurface>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[uniffi::export]
impl MapController {
    /// Initialize `surface`. Check [`failure`](Self::failure) afterwards; a
    /// failed controller can be retried with [`reinitialize`](Self::reinitialize).
    #[uniffi::constructor]
    pub fn new(surface: Arc<dyn ForeignMapSurface>, config: MapConfig) -> Result<Arc<Self>, MapError> {
        config.validate()?;
        let reconciler = MarkerReconciler::new(ForeignSurface { inner: surface }, config);
        Ok(Arc::new(Self {
            inner: Mutex::new(reconciler),
        }))
    }

    pub fn reconcile(&self, records: Vec<DiveRecord>) -> Result<ReconcileSummary, MapError> {
        self.lock().reconcile(&records)
    }

    pub fn set_selected(&self, id: Option<DiveId>) -> Result<(), MapError> {
        self.lock().set_selected(id.as_ref())
    }

    pub fn selected(&self) -> Option<DiveId> {
        self.lock().selected().cloned()
    }

    /// The dive behind a clicked marker, if the handle is live.
    pub fn marker_clicked(&self, handle: u64) -> Option<DiveId> {
        self.lock()
            .marker_clicked(&handle)
            .map(|MapEvent::MarkerClicked { id }| id)
    }

    pub fn open_info(&self, id: DiveId) -> Result<bool, MapError> {
        self.lock().open_info(&id)
    }

    pub fn live_marker_count(&self) -> u32 {
        u32::try_from(self.lock().live_count()).unwrap_or(u32::MAX)
    }

    pub fn is_ready(&self) -> bool {
        self.lock().is_ready()
    }

    /// Message of the fatal surface error awaiting a retry, if any.
    pub fn failure(&self) -> Option<String> {
        self.lock().failure().map(ToString::to_string)
    }

    pub fn reinitialize(&self) -> Result<(), MapError> {
        self.lock().reinitialize()
    }

    pub fn dispose(&self) {
        self.lock().dispose();
    }
}

#[uniffi::export]
pub fn default_map_config() -> MapConfig {
    MapConfig::default()
}

/// Load the map configuration from an optional TOML file and the environment.
#[uniffi::export]
pub fn load_map_config(path: Option<String>) -> Result<MapConfig, MapError> {
    let config = Config::load_from(path.as_deref().map(Path::new))?;
    Ok(config.map)
}

#[uniffi::export]
pub fn build_marker_visual(record: DiveRecord, selected: bool, style: MarkerStyle) -> MarkerVisual {
    marker_visual(&record, selected, &style)
}

#[uniffi::export]
pub fn marker_html(visual: MarkerVisual) -> String {
    render_marker_html(&visual)
}

#[uniffi::export]
pub fn info_overlay_content(record: DiveRecord) -> String {
    info_overlay_html(&record)
}

#[uniffi::export]
pub fn parse_location_text(text: String) -> Result<LatLng, CoordinateError> {
    parse_coordinates(&text)
}

#[uniffi::export]
pub fn enable_logging(verbosity: Verbosity) {
    init_logging(verbosity);
}
