pub mod config;
pub mod error;
pub mod ffi;
pub mod geo;
pub mod info;
pub mod logging;
pub mod models;
pub mod reconciler;
pub mod store;
pub mod store_mock;
pub mod surface;
pub mod surface_mock;
pub mod visual;

uniffi::setup_scaffolding!("divelog_map");

pub use config::{Config, MapConfig, MarkerStyle, UploadPolicy};
pub use error::{ConfigError, CoordinateError, DiveLogError, MapError};
pub use ffi::{ForeignMapSurface, MapController};
pub use geo::{fit_zoom, parse_coordinates, LatLng, LatLngBounds};
pub use info::info_overlay_html;
pub use logging::{init_logging, Verbosity};
pub use models::{
    DiveDraft, DiveId, DiveRecord, GeoLocation, Photo, PhotoId, PhotoUpload, UserId,
};
pub use reconciler::{MapEvent, MarkerReconciler, ReconcileSummary};
pub use store::{BlobStore, DiveLog, DiveQuery, DiveStore};
pub use surface::MapSurface;
pub use visual::{marker_visual, render_marker_html, HighlightRing, MarkerContent, MarkerVisual};
