use std::fmt::Debug;

use crate::error::MapError;
use crate::geo::{LatLng, LatLngBounds};
use crate::models::DiveId;
use crate::visual::MarkerVisual;

/// Commands a map SDK must support for the marker reconciler.
///
/// Draw calls are fire-and-forget from the reconciler's side: an `Ok` means
/// the command was accepted, not that the frame has been painted. A surface
/// that has been torn down answers every call with [`MapError::StaleSurface`].
pub trait MapSurface {
    type Handle: Clone + Debug + PartialEq;

    fn initialize(&mut self) -> Result<(), MapError>;

    fn create_marker(
        &mut self,
        id: &DiveId,
        position: LatLng,
        visual: &MarkerVisual,
    ) -> Result<Self::Handle, MapError>;
    fn update_marker(&mut self, handle: &Self::Handle, visual: &MarkerVisual)
        -> Result<(), MapError>;
    fn destroy_marker(&mut self, handle: Self::Handle) -> Result<(), MapError>;

    /// Center the map on `position` without changing zoom.
    fn pan_to(&mut self, position: LatLng) -> Result<(), MapError>;
    /// Frame `bounds`, never zooming in past `max_zoom`.
    fn fit_bounds(
        &mut self,
        bounds: LatLngBounds,
        padding_px: u32,
        max_zoom: f64,
    ) -> Result<(), MapError>;
    fn open_info_overlay(&mut self, handle: &Self::Handle, html: &str) -> Result<(), MapError>;

    /// Release the surface. Must tolerate being called more than once.
    fn release(&mut self);
}
