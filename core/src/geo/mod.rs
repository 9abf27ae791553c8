//! Geographic primitives for marker placement and viewport framing.
//!
//! Coordinates are WGS84 degrees. Zoom levels follow the Web Mercator tile
//! convention used by every common map SDK: at zoom `z` the world is
//! `256 * 2^z` pixels wide.
//!
//! # Example
//!
//! ```
//! use divelog_map::geo::{fit_zoom, LatLng, LatLngBounds};
//!
//! let bounds = LatLngBounds::from_points([LatLng::new(10.0, 10.0), LatLng::new(20.0, 20.0)])
//!     .expect("two points");
//! let zoom = fit_zoom(&bounds, 1024, 768, 48, 2.0, 15.0);
//! assert!(zoom <= 15.0);
//! ```

pub mod parser;

pub use parser::parse_coordinates;

use std::f64::consts::{LN_2, PI};

/// Width of a single Web Mercator tile in pixels.
const TILE_SIZE_PX: f64 = 256.0;

#[derive(Clone, Copy, Debug, PartialEq, uniffi::Record)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, uniffi::Record)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    /// Degenerate bounds containing a single point.
    pub fn from_point(point: LatLng) -> Self {
        Self {
            south_west: point,
            north_east: point,
        }
    }

    /// Smallest bounds covering every point, or `None` if there are none.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Self::from_point(first);
        for point in points {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, point: LatLng) {
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.south_west.lng = self.south_west.lng.min(point.lng);
        self.north_east.lat = self.north_east.lat.max(point.lat);
        self.north_east.lng = self.north_east.lng.max(point.lng);
    }

    pub fn contains(&self, point: LatLng) -> bool {
        (self.south_west.lat..=self.north_east.lat).contains(&point.lat)
            && (self.south_west.lng..=self.north_east.lng).contains(&point.lng)
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    /// Latitude and longitude extent in degrees.
    pub fn span(&self) -> (f64, f64) {
        (
            self.north_east.lat - self.south_west.lat,
            self.north_east.lng - self.south_west.lng,
        )
    }

    pub fn is_point(&self) -> bool {
        self.south_west == self.north_east
    }
}

/// Mercator-projected latitude in radians, clamped to the renderable band.
fn mercator_lat(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    let rad_x2 = ((1.0 + sin) / (1.0 - sin)).ln() / 2.0;
    rad_x2.clamp(-PI, PI) / 2.0
}

fn zoom_for(map_px: f64, fraction: f64) -> f64 {
    if fraction <= 0.0 {
        return f64::INFINITY;
    }
    (map_px / TILE_SIZE_PX / fraction).ln() / LN_2
}

/// Largest whole zoom level at which `bounds` fits inside a viewport of the
/// given size after padding, clamped to `[min_zoom, max_zoom]`.
///
/// Coincident points have no extent and always resolve to `max_zoom`. A
/// reversed range is normalised and a NaN bound collapses the range onto the
/// other bound.
pub fn fit_zoom(
    bounds: &LatLngBounds,
    width_px: u32,
    height_px: u32,
    padding_px: u32,
    min_zoom: f64,
    max_zoom: f64,
) -> f64 {
    let lo = min_zoom.min(max_zoom);
    let hi = max_zoom.max(min_zoom);
    if lo.is_nan() {
        return 0.0;
    }

    let padding = padding_px.saturating_mul(2);
    let usable_width = f64::from(width_px.saturating_sub(padding).max(1));
    let usable_height = f64::from(height_px.saturating_sub(padding).max(1));

    let lat_fraction =
        (mercator_lat(bounds.north_east.lat) - mercator_lat(bounds.south_west.lat)) / PI;
    let lng_diff = bounds.north_east.lng - bounds.south_west.lng;
    let lng_fraction = if lng_diff < 0.0 { lng_diff + 360.0 } else { lng_diff } / 360.0;

    let zoom = zoom_for(usable_height, lat_fraction).min(zoom_for(usable_width, lng_fraction));
    if zoom.is_nan() {
        return hi;
    }
    zoom.floor().clamp(lo, hi)
}
