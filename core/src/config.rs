//! Configuration for the dive map.
//!
//! Configuration is loaded with figment, in order of precedence (highest first):
//! 1. Environment variables prefixed with `DIVELOG_MAP_`, nested keys split on
//!    `__` (for example `DIVELOG_MAP_MAP__MAX_ZOOM=14`)
//! 2. An optional TOML file
//! 3. Default values

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "DIVELOG_MAP_";

/// Highest zoom level any supported map SDK renders.
const MAX_SUPPORTED_ZOOM: f64 = 22.0;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Map surface and marker configuration.
    pub map: MapConfig,
    /// Photo upload limits.
    pub uploads: UploadPolicy,
}

/// Map surface and marker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, uniffi::Record)]
#[serde(default)]
pub struct MapConfig {
    /// Framing never zooms in past this level, even for a single dive.
    pub max_zoom: f64,
    /// Framing never zooms out past this level.
    pub min_zoom: f64,
    /// Padding around framed markers, in pixels.
    pub fit_padding_px: u32,
    /// Viewport size assumed by surfaces that compute zoom themselves.
    pub viewport_width_px: u32,
    pub viewport_height_px: u32,
    /// Marker appearance.
    pub marker: MarkerStyle,
}

/// Marker appearance for the normal and selected states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, uniffi::Record)]
#[serde(default)]
pub struct MarkerStyle {
    pub size_px: u32,
    pub selected_size_px: u32,
    pub border_width_px: u32,
    pub selected_border_width_px: u32,
    pub border_color: String,
    pub selected_border_color: String,
    /// Outer highlight ring drawn around the selected marker.
    pub ring_color: String,
    pub ring_width_px: u32,
    /// Background of the photo count badge.
    pub badge_color: String,
    /// Fill of the marker for dives without photos.
    pub default_fill_color: String,
    /// Glyph shown on the marker for dives without photos.
    pub default_glyph: String,
}

/// Limits applied to photo uploads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    pub max_photo_bytes: u64,
    pub max_photos_per_dive: usize,
    pub allowed_content_types: Vec<String>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            max_zoom: 15.0,
            min_zoom: 2.0,
            fit_padding_px: 48,
            viewport_width_px: 1024,
            viewport_height_px: 768,
            marker: MarkerStyle::default(),
        }
    }
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            size_px: 40,
            selected_size_px: 56,
            border_width_px: 2,
            selected_border_width_px: 3,
            border_color: "#ffffff".to_string(),
            selected_border_color: "#0ea5e9".to_string(),
            ring_color: "rgba(14, 165, 233, 0.35)".to_string(),
            ring_width_px: 6,
            badge_color: "#ef4444".to_string(),
            default_fill_color: "#0369a1".to_string(),
            default_glyph: "🤿".to_string(),
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_photo_bytes: 10 * 1024 * 1024,
            max_photos_per_dive: 10,
            allowed_content_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "image/heic".to_string(),
                "image/gif".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load configuration from defaults and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an optional TOML file under the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.map.validate()?;
        self.uploads.validate()
    }
}

impl MapConfig {
    /// Validate the map configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=MAX_SUPPORTED_ZOOM).contains(&self.max_zoom) {
            return Err(invalid(format!(
                "max_zoom ({}) must be between 0 and {MAX_SUPPORTED_ZOOM}",
                self.max_zoom
            )));
        }
        if !(0.0..=self.max_zoom).contains(&self.min_zoom) {
            return Err(invalid(format!(
                "min_zoom ({}) must be between 0 and max_zoom ({})",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.viewport_width_px == 0 || self.viewport_height_px == 0 {
            return Err(invalid("viewport size must be greater than 0".to_string()));
        }
        let shortest_side = self.viewport_width_px.min(self.viewport_height_px);
        if self.fit_padding_px.saturating_mul(2) >= shortest_side {
            return Err(invalid(format!(
                "fit_padding_px ({}) must leave room inside a {}x{} viewport",
                self.fit_padding_px, self.viewport_width_px, self.viewport_height_px
            )));
        }
        self.marker.validate()
    }
}

impl MarkerStyle {
    /// Validate the marker style.
    ///
    /// # Errors
    ///
    /// Returns an error if any sizes are zero or colours are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size_px == 0 {
            return Err(invalid("marker size_px must be greater than 0".to_string()));
        }
        if self.selected_size_px < self.size_px {
            return Err(invalid(format!(
                "selected_size_px ({}) cannot be smaller than size_px ({})",
                self.selected_size_px, self.size_px
            )));
        }
        for (name, value) in [
            ("border_color", &self.border_color),
            ("selected_border_color", &self.selected_border_color),
            ("ring_color", &self.ring_color),
            ("badge_color", &self.badge_color),
            ("default_fill_color", &self.default_fill_color),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(format!("marker {name} must not be empty")));
            }
        }
        Ok(())
    }
}

impl UploadPolicy {
    /// Validate the upload policy.
    ///
    /// # Errors
    ///
    /// Returns an error if any limit is zero or no content types are allowed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_photo_bytes == 0 {
            return Err(invalid("max_photo_bytes must be greater than 0".to_string()));
        }
        if self.max_photos_per_dive == 0 {
            return Err(invalid(
                "max_photos_per_dive must be greater than 0".to_string(),
            ));
        }
        if self.allowed_content_types.is_empty() {
            return Err(invalid(
                "allowed_content_types must list at least one type".to_string(),
            ));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Validation { message }
}
