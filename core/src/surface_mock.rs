use std::collections::{BTreeMap, HashSet};

use crate::config::MapConfig;
use crate::error::MapError;
use crate::geo::{fit_zoom, LatLng, LatLngBounds};
use crate::models::DiveId;
use crate::surface::MapSurface;
use crate::visual::MarkerVisual;

/// Every command the mock surface accepted, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceCommand {
    Initialize,
    CreateMarker { handle: u64, id: DiveId },
    UpdateMarker { handle: u64, selected: bool },
    DestroyMarker { handle: u64 },
    PanTo(LatLng),
    FitBounds {
        bounds: LatLngBounds,
        max_zoom: f64,
        zoom: f64,
    },
    OpenInfoOverlay { handle: u64 },
    Release,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MockMarker {
    pub id: DiveId,
    pub position: LatLng,
    pub visual: MarkerVisual,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MockViewport {
    pub center: LatLng,
    pub zoom: f64,
}

/// In-memory map surface for tests and headless hosts.
#[derive(Clone, Debug)]
pub struct MockMapSurface {
    pub markers: BTreeMap<u64, MockMarker>,
    pub commands: Vec<SurfaceCommand>,
    pub viewport: Option<MockViewport>,
    pub info_overlay: Option<(u64, String)>,
    pub released: bool,
    /// Error returned by the next `initialize` call.
    pub fail_initialize: Option<MapError>,
    /// Dives whose marker creation fails with a draw error.
    pub fail_create: HashSet<DiveId>,
    /// Dives whose marker rejects restyling with a draw error.
    pub fail_update: HashSet<DiveId>,
    /// Dives whose marker rejects removal with a draw error.
    pub fail_destroy: HashSet<DiveId>,
    /// When set, every call after initialization returns this error.
    pub fail_all: Option<MapError>,
    width_px: u32,
    height_px: u32,
    min_zoom: f64,
    next_handle: u64,
}

impl Default for MockMapSurface {
    fn default() -> Self {
        Self::new(&MapConfig::default())
    }
}

impl MockMapSurface {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            markers: BTreeMap::new(),
            commands: Vec::new(),
            viewport: None,
            info_overlay: None,
            released: false,
            fail_initialize: None,
            fail_create: HashSet::new(),
            fail_update: HashSet::new(),
            fail_destroy: HashSet::new(),
            fail_all: None,
            width_px: config.viewport_width_px,
            height_px: config.viewport_height_px,
            min_zoom: config.min_zoom,
            next_handle: 1,
        }
    }

    pub fn marker_ids(&self) -> Vec<DiveId> {
        let mut ids: Vec<DiveId> = self.markers.values().map(|m| m.id.clone()).collect();
        ids.sort();
        ids
    }

    pub fn marker_for(&self, id: &DiveId) -> Option<&MockMarker> {
        self.markers.values().find(|m| &m.id == id)
    }

    pub fn selected_count(&self) -> usize {
        self.markers.values().filter(|m| m.visual.selected).count()
    }

    pub fn count_commands(&self, pred: impl Fn(&SurfaceCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    fn check_marker(&self, handle: u64, failing: &HashSet<DiveId>) -> Result<(), MapError> {
        match self.markers.get(&handle) {
            Some(marker) if failing.contains(&marker.id) => Err(MapError::Draw {
                message: format!("marker {} is busy", marker.id),
            }),
            _ => Ok(()),
        }
    }

    fn check(&self) -> Result<(), MapError> {
        if self.released {
            return Err(MapError::StaleSurface);
        }
        match &self.fail_all {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl MapSurface for MockMapSurface {
    type Handle = u64;

    fn initialize(&mut self) -> Result<(), MapError> {
        if let Some(err) = self.fail_initialize.take() {
            return Err(err);
        }
        self.released = false;
        self.fail_all = None;
        self.markers.clear();
        self.info_overlay = None;
        self.commands.push(SurfaceCommand::Initialize);
        Ok(())
    }

    fn create_marker(
        &mut self,
        id: &DiveId,
        position: LatLng,
        visual: &MarkerVisual,
    ) -> Result<Self::Handle, MapError> {
        self.check()?;
        if self.fail_create.contains(id) {
            return Err(MapError::MarkerCreate {
                id: id.to_string(),
                message: "thumbnail failed to load".to_string(),
            });
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.markers.insert(
            handle,
            MockMarker {
                id: id.clone(),
                position,
                visual: visual.clone(),
            },
        );
        self.commands.push(SurfaceCommand::CreateMarker {
            handle,
            id: id.clone(),
        });
        Ok(handle)
    }

    fn update_marker(
        &mut self,
        handle: &Self::Handle,
        visual: &MarkerVisual,
    ) -> Result<(), MapError> {
        self.check()?;
        self.check_marker(*handle, &self.fail_update)?;
        let marker = self.markers.get_mut(handle).ok_or_else(|| MapError::Draw {
            message: format!("unknown marker handle {handle}"),
        })?;
        marker.visual = visual.clone();
        self.commands.push(SurfaceCommand::UpdateMarker {
            handle: *handle,
            selected: visual.selected,
        });
        Ok(())
    }

    fn destroy_marker(&mut self, handle: Self::Handle) -> Result<(), MapError> {
        self.check()?;
        self.check_marker(handle, &self.fail_destroy)?;
        self.markers.remove(&handle);
        if matches!(self.info_overlay, Some((open, _)) if open == handle) {
            self.info_overlay = None;
        }
        self.commands.push(SurfaceCommand::DestroyMarker { handle });
        Ok(())
    }

    fn pan_to(&mut self, position: LatLng) -> Result<(), MapError> {
        self.check()?;
        let zoom = self.viewport.as_ref().map_or(self.min_zoom, |v| v.zoom);
        self.viewport = Some(MockViewport {
            center: position,
            zoom,
        });
        self.commands.push(SurfaceCommand::PanTo(position));
        Ok(())
    }

    fn fit_bounds(
        &mut self,
        bounds: LatLngBounds,
        padding_px: u32,
        max_zoom: f64,
    ) -> Result<(), MapError> {
        self.check()?;
        let zoom = fit_zoom(
            &bounds,
            self.width_px,
            self.height_px,
            padding_px,
            self.min_zoom.min(max_zoom),
            max_zoom,
        );
        self.viewport = Some(MockViewport {
            center: bounds.center(),
            zoom,
        });
        self.commands.push(SurfaceCommand::FitBounds {
            bounds,
            max_zoom,
            zoom,
        });
        Ok(())
    }

    fn open_info_overlay(&mut self, handle: &Self::Handle, html: &str) -> Result<(), MapError> {
        self.check()?;
        if !self.markers.contains_key(handle) {
            return Err(MapError::Draw {
                message: format!("unknown marker handle {handle}"),
            });
        }
        self.info_overlay = Some((*handle, html.to_string()));
        self.commands
            .push(SurfaceCommand::OpenInfoOverlay { handle: *handle });
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.markers.clear();
        self.info_overlay = None;
        self.commands.push(SurfaceCommand::Release);
    }
}
