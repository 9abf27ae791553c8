//! Keeps a map surface's markers in sync with a list of dives.
//!
//! The reconciler exclusively owns the live marker set: one entry per visible
//! dive, holding the surface handle, the dive snapshot the marker was drawn
//! from, and whether it is currently drawn in the selected style. Callers pass
//! the complete dive list on every change and the reconciler diffs it against
//! the live set.
//!
//! Calls must be serialized by the caller (a single UI event loop does this
//! naturally); nothing here blocks or spawns.

use std::collections::{HashMap, HashSet};

use tracing::{debug, error, info, trace, warn};

use crate::config::MapConfig;
use crate::error::MapError;
use crate::geo::LatLngBounds;
use crate::info::info_overlay_html;
use crate::models::{DiveId, DiveRecord};
use crate::surface::MapSurface;
use crate::visual::marker_visual;

/// Domain event produced by user interaction with the surface.
#[derive(Clone, Debug, PartialEq)]
pub enum MapEvent {
    MarkerClicked { id: DiveId },
}

/// Outcome of a single `reconcile` call.
#[derive(Clone, Debug, Default, PartialEq, uniffi::Record)]
pub struct ReconcileSummary {
    pub created: u32,
    pub removed: u32,
    pub retained: u32,
    /// Dives whose marker could not be created; retried on the next call.
    pub failed: Vec<DiveId>,
}

#[derive(Debug)]
struct MarkerEntry<H> {
    handle: H,
    record: DiveRecord,
    selected: bool,
}

#[derive(Clone, Debug, PartialEq)]
enum SurfaceState {
    Ready,
    Failed(MapError),
    Disposed,
}

/// Whether an operation may keep issuing surface commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

#[derive(Debug)]
pub struct MarkerReconciler<S: MapSurface> {
    surface: S,
    config: MapConfig,
    markers: HashMap<DiveId, MarkerEntry<S::Handle>>,
    selected: Option<DiveId>,
    state: SurfaceState,
}

impl<S: MapSurface> MarkerReconciler<S> {
    /// Attach to a surface and initialize it.
    ///
    /// An initialization failure does not prevent construction; the
    /// reconciler starts in the failed state, reports the error through
    /// [`failure`](Self::failure) and refuses work until
    /// [`reinitialize`](Self::reinitialize) succeeds.
    pub fn new(mut surface: S, config: MapConfig) -> Self {
        let state = match surface.initialize() {
            Ok(()) => {
                info!("map surface initialized");
                SurfaceState::Ready
            }
            Err(err) => {
                error!(error = %err, "map surface failed to initialize");
                SurfaceState::Failed(err)
            }
        };
        Self {
            surface,
            config,
            markers: HashMap::new(),
            selected: None,
            state,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == SurfaceState::Ready
    }

    pub fn is_disposed(&self) -> bool {
        self.state == SurfaceState::Disposed
    }

    /// The fatal error that put the reconciler in the failed state, if any.
    pub fn failure(&self) -> Option<&MapError> {
        match &self.state {
            SurfaceState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn selected(&self) -> Option<&DiveId> {
        self.selected.as_ref()
    }

    pub fn live_count(&self) -> usize {
        self.markers.len()
    }

    pub fn contains(&self, id: &DiveId) -> bool {
        self.markers.contains_key(id)
    }

    /// Ids of every live marker, sorted.
    pub fn live_ids(&self) -> Vec<DiveId> {
        let mut ids: Vec<DiveId> = self.markers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn handle_for(&self, id: &DiveId) -> Option<&S::Handle> {
        self.markers.get(id).map(|entry| &entry.handle)
    }

    /// Ids currently drawn in the selected style.
    pub fn selected_visuals(&self) -> Vec<DiveId> {
        self.markers
            .iter()
            .filter(|(_, entry)| entry.selected)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Align the live marker set with `records` and frame them.
    ///
    /// Markers for dives already on the map are left untouched. Dives whose
    /// marker fails to draw are reported in the summary and stay absent, so the
    /// next call retries them. Duplicate ids are drawn once.
    pub fn reconcile(&mut self, records: &[DiveRecord]) -> Result<ReconcileSummary, MapError> {
        let mut summary = ReconcileSummary::default();
        if !self.ensure_ready()? {
            return Ok(summary);
        }

        let wanted: HashSet<&DiveId> = records.iter().map(|record| &record.id).collect();
        let stale: Vec<DiveId> = self
            .markers
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();

        for id in stale {
            let Some(entry) = self.markers.remove(&id) else {
                continue;
            };
            if self.selected.as_ref() == Some(&id) {
                self.selected = None;
            }
            trace!(dive_id = %id, "destroying marker");
            match self.surface.destroy_marker(entry.handle.clone()) {
                Ok(()) => summary.removed += 1,
                Err(err) if err.is_fatal() || err == MapError::StaleSurface => {
                    if self.absorb(err)? == Flow::Stop {
                        return Ok(summary);
                    }
                }
                Err(err) => {
                    // Still on the surface, so keep tracking it for the next pass.
                    warn!(dive_id = %id, error = %err, "marker removal failed, will retry on next reconcile");
                    self.markers.insert(id, entry);
                }
            }
        }

        let mut seen: HashSet<&DiveId> = HashSet::with_capacity(records.len());
        for record in records {
            if !seen.insert(&record.id) {
                continue;
            }
            if self.markers.contains_key(&record.id) {
                summary.retained += 1;
                continue;
            }

            let visual = marker_visual(record, false, &self.config.marker);
            match self
                .surface
                .create_marker(&record.id, record.position(), &visual)
            {
                Ok(handle) => {
                    trace!(dive_id = %record.id, "created marker");
                    self.markers.insert(
                        record.id.clone(),
                        MarkerEntry {
                            handle,
                            record: record.clone(),
                            selected: false,
                        },
                    );
                    summary.created += 1;
                }
                Err(err) if err.is_fatal() || err == MapError::StaleSurface => {
                    if self.absorb(err)? == Flow::Stop {
                        return Ok(summary);
                    }
                }
                Err(err) => {
                    warn!(dive_id = %record.id, error = %err, "marker creation failed, will retry on next reconcile");
                    summary.failed.push(record.id.clone());
                }
            }
        }

        if let Some(bounds) = LatLngBounds::from_points(records.iter().map(DiveRecord::position)) {
            debug!(
                south = bounds.south_west.lat,
                west = bounds.south_west.lng,
                north = bounds.north_east.lat,
                east = bounds.north_east.lng,
                max_zoom = self.config.max_zoom,
                "framing markers"
            );
            if let Err(err) = self.surface.fit_bounds(
                bounds,
                self.config.fit_padding_px,
                self.config.max_zoom,
            ) {
                if self.absorb(err)? == Flow::Stop {
                    return Ok(summary);
                }
            }
        }

        debug!(
            created = summary.created,
            removed = summary.removed,
            retained = summary.retained,
            failed = summary.failed.len(),
            "reconciled markers"
        );
        Ok(summary)
    }

    /// Make `id` the single selected marker, or clear the selection.
    ///
    /// Markers left in the selected style are restored to normal. The newly
    /// selected marker is restyled and the map pans (without zooming) to it.
    /// While any other marker is still drawn selected the highlight is held
    /// back. An id with no live marker clears the selection and pans nowhere.
    pub fn set_selected(&mut self, id: Option<&DiveId>) -> Result<(), MapError> {
        if !self.ensure_ready()? {
            return Ok(());
        }

        let next = id.filter(|id| self.markers.contains_key(*id)).cloned();
        if let (Some(requested), None) = (id, &next) {
            debug!(dive_id = %requested, "selected dive has no marker, clearing selection");
        }

        let mut to_clear: Vec<DiveId> = self.selected_visuals();
        if let Some(previous) = &self.selected {
            if !to_clear.contains(previous) && self.markers.contains_key(previous) {
                to_clear.push(previous.clone());
            }
        }
        to_clear.retain(|stale| Some(stale) != next.as_ref());
        self.selected = None;

        for stale in to_clear {
            if self.restyle(&stale, false)? == Flow::Stop {
                return Ok(());
            }
        }

        let Some(next) = next else {
            return Ok(());
        };
        self.selected = Some(next.clone());

        let still_selected: Vec<DiveId> = self
            .selected_visuals()
            .into_iter()
            .filter(|other| other != &next)
            .collect();
        let already_styled = self
            .markers
            .get(&next)
            .is_some_and(|entry| entry.selected);
        if !still_selected.is_empty() {
            // Two selected markers must never be drawn at once; the next call
            // retries both restyles.
            warn!(dive_id = %next, stuck = ?still_selected, "previous selection still drawn, deferring highlight");
        } else if !already_styled && self.restyle(&next, true)? == Flow::Stop {
            return Ok(());
        }

        if let Some(entry) = self.markers.get(&next) {
            let position = entry.record.position();
            debug!(dive_id = %next, lat = position.lat, lng = position.lng, "panning to selected dive");
            if let Err(err) = self.surface.pan_to(position) {
                self.absorb(err)?;
            }
        }
        Ok(())
    }

    /// Open the info overlay for a live marker. Returns whether it was opened.
    pub fn open_info(&mut self, id: &DiveId) -> Result<bool, MapError> {
        if !self.ensure_ready()? {
            return Ok(false);
        }
        let Some(entry) = self.markers.get(id) else {
            return Ok(false);
        };
        let html = info_overlay_html(&entry.record);
        match self.surface.open_info_overlay(&entry.handle, &html) {
            Ok(()) => Ok(true),
            Err(err) => {
                self.absorb(err)?;
                Ok(false)
            }
        }
    }

    /// Translate a click on a surface marker into a domain event.
    ///
    /// The owning controller decides what to do with it, typically calling
    /// [`set_selected`](Self::set_selected).
    pub fn marker_clicked(&self, handle: &S::Handle) -> Option<MapEvent> {
        if !self.is_ready() {
            return None;
        }
        self.markers
            .iter()
            .find(|(_, entry)| &entry.handle == handle)
            .map(|(id, _)| MapEvent::MarkerClicked { id: id.clone() })
    }

    /// Drop all markers and initialize the surface again.
    ///
    /// This is the retry path after a fatal surface failure. It also revives a
    /// disposed reconciler whose host has rebuilt the underlying surface.
    pub fn reinitialize(&mut self) -> Result<(), MapError> {
        if self.is_ready() {
            self.destroy_all();
        }
        self.markers.clear();
        self.selected = None;

        match self.surface.initialize() {
            Ok(()) => {
                info!("map surface re-initialized");
                self.state = SurfaceState::Ready;
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "map surface failed to re-initialize");
                self.state = SurfaceState::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Destroy every marker and release the surface. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.is_disposed() {
            return;
        }
        if self.is_ready() {
            self.destroy_all();
        }
        self.markers.clear();
        self.selected = None;
        self.surface.release();
        self.state = SurfaceState::Disposed;
        info!("map surface disposed");
    }

    fn destroy_all(&mut self) {
        for (id, entry) in self.markers.drain() {
            if let Err(err) = self.surface.destroy_marker(entry.handle) {
                debug!(dive_id = %id, error = %err, "ignoring marker teardown failure");
            }
        }
    }

    /// `Ok(true)` when work may proceed, `Ok(false)` when disposed.
    fn ensure_ready(&self) -> Result<bool, MapError> {
        match &self.state {
            SurfaceState::Ready => Ok(true),
            SurfaceState::Disposed => {
                trace!("ignoring call on disposed map surface");
                Ok(false)
            }
            SurfaceState::Failed(err) => Err(MapError::NotReady {
                message: err.to_string(),
            }),
        }
    }

    fn restyle(&mut self, id: &DiveId, selected: bool) -> Result<Flow, MapError> {
        let Some(entry) = self.markers.get_mut(id) else {
            return Ok(Flow::Continue);
        };
        let visual = marker_visual(&entry.record, selected, &self.config.marker);
        let result = self.surface.update_marker(&entry.handle, &visual);
        if result.is_ok() {
            entry.selected = selected;
        }
        match result {
            Ok(()) => Ok(Flow::Continue),
            Err(err) => self.absorb(err),
        }
    }

    /// Classify a surface error: stale surfaces stop silently, fatal errors
    /// move to the failed state and propagate, anything else is logged.
    fn absorb(&mut self, err: MapError) -> Result<Flow, MapError> {
        if err == MapError::StaleSurface {
            debug!("map surface torn down mid-operation, discarding pending work");
            self.markers.clear();
            self.selected = None;
            self.state = SurfaceState::Disposed;
            return Ok(Flow::Stop);
        }
        if err.is_fatal() {
            error!(error = %err, "map surface failed");
            self.markers.clear();
            self.selected = None;
            self.state = SurfaceState::Failed(err.clone());
            return Err(err);
        }
        warn!(error = %err, "map draw command failed");
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::init_test_logging;
    use crate::models::fixtures::record;
    use crate::surface_mock::{MockMapSurface, SurfaceCommand};
    use crate::visual::MarkerContent;

    fn id(s: &str) -> DiveId {
        DiveId(s.to_string())
    }

    fn reconciler() -> MarkerReconciler<MockMapSurface> {
        init_test_logging();
        let config = MapConfig::default();
        MarkerReconciler::new(MockMapSurface::new(&config), config)
    }

    fn example_records() -> Vec<DiveRecord> {
        vec![
            record("a", 10.0, 10.0, &[]),
            record("b", 20.0, 20.0, &["p1"]),
        ]
    }

    fn creates(surface: &MockMapSurface) -> usize {
        surface.count_commands(|c| matches!(c, SurfaceCommand::CreateMarker { .. }))
    }

    fn pans(surface: &MockMapSurface) -> usize {
        surface.count_commands(|c| matches!(c, SurfaceCommand::PanTo(_)))
    }

    #[test]
    fn test_reconcile_creates_markers_with_visuals() {
        let mut map = reconciler();
        let summary = map.reconcile(&example_records()).unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(map.live_ids(), vec![id("a"), id("b")]);
        assert_eq!(map.surface().marker_ids(), vec![id("a"), id("b")]);

        let a = map.surface().marker_for(&id("a")).unwrap();
        assert!(matches!(a.visual.content, MarkerContent::DefaultBadge { .. }));
        let b = map.surface().marker_for(&id("b")).unwrap();
        assert!(matches!(
            b.visual.content,
            MarkerContent::Thumbnail {
                photo_count_badge: None,
                ..
            }
        ));
    }

    #[test]
    fn test_reconcile_removes_missing_and_keeps_existing() {
        let mut map = reconciler();
        map.reconcile(&example_records()).unwrap();
        let b_handle = *map.handle_for(&id("b")).unwrap();
        map.surface_mut().clear_commands();

        let summary = map.reconcile(&[record("b", 20.0, 20.0, &["p1"])]).unwrap();

        assert_eq!(summary.removed, 1);
        assert_eq!(summary.retained, 1);
        assert_eq!(summary.created, 0);
        assert_eq!(map.live_ids(), vec![id("b")]);
        assert_eq!(map.handle_for(&id("b")), Some(&b_handle));
        assert_eq!(creates(map.surface()), 0);
        assert_eq!(
            map.surface()
                .count_commands(|c| matches!(c, SurfaceCommand::UpdateMarker { .. })),
            0
        );
    }

    #[test]
    fn test_reconcile_is_idempotent_but_reframes() {
        let mut map = reconciler();
        let records = example_records();
        map.reconcile(&records).unwrap();
        map.surface_mut().clear_commands();

        let summary = map.reconcile(&records).unwrap();

        assert_eq!(summary.created, 0);
        assert_eq!(summary.removed, 0);
        assert_eq!(summary.retained, 2);
        assert_eq!(creates(map.surface()), 0);
        assert_eq!(
            map.surface()
                .count_commands(|c| matches!(c, SurfaceCommand::FitBounds { .. })),
            1
        );
    }

    #[test]
    fn test_live_set_matches_input_across_sequences() {
        let mut map = reconciler();
        let sequences: Vec<Vec<DiveRecord>> = vec![
            vec![record("a", 1.0, 1.0, &[]), record("b", 2.0, 2.0, &[])],
            vec![record("c", 3.0, 3.0, &[])],
            vec![
                record("a", 1.0, 1.0, &[]),
                record("c", 3.0, 3.0, &[]),
                record("d", 4.0, 4.0, &["p"]),
            ],
            vec![],
            vec![record("e", 5.0, 5.0, &[]), record("e", 5.0, 5.0, &[])],
        ];

        for records in sequences {
            map.reconcile(&records).unwrap();
            let mut expected: Vec<DiveId> = records.iter().map(|r| r.id.clone()).collect();
            expected.sort();
            expected.dedup();
            assert_eq!(map.live_ids(), expected);
            assert_eq!(map.surface().marker_ids(), expected);
        }
    }

    #[test]
    fn test_reconcile_empty_list_clears_without_framing() {
        let mut map = reconciler();
        map.reconcile(&example_records()).unwrap();
        map.surface_mut().clear_commands();

        let summary = map.reconcile(&[]).unwrap();

        assert_eq!(summary.removed, 2);
        assert_eq!(map.live_count(), 0);
        assert_eq!(
            map.surface()
                .count_commands(|c| matches!(c, SurfaceCommand::FitBounds { .. })),
            0
        );
    }

    #[test]
    fn test_framing_covers_bounds_and_respects_max_zoom() {
        let mut map = reconciler();
        map.reconcile(&example_records()).unwrap();

        let fit = map.surface().commands.iter().rev().find_map(|c| match c {
            SurfaceCommand::FitBounds {
                bounds,
                max_zoom,
                zoom,
            } => Some((*bounds, *max_zoom, *zoom)),
            _ => None,
        });
        let (bounds, max_zoom, zoom) = fit.unwrap();
        assert_eq!(bounds.south_west.lat, 10.0);
        assert_eq!(bounds.north_east.lng, 20.0);
        assert_eq!(max_zoom, 15.0);
        assert!(zoom <= 15.0);

        // All dives at one spot would zoom forever without the cap.
        map.reconcile(&[record("x", 5.0, 5.0, &[]), record("y", 5.0, 5.0, &[])])
            .unwrap();
        let viewport = map.surface().viewport.clone().unwrap();
        assert_eq!(viewport.zoom, 15.0);
        assert_eq!(viewport.center.lat, 5.0);
    }

    #[test]
    fn test_set_selected_restyles_and_pans() {
        let mut map = reconciler();
        map.reconcile(&example_records()).unwrap();
        map.surface_mut().clear_commands();
        let zoom_before = map.surface().viewport.as_ref().map(|v| v.zoom);

        map.set_selected(Some(&id("b"))).unwrap();

        assert_eq!(map.selected(), Some(&id("b")));
        assert_eq!(map.surface().selected_count(), 1);
        assert!(map.surface().marker_for(&id("b")).unwrap().visual.selected);
        assert_eq!(pans(map.surface()), 1);
        assert!(map
            .surface()
            .commands
            .contains(&SurfaceCommand::PanTo(record("b", 20.0, 20.0, &[]).position())));
        assert_eq!(map.surface().viewport.as_ref().map(|v| v.zoom), zoom_before);
    }

    #[test]
    fn test_selection_is_exclusive() {
        let mut map = reconciler();
        map.reconcile(&[
            record("a", 1.0, 1.0, &[]),
            record("b", 2.0, 2.0, &[]),
            record("c", 3.0, 3.0, &[]),
        ])
        .unwrap();

        for next in ["a", "b", "c", "b", "a"] {
            map.set_selected(Some(&id(next))).unwrap();
            assert_eq!(map.surface().selected_count(), 1);
            assert_eq!(map.selected_visuals(), vec![id(next)]);
        }

        map.set_selected(None).unwrap();
        assert_eq!(map.surface().selected_count(), 0);
        assert_eq!(map.selected(), None);
    }

    #[test]
    fn test_selecting_absent_id_clears_without_pan() {
        let mut map = reconciler();
        map.reconcile(&[record("b", 20.0, 20.0, &["p1"])]).unwrap();
        map.set_selected(Some(&id("b"))).unwrap();
        map.surface_mut().clear_commands();

        map.set_selected(Some(&id("a"))).unwrap();

        assert_eq!(map.selected(), None);
        assert_eq!(map.surface().selected_count(), 0);
        assert!(!map.surface().marker_for(&id("b")).unwrap().visual.selected);
        assert_eq!(pans(map.surface()), 0);
    }

    #[test]
    fn test_reselecting_same_marker_only_pans() {
        let mut map = reconciler();
        map.reconcile(&example_records()).unwrap();
        map.set_selected(Some(&id("a"))).unwrap();
        map.surface_mut().clear_commands();

        map.set_selected(Some(&id("a"))).unwrap();

        assert_eq!(
            map.surface()
                .count_commands(|c| matches!(c, SurfaceCommand::UpdateMarker { .. })),
            0
        );
        assert_eq!(pans(map.surface()), 1);
        assert_eq!(map.surface().selected_count(), 1);
    }

    #[test]
    fn test_removing_selected_dive_clears_selection() {
        let mut map = reconciler();
        map.reconcile(&example_records()).unwrap();
        map.set_selected(Some(&id("a"))).unwrap();

        map.reconcile(&[record("b", 20.0, 20.0, &["p1"])]).unwrap();

        assert_eq!(map.selected(), None);
        assert_eq!(map.surface().selected_count(), 0);
    }

    #[test]
    fn test_failed_removal_is_retried_on_next_reconcile() {
        let mut map = reconciler();
        map.reconcile(&example_records()).unwrap();
        map.surface_mut().fail_destroy.insert(id("a"));

        let only_b = [record("b", 20.0, 20.0, &["p1"])];
        let summary = map.reconcile(&only_b).unwrap();
        assert_eq!(summary.removed, 0);
        assert!(map.is_ready());
        assert_eq!(map.live_ids(), map.surface().marker_ids());

        map.surface_mut().fail_destroy.clear();
        let summary = map.reconcile(&only_b).unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(map.live_ids(), vec![id("b")]);
        assert_eq!(map.surface().marker_ids(), vec![id("b")]);
    }

    #[test]
    fn test_failed_unselect_never_leaves_two_selected() {
        let mut map = reconciler();
        map.reconcile(&example_records()).unwrap();
        map.set_selected(Some(&id("a"))).unwrap();
        map.surface_mut().fail_update.insert(id("a"));

        map.set_selected(Some(&id("b"))).unwrap();
        assert_eq!(map.surface().selected_count(), 1);
        assert!(!map.surface().marker_for(&id("b")).unwrap().visual.selected);
        assert_eq!(map.selected(), Some(&id("b")));

        map.surface_mut().fail_update.clear();
        map.set_selected(Some(&id("b"))).unwrap();
        assert_eq!(map.surface().selected_count(), 1);
        assert!(map.surface().marker_for(&id("b")).unwrap().visual.selected);
        assert_eq!(map.selected_visuals(), vec![id("b")]);
    }

    #[test]
    fn test_failed_marker_is_retried_on_next_reconcile() {
        let mut map = reconciler();
        map.surface_mut().fail_create.insert(id("b"));

        let summary = map.reconcile(&example_records()).unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, vec![id("b")]);
        assert_eq!(map.live_ids(), vec![id("a")]);
        assert!(map.is_ready());

        map.surface_mut().fail_create.clear();
        let summary = map.reconcile(&example_records()).unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.retained, 1);
        assert!(summary.failed.is_empty());
        assert_eq!(map.live_ids(), vec![id("a"), id("b")]);
    }

    #[test]
    fn test_initialization_failure_blocks_until_reinitialized() {
        init_test_logging();
        let config = MapConfig::default();
        let mut surface = MockMapSurface::new(&config);
        surface.fail_initialize = Some(MapError::SurfaceInit {
            message: "missing api key".to_string(),
        });
        let mut map = MarkerReconciler::new(surface, config);

        assert!(!map.is_ready());
        assert!(matches!(map.failure(), Some(MapError::SurfaceInit { .. })));
        assert!(matches!(
            map.reconcile(&example_records()),
            Err(MapError::NotReady { .. })
        ));
        assert!(matches!(
            map.set_selected(Some(&id("a"))),
            Err(MapError::NotReady { .. })
        ));
        assert_eq!(map.surface().markers.len(), 0);

        map.reinitialize().unwrap();
        assert!(map.is_ready());
        assert!(map.failure().is_none());
        assert_eq!(map.reconcile(&example_records()).unwrap().created, 2);
    }

    #[test]
    fn test_fatal_draw_failure_moves_to_failed_state() {
        let mut map = reconciler();
        map.reconcile(&example_records()).unwrap();
        map.surface_mut().fail_all = Some(MapError::SurfaceLost {
            message: "webgl context lost".to_string(),
        });

        let result = map.reconcile(&[record("c", 1.0, 1.0, &[])]);
        assert!(matches!(result, Err(MapError::SurfaceLost { .. })));
        assert_eq!(map.live_count(), 0);
        assert!(matches!(
            map.reconcile(&example_records()),
            Err(MapError::NotReady { .. })
        ));

        map.reinitialize().unwrap();
        map.reconcile(&example_records()).unwrap();
        assert_eq!(map.live_ids(), vec![id("a"), id("b")]);
    }

    #[test]
    fn test_stale_surface_is_discarded_silently() {
        let mut map = reconciler();
        map.surface_mut().fail_all = Some(MapError::StaleSurface);

        let summary = map.reconcile(&example_records()).unwrap();
        assert_eq!(summary.created, 0);
        assert!(map.is_disposed());
        assert_eq!(map.live_count(), 0);

        assert!(map.reconcile(&example_records()).is_ok());
        assert!(map.set_selected(Some(&id("a"))).is_ok());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut map = reconciler();
        map.reconcile(&example_records()).unwrap();
        map.set_selected(Some(&id("a"))).unwrap();

        map.dispose();
        map.dispose();

        assert!(map.is_disposed());
        assert_eq!(map.live_count(), 0);
        assert_eq!(map.selected(), None);
        assert!(map.surface().released);
        assert_eq!(
            map.surface()
                .count_commands(|c| matches!(c, SurfaceCommand::Release)),
            1
        );
        assert_eq!(
            map.surface()
                .count_commands(|c| matches!(c, SurfaceCommand::DestroyMarker { .. })),
            2
        );

        let summary = map.reconcile(&example_records()).unwrap();
        assert_eq!(summary, ReconcileSummary::default());
        assert!(map.set_selected(Some(&id("a"))).is_ok());
        assert_eq!(map.open_info(&id("a")), Ok(false));
    }

    #[test]
    fn test_marker_click_produces_event() {
        let mut map = reconciler();
        map.reconcile(&example_records()).unwrap();
        let handle = *map.handle_for(&id("b")).unwrap();

        assert_eq!(
            map.marker_clicked(&handle),
            Some(MapEvent::MarkerClicked { id: id("b") })
        );
        assert_eq!(map.marker_clicked(&9_999), None);

        if let Some(MapEvent::MarkerClicked { id: clicked }) = map.marker_clicked(&handle) {
            map.set_selected(Some(&clicked)).unwrap();
        }
        assert_eq!(map.selected(), Some(&id("b")));
    }

    #[test]
    fn test_open_info_overlay() {
        let mut map = reconciler();
        map.reconcile(&example_records()).unwrap();

        assert_eq!(map.open_info(&id("b")), Ok(true));
        let (handle, html) = map.surface().info_overlay.clone().unwrap();
        assert_eq!(Some(&handle), map.handle_for(&id("b")));
        assert!(html.contains("Site b"));

        assert_eq!(map.open_info(&id("missing")), Ok(false));
    }
}
