use std::collections::BTreeMap;

use crate::circular_queue::CircularQueue;
use crate::color::{ColorPicker, Rgb};
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Seen once
    Tentative,
    /// Matched at least once after creation
    Confirmed,
    /// The run has ended
    Finalized,
    /// Dropped by path cleaning
    FilteredOut,
}

#[derive(Debug, Clone)]
pub struct VehicleTrack {
    pub id: u32,
    /// Latest matched observation, never averaged
    pub fingerprint: Fingerprint,
    pub color: Rgb,
    pub state: TrackState,
    pub hits: u32,
    /// (frame index, position) in arrival order
    pub path: Vec<(usize, GeoPoint)>,
}

impl VehicleTrack {
    #[inline]
    pub fn name(&self) -> String {
        vehicle_name(self.id)
    }

    #[inline]
    pub fn last_frame(&self) -> Option<usize> {
        self.path.last().map(|(frame, _)| *frame)
    }
}

#[inline]
pub fn vehicle_name(id: u32) -> String {
    format!("vehicle_{}", id)
}

/// Identity state of a run: id counter, fingerprints, colors and recency order
#[derive(Debug, Clone)]
pub struct VehicleRegistry {
    next_id: u32,
    tracks: BTreeMap<u32, VehicleTrack>,
    recent: CircularQueue<u32>,
    colors: ColorPicker,
    seed: u64,
}

impl VehicleRegistry {
    pub fn new(lookback: usize, color_seed: u64) -> Self {
        Self {
            next_id: 1,
            tracks: BTreeMap::new(),
            recent: CircularQueue::with_capacity(lookback),
            colors: ColorPicker::new(color_seed),
            seed: color_seed,
        }
    }

    /// Allocates the next id, ids start at 1 and are never reused
    pub fn create(&mut self, fingerprint: Fingerprint) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        let track = VehicleTrack {
            id,
            fingerprint,
            color: self.colors.pick(),
            state: TrackState::Tentative,
            hits: 1,
            path: Vec::new(),
        };

        self.tracks.insert(id, track);
        self.recent.touch(id);

        id
    }

    /// Replaces the stored fingerprint and makes the vehicle the most recent one
    pub fn update(&mut self, id: u32, fingerprint: Fingerprint) -> Result<()> {
        let track = self.tracks.get_mut(&id).ok_or(Error::UnknownVehicle(id))?;

        track.fingerprint = fingerprint;
        track.hits += 1;
        if track.state == TrackState::Tentative {
            track.state = TrackState::Confirmed;
        }

        self.recent.touch(id);

        Ok(())
    }

    /// Lookback window, most recently created-or-updated first
    pub fn recent(&self) -> impl Iterator<Item = &'_ VehicleTrack> {
        self.recent.iter().filter_map(move |id| self.tracks.get(id))
    }

    #[inline]
    pub fn lookback(&self) -> usize {
        self.recent.capacity()
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&VehicleTrack> {
        self.tracks.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: u32) -> Option<&mut VehicleTrack> {
        self.tracks.get_mut(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// In id order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &'_ VehicleTrack> {
        self.tracks.values()
    }

    pub fn finalize(&mut self) {
        for track in self.tracks.values_mut() {
            if matches!(track.state, TrackState::Tentative | TrackState::Confirmed) {
                track.state = TrackState::Finalized;
            }
        }
    }

    pub fn mark_filtered(&mut self, id: u32) -> Result<()> {
        let track = self.tracks.get_mut(&id).ok_or(Error::UnknownVehicle(id))?;
        track.state = TrackState::FilteredOut;

        Ok(())
    }

    /// Forgets everything and restarts ids and colors from scratch
    pub fn reset(&mut self) {
        *self = Self::new(self.lookback(), self.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(v: f32) -> Fingerprint {
        Fingerprint::from(vec![v, 1.0 - v])
    }

    #[test]
    fn ids_are_sequential_from_one() {
        let mut registry = VehicleRegistry::new(4, 0);
        let ids: Vec<_> = (0..6).map(|i| registry.create(fp(i as f32))).collect();

        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn recent_is_bounded_and_ordered_by_update() {
        let mut registry = VehicleRegistry::new(3, 0);
        for i in 0..4 {
            registry.create(fp(i as f32));
        }

        let recent: Vec<_> = registry.recent().map(|t| t.id).collect();
        assert_eq!(recent, vec![4, 3, 2]);

        registry.update(2, fp(0.5)).unwrap();
        let recent: Vec<_> = registry.recent().map(|t| t.id).collect();
        assert_eq!(recent, vec![2, 4, 3]);
    }

    #[test]
    fn update_overwrites_fingerprint_and_confirms() {
        let mut registry = VehicleRegistry::new(4, 0);
        let id = registry.create(fp(0.1));

        assert_eq!(registry.get(id).unwrap().state, TrackState::Tentative);

        registry.update(id, fp(0.9)).unwrap();
        let track = registry.get(id).unwrap();

        assert_eq!(track.fingerprint, fp(0.9));
        assert_eq!(track.state, TrackState::Confirmed);
        assert_eq!(track.hits, 2);
    }

    #[test]
    fn unknown_vehicle() {
        let mut registry = VehicleRegistry::new(4, 0);

        assert!(matches!(
            registry.update(9, fp(0.0)),
            Err(Error::UnknownVehicle(9))
        ));
    }

    #[test]
    fn finalize_keeps_filtered_out() {
        let mut registry = VehicleRegistry::new(4, 0);
        let a = registry.create(fp(0.1));
        let b = registry.create(fp(0.2));

        registry.mark_filtered(b).unwrap();
        registry.finalize();

        assert_eq!(registry.get(a).unwrap().state, TrackState::Finalized);
        assert_eq!(registry.get(b).unwrap().state, TrackState::FilteredOut);
    }

    #[test]
    fn reset_restarts_ids_and_colors() {
        let mut registry = VehicleRegistry::new(4, 7);
        let id = registry.create(fp(0.1));
        let color = registry.get(id).unwrap().color;

        registry.reset();

        assert!(registry.is_empty());
        assert_eq!(registry.create(fp(0.3)), 1);
        assert_eq!(registry.get(1).unwrap().color, color);
    }
}
