/*
Mute groups
===========

A group is a set of tracks sharing a mute flag and a volume scalar. A track
belongs to at most one group; assigning it to a new one silently removes it
from the old.

The bank stores membership as fixed bitsets, so group queries on the audio
thread are branch-and-mask work with no allocation. Mute/unmute POLICY lives
in the engine: muting silences the member tracks immediately, unmuting
resumes them at their timeline phase. The bank only answers "who is in this
group and what gain applies".
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{NUM_GROUPS, NUM_TRACKS};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy)]
pub struct Group {
    members: [bool; NUM_TRACKS],
    muted: bool,
    volume: f32,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            members: [false; NUM_TRACKS],
            muted: false,
            volume: 1.0,
        }
    }
}

impl Group {
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn contains(&self, track: usize) -> bool {
        track < NUM_TRACKS && self.members[track]
    }

    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        self.members
            .iter()
            .enumerate()
            .filter(|(_, &m)| m)
            .map(|(i, _)| i)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupBank {
    groups: [Group; NUM_GROUPS],
}

impl GroupBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, index: usize) -> &Group {
        &self.groups[index.min(NUM_GROUPS - 1)]
    }

    /// Add a track to a group, removing it from any other group first.
    pub fn assign(&mut self, track: usize, group: usize) {
        if track >= NUM_TRACKS || group >= NUM_GROUPS {
            return;
        }
        for g in &mut self.groups {
            g.members[track] = false;
        }
        self.groups[group].members[track] = true;
    }

    pub fn remove(&mut self, track: usize) {
        if track >= NUM_TRACKS {
            return;
        }
        for g in &mut self.groups {
            g.members[track] = false;
        }
    }

    pub fn group_of(&self, track: usize) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(track))
    }

    /// Returns true when the mute state actually changed, so the engine can
    /// run the stop/resume transition exactly once per edge.
    pub fn set_muted(&mut self, group: usize, muted: bool) -> bool {
        if group >= NUM_GROUPS {
            return false;
        }
        let changed = self.groups[group].muted != muted;
        self.groups[group].muted = muted;
        changed
    }

    pub fn set_volume(&mut self, group: usize, volume: f32) {
        if group < NUM_GROUPS && volume.is_finite() {
            self.groups[group].volume = volume.clamp(0.0, 2.0);
        }
    }

    /// Gain contribution of group state for one track: 0 while its group is
    /// muted, the group volume otherwise, unity for ungrouped tracks.
    pub fn track_gain(&self, track: usize) -> f32 {
        match self.group_of(track) {
            Some(g) if self.groups[g].muted => 0.0,
            Some(g) => self.groups[g].volume,
            None => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_belongs_to_at_most_one_group() {
        let mut bank = GroupBank::new();
        bank.assign(2, 0);
        bank.assign(2, 3);
        assert_eq!(bank.group_of(2), Some(3));
        assert!(!bank.group(0).contains(2));
    }

    #[test]
    fn muted_group_zeroes_member_gain_only() {
        let mut bank = GroupBank::new();
        bank.assign(0, 1);
        bank.assign(4, 1);
        assert!(bank.set_muted(1, true));
        assert_eq!(bank.track_gain(0), 0.0);
        assert_eq!(bank.track_gain(4), 0.0);
        assert_eq!(bank.track_gain(2), 1.0, "ungrouped tracks are unaffected");
    }

    #[test]
    fn set_muted_reports_edges_not_levels() {
        let mut bank = GroupBank::new();
        assert!(bank.set_muted(0, true));
        assert!(!bank.set_muted(0, true), "repeated mute is not an edge");
        assert!(bank.set_muted(0, false));
    }

    #[test]
    fn group_volume_scales_members_and_clamps() {
        let mut bank = GroupBank::new();
        bank.assign(1, 2);
        bank.set_volume(2, 0.5);
        assert_eq!(bank.track_gain(1), 0.5);
        bank.set_volume(2, 99.0);
        assert_eq!(bank.track_gain(1), 2.0);
        bank.set_volume(2, f32::NAN);
        assert_eq!(bank.track_gain(1), 2.0);
    }

    #[test]
    fn removed_track_returns_to_unity() {
        let mut bank = GroupBank::new();
        bank.assign(3, 0);
        bank.set_muted(0, true);
        bank.remove(3);
        assert_eq!(bank.group_of(3), None);
        assert_eq!(bank.track_gain(3), 1.0);
    }
}
