//! Derived views over the active roster.
//!
//! Nothing here is cached. Every view is recomputed from the records it is
//! handed, so it cannot drift from the roster it came from.
//!
//! Bed capacity comes from the fixed room table [`ROOMS`]. Rooms outside the
//! table (offices, typos) still show up in occupancy, without a capacity.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{ResidentId, ResidentRecord};

pub const DEFAULT_KITCHEN_SCHEDULE: &str = "Week A";
pub const DEFAULT_MEAL_PREFERENCE: &str = "Halal";

/// Building wing, derived from the first character of the room number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Wing {
    North,
    South,
}

impl Wing {
    pub fn of_room(room: &str) -> Option<Wing> {
        match room.trim().chars().next() {
            Some('1') => Some(Wing::North),
            Some('2') => Some(Wing::South),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Floor {
    Ground,
    First,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Specialization {
    Girls,
    Minors,
    Medical,
}

/// A bedroom with its bed count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSpec {
    pub room: &'static str,
    pub floor: Floor,
    pub max_beds: usize,
    pub specialization: Option<Specialization>,
}

const fn bedroom(room: &'static str, floor: Floor, max_beds: usize) -> RoomSpec {
    RoomSpec {
        room,
        floor,
        max_beds,
        specialization: None,
    }
}

const fn special(
    room: &'static str,
    floor: Floor,
    max_beds: usize,
    specialization: Specialization,
) -> RoomSpec {
    RoomSpec {
        room,
        floor,
        max_beds,
        specialization: Some(specialization),
    }
}

/// Every bedroom of both wings. 1.14 is an office and has no beds.
pub const ROOMS: &[RoomSpec] = &[
    bedroom("1.06", Floor::Ground, 4),
    bedroom("1.07", Floor::Ground, 4),
    bedroom("1.08", Floor::Ground, 4),
    bedroom("1.09", Floor::Ground, 4),
    special("1.15", Floor::First, 1, Specialization::Medical),
    special("1.16", Floor::First, 3, Specialization::Girls),
    special("1.17", Floor::First, 3, Specialization::Girls),
    special("1.18", Floor::First, 3, Specialization::Girls),
    special("1.19", Floor::First, 3, Specialization::Girls),
    bedroom("2.06", Floor::Ground, 4),
    bedroom("2.07", Floor::Ground, 4),
    bedroom("2.08", Floor::Ground, 5),
    bedroom("2.14", Floor::First, 3),
    bedroom("2.15", Floor::First, 3),
    bedroom("2.16", Floor::First, 3),
    bedroom("2.17", Floor::First, 3),
    bedroom("2.18", Floor::First, 3),
    special("2.19", Floor::First, 3, Specialization::Medical),
];

pub fn room_spec(room: &str) -> Option<&'static RoomSpec> {
    let room = room.trim();
    ROOMS.iter().find(|r| r.room == room)
}

/// Beds across all rooms, or one wing's rooms.
pub fn capacity(wing: Option<Wing>) -> usize {
    ROOMS
        .iter()
        .filter(|r| wing.is_none() || Wing::of_room(r.room) == wing)
        .map(|r| r.max_beds)
        .sum()
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part * 100 + whole / 2) / whole) as u32
}

pub fn residents_in_room<'a>(records: &'a [ResidentRecord], room: &str) -> Vec<&'a ResidentRecord> {
    let room = room.trim();
    records.iter().filter(|r| r.room.trim() == room).collect()
}

pub fn residents_in_wing(records: &[ResidentRecord], wing: Wing) -> Vec<&ResidentRecord> {
    records
        .iter()
        .filter(|r| Wing::of_room(&r.room) == Some(wing))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KitchenEntry {
    pub id: ResidentId,
    pub badge: String,
    pub name: String,
    pub room: String,
    pub kitchen_schedule: String,
    pub meal_preference: String,
}

fn extra_str(record: &ResidentRecord, key: &str) -> Option<String> {
    record
        .extra
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Kitchen list, ordered by room then name. Schedule and meal preference come
/// from the resident's local fields when set.
pub fn kitchen_list(records: &[ResidentRecord]) -> Vec<KitchenEntry> {
    let mut entries: Vec<KitchenEntry> = records
        .iter()
        .map(|r| KitchenEntry {
            id: r.id,
            badge: r.badge.clone(),
            name: r.full_name(),
            room: r.room.clone(),
            kitchen_schedule: extra_str(r, "kitchen_schedule")
                .unwrap_or_else(|| DEFAULT_KITCHEN_SCHEDULE.to_string()),
            meal_preference: extra_str(r, "meal_preference")
                .unwrap_or_else(|| DEFAULT_MEAL_PREFERENCE.to_string()),
        })
        .collect();
    entries.sort_by(|a, b| a.room.cmp(&b.room).then_with(|| a.name.cmp(&b.name)));
    entries
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occupant {
    pub id: ResidentId,
    pub badge: String,
    pub name: String,
    pub bed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomOccupancy {
    pub room: String,
    pub wing: Option<Wing>,
    pub floor: Option<Floor>,
    pub specialization: Option<Specialization>,
    /// `None` for rooms outside the room table.
    pub max_beds: Option<usize>,
    pub occupancy_percent: Option<u32>,
    pub over_capacity: bool,
    pub occupants: Vec<Occupant>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub rooms: Vec<RoomOccupancy>,
    pub occupied: usize,
    pub north: usize,
    pub south: usize,
    /// Residents with no room assigned.
    pub unassigned: usize,
    pub capacity: usize,
    /// Empty beds in known rooms. An overfull room contributes none.
    pub free_beds: usize,
    /// Residents in known rooms against total capacity, rounded.
    pub occupancy_percent: u32,
}

/// Room-by-room occupancy, including empty bedrooms. Beds are numbered in
/// roster order.
pub fn occupancy(records: &[ResidentRecord]) -> Occupancy {
    let mut by_room: BTreeMap<&str, Vec<&ResidentRecord>> =
        ROOMS.iter().map(|r| (r.room, Vec::new())).collect();
    let mut unassigned = 0;
    for r in records {
        let room = r.room.trim();
        if room.is_empty() {
            unassigned += 1;
        } else {
            by_room.entry(room).or_default().push(r);
        }
    }

    let rooms: Vec<RoomOccupancy> = by_room
        .into_iter()
        .map(|(room, residents)| {
            let spec = room_spec(room);
            let max_beds = spec.map(|s| s.max_beds);
            RoomOccupancy {
                room: room.to_string(),
                wing: Wing::of_room(room),
                floor: spec.map(|s| s.floor),
                specialization: spec.and_then(|s| s.specialization),
                max_beds,
                occupancy_percent: max_beds.map(|max| percent(residents.len(), max)),
                over_capacity: max_beds.is_some_and(|max| residents.len() > max),
                occupants: residents
                    .iter()
                    .enumerate()
                    .map(|(i, r)| Occupant {
                        id: r.id,
                        badge: r.badge.clone(),
                        name: r.full_name(),
                        bed: i + 1,
                    })
                    .collect(),
            }
        })
        .collect();

    let count = |wing: Wing| -> usize {
        rooms
            .iter()
            .filter(|r| r.wing == Some(wing))
            .map(|r| r.occupants.len())
            .sum()
    };

    let known = rooms.iter().filter_map(|r| r.max_beds.map(|max| (max, r.occupants.len())));
    let in_known_rooms: usize = known.clone().map(|(_, taken)| taken).sum();
    let free_beds = known.map(|(max, taken)| max.saturating_sub(taken)).sum();
    let capacity = capacity(None);

    Occupancy {
        occupied: rooms.iter().map(|r| r.occupants.len()).sum(),
        north: count(Wing::North),
        south: count(Wing::South),
        unassigned,
        capacity,
        free_beds,
        occupancy_percent: percent(in_known_rooms, capacity),
        rooms,
    }
}
