//! Exercise grouping rules.
//!
//! Groups are not stored rows. Exercises in one day that share a `group_id`
//! form a group; its shape is governed by the [`GroupRule`] of its type.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use coachplan_db::models::{BlockDraft, Exercise, ExerciseDraft, GroupType};

use crate::error::ValidationError;

/// Static constraints of one group type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRule {
    pub group_type: GroupType,
    /// `None` means unbounded.
    pub max_members: Option<usize>,
    /// Members are done back to back with one rest after the round.
    pub shared_rest: bool,
    pub description: &'static str,
}

pub fn rule(group_type: GroupType) -> GroupRule {
    let (max_members, shared_rest, description) = match group_type {
        GroupType::Normal => (Some(1), false, "single exercise, own rest"),
        GroupType::BiSet => (Some(2), true, "two exercises back to back, shared rest after the round"),
        GroupType::TriSet => (Some(3), true, "three exercises back to back, shared rest after the round"),
        GroupType::DropSet => (None, true, "same movement with descending load"),
        GroupType::Superset => (None, true, "circuit of exercises timed as a whole"),
    };
    GroupRule {
        group_type,
        max_members,
        shared_rest,
        description,
    }
}

/// Check group membership of authored exercises.
///
/// Every grouped exercise needs a type, all members of a group must agree on
/// it, and the member count must not exceed the type's limit.
pub fn validate_groups(drafts: &[ExerciseDraft]) -> Result<(), ValidationError> {
    let mut groups: Vec<(&str, GroupType, usize)> = Vec::new();

    for draft in drafts {
        let Some(group_id) = draft.group_id.as_deref() else {
            continue;
        };
        let Some(group_type) = draft.group_type else {
            return Err(ValidationError::MissingGroupType {
                exercise: draft.name.clone(),
                group_id: group_id.to_owned(),
            });
        };

        match groups.iter_mut().find(|(id, _, _)| *id == group_id) {
            Some((_, first, count)) => {
                if *first != group_type {
                    return Err(ValidationError::MixedGroupTypes {
                        group_id: group_id.to_owned(),
                        first: *first,
                        second: group_type,
                    });
                }
                *count += 1;
            }
            None => groups.push((group_id, group_type, 1)),
        }
    }

    for (group_id, group_type, actual) in groups {
        if let Some(max) = rule(group_type).max_members {
            if actual > max {
                return Err(ValidationError::GroupTooLarge {
                    group_id: group_id.to_owned(),
                    group_type,
                    max,
                    actual,
                });
            }
        }
    }

    Ok(())
}

/// Exercises of one group in `order_in_group` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExerciseGroup {
    pub group_id: String,
    pub group_type: GroupType,
    /// Rest after the whole round, taken from the first member that sets it.
    pub rest_seconds: Option<i32>,
    pub members: Vec<Exercise>,
}

/// One slot in a day's exercise list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExerciseEntry {
    Single(Exercise),
    Group(ExerciseGroup),
}

impl ExerciseEntry {
    pub fn exercises(&self) -> impl Iterator<Item = &Exercise> {
        let slice = match self {
            Self::Single(ex) => std::slice::from_ref(ex),
            Self::Group(group) => group.members.as_slice(),
        };
        slice.iter()
    }
}

/// Fold `exercises` (already in display order) into singles and groups.
///
/// A group takes the slot of its first member.
pub fn hydrate_groups(exercises: Vec<Exercise>) -> Vec<ExerciseEntry> {
    let mut entries: Vec<ExerciseEntry> = Vec::new();
    let mut slot_of: HashMap<String, usize> = HashMap::new();

    for ex in exercises {
        let (Some(group_id), Some(group_type)) = (ex.group_id.clone(), ex.group_type) else {
            entries.push(ExerciseEntry::Single(ex));
            continue;
        };

        match slot_of.get(&group_id) {
            Some(&slot) => {
                if let ExerciseEntry::Group(group) = &mut entries[slot] {
                    if group.rest_seconds.is_none() {
                        group.rest_seconds = ex.group_rest_seconds;
                    }
                    group.members.push(ex);
                }
            }
            None => {
                slot_of.insert(group_id.clone(), entries.len());
                entries.push(ExerciseEntry::Group(ExerciseGroup {
                    group_id,
                    group_type,
                    rest_seconds: ex.group_rest_seconds,
                    members: vec![ex],
                }));
            }
        }
    }

    for entry in &mut entries {
        if let ExerciseEntry::Group(group) = entry {
            group
                .members
                .sort_by_key(|m| (m.order_in_group.unwrap_or(i32::MAX), m.order));
        }
    }

    entries
}

/// Replace every source group id with a fresh one.
///
/// Ids are assigned lazily in visiting order, so all members of a source
/// group resolve to the same new id. Returns the rewritten drafts and the
/// old-to-new mapping.
pub fn remap_groups(drafts: &[ExerciseDraft]) -> (Vec<ExerciseDraft>, HashMap<String, String>) {
    let mut mapping: HashMap<String, String> = HashMap::new();
    let remapped = drafts
        .iter()
        .map(|draft| {
            let mut copy = draft.clone();
            copy.group_id = draft.group_id.as_ref().map(|old| {
                mapping
                    .entry(old.clone())
                    .or_insert_with(|| Uuid::new_v4().to_string())
                    .clone()
            });
            copy
        })
        .collect();
    (remapped, mapping)
}

/// Give blocks without a usable order their 1-based list position.
pub fn resolve_block_orders(blocks: &[BlockDraft]) -> Vec<BlockDraft> {
    blocks
        .iter()
        .enumerate()
        .map(|(idx, block)| {
            let mut copy = block.clone();
            copy.order = match block.order {
                Some(order) if order > 0 => Some(order),
                _ => Some(i32::try_from(idx + 1).unwrap_or(i32::MAX)),
            };
            copy
        })
        .collect()
}

/// Multiset of group sizes, sorted, for comparing the shape of two days.
pub fn group_shape(exercises: &[Exercise]) -> Vec<usize> {
    let mut sizes: HashMap<&str, usize> = HashMap::new();
    for ex in exercises {
        if let Some(id) = ex.group_id.as_deref() {
            *sizes.entry(id).or_default() += 1;
        }
    }
    let mut shape: Vec<usize> = sizes.into_values().collect();
    shape.sort_unstable();
    shape
}
