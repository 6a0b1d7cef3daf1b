// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use concord_config::Committee;

use crate::snapshot::{EventIndex, HistorySnapshot};

/// Sparse map from an ancestor event to its immediate descendants along the
/// paths explored so far. Grown monotonically by [`find_descendants_in_path`];
/// repeated calls with progressively later targets only enlarge it.
pub(crate) type DescendantMap = HashMap<EventIndex, Vec<EventIndex>>;

/// Membership set over snapshot indices, one slot per event.
pub(crate) type AncestrySet = Vec<bool>;

/// Returns the closed ancestry of `event`: the event itself plus everything
/// reachable backward through resolved parents.
pub(crate) fn build_ancestry_map(snapshot: &HistorySnapshot, event: EventIndex) -> AncestrySet {
    let mut ancestry = vec![false; snapshot.len()];
    let mut stack = vec![event];
    ancestry[event] = true;
    while let Some(current) = stack.pop() {
        for &parent in snapshot.parents(current) {
            if !ancestry[parent] {
                ancestry[parent] = true;
                stack.push(parent);
            }
        }
    }
    ancestry
}

/// Walks backward from `y` through parents, halting at events in `ancestry`
/// (the closed ancestry of `x`), and records every traversed edge in
/// `descendants`. Returns the events visited on the way, sorted: the events
/// on paths from `x` (exclusive) to `y` (inclusive).
pub(crate) fn find_descendants_in_path(
    snapshot: &HistorySnapshot,
    x: EventIndex,
    y: EventIndex,
    descendants: &mut DescendantMap,
    ancestry: &AncestrySet,
) -> Vec<EventIndex> {
    if x == y || ancestry[y] {
        return Vec::new();
    }

    let mut visited = vec![false; snapshot.len()];
    let mut path = vec![y];
    let mut stack = vec![y];
    visited[y] = true;
    while let Some(current) = stack.pop() {
        for &parent in snapshot.parents(current) {
            let entry = descendants.entry(parent).or_default();
            if !entry.contains(&current) {
                entry.push(current);
                entry.sort_unstable();
            }
            if !ancestry[parent] && !visited[parent] {
                visited[parent] = true;
                path.push(parent);
                stack.push(parent);
            }
        }
    }
    path.sort_unstable();
    path
}

/// Forward-walks from `x` through the descendant map, returning the
/// deduplicated, sorted set of events reached. `x` itself is excluded.
pub(crate) fn flatten_descendants(
    snapshot: &HistorySnapshot,
    x: EventIndex,
    descendants: &DescendantMap,
) -> Vec<EventIndex> {
    let mut reached = vec![false; snapshot.len()];
    let mut stack: Vec<EventIndex> = descendants.get(&x).cloned().unwrap_or_default();
    let mut flattened = Vec::new();
    while let Some(current) = stack.pop() {
        if reached[current] {
            continue;
        }
        reached[current] = true;
        flattened.push(current);
        if let Some(children) = descendants.get(&current) {
            stack.extend(children.iter().copied());
        }
    }
    flattened.sort_unstable();
    flattened
}

/// True once the events reachable from `x` through the descendant map,
/// together with `x` itself, carry merge events from at least `threshold`
/// distinct electors.
pub(crate) fn has_sufficient_endorsements(
    snapshot: &HistorySnapshot,
    x: EventIndex,
    descendants: &DescendantMap,
    electors: &Committee,
    threshold: usize,
) -> bool {
    let mut endorsers = vec![false; electors.size()];
    let mut count = 0;
    let mut record = |event: EventIndex, endorsers: &mut Vec<bool>, count: &mut usize| {
        if let Some(elector) = electors.index_of(snapshot.creator(event)) {
            if !endorsers[elector.value()] {
                endorsers[elector.value()] = true;
                *count += 1;
            }
        }
    };

    record(x, &mut endorsers, &mut count);
    for event in flatten_descendants(snapshot, x, descendants) {
        record(event, &mut endorsers, &mut count);
        if count >= threshold {
            return true;
        }
    }
    count >= threshold
}

/// Finds the earliest tree descendant of `x` whose accumulated
/// descendants-in-path carry merge events from at least `threshold` distinct
/// electors. With a threshold of one, `x` endorses itself.
pub(crate) fn find_diverse_pedigree_merge_event(
    snapshot: &HistorySnapshot,
    tree_children: &[Vec<EventIndex>],
    x: EventIndex,
    electors: &Committee,
    threshold: usize,
) -> Option<EventIndex> {
    if threshold <= 1 {
        return Some(x);
    }

    let ancestry = build_ancestry_map(snapshot, x);
    let mut descendants = DescendantMap::new();
    let mut current = x;
    loop {
        let children = &tree_children[current];
        if children.len() != 1 {
            return None;
        }
        let next = children[0];
        find_descendants_in_path(snapshot, x, next, &mut descendants, &ancestry);
        if has_sufficient_endorsements(snapshot, x, &descendants, electors, threshold) {
            return Some(next);
        }
        current = next;
    }
}
