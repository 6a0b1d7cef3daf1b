// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use concord_config::Committee;
use tracing::debug;

use crate::{
    branch::Branches,
    dag::{build_ancestry_map, find_descendants_in_path, has_sufficient_endorsements, DescendantMap},
    snapshot::{EventIndex, HistorySnapshot},
};

/// Per-elector proof candidates: X is the earliest branch event whose
/// ancestry endorses a supermajority of electors (the branch tail within the
/// non-consensus history), Y the earliest tree descendant endorsing X from a
/// supermajority. The descendant maps accumulated while locating Y later
/// yield the consensus proof.
pub(crate) struct Candidates {
    pub x_by_elector: Vec<Option<EventIndex>>,
    pub y_by_elector: Vec<Option<EventIndex>>,
    pub x_descendants: Vec<DescendantMap>,
}

impl Candidates {
    /// Returns `None` as soon as a decision this round is impossible: fewer
    /// than a supermajority of electors with tails, Xs, or Ys.
    pub(crate) fn find(
        snapshot: &HistorySnapshot,
        electors: &Committee,
        branches: &Branches,
    ) -> Option<Self> {
        let threshold = electors.supermajority_threshold();

        let tailed = branches.tails.iter().filter(|tails| !tails.is_empty()).count();
        if tailed < threshold {
            debug!("Only {tailed} electors have branch tails, need {threshold}");
            return None;
        }

        let mut x_by_elector: Vec<Option<EventIndex>> = vec![None; electors.size()];
        for (elector, _) in electors.electors() {
            if branches.byzantine[elector.value()] {
                continue;
            }
            if let [tail] = branches.tails[elector.value()][..] {
                x_by_elector[elector.value()] = Some(tail);
            }
        }
        let xs = x_by_elector.iter().flatten().count();
        if xs < threshold {
            debug!("Only {xs} electors have an X, need {threshold}");
            return None;
        }

        let mut y_by_elector: Vec<Option<EventIndex>> = vec![None; electors.size()];
        let mut x_descendants: Vec<DescendantMap> = vec![DescendantMap::new(); electors.size()];
        for (elector, _) in electors.electors() {
            let Some(x) = x_by_elector[elector.value()] else {
                continue;
            };
            let descendants = &mut x_descendants[elector.value()];
            let y = Self::find_y(snapshot, electors, branches, x, descendants, threshold);
            if let Some(y) = y {
                debug!(
                    "Elector {elector} candidates: X {} Y {}",
                    snapshot.hash(x),
                    snapshot.hash(y)
                );
            }
            y_by_elector[elector.value()] = y;
        }
        let ys = y_by_elector.iter().flatten().count();
        if ys < threshold {
            debug!("Only {ys} electors have a Y, need {threshold}");
            return None;
        }

        Some(Self {
            x_by_elector,
            y_by_elector,
            x_descendants,
        })
    }

    /// Walks the tree descendants of `x`, growing its descendant map, until
    /// the accumulated paths endorse `x` from a supermajority of electors.
    fn find_y(
        snapshot: &HistorySnapshot,
        electors: &Committee,
        branches: &Branches,
        x: EventIndex,
        descendants: &mut DescendantMap,
        threshold: usize,
    ) -> Option<EventIndex> {
        if has_sufficient_endorsements(snapshot, x, descendants, electors, threshold) {
            return Some(x);
        }

        let ancestry = build_ancestry_map(snapshot, x);
        let mut current = x;
        loop {
            let next = match branches.tree_children[current][..] {
                [next] => next,
                _ => return None,
            };
            find_descendants_in_path(snapshot, x, next, descendants, &ancestry);
            if has_sufficient_endorsements(snapshot, x, descendants, electors, threshold) {
                return Some(next);
            }
            current = next;
        }
    }
}
