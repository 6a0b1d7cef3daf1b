// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;

use concord_config::Committee;
use tracing::warn;

use crate::{
    event::{EventAPI, Generation},
    snapshot::{EventIndex, HistorySnapshot},
};

/// Per-elector branch structure derived from one history snapshot: tree
/// links between merge events of the same creator, branch tails, and
/// 1-based generations. Scoped to a single decide call.
pub(crate) struct Branches {
    /// The creator's previous merge event, resolved within the snapshot.
    pub tree_parent: Vec<Option<EventIndex>>,
    /// Reciprocal of `tree_parent`. More than one child marks a fork.
    pub tree_children: Vec<Vec<EventIndex>>,
    /// 1-based position along the creator's branch; 0 for events not
    /// authored by an elector.
    pub generation: Vec<Generation>,
    /// Earliest branch events per elector. A correct elector has exactly one.
    pub tails: Vec<Vec<EventIndex>>,
    /// Electors excluded from candidate selection: multiple tails or a
    /// forked branch.
    pub byzantine: Vec<bool>,
}

impl Branches {
    pub(crate) fn build(snapshot: &HistorySnapshot, electors: &Committee) -> Self {
        let len = snapshot.len();
        let mut tree_parent: Vec<Option<EventIndex>> = vec![None; len];
        let mut tree_children: Vec<Vec<EventIndex>> = vec![Vec::new(); len];
        let mut generation: Vec<Generation> = vec![0; len];
        let mut tails: Vec<Vec<EventIndex>> = vec![Vec::new(); electors.size()];
        let mut byzantine = vec![false; electors.size()];

        for index in 0..len {
            let event = snapshot.event(index);
            let Some(elector) = electors.index_of(event.creator()) else {
                continue;
            };
            let parent = event.tree_hash().and_then(|tree_hash| {
                snapshot
                    .index_of(tree_hash)
                    .filter(|&parent| snapshot.creator(parent) == event.creator())
            });
            match parent {
                Some(parent) => {
                    tree_parent[index] = Some(parent);
                    tree_children[parent].push(index);
                }
                None => tails[elector.value()].push(index),
            }
        }

        for (elector, _) in electors.electors() {
            let elector_tails = &tails[elector.value()];
            if elector_tails.len() > 1 {
                byzantine[elector.value()] = true;
                warn!("Elector {elector} has {} branch tails", elector_tails.len());
            }

            // Generations flow through forks too, so duplicate-generation
            // detection downstream stays well-defined.
            let mut queue: VecDeque<EventIndex> = elector_tails.iter().copied().collect();
            for &tail in elector_tails {
                generation[tail] = 1;
            }
            while let Some(current) = queue.pop_front() {
                let children = &tree_children[current];
                if children.len() > 1 && !byzantine[elector.value()] {
                    byzantine[elector.value()] = true;
                    warn!(
                        "Elector {elector} forked its branch at {}",
                        snapshot.hash(current)
                    );
                }
                for &child in children {
                    generation[child] = generation[current] + 1;
                    queue.push_back(child);
                }
            }
        }

        Self {
            tree_parent,
            tree_children,
            generation,
            tails,
            byzantine,
        }
    }
}
