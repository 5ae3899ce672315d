use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use preview_live::types::ChangeKind;
use preview_live::watch::Coalescer;
use proptest::prelude::*;

fn kind_strategy() -> impl Strategy<Value = ChangeKind> {
    prop_oneof![
        Just(ChangeKind::Created),
        Just(ChangeKind::Modified),
        Just(ChangeKind::Removed),
    ]
}

// Reference model: a path existed before the window unless its first event
// was a creation, and exists afterwards unless its last event was a removal.
fn expected(events: &[(usize, ChangeKind)]) -> HashMap<PathBuf, ChangeKind> {
    let mut first_last: HashMap<usize, (ChangeKind, ChangeKind)> = HashMap::new();
    for &(idx, kind) in events {
        first_last
            .entry(idx)
            .and_modify(|(_, last)| *last = kind)
            .or_insert((kind, kind));
    }

    first_last
        .into_iter()
        .filter_map(|(idx, (first, last))| {
            let existed_before = first != ChangeKind::Created;
            let exists_now = last != ChangeKind::Removed;
            let net = match (existed_before, exists_now) {
                (false, true) => ChangeKind::Created,
                (true, true) => ChangeKind::Modified,
                (true, false) => ChangeKind::Removed,
                (false, false) => return None,
            };
            Some((path(idx), net))
        })
        .collect()
}

fn path(idx: usize) -> PathBuf {
    PathBuf::from(format!("/root/file_{idx}.html.erb"))
}

proptest! {
    #[test]
    fn one_window_reports_each_path_once_by_net_effect(
        events in proptest::collection::vec((0..8usize, kind_strategy()), 1..40)
    ) {
        let mut coalescer = Coalescer::new();
        for &(idx, kind) in &events {
            coalescer.record(path(idx), kind);
        }
        let changes = coalescer.take();

        // No path is reported under more than one kind.
        let all: Vec<&PathBuf> = changes.paths().collect();
        let unique: BTreeSet<&PathBuf> = all.iter().copied().collect();
        prop_assert_eq!(all.len(), unique.len());

        let want = expected(&events);
        prop_assert_eq!(changes.len(), want.len());
        for (p, kind) in &want {
            prop_assert_eq!(changes.kind_of(p), Some(*kind));
        }

        prop_assert!(coalescer.is_empty());
    }

    #[test]
    fn created_then_removed_never_surfaces(
        noise in proptest::collection::vec((1..8usize, kind_strategy()), 0..20)
    ) {
        let mut coalescer = Coalescer::new();
        coalescer.record(path(0), ChangeKind::Created);
        for &(idx, kind) in &noise {
            coalescer.record(path(idx), kind);
        }
        coalescer.record(path(0), ChangeKind::Modified);
        coalescer.record(path(0), ChangeKind::Removed);

        let changes = coalescer.take();
        prop_assert_eq!(changes.kind_of(&path(0)), None);
    }
}
