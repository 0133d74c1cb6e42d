//! Readers running alongside activations must each see exactly one snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use compass_core::test_support::{place_base, place_text};
use compass_core::{Locale, PlaceCategory, PlaceFilters, Repository};
use compass_store::InstallOutcome;
use compass_store::pack::ContentBundle;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

#[expect(dead_code, reason = "support exports items not all used here")]
mod support;

use support::{RUNNING, Workspace, full_draft};

const PLACES: [&str; 5] = ["riad-1", "riad-2", "riad-3", "riad-4", "riad-5"];

/// Every place carries the generation in its name.
fn generation_bundle(generation: u64) -> ContentBundle {
    ContentBundle {
        places: PLACES
            .iter()
            .map(|id| place_base(id, PlaceCategory::Hotel))
            .collect(),
        place_texts: PLACES
            .iter()
            .map(|id| place_text(id, Locale::En, &format!("gen-{generation}"), "Courtyard"))
            .collect(),
        ..ContentBundle::default()
    }
}

fn generation_of(name: &str) -> u64 {
    name.strip_prefix("gen-")
        .and_then(|n| n.parse().ok())
        .expect("generation suffix")
}

#[rstest]
fn readers_never_observe_a_mixed_snapshot() {
    let workspace = Workspace::new(RUNNING);
    let packs: Vec<_> = (1..=6)
        .map(|generation| {
            let draft = full_draft(&format!("2026.06.{generation}"), generation, RUNNING);
            workspace.pack(
                &format!("pack-{generation}"),
                &draft,
                &generation_bundle(generation),
            )
        })
        .collect();
    let (first, rest) = packs.split_first().expect("at least one pack");
    let swap = workspace.layer.swap_manager();
    swap.install(first, &CancellationToken::new())
        .expect("install first pack");

    let done = AtomicBool::new(false);
    let repo = workspace.layer.repository();
    thread::scope(|scope| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let mut last_seen = 0;
                    let mut reads = 0_u32;
                    while !done.load(Ordering::Acquire) || reads == 0 {
                        let places = repo
                            .places(Locale::En, &PlaceFilters::default())
                            .expect("read places");
                        assert_eq!(places.len(), PLACES.len());
                        let generations: Vec<u64> =
                            places.iter().map(|place| generation_of(place.name())).collect();
                        let current = generations.first().copied().expect("non-empty");
                        assert!(
                            generations.iter().all(|g| *g == current),
                            "mixed snapshot: {generations:?}"
                        );
                        assert!(current >= last_seen, "went back from {last_seen} to {current}");
                        last_seen = current;
                        reads += 1;
                    }
                    last_seen
                })
            })
            .collect();

        for pack in rest {
            let outcome = swap
                .install(pack, &CancellationToken::new())
                .expect("install pack");
            assert!(matches!(outcome, InstallOutcome::Activated(_)));
        }
        done.store(true, Ordering::Release);
        for reader in readers {
            let last = reader.join().expect("reader thread");
            assert!((1..=6).contains(&last));
        }
    });

    let active = repo.active_content_version().expect("version").expect("active");
    assert_eq!(active.sequence, 6);
    assert_eq!(workspace.snapshot_dirs(), ["6-2026.06.6"]);
}
