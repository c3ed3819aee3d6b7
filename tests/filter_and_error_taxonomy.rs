//! Exercises the filter taxonomy and error-severity classification purely
//! through the public API — the surfaces in this crate that don't need a
//! live GPU device to exercise meaningfully.

use rtcore::filter::{CullMask, Filter, Lifetime, PassThrough, Visibility};
use rtcore::{RtError, RtResult};

/// §8.1: "For every TLAS instance with `PV_WORLD_k` and frame cull mask
/// `M`: the instance is present iff bit `k` of `M` is set." `CullMask`
/// carries that invariant directly on its `allows` query.
#[test]
fn cull_mask_presence_matches_bit_k() {
    for k in 0..3u32 {
        let bit = CullMask::from_bits_truncate(1 << k);
        for world in [Visibility::World0, Visibility::World1, Visibility::World2] {
            let idx = world.world_index().unwrap();
            assert_eq!(bit.allows(idx), idx == k, "world {idx} vs bit {k}");
        }
    }
}

/// §8.4#3: a cull mask missing bit 0 drops every `World0` instance while
/// leaving `World1`/`World2` instances alone.
#[test]
fn cull_mask_drops_only_excluded_world() {
    let mask = CullMask::WORLD_1 | CullMask::WORLD_2;
    assert!(!mask.allows(Visibility::World0.world_index().unwrap()));
    assert!(mask.allows(Visibility::World1.world_index().unwrap()));
    assert!(mask.allows(Visibility::World2.world_index().unwrap()));
}

/// Non-world visibility classes (first-person, first-person-viewer, skybox)
/// have no `world_index`, so they never participate in cull-mask filtering.
#[test]
fn non_world_visibility_has_no_world_index() {
    for v in [Visibility::FirstPerson, Visibility::FirstPersonViewer, Visibility::Skybox] {
        assert_eq!(v.world_index(), None);
    }
}

/// §3.1 invariant: the `(CF x PT x PV)` cross-product is dense and every
/// filter's index is stable and distinct — the property every other module
/// relies on when it uses `Filter::index()` as a buffer-layout offset.
#[test]
fn filter_cross_product_is_complete() {
    let all = Filter::all();
    assert_eq!(all.len(), Filter::COUNT);

    let mut seen = vec![false; Filter::COUNT];
    for &f in all {
        assert!(!seen[f.index()], "index {} reused", f.index());
        seen[f.index()] = true;
        // round-trips through a fresh Filter::new with the same fields
        let rebuilt = Filter::new(f.lifetime, f.pass_through, f.visibility);
        assert_eq!(rebuilt.index(), f.index());
    }
    assert!(seen.into_iter().all(|b| b));
}

#[test]
fn for_lifetime_only_yields_matching_filters() {
    for lifetime in Lifetime::ALL {
        let filters: Vec<_> = Filter::for_lifetime(lifetime).collect();
        assert_eq!(filters.len(), PassThrough::ALL.len() * Visibility::ALL.len());
        assert!(filters.iter().all(|f| f.lifetime == lifetime));
    }
}

/// §7's four-class error taxonomy maps onto a log severity: capacity
/// errors are warnings, device-lost/OOM are errors, everything else
/// (misuse) is debug-level — host code dispatches on this to decide
/// whether a frame's error is worth surfacing to a user.
#[test]
fn error_log_level_matches_documented_class() {
    let capacity_errors: Vec<RtError> = vec![
        RtError::TooManyInstances { requested: 10, capacity: 8 },
        RtError::TooManySectors { requested: 300, capacity: 256 },
        RtError::TooManyLightsInSector { sector: 3, capacity: 256 },
    ];
    for e in capacity_errors {
        assert_eq!(e.log_level(), log::Level::Warn, "{e:?}");
    }

    let fatal_errors: Vec<RtError> =
        vec![RtError::DeviceLost("lost".into()), RtError::OutOfMemory("oom".into())];
    for e in fatal_errors {
        assert_eq!(e.log_level(), log::Level::Error, "{e:?}");
    }

    let misuse_errors: Vec<RtError> = vec![
        RtError::FrameNotStarted,
        RtError::FrameNotEnded,
        RtError::WrongInstance,
        RtError::IdNotUnique(42),
        RtError::NotRecordingScene,
        RtError::RecordingScene,
    ];
    for e in misuse_errors {
        assert_eq!(e.log_level(), log::Level::Debug, "{e:?}");
    }
}

/// Sanity check that `RtResult` composes with `?` the way every operation
/// in the crate relies on.
#[test]
fn rt_result_propagates_with_question_mark() -> RtResult<()> {
    fn inner() -> RtResult<u32> {
        Ok(7)
    }
    let value = inner()?;
    assert_eq!(value, 7);
    Ok(())
}
