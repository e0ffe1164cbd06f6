// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
use proptest::prelude::*;
use proptest::test_runner::{Config as PropConfig, RngAlgorithm, TestRng, TestRunner};

use decoy_core::{CallSite, Controller, OutcomeGroup, Patch, PatchSet, Repeat, Target};

// Pinned seed so failures reproduce across machines and CI.
//
// To explore other cases locally, override with PROPTEST_SEED, e.g.:
//   PROPTEST_SEED=0000000000000000000000000000000000000000000000000000000000000042 cargo test -p decoy-core --test proptest_seed_pinning
const SEED_BYTES: [u8; 32] = [
    0x42, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0,
];

fn runner() -> TestRunner {
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &SEED_BYTES);
    TestRunner::new_with_rng(PropConfig::default(), rng)
}

#[test]
fn proptest_seed_pinned_reset_all_round_trip() {
    // Stacks of patches over three globals, in any interleaving.
    let ops = prop::collection::vec((0_usize..3, any::<i32>()), 0..40);

    runner()
        .run(&ops, |ops| {
            let targets = [
                Target::global("a", 1_i32),
                Target::global("b", 2_i32),
                Target::global("c", 3_i32),
            ];
            let mut set = PatchSet::new();
            for (which, value) in &ops {
                set.apply(&targets[*which], *value);
            }
            prop_assert_eq!(set.len(), ops.len());
            prop_assert_eq!(set.reset_all(), ops.len());
            for (target, original) in targets.iter().zip([1, 2, 3]) {
                prop_assert_eq!(target.get(), original);
                prop_assert!(!target.is_patched());
            }
            Ok(())
        })
        .expect("reset_all round trip");
}

#[test]
fn proptest_seed_pinned_resets_in_any_order_restore_original() {
    let plan = (1_usize..12).prop_flat_map(|depth| {
        (
            Just(depth),
            Just((0..depth).collect::<Vec<_>>()).prop_shuffle(),
        )
    });

    runner()
        .run(&plan, |(depth, order)| {
            let target = Target::global("shuffled", -1_i64);
            let mut patches: Vec<Option<Patch<i64>>> = (0..depth)
                .map(|i| Some(Patch::apply(&target, i64::try_from(i).unwrap())))
                .collect();
            prop_assert_eq!(target.get(), i64::try_from(depth - 1).unwrap());

            for index in order {
                let mut patch = patches[index].take().expect("each index once");
                prop_assert!(patch.reset());
            }
            prop_assert_eq!(target.get(), -1);
            prop_assert_eq!(target.depth(), 0);
            Ok(())
        })
        .expect("shuffled resets");
}

#[test]
fn proptest_seed_pinned_outcome_sequencing() {
    const SITE: CallSite<(), usize> = CallSite::function("seq");
    let repeats = prop::collection::vec(1_usize..5, 1..6);

    runner()
        .run(&repeats, |repeats| {
            let ctrl = Controller::new();
            let groups = repeats
                .iter()
                .enumerate()
                .map(|(i, n)| OutcomeGroup::times(i, *n))
                .collect::<Vec<_>>();
            let total: usize = repeats.iter().sum();
            let exp = ctrl.register(SITE, None, groups).unwrap();

            let mut expected = Vec::with_capacity(total);
            for (i, n) in repeats.iter().enumerate() {
                expected.extend(std::iter::repeat(i).take(*n));
            }
            let answers: Vec<usize> = (0..total).map(|_| ctrl.call(SITE, ()).unwrap()).collect();
            prop_assert_eq!(answers, expected);
            prop_assert!(ctrl.call(SITE, ()).is_err());
            prop_assert_eq!(ctrl.consumed(&exp), Some(total));
            prop_assert!(ctrl.finish().is_ok());
            Ok(())
        })
        .expect("outcome sequencing");
}

#[test]
fn proptest_seed_pinned_unbounded_tail() {
    const SITE: CallSite<(), &'static str> = CallSite::function("tail");
    let calls = 0_usize..200;

    runner()
        .run(&calls, |calls| {
            let ctrl = Controller::new();
            ctrl.register(
                SITE,
                None,
                vec![
                    OutcomeGroup::once("head"),
                    OutcomeGroup::once("tail").repeat(Repeat::Unbounded),
                ],
            )
            .unwrap();
            prop_assert_eq!(ctrl.call(SITE, ()).unwrap(), "head");
            for _ in 0..calls {
                prop_assert_eq!(ctrl.call(SITE, ()).unwrap(), "tail");
            }
            prop_assert!(ctrl.finish().is_ok());
            Ok(())
        })
        .expect("unbounded tail");
}
