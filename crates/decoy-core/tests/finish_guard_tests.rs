// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::panic::{catch_unwind, AssertUnwindSafe};

use decoy_core::{
    CallError, CallSite, Controller, ControllerConfig, Target, UnmatchedReason,
    UnsatisfiedExpectationError,
};

const FETCH: CallSite<(u32,), String> = CallSite::function("fetch");

#[test]
fn guard_rolls_back_when_the_test_body_panics() {
    let limit = Target::global("limit", 10_i64);
    let result = catch_unwind(AssertUnwindSafe(|| {
        let ctrl = Controller::new();
        let _guard = ctrl.finish_guard();
        ctrl.patch(&limit, 150).unwrap();
        ctrl.expect(FETCH).returning("x".to_owned()).register().unwrap();
        assert_eq!(limit.get(), 150);
        panic!("test body failed");
    }));

    let payload = result.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"test body failed"));
    assert_eq!(limit.get(), 10);
}

#[test]
fn guard_raises_unsatisfied_expectations() {
    let limit = Target::global("limit", 10_i64);
    let result = catch_unwind(AssertUnwindSafe(|| {
        let ctrl = Controller::new();
        let _guard = ctrl.finish_guard();
        ctrl.patch(&limit, 150).unwrap();
        ctrl.expect(FETCH).returning("x".to_owned()).register().unwrap();
    }));

    let payload = result.unwrap_err();
    let err = payload
        .downcast_ref::<UnsatisfiedExpectationError>()
        .expect("typed payload");
    assert_eq!(err.unmet.len(), 1);
    assert_eq!(limit.get(), 10);
}

#[test]
fn guard_can_be_configured_not_to_panic() {
    let cfg = ControllerConfig::default().with_panic_on_drop_failure(false);
    let ctrl = Controller::with_config(cfg);
    {
        let _guard = ctrl.finish_guard();
        ctrl.expect(FETCH).returning("x".to_owned()).register().unwrap();
    }
    assert!(ctrl.is_finished());
    assert!(ctrl.finish().is_err());
}

#[test]
fn guard_after_explicit_finish_does_nothing() {
    let ctrl = Controller::new();
    let guard = ctrl.finish_guard();
    ctrl.expect(FETCH).returning("x".to_owned()).register().unwrap();
    assert!(ctrl.finish().is_err());
    // The explicit finish already reported the failure; dropping must not panic.
    drop(guard);
}

#[test]
fn invoke_raises_call_error_payload() {
    let ctrl = Controller::new();
    let result = catch_unwind(AssertUnwindSafe(|| ctrl.invoke(FETCH, (7,))));
    let payload = result.unwrap_err();
    let err = payload.downcast_ref::<CallError>().expect("typed payload");
    assert_eq!(err.target(), FETCH.id());
    let CallError::Unmatched(unmatched) = err else {
        panic!("expected unmatched call");
    };
    assert_eq!(unmatched.reason, UnmatchedReason::NoExpectations);
    assert_eq!(unmatched.args, "(7,)");
}
