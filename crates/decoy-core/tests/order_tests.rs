// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use decoy_core::matcher::eq;
use decoy_core::{CallError, CallSite, Controller, SetupError};

const OPEN: CallSite<(), bool> = CallSite::method("Session::open");
const SEND: CallSite<(String,), usize> = CallSite::method("Session::send");
const CLOSE: CallSite<(), ()> = CallSite::method("Session::close");

fn session(ctrl: &Controller) -> [decoy_core::Expectation; 3] {
    let open = ctrl.expect(OPEN).returning(true).register().unwrap();
    let send = ctrl
        .expect(SEND)
        .returning_with(|(msg,)| msg.len())
        .any_times()
        .min_times(1)
        .register()
        .unwrap();
    let close = ctrl.expect(CLOSE).returning_default().register().unwrap();
    [open, send, close]
}

#[test]
fn declared_order_succeeds() {
    let ctrl = Controller::new();
    let [open, send, close] = session(&ctrl);
    ctrl.in_order(&[&open, &send, &close]).unwrap();

    assert!(ctrl.call(OPEN, ()).unwrap());
    assert_eq!(ctrl.call(SEND, ("hello".to_owned(),)).unwrap(), 5);
    assert_eq!(ctrl.call(SEND, ("hi".to_owned(),)).unwrap(), 2);
    ctrl.call(CLOSE, ()).unwrap();
    ctrl.finish().unwrap();
}

#[test]
fn skipping_a_predecessor_is_out_of_order() {
    let ctrl = Controller::new();
    let [open, send, close] = session(&ctrl);
    ctrl.in_order(&[&open, &send, &close]).unwrap();

    ctrl.call(OPEN, ()).unwrap();
    let err = ctrl.call(CLOSE, ()).unwrap_err();
    let CallError::OutOfOrder(e) = err else {
        panic!("expected out-of-order error, got {err:?}");
    };
    assert_eq!(e.before_id, send.id());
    assert_eq!(e.after_id, close.id());
    assert!(e.to_string().contains("Session::send"));
    assert_eq!(ctrl.consumed(&close), Some(0));
}

#[test]
fn cycle_is_rejected_before_any_call() {
    let ctrl = Controller::new();
    let [open, send, close] = session(&ctrl);
    ctrl.in_order(&[&open, &send, &close]).unwrap();

    let err = ctrl.declare_order(&close, &open).unwrap_err();
    assert_eq!(
        err,
        SetupError::OrderCycle {
            before: close.id(),
            after: open.id()
        }
    );
    assert_eq!(
        ctrl.declare_order(&send, &send).unwrap_err(),
        SetupError::SelfOrder(send.id())
    );
    assert!(ctrl.calls().is_empty());
}

#[test]
fn failed_chain_adds_no_edges() {
    let ctrl = Controller::new();
    let [open, send, close] = session(&ctrl);
    ctrl.declare_order(&close, &open).unwrap();

    let err = ctrl.in_order(&[&open, &send, &close]).unwrap_err();
    assert!(matches!(err, SetupError::OrderCycle { .. }));

    // open -> send was not kept, so send may fire before open.
    assert_eq!(ctrl.call(SEND, ("x".to_owned(),)).unwrap(), 1);
}

#[test]
fn expectations_from_another_controller_are_unknown() {
    let ctrl = Controller::new();
    let other = Controller::new();
    let [open, ..] = session(&ctrl);
    let foreign = other
        .expect(SEND)
        .with((eq("x".to_owned()),))
        .returning(1)
        .register()
        .unwrap();

    let err = ctrl.declare_order(&open, &foreign).unwrap_err();
    assert_eq!(err, SetupError::UnknownExpectation(foreign.id()));
}

#[test]
fn after_on_the_builder_orders_across_call_sites() {
    let ctrl = Controller::new();
    let open = ctrl.expect(OPEN).returning(true).register().unwrap();
    ctrl.expect(SEND)
        .returning(0)
        .after(&open)
        .register()
        .unwrap();

    assert!(matches!(
        ctrl.call(SEND, ("early".to_owned(),)),
        Err(CallError::OutOfOrder(_))
    ));
    ctrl.call(OPEN, ()).unwrap();
    assert_eq!(ctrl.call(SEND, ("late".to_owned(),)).unwrap(), 0);
    ctrl.finish().unwrap();
}

#[test]
fn foreign_handle_on_the_same_call_site_is_unknown() {
    let ctrl = Controller::new();
    let other = Controller::new();
    let [local_open, ..] = session(&ctrl);
    let [foreign_open, ..] = session(&other);
    assert_eq!(local_open.target(), foreign_open.target());
    assert_ne!(local_open.id(), foreign_open.id());

    let local_close = ctrl.expect(CLOSE).returning_default().register().unwrap();
    let err = ctrl.declare_order(&foreign_open, &local_close).unwrap_err();
    assert_eq!(err, SetupError::UnknownExpectation(foreign_open.id()));
}

#[test]
fn after_with_a_foreign_handle_is_rejected_and_adds_no_edge() {
    let ctrl = Controller::new();
    let other = Controller::new();
    let [foreign_open, ..] = session(&other);
    ctrl.expect(OPEN).returning(true).register().unwrap();

    let err = ctrl
        .expect(CLOSE)
        .returning_default()
        .after(&foreign_open)
        .register()
        .unwrap_err();
    assert_eq!(err, SetupError::UnknownExpectation(foreign_open.id()));

    let close = ctrl.expect(CLOSE).returning_default().register().unwrap();
    ctrl.call(CLOSE, ()).unwrap();
    assert_eq!(ctrl.consumed(&close), Some(1));
}

#[test]
fn blocked_candidate_does_not_fall_through_to_a_later_one() {
    let ctrl = Controller::new();
    let open = ctrl.expect(OPEN).returning(true).register().unwrap();
    let gated = ctrl
        .expect(SEND)
        .returning(1)
        .after(&open)
        .register()
        .unwrap();
    let free = ctrl.expect(SEND).returning(2).register().unwrap();

    let err = ctrl.call(SEND, ("early".to_owned(),)).unwrap_err();
    let CallError::OutOfOrder(e) = err else {
        panic!("expected out-of-order error, got {err:?}");
    };
    assert_eq!(e.after_id, gated.id());
    assert_eq!(ctrl.consumed(&free), Some(0));

    assert!(ctrl.call(OPEN, ()).unwrap());
    assert_eq!(ctrl.call(SEND, ("a".to_owned(),)).unwrap(), 1);
    assert_eq!(ctrl.call(SEND, ("b".to_owned(),)).unwrap(), 2);
    ctrl.finish().unwrap();
}
