// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! decoy-core: call interception and expectation verification for tests.
//!
//! A test case owns one [`Controller`]. Through it the test substitutes values
//! behind patchable indirection points ([`Target`]), registers the calls it
//! expects against doubles ([`CallSite`] + [`ExpectationBuilder`]), declares
//! ordering constraints between those calls, and finally verifies everything
//! while rolling every substitution back.
//!
//! Nothing here rewrites machine code. A [`Target`] is a value slot (a stored
//! function value, an injected trait object factory, or a global) that code
//! under test reads through; patching swaps the slot contents and the patch
//! stack remembers what to put back.
//!
//! ```
//! use decoy_core::{func, CallSite, Controller, Func, Target};
//!
//! let greet: Target<Func<(String,), String>> =
//!     Target::function("greet", func(|(name,): (String,)| format!("hello {name}")));
//!
//! let ctrl = Controller::new();
//! ctrl.patch(&greet, func(|_| "stubbed".to_owned())).unwrap();
//! assert_eq!(greet.call(("ada".to_owned(),)), "stubbed");
//!
//! ctrl.finish().unwrap();
//! assert_eq!(greet.call(("ada".to_owned(),)), "hello ada");
//! ```
#![forbid(unsafe_code)]

mod call_site;
/// Controller configuration (match priority, drop behavior, call log).
pub mod config;
mod controller;
mod error;
mod expectation;
/// Argument matchers, including the canonical wildcard [`matcher::any`].
pub mod matcher;
mod order;
mod outcome;
mod patch;
mod patch_set;
mod registry;
mod target;

/// Typed identity of an interceptable call.
pub use call_site::CallSite;
/// Configuration knobs and their load errors.
pub use config::{ConfigError, ControllerConfig, MatchPriority, CONFIG_ENV_VAR};
/// Per-test controller, teardown guard and call log entries.
pub use controller::{CallRecord, Controller, FinishGuard};
/// Error taxonomy.
pub use error::{
    CallError, DecoyError, DuplicatePatchError, OutOfOrderError, SetupError, UnmatchedCallError,
    UnmatchedReason, UnmetExpectation, UnsatisfiedExpectationError,
};
/// Expectation handles, ids, consumption states and the registration builder.
pub use expectation::{Expectation, ExpectationBuilder, ExpectationId, ExpectationState};
/// Argument predicate capability.
pub use matcher::Matcher;
/// Precedence graph over expectations.
pub use order::OrderGraph;
/// Outcome groups consumed in declaration order.
pub use outcome::{Outcome, OutcomeGroup, Repeat};
/// Single reversible substitution.
pub use patch::{Patch, PatchId};
/// Ordered patch stack with LIFO rollback.
pub use patch_set::PatchSet;
/// Name-indexed view over targets.
pub use registry::TargetRegistry;
/// Patchable indirection points.
pub use target::{func, Func, Target, TargetId, TargetKind};
