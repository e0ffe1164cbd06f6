// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Argument predicates.
//!
//! A [`Matcher`] decides whether an expectation accepts a call's arguments and
//! describes itself for diagnostics. Tuples of matchers match tuple arguments
//! position by position, so `(eq("k1".to_owned()), any())` matches a
//! two-argument call whose first argument is `"k1"`.

use std::fmt;

/// Predicate over a call's arguments.
///
/// The controller evaluates matchers without holding its state lock, so a
/// predicate may itself query or call the controller.
pub trait Matcher<A: ?Sized>: Send + Sync {
    /// Whether `args` are accepted.
    fn matches(&self, args: &A) -> bool;
    /// Short description used in expectation labels.
    fn describe(&self) -> String;
}

/// Accepts every value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Any;

impl<A: ?Sized> Matcher<A> for Any {
    fn matches(&self, _args: &A) -> bool {
        true
    }

    fn describe(&self) -> String {
        "any".to_owned()
    }
}

/// Wildcard matcher.
pub const fn any() -> Any {
    Any
}

/// Accepts values equal to the wrapped one.
#[derive(Debug, Clone)]
pub struct Eq<T>(T);

impl<A, T> Matcher<A> for Eq<T>
where
    A: PartialEq<T> + ?Sized,
    T: fmt::Debug + Send + Sync,
{
    fn matches(&self, args: &A) -> bool {
        *args == self.0
    }

    fn describe(&self) -> String {
        format!("eq {:?}", self.0)
    }
}

/// Equality matcher.
pub fn eq<T>(value: T) -> Eq<T> {
    Eq(value)
}

/// Accepts values different from the wrapped one.
#[derive(Debug, Clone)]
pub struct Ne<T>(T);

impl<A, T> Matcher<A> for Ne<T>
where
    A: PartialEq<T> + ?Sized,
    T: fmt::Debug + Send + Sync,
{
    fn matches(&self, args: &A) -> bool {
        *args != self.0
    }

    fn describe(&self) -> String {
        format!("ne {:?}", self.0)
    }
}

/// Inequality matcher.
pub fn ne<T>(value: T) -> Ne<T> {
    Ne(value)
}

/// Accepts values for which a closure returns `true`.
pub struct Predicate<F> {
    f: F,
    description: String,
}

impl<A, F> Matcher<A> for Predicate<F>
where
    A: ?Sized,
    F: Fn(&A) -> bool + Send + Sync,
{
    fn matches(&self, args: &A) -> bool {
        (self.f)(args)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

impl<F> fmt::Debug for Predicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Closure matcher described as `fn`.
pub fn function<F>(f: F) -> Predicate<F> {
    Predicate {
        f,
        description: "fn".to_owned(),
    }
}

/// Closure matcher with a custom description.
pub fn described<F>(description: impl Into<String>, f: F) -> Predicate<F> {
    Predicate {
        f,
        description: description.into(),
    }
}

/// Inverts another matcher.
#[derive(Debug, Clone)]
pub struct Not<M>(M);

impl<A: ?Sized, M: Matcher<A>> Matcher<A> for Not<M> {
    fn matches(&self, args: &A) -> bool {
        !self.0.matches(args)
    }

    fn describe(&self) -> String {
        format!("not {}", self.0.describe())
    }
}

/// Negation matcher.
pub fn not<M>(inner: M) -> Not<M> {
    Not(inner)
}

macro_rules! tuple_matcher {
    ($( ($($m:ident $a:ident $idx:tt),+) )+) => {$(
        impl<$($a,)+ $($m,)+> Matcher<($($a,)+)> for ($($m,)+)
        where
            $($m: Matcher<$a>,)+
        {
            fn matches(&self, args: &($($a,)+)) -> bool {
                true $(&& self.$idx.matches(&args.$idx))+
            }

            fn describe(&self) -> String {
                let parts: Vec<String> = vec![$(self.$idx.describe()),+];
                parts.join(", ")
            }
        }
    )+};
}

tuple_matcher! {
    (M0 A0 0)
    (M0 A0 0, M1 A1 1)
    (M0 A0 0, M1 A1 1, M2 A2 2)
    (M0 A0 0, M1 A1 1, M2 A2 2, M3 A3 3)
}
