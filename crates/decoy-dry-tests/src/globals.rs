// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Process-wide values and function variables.

use std::sync::LazyLock;

use decoy_core::{func, Func, Target};

/// Default value of [`LIMIT`].
pub const DEFAULT_LIMIT: i64 = 10;

/// Shared numeric setting.
pub static LIMIT: LazyLock<Target<i64>> =
    LazyLock::new(|| Target::global("globals::LIMIT", DEFAULT_LIMIT));

/// Function variable splitting a phrase into words.
pub static TOKENIZE: LazyLock<Target<Func<(String,), Vec<String>>>> = LazyLock::new(|| {
    Target::function(
        "globals::tokenize",
        func(|(phrase,): (String,)| phrase.split_whitespace().map(str::to_owned).collect()),
    )
});

/// Number of items allowed by [`LIMIT`] out of `requested`.
pub fn clamp_to_limit(requested: i64) -> i64 {
    requested.min(LIMIT.get())
}

/// Words of `phrase`, via [`TOKENIZE`].
pub fn tokenize(phrase: &str) -> Vec<String> {
    TOKENIZE.call((phrase.to_owned(),))
}
