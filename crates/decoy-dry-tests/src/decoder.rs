// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Movie decoder port, JSON implementation and double.

use std::sync::{Arc, LazyLock};

use decoy_core::{func, CallSite, Controller, ExpectationBuilder, Func, Target};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decoded record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    /// Title.
    pub name: String,
    /// Genre.
    #[serde(rename = "type")]
    pub kind: String,
    /// Rating out of 100.
    pub score: i64,
}

/// Error type for decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input is not a valid movie document.
    #[error("invalid movie document: {0}")]
    Invalid(String),
}

/// Decoder port.
pub trait Decoder: Send + Sync {
    /// Decodes one movie from `bytes`.
    fn decode(&self, bytes: &[u8]) -> Result<Movie, DecodeError>;
}

/// JSON [`Decoder`]; the body runs through [`JSON_DECODE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

/// Patchable body of [`JsonDecoder::decode`].
pub static JSON_DECODE: LazyLock<Target<Func<(Vec<u8>,), Result<Movie, DecodeError>>>> =
    LazyLock::new(|| {
        Target::method(
            "JsonDecoder::decode",
            func(|(bytes,): (Vec<u8>,)| {
                serde_json::from_slice(&bytes).map_err(|e| DecodeError::Invalid(e.to_string()))
            }),
        )
    });

impl Decoder for JsonDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Movie, DecodeError> {
        JSON_DECODE.call((bytes.to_vec(),))
    }
}

/// Call site of [`Decoder::decode`] on a [`MockDecoder`].
pub const DECODE: CallSite<(Vec<u8>,), Result<Movie, DecodeError>> =
    CallSite::method("Decoder::decode");

/// Controller-backed [`Decoder`] double.
#[derive(Debug, Clone)]
pub struct MockDecoder {
    controller: Controller,
}

impl MockDecoder {
    /// Double bound to `controller`.
    pub fn new(controller: &Controller) -> Self {
        Self {
            controller: controller.clone(),
        }
    }

    /// Expectation on `decode`.
    pub fn expect_decode(&self) -> ExpectationBuilder<'_, (Vec<u8>,), Result<Movie, DecodeError>> {
        self.controller.expect(DECODE)
    }
}

impl Decoder for MockDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Movie, DecodeError> {
        self.controller.invoke(DECODE, (bytes.to_vec(),))
    }
}

/// Factory through which production code obtains its decoder.
pub static NEW_DECODER: LazyLock<Target<Func<(), Arc<dyn Decoder>>>> = LazyLock::new(|| {
    Target::function(
        "decoder::new_decoder",
        func(|()| -> Arc<dyn Decoder> { Arc::new(JsonDecoder) }),
    )
});

/// Returns whatever decoder the factory target currently produces.
pub fn new_decoder() -> Arc<dyn Decoder> {
    NEW_DECODER.call(())
}

/// Decodes `bytes` with the factory's decoder.
pub fn load_movie(bytes: &[u8]) -> Result<Movie, DecodeError> {
    new_decoder().decode(bytes)
}
