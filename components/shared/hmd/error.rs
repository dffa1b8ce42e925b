/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fmt;

use serde::{Deserialize, Serialize};

/// A numeric error reported by the device runtime.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct DeviceErrorCode(pub i64);

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device error {}", self.0)
    }
}

/// Errors that can be produced while bringing up or configuring the bridge.
///
/// Per-frame operations never return these; they log and degrade instead.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Error {
    /// An operation needed a device session and there was none.
    NoSession,
    /// The runtime or graphics backend cannot drive stereo rendering at all.
    Unsupported(String),
    /// A device or engine resource could not be created.
    ResourceCreation(String),
    /// A preference file could not be parsed.
    InvalidPrefs(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoSession => write!(f, "no HMD session"),
            Error::Unsupported(reason) => write!(f, "unsupported: {}", reason),
            Error::ResourceCreation(what) => write!(f, "could not create {}", what),
            Error::InvalidPrefs(reason) => write!(f, "invalid preferences: {}", reason),
        }
    }
}

impl std::error::Error for Error {}
