use std::fmt;

use http::HeaderValue;

use crate::Error;

/// Version used when `AUSPICE_VERSION` is not set.
pub const DEFAULT_VERSION: &str = "tst";

/// Value of the `Via` header appended by this proxy on every hop, which looks
/// like `1.1 localhost (Auspice v1.0.0)`. It never changes while the process
/// is running, so it's built once at startup and cloned into the stages that
/// need it. Cloning only bumps a reference count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViaIdentity {
    value: HeaderValue,
}

impl ViaIdentity {
    /// Builds the identity for the given proxy `version`. Fails if the version
    /// contains characters not allowed in header values.
    pub fn new(version: &str) -> Result<Self, Error> {
        let via = format!("1.1 localhost (Auspice v{version})");

        match HeaderValue::from_str(&via) {
            Ok(value) => Ok(Self { value }),
            Err(_) => Err(Error::InvalidVersion(version.to_owned())),
        }
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.value
    }
}

impl Default for ViaIdentity {
    fn default() -> Self {
        Self {
            value: HeaderValue::from_static("1.1 localhost (Auspice vtst)"),
        }
    }
}

impl fmt::Display for ViaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Built from a &str, so it's valid UTF-8.
        f.write_str(self.value.to_str().unwrap_or_default())
    }
}
