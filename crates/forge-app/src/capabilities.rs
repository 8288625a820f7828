//! What the host platform can do, as reported to script.
//!
//! The page fetches these as JSON from `forge://localhost/forge/capabilities`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
    /// The web-view reports file drops natively, so pages need no drop shim
    pub has_native_drag: bool,
}

impl Capabilities {
    pub fn to_json(&self) -> Vec<u8> {
        // A struct of plain bools always serialises
        serde_json::to_vec(self).unwrap_or_else(|_| b"{}".to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_uses_camel_case() {
        let caps = Capabilities {
            has_native_drag: true,
        };
        assert_eq!(caps.to_json(), br#"{"hasNativeDrag":true}"#.to_vec());
        assert_eq!(Capabilities::default().to_json(), br#"{"hasNativeDrag":false}"#.to_vec());
    }
}
