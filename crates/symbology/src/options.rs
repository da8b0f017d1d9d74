use serde::{Deserialize, Serialize};

use crate::symbol::FormatSet;

/// Knobs handed to the decoding backend on every call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Symbologies the backend should look for.
    pub symbologies: FormatSet,
    /// Spend extra passes on hard images (inverted, downscaled).
    pub try_harder: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            symbologies: FormatSet::all(),
            try_harder: false,
        }
    }
}

impl DecodeOptions {
    pub fn with_symbologies(mut self, symbologies: FormatSet) -> Self {
        self.symbologies = symbologies;
        self
    }

    pub fn with_try_harder(mut self, try_harder: bool) -> Self {
        self.try_harder = try_harder;
        self
    }
}
