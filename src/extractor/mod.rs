// SPDX-License-Identifier: GPL-3.0-only
pub mod traits;
pub mod zip;

pub use traits::{ExtractError, ExtractionLimits, Extractor};
pub use zip::ZipExtractor;
