//! Remote astronomy archives.
//!
//! Executes validated queries against the NASA Exoplanet Archive and the
//! ESA Gaia TAP+ service, and searches the NASA image library.

pub mod error;
pub mod image;
pub mod tap;

#[cfg(any(test, feature = "test-util"))]
pub mod test_server;

pub use error::ArchiveError;
pub use image::{extract_keyword, ImageSearch, NasaImageSearch};
pub use tap::{ExoplanetArchive, GaiaArchive, TabularArchive};
