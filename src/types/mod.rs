// ABOUTME: Validated domain types shared by configuration and stages.
// ABOUTME: Release names and image references are checked once at parse time.

mod image_ref;
mod release_name;

pub use image_ref::{ImageRef, ParseImageRefError};
pub use release_name::{ReleaseName, ReleaseNameError};
