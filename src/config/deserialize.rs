// ABOUTME: Custom serde deserializers for validated config types.
// ABOUTME: Handles release names and image references.

use serde::Deserialize;

use crate::types::{ImageRef, ReleaseName};

pub fn deserialize_release_name<'de, D>(deserializer: D) -> Result<ReleaseName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ReleaseName::new(&s).map_err(|e| serde::de::Error::custom(format!("project: {e}")))
}

pub fn deserialize_image_ref<'de, D>(deserializer: D) -> Result<ImageRef, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ImageRef::parse(&s).map_err(|e| serde::de::Error::custom(format!("image: {e}")))
}
