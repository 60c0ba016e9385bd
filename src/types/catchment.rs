//! Drop-off catchment facility

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::coordinates::Coordinates;

/// A drop-off facility where routes terminate and samples are handed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catchment {
    pub id: Uuid,
    pub coordinates: Coordinates,
}

impl Catchment {
    pub fn new(id: Uuid, coordinates: Coordinates) -> Self {
        Self { id, coordinates }
    }
}
