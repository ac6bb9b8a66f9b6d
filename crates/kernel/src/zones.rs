//! Face-zone registry and crossing samples.
//!
//! A face zone is a named set of mesh faces used only for diagnostics:
//! every time a droplet sub-step ends on one of its faces, the droplet's
//! diameter, position and parcel count are appended to that zone's buffer.

use std::collections::HashMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::FaceId;

/// One droplet crossing recorded on a zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneSample {
    /// Droplet diameter at the crossing (m)
    pub diameter: f64,
    /// Crossing position
    pub position: DVec3,
    /// Physical droplets represented by the parcel
    pub parcel_count: f64,
}

/// A named set of faces.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceZone {
    /// Zone name
    pub name: String,
    /// Faces in the zone
    pub faces: Vec<FaceId>,
}

/// Ordered registry of the face zones tracked in a pass.
///
/// Zone order fixes the order of the per-zone sample buffers.
#[derive(Debug, Clone, Default)]
pub struct FaceZones {
    zones: Vec<FaceZone>,
    by_face: HashMap<FaceId, Vec<usize>>,
}

impl FaceZones {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone and return its index.
    pub fn register(&mut self, name: impl Into<String>, faces: Vec<FaceId>) -> usize {
        let index = self.zones.len();
        for &face in &faces {
            let entry = self.by_face.entry(face).or_default();
            if !entry.contains(&index) {
                entry.push(index);
            }
        }
        self.zones.push(FaceZone {
            name: name.into(),
            faces,
        });
        index
    }

    /// Number of registered zones.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// `true` if no zone is registered.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zones in registration order.
    pub fn zones(&self) -> &[FaceZone] {
        &self.zones
    }

    /// Index of the zone called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.zones.iter().position(|z| z.name == name)
    }

    /// Indices of every zone containing `face`, ascending.
    pub fn zones_of(&self, face: FaceId) -> &[usize] {
        self.by_face.get(&face).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Summary statistics of a zone's samples for the output stage.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ZoneSummary {
    /// Number of parcel crossings
    pub samples: usize,
    /// Number of physical droplets represented
    pub droplets: f64,
    /// Parcel-weighted arithmetic mean diameter D10 (m)
    pub mean_diameter: f64,
    /// Parcel-weighted Sauter mean diameter D32 (m)
    pub sauter_diameter: f64,
}

impl ZoneSummary {
    /// Summarise a sample buffer. Diameters are zero when no droplet was
    /// represented.
    pub fn from_samples(samples: &[ZoneSample]) -> Self {
        let mut n = 0.0;
        let mut d1 = 0.0;
        let mut d2 = 0.0;
        let mut d3 = 0.0;
        for s in samples {
            let d = s.diameter;
            n += s.parcel_count;
            d1 += s.parcel_count * d;
            d2 += s.parcel_count * d * d;
            d3 += s.parcel_count * d * d * d;
        }
        Self {
            samples: samples.len(),
            droplets: n,
            mean_diameter: if n > 0.0 { d1 / n } else { 0.0 },
            sauter_diameter: if d2 > 0.0 { d3 / d2 } else { 0.0 },
        }
    }
}
