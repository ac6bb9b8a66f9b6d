//! Droplet state, construction invariants and the transfer record.
//!
//! A droplet is one computational parcel standing for `parcel_count`
//! physical droplets with identical properties. Its physical attributes
//! live in a contiguous `#[repr(C)]` block so a set of droplets can be
//! shipped between subdomains as raw bytes.

use std::f64::consts::PI;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::DropletError;
use crate::{CellId, FaceId};

/// Contiguous block of physical droplet attributes.
///
/// Layout is fixed: diameter, velocity (x, y, z), parcel count, spherical
/// deviation, deviation rate. All `f64`, 56 bytes, no padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
pub struct DropletProperties {
    /// Diameter d (m)
    pub diameter: f64,
    /// Velocity U (m/s)
    pub velocity: [f64; 3],
    /// Number of physical droplets represented by the parcel
    pub parcel_count: f64,
    /// Spherical deviation y
    pub spherical_deviation: f64,
    /// Rate of change of the spherical deviation
    pub deviation_rate: f64,
}

impl DropletProperties {
    /// Size of the block in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Byte view of a single block.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Byte view of a slice of blocks, for bulk transfer.
    pub fn slice_as_bytes(blocks: &[Self]) -> &[u8] {
        bytemuck::cast_slice(blocks)
    }

    /// Rebuild blocks from a byte buffer produced by [`Self::slice_as_bytes`].
    ///
    /// Returns `None` if the length is not a whole number of blocks.
    pub fn from_bytes(bytes: &[u8]) -> Option<Vec<Self>> {
        if bytes.len() % Self::SIZE != 0 {
            return None;
        }
        // The buffer may not be 8-byte aligned, so copy block by block.
        Some(
            bytes
                .chunks_exact(Self::SIZE)
                .map(bytemuck::pod_read_unaligned::<Self>)
                .collect(),
        )
    }

    fn validate(&self) -> Result<(), DropletError> {
        if !(self.diameter.is_finite() && self.diameter > 0.0) {
            return Err(DropletError::InvalidDiameter(self.diameter));
        }
        if !self.velocity.iter().all(|c| c.is_finite()) {
            return Err(DropletError::NonFiniteVelocity(self.velocity));
        }
        if !(self.parcel_count.is_finite() && self.parcel_count >= 0.0) {
            return Err(DropletError::InvalidParcelCount(self.parcel_count));
        }
        if !(self.spherical_deviation.is_finite() && self.deviation_rate.is_finite()) {
            return Err(DropletError::NonFiniteDeviation {
                y: self.spherical_deviation,
                y_dot: self.deviation_rate,
            });
        }
        Ok(())
    }
}

/// A tracked spherical droplet parcel.
#[derive(Debug, Clone, PartialEq)]
pub struct Droplet {
    pub(crate) position: DVec3,
    pub(crate) cell: CellId,
    pub(crate) face: Option<FaceId>,
    pub(crate) step_fraction: f64,
    pub(crate) diameter: f64,
    pub(crate) velocity: DVec3,
    pub(crate) parcel_count: f64,
    pub(crate) spherical_deviation: f64,
    pub(crate) deviation_rate: f64,
}

impl Droplet {
    /// Create a droplet at `position` inside `cell`.
    ///
    /// Parcel count starts at 1 and the deviation state at rest, as a freshly
    /// injected parcel.
    pub fn new(
        position: DVec3,
        cell: CellId,
        diameter: f64,
        velocity: DVec3,
    ) -> Result<Self, DropletError> {
        if !position.is_finite() {
            return Err(DropletError::NonFinitePosition(position.to_array()));
        }
        let properties = DropletProperties {
            diameter,
            velocity: velocity.to_array(),
            parcel_count: 1.0,
            spherical_deviation: 0.0,
            deviation_rate: 0.0,
        };
        properties.validate()?;
        Ok(Self::assemble(position, cell, None, 0.0, properties))
    }

    /// Set the number of physical droplets this parcel represents.
    pub fn with_parcel_count(mut self, parcel_count: f64) -> Result<Self, DropletError> {
        if !(parcel_count.is_finite() && parcel_count >= 0.0) {
            return Err(DropletError::InvalidParcelCount(parcel_count));
        }
        self.parcel_count = parcel_count;
        Ok(self)
    }

    /// Set the spherical deviation and its rate.
    pub fn with_deviation(mut self, y: f64, y_dot: f64) -> Result<Self, DropletError> {
        if !(y.is_finite() && y_dot.is_finite()) {
            return Err(DropletError::NonFiniteDeviation { y, y_dot });
        }
        self.spherical_deviation = y;
        self.deviation_rate = y_dot;
        Ok(self)
    }

    /// Rebuild a droplet from a transfer record, placing it in `cell` of the
    /// receiving mesh. Step fraction and physical attributes are preserved.
    pub fn from_record(record: &TransferRecord, cell: CellId) -> Result<Self, DropletError> {
        if !record.position.is_finite() {
            return Err(DropletError::NonFinitePosition(record.position.to_array()));
        }
        if !(0.0..=1.0).contains(&record.step_fraction) {
            return Err(DropletError::InvalidStepFraction(record.step_fraction));
        }
        record.properties.validate()?;
        Ok(Self::assemble(
            record.position,
            cell,
            None,
            record.step_fraction,
            record.properties,
        ))
    }

    fn assemble(
        position: DVec3,
        cell: CellId,
        face: Option<FaceId>,
        step_fraction: f64,
        properties: DropletProperties,
    ) -> Self {
        Self {
            position,
            cell,
            face,
            step_fraction,
            diameter: properties.diameter,
            velocity: DVec3::from_array(properties.velocity),
            parcel_count: properties.parcel_count,
            spherical_deviation: properties.spherical_deviation,
            deviation_rate: properties.deviation_rate,
        }
    }

    /// Snapshot the droplet into a transfer record.
    pub fn to_record(&self, origin_rank: usize) -> TransferRecord {
        TransferRecord {
            position: self.position,
            cell: self.cell,
            face: self.face,
            step_fraction: self.step_fraction,
            properties: self.properties(),
            origin_rank,
        }
    }

    /// Physical attribute block.
    pub fn properties(&self) -> DropletProperties {
        DropletProperties {
            diameter: self.diameter,
            velocity: self.velocity.to_array(),
            parcel_count: self.parcel_count,
            spherical_deviation: self.spherical_deviation,
            deviation_rate: self.deviation_rate,
        }
    }

    /// Position in global mesh coordinates.
    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// Cell currently occupied.
    pub fn cell(&self) -> CellId {
        self.cell
    }

    /// Face last reached, if the latest sub-step ended on one.
    pub fn face(&self) -> Option<FaceId> {
        self.face
    }

    /// Fraction of the current time step already consumed.
    pub fn step_fraction(&self) -> f64 {
        self.step_fraction
    }

    /// Diameter (m).
    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    /// Velocity (m/s).
    pub fn velocity(&self) -> DVec3 {
        self.velocity
    }

    /// Number of physical droplets in the parcel.
    pub fn parcel_count(&self) -> f64 {
        self.parcel_count
    }

    /// Spherical deviation.
    pub fn spherical_deviation(&self) -> f64 {
        self.spherical_deviation
    }

    /// Rate of change of the spherical deviation.
    pub fn deviation_rate(&self) -> f64 {
        self.deviation_rate
    }

    /// Mass of one droplet of the parcel for material density `rho_p`.
    pub fn mass(&self, rho_p: f64) -> f64 {
        sphere_mass(self.diameter, rho_p)
    }

    /// Momentum of one droplet of the parcel, the quantity exchanged with
    /// the carrier phase.
    pub fn momentum(&self, rho_p: f64) -> DVec3 {
        self.velocity * self.mass(rho_p)
    }
}

/// Mass of a sphere of diameter `d` and density `rho`.
#[inline]
pub fn sphere_mass(d: f64, rho: f64) -> f64 {
    let r = 0.5 * d;
    rho * (4.0 / 3.0) * PI * r * r * r
}

/// Ordered droplet record for restart and inter-subdomain transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Position in global coordinates
    pub position: DVec3,
    /// Cell on the sending mesh
    pub cell: CellId,
    /// Face on the sending mesh
    pub face: Option<FaceId>,
    /// Progress through the current step, preserved across the hand-off
    pub step_fraction: f64,
    /// Physical attribute block
    pub properties: DropletProperties,
    /// Rank of the subdomain that sent the droplet
    pub origin_rank: usize,
}
