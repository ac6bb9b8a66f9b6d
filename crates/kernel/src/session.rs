//! Per-pass tracking context, per-droplet session flags and the coupling
//! accumulator.
//!
//! Everything a droplet needs from the outside during one pass is borrowed
//! through [`PassContext`], built once per pass. The only things a droplet
//! writes outside itself are its [`TrackingSession`] flags and the
//! [`CouplingAccumulator`] it is handed.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::drag::CarrierSample;
use crate::error::TrackingError;
use crate::interpolation::{ScalarInterpolator, VectorInterpolator};
use crate::patch::WallModel;
use crate::tracker::GeometricTracker;
use crate::zones::{FaceZones, ZoneSample};
use crate::CellId;

/// Default cap on sub-steps per droplet per tracking call.
pub const DEFAULT_MAX_SUB_STEPS: usize = 10_000;

/// Meaning of the values produced by the viscosity interpolator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViscositySource {
    /// Kinematic viscosity nu (m^2/s), used as is.
    #[default]
    Kinematic,
    /// Dynamic viscosity mu (Pa s), divided by the sampled density.
    Dynamic,
}

/// Whether droplets feed momentum back to the carrier phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CouplingMode {
    /// Droplets follow the carrier; no source is accumulated.
    OneWay,
    /// Droplet momentum changes are returned to the carrier as a source.
    #[default]
    TwoWay,
}

/// Carrier-phase fields and body force, borrowed for one pass.
#[derive(Clone, Copy)]
pub struct CarrierPhase<'a> {
    /// Carrier density
    pub density: &'a dyn ScalarInterpolator,
    /// Carrier velocity
    pub velocity: &'a dyn VectorInterpolator,
    /// Carrier viscosity, see `viscosity_source`
    pub viscosity: &'a dyn ScalarInterpolator,
    /// How to read the viscosity field
    pub viscosity_source: ViscositySource,
    /// Body-force acceleration (m/s^2)
    pub gravity: DVec3,
}

impl<'a> CarrierPhase<'a> {
    /// Bundle carrier interpolators with kinematic viscosity.
    pub fn new(
        density: &'a dyn ScalarInterpolator,
        velocity: &'a dyn VectorInterpolator,
        viscosity: &'a dyn ScalarInterpolator,
        gravity: DVec3,
    ) -> Self {
        Self {
            density,
            velocity,
            viscosity,
            viscosity_source: ViscositySource::Kinematic,
            gravity,
        }
    }

    /// Read the viscosity field as `source`.
    pub fn with_viscosity_source(mut self, source: ViscositySource) -> Self {
        self.viscosity_source = source;
        self
    }

    /// Sample the carrier at `position` in `cell`.
    ///
    /// Non-positive or non-finite density and viscosity are reported as
    /// failures; the drag law divides by both. So are non-finite carrier
    /// velocity and gravity.
    pub fn sample(&self, position: DVec3, cell: CellId) -> Result<CarrierSample, TrackingError> {
        let density = self.density.interpolate(position, cell)?;
        let velocity = self.velocity.interpolate(position, cell)?;
        let viscosity = self.viscosity.interpolate(position, cell)?;

        if !(density.is_finite() && density > 0.0) {
            return Err(TrackingError::NonPhysicalCarrier {
                cell,
                reason: format!("density {density}"),
            });
        }
        if !velocity.is_finite() {
            return Err(TrackingError::NonPhysicalCarrier {
                cell,
                reason: format!("velocity {velocity}"),
            });
        }
        if !self.gravity.is_finite() {
            return Err(TrackingError::NonPhysicalCarrier {
                cell,
                reason: format!("gravity {}", self.gravity),
            });
        }
        let kinematic_viscosity = match self.viscosity_source {
            ViscositySource::Kinematic => viscosity,
            ViscositySource::Dynamic => viscosity / density,
        };
        if !(kinematic_viscosity.is_finite() && kinematic_viscosity > 0.0) {
            return Err(TrackingError::NonPhysicalCarrier {
                cell,
                reason: format!("kinematic viscosity {kinematic_viscosity}"),
            });
        }
        Ok(CarrierSample {
            density,
            velocity,
            kinematic_viscosity,
        })
    }
}

/// Read-only configuration shared by every droplet of a pass.
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    /// Mesh topology service
    pub tracker: &'a dyn GeometricTracker,
    /// Carrier fields
    pub carrier: CarrierPhase<'a>,
    /// Registered face zones
    pub zones: &'a FaceZones,
    /// Droplet material density rho_p (kg/m^3)
    pub droplet_density: f64,
    /// Coupling mode
    pub coupling: CouplingMode,
    /// Wall rebound model
    pub wall: WallModel,
    /// Rank of the local subdomain
    pub rank: usize,
    /// Cap on sub-steps per droplet per call
    pub max_sub_steps: usize,
}

/// Transient per-droplet state of one tracking call.
pub struct TrackingSession<'a> {
    /// Shared pass configuration
    pub context: &'a PassContext<'a>,
    /// Cleared when the droplet must be removed after the call
    pub keep_particle: bool,
    /// Set when the droplet reached a processor patch
    pub switch_processor: bool,
    /// Subdomain the droplet must be handed to
    pub destination: Option<usize>,
    /// Failure that ended tracking, if any
    pub failure: Option<TrackingError>,
}

impl<'a> TrackingSession<'a> {
    /// Fresh session for one droplet.
    pub fn new(context: &'a PassContext<'a>) -> Self {
        Self {
            context,
            keep_particle: true,
            switch_processor: false,
            destination: None,
            failure: None,
        }
    }
}

/// Additive per-pass outputs: momentum source, zone samples and wall
/// impulse.
///
/// Workers each own one and merge them after the pass; merging is
/// associative, and zone buffers are concatenated in merge order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CouplingAccumulator {
    momentum: Vec<DVec3>,
    zone_samples: Vec<Vec<ZoneSample>>,
    boundary_impulse: DVec3,
}

impl CouplingAccumulator {
    /// Zeroed accumulator for `cell_count` cells and `zone_count` zones.
    pub fn new(cell_count: usize, zone_count: usize) -> Self {
        Self {
            momentum: vec![DVec3::ZERO; cell_count],
            zone_samples: vec![Vec::new(); zone_count],
            boundary_impulse: DVec3::ZERO,
        }
    }

    /// Zero everything, resizing to `cell_count` cells and `zone_count` zones.
    pub fn reset(&mut self, cell_count: usize, zone_count: usize) {
        self.momentum.clear();
        self.momentum.resize(cell_count, DVec3::ZERO);
        self.zone_samples.clear();
        self.zone_samples.resize(zone_count, Vec::new());
        self.boundary_impulse = DVec3::ZERO;
    }

    /// Add `delta` to the momentum source of `cell`.
    pub fn add_momentum(&mut self, cell: CellId, delta: DVec3) -> Result<(), TrackingError> {
        let cell_count = self.momentum.len();
        let slot = self
            .momentum
            .get_mut(cell)
            .ok_or(TrackingError::UnknownCell { cell, cell_count })?;
        *slot += delta;
        Ok(())
    }

    /// Append a crossing sample to zone `zone`. Unknown zones are ignored.
    pub fn record_crossing(&mut self, zone: usize, sample: ZoneSample) {
        if let Some(buffer) = self.zone_samples.get_mut(zone) {
            buffer.push(sample);
        }
    }

    /// Add momentum handed to walls.
    pub fn add_boundary_impulse(&mut self, impulse: DVec3) {
        self.boundary_impulse += impulse;
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: CouplingAccumulator) {
        if self.momentum.len() < other.momentum.len() {
            self.momentum.resize(other.momentum.len(), DVec3::ZERO);
        }
        for (acc, m) in self.momentum.iter_mut().zip(other.momentum) {
            *acc += m;
        }
        if self.zone_samples.len() < other.zone_samples.len() {
            self.zone_samples.resize(other.zone_samples.len(), Vec::new());
        }
        for (acc, samples) in self.zone_samples.iter_mut().zip(other.zone_samples) {
            acc.extend(samples);
        }
        self.boundary_impulse += other.boundary_impulse;
    }

    /// Per-cell momentum source.
    pub fn momentum(&self) -> &[DVec3] {
        &self.momentum
    }

    /// Per-zone crossing samples.
    pub fn zone_samples(&self) -> &[Vec<ZoneSample>] {
        &self.zone_samples
    }

    /// Total momentum handed to walls.
    pub fn boundary_impulse(&self) -> DVec3 {
        self.boundary_impulse
    }

    /// Sum of the momentum source over all cells.
    pub fn total_momentum(&self) -> DVec3 {
        self.momentum.iter().copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::UniformField;

    fn sample_at(
        rho: f64,
        mu: f64,
        source: ViscositySource,
    ) -> Result<CarrierSample, TrackingError> {
        let density = UniformField::new(rho);
        let velocity = UniformField::new(DVec3::X);
        let viscosity = UniformField::new(mu);
        CarrierPhase::new(&density, &velocity, &viscosity, DVec3::ZERO)
            .with_viscosity_source(source)
            .sample(DVec3::ZERO, 0)
    }

    #[test]
    fn dynamic_viscosity_is_divided_by_density() {
        let s = sample_at(2.0, 4e-5, ViscositySource::Dynamic).unwrap();
        assert!((s.kinematic_viscosity - 2e-5).abs() < 1e-18);
        let s = sample_at(2.0, 4e-5, ViscositySource::Kinematic).unwrap();
        assert_eq!(s.kinematic_viscosity, 4e-5);
    }

    #[test]
    fn non_physical_samples_are_rejected() {
        assert!(matches!(
            sample_at(0.0, 1e-5, ViscositySource::Kinematic),
            Err(TrackingError::NonPhysicalCarrier { .. })
        ));
        assert!(matches!(
            sample_at(1.0, -1e-5, ViscositySource::Kinematic),
            Err(TrackingError::NonPhysicalCarrier { .. })
        ));
    }

    #[test]
    fn non_finite_gravity_is_rejected() {
        let density = UniformField::new(1.2);
        let velocity = UniformField::new(DVec3::X);
        let viscosity = UniformField::new(1.5e-5);
        let gravity = DVec3::new(0.0, 0.0, f64::NAN);
        let sample =
            CarrierPhase::new(&density, &velocity, &viscosity, gravity).sample(DVec3::ZERO, 4);
        assert!(matches!(sample, Err(TrackingError::NonPhysicalCarrier { cell: 4, .. })));
    }

    #[test]
    fn merge_sums_momentum_and_appends_samples_in_order() {
        let sample = |d: f64| ZoneSample { diameter: d, position: DVec3::ZERO, parcel_count: 1.0 };
        let mut a = CouplingAccumulator::new(2, 1);
        a.add_momentum(0, DVec3::X).unwrap();
        a.record_crossing(0, sample(1.0));
        let mut b = CouplingAccumulator::new(2, 1);
        b.add_momentum(0, DVec3::Y).unwrap();
        b.add_momentum(1, DVec3::Z).unwrap();
        b.record_crossing(0, sample(2.0));
        b.add_boundary_impulse(DVec3::X);

        a.merge(b);
        assert_eq!(a.momentum(), &[DVec3::new(1.0, 1.0, 0.0), DVec3::Z]);
        let diameters: Vec<f64> = a.zone_samples()[0].iter().map(|s| s.diameter).collect();
        assert_eq!(diameters, vec![1.0, 2.0]);
        assert_eq!(a.boundary_impulse(), DVec3::X);
        assert_eq!(a.total_momentum(), DVec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn unknown_cell_is_an_error() {
        let mut acc = CouplingAccumulator::new(1, 0);
        assert!(acc.add_momentum(3, DVec3::X).is_err());
    }

    #[test]
    fn reset_clears_everything() {
        let mut acc = CouplingAccumulator::new(1, 1);
        acc.add_momentum(0, DVec3::X).unwrap();
        acc.add_boundary_impulse(DVec3::Y);
        acc.reset(3, 2);
        assert_eq!(acc, CouplingAccumulator::new(3, 2));
    }
}
