//! Case file parsing and validation for droplet transport runs

use kernel::session::DEFAULT_MAX_SUB_STEPS;
use kernel::{CouplingMode, ViscositySource, WallModel};
use serde::{Deserialize, Serialize};
use std::fs;

/// Main case configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseConfig {
    /// Human-readable case name
    pub name: String,
    /// Mesh bounding box
    pub domain: DomainBounds,
    /// Cells per axis [nx, ny, nz]
    pub cells: [usize; 3],
    /// Boundary treatment per box side
    #[serde(default)]
    pub boundary_conditions: BoundaryConditions,
    /// Droplet material density (kg/m^3)
    pub droplet_density: f64,
    /// One-way or two-way momentum coupling
    #[serde(default)]
    pub coupling: CouplingMode,
    /// Gravity vector (m/s^2)
    #[serde(default = "default_gravity")]
    pub gravity: [f64; 3],
    /// Carrier phase state
    pub carrier: CarrierConfig,
    /// Wall rebound coefficients
    #[serde(default)]
    pub wall: WallModel,
    /// Initial droplets
    #[serde(default)]
    pub injection: InjectionConfig,
    /// Face zones to sample
    #[serde(default)]
    pub face_zones: Vec<FaceZoneConfig>,
    /// Duration of one pass (s)
    pub track_time: f64,
    /// Number of passes to run
    #[serde(default = "default_passes")]
    pub passes: usize,
    /// Number of slab subdomains along x
    #[serde(default = "default_subdomains")]
    pub subdomains: usize,
    /// Track each subdomain's droplets on the rayon pool
    #[serde(default)]
    pub parallel: bool,
    /// Sub-step cap per droplet per pass
    #[serde(default = "default_max_sub_steps")]
    pub max_sub_steps: usize,
}

/// Domain bounding box
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainBounds {
    /// Minimum corner [x, y, z]
    pub min: [f64; 3],
    /// Maximum corner [x, y, z]
    pub max: [f64; 3],
}

/// Boundary condition type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryType {
    /// Solid wall; droplets rebound
    #[default]
    Wall,
    /// Open boundary; droplets leave
    Outflow,
    /// Periodic pairing with the opposite side
    Cyclic,
}

/// Boundary conditions for all six domain faces
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryConditions {
    /// X minimum face boundary
    #[serde(default)]
    pub x_min: BoundaryType,
    /// X maximum face boundary
    #[serde(default)]
    pub x_max: BoundaryType,
    /// Y minimum face boundary
    #[serde(default)]
    pub y_min: BoundaryType,
    /// Y maximum face boundary
    #[serde(default)]
    pub y_max: BoundaryType,
    /// Z minimum face boundary
    #[serde(default)]
    pub z_min: BoundaryType,
    /// Z maximum face boundary
    #[serde(default)]
    pub z_max: BoundaryType,
}

impl BoundaryConditions {
    /// Sides as (min, max) pairs per axis.
    pub fn pairs(&self) -> [(BoundaryType, BoundaryType); 3] {
        [
            (self.x_min, self.x_max),
            (self.y_min, self.y_max),
            (self.z_min, self.z_max),
        ]
    }
}

/// Uniform carrier phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierConfig {
    /// Carrier density (kg/m^3)
    pub density: f64,
    /// Carrier velocity (m/s)
    pub velocity: [f64; 3],
    /// Carrier viscosity, kinematic (m^2/s) or dynamic (Pa s)
    pub viscosity: f64,
    /// How to read `viscosity`
    #[serde(default)]
    pub viscosity_kind: ViscositySource,
}

/// Initial droplet population
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InjectionConfig {
    /// Individually placed droplets
    #[serde(default)]
    pub droplets: Vec<DropletSpec>,
    /// Droplets on a regular lattice
    #[serde(default)]
    pub lattice: Option<LatticeInjector>,
}

/// One injected parcel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropletSpec {
    /// Position [x, y, z]
    pub position: [f64; 3],
    /// Velocity [vx, vy, vz] (m/s)
    #[serde(default)]
    pub velocity: [f64; 3],
    /// Diameter (m)
    pub diameter: f64,
    /// Physical droplets per parcel
    #[serde(default = "default_parcel_count")]
    pub parcel_count: f64,
}

/// Parcels placed at the centres of a regular lattice spanning a box
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatticeInjector {
    /// Lattice box minimum corner
    pub min: [f64; 3],
    /// Lattice box maximum corner
    pub max: [f64; 3],
    /// Parcels per axis
    pub counts: [usize; 3],
    /// Diameter (m)
    pub diameter: f64,
    /// Initial velocity (m/s)
    #[serde(default)]
    pub velocity: [f64; 3],
    /// Physical droplets per parcel
    #[serde(default = "default_parcel_count")]
    pub parcel_count: f64,
}

impl LatticeInjector {
    /// Lattice point positions, x-fastest.
    pub fn positions(&self) -> Vec<[f64; 3]> {
        let [nx, ny, nz] = self.counts;
        let mut out = Vec::with_capacity(nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let idx = [i, j, k];
                    let mut p = [0.0; 3];
                    for axis in 0..3 {
                        let step = (self.max[axis] - self.min[axis]) / self.counts[axis] as f64;
                        p[axis] = self.min[axis] + (idx[axis] as f64 + 0.5) * step;
                    }
                    out.push(p);
                }
            }
        }
        out
    }
}

/// Face zone: a whole mesh plane normal to one axis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceZoneConfig {
    /// Zone name
    pub name: String,
    /// Normal axis (0 = x, 1 = y, 2 = z)
    pub axis: usize,
    /// Plane index along the axis, 0..=cells[axis]
    pub plane: usize,
}

// Default values
fn default_gravity() -> [f64; 3] {
    [0.0, 0.0, -9.81]
}

fn default_passes() -> usize {
    1
}

fn default_subdomains() -> usize {
    1
}

fn default_max_sub_steps() -> usize {
    DEFAULT_MAX_SUB_STEPS
}

fn default_parcel_count() -> f64 {
    1.0
}

impl CaseConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read case file {}: {}", path, e))?;

        let config = Self::from_json(&contents)?;
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(contents: &str) -> Result<Self, String> {
        let config: CaseConfig = serde_json::from_str(contents)
            .map_err(|e| format!("Failed to parse case JSON: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        // Check domain bounds
        for (axis, label) in ["x", "y", "z"].iter().enumerate() {
            if !(self.domain.min[axis] < self.domain.max[axis]) {
                return Err(format!("Domain min.{label} must be less than max.{label}"));
            }
        }

        // Check cell counts
        if self.cells.iter().any(|&n| n == 0) {
            return Err("Cell counts must be at least 1 on every axis".to_string());
        }

        // Check densities and viscosity
        if !(self.droplet_density > 0.0 && self.droplet_density.is_finite()) {
            return Err("Droplet density must be positive".to_string());
        }
        if !(self.carrier.density > 0.0 && self.carrier.density.is_finite()) {
            return Err("Carrier density must be positive".to_string());
        }
        if !(self.carrier.viscosity > 0.0 && self.carrier.viscosity.is_finite()) {
            return Err("Carrier viscosity must be positive".to_string());
        }
        if !self.carrier.velocity.iter().chain(&self.gravity).all(|c| c.is_finite()) {
            return Err("Carrier velocity and gravity must be finite".to_string());
        }

        // Check wall coefficients
        if !(0.0..=1.0).contains(&self.wall.restitution) {
            return Err("Wall restitution must be in range [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.wall.friction) {
            return Err("Wall friction must be in range [0, 1]".to_string());
        }

        // Check time stepping
        if !(self.track_time > 0.0 && self.track_time.is_finite()) {
            return Err("track_time must be positive".to_string());
        }
        if self.passes == 0 {
            return Err("passes must be at least 1".to_string());
        }
        if self.max_sub_steps == 0 {
            return Err("max_sub_steps must be at least 1".to_string());
        }

        // Check decomposition
        if self.subdomains == 0 {
            return Err("subdomains must be at least 1".to_string());
        }
        if self.subdomains > self.cells[0] {
            return Err(format!(
                "Cannot split {} cells along x into {} subdomains",
                self.cells[0], self.subdomains
            ));
        }

        self.validate_cyclic_boundaries()?;
        self.validate_face_zones()?;
        self.validate_injection()?;

        Ok(())
    }

    /// Validate that cyclic boundaries are properly paired
    fn validate_cyclic_boundaries(&self) -> Result<(), String> {
        let labels = ["x", "y", "z"];
        for (axis, (lo, hi)) in self.boundary_conditions.pairs().into_iter().enumerate() {
            if (lo == BoundaryType::Cyclic) != (hi == BoundaryType::Cyclic) {
                let l = labels[axis];
                return Err(format!("Cyclic boundaries must be paired: {l}_min and {l}_max"));
            }
        }
        if self.subdomains > 1 && self.boundary_conditions.x_min == BoundaryType::Cyclic {
            return Err("Cyclic x boundaries cannot be combined with x slab subdomains".to_string());
        }
        Ok(())
    }

    /// Validate face zone axes and planes
    fn validate_face_zones(&self) -> Result<(), String> {
        for zone in &self.face_zones {
            if zone.axis > 2 {
                return Err(format!("Face zone {}: axis must be 0, 1 or 2", zone.name));
            }
            if zone.plane > self.cells[zone.axis] {
                return Err(format!(
                    "Face zone {}: plane {} out of range 0..={}",
                    zone.name, zone.plane, self.cells[zone.axis]
                ));
            }
        }
        Ok(())
    }

    /// Validate injected droplets lie inside the domain with sane sizes
    fn validate_injection(&self) -> Result<(), String> {
        let inside = |p: &[f64; 3]| {
            (0..3).all(|a| p[a] >= self.domain.min[a] && p[a] <= self.domain.max[a])
        };

        for (i, d) in self.injection.droplets.iter().enumerate() {
            if !inside(&d.position) {
                return Err(format!("Injected droplet {i} lies outside the domain"));
            }
            if !(d.diameter > 0.0) {
                return Err(format!("Injected droplet {i} must have a positive diameter"));
            }
        }
        if let Some(lattice) = &self.injection.lattice {
            if lattice.counts.iter().any(|&n| n == 0) {
                return Err("Lattice counts must be at least 1 on every axis".to_string());
            }
            if !(inside(&lattice.min) && inside(&lattice.max)) {
                return Err("Lattice box must lie inside the domain".to_string());
            }
            if !(lattice.diameter > 0.0) {
                return Err("Lattice diameter must be positive".to_string());
            }
        }
        Ok(())
    }

    /// Total number of injected parcels
    pub fn injected_count(&self) -> usize {
        self.injection.droplets.len()
            + self
                .injection
                .lattice
                .as_ref()
                .map_or(0, |l| l.counts.iter().product())
    }
}
