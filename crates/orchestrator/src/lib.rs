//! Orchestration Layer
//!
//! This crate drives the droplet kernel for a whole case:
//! - JSON case files describing the block mesh, carrier and injection
//! - Slab decomposition into subdomains joined by processor patches
//! - Threaded tracking passes with droplet hand-off between subdomains
//! - Aggregation of sources and zone samples back onto the global mesh

#![warn(missing_docs)]

pub mod config;
pub mod distributed;
pub mod domain;

pub use config::CaseConfig;
pub use distributed::{DistributedConfig, DistributedError, PassSummary};
pub use domain::Subdomain;

use glam::DVec3;
use kernel::{
    BlockMesh, CarrierPhase, Droplet, UniformField, ViscositySource, ZoneSample, ZoneSummary,
};

/// Create a complete simulation from a case file
///
/// This function performs the full setup pipeline:
/// 1. Load and validate the case file
/// 2. Build the global block mesh and decompose it into slabs
/// 3. Inject droplets into the slab owning each position
/// 4. Build the uniform carrier fields
///
/// # Example
/// ```no_run
/// use orchestrator::create_simulation;
///
/// let mut sim = create_simulation("configs/spray-channel.json")?;
/// sim.run()?;
/// println!("{} droplets left", sim.droplets().len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_simulation(config_path: &str) -> Result<Simulation, Box<dyn std::error::Error>> {
    tracing::info!("Creating simulation from case file: {}", config_path);
    let config = CaseConfig::load(config_path)?;
    tracing::info!("Case loaded: {}", config.name);
    Simulation::new(config)
}

/// Uniform carrier-phase fields of a case
#[derive(Debug, Clone)]
pub struct CarrierFields {
    density: UniformField<f64>,
    velocity: UniformField<DVec3>,
    viscosity: UniformField<f64>,
    viscosity_kind: ViscositySource,
    gravity: DVec3,
}

impl CarrierFields {
    /// Carrier fields described by `config`.
    pub fn from_config(config: &CaseConfig) -> Self {
        Self {
            density: UniformField::new(config.carrier.density),
            velocity: UniformField::new(DVec3::from_array(config.carrier.velocity)),
            viscosity: UniformField::new(config.carrier.viscosity),
            viscosity_kind: config.carrier.viscosity_kind,
            gravity: DVec3::from_array(config.gravity),
        }
    }

    /// Borrow the fields for a tracking pass.
    pub fn phase(&self) -> CarrierPhase<'_> {
        CarrierPhase::new(&self.density, &self.velocity, &self.viscosity, self.gravity)
            .with_viscosity_source(self.viscosity_kind)
    }
}

/// A decomposed case ready to be stepped
#[derive(Debug)]
pub struct Simulation {
    config: CaseConfig,
    mesh: BlockMesh,
    subdomains: Vec<Subdomain>,
    carrier: CarrierFields,
    time: f64,
    passes: usize,
}

impl Simulation {
    /// Set up `config`, which is validated first.
    pub fn new(config: CaseConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        let mesh = domain::build_mesh(&config);
        let subdomains = domain::setup_domain(&config)?;
        let carrier = CarrierFields::from_config(&config);
        tracing::info!(
            "Simulation ready: {} droplets, {:?} coupling, track time {} s",
            subdomains.iter().map(|s| s.cloud.len()).sum::<usize>(),
            config.coupling,
            config.track_time
        );
        Ok(Self {
            config,
            mesh,
            subdomains,
            carrier,
            time: 0.0,
            passes: 0,
        })
    }

    /// Track one time step of `track_time` across all subdomains.
    pub fn step(&mut self) -> Result<PassSummary, DistributedError> {
        let phase = self.carrier.phase();
        let carriers = vec![phase; self.subdomains.len()];
        let summary = distributed::run_pass(
            &mut self.subdomains,
            &carriers,
            &DistributedConfig::new(self.config.track_time),
        )?;
        self.time += self.config.track_time;
        self.passes += 1;

        if summary.failed > 0 {
            tracing::warn!(
                "Pass {}: {} droplet(s) dropped after tracking failures",
                self.passes,
                summary.failed
            );
        }
        tracing::info!(
            "Pass {} (t = {:.6} s): {} retained, {} removed, {} migrations in {} round(s)",
            self.passes,
            self.time,
            summary.retained,
            summary.removed,
            summary.migrations,
            summary.rounds
        );
        Ok(summary)
    }

    /// Run the number of passes the case asks for.
    pub fn run(&mut self) -> Result<Vec<PassSummary>, DistributedError> {
        (0..self.config.passes).map(|_| self.step()).collect()
    }

    /// Case configuration.
    pub fn config(&self) -> &CaseConfig {
        &self.config
    }

    /// Undivided global mesh.
    pub fn mesh(&self) -> &BlockMesh {
        &self.mesh
    }

    /// Subdomains in rank order.
    pub fn subdomains(&self) -> &[Subdomain] {
        &self.subdomains
    }

    /// Simulated time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Passes run so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// All droplets, in rank order. Cells are local to their subdomain.
    pub fn droplets(&self) -> Vec<Droplet> {
        domain::merge_droplets(&self.subdomains)
    }

    /// Momentum source of the last pass on the global cell numbering.
    pub fn momentum_source(&self) -> Vec<DVec3> {
        domain::merge_momentum_source(&self.subdomains, self.mesh.dims())
    }

    /// Zone samples of the last pass, concatenated in rank order.
    pub fn zone_samples(&self) -> Vec<Vec<ZoneSample>> {
        domain::merge_zone_samples(&self.subdomains)
    }

    /// Summary of each zone over all subdomains.
    pub fn zone_summaries(&self) -> Vec<(String, ZoneSummary)> {
        self.config
            .face_zones
            .iter()
            .zip(self.zone_samples())
            .map(|(zone, samples)| (zone.name.clone(), ZoneSummary::from_samples(&samples)))
            .collect()
    }

    /// Total momentum source of the last pass.
    pub fn total_momentum(&self) -> DVec3 {
        self.subdomains.iter().map(|s| s.cloud.total_momentum()).sum()
    }

    /// Momentum handed to walls during the last pass.
    pub fn boundary_impulse(&self) -> DVec3 {
        self.subdomains.iter().map(|s| s.cloud.boundary_impulse()).sum()
    }

    /// Total momentum carried by the droplets.
    pub fn droplet_momentum(&self) -> DVec3 {
        self.subdomains.iter().map(|s| s.cloud.droplet_momentum()).sum()
    }
}

// ===========================================================================
// Result Aggregation Utilities
// ===========================================================================

/// Aggregate zone samples from multiple subdomains by concatenating each
/// zone's buffers in subdomain order.
///
/// # Arguments
/// * `per_subdomain` - One slice of per-zone buffers for each subdomain.
///
/// # Returns
/// One buffer per zone. If subdomains register different numbers of zones,
/// the result length equals the minimum across all subdomains.
pub fn aggregate_zone_samples(per_subdomain: &[&[Vec<ZoneSample>]]) -> Vec<Vec<ZoneSample>> {
    if per_subdomain.is_empty() {
        return Vec::new();
    }

    let zones = per_subdomain.iter().map(|z| z.len()).min().unwrap_or(0);
    (0..zones)
        .map(|zone| {
            per_subdomain
                .iter()
                .flat_map(|buffers| buffers[zone].iter().copied())
                .collect()
        })
        .collect()
}
