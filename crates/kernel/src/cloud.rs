//! The droplet cloud: the set of droplets owned by one subdomain, and the
//! per-pass protocol around tracking them.
//!
//! A pass is `reset_sources` then `track_all`, optionally followed by any
//! number of `receive` + `continue_tracking` rounds for droplets handed
//! over by neighbouring subdomains. The momentum source, zone samples and
//! wall impulse read after the pass cover every droplet tracked in it.

use glam::DVec3;
use rayon::prelude::*;

use crate::droplet::{Droplet, TransferRecord};
use crate::error::{CloudError, DropletError};
use crate::patch::WallModel;
use crate::session::{
    CarrierPhase, CouplingAccumulator, CouplingMode, PassContext, TrackingSession,
    DEFAULT_MAX_SUB_STEPS,
};
use crate::tracker::GeometricTracker;
use crate::zones::{FaceZones, ZoneSample, ZoneSummary};

/// Smallest number of droplets handed to one rayon task.
const MIN_PARALLEL_CHUNK: usize = 64;

/// A droplet leaving this subdomain.
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    /// Rank of the receiving subdomain
    pub destination: usize,
    /// Droplet state at the interface
    pub record: TransferRecord,
}

/// Outcome counts of one tracking call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Droplets tracked by the call
    pub tracked: usize,
    /// Tracked droplets still owned by the cloud afterwards
    pub retained: usize,
    /// Droplets that left the domain through an open boundary
    pub removed: usize,
    /// Droplets removed after a tracking failure
    pub failed: usize,
    /// Droplets detached for hand-off, in cloud order
    pub outgoing: Vec<Migration>,
}

impl PassReport {
    /// Fold the counts and migrations of a later call into this report.
    pub fn absorb(&mut self, other: PassReport) {
        self.tracked += other.tracked;
        self.retained += other.retained;
        self.removed += other.removed;
        self.failed += other.failed;
        self.outgoing.extend(other.outgoing);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassPhase {
    /// Sources not reset since the last pass
    Stale,
    /// Sources reset, waiting for `track_all`
    Ready,
    /// `track_all` ran; migrants may continue
    Tracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Untouched,
    Retained,
    Removed,
    Failed,
    Migrate(usize),
}

/// Droplets owned by one subdomain plus their pass outputs.
#[derive(Debug, Clone)]
pub struct DropletCloud {
    droplets: Vec<Droplet>,
    cell_count: usize,
    droplet_density: f64,
    coupling: CouplingMode,
    wall: WallModel,
    zones: FaceZones,
    rank: usize,
    parallel: bool,
    max_sub_steps: usize,
    accumulator: CouplingAccumulator,
    phase: PassPhase,
}

impl DropletCloud {
    /// Empty cloud for a mesh of `cell_count` cells with droplet material
    /// density `droplet_density` (kg/m^3).
    ///
    /// The density must be positive and finite: drag, buoyancy and the
    /// momentum source all divide by or scale with it.
    pub fn new(
        cell_count: usize,
        droplet_density: f64,
        zones: FaceZones,
    ) -> Result<Self, CloudError> {
        if !(droplet_density.is_finite() && droplet_density > 0.0) {
            return Err(CloudError::InvalidDropletDensity(droplet_density));
        }
        let accumulator = CouplingAccumulator::new(cell_count, zones.len());
        Ok(Self {
            droplets: Vec::new(),
            cell_count,
            droplet_density,
            coupling: CouplingMode::default(),
            wall: WallModel::default(),
            zones,
            rank: 0,
            parallel: false,
            max_sub_steps: DEFAULT_MAX_SUB_STEPS,
            accumulator,
            phase: PassPhase::Stale,
        })
    }

    /// Set the coupling mode.
    pub fn with_coupling(mut self, coupling: CouplingMode) -> Self {
        self.coupling = coupling;
        self
    }

    /// Set the wall rebound model.
    pub fn with_wall(mut self, wall: WallModel) -> Self {
        self.wall = wall;
        self
    }

    /// Set the rank of the owning subdomain, stamped on outgoing records.
    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Track droplets on the rayon pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Cap sub-steps per droplet per tracking call.
    pub fn with_max_sub_steps(mut self, max_sub_steps: usize) -> Self {
        self.max_sub_steps = max_sub_steps;
        self
    }

    /// Add a droplet to the cloud.
    pub fn insert(&mut self, droplet: Droplet) {
        self.droplets.push(droplet);
    }

    /// Owned droplets, in cloud order.
    pub fn droplets(&self) -> &[Droplet] {
        &self.droplets
    }

    /// Number of owned droplets.
    pub fn len(&self) -> usize {
        self.droplets.len()
    }

    /// `true` if the cloud owns no droplet.
    pub fn is_empty(&self) -> bool {
        self.droplets.is_empty()
    }

    /// Rank of the owning subdomain.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Coupling mode.
    pub fn coupling(&self) -> CouplingMode {
        self.coupling
    }

    /// Registered face zones.
    pub fn zones(&self) -> &FaceZones {
        &self.zones
    }

    /// Droplet material density (kg/m^3).
    pub fn droplet_density(&self) -> f64 {
        self.droplet_density
    }

    /// Zero the momentum source, clear zone buffers and the wall impulse.
    /// Must be called before every `track_all`.
    pub fn reset_sources(&mut self) {
        self.accumulator.reset(self.cell_count, self.zones.len());
        self.phase = PassPhase::Ready;
    }

    /// Track every owned droplet through a full time step of `track_time`.
    ///
    /// Step fractions are reset to 0 first. Droplets that leave the domain
    /// or fail are dropped; droplets that reach a processor patch are
    /// detached into the report.
    pub fn track_all(
        &mut self,
        tracker: &dyn GeometricTracker,
        carrier: CarrierPhase<'_>,
        track_time: f64,
    ) -> Result<PassReport, CloudError> {
        if self.phase != PassPhase::Ready {
            return Err(CloudError::SourcesNotReset);
        }
        self.check_mesh(tracker)?;
        self.phase = PassPhase::Tracking;

        for droplet in &mut self.droplets {
            droplet.step_fraction = 0.0;
        }
        let report = self.track_pending(tracker, carrier, track_time);
        tracing::debug!(
            rank = self.rank,
            tracked = report.tracked,
            removed = report.removed,
            failed = report.failed,
            outgoing = report.outgoing.len(),
            "cloud pass tracked"
        );
        Ok(report)
    }

    /// Track droplets that have not finished the current step, typically
    /// migrants just passed to [`Self::receive`]. Sources and step
    /// fractions are left as they are.
    pub fn continue_tracking(
        &mut self,
        tracker: &dyn GeometricTracker,
        carrier: CarrierPhase<'_>,
        track_time: f64,
    ) -> Result<PassReport, CloudError> {
        if self.phase != PassPhase::Tracking {
            return Err(CloudError::NoPassInProgress);
        }
        self.check_mesh(tracker)?;
        Ok(self.track_pending(tracker, carrier, track_time))
    }

    /// Adopt droplets handed over by other subdomains.
    ///
    /// Each droplet is placed in the local cell containing its position;
    /// its step fraction and physical attributes are kept. Nothing is
    /// adopted if any record is invalid or lies outside the local mesh.
    pub fn receive(
        &mut self,
        records: &[TransferRecord],
        tracker: &dyn GeometricTracker,
    ) -> Result<usize, CloudError> {
        let mut adopted = Vec::with_capacity(records.len());
        for record in records {
            let cell = tracker
                .locate(record.position)
                .ok_or(DropletError::OutsideMesh(record.position.to_array()))?;
            adopted.push(Droplet::from_record(record, cell)?);
        }
        let count = adopted.len();
        self.droplets.extend(adopted);
        Ok(count)
    }

    /// Per-cell momentum source accumulated since the last reset.
    pub fn momentum_source(&self) -> &[DVec3] {
        self.accumulator.momentum()
    }

    /// Per-zone crossing samples, in zone registration order.
    pub fn zone_samples(&self) -> &[Vec<ZoneSample>] {
        self.accumulator.zone_samples()
    }

    /// Summary of each zone's samples, paired with the zone name.
    pub fn zone_summaries(&self) -> Vec<(String, ZoneSummary)> {
        self.zones
            .zones()
            .iter()
            .zip(self.accumulator.zone_samples())
            .map(|(zone, samples)| (zone.name.clone(), ZoneSummary::from_samples(samples)))
            .collect()
    }

    /// Momentum handed to walls since the last reset.
    pub fn boundary_impulse(&self) -> DVec3 {
        self.accumulator.boundary_impulse()
    }

    /// Sum of the momentum source over all cells.
    pub fn total_momentum(&self) -> DVec3 {
        self.accumulator.total_momentum()
    }

    /// Total momentum of the owned droplets, one droplet per parcel.
    pub fn droplet_momentum(&self) -> DVec3 {
        self.droplets
            .iter()
            .map(|d| d.momentum(self.droplet_density))
            .sum()
    }

    fn check_mesh(&self, tracker: &dyn GeometricTracker) -> Result<(), CloudError> {
        if tracker.cell_count() != self.cell_count {
            return Err(CloudError::MeshMismatch {
                mesh_cells: tracker.cell_count(),
                source_cells: self.cell_count,
            });
        }
        Ok(())
    }

    fn track_pending(
        &mut self,
        tracker: &dyn GeometricTracker,
        carrier: CarrierPhase<'_>,
        track_time: f64,
    ) -> PassReport {
        let context = PassContext {
            tracker,
            carrier,
            zones: &self.zones,
            droplet_density: self.droplet_density,
            coupling: self.coupling,
            wall: self.wall,
            rank: self.rank,
            max_sub_steps: self.max_sub_steps,
        };
        let cells = self.cell_count;
        let zone_count = self.zones.len();

        let outcomes = if self.parallel && self.droplets.len() > MIN_PARALLEL_CHUNK {
            let chunk =
                (self.droplets.len() / rayon::current_num_threads()).max(MIN_PARALLEL_CHUNK);
            let partials: Vec<(CouplingAccumulator, Vec<Outcome>)> = self
                .droplets
                .par_chunks_mut(chunk)
                .map(|droplets| {
                    let mut acc = CouplingAccumulator::new(cells, zone_count);
                    let outcomes = track_chunk(droplets, &context, &mut acc, track_time);
                    (acc, outcomes)
                })
                .collect();
            let mut outcomes = Vec::with_capacity(self.droplets.len());
            for (acc, chunk_outcomes) in partials {
                self.accumulator.merge(acc);
                outcomes.extend(chunk_outcomes);
            }
            outcomes
        } else {
            track_chunk(&mut self.droplets, &context, &mut self.accumulator, track_time)
        };

        let mut report = PassReport::default();
        let droplets = std::mem::take(&mut self.droplets);
        for (droplet, outcome) in droplets.into_iter().zip(outcomes) {
            if outcome != Outcome::Untouched {
                report.tracked += 1;
            }
            match outcome {
                Outcome::Untouched => self.droplets.push(droplet),
                Outcome::Retained => {
                    report.retained += 1;
                    self.droplets.push(droplet);
                }
                Outcome::Removed => report.removed += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::Migrate(destination) => report.outgoing.push(Migration {
                    destination,
                    record: droplet.to_record(self.rank),
                }),
            }
        }
        report
    }
}

fn track_chunk(
    droplets: &mut [Droplet],
    context: &PassContext<'_>,
    accumulator: &mut CouplingAccumulator,
    track_time: f64,
) -> Vec<Outcome> {
    droplets
        .iter_mut()
        .map(|droplet| {
            if droplet.step_fraction >= 1.0 {
                return Outcome::Untouched;
            }
            let mut session = TrackingSession::new(context);
            let keep = droplet.track(&mut session, accumulator, track_time);
            match (keep, session.destination) {
                (true, Some(destination)) if session.switch_processor => {
                    Outcome::Migrate(destination)
                }
                (true, _) => Outcome::Retained,
                (false, _) if session.failure.is_some() => Outcome::Failed,
                (false, _) => Outcome::Removed,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::UniformField;
    use crate::mesh::{BlockMesh, PatchKind, Side};

    struct Carrier {
        rho: UniformField<f64>,
        u: UniformField<DVec3>,
        nu: UniformField<f64>,
    }

    impl Carrier {
        fn new(u: DVec3) -> Self {
            Self {
                rho: UniformField::new(1.2),
                u: UniformField::new(u),
                nu: UniformField::new(1.5e-5),
            }
        }

        fn phase(&self) -> CarrierPhase<'_> {
            CarrierPhase::new(&self.rho, &self.u, &self.nu, DVec3::new(0.0, 0.0, -9.81))
        }
    }

    fn channel() -> BlockMesh {
        BlockMesh::new(DVec3::ZERO, DVec3::new(1.0, 0.2, 0.2), [10, 2, 2])
    }

    #[test]
    fn non_physical_droplet_density_is_rejected() {
        for rho_p in [0.0, -1000.0, f64::NAN, f64::INFINITY] {
            let err = DropletCloud::new(4, rho_p, FaceZones::new()).unwrap_err();
            assert!(matches!(err, CloudError::InvalidDropletDensity(_)), "rho_p={rho_p}");
        }
    }

    #[test]
    fn track_all_requires_reset() {
        let mesh = channel();
        let carrier = Carrier::new(DVec3::X);
        let mut cloud = DropletCloud::new(mesh.cell_count(), 1000.0, FaceZones::new()).unwrap();
        assert_eq!(
            cloud.track_all(&mesh, carrier.phase(), 1e-3).unwrap_err(),
            CloudError::SourcesNotReset
        );
        cloud.reset_sources();
        cloud.track_all(&mesh, carrier.phase(), 1e-3).unwrap();
        // A second pass needs a second reset
        assert_eq!(
            cloud.track_all(&mesh, carrier.phase(), 1e-3).unwrap_err(),
            CloudError::SourcesNotReset
        );
    }

    #[test]
    fn continue_tracking_outside_a_pass_is_rejected() {
        let mesh = channel();
        let carrier = Carrier::new(DVec3::X);
        let mut cloud = DropletCloud::new(mesh.cell_count(), 1000.0, FaceZones::new()).unwrap();
        assert_eq!(
            cloud.continue_tracking(&mesh, carrier.phase(), 1e-3).unwrap_err(),
            CloudError::NoPassInProgress
        );
    }

    #[test]
    fn mesh_mismatch_is_reported() {
        let mesh = channel();
        let carrier = Carrier::new(DVec3::X);
        let mut cloud = DropletCloud::new(3, 1000.0, FaceZones::new()).unwrap();
        cloud.reset_sources();
        assert!(matches!(
            cloud.track_all(&mesh, carrier.phase(), 1e-3),
            Err(CloudError::MeshMismatch { mesh_cells: 40, source_cells: 3 })
        ));
    }

    #[test]
    fn outflow_removes_and_processor_detaches() {
        let mesh = channel()
            .with_side(Side::XMax, PatchKind::Processor { neighbour: 1 })
            .with_side(Side::XMin, PatchKind::Outflow);
        let carrier = Carrier::new(DVec3::ZERO);
        let mut cloud = DropletCloud::new(mesh.cell_count(), 1000.0, FaceZones::new())
            .unwrap()
            .with_rank(0);
        let near_max = DVec3::new(0.95, 0.05, 0.05);
        let near_min = DVec3::new(0.05, 0.05, 0.05);
        let middle = DVec3::new(0.5, 0.05, 0.05);
        for (p, u) in [(near_max, DVec3::X), (near_min, -DVec3::X), (middle, DVec3::ZERO)] {
            let cell = mesh.locate(p).unwrap();
            cloud.insert(Droplet::new(p, cell, 1e-4, u * 10.0).unwrap());
        }

        cloud.reset_sources();
        let report = cloud.track_all(&mesh, carrier.phase(), 0.1).unwrap();
        assert_eq!(report.tracked, 3);
        assert_eq!(report.retained, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.outgoing.len(), 1);
        assert_eq!(report.outgoing[0].destination, 1);
        assert_eq!(report.outgoing[0].record.origin_rank, 0);
        assert!(report.outgoing[0].record.step_fraction < 1.0);
        assert_eq!(cloud.len(), 1);
    }

    #[test]
    fn received_droplet_resumes_within_pass() {
        let mesh = channel();
        let carrier = Carrier::new(DVec3::X);
        let mut cloud = DropletCloud::new(mesh.cell_count(), 1000.0, FaceZones::new()).unwrap();
        cloud.reset_sources();
        cloud.track_all(&mesh, carrier.phase(), 1e-3).unwrap();

        let mut migrant = Droplet::new(DVec3::new(0.0, 0.05, 0.05), 0, 1e-4, DVec3::X).unwrap();
        migrant.step_fraction = 0.5;
        let adopted = cloud.receive(&[migrant.to_record(1)], &mesh).unwrap();
        assert_eq!(adopted, 1);
        assert_eq!(cloud.droplets()[0].step_fraction(), 0.5);

        let report = cloud.continue_tracking(&mesh, carrier.phase(), 1e-3).unwrap();
        assert_eq!(report.tracked, 1);
        assert_eq!(cloud.droplets()[0].step_fraction(), 1.0);
        assert!((cloud.droplets()[0].position().x - 5e-4).abs() < 1e-12);
    }

    #[test]
    fn receive_rejects_records_outside_mesh() {
        let mesh = channel();
        let mut cloud = DropletCloud::new(mesh.cell_count(), 1000.0, FaceZones::new()).unwrap();
        let stray = Droplet::new(DVec3::new(5.0, 0.0, 0.0), 0, 1e-4, DVec3::ZERO).unwrap();
        assert!(matches!(
            cloud.receive(&[stray.to_record(0)], &mesh),
            Err(CloudError::InvalidRecord(DropletError::OutsideMesh(_)))
        ));
        assert!(cloud.is_empty());
    }

    #[test]
    fn parallel_and_serial_passes_agree() {
        let mesh = channel();
        let carrier = Carrier::new(DVec3::new(2.0, 0.0, 0.0));
        let mut zones = FaceZones::new();
        zones.register("mid", mesh.plane_faces(0, 5));
        let build = |parallel: bool| {
            let mut cloud = DropletCloud::new(mesh.cell_count(), 1000.0, zones.clone())
                .unwrap()
                .with_parallel(parallel);
            for i in 0..500 {
                let p = DVec3::new(0.3 + 0.0004 * i as f64, 0.05 + 0.0002 * i as f64, 0.1);
                let d = 5e-5 + 1e-7 * i as f64;
                cloud.insert(Droplet::new(p, mesh.locate(p).unwrap(), d, DVec3::ZERO).unwrap());
            }
            cloud
        };
        let mut serial = build(false);
        let mut parallel = build(true);
        for cloud in [&mut serial, &mut parallel] {
            for _ in 0..20 {
                cloud.reset_sources();
                cloud.track_all(&mesh, carrier.phase(), 5e-3).unwrap();
            }
        }

        assert_eq!(serial.droplets(), parallel.droplets());
        let diff = (serial.total_momentum() - parallel.total_momentum()).length();
        assert!(diff <= 1e-12 * serial.total_momentum().length().max(1e-30));
        let count = |c: &DropletCloud| c.zone_samples()[0].len();
        assert_eq!(count(&serial), count(&parallel));
        let diameters = |c: &DropletCloud| {
            c.zone_samples()[0].iter().map(|s| s.diameter).collect::<Vec<_>>()
        };
        assert_eq!(diameters(&serial), diameters(&parallel));
    }
}
