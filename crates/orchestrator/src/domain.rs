//! Domain setup: block mesh, face zones, injected droplets and the slab
//! decomposition into subdomains.
//!
//! Subdomains split the global block along x into contiguous cell slabs.
//! Interfaces between slabs are processor patches; every other side keeps
//! the treatment from the case file.

use glam::DVec3;
use kernel::{
    BlockMesh, CellId, CloudError, Droplet, DropletCloud, DropletError, FaceZones,
    GeometricTracker, PatchKind, Side, ZoneSample,
};

use crate::config::{BoundaryType, CaseConfig};

/// One slab of the decomposed domain and the droplets it owns.
#[derive(Debug, Clone)]
pub struct Subdomain {
    /// Rank of the subdomain, also its slab index along x
    pub rank: usize,
    /// First global x cell index covered by the slab
    pub x_offset: usize,
    /// Local mesh of the slab
    pub mesh: BlockMesh,
    /// Droplets owned by the slab
    pub cloud: DropletCloud,
}

impl Subdomain {
    /// Global cell id of local cell `cell` in a global mesh with
    /// `global_dims` cells per axis.
    pub fn global_cell(&self, cell: CellId, global_dims: [usize; 3]) -> CellId {
        let [i, j, k] = self.mesh.cell_ijk(cell);
        (i + self.x_offset) + global_dims[0] * (j + global_dims[1] * k)
    }
}

/// Cell range [start, start + len) of one slab along x.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slab {
    /// First global x cell index
    pub start: usize,
    /// Number of x cells
    pub len: usize,
}

/// Map a case boundary type onto a mesh patch.
pub fn patch_kind(boundary: BoundaryType) -> PatchKind {
    match boundary {
        BoundaryType::Wall => PatchKind::Wall,
        BoundaryType::Outflow => PatchKind::Outflow,
        BoundaryType::Cyclic => PatchKind::Cyclic,
    }
}

/// Build the undivided global mesh of the case.
pub fn build_mesh(config: &CaseConfig) -> BlockMesh {
    let bc = &config.boundary_conditions;
    BlockMesh::new(
        DVec3::from_array(config.domain.min),
        DVec3::from_array(config.domain.max),
        config.cells,
    )
    .with_side(Side::XMin, patch_kind(bc.x_min))
    .with_side(Side::XMax, patch_kind(bc.x_max))
    .with_side(Side::YMin, patch_kind(bc.y_min))
    .with_side(Side::YMax, patch_kind(bc.y_max))
    .with_side(Side::ZMin, patch_kind(bc.z_min))
    .with_side(Side::ZMax, patch_kind(bc.z_max))
}

/// Split `nx` cells into `n` contiguous slabs, the first `nx % n` one cell
/// longer than the rest.
pub fn decompose_domain(nx: usize, n: usize) -> Vec<Slab> {
    let base = nx / n;
    let extra = nx % n;
    let mut start = 0;
    (0..n)
        .map(|rank| {
            let len = base + usize::from(rank < extra);
            let slab = Slab { start, len };
            start += len;
            slab
        })
        .collect()
}

/// Local mesh of one slab of `global`.
pub fn slab_mesh(global: &BlockMesh, slabs: &[Slab], rank: usize) -> BlockMesh {
    let slab = slabs[rank];
    let n = slabs.len();
    let dx = global.spacing().x;
    let mut min = global.min();
    let mut max = global.max();
    min.x = global.min().x + slab.start as f64 * dx;
    if rank + 1 < n {
        max.x = global.min().x + (slab.start + slab.len) as f64 * dx;
    }
    let [_, ny, nz] = global.dims();

    let mut mesh = BlockMesh::new(min, max, [slab.len, ny, nz]);
    for side in Side::ALL {
        mesh = mesh.with_side(side, global.side(side));
    }
    if rank > 0 {
        mesh = mesh.with_side(Side::XMin, PatchKind::Processor { neighbour: rank - 1 });
    }
    if rank + 1 < n {
        mesh = mesh.with_side(Side::XMax, PatchKind::Processor { neighbour: rank + 1 });
    }
    mesh
}

/// Face zones of the case expressed in the face numbering of `mesh`,
/// whose first x cell is global x index `x_offset`.
///
/// An x-normal plane outside the slab yields an empty zone, so zone
/// indices agree across subdomains.
pub fn build_zones(config: &CaseConfig, mesh: &BlockMesh, x_offset: usize) -> FaceZones {
    let mut zones = FaceZones::new();
    for zone in &config.face_zones {
        let faces = if zone.axis == 0 {
            zone.plane
                .checked_sub(x_offset)
                .map(|local| mesh.plane_faces(0, local))
                .unwrap_or_default()
        } else {
            mesh.plane_faces(zone.axis, zone.plane)
        };
        zones.register(zone.name.clone(), faces);
    }
    zones
}

/// All injected droplets of the case, placed in cells of `mesh`.
pub fn inject_droplets(
    config: &CaseConfig,
    mesh: &BlockMesh,
) -> Result<Vec<Droplet>, DropletError> {
    let mut specs: Vec<([f64; 3], [f64; 3], f64, f64)> = config
        .injection
        .droplets
        .iter()
        .map(|d| (d.position, d.velocity, d.diameter, d.parcel_count))
        .collect();
    if let Some(lattice) = &config.injection.lattice {
        specs.extend(
            lattice
                .positions()
                .into_iter()
                .map(|p| (p, lattice.velocity, lattice.diameter, lattice.parcel_count)),
        );
    }

    specs
        .into_iter()
        .map(|(position, velocity, diameter, parcel_count)| {
            let position = DVec3::from_array(position);
            let cell = mesh
                .locate(position)
                .ok_or(DropletError::OutsideMesh(position.to_array()))?;
            Droplet::new(position, cell, diameter, DVec3::from_array(velocity))?
                .with_parcel_count(parcel_count)
        })
        .collect()
}

/// Set up the decomposed domain with every injected droplet assigned to
/// the slab containing it.
pub fn setup_domain(config: &CaseConfig) -> Result<Vec<Subdomain>, CloudError> {
    let global = build_mesh(config);
    let slabs = decompose_domain(config.cells[0], config.subdomains);

    let mut subdomains: Vec<Subdomain> = slabs
        .iter()
        .enumerate()
        .map(|(rank, slab)| -> Result<Subdomain, CloudError> {
            let mesh = slab_mesh(&global, &slabs, rank);
            let zones = build_zones(config, &mesh, slab.start);
            let cloud = DropletCloud::new(mesh.cell_count(), config.droplet_density, zones)?
                .with_coupling(config.coupling)
                .with_wall(config.wall)
                .with_rank(rank)
                .with_parallel(config.parallel)
                .with_max_sub_steps(config.max_sub_steps);
            Ok(Subdomain {
                rank,
                x_offset: slab.start,
                mesh,
                cloud,
            })
        })
        .collect::<Result<_, _>>()?;

    for droplet in inject_droplets(config, &global)? {
        let [i, _, _] = global.cell_ijk(droplet.cell());
        let rank = slabs
            .iter()
            .position(|s| i >= s.start && i < s.start + s.len)
            .unwrap_or(slabs.len() - 1);
        let sub = &mut subdomains[rank];
        let local = sub
            .mesh
            .locate(droplet.position())
            .ok_or(DropletError::OutsideMesh(droplet.position().to_array()))?;
        let record = droplet.to_record(rank);
        sub.cloud.insert(Droplet::from_record(&record, local)?);
    }

    tracing::info!(
        "Domain setup complete: {} cells in {} subdomain(s), {} droplets",
        global.cell_count(),
        subdomains.len(),
        subdomains.iter().map(|s| s.cloud.len()).sum::<usize>()
    );
    for sub in &subdomains {
        tracing::debug!(
            "  Subdomain {}: x cells {}..{}, {} droplets",
            sub.rank,
            sub.x_offset,
            sub.x_offset + sub.mesh.dims()[0],
            sub.cloud.len()
        );
    }

    Ok(subdomains)
}

/// Droplets of all subdomains, in rank order.
pub fn merge_droplets(subdomains: &[Subdomain]) -> Vec<Droplet> {
    subdomains
        .iter()
        .flat_map(|s| s.cloud.droplets().iter().cloned())
        .collect()
}

/// Momentum source of all subdomains on the global mesh numbering.
pub fn merge_momentum_source(subdomains: &[Subdomain], global_dims: [usize; 3]) -> Vec<DVec3> {
    let mut source = vec![DVec3::ZERO; global_dims.iter().product()];
    for sub in subdomains {
        for (cell, m) in sub.cloud.momentum_source().iter().enumerate() {
            source[sub.global_cell(cell, global_dims)] += *m;
        }
    }
    source
}

/// Per-zone samples of all subdomains, concatenated in rank order.
pub fn merge_zone_samples(subdomains: &[Subdomain]) -> Vec<Vec<ZoneSample>> {
    let per_rank: Vec<&[Vec<ZoneSample>]> =
        subdomains.iter().map(|s| s.cloud.zone_samples()).collect();
    crate::aggregate_zone_samples(&per_rank)
}
