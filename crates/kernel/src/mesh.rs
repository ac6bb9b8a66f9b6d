//! Structured hexahedral block mesh implementing [`GeometricTracker`].
//!
//! The block is an axis-aligned box split into `nx * ny * nz` equal cells.
//! Cells are numbered x-fastest. Faces are numbered in three groups: all
//! x-normal faces, then y-normal, then z-normal, each group x-fastest over
//! its own index ranges (the normal axis has one more plane than cells).
//! Each of the six box sides carries a [`PatchKind`].

use glam::DVec3;

use crate::error::TrackingError;
use crate::tracker::{BoundaryEvent, GeometricTracker, TrackStep};
use crate::{CellId, FaceId, PatchId};

/// Relative tolerance for "on the cell boundary" tests.
const GEOMETRIC_TOLERANCE: f64 = 1e-9;

/// One side of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// x = min
    XMin = 0,
    /// x = max
    XMax = 1,
    /// y = min
    YMin = 2,
    /// y = max
    YMax = 3,
    /// z = min
    ZMin = 4,
    /// z = max
    ZMax = 5,
}

impl Side {
    /// All sides in patch-id order.
    pub const ALL: [Side; 6] = [
        Side::XMin,
        Side::XMax,
        Side::YMin,
        Side::YMax,
        Side::ZMin,
        Side::ZMax,
    ];

    /// Side crossed when leaving along `axis` in the positive (`max`) or
    /// negative direction.
    pub fn from_axis(axis: usize, max: bool) -> Self {
        Self::ALL[2 * axis + usize::from(max)]
    }

    /// Coordinate axis normal to this side.
    pub fn axis(self) -> usize {
        self as usize / 2
    }

    /// `true` for the max side of its axis.
    pub fn is_max(self) -> bool {
        self as usize % 2 == 1
    }

    /// Unit normal pointing from this side into the block.
    pub fn inward_normal(self) -> DVec3 {
        let mut n = [0.0; 3];
        n[self.axis()] = if self.is_max() { -1.0 } else { 1.0 };
        DVec3::from_array(n)
    }

    /// Patch id of this side.
    pub fn patch(self) -> PatchId {
        self as PatchId
    }
}

/// Boundary treatment of one side of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    /// Solid wall; droplets rebound.
    Wall,
    /// Open boundary; droplets leave the domain.
    Outflow,
    /// Translational periodic pairing with the opposite side.
    Cyclic,
    /// Interface to another subdomain.
    Processor {
        /// Rank of the neighbouring subdomain
        neighbour: usize,
    },
}

/// Axis-aligned structured block mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockMesh {
    min: DVec3,
    max: DVec3,
    dims: [usize; 3],
    spacing: DVec3,
    sides: [PatchKind; 6],
}

impl BlockMesh {
    /// Create a block covering `[min, max]` with `dims` cells per axis, all
    /// sides walls.
    ///
    /// # Panics
    /// If any dimension is zero or the box is empty along an axis.
    pub fn new(min: DVec3, max: DVec3, dims: [usize; 3]) -> Self {
        assert!(dims.iter().all(|&n| n > 0), "cell counts must be positive");
        assert!(min.cmplt(max).all(), "block max must exceed min on every axis");
        let extent = max - min;
        let spacing = DVec3::new(
            extent.x / dims[0] as f64,
            extent.y / dims[1] as f64,
            extent.z / dims[2] as f64,
        );
        Self {
            min,
            max,
            dims,
            spacing,
            sides: [PatchKind::Wall; 6],
        }
    }

    /// Set the treatment of one side.
    pub fn with_side(mut self, side: Side, kind: PatchKind) -> Self {
        self.sides[side as usize] = kind;
        self
    }

    /// Treatment of one side.
    pub fn side(&self, side: Side) -> PatchKind {
        self.sides[side as usize]
    }

    /// Lower corner.
    pub fn min(&self) -> DVec3 {
        self.min
    }

    /// Upper corner.
    pub fn max(&self) -> DVec3 {
        self.max
    }

    /// Cells per axis.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Cell edge lengths.
    pub fn spacing(&self) -> DVec3 {
        self.spacing
    }

    /// Cell id of grid index `ijk`.
    pub fn cell_id(&self, ijk: [usize; 3]) -> CellId {
        ijk[0] + self.dims[0] * (ijk[1] + self.dims[1] * ijk[2])
    }

    /// Grid index of `cell`.
    pub fn cell_ijk(&self, cell: CellId) -> [usize; 3] {
        let [nx, ny, _] = self.dims;
        [cell % nx, (cell / nx) % ny, cell / (nx * ny)]
    }

    /// Centre of `cell`.
    pub fn cell_centre(&self, cell: CellId) -> DVec3 {
        let (lo, hi) = self.cell_bounds(self.cell_ijk(cell));
        0.5 * (lo + hi)
    }

    fn cell_bounds(&self, ijk: [usize; 3]) -> (DVec3, DVec3) {
        let index = DVec3::new(ijk[0] as f64, ijk[1] as f64, ijk[2] as f64);
        let lo = self.min + index * self.spacing;
        (lo, lo + self.spacing)
    }

    fn face_group_offset(&self, axis: usize) -> usize {
        let [nx, ny, nz] = self.dims;
        match axis {
            0 => 0,
            1 => (nx + 1) * ny * nz,
            _ => (nx + 1) * ny * nz + nx * (ny + 1) * nz,
        }
    }

    /// Total number of faces.
    pub fn face_count(&self) -> usize {
        let [nx, ny, nz] = self.dims;
        self.face_group_offset(2) + nx * ny * (nz + 1)
    }

    /// Id of the face normal to `axis` at grid index `idx`, where
    /// `idx[axis]` is the plane index in `0..=dims[axis]`.
    pub fn face_id(&self, axis: usize, idx: [usize; 3]) -> FaceId {
        let mut d = self.dims;
        d[axis] += 1;
        self.face_group_offset(axis) + idx[0] + d[0] * (idx[1] + d[1] * idx[2])
    }

    /// All faces of the plane `plane` normal to `axis`, in id order.
    ///
    /// Returns an empty list if the plane is out of range.
    pub fn plane_faces(&self, axis: usize, plane: usize) -> Vec<FaceId> {
        if axis > 2 || plane > self.dims[axis] {
            return Vec::new();
        }
        let mut d = self.dims;
        d[axis] += 1;
        let mut faces = Vec::new();
        for k in 0..d[2] {
            for j in 0..d[1] {
                for i in 0..d[0] {
                    let idx = [i, j, k];
                    if idx[axis] == plane {
                        faces.push(self.face_id(axis, idx));
                    }
                }
            }
        }
        faces
    }

    fn check_cell(&self, cell: CellId) -> Result<[usize; 3], TrackingError> {
        if cell >= self.cell_count() {
            return Err(TrackingError::UnknownCell {
                cell,
                cell_count: self.cell_count(),
            });
        }
        Ok(self.cell_ijk(cell))
    }
}

impl GeometricTracker for BlockMesh {
    fn cell_count(&self) -> usize {
        self.dims.iter().product()
    }

    fn locate(&self, position: DVec3) -> Option<CellId> {
        let mut ijk = [0usize; 3];
        for axis in 0..3 {
            let tol = GEOMETRIC_TOLERANCE * self.spacing[axis];
            let p = position[axis];
            if !(p >= self.min[axis] - tol && p <= self.max[axis] + tol) {
                return None;
            }
            let f = ((p - self.min[axis]) / self.spacing[axis]).floor();
            ijk[axis] = (f.max(0.0) as usize).min(self.dims[axis] - 1);
        }
        Some(self.cell_id(ijk))
    }

    fn advance(
        &self,
        position: DVec3,
        cell: CellId,
        displacement: DVec3,
        fraction_budget: f64,
    ) -> Result<TrackStep, TrackingError> {
        let ijk = self.check_cell(cell)?;
        let (lo, hi) = self.cell_bounds(ijk);

        for axis in 0..3 {
            let tol = GEOMETRIC_TOLERANCE * self.spacing[axis];
            if position[axis] < lo[axis] - tol || position[axis] > hi[axis] + tol {
                return Err(TrackingError::DegenerateCell {
                    cell,
                    reason: format!("position {position} lies outside the cell"),
                });
            }
        }

        if !displacement.is_finite() {
            return Err(TrackingError::DegenerateCell {
                cell,
                reason: format!("non-finite displacement {displacement}"),
            });
        }

        // Parametric distance to the first face in the direction of travel
        let mut hit: Option<(usize, f64)> = None;
        for axis in 0..3 {
            let d = displacement[axis];
            if d == 0.0 {
                continue;
            }
            let bound = if d > 0.0 { hi[axis] } else { lo[axis] };
            let t = ((bound - position[axis]) / d).max(0.0);
            if hit.map_or(true, |(_, best)| t < best) {
                hit = Some((axis, t));
            }
        }

        let (axis, t) = match hit {
            Some((axis, t)) if t < 1.0 => (axis, t),
            _ => {
                return Ok(TrackStep {
                    position: position + displacement,
                    cell,
                    face: None,
                    fraction: fraction_budget,
                    event: BoundaryEvent::None,
                });
            }
        };

        let forward = displacement[axis] > 0.0;
        let mut reached = position + t * displacement;
        reached[axis] = if forward { hi[axis] } else { lo[axis] };

        let mut face_idx = ijk;
        if forward {
            face_idx[axis] += 1;
        }
        let face = self.face_id(axis, face_idx);
        let fraction = t * fraction_budget;

        let interior = if forward {
            ijk[axis] + 1 < self.dims[axis]
        } else {
            ijk[axis] > 0
        };
        if interior {
            let mut next = ijk;
            if forward {
                next[axis] += 1;
            } else {
                next[axis] -= 1;
            }
            return Ok(TrackStep {
                position: reached,
                cell: self.cell_id(next),
                face: Some(face),
                fraction,
                event: BoundaryEvent::None,
            });
        }

        let side = Side::from_axis(axis, forward);
        let step = match self.side(side) {
            PatchKind::Wall => TrackStep {
                position: reached,
                cell,
                face: Some(face),
                fraction,
                event: BoundaryEvent::Wall {
                    normal: side.inward_normal(),
                },
            },
            PatchKind::Outflow => TrackStep {
                position: reached,
                cell,
                face: Some(face),
                fraction,
                event: BoundaryEvent::Patch { patch: side.patch() },
            },
            PatchKind::Processor { neighbour } => TrackStep {
                position: reached,
                cell,
                face: Some(face),
                fraction,
                event: BoundaryEvent::Processor { neighbour },
            },
            PatchKind::Cyclic => {
                let mut wrapped = ijk;
                let mut opposite_face = face_idx;
                if forward {
                    wrapped[axis] = 0;
                    opposite_face[axis] = 0;
                    reached[axis] = self.min[axis];
                } else {
                    wrapped[axis] = self.dims[axis] - 1;
                    opposite_face[axis] = self.dims[axis];
                    reached[axis] = self.max[axis];
                }
                TrackStep {
                    position: reached,
                    cell: self.cell_id(wrapped),
                    face: Some(self.face_id(axis, opposite_face)),
                    fraction,
                    event: BoundaryEvent::Cyclic { rotation: None },
                }
            }
        };
        Ok(step)
    }
}
