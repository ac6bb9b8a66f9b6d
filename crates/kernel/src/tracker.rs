//! Geometric tracking contract.
//!
//! A tracker moves a point through the mesh one cell at a time: given a
//! displacement it either reaches the end of it inside the current cell or
//! stops on the first face crossed and reports what lies behind that face.

use glam::{DMat3, DVec3};

use crate::error::TrackingError;
use crate::{CellId, FaceId, PatchId};

/// What the droplet met at the end of a sub-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryEvent {
    /// Interior face crossed, or the displacement ended inside the cell.
    None,
    /// Solid wall. `normal` is the unit face normal pointing into the flow.
    Wall {
        /// Unit normal pointing from the wall into the fluid
        normal: DVec3,
    },
    /// Interface to a neighbouring subdomain.
    Processor {
        /// Rank of the subdomain behind the face
        neighbour: usize,
    },
    /// Any other patch; the default policy treats it as an open boundary.
    Patch {
        /// Patch that was hit
        patch: PatchId,
    },
    /// Periodic patch. The tracker has already moved the droplet to the
    /// matching face on the opposite side.
    Cyclic {
        /// Rotation carrying vectors from this side to the opposite one,
        /// `None` for a translational pairing
        rotation: Option<DMat3>,
    },
}

/// Result of advancing a point through at most one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackStep {
    /// Position reached
    pub position: DVec3,
    /// Cell now occupied
    pub cell: CellId,
    /// Face the step ended on, `None` if the whole displacement fitted in
    /// the cell
    pub face: Option<FaceId>,
    /// Step fraction consumed, in `[0, fraction_budget]`
    pub fraction: f64,
    /// Boundary interaction triggered by the face, if any
    pub event: BoundaryEvent,
}

/// Mesh-topology service used by the tracking loop.
pub trait GeometricTracker: Send + Sync {
    /// Number of cells in the local mesh.
    fn cell_count(&self) -> usize;

    /// Cell containing `position`, if it is inside the local mesh.
    fn locate(&self, position: DVec3) -> Option<CellId>;

    /// Move from `position` in `cell` along `displacement`, which covers
    /// `fraction_budget` of the time step, stopping at the first face.
    fn advance(
        &self,
        position: DVec3,
        cell: CellId,
        displacement: DVec3,
        fraction_budget: f64,
    ) -> Result<TrackStep, TrackingError>;
}
