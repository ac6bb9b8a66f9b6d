//! Error types for droplet construction, tracking and cloud passes.

use thiserror::Error;

use crate::{CellId, FaceId};

/// Precondition violations when building a droplet.
///
/// A droplet that would carry NaNs or a non-physical size is rejected up
/// front rather than tracked.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DropletError {
    /// Diameter is zero, negative or not finite.
    #[error("droplet diameter must be positive and finite, got {0}")]
    InvalidDiameter(f64),
    /// Velocity has a NaN or infinite component.
    #[error("droplet velocity must be finite, got {0:?}")]
    NonFiniteVelocity([f64; 3]),
    /// Position has a NaN or infinite component.
    #[error("droplet position must be finite, got {0:?}")]
    NonFinitePosition([f64; 3]),
    /// Parcel count is negative or not finite.
    #[error("parcel count must be non-negative and finite, got {0}")]
    InvalidParcelCount(f64),
    /// Spherical deviation or its rate is not finite.
    #[error("spherical deviation state must be finite, got y={y}, y_dot={y_dot}")]
    NonFiniteDeviation {
        /// Spherical deviation
        y: f64,
        /// Rate of change of spherical deviation
        y_dot: f64,
    },
    /// Step fraction outside [0, 1].
    #[error("step fraction must lie in [0, 1], got {0}")]
    InvalidStepFraction(f64),
    /// Position could not be located in the local mesh.
    #[error("position {0:?} lies outside the local mesh")]
    OutsideMesh([f64; 3]),
}

/// Per-droplet tracking failure.
///
/// These never abort a pass: the droplet is marked for removal and the
/// error is reported back through the tracking session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    /// The droplet references a cell the mesh does not have.
    #[error("cell {cell} does not exist in a mesh of {cell_count} cells")]
    UnknownCell {
        /// Offending cell
        cell: CellId,
        /// Number of cells in the local mesh
        cell_count: usize,
    },
    /// The tracker could not intersect the displacement with the cell.
    #[error("degenerate geometry in cell {cell}: {reason}")]
    DegenerateCell {
        /// Offending cell
        cell: CellId,
        /// What went wrong
        reason: String,
    },
    /// A field interpolator could not produce a value.
    #[error("interpolation of {field} failed in cell {cell}: {reason}")]
    Interpolation {
        /// Field name (density, velocity, viscosity)
        field: &'static str,
        /// Cell the droplet was in
        cell: CellId,
        /// What went wrong
        reason: String,
    },
    /// The carrier sample cannot drive the drag law.
    #[error("non-physical carrier state in cell {cell}: {reason}")]
    NonPhysicalCarrier {
        /// Cell the droplet was in
        cell: CellId,
        /// What went wrong
        reason: String,
    },
    /// The drag update produced a NaN or infinite velocity.
    #[error("non-finite droplet velocity {velocity:?} in cell {cell}")]
    NonFiniteVelocity {
        /// Cell the droplet was in
        cell: CellId,
        /// Velocity after the update
        velocity: [f64; 3],
    },
    /// The droplet failed to finish its step within the sub-step limit.
    #[error(
        "droplet exceeded {limit} sub-steps (step fraction {step_fraction:.6}, face {face:?})"
    )]
    SubStepLimit {
        /// Configured limit
        limit: usize,
        /// Progress reached
        step_fraction: f64,
        /// Last face reached
        face: Option<FaceId>,
    },
}

/// Violations of the cloud pass protocol.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CloudError {
    /// Droplet material density is zero, negative or not finite.
    #[error("droplet density must be positive and finite, got {0}")]
    InvalidDropletDensity(f64),
    /// `track_all` was called without `reset_sources` since the last pass.
    #[error("momentum sources must be reset before a tracking pass")]
    SourcesNotReset,
    /// `continue_tracking` was called outside a pass.
    #[error("no tracking pass is in progress")]
    NoPassInProgress,
    /// The tracker's mesh does not match the cloud's source field.
    #[error("mesh has {mesh_cells} cells but the momentum source field has {source_cells}")]
    MeshMismatch {
        /// Cells reported by the tracker
        mesh_cells: usize,
        /// Length of the source field
        source_cells: usize,
    },
    /// A received transfer record could not be rebuilt into a droplet.
    #[error("invalid transfer record: {0}")]
    InvalidRecord(#[from] DropletError),
}
