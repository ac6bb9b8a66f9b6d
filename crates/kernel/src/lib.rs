//! Lagrangian droplet tracking kernel
//!
//! This crate tracks dispersed spherical droplets through a carrier-phase
//! flow on a cell-based mesh, integrates their drag, and accumulates what
//! they give back to the carrier. It owns no I/O: the carrier solver
//! supplies fields through interpolators and the mesh through a
//! [`GeometricTracker`].
//!
//! # Modules
//! - [`droplet`] -- Droplet state, the `#[repr(C)]` property block and transfer records.
//! - [`drag`] -- Schiller-Naumann drag and the semi-implicit velocity update.
//! - [`motion`] -- The sub-stepped tracking loop.
//! - [`patch`] -- Wall rebound and the patch hooks.
//! - [`session`] -- Pass context, per-droplet session flags and the coupling accumulator.
//! - [`cloud`] -- The per-subdomain droplet cloud and its pass protocol.
//! - [`tracker`] -- The geometric tracking contract.
//! - [`mesh`] -- Structured block mesh implementing the tracker.
//! - [`interpolation`] -- Field interpolator traits and simple fields.
//! - [`zones`] -- Face-zone registry and crossing statistics.

#![warn(missing_docs)]

pub mod cloud;
pub mod drag;
pub mod droplet;
pub mod error;
pub mod interpolation;
pub mod mesh;
pub mod motion;
pub mod patch;
pub mod session;
pub mod tracker;
pub mod zones;

/// Index of a mesh cell.
pub type CellId = usize;

/// Index of a mesh face.
pub type FaceId = usize;

/// Index of a boundary patch.
pub type PatchId = usize;

pub use cloud::{DropletCloud, Migration, PassReport};
pub use drag::{drag_rate, schiller_naumann, CarrierSample};
pub use droplet::{Droplet, DropletProperties, TransferRecord};
pub use error::{CloudError, DropletError, TrackingError};
pub use interpolation::{CellField, ScalarInterpolator, UniformField, VectorInterpolator};
pub use mesh::{BlockMesh, PatchKind, Side};
pub use patch::WallModel;
pub use session::{
    CarrierPhase, CouplingAccumulator, CouplingMode, PassContext, TrackingSession, ViscositySource,
};
pub use tracker::{BoundaryEvent, GeometricTracker, TrackStep};
pub use zones::{FaceZones, ZoneSample, ZoneSummary};
