//! Carrier-phase field interpolators.
//!
//! The carrier solver owns the fields; the tracking kernel only asks for a
//! value at a point inside a known cell. Implementations must be pure so a
//! single interpolator can be shared by every worker of a pass.

use glam::DVec3;

use crate::error::TrackingError;
use crate::CellId;

/// Scalar field sampled at a point inside a cell.
pub trait ScalarInterpolator: Send + Sync {
    /// Value at `position`, which lies in `cell`.
    fn interpolate(&self, position: DVec3, cell: CellId) -> Result<f64, TrackingError>;
}

/// Vector field sampled at a point inside a cell.
pub trait VectorInterpolator: Send + Sync {
    /// Value at `position`, which lies in `cell`.
    fn interpolate(&self, position: DVec3, cell: CellId) -> Result<DVec3, TrackingError>;
}

/// Field with the same value everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformField<T> {
    value: T,
}

impl<T> UniformField<T> {
    /// Uniform field of `value`.
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl ScalarInterpolator for UniformField<f64> {
    fn interpolate(&self, _position: DVec3, _cell: CellId) -> Result<f64, TrackingError> {
        Ok(self.value)
    }
}

impl VectorInterpolator for UniformField<DVec3> {
    fn interpolate(&self, _position: DVec3, _cell: CellId) -> Result<DVec3, TrackingError> {
        Ok(self.value)
    }
}

/// Piecewise-constant field holding one value per cell.
///
/// Useful when the carrier solver hands over cell-centred values without a
/// point-wise reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct CellField<T> {
    name: &'static str,
    values: Vec<T>,
}

impl<T: Copy> CellField<T> {
    /// Field named `name` with one value per cell.
    pub fn new(name: &'static str, values: Vec<T>) -> Self {
        Self { name, values }
    }

    /// Field with `value` in each of `cell_count` cells.
    pub fn uniform(name: &'static str, value: T, cell_count: usize) -> Self {
        Self::new(name, vec![value; cell_count])
    }

    /// Number of cells covered.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if the field covers no cells.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mutable access to the cell values, for the carrier solver to refresh
    /// between passes.
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    fn lookup(&self, cell: CellId) -> Result<T, TrackingError> {
        self.values.get(cell).copied().ok_or_else(|| TrackingError::Interpolation {
            field: self.name,
            cell,
            reason: format!("field covers {} cells", self.values.len()),
        })
    }
}

impl ScalarInterpolator for CellField<f64> {
    fn interpolate(&self, _position: DVec3, cell: CellId) -> Result<f64, TrackingError> {
        self.lookup(cell)
    }
}

impl VectorInterpolator for CellField<DVec3> {
    fn interpolate(&self, _position: DVec3, cell: CellId) -> Result<DVec3, TrackingError> {
        self.lookup(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_field_ignores_location() {
        let rho = UniformField::new(1.2);
        assert_eq!(rho.interpolate(DVec3::new(5.0, -1.0, 0.0), 99).unwrap(), 1.2);
        let u = UniformField::new(DVec3::X);
        assert_eq!(u.interpolate(DVec3::ZERO, 0).unwrap(), DVec3::X);
    }

    #[test]
    fn cell_field_looks_up_by_cell() {
        let field = CellField::new("density", vec![1.0, 2.0, 3.0]);
        assert_eq!(field.interpolate(DVec3::ZERO, 1).unwrap(), 2.0);
        assert_eq!(field.len(), 3);
    }

    #[test]
    fn cell_field_reports_unknown_cell() {
        let field = CellField::uniform("velocity", DVec3::ZERO, 2);
        let err = field.interpolate(DVec3::ZERO, 5).unwrap_err();
        assert!(matches!(
            err,
            TrackingError::Interpolation { field: "velocity", cell: 5, .. }
        ));
    }
}
