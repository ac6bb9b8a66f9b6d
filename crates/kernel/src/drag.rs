//! Drag law and semi-implicit velocity update.
//!
//! Drag follows the Schiller-Naumann correction to Stokes drag:
//!
//! ```text
//! Re   = |Uc - U| d / nu_c
//! f_Re = 1                          for Re <= 0.01
//! f_Re = 1 + 0.15 Re^0.687          otherwise
//! Dc   = (24 nu_c / d) f_Re (3/4) rho_c / (d rho_p)
//! ```
//!
//! `Dc` is a relaxation rate (1/s). For small, dense droplets it is large
//! compared with 1/dt, so the velocity is advanced implicitly in the drag
//! term:
//!
//! ```text
//! U_new = (U + dt (Dc Uc + (1 - rho_c/rho_p) g)) / (1 + dt Dc)
//! ```

use glam::DVec3;

/// Below this Reynolds number the Stokes limit is used as is.
pub const STOKES_REYNOLDS_LIMIT: f64 = 0.01;

/// Carrier-phase state sampled at the droplet position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarrierSample {
    /// Carrier density rho_c (kg/m^3)
    pub density: f64,
    /// Carrier velocity Uc (m/s)
    pub velocity: DVec3,
    /// Carrier kinematic viscosity nu_c (m^2/s)
    pub kinematic_viscosity: f64,
}

/// Particle Reynolds number based on slip velocity.
#[inline]
pub fn reynolds_number(slip_speed: f64, diameter: f64, kinematic_viscosity: f64) -> f64 {
    slip_speed * diameter / kinematic_viscosity
}

/// Schiller-Naumann drag correction factor.
#[inline]
pub fn schiller_naumann(re: f64) -> f64 {
    if re > STOKES_REYNOLDS_LIMIT {
        1.0 + 0.15 * re.powf(0.687)
    } else {
        1.0
    }
}

/// Drag relaxation rate Dc (1/s) for a droplet of `diameter` and material
/// density `rho_p` moving with `velocity` through `carrier`.
pub fn drag_rate(carrier: &CarrierSample, velocity: DVec3, diameter: f64, rho_p: f64) -> f64 {
    let slip = (carrier.velocity - velocity).length();
    let re = reynolds_number(slip, diameter, carrier.kinematic_viscosity);
    let nu = carrier.kinematic_viscosity;
    (24.0 * nu / diameter) * schiller_naumann(re) * 0.75 * (carrier.density / (diameter * rho_p))
}

/// Advance `velocity` over `dt` with drag treated implicitly and buoyancy
/// corrected body force explicitly.
#[inline]
pub fn semi_implicit_update(
    velocity: DVec3,
    carrier_velocity: DVec3,
    drag_rate: f64,
    buoyant_gravity: DVec3,
    dt: f64,
) -> DVec3 {
    (velocity + dt * (drag_rate * carrier_velocity + buoyant_gravity)) / (1.0 + dt * drag_rate)
}

/// Body force reduced by carrier buoyancy: (1 - rho_c/rho_p) g.
#[inline]
pub fn buoyant_gravity(gravity: DVec3, rho_c: f64, rho_p: f64) -> DVec3 {
    (1.0 - rho_c / rho_p) * gravity
}

/// Velocity at which drag balances the buoyancy-corrected body force:
/// Uc + (1 - rho_c/rho_p) g / Dc.
pub fn drag_equilibrium_velocity(
    carrier_velocity: DVec3,
    drag_rate: f64,
    buoyant_gravity: DVec3,
) -> DVec3 {
    carrier_velocity + buoyant_gravity / drag_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stokes_regime_has_unit_correction() {
        assert_eq!(schiller_naumann(0.0), 1.0);
        assert_eq!(schiller_naumann(0.01), 1.0);
        assert!(schiller_naumann(0.0100001) > 1.0);
    }

    #[test]
    fn correction_matches_correlation() {
        let re: f64 = 10.0;
        let expected = 1.0 + 0.15 * re.powf(0.687);
        assert!((schiller_naumann(re) - expected).abs() < 1e-12);
    }

    #[test]
    fn stokes_drag_rate_matches_relaxation_time() {
        // In the Stokes limit Dc = 18 mu / (rho_p d^2)
        let carrier = CarrierSample {
            density: 1.2,
            velocity: DVec3::ZERO,
            kinematic_viscosity: 1.5e-5,
        };
        let d = 1e-6;
        let rho_p = 1000.0;
        let dc = drag_rate(&carrier, DVec3::ZERO, d, rho_p);
        let mu = carrier.density * carrier.kinematic_viscosity;
        let expected = 18.0 * mu / (rho_p * d * d);
        assert!((dc - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn stiff_limit_relaxes_to_equilibrium() {
        let uc = DVec3::new(2.0, 0.0, 0.0);
        let g = buoyant_gravity(DVec3::new(0.0, 0.0, -9.81), 1.0, 1000.0);
        let dc = 1e6;
        let dt = 1.0; // dt * Dc = 1e6
        let u = semi_implicit_update(DVec3::new(-50.0, 30.0, 10.0), uc, dc, g, dt);
        let eq = drag_equilibrium_velocity(uc, dc, g);
        assert!((u - eq).length() < 1e-4, "u={u:?}, eq={eq:?}");
        assert!(u.is_finite());
    }

    #[test]
    fn stiff_update_never_overshoots() {
        // Explicit Euler would flip sign and grow for dt*Dc > 2.
        let uc = DVec3::ZERO;
        let mut u = DVec3::new(1.0, 0.0, 0.0);
        for _ in 0..100 {
            u = semi_implicit_update(u, uc, 500.0, DVec3::ZERO, 0.1);
            assert!(u.x >= 0.0 && u.x <= 1.0);
        }
        assert!(u.x < 1e-12);
    }

    #[test]
    fn zero_dt_leaves_velocity_unchanged() {
        let u = DVec3::new(0.3, -0.1, 0.2);
        let out = semi_implicit_update(u, DVec3::X, 42.0, DVec3::new(0.0, 0.0, -9.8), 0.0);
        assert_eq!(out, u);
    }
}
