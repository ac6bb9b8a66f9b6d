//! Analytical reference solutions for droplet transport validation.
//!
//! Closed-form and root-found solutions against which tracked droplets can
//! be compared. All drag expressions use the Schiller-Naumann law with the
//! drag rate written as a relaxation frequency:
//!
//! ```text
//! Dc = (24 nu / d) * f(Re) * 0.75 * rho_c / (d * rho_p)
//! ```
//!
//! so that `dU/dt = Dc (Uc - U) + (1 - rho_c/rho_p) g`.

/// Reynolds number below which the drag factor is taken as exactly 1.
pub const STOKES_LIMIT: f64 = 0.01;

/// Schiller-Naumann correction f(Re) = 1 + 0.15 Re^0.687, or 1 in the
/// Stokes limit.
pub fn schiller_naumann_factor(re: f64) -> f64 {
    if re > STOKES_LIMIT {
        1.0 + 0.15 * re.powf(0.687)
    } else {
        1.0
    }
}

/// Drag relaxation frequency Dc (1/s) at slip speed `slip`.
///
/// # Arguments
/// * `slip` - Relative speed |Uc - U| (m/s)
/// * `diameter` - Droplet diameter (m)
/// * `rho_p` - Droplet density (kg/m^3)
/// * `rho_c` - Carrier density (kg/m^3)
/// * `nu` - Carrier kinematic viscosity (m^2/s)
pub fn drag_frequency(slip: f64, diameter: f64, rho_p: f64, rho_c: f64, nu: f64) -> f64 {
    let re = slip * diameter / nu;
    (24.0 * nu / diameter) * schiller_naumann_factor(re) * 0.75 * rho_c / (diameter * rho_p)
}

/// Stokes response time tau = rho_p d^2 / (18 nu rho_c), the inverse of
/// the drag frequency at vanishing slip.
pub fn response_time(diameter: f64, rho_p: f64, rho_c: f64, nu: f64) -> f64 {
    rho_p * diameter * diameter / (18.0 * nu * rho_c)
}

/// Settling speed in the Stokes regime (f = 1):
///
/// ```text
/// v_t = (1 - rho_c/rho_p) g tau
/// ```
pub fn stokes_terminal_velocity(diameter: f64, rho_p: f64, rho_c: f64, nu: f64, g: f64) -> f64 {
    (1.0 - rho_c / rho_p) * g * response_time(diameter, rho_p, rho_c, nu)
}

/// Settling speed with Schiller-Naumann drag, found by bisection on
/// `v Dc(v) = (1 - rho_c/rho_p) g`.
///
/// The drag factor is at least 1, so the root lies between 0 and the
/// Stokes settling speed.
pub fn terminal_velocity(diameter: f64, rho_p: f64, rho_c: f64, nu: f64, g: f64) -> f64 {
    let target = (1.0 - rho_c / rho_p) * g;
    let mut lo = 0.0_f64;
    let mut hi = stokes_terminal_velocity(diameter, rho_p, rho_c, nu, g);
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if mid * drag_frequency(mid, diameter, rho_p, rho_c, nu) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Exact relaxation towards `u_eq` under a constant drag frequency:
/// u(t) = u_eq + (u0 - u_eq) exp(-t / tau).
pub fn relaxation_velocity(u0: f64, u_eq: f64, tau: f64, t: f64) -> f64 {
    u_eq + (u0 - u_eq) * (-t / tau).exp()
}

/// Velocity after `steps` semi-implicit updates of size `dt` with a
/// constant drag frequency `dc`:
///
/// ```text
/// u_n = u_eq + (u0 - u_eq) / (1 + dc dt)^n
/// ```
///
/// Every step moves the velocity towards `u_eq` without overshoot,
/// whatever the size of `dc dt`.
pub fn implicit_velocity(u0: f64, u_eq: f64, dc: f64, dt: f64, steps: i32) -> f64 {
    u_eq + (u0 - u_eq) / (1.0 + dc * dt).powi(steps)
}

/// Relative error between a simulated and an analytical value.
pub fn relative_error(simulated: f64, analytical: f64) -> f64 {
    if analytical.abs() < f64::EPSILON {
        simulated.abs()
    } else {
        (simulated - analytical).abs() / analytical.abs()
    }
}
