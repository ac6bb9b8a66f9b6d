//! Reference test framework for droplet transport validation
//!
//! Runs shipped case files end to end and validates the final droplet
//! population against analytical settling speeds, domain bounds, parcel
//! bookkeeping and face-zone statistics.

pub mod analytical;

#[cfg(test)]
mod tests;

use orchestrator::{create_simulation, PassSummary, Simulation};

/// Expected result criteria for a reference test
#[derive(Debug, Clone, Default)]
pub struct ExpectedResult {
    /// Droplet position bounds validation
    pub position_bounds: Option<PositionBoundsCheck>,
    /// Settling speed against the Schiller-Naumann terminal velocity
    pub terminal_velocity: Option<TerminalVelocityCheck>,
    /// Every injected droplet accounted for
    pub conservation: Option<ConservationCheck>,
    /// Crossings recorded on named face zones
    pub zone_crossings: Option<ZoneCrossingCheck>,
}

/// Check that droplets remain within specified bounds
#[derive(Debug, Clone)]
pub struct PositionBoundsCheck {
    /// Minimum allowed position [x, y, z]
    pub min: [f64; 3],
    /// Maximum allowed position [x, y, z]
    pub max: [f64; 3],
}

/// Compare each droplet's vertical speed to its terminal velocity
#[derive(Debug, Clone)]
pub struct TerminalVelocityCheck {
    /// Relative tolerance (0.0 to 1.0)
    pub tolerance: f64,
}

/// Check droplet bookkeeping over the run
#[derive(Debug, Clone)]
pub struct ConservationCheck {
    /// Maximum number of droplets dropped after tracking failures
    pub max_failed: usize,
}

/// Check the number of samples collected on face zones
#[derive(Debug, Clone)]
pub struct ZoneCrossingCheck {
    /// Zone name and minimum number of samples over the whole run
    pub min_samples: Vec<(String, usize)>,
}

/// Result of running a reference test
#[derive(Debug)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether test passed
    pub passed: bool,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Pass totals over the run
    pub totals: PassSummary,
    /// Number of passes executed
    pub passes: usize,
    /// Simulated time (seconds)
    pub sim_time: f64,
}

/// Result of an individual validation check
#[derive(Debug)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether check passed
    pub passed: bool,
    /// Detail or error message
    pub message: Option<String>,
}

/// A reference test case
pub struct ReferenceTest {
    /// Test name
    pub name: String,
    /// Path to the case file
    pub config_path: String,
    /// Expected results to validate
    pub expected: ExpectedResult,
}

impl ReferenceTest {
    /// Run the reference test and return results
    pub fn run(&self) -> Result<TestResult, String> {
        tracing::info!("Running reference test: {}", self.name);

        let mut sim = create_simulation(&self.config_path).map_err(|e| e.to_string())?;
        let injected = sim.droplets().len();
        let passes = sim.config().passes;
        let mut zone_totals = vec![0usize; sim.config().face_zones.len()];
        let mut totals = PassSummary::default();

        tracing::info!("Running {} passes with {} droplets...", passes, injected);
        for pass in 0..passes {
            let summary = sim.step().map_err(|e| e.to_string())?;
            totals.rounds = totals.rounds.max(summary.rounds);
            totals.tracked += summary.tracked;
            totals.retained = summary.retained;
            totals.removed += summary.removed;
            totals.failed += summary.failed;
            totals.migrations += summary.migrations;
            for (total, samples) in zone_totals.iter_mut().zip(sim.zone_samples()) {
                *total += samples.len();
            }

            if (pass + 1) % (passes / 10).max(1) == 0 {
                let progress = (pass + 1) as f64 / passes as f64 * 100.0;
                tracing::info!("Progress: {:.0}% ({}/{})", progress, pass + 1, passes);
            }
        }
        tracing::info!(
            "Run complete: {} passes, {:.6}s simulated",
            passes,
            sim.time()
        );

        let mut checks = Vec::new();
        if let Some(ref bounds) = self.expected.position_bounds {
            checks.push(validate_position_bounds(&sim, bounds));
        }
        if let Some(ref terminal) = self.expected.terminal_velocity {
            checks.push(validate_terminal_velocity(&sim, terminal));
        }
        if let Some(ref conservation) = self.expected.conservation {
            checks.push(validate_conservation(&sim, injected, &totals, conservation));
        }
        if let Some(ref zones) = self.expected.zone_crossings {
            checks.push(validate_zone_crossings(&sim, &zone_totals, zones));
        }

        Ok(TestResult {
            name: self.name.clone(),
            passed: checks.iter().all(|c| c.passed),
            checks,
            totals,
            passes,
            sim_time: sim.time(),
        })
    }
}

/// Validate that droplets remain within specified bounds
fn validate_position_bounds(sim: &Simulation, bounds: &PositionBoundsCheck) -> CheckResult {
    let mut violations = 0;
    let mut max_violation = 0.0_f64;

    for d in sim.droplets() {
        let pos = d.position().to_array();
        for axis in 0..3 {
            if pos[axis] < bounds.min[axis] {
                violations += 1;
                max_violation = max_violation.max(bounds.min[axis] - pos[axis]);
            }
            if pos[axis] > bounds.max[axis] {
                violations += 1;
                max_violation = max_violation.max(pos[axis] - bounds.max[axis]);
            }
        }
    }

    CheckResult {
        name: "Position Bounds".to_string(),
        passed: violations == 0,
        message: (violations > 0).then(|| {
            format!(
                "{} droplets out of bounds (max violation: {:.3e} m)",
                violations, max_violation
            )
        }),
    }
}

/// Validate settling speeds against the analytical terminal velocity
fn validate_terminal_velocity(sim: &Simulation, check: &TerminalVelocityCheck) -> CheckResult {
    let config = sim.config();
    let rho_c = config.carrier.density;
    let nu = match config.carrier.viscosity_kind {
        kernel::ViscositySource::Kinematic => config.carrier.viscosity,
        kernel::ViscositySource::Dynamic => config.carrier.viscosity / rho_c,
    };
    let g = glam::DVec3::from_array(config.gravity).length();
    let droplets = sim.droplets();

    if droplets.is_empty() {
        return CheckResult {
            name: "Terminal Velocity".to_string(),
            passed: false,
            message: Some("No droplets left to compare".to_string()),
        };
    }

    let mut worst = 0.0_f64;
    let mut details = Vec::new();
    for d in &droplets {
        let expected =
            analytical::terminal_velocity(d.diameter(), config.droplet_density, rho_c, nu, g);
        let simulated = -d.velocity().z;
        let error = analytical::relative_error(simulated, expected);
        worst = worst.max(error);
        details.push(format!(
            "d={:.0}um: {:.4} vs {:.4} m/s",
            d.diameter() * 1e6,
            simulated,
            expected
        ));
    }

    let passed = worst <= check.tolerance;
    CheckResult {
        name: "Terminal Velocity".to_string(),
        passed,
        message: Some(format!(
            "{} (max error: {:.2}%, tolerance: {:.2}%)",
            details.join(", "),
            worst * 100.0,
            check.tolerance * 100.0
        )),
    }
}

/// Validate that every injected droplet is either owned or removed
fn validate_conservation(
    sim: &Simulation,
    injected: usize,
    totals: &PassSummary,
    check: &ConservationCheck,
) -> CheckResult {
    let remaining = sim.droplets().len();
    let accounted = remaining + totals.removed + totals.failed;
    let passed = accounted == injected && totals.failed <= check.max_failed;
    CheckResult {
        name: "Droplet Conservation".to_string(),
        passed,
        message: Some(format!(
            "Injected: {}, remaining: {}, removed: {}, failed: {}",
            injected, remaining, totals.removed, totals.failed
        )),
    }
}

/// Validate that the named zones saw enough crossings
fn validate_zone_crossings(
    sim: &Simulation,
    zone_totals: &[usize],
    check: &ZoneCrossingCheck,
) -> CheckResult {
    let mut issues = Vec::new();
    let mut found = Vec::new();
    for (name, min) in &check.min_samples {
        let index = sim.config().face_zones.iter().position(|z| &z.name == name);
        match index {
            Some(i) if zone_totals[i] >= *min => {
                found.push(format!("{}: {}", name, zone_totals[i]))
            }
            Some(i) => issues.push(format!("{}: {} samples (need {})", name, zone_totals[i], min)),
            None => issues.push(format!("{}: no such zone", name)),
        }
    }

    CheckResult {
        name: "Zone Crossings".to_string(),
        passed: issues.is_empty(),
        message: Some(if issues.is_empty() {
            found.join(", ")
        } else {
            issues.join(", ")
        }),
    }
}

impl TestResult {
    /// Print a summary of the test result
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Test: {}", self.name);
        println!("{}", "=".repeat(80));
        println!("Status: {}", if self.passed { "PASSED" } else { "FAILED" });
        println!("Passes: {}", self.passes);
        println!("Simulated time: {:.6} s", self.sim_time);
        println!("\nTracking Totals:");
        println!("  Droplet tracks: {}", self.totals.tracked);
        println!("  Removed: {}", self.totals.removed);
        println!("  Failed: {}", self.totals.failed);
        println!("  Migrations: {}", self.totals.migrations);
        println!("  Max exchange rounds: {}", self.totals.rounds);
        println!("\nValidation Checks:");
        for check in &self.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            print!("  [{}] {}", status, check.name);
            if let Some(ref msg) = check.message {
                print!(" - {}", msg);
            }
            println!();
        }
        println!("{}", "=".repeat(80));
    }
}

/// Settling column: one-way coupled droplets released from rest must reach
/// their Schiller-Naumann terminal velocity.
pub fn settling_column_test(configs_dir: &str) -> ReferenceTest {
    ReferenceTest {
        name: "Settling Column".to_string(),
        config_path: format!("{}/settling-column.json", configs_dir),
        expected: ExpectedResult {
            position_bounds: Some(PositionBoundsCheck {
                min: [0.0, 0.0, 0.0],
                max: [0.05, 0.05, 0.5],
            }),
            terminal_velocity: Some(TerminalVelocityCheck { tolerance: 0.01 }),
            conservation: Some(ConservationCheck { max_failed: 0 }),
            zone_crossings: Some(ZoneCrossingCheck {
                min_samples: vec![("z_0.25".to_string(), 1)],
            }),
        },
    }
}

/// Spray channel: a two-way coupled spray injected at high speed is carried
/// downstream, crossing the sampling planes without leaving the box
/// sideways.
pub fn spray_channel_test(configs_dir: &str) -> ReferenceTest {
    ReferenceTest {
        name: "Spray Channel".to_string(),
        config_path: format!("{}/spray-channel.json", configs_dir),
        expected: ExpectedResult {
            position_bounds: Some(PositionBoundsCheck {
                min: [0.0, 0.0, 0.0],
                max: [0.6, 0.1, 0.1],
            }),
            terminal_velocity: None,
            conservation: Some(ConservationCheck { max_failed: 0 }),
            zone_crossings: Some(ZoneCrossingCheck {
                min_samples: vec![("x_0.15".to_string(), 64)],
            }),
        },
    }
}

/// Decomposed duct: droplets handed across three slab interfaces are
/// neither lost nor duplicated.
pub fn decomposed_duct_test(configs_dir: &str) -> ReferenceTest {
    ReferenceTest {
        name: "Decomposed Duct".to_string(),
        config_path: format!("{}/decomposed-duct.json", configs_dir),
        expected: ExpectedResult {
            position_bounds: Some(PositionBoundsCheck {
                min: [0.0, 0.0, 0.0],
                max: [1.0, 0.1, 0.1],
            }),
            terminal_velocity: None,
            conservation: Some(ConservationCheck { max_failed: 0 }),
            zone_crossings: Some(ZoneCrossingCheck {
                min_samples: vec![
                    ("interface_1".to_string(), 16),
                    ("interface_2".to_string(), 1),
                ],
            }),
        },
    }
}

/// All reference tests, reading case files from `configs_dir`
pub fn all_tests(configs_dir: &str) -> Vec<ReferenceTest> {
    vec![
        settling_column_test(configs_dir),
        spray_channel_test(configs_dir),
        decomposed_duct_test(configs_dir),
    ]
}
