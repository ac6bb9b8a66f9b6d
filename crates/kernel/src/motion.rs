//! The droplet tracking loop.
//!
//! One call to [`Droplet::track`] advances a droplet through the remainder
//! of the current time step. Each sub-step moves the droplet through at
//! most one cell, applies any boundary interaction, then integrates drag
//! over the real time the sub-step covered and books the momentum change
//! and face-zone crossings into the accumulator.

use crate::drag::{buoyant_gravity, drag_rate, semi_implicit_update};
use crate::droplet::Droplet;
use crate::error::TrackingError;
use crate::session::{CouplingAccumulator, CouplingMode, TrackingSession};
use crate::zones::ZoneSample;

impl Droplet {
    /// Track the droplet until its step fraction reaches 1, it leaves the
    /// domain, it fails, or it reaches a processor patch.
    ///
    /// `track_time` is the full duration of the global time step. Returns
    /// `session.keep_particle`: `false` means the cloud must remove the
    /// droplet. When `session.switch_processor` is set the droplet stopped
    /// on a subdomain interface with its step fraction preserved.
    pub fn track(
        &mut self,
        session: &mut TrackingSession<'_>,
        accumulator: &mut CouplingAccumulator,
        track_time: f64,
    ) -> bool {
        session.keep_particle = true;
        session.switch_processor = false;
        session.destination = None;
        session.failure = None;

        let limit = session.context.max_sub_steps;
        let mut sub_steps = 0usize;

        while session.keep_particle && !session.switch_processor && self.step_fraction < 1.0 {
            if sub_steps == limit {
                self.fail(
                    session,
                    TrackingError::SubStepLimit {
                        limit,
                        step_fraction: self.step_fraction,
                        face: self.face,
                    },
                );
                break;
            }
            sub_steps += 1;

            if let Err(e) = self.sub_step(session, accumulator, track_time) {
                self.fail(session, e);
            }
        }

        session.keep_particle
    }

    fn fail(&self, session: &mut TrackingSession<'_>, error: TrackingError) {
        tracing::warn!(
            rank = session.context.rank,
            cell = self.cell,
            "removing droplet after tracking failure: {error}"
        );
        session.keep_particle = false;
        session.failure = Some(error);
    }

    fn sub_step(
        &mut self,
        session: &mut TrackingSession<'_>,
        accumulator: &mut CouplingAccumulator,
        track_time: f64,
    ) -> Result<(), TrackingError> {
        let context = session.context;
        let start = self.step_fraction;
        let f = 1.0 - start;

        let step = context
            .tracker
            .advance(self.position, self.cell, f * track_time * self.velocity, f)?;
        self.position = step.position;
        self.cell = step.cell;
        self.face = step.face;
        self.step_fraction = match step.face {
            // Whole displacement fitted in the cell: the step is complete
            None => 1.0,
            Some(_) => (start + step.fraction).min(1.0),
        };

        let wall_impulse = self.hit_boundary(session, step.event);
        accumulator.add_boundary_impulse(wall_impulse);

        let dt = (self.step_fraction - start) * track_time;

        let carrier = context.carrier.sample(self.position, self.cell)?;
        let rho_p = context.droplet_density;
        let dc = drag_rate(&carrier, self.velocity, self.diameter, rho_p);
        let g = buoyant_gravity(context.carrier.gravity, carrier.density, rho_p);

        let m = self.mass(rho_p);
        let u_old = self.velocity;
        self.velocity = semi_implicit_update(u_old, carrier.velocity, dc, g, dt);
        if !self.velocity.is_finite() {
            return Err(TrackingError::NonFiniteVelocity {
                cell: self.cell,
                velocity: self.velocity.to_array(),
            });
        }

        tracing::trace!(
            cell = self.cell,
            step_fraction = self.step_fraction,
            dt,
            drag_rate = dc,
            "droplet sub-step"
        );

        if context.coupling == CouplingMode::TwoWay {
            // Momentum gained by the droplet is lost by the carrier
            accumulator.add_momentum(self.cell, -(self.velocity - u_old) * m)?;
        }

        if let Some(face) = self.face {
            for &zone in context.zones.zones_of(face) {
                accumulator.record_crossing(
                    zone,
                    ZoneSample {
                        diameter: self.diameter,
                        position: self.position,
                        parcel_count: self.parcel_count,
                    },
                );
            }
        }

        Ok(())
    }
}
