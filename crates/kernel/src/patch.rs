//! Patch interactions: what happens when a droplet sub-step ends on a
//! boundary face.
//!
//! The tracker classifies the face into a [`BoundaryEvent`]; the droplet
//! reacts through one of the hooks below.

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::droplet::Droplet;
use crate::session::TrackingSession;
use crate::tracker::BoundaryEvent;

/// Normal restitution coefficient for droplet-wall impact.
pub const WALL_RESTITUTION: f64 = 0.97;

/// Tangential velocity loss per wall contact.
pub const WALL_FRICTION: f64 = 0.09;

/// Inelastic, frictional wall rebound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallModel {
    /// Fraction of the normal speed kept after rebound
    #[serde(default = "default_restitution")]
    pub restitution: f64,
    /// Fraction of the tangential velocity removed on contact
    #[serde(default = "default_friction")]
    pub friction: f64,
}

fn default_restitution() -> f64 {
    WALL_RESTITUTION
}

fn default_friction() -> f64 {
    WALL_FRICTION
}

impl Default for WallModel {
    fn default() -> Self {
        Self {
            restitution: WALL_RESTITUTION,
            friction: WALL_FRICTION,
        }
    }
}

impl WallModel {
    /// Velocity after contact with a wall whose unit normal `n` points into
    /// the fluid.
    ///
    /// The normal component is reversed and scaled by the restitution only
    /// when the droplet approaches the wall. The tangential component is
    /// damped on every contact.
    pub fn rebound(&self, velocity: DVec3, n: DVec3) -> DVec3 {
        let un = velocity.dot(n);
        let ut = velocity - un * n;
        let mut u = velocity;
        if un < 0.0 {
            u -= (1.0 + self.restitution) * un * n;
        }
        u - self.friction * ut
    }
}

impl Droplet {
    /// Hook run before the default treatment of a generic patch. Returns
    /// `true` if the droplet handled the patch itself; droplets never do.
    pub fn hit_patch(&mut self, _session: &mut TrackingSession<'_>) -> bool {
        false
    }

    /// Reached a subdomain interface: stop tracking here and ask the cloud
    /// to hand the droplet to `neighbour`.
    pub fn hit_processor_patch(&mut self, session: &mut TrackingSession<'_>, neighbour: usize) {
        session.switch_processor = true;
        session.destination = Some(neighbour);
    }

    /// Crossed a periodic patch. A rotational pairing turns the velocity
    /// with the geometry; a translational one leaves it as is.
    pub fn hit_cyclic_patch(&mut self, rotation: Option<DMat3>) {
        if let Some(rotation) = rotation {
            self.velocity = rotation * self.velocity;
        }
    }

    /// Reached a wall with unit normal `normal` pointing into the fluid.
    ///
    /// Returns the momentum handed to the wall by one droplet of the parcel.
    pub fn hit_wall_patch(&mut self, session: &mut TrackingSession<'_>, normal: DVec3) -> DVec3 {
        let before = self.velocity;
        self.velocity = session.context.wall.rebound(before, normal);
        (before - self.velocity) * self.mass(session.context.droplet_density)
    }

    /// Run the patch hook for `event`.
    ///
    /// Returns the momentum handed to a wall, zero for other events.
    pub(crate) fn hit_boundary(
        &mut self,
        session: &mut TrackingSession<'_>,
        event: BoundaryEvent,
    ) -> DVec3 {
        match event {
            BoundaryEvent::None => DVec3::ZERO,
            BoundaryEvent::Cyclic { rotation } => {
                self.hit_cyclic_patch(rotation);
                DVec3::ZERO
            }
            BoundaryEvent::Wall { normal } => self.hit_wall_patch(session, normal),
            BoundaryEvent::Processor { neighbour } => {
                self.hit_processor_patch(session, neighbour);
                DVec3::ZERO
            }
            BoundaryEvent::Patch { .. } => {
                if !self.hit_patch(session) {
                    // Open boundary: the droplet leaves the domain
                    session.keep_particle = false;
                }
                DVec3::ZERO
            }
        }
    }
}
