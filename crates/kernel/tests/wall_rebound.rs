//! Wall rebound through the patch hook and through a full tracking pass.

use glam::DVec3;
use kernel::session::DEFAULT_MAX_SUB_STEPS;
use kernel::{
    BlockMesh, CarrierPhase, CouplingMode, Droplet, DropletCloud, FaceZones, GeometricTracker,
    PassContext, TrackingSession, UniformField, WallModel,
};

#[test]
fn hook_reverses_normal_and_damps_tangential() {
    let mesh = BlockMesh::new(DVec3::ZERO, DVec3::ONE, [1, 1, 1]);
    let rho = UniformField::new(1.0);
    let uc = UniformField::new(DVec3::ZERO);
    let nu = UniformField::new(1e-5);
    let zones = FaceZones::new();
    let context = PassContext {
        tracker: &mesh,
        carrier: CarrierPhase::new(&rho, &uc, &nu, DVec3::ZERO),
        zones: &zones,
        droplet_density: 1000.0,
        coupling: CouplingMode::TwoWay,
        wall: WallModel::default(),
        rank: 0,
        max_sub_steps: DEFAULT_MAX_SUB_STEPS,
    };
    let n = DVec3::new(0.0, 0.0, 1.0);

    let on_wall = DVec3::new(0.5, 0.5, 0.0);
    let mut head_on = Droplet::new(on_wall, 0, 1e-4, DVec3::new(0.0, 0.0, -1.0)).unwrap();
    let mut session = TrackingSession::new(&context);
    let impulse = head_on.hit_wall_patch(&mut session, n);
    assert!((head_on.velocity() - DVec3::new(0.0, 0.0, 0.97)).length() < 1e-12);
    assert!(session.keep_particle);
    assert!((impulse.z + 1.97 * head_on.mass(1000.0)).abs() < 1e-20);

    let mut glancing = Droplet::new(on_wall, 0, 1e-4, DVec3::new(1.0, -0.5, -1.0)).unwrap();
    let mut session = TrackingSession::new(&context);
    glancing.hit_wall_patch(&mut session, n);
    let u = glancing.velocity();
    assert!((u.x - 0.91).abs() < 1e-12);
    assert!((u.y + 0.455).abs() < 1e-12);
    assert!((u.z - 0.97).abs() < 1e-12);
}

#[test]
fn droplet_bounces_off_floor_during_a_pass() {
    let mesh = BlockMesh::new(DVec3::ZERO, DVec3::ONE, [2, 2, 2]);
    // Near-vacuum carrier so drag is negligible over the pass
    let rho = UniformField::new(1e-9);
    let uc = UniformField::new(DVec3::ZERO);
    let nu = UniformField::new(1e-5);
    let carrier = CarrierPhase::new(&rho, &uc, &nu, DVec3::ZERO);

    let mut cloud = DropletCloud::new(mesh.cell_count(), 1000.0, FaceZones::new()).unwrap();
    let start = DVec3::new(0.3, 0.3, 0.1);
    let cell = mesh.locate(start).unwrap();
    cloud.insert(Droplet::new(start, cell, 1e-3, DVec3::new(0.5, 0.0, -1.0)).unwrap());

    cloud.reset_sources();
    let report = cloud.track_all(&mesh, carrier, 0.2).unwrap();
    assert_eq!(report.retained, 1);

    let d = &cloud.droplets()[0];
    assert_eq!(d.step_fraction(), 1.0);
    // Half the step to reach the floor, half to climb back at 0.97 m/s
    assert!((d.position().z - 0.097).abs() < 1e-6, "z={}", d.position().z);
    assert!((d.velocity().z - 0.97).abs() < 1e-6);
    assert!((d.velocity().x - 0.455).abs() < 1e-6);
    // Momentum handed to the wall points into it, and stays out of the source
    assert!(cloud.boundary_impulse().z < 0.0);
    assert!(cloud.total_momentum().length() < 1e-15);
}

#[test]
fn custom_wall_model_is_honoured() {
    let mesh = BlockMesh::new(DVec3::ZERO, DVec3::ONE, [1, 1, 1]);
    let rho = UniformField::new(1e-9);
    let uc = UniformField::new(DVec3::ZERO);
    let nu = UniformField::new(1e-5);
    let carrier = CarrierPhase::new(&rho, &uc, &nu, DVec3::ZERO);

    let wall = WallModel {
        restitution: 0.5,
        friction: 0.0,
    };
    let mut cloud = DropletCloud::new(1, 1000.0, FaceZones::new()).unwrap().with_wall(wall);
    let start = DVec3::new(0.9, 0.5, 0.5);
    cloud.insert(Droplet::new(start, 0, 1e-3, DVec3::new(1.0, 0.2, 0.0)).unwrap());

    cloud.reset_sources();
    cloud.track_all(&mesh, carrier, 0.2).unwrap();
    let u = cloud.droplets()[0].velocity();
    assert!((u.x + 0.5).abs() < 1e-6);
    assert!((u.y - 0.2).abs() < 1e-6);
}
