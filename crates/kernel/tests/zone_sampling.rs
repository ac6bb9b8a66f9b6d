//! Face-zone crossing samples.

use glam::DVec3;
use kernel::{
    BlockMesh, CarrierPhase, Droplet, DropletCloud, FaceZones, GeometricTracker, UniformField,
    ZoneSummary,
};

fn duct() -> BlockMesh {
    BlockMesh::new(DVec3::ZERO, DVec3::new(1.0, 0.1, 0.1), [4, 1, 1])
}

#[test]
fn crossing_one_zone_appends_exactly_one_sample() {
    let mesh = duct();
    let mut zones = FaceZones::new();
    let first = zones.register("x025", mesh.plane_faces(0, 1));
    let second = zones.register("x075", mesh.plane_faces(0, 3));
    let rho = UniformField::new(1.2);
    let uc = UniformField::new(DVec3::new(1.0, 0.0, 0.0));
    let nu = UniformField::new(1.5e-5);
    let carrier = CarrierPhase::new(&rho, &uc, &nu, DVec3::ZERO);

    let mut cloud = DropletCloud::new(mesh.cell_count(), 1000.0, zones).unwrap();
    let start = DVec3::new(0.2, 0.05, 0.05);
    let droplet = Droplet::new(start, mesh.locate(start).unwrap(), 3e-5, DVec3::new(1.0, 0.0, 0.0))
        .unwrap()
        .with_parcel_count(250.0)
        .unwrap();
    cloud.insert(droplet);

    cloud.reset_sources();
    cloud.track_all(&mesh, carrier, 0.1).unwrap();

    let samples = cloud.zone_samples();
    assert_eq!(samples[first].len(), 1);
    assert!(samples[second].is_empty());
    let s = samples[first][0];
    assert_eq!(s.diameter, 3e-5);
    assert_eq!(s.parcel_count, 250.0);
    assert_eq!(s.position.x, 0.25);
    assert!((s.position.y - 0.05).abs() < 1e-15);

    // Buffers are per pass
    cloud.reset_sources();
    assert!(cloud.zone_samples().iter().all(Vec::is_empty));
}

#[test]
fn face_shared_by_two_zones_records_in_both() {
    let mesh = duct();
    let mut zones = FaceZones::new();
    zones.register("plane", mesh.plane_faces(0, 2));
    zones.register("probe", vec![mesh.face_id(0, [2, 0, 0])]);
    zones.register("elsewhere", mesh.plane_faces(0, 1));
    let rho = UniformField::new(1.2);
    let uc = UniformField::new(DVec3::ZERO);
    let nu = UniformField::new(1.5e-5);
    let carrier = CarrierPhase::new(&rho, &uc, &nu, DVec3::ZERO);

    let mut cloud = DropletCloud::new(mesh.cell_count(), 1000.0, zones).unwrap();
    let start = DVec3::new(0.45, 0.05, 0.05);
    let cell = mesh.locate(start).unwrap();
    cloud.insert(Droplet::new(start, cell, 1e-3, DVec3::new(1.0, 0.0, 0.0)).unwrap());

    cloud.reset_sources();
    cloud.track_all(&mesh, carrier, 0.1).unwrap();
    let counts: Vec<usize> = cloud.zone_samples().iter().map(Vec::len).collect();
    assert_eq!(counts, vec![1, 1, 0]);
}

#[test]
fn summaries_report_mean_and_sauter_diameters() {
    let mesh = duct();
    let mut zones = FaceZones::new();
    zones.register("outlet_plane", mesh.plane_faces(0, 2));
    let rho = UniformField::new(1.2);
    let uc = UniformField::new(DVec3::new(1.0, 0.0, 0.0));
    let nu = UniformField::new(1.5e-5);
    let carrier = CarrierPhase::new(&rho, &uc, &nu, DVec3::ZERO);

    let mut cloud = DropletCloud::new(mesh.cell_count(), 1000.0, zones).unwrap();
    for (d, n) in [(1e-5, 4.0), (2e-5, 1.0)] {
        let p = DVec3::new(0.45, 0.05, 0.05);
        let droplet = Droplet::new(p, mesh.locate(p).unwrap(), d, DVec3::new(1.0, 0.0, 0.0))
            .unwrap()
            .with_parcel_count(n)
            .unwrap();
        cloud.insert(droplet);
    }

    cloud.reset_sources();
    cloud.track_all(&mesh, carrier, 0.1).unwrap();
    let summaries = cloud.zone_summaries();
    assert_eq!(summaries.len(), 1);
    let (name, summary): &(String, ZoneSummary) = &summaries[0];
    assert_eq!(name, "outlet_plane");
    assert_eq!(summary.samples, 2);
    assert_eq!(summary.droplets, 5.0);
    assert!((summary.mean_diameter - 1.2e-5).abs() < 1e-18);
    let d32 = (4.0 * 1e-15 + 8e-15) / (4.0 * 1e-10 + 4e-10);
    assert!((summary.sauter_diameter - d32).abs() < 1e-18);
}
