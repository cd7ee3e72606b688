use approx::assert_relative_eq;
use cv_core::{back_project, AnyMat, CameraIntrinsics, DataType, Mat};
use cv_rgbd::{compute_radius, NormalsConfig, NormalsMethod, RgbdNormals};
use nalgebra::{Matrix3, Vector3};

const ROWS: usize = 120;
const COLS: usize = 160;
/// Pixels this close to the image edge are not checked for accuracy.
const BORDER: usize = 10;

fn camera() -> Matrix3<f64> {
    CameraIntrinsics::new(150.0, 150.0, COLS as f64 / 2.0, ROWS as f64 / 2.0).matrix()
}

fn plane_normal() -> Vector3<f64> {
    Vector3::new(0.25, -0.3, -0.92).normalize()
}

/// Organized point cloud of the plane n·P = offset, in millimetres.
fn plane_points(k: &Matrix3<f64>, n: &Vector3<f64>, offset: f64) -> Mat<f64> {
    let mut points = Mat::new(ROWS, COLS, 3);
    for y in 0..ROWS {
        for x in 0..COLS {
            let ray = back_project(k, x as f64, y as f64, 1.0);
            let p = ray * (offset / n.dot(&ray));
            points.pixel_mut(y, x).copy_from_slice(p.as_slice());
        }
    }
    points
}

fn config(method: NormalsMethod, precision: DataType) -> NormalsConfig {
    NormalsConfig::new(ROWS, COLS, precision, camera(), 5, method)
}

fn angle_deg(px: &[f64], n: &Vector3<f64>) -> f64 {
    let v = Vector3::new(px[0], px[1], px[2]);
    v.normalize().dot(n).clamp(-1.0, 1.0).acos().to_degrees()
}

fn same_bits(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

fn run(normals: &mut RgbdNormals, input: &AnyMat) -> Mat<f64> {
    let mut out = AnyMat::default();
    normals.compute(input, &mut out).unwrap();
    out.get::<f64>().unwrap().clone()
}

const METHODS: [NormalsMethod; 3] = [
    NormalsMethod::Fals,
    NormalsMethod::Linemod,
    NormalsMethod::Sri,
];

#[test]
fn test_tilted_plane_recovered_by_every_method() {
    let n = plane_normal();
    let points = AnyMat::from(plane_points(&camera(), &n, -2000.0));

    for method in METHODS {
        let mut normals = RgbdNormals::new(config(method, DataType::F64)).unwrap();
        let out = run(&mut normals, &points);
        let mut worst = 0.0f64;
        for y in BORDER..ROWS - BORDER {
            for x in BORDER..COLS - BORDER {
                worst = worst.max(angle_deg(out.pixel(y, x), &n));
            }
        }
        assert!(worst < 1.0, "{} worst error {} deg", method, worst);
    }
}

#[test]
fn test_outputs_are_unit_and_face_camera() {
    let points = AnyMat::from(plane_points(&camera(), &plane_normal(), -2000.0));

    for method in METHODS {
        let mut normals = RgbdNormals::new(config(method, DataType::F64)).unwrap();
        let out = run(&mut normals, &points);
        let mut finite = 0;
        for px in out.pixels().filter(|px| px.iter().all(|v| v.is_finite())) {
            finite += 1;
            let v = Vector3::new(px[0], px[1], px[2]);
            assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-9);
            assert!(v.z <= 0.0);
        }
        assert!(finite > (ROWS - 2 * BORDER) * (COLS - 2 * BORDER), "{}", method);
    }
}

#[test]
fn test_single_precision_keeps_sign_and_norm() {
    let points: Mat<f32> = plane_points(&camera(), &plane_normal(), -2000.0).convert();
    let points = AnyMat::from(points);

    for method in METHODS {
        let mut normals = RgbdNormals::new(config(method, DataType::F32)).unwrap();
        let mut out = AnyMat::default();
        normals.compute(&points, &mut out).unwrap();
        let out = out.get::<f32>().unwrap();
        for y in BORDER..ROWS - BORDER {
            for x in BORDER..COLS - BORDER {
                let px = out.pixel(y, x);
                let v = Vector3::new(px[0], px[1], px[2]);
                assert!((v.norm() - 1.0).abs() < 1e-4, "{}", method);
                assert!(v.z <= 0.0);
            }
        }
    }
}

#[test]
fn test_fals_single_pixel_window_never_reports_a_wrong_normal() {
    let n = plane_normal();
    let points = plane_points(&camera(), &n, -2000.0);
    let points_f32: Mat<f32> = points.convert();

    for (input, precision) in [
        (AnyMat::from(points), DataType::F64),
        (AnyMat::from(points_f32), DataType::F32),
    ] {
        let cfg = config(NormalsMethod::Fals, precision).with_window_size(1);
        let mut normals = RgbdNormals::new(cfg).unwrap();
        let mut out = AnyMat::default();
        normals.compute(&input, &mut out).unwrap();
        let out: Mat<f64> = match &out {
            AnyMat::F32(m) => m.convert(),
            AnyMat::F64(m) => m.clone(),
            AnyMat::U16(_) => panic!("unexpected u16 output"),
        };
        for px in out.pixels() {
            if px.iter().all(|v| !v.is_nan()) {
                assert!(angle_deg(px, &n) < 1.0, "{} {:?}", precision, px);
            }
        }
    }
}

#[test]
fn test_invalid_points_propagate_for_fals_and_sri() {
    let mut points = plane_points(&camera(), &plane_normal(), -2000.0);
    for &(y, x) in &[(40, 50), (41, 50), (90, 12), (0, 0)] {
        points.pixel_mut(y, x).copy_from_slice(&[f64::NAN; 3]);
    }
    points.set(70, 100, 1, f64::NAN);
    let radius = compute_radius(&points).unwrap();
    let input = AnyMat::from(points);

    for method in [NormalsMethod::Fals, NormalsMethod::Sri] {
        let mut normals = RgbdNormals::new(config(method, DataType::F64)).unwrap();
        let out = run(&mut normals, &input);
        for (px, r) in out.pixels().zip(radius.as_slice()) {
            if r.is_nan() {
                assert!(same_bits(px, &[*r; 3]), "{}", method);
            }
        }
        assert!(out.pixel(70, 100).iter().all(|v| v.is_nan()));
    }
}

#[test]
fn test_config_change_matches_fresh_estimator() {
    let points = AnyMat::from(plane_points(&camera(), &plane_normal(), -2000.0));
    let mut normals = RgbdNormals::new(config(NormalsMethod::Fals, DataType::F64)).unwrap();
    run(&mut normals, &points);

    normals.set_window_size(7).unwrap();
    normals.set_method(NormalsMethod::Sri).unwrap();
    let changed = run(&mut normals, &points);
    assert_eq!(normals.cache_builds(), 2);

    let mut fresh = RgbdNormals::new(
        config(NormalsMethod::Sri, DataType::F64).with_window_size(7),
    )
    .unwrap();
    let expected = run(&mut fresh, &points);
    assert!(same_bits(changed.as_slice(), expected.as_slice()));

    let mut k = camera();
    k[(0, 2)] += 3.0;
    normals.set_k(k).unwrap();
    run(&mut normals, &points);
    assert_eq!(normals.cache_builds(), 3);
}

#[test]
fn test_unchanged_config_does_not_rebuild() {
    let points = AnyMat::from(plane_points(&camera(), &plane_normal(), -2000.0));
    for method in METHODS {
        let mut normals = RgbdNormals::new(config(method, DataType::F64)).unwrap();
        let first = run(&mut normals, &points);
        let second = run(&mut normals, &points);
        run(&mut normals, &points);
        assert_eq!(normals.cache_builds(), 1);
        assert!(same_bits(first.as_slice(), second.as_slice()));
    }
}

#[test]
fn test_linemod_depth_types_agree() {
    let points = plane_points(&camera(), &plane_normal(), -2000.0);
    let z: Vec<u16> = points.pixels().map(|p| p[2].round() as u16).collect();
    let depth_u16 = Mat::from_vec(ROWS, COLS, 1, z).unwrap();
    let depth_f64: Mat<f64> = depth_u16.convert();

    let mut normals = RgbdNormals::new(config(NormalsMethod::Linemod, DataType::F64)).unwrap();
    let from_u16 = run(&mut normals, &AnyMat::from(depth_u16));
    let from_f64 = run(&mut normals, &AnyMat::from(depth_f64));
    assert!(same_bits(from_u16.as_slice(), from_f64.as_slice()));
    assert_eq!(normals.cache_builds(), 1);
}

#[test]
fn test_linemod_point_cloud_uses_depth_channel() {
    let mut points = plane_points(&camera(), &plane_normal(), -2000.0);
    points.set(60, 80, 2, f64::NAN);
    let depth = points.channel(2).unwrap();

    let mut normals = RgbdNormals::new(config(NormalsMethod::Linemod, DataType::F64)).unwrap();
    let from_cloud = run(&mut normals, &AnyMat::from(points));
    let from_depth = run(&mut normals, &AnyMat::from(depth));
    assert!(same_bits(from_cloud.as_slice(), from_depth.as_slice()));

    assert!(from_cloud.pixel(60, 80).iter().all(|v| v.is_nan()));
    // Unprocessed border band.
    assert!(from_cloud.pixel(2, 40).iter().all(|v| v.is_nan()));
    assert!(from_cloud.pixel(60, COLS - 6).iter().all(|v| v.is_nan()));
}
