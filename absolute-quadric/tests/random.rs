use absolute_quadric::nalgebra::{Matrix3, Matrix3x4, Matrix4, Rotation3, Vector3};
use absolute_quadric::AutoCalibrationLinear;
use approx::assert_relative_eq;
use cv_projective::{metrics, CameraIntrinsics, ProjectionMatrix};
use rand::{rngs::SmallRng, Rng, SeedableRng};

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 800.0;

const ANGLE_RANGE: f64 = 3.0;
const TRANSLATION_RANGE: f64 = 1.0;
const DISTORTION_DIAGONAL: f64 = 4.0;

const RECOVERY_THRESHOLD: f64 = 1e-6;

/// Rotation about x, then y, then z, each by a random angle.
fn random_rotation(rng: &mut SmallRng) -> Matrix3<f64> {
    let mut angle = || rng.gen_range(0.0..ANGLE_RANGE);
    let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), angle());
    let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), angle());
    let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), angle());
    *(rx * ry * rz).matrix()
}

fn random_translation(rng: &mut SmallRng) -> Vector3<f64> {
    Vector3::from_fn(|_, _| rng.gen_range(0.0..TRANSLATION_RANGE))
}

/// A projective distortion that stays far from singular.
fn random_distortion(rng: &mut SmallRng) -> Matrix4<f64> {
    Matrix4::identity() * DISTORTION_DIAGONAL + Matrix4::from_fn(|_, _| rng.gen_range(-1.0..1.0))
}

/// Random cameras sharing the intrinsics `k`, seen through the projective frame `distortion`.
fn random_cameras(
    rng: &mut SmallRng,
    k: &Matrix3<f64>,
    distortion: &Matrix4<f64>,
    count: usize,
) -> Vec<Matrix3x4<f64>> {
    let inverse = distortion.try_inverse().expect("distortion is invertible");
    (0..count)
        .map(|_| {
            let r = random_rotation(rng);
            let t = random_translation(rng);
            ProjectionMatrix::from_krt(k, &r, &t).0 * inverse
        })
        .collect()
}

fn calibrate(cameras: &[Matrix3x4<f64>]) -> AutoCalibrationLinear {
    let mut calibration = AutoCalibrationLinear::new();
    for p in cameras {
        calibration.add_projection(p, WIDTH, HEIGHT);
    }
    calibration
}

#[test]
fn metric_input_gives_a_similarity() {
    let _ = pretty_env_logger::try_init();
    let mut rng = SmallRng::seed_from_u64(0);
    // The weighted rows assume a focal length of width plus height.
    let k = CameraIntrinsics::centered(WIDTH + HEIGHT, WIDTH, HEIGHT).matrix();
    for _ in 0..20 {
        let cameras = random_cameras(&mut rng, &k, &Matrix4::identity(), 3);
        let upgrade = calibrate(&cameras).solve().unwrap();
        let block = upgrade.transform.fixed_slice::<3, 3>(0, 0).into_owned();
        let deviation = metrics::orthogonality_deviation(&block);
        assert!(
            deviation < RECOVERY_THRESHOLD,
            "orthogonality deviation: {}",
            deviation
        );
        assert_eq!(upgrade.rank, 3);
        assert!(upgrade.is_reliable());
    }
}

#[test]
fn off_prior_focal_length_flags_negative_eigenvalues() {
    let _ = pretty_env_logger::try_init();
    let mut rng = SmallRng::seed_from_u64(1);
    // Far enough from the focal prior that the quadric may stop being semidefinite.
    let k = CameraIntrinsics::centered(WIDTH, WIDTH, HEIGHT).matrix();
    for _ in 0..20 {
        let cameras = random_cameras(&mut rng, &k, &Matrix4::identity(), 3);
        let upgrade = calibrate(&cameras).solve().unwrap();
        assert_eq!(upgrade.num_constraints, 18);
        assert!(upgrade.eigenvalues[0] >= 0.0);
        let negative = upgrade.eigenvalues.iter().take(3).any(|&value| value < 0.0);
        let nan = upgrade.transform.iter().any(|value| value.is_nan());
        assert_eq!(negative, nan);
    }
}

#[test]
fn rank_three_under_projective_distortion() {
    let _ = pretty_env_logger::try_init();
    let mut rng = SmallRng::seed_from_u64(2);
    let k = CameraIntrinsics::centered(WIDTH + HEIGHT, WIDTH, HEIGHT).matrix();
    let rank_three = (0..100)
        .filter(|_| {
            let distortion = random_distortion(&mut rng);
            let cameras = random_cameras(&mut rng, &k, &distortion, 3);
            calibrate(&cameras).solve().unwrap().rank == 3
        })
        .count();
    eprintln!("rank 3: {}", rank_three);
    assert!(rank_three >= 90);
}

#[test]
fn intrinsics_recovered_by_both_routes() {
    let _ = pretty_env_logger::try_init();
    let mut rng = SmallRng::seed_from_u64(3);
    let k = CameraIntrinsics::centered(WIDTH + HEIGHT, WIDTH, HEIGHT).matrix();
    let successes = (0..10)
        .filter(|_| {
            let distortion = random_distortion(&mut rng);
            let cameras = random_cameras(&mut rng, &k, &distortion, 4);
            let upgrade = calibrate(&cameras).solve().unwrap();
            cameras.iter().all(|p| {
                let from_rq = upgrade.intrinsics(p).unwrap().k;
                let from_iac = upgrade.intrinsics_from_quadric(p).unwrap();
                let rq_error = metrics::relative_frobenius_distance(&k, &from_rq);
                let iac_error = metrics::relative_frobenius_distance(&k, &from_iac);
                if rq_error > RECOVERY_THRESHOLD || iac_error > RECOVERY_THRESHOLD {
                    eprintln!("failed recovery: rq {} iac {}", rq_error, iac_error);
                    false
                } else {
                    true
                }
            })
        })
        .count();
    eprintln!("successes: {}", successes);
    assert!(successes >= 9);
}

#[test]
fn legacy_constraints_recover_any_focal_length() {
    let _ = pretty_env_logger::try_init();
    let mut rng = SmallRng::seed_from_u64(4);
    for focal in [400.0, 1000.0, 2500.0] {
        let k = CameraIntrinsics::centered(focal, WIDTH, HEIGHT).matrix();
        let distortion = random_distortion(&mut rng);
        let cameras = random_cameras(&mut rng, &k, &distortion, 4);
        let mut calibration = AutoCalibrationLinear::new();
        for p in &cameras {
            calibration.add_projection_legacy(p, WIDTH, HEIGHT);
        }
        let upgrade = calibration.solve().unwrap();
        for p in &cameras {
            let recovered = upgrade.intrinsics(p).unwrap().k;
            assert!(metrics::relative_frobenius_distance(&k, &recovered) < 1e-3);
            let intrinsics = CameraIntrinsics::from_matrix(&recovered);
            assert_relative_eq!(intrinsics.aspect_ratio(), 1.0, epsilon = 1e-3);
            assert_relative_eq!(intrinsics.focals.x, focal, max_relative = 1e-3);
        }
    }
}

#[test]
fn upgraded_structure_is_similar() {
    let _ = pretty_env_logger::try_init();
    let mut rng = SmallRng::seed_from_u64(5);
    let k = CameraIntrinsics::centered(WIDTH + HEIGHT, WIDTH, HEIGHT).matrix();
    let distortion = random_distortion(&mut rng);
    let cameras = random_cameras(&mut rng, &k, &distortion, 5);
    let upgrade = calibrate(&cameras).solve().unwrap();
    assert!(upgrade.is_reliable());

    let points = [
        Vector3::new(0.0, 0.0, 5.0),
        Vector3::new(1.0, -2.0, 7.5),
        Vector3::new(-3.0, 0.5, 2.0),
        Vector3::new(2.0, 2.0, 4.0),
    ];
    let upgraded = points
        .iter()
        .map(|x| {
            let metric = upgrade.upgrade_point(&(distortion * x.push(1.0))).unwrap();
            metric.xyz() / metric.w
        })
        .collect::<Vec<_>>();
    // Only distances up to a common scale survive the upgrade.
    let scale = (upgraded[0] - upgraded[1]).norm() / (points[0] - points[1]).norm();
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            assert_relative_eq!(
                (upgraded[i] - upgraded[j]).norm(),
                scale * (points[i] - points[j]).norm(),
                max_relative = RECOVERY_THRESHOLD
            );
        }
    }
}
