use crate::{
    AutoCalibrationError, ConstraintPolicy, ConstraintWeights, DualAbsoluteQuadric, MetricUpgrade,
    QuadricConstraint,
};
use core::cmp::Reverse;
use cv_projective::nalgebra::{DMatrix, Matrix3x4, Matrix4, SVector, Vector4};
use float_ord::FloatOrd;
use log::*;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A camera as it is kept by [`AutoCalibrationLinear`]: its projection in normalized image
/// coordinates together with what is needed to undo the normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct NormalizedCamera {
    pub projection: Matrix3x4<f64>,
    pub width: f64,
    pub height: f64,
    /// The policy whose normalization was applied and whose rows were added.
    pub policy: ConstraintPolicy,
}

impl NormalizedCamera {
    /// The projection moved back into pixel coordinates.
    pub fn denormalized(&self) -> Matrix3x4<f64> {
        self.policy
            .normalization()
            .denormalize(&self.projection, self.width, self.height)
    }
}

/// Linear autocalibration with the dual absolute quadric.
///
/// Projection matrices of a projective reconstruction are added one at a time. Each one is
/// normalized and turned into a few linear constraints on the quadric, according to a
/// [`ConstraintPolicy`]. [`AutoCalibrationLinear::solve`] then finds the quadric that satisfies
/// all constraints best in the least squares sense and decomposes it into the transformation
/// that upgrades the reconstruction to a metric frame.
///
/// This follows Pollefeys et al., "Visual modeling with a hand-held camera" (2004) for the
/// weighted constraints and Triggs, "Autocalibration and the absolute quadric" (1997) for the
/// decomposition.
///
/// ```
/// use absolute_quadric::AutoCalibrationLinear;
/// use absolute_quadric::nalgebra::{Matrix4, Rotation3, Vector3};
/// use cv_projective::{metrics, CameraIntrinsics, ProjectionMatrix};
///
/// let (width, height) = (1000.0, 800.0);
/// let k = CameraIntrinsics::centered(width + height, width, height).matrix();
/// let distortion = Matrix4::new(
///     4.0, 0.5, -0.2, 0.1,
///     0.3, 3.5, 0.4, -0.6,
///     -0.1, 0.2, 4.2, 0.3,
///     0.5, -0.4, 0.2, 3.8,
/// );
/// let distortion_inverse = distortion.try_inverse().unwrap();
///
/// let mut calibration = AutoCalibrationLinear::new();
/// let mut cameras = vec![];
/// for (angles, t) in [
///     ((0.3, 1.2, 2.1), Vector3::new(0.1, 0.4, 0.7)),
///     ((2.5, 0.4, 1.3), Vector3::new(0.9, 0.2, 0.5)),
///     ((1.1, 2.8, 0.6), Vector3::new(0.3, 0.8, 0.2)),
/// ] {
///     let r = *Rotation3::from_euler_angles(angles.0, angles.1, angles.2).matrix();
///     let p = ProjectionMatrix::from_krt(&k, &r, &t).0 * distortion_inverse;
///     calibration.add_projection(&p, width, height);
///     cameras.push(p);
/// }
///
/// let upgrade = calibration.solve().unwrap();
/// assert!(upgrade.is_reliable());
/// for p in &cameras {
///     let recovered = upgrade.intrinsics(p).unwrap().k;
///     assert!(metrics::relative_frobenius_distance(&k, &recovered) < 1e-6);
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AutoCalibrationLinear {
    epsilon: f64,
    max_iterations: usize,
    rank_tolerance: f64,
    weights: ConstraintWeights,
    cameras: Vec<NormalizedCamera>,
    constraints: Vec<QuadricConstraint>,
}

impl AutoCalibrationLinear {
    /// Creates an empty `AutoCalibrationLinear` with default values.
    ///
    /// Same as calling [`Default::default`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the epsilon used in the singular value and symmetric eigen solvers.
    ///
    /// Default is `1e-12`.
    #[must_use]
    pub fn epsilon(self, epsilon: f64) -> Self {
        Self { epsilon, ..self }
    }

    /// Set the maximum number of iterations for the singular value and symmetric eigen solvers.
    ///
    /// Default is `1000`.
    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    /// Set the fraction of the largest eigenvalue of the quadric above which an eigenvalue
    /// counts towards its rank.
    ///
    /// Default is `1e-3`.
    #[must_use]
    pub fn rank_tolerance(self, rank_tolerance: f64) -> Self {
        Self {
            rank_tolerance,
            ..self
        }
    }

    /// Set the weights of [`ConstraintPolicy::Weighted`].
    ///
    /// Only projections added afterwards are affected.
    #[must_use]
    pub fn weights(self, weights: ConstraintWeights) -> Self {
        Self { weights, ..self }
    }

    /// Adds a projection of a `width` by `height` image with the
    /// [`ConstraintPolicy::Weighted`] constraints and returns its index.
    pub fn add_projection(&mut self, p: &Matrix3x4<f64>, width: f64, height: f64) -> usize {
        self.add_projection_with_policy(p, width, height, ConstraintPolicy::Weighted)
    }

    /// Adds a projection of a `width` by `height` image with the
    /// [`ConstraintPolicy::Legacy`] constraints and returns its index.
    pub fn add_projection_legacy(&mut self, p: &Matrix3x4<f64>, width: f64, height: f64) -> usize {
        self.add_projection_with_policy(p, width, height, ConstraintPolicy::Legacy)
    }

    /// Normalizes `p` as `policy` requires, stores it and appends its constraints.
    ///
    /// Neither the projection nor the image size are validated. Policies can be mixed, but the
    /// rows of different policies are scaled differently, which weighs the cameras differently.
    pub fn add_projection_with_policy(
        &mut self,
        p: &Matrix3x4<f64>,
        width: f64,
        height: f64,
        policy: ConstraintPolicy,
    ) -> usize {
        let normalized = policy.normalization().normalize(p, width, height);
        let constraints = policy.constraints(&normalized, &self.weights);
        debug!(
            "adding projection {} ({}x{}) with {} {:?} constraints",
            self.cameras.len(),
            width,
            height,
            constraints.len(),
            policy
        );
        self.constraints.extend(constraints);
        self.cameras.push(NormalizedCamera {
            projection: normalized,
            width,
            height,
            policy,
        });
        self.cameras.len() - 1
    }

    /// Number of projections added so far.
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// Number of constraint rows added so far.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// The stored cameras, in the order they were added.
    pub fn cameras(&self) -> &[NormalizedCamera] {
        &self.cameras
    }

    /// The normalized projections, in the order they were added.
    pub fn projections(&self) -> impl Iterator<Item = &Matrix3x4<f64>> + '_ {
        self.cameras.iter().map(|camera| &camera.projection)
    }

    /// All constraints stacked into a `num_constraints` by `10` matrix.
    pub fn constraint_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.constraints.len(), DualAbsoluteQuadric::PARAMETERS, |r, c| {
            self.constraints[r][c]
        })
    }

    /// Computes the dual absolute quadric and the metric upgrade it implies.
    ///
    /// The quadric is the right singular vector of the smallest singular value of the stacked
    /// constraints. It is then split as `Q = V * diag(l) * V^T` with `l` sorted in descending
    /// order, and the upgrade is `H = V * diag(sqrt(l0), sqrt(l1), sqrt(l2), 1)`.
    ///
    /// No rank `3` is imposed on the quadric. When it does not have rank `3` the upgrade is
    /// degraded, which is reported through [`MetricUpgrade::rank`] and a warning.
    ///
    /// With fewer than `10` constraint rows, including none at all, the nullspace is not
    /// unique. The solve still succeeds, but [`MetricUpgrade::is_reliable`] is false.
    pub fn solve(&self) -> Result<MetricUpgrade, AutoCalibrationError> {
        if self.constraints.len() < DualAbsoluteQuadric::PARAMETERS {
            warn!(
                "solving from only {} constraints, the quadric is underdetermined",
                self.constraints.len()
            );
        }
        let (quadric, smallest_singular_value) = self.nullspace()?;

        let eigens = quadric
            .matrix()
            .try_symmetric_eigen(self.epsilon, self.max_iterations)
            .ok_or(AutoCalibrationError::EigenNoConvergence)?;
        let mut eigenvalues = eigens.eigenvalues;
        // The quadric is only known up to sign.
        if eigenvalues.sum() < 0.0 {
            eigenvalues = -eigenvalues;
        }
        let (eigenvalues, eigenvectors) = sort_descending(&eigenvalues, &eigens.eigenvectors);
        trace!("quadric eigenvalues: {:?}", eigenvalues.as_slice());

        let threshold = self.rank_tolerance * eigenvalues[0];
        let rank = eigenvalues.iter().filter(|&&value| value > threshold).count();
        if rank != 3 {
            warn!(
                "dual absolute quadric has rank {} instead of 3 (eigenvalues {:?})",
                rank,
                eigenvalues.as_slice()
            );
        }
        if eigenvalues.iter().take(3).any(|&value| value < 0.0) {
            warn!("negative quadric eigenvalue, metric upgrade contains NaN");
        }

        let mut scales = eigenvalues;
        scales[3] = 1.0;
        let transform = eigenvectors * Matrix4::from_diagonal(&scales.map(f64::sqrt));

        debug!(
            "solved {} constraints from {} projections: rank {}, smallest singular value {}",
            self.constraints.len(),
            self.cameras.len(),
            rank,
            smallest_singular_value
        );

        Ok(MetricUpgrade {
            transform,
            quadric,
            eigenvalues,
            rank,
            smallest_singular_value,
            num_constraints: self.constraints.len(),
        })
    }

    /// Only the metric upgrade `H` of [`AutoCalibrationLinear::solve`].
    pub fn metric_transformation(&self) -> Result<Matrix4<f64>, AutoCalibrationError> {
        self.solve().map(|upgrade| upgrade.transform)
    }

    /// Least squares solution of the stacked constraints with unit norm.
    fn nullspace(&self) -> Result<(DualAbsoluteQuadric, f64), AutoCalibrationError> {
        let parameters = DualAbsoluteQuadric::PARAMETERS;
        // The SVD is thin, so zero rows are added until every right singular vector is computed.
        // Zero rows leave the right singular vectors unchanged.
        let rows = self.constraints.len().max(parameters);
        if rows > self.constraints.len() {
            trace!(
                "padding {} constraints with {} zero rows",
                self.constraints.len(),
                rows - self.constraints.len()
            );
        }
        let a = DMatrix::from_fn(rows, parameters, |r, c| {
            self.constraints.get(r).map_or(0.0, |row| row[c])
        });

        let svd = a
            .try_svd(false, true, self.epsilon, self.max_iterations)
            .ok_or(AutoCalibrationError::SvdNoConvergence)?;
        let v_t = svd.v_t.ok_or(AutoCalibrationError::SvdNoConvergence)?;
        // Singular values are not guaranteed to be sorted.
        let (ix, &smallest) = svd
            .singular_values
            .iter()
            .enumerate()
            .min_by_key(|&(_, &value)| FloatOrd(value))
            .ok_or(AutoCalibrationError::SvdNoConvergence)?;
        let q = SVector::<f64, 10>::from_iterator(v_t.row(ix).iter().copied());

        let smallest = if self.constraints.len() < parameters {
            0.0
        } else {
            smallest
        };
        Ok((DualAbsoluteQuadric(q), smallest))
    }
}

impl Default for AutoCalibrationLinear {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            max_iterations: 1000,
            rank_tolerance: 1e-3,
            weights: ConstraintWeights::default(),
            cameras: vec![],
            constraints: vec![],
        }
    }
}

/// Sorts eigenpairs by descending eigenvalue. Equal eigenvalues keep their original order.
fn sort_descending(
    eigenvalues: &Vector4<f64>,
    eigenvectors: &Matrix4<f64>,
) -> (Vector4<f64>, Matrix4<f64>) {
    let mut order = [0, 1, 2, 3];
    order.sort_by_key(|&ix| Reverse(FloatOrd(eigenvalues[ix])));
    (
        Vector4::from_fn(|i, _| eigenvalues[order[i]]),
        Matrix4::from_fn(|r, c| eigenvectors[(r, order[c])]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_is_descending_and_stable() {
        let eigenvalues = Vector4::new(1.0, 3.0, 1.0, 2.0);
        let eigenvectors = Matrix4::from_fn(|r, c| (4 * r + c) as f64);
        let (values, vectors) = sort_descending(&eigenvalues, &eigenvectors);
        assert_eq!(values, Vector4::new(3.0, 2.0, 1.0, 1.0));
        for (sorted, original) in [(0, 1), (1, 3), (2, 0), (3, 2)] {
            assert_eq!(vectors.column(sorted), eigenvectors.column(original));
        }
    }

    #[test]
    fn configuration_is_builder_style() {
        let weights = ConstraintWeights {
            focal: 3.0,
            ..Default::default()
        };
        let calibration = AutoCalibrationLinear::new()
            .epsilon(1e-9)
            .max_iterations(50)
            .rank_tolerance(1e-2)
            .weights(weights);
        assert_eq!(calibration.epsilon, 1e-9);
        assert_eq!(calibration.max_iterations, 50);
        assert_eq!(calibration.rank_tolerance, 1e-2);
        assert_eq!(calibration.weights, weights);
        assert!(calibration.is_empty());
    }

    #[test]
    fn stored_cameras_denormalize_to_the_input() {
        #[rustfmt::skip]
        let p = Matrix3x4::new(
            900.0, 0.0, 500.0, 10.0,
            0.0, 900.0, 400.0, 20.0,
            0.0, 0.0, 1.0, 3.0,
        );
        let mut calibration = AutoCalibrationLinear::new();
        calibration.add_projection(&p, 1000.0, 800.0);
        calibration.add_projection_legacy(&p, 640.0, 480.0);
        for camera in calibration.cameras() {
            let restored = camera.denormalized();
            assert!((restored - p).norm() < 1e-9);
        }
    }

    #[test]
    fn padding_keeps_the_reported_singular_value_at_zero() {
        let mut calibration = AutoCalibrationLinear::new();
        calibration.add_projection(&Matrix3x4::identity(), 2.0, 2.0);
        let (quadric, smallest) = calibration.nullspace().unwrap();
        assert_eq!(smallest, 0.0);
        assert!((quadric.norm() - 1.0).abs() < 1e-9);
    }
}
