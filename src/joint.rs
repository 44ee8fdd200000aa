//! Joint kinds supported by the model.

use nalgebra::{Quaternion, Translation3, Unit, UnitQuaternion, Vector3};
use rand::Rng;

use crate::kinematic_traits::Pose;
use crate::spatial::{exp6, log6, Motion};

/// Kind of a joint, defining how its configuration coordinates map to a rigid motion
/// of the child body relative to the joint frame.
#[derive(Debug, Clone, PartialEq)]
pub enum JointType {
    /// Rotation about a fixed axis. One coordinate (rad).
    Revolute(Unit<Vector3<f64>>),
    /// Translation along a fixed axis. One coordinate (m).
    Prismatic(Unit<Vector3<f64>>),
    /// Unconstrained rigid motion. Seven coordinates: translation `x y z` and unit
    /// quaternion `qx qy qz qw`. Six velocity coordinates: body frame spatial velocity,
    /// linear part first.
    FreeFlyer,
}

impl JointType {
    /// Revolute joint about the given (not necessarily normalized) axis.
    pub fn revolute(axis: Vector3<f64>) -> Self {
        JointType::Revolute(Unit::new_normalize(axis))
    }

    /// Prismatic joint along the given (not necessarily normalized) axis.
    pub fn prismatic(axis: Vector3<f64>) -> Self {
        JointType::Prismatic(Unit::new_normalize(axis))
    }

    /// Number of configuration coordinates.
    pub fn nq(&self) -> usize {
        match self {
            JointType::Revolute(_) | JointType::Prismatic(_) => 1,
            JointType::FreeFlyer => 7,
        }
    }

    /// Number of velocity coordinates (degrees of freedom).
    pub fn nv(&self) -> usize {
        match self {
            JointType::Revolute(_) | JointType::Prismatic(_) => 1,
            JointType::FreeFlyer => 6,
        }
    }

    /// Motion of the child body relative to the joint frame for the joint's own
    /// configuration coordinates `q` (exactly `nq()` values).
    pub fn transform(&self, q: &[f64]) -> Pose {
        match self {
            JointType::Revolute(axis) => {
                Pose::from_parts(Translation3::identity(), UnitQuaternion::from_axis_angle(axis, q[0]))
            }
            JointType::Prismatic(axis) => {
                Pose::from_parts(Translation3::from(axis.into_inner() * q[0]), UnitQuaternion::identity())
            }
            JointType::FreeFlyer => Pose::from_parts(
                Translation3::new(q[0], q[1], q[2]),
                free_flyer_rotation(q),
            ),
        }
    }

    /// Column `k` of the motion subspace, expressed in the child body frame.
    pub fn motion_subspace(&self, k: usize) -> Motion {
        match self {
            JointType::Revolute(axis) => Motion::new(Vector3::zeros(), axis.into_inner()),
            JointType::Prismatic(axis) => Motion::new(axis.into_inner(), Vector3::zeros()),
            JointType::FreeFlyer => {
                let mut linear = Vector3::zeros();
                let mut angular = Vector3::zeros();
                if k < 3 {
                    linear[k] = 1.0;
                } else {
                    angular[k - 3] = 1.0;
                }
                Motion::new(linear, angular)
            }
        }
    }

    /// Spatial velocity `S * v` of the child body relative to its parent, for the
    /// joint's own velocity coordinates (`nv()` values). Also used for `S * a`.
    pub fn joint_motion(&self, v: &[f64]) -> Motion {
        match self {
            JointType::Revolute(axis) => Motion::new(Vector3::zeros(), axis.into_inner() * v[0]),
            JointType::Prismatic(axis) => Motion::new(axis.into_inner() * v[0], Vector3::zeros()),
            JointType::FreeFlyer => Motion::new(
                Vector3::new(v[0], v[1], v[2]),
                Vector3::new(v[3], v[4], v[5]),
            ),
        }
    }

    /// Configuration of the joint at rest.
    pub fn neutral(&self) -> Vec<f64> {
        match self {
            JointType::Revolute(_) | JointType::Prismatic(_) => vec![0.0],
            JointType::FreeFlyer => vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Writes into `out` the configuration reached from `q` by moving along the tangent
    /// displacement `dq`. Rotations compose through the exponential map, everything else
    /// adds.
    pub fn integrate(&self, q: &[f64], dq: &[f64], out: &mut [f64]) {
        match self {
            JointType::Revolute(_) | JointType::Prismatic(_) => out[0] = q[0] + dq[0],
            JointType::FreeFlyer => {
                let moved = self.transform(q) * exp6(&self.joint_motion(dq));
                write_free_flyer(&moved, out);
            }
        }
    }

    /// Tangent displacement that [`JointType::integrate`] needs to go from `q0` to `q1`.
    pub fn difference(&self, q0: &[f64], q1: &[f64], out: &mut [f64]) {
        match self {
            JointType::Revolute(_) | JointType::Prismatic(_) => out[0] = q1[0] - q0[0],
            JointType::FreeFlyer => {
                let relative = self.transform(q0).inverse() * self.transform(q1);
                let twist = log6(&relative);
                out[..3].copy_from_slice(twist.linear.as_slice());
                out[3..6].copy_from_slice(twist.angular.as_slice());
            }
        }
    }

    /// Re-normalizes the quaternion block of a free-flyer. Other joints are unchanged.
    pub fn normalize(&self, q: &mut [f64]) {
        if let JointType::FreeFlyer = self {
            let rotation = free_flyer_rotation(q);
            let pose = Pose::from_parts(Translation3::new(q[0], q[1], q[2]), rotation);
            write_free_flyer(&pose, q);
        }
    }

    /// Random configuration with every coordinate drawn uniformly within
    /// `[lower, upper]`. The free-flyer orientation is a uniformly random rotation.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R, lower: &[f64], upper: &[f64], out: &mut [f64]) {
        match self {
            JointType::Revolute(_) | JointType::Prismatic(_) => {
                out[0] = sample(rng, lower[0], upper[0]);
            }
            JointType::FreeFlyer => {
                for k in 0..3 {
                    out[k] = sample(rng, lower[k], upper[k]);
                }
                // Shoemake's method for uniform unit quaternions
                let (u1, u2, u3): (f64, f64, f64) =
                    (rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0));
                let tau = std::f64::consts::TAU;
                let (a, b) = ((1.0 - u1).sqrt(), u1.sqrt());
                out[3] = a * (tau * u2).sin();
                out[4] = a * (tau * u2).cos();
                out[5] = b * (tau * u3).sin();
                out[6] = b * (tau * u3).cos();
            }
        }
    }
}

/// Range used when a limit is not finite.
const UNBOUNDED_RANGE: f64 = std::f64::consts::PI;

fn sample<R: Rng + ?Sized>(rng: &mut R, lower: f64, upper: f64) -> f64 {
    let lower = if lower.is_finite() { lower } else { -UNBOUNDED_RANGE };
    let upper = if upper.is_finite() { upper } else { UNBOUNDED_RANGE };
    if upper <= lower {
        return lower;
    }
    rng.gen_range(lower..=upper)
}

fn free_flyer_rotation(q: &[f64]) -> UnitQuaternion<f64> {
    // Stored as x y z w, nalgebra constructor takes w first
    UnitQuaternion::from_quaternion(Quaternion::new(q[6], q[3], q[4], q[5]))
}

fn write_free_flyer(pose: &Pose, out: &mut [f64]) {
    out[..3].copy_from_slice(pose.translation.vector.as_slice());
    let mut rotation = pose.rotation;
    rotation.renormalize();
    out[3..7].copy_from_slice(rotation.coords.as_slice()); // x y z w
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_revolute_transform() {
        let joint = JointType::revolute(Vector3::new(0.0, 0.0, 2.0));
        let pose = joint.transform(&[std::f64::consts::FRAC_PI_2]);
        let x = pose.rotation * Vector3::x();
        assert_relative_eq!(x, Vector3::y(), epsilon = EPSILON);
        assert_relative_eq!(pose.translation.vector, Vector3::zeros(), epsilon = EPSILON);
    }

    #[test]
    fn test_prismatic_transform() {
        let joint = JointType::prismatic(Vector3::new(0.0, 1.0, 0.0));
        let pose = joint.transform(&[0.25]);
        assert_relative_eq!(pose.translation.vector, Vector3::new(0.0, 0.25, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_free_flyer_neutral_is_identity() {
        let joint = JointType::FreeFlyer;
        let pose = joint.transform(&joint.neutral());
        assert_relative_eq!(pose.to_homogeneous(), Pose::identity().to_homogeneous(), epsilon = EPSILON);
    }

    #[test]
    fn test_free_flyer_integrate_keeps_unit_quaternion() {
        let joint = JointType::FreeFlyer;
        let q = joint.neutral();
        let mut out = vec![0.0; 7];
        joint.integrate(&q, &[0.1, 0.2, 0.3, 1.0, -0.5, 0.25], &mut out);
        let norm = (out[3] * out[3] + out[4] * out[4] + out[5] * out[5] + out[6] * out[6]).sqrt();
        assert!((norm - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_free_flyer_difference_inverts_integrate() {
        let joint = JointType::FreeFlyer;
        let mut q = vec![0.0; 7];
        joint.integrate(&joint.neutral(), &[0.5, -0.2, 1.0, 0.3, 0.2, -0.1], &mut q);
        let dq = [0.05, 0.1, -0.3, -0.4, 0.2, 0.6];
        let mut moved = vec![0.0; 7];
        joint.integrate(&q, &dq, &mut moved);
        let mut back = vec![0.0; 6];
        joint.difference(&q, &moved, &mut back);
        for k in 0..6 {
            assert!((back[k] - dq[k]).abs() < 1e-9, "component {}: {} vs {}", k, back[k], dq[k]);
        }
    }

    #[test]
    fn test_random_within_limits() {
        let mut rng = StdRng::seed_from_u64(7);
        let joint = JointType::revolute(Vector3::z());
        let mut out = [0.0];
        for _ in 0..100 {
            joint.random(&mut rng, &[-0.5], &[0.75], &mut out);
            assert!(out[0] >= -0.5 && out[0] <= 0.75);
        }
    }
}
