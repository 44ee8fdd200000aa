//! Spatial algebra used by the recursive algorithms.
//!
//! Spatial vectors combine a linear and an angular 3D part. Throughout this crate the
//! linear part comes first, both in the structures below and in the rows of every
//! 6-row matrix (joint Jacobians, centroidal momentum matrix).
//!
//! A rigid transform `M = (R, p)` of type [`Pose`] maps coordinates of its local frame
//! into its parent frame. [`SpatialAction::act`] expresses a local quantity in the parent
//! frame, [`SpatialAction::act_inv`] does the opposite.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use nalgebra::{Matrix3, Matrix6, Translation3, UnitQuaternion, Vector3, Vector6};

use crate::kinematic_traits::Pose;

/// Below this rotation angle, series expansions replace the closed forms of exp/log.
const SMALL_ANGLE: f64 = 1e-8;

/// Spatial motion vector: velocity or acceleration of a rigid body, observed at the
/// origin of the frame it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

/// Spatial force vector: force and moment about the origin of the frame it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Force {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

/// Rigid body inertia: mass, center of mass (lever) and rotational inertia about the
/// center of mass, all in the body frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inertia {
    pub mass: f64,
    pub lever: Vector3<f64>,
    pub rotational: Matrix3<f64>,
}

/// Skew-symmetric matrix such that `skew(a) * b == a.cross(&b)`.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

impl Motion {
    pub fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    pub fn zero() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros())
    }

    /// Builds from a 6-vector `[linear; angular]`.
    pub fn from_vector(v: &Vector6<f64>) -> Self {
        Self::new(v.fixed_rows::<3>(0).into_owned(), v.fixed_rows::<3>(3).into_owned())
    }

    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.linear.x, self.linear.y, self.linear.z,
            self.angular.x, self.angular.y, self.angular.z,
        )
    }

    /// Motion cross product `self × other` (Lie bracket).
    pub fn cross(&self, other: &Motion) -> Motion {
        Motion::new(
            self.angular.cross(&other.linear) + self.linear.cross(&other.angular),
            self.angular.cross(&other.angular),
        )
    }

    /// Dual cross product `self ×* force`, used for the gyroscopic term of RNEA.
    pub fn cross_force(&self, force: &Force) -> Force {
        Force::new(
            self.angular.cross(&force.linear),
            self.angular.cross(&force.angular) + self.linear.cross(&force.linear),
        )
    }

    /// Power pairing of a motion and a force.
    pub fn dot(&self, force: &Force) -> f64 {
        self.linear.dot(&force.linear) + self.angular.dot(&force.angular)
    }
}

impl Force {
    pub fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    pub fn zero() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros())
    }

    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.linear.x, self.linear.y, self.linear.z,
            self.angular.x, self.angular.y, self.angular.z,
        )
    }
}

macro_rules! spatial_vector_ops {
    ($t:ident) => {
        impl Add for $t {
            type Output = $t;
            fn add(self, other: $t) -> $t {
                $t::new(self.linear + other.linear, self.angular + other.angular)
            }
        }

        impl Sub for $t {
            type Output = $t;
            fn sub(self, other: $t) -> $t {
                $t::new(self.linear - other.linear, self.angular - other.angular)
            }
        }

        impl AddAssign for $t {
            fn add_assign(&mut self, other: $t) {
                self.linear += other.linear;
                self.angular += other.angular;
            }
        }

        impl Neg for $t {
            type Output = $t;
            fn neg(self) -> $t {
                $t::new(-self.linear, -self.angular)
            }
        }

        impl Mul<f64> for $t {
            type Output = $t;
            fn mul(self, s: f64) -> $t {
                $t::new(self.linear * s, self.angular * s)
            }
        }
    };
}

spatial_vector_ops!(Motion);
spatial_vector_ops!(Force);

impl Inertia {
    /// # Arguments
    /// * `mass` - body mass (kg)
    /// * `lever` - center of mass in the body frame (m)
    /// * `rotational` - rotational inertia about the center of mass, body axes (kg·m²)
    pub fn new(mass: f64, lever: Vector3<f64>, rotational: Matrix3<f64>) -> Self {
        Self { mass, lever, rotational }
    }

    pub fn zero() -> Self {
        Self::new(0.0, Vector3::zeros(), Matrix3::zeros())
    }

    /// Momentum `I * v` of a body moving with spatial velocity `v`.
    pub fn mul_motion(&self, v: &Motion) -> Force {
        let linear = (v.linear - self.lever.cross(&v.angular)) * self.mass;
        let angular = self.rotational * v.angular + self.lever.cross(&linear);
        Force::new(linear, angular)
    }

    /// The 6x6 spatial inertia matrix, linear rows first.
    pub fn matrix(&self) -> Matrix6<f64> {
        let c = skew(&self.lever);
        let mut result = Matrix6::zeros();
        result.fixed_view_mut::<3, 3>(0, 0).copy_from(&(Matrix3::identity() * self.mass));
        result.fixed_view_mut::<3, 3>(0, 3).copy_from(&(-c * self.mass));
        result.fixed_view_mut::<3, 3>(3, 0).copy_from(&(c * self.mass));
        result.fixed_view_mut::<3, 3>(3, 3).copy_from(&(self.rotational - c * c * self.mass));
        result
    }
}

impl Add for Inertia {
    type Output = Inertia;

    /// Inertia of the rigid union of two bodies expressed in the same frame.
    fn add(self, other: Inertia) -> Inertia {
        let mass = self.mass + other.mass;
        if mass <= 0.0 {
            return Inertia::new(0.0, Vector3::zeros(), self.rotational + other.rotational);
        }
        let lever = (self.lever * self.mass + other.lever * other.mass) / mass;
        let d = skew(&(self.lever - other.lever));
        let rotational =
            self.rotational + other.rotational - d * d * (self.mass * other.mass / mass);
        Inertia::new(mass, lever, rotational)
    }
}

impl AddAssign for Inertia {
    fn add_assign(&mut self, other: Inertia) {
        *self = *self + other;
    }
}

/// Change of frame for spatial quantities.
pub trait SpatialAction<T> {
    /// Expresses a quantity given in the local frame of `self` in its parent frame.
    fn act(&self, x: &T) -> T;

    /// Expresses a quantity given in the parent frame in the local frame of `self`.
    fn act_inv(&self, x: &T) -> T;
}

impl SpatialAction<Motion> for Pose {
    fn act(&self, m: &Motion) -> Motion {
        let angular = self.rotation * m.angular;
        let linear = self.rotation * m.linear + self.translation.vector.cross(&angular);
        Motion::new(linear, angular)
    }

    fn act_inv(&self, m: &Motion) -> Motion {
        let p = &self.translation.vector;
        Motion::new(
            self.rotation.inverse_transform_vector(&(m.linear - p.cross(&m.angular))),
            self.rotation.inverse_transform_vector(&m.angular),
        )
    }
}

impl SpatialAction<Force> for Pose {
    fn act(&self, f: &Force) -> Force {
        let linear = self.rotation * f.linear;
        let angular = self.rotation * f.angular + self.translation.vector.cross(&linear);
        Force::new(linear, angular)
    }

    fn act_inv(&self, f: &Force) -> Force {
        let p = &self.translation.vector;
        Force::new(
            self.rotation.inverse_transform_vector(&f.linear),
            self.rotation.inverse_transform_vector(&(f.angular - p.cross(&f.linear))),
        )
    }
}

impl SpatialAction<Inertia> for Pose {
    fn act(&self, inertia: &Inertia) -> Inertia {
        let r = self.rotation.to_rotation_matrix();
        Inertia::new(
            inertia.mass,
            self.transform_point(&inertia.lever.into()).coords,
            r.matrix() * inertia.rotational * r.matrix().transpose(),
        )
    }

    fn act_inv(&self, inertia: &Inertia) -> Inertia {
        let r = self.rotation.to_rotation_matrix();
        Inertia::new(
            inertia.mass,
            self.inverse_transform_point(&inertia.lever.into()).coords,
            r.matrix().transpose() * inertia.rotational * r.matrix(),
        )
    }
}

/// Exponential map of a twist `(v, w)`: the displacement obtained by moving with the
/// constant body velocity `twist` for a unit of time.
pub fn exp6(twist: &Motion) -> Pose {
    let w = &twist.angular;
    let theta = w.norm();
    let wx = skew(w);
    let v_matrix = if theta < SMALL_ANGLE {
        Matrix3::identity() + wx * 0.5 + wx * wx / 6.0
    } else {
        let theta2 = theta * theta;
        Matrix3::identity()
            + wx * ((1.0 - theta.cos()) / theta2)
            + wx * wx * ((theta - theta.sin()) / (theta2 * theta))
    };
    Pose::from_parts(
        Translation3::from(v_matrix * twist.linear),
        UnitQuaternion::from_scaled_axis(*w),
    )
}

/// Logarithm map, inverse of [`exp6`] for rotation angles below pi.
pub fn log6(pose: &Pose) -> Motion {
    let w = pose.rotation.scaled_axis();
    let theta = w.norm();
    let wx = skew(&w);
    let v_inverse = if theta < SMALL_ANGLE {
        Matrix3::identity() - wx * 0.5 + wx * wx / 12.0
    } else {
        let half = theta / 2.0;
        Matrix3::identity() - wx * 0.5
            + wx * wx * ((1.0 - half * half.cos() / half.sin()) / (theta * theta))
    };
    Motion::new(v_inverse * pose.translation.vector, w)
}
