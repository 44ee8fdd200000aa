extern crate nalgebra as na;

use na::Isometry3;

use crate::model::{Data, Model};

/// Pose is a placement of a joint, frame or geometry. It contains both Cartesian position
/// and rotation quaternion, and maps local coordinates into the coordinates of the parent.
/// ```
/// extern crate nalgebra as na;
/// use na::{Isometry3, Translation3, UnitQuaternion, Vector3};
///
/// type Pose = Isometry3<f64>;
///
/// let translation = Translation3::new(1.0, 0.0, 0.0);
/// // The quaternion should be normalized to represent a valid rotation.
/// let rotation = UnitQuaternion::from_quaternion(na::Quaternion::new(1.0, 0.0, 0.0, 1.0).normalize());
/// let transform = Pose::from_parts(translation, rotation);
/// ```
pub type Pose = Isometry3<f64>;

/// Index of a joint in [`Model::joints`].
pub type JointIndex = usize;

/// Index of a frame in [`Model::frames`].
pub type FrameIndex = usize;

/// Standard gravity, pointing down along Z.
pub const STANDARD_GRAVITY: f64 = 9.81;

/// Frame in which Jacobians are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFrame {
    /// Axes and origin of the joint or frame itself.
    Local,
    /// Axes and origin of the world. The linear part is the velocity of the point of the
    /// body that currently coincides with the world origin.
    World,
    /// Origin of the joint or frame, axes of the world.
    LocalWorldAligned,
}

/// How many time derivatives of the configuration are supplied, and therefore
/// computed. Acceleration can only be given together with velocity.
#[derive(Debug, Clone, Copy)]
pub enum Derivatives<'a> {
    /// Configuration only: placements.
    Position,
    /// Placements and velocities.
    Velocity(&'a [f64]),
    /// Placements, velocities and accelerations (velocity first).
    Acceleration(&'a [f64], &'a [f64]),
}

impl<'a> Derivatives<'a> {
    pub fn velocity(&self) -> Option<&'a [f64]> {
        match *self {
            Derivatives::Position => None,
            Derivatives::Velocity(v) | Derivatives::Acceleration(v, _) => Some(v),
        }
    }

    pub fn acceleration(&self) -> Option<&'a [f64]> {
        match *self {
            Derivatives::Acceleration(_, a) => Some(a),
            _ => None,
        }
    }
}

/// Core dynamics engine. Implementations read the immutable [`Model`] and write every
/// result into the [`Data`] buffer, which must have been created for the same model.
///
/// Configuration vectors must have `model.nq` entries, velocity and acceleration vectors
/// `model.nv` entries. Implementations panic on mismatch, as misaligned inputs are a
/// contract violation of the caller.
pub trait Dynamics: Send + Sync {
    /// Placements of all joints, then velocities and accelerations if supplied.
    fn forward_kinematics(&self, model: &Model, data: &mut Data, q: &[f64], derivatives: Derivatives);

    /// Placements of all frames from the joint placements currently in `data`.
    fn update_frame_placements(&self, model: &Model, data: &mut Data);

    /// Inverse dynamics (recursive Newton-Euler). Result in `data.tau`.
    fn rnea(&self, model: &Model, data: &mut Data, q: &[f64], v: &[f64], a: &[f64]);

    /// Coriolis, centrifugal and gravity torques. Result in `data.nle`.
    fn nonlinear_effects(&self, model: &Model, data: &mut Data, q: &[f64], v: &[f64]);

    /// Gravity torques alone. Result in `data.g`.
    fn generalized_gravity(&self, model: &Model, data: &mut Data, q: &[f64]);

    /// Joint space inertia matrix (composite rigid body algorithm). Result in `data.m`,
    /// both triangles filled. Also leaves the world Jacobian in `data.j`.
    fn crba(&self, model: &Model, data: &mut Data, q: &[f64]);

    /// World frame Jacobian columns of every joint. Result in `data.j`.
    fn compute_joint_jacobians(&self, model: &Model, data: &mut Data, q: &[f64]);

    /// Center of mass position, and velocity/acceleration if supplied.
    /// Results in `data.com`, `data.vcom`, `data.acom`, `data.total_mass`.
    fn center_of_mass(&self, model: &Model, data: &mut Data, q: &[f64], derivatives: Derivatives);

    /// Jacobian of the center of mass. Result in `data.jcom`, also updates `data.com`.
    fn jacobian_center_of_mass(&self, model: &Model, data: &mut Data, q: &[f64]);

    /// Centroidal momentum matrix. Results in `data.ag` and `data.hg`, also `data.com`.
    fn ccrba(&self, model: &Model, data: &mut Data, q: &[f64], v: &[f64]);
}
