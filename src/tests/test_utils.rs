//! Models shared by the tests.

use nalgebra::{Matrix3, Translation3, UnitQuaternion, Vector3};

use crate::joint::JointType;
use crate::kinematic_traits::Pose;
use crate::model::{Frame, FrameType, Model};
use crate::spatial::Inertia;

pub(crate) const G: f64 = crate::kinematic_traits::STANDARD_GRAVITY;

/// Planar two-link arm: both joints rotate about Y, links point along X at rest.
pub(crate) struct TwoLink {
    pub m1: f64,
    pub m2: f64,
    pub l1: f64,
    pub l2: f64,
    /// Rotational inertia about Y at the center of mass
    pub i1: f64,
    pub i2: f64,
}

impl TwoLink {
    pub fn new() -> Self {
        let (m1, m2, l1, l2) = (2.0, 1.5, 0.8, 0.6);
        TwoLink {
            m1,
            m2,
            l1,
            l2,
            i1: m1 * l1 * l1 / 12.0,
            i2: m2 * l2 * l2 / 12.0,
        }
    }

    fn rod(mass: f64, length: f64, iyy: f64) -> Inertia {
        Inertia::new(
            mass,
            Vector3::new(length / 2.0, 0.0, 0.0),
            Matrix3::from_diagonal(&Vector3::new(1e-4, iyy, iyy)),
        )
    }

    /// The model, with frame "tip" at the end of the second link.
    pub fn model(&self) -> Model {
        let mut model = Model::new("two_link");
        let j1 = model.add_joint(None, JointType::revolute(Vector3::y()), Pose::identity(), "shoulder");
        model.append_body_to_joint(j1, &Self::rod(self.m1, self.l1, self.i1), &Pose::identity());
        let j2 = model.add_joint(Some(j1), JointType::revolute(Vector3::y()), at(self.l1, 0.0, 0.0), "elbow");
        model.append_body_to_joint(j2, &Self::rod(self.m2, self.l2, self.i2), &Pose::identity());
        model.add_frame(Frame {
            name: "tip".into(),
            parent: Some(j2),
            placement: at(self.l2, 0.0, 0.0),
            kind: FrameType::Operational,
        });
        model
    }

    pub fn mass_matrix(&self, q: &[f64]) -> [[f64; 2]; 2] {
        let (lc1, lc2) = (self.l1 / 2.0, self.l2 / 2.0);
        let c2 = q[1].cos();
        let m11 = self.i1 + self.i2 + self.m1 * lc1 * lc1
            + self.m2 * (self.l1 * self.l1 + lc2 * lc2 + 2.0 * self.l1 * lc2 * c2);
        let m12 = self.i2 + self.m2 * (lc2 * lc2 + self.l1 * lc2 * c2);
        let m22 = self.i2 + self.m2 * lc2 * lc2;
        [[m11, m12], [m12, m22]]
    }

    /// Positive rotation about Y lowers the links, so holding them takes negative torques.
    pub fn gravity(&self, q: &[f64]) -> [f64; 2] {
        let (lc1, lc2) = (self.l1 / 2.0, self.l2 / 2.0);
        let c1 = q[0].cos();
        let c12 = (q[0] + q[1]).cos();
        [
            -G * ((self.m1 * lc1 + self.m2 * self.l1) * c1 + self.m2 * lc2 * c12),
            -G * self.m2 * lc2 * c12,
        ]
    }

    pub fn coriolis(&self, q: &[f64], v: &[f64]) -> [f64; 2] {
        let h = self.m2 * self.l1 * (self.l2 / 2.0) * q[1].sin();
        [-h * (2.0 * v[0] * v[1] + v[1] * v[1]), h * v[0] * v[0]]
    }

    pub fn tip_position(&self, q: &[f64]) -> Vector3<f64> {
        let (a, b) = (q[0], q[0] + q[1]);
        Vector3::new(
            self.l1 * a.cos() + self.l2 * b.cos(),
            0.0,
            -(self.l1 * a.sin() + self.l2 * b.sin()),
        )
    }
}

pub(crate) fn at(x: f64, y: f64, z: f64) -> Pose {
    Pose::from_parts(Translation3::new(x, y, z), UnitQuaternion::identity())
}

/// Floating base carrying two branches, with offsets and tilted axes so that no term
/// vanishes by symmetry.
pub(crate) fn branching_robot() -> Model {
    let mut model = Model::new("branching");
    let base = model.add_joint(None, JointType::FreeFlyer, Pose::identity(), "root_joint");
    model.append_body_to_joint(
        base,
        &Inertia::new(5.0, Vector3::new(0.0, 0.0, 0.05), Matrix3::from_diagonal(&Vector3::new(0.1, 0.12, 0.08))),
        &Pose::identity(),
    );

    let tilted = Pose::from_parts(
        Translation3::new(0.2, 0.1, 0.0),
        UnitQuaternion::from_euler_angles(0.2, -0.1, 0.4),
    );
    let left = model.add_joint(Some(base), JointType::revolute(Vector3::new(0.0, 1.0, 0.3)), tilted, "left_hip");
    model.append_body_to_joint(
        left,
        &Inertia::new(1.2, Vector3::new(0.0, 0.0, -0.2), Matrix3::from_diagonal(&Vector3::new(0.02, 0.02, 0.005))),
        &Pose::identity(),
    );
    let knee = model.add_joint(Some(left), JointType::revolute(Vector3::x()), at(0.0, 0.0, -0.4), "left_knee");
    model.append_body_to_joint(
        knee,
        &Inertia::new(0.8, Vector3::new(0.05, 0.0, -0.15), Matrix3::from_diagonal(&Vector3::new(0.01, 0.012, 0.004))),
        &Pose::identity(),
    );

    let right = model.add_joint(Some(base), JointType::prismatic(Vector3::new(0.0, 0.0, 1.0)), at(-0.2, -0.1, 0.0), "right_slider");
    model.append_body_to_joint(
        right,
        &Inertia::new(0.6, Vector3::new(0.1, 0.0, 0.0), Matrix3::from_diagonal(&Vector3::new(0.003, 0.004, 0.005))),
        &at(0.0, 0.05, 0.0),
    );
    model.add_frame(Frame {
        name: "foot".into(),
        parent: Some(knee),
        placement: Pose::from_parts(Translation3::new(0.0, 0.02, -0.3), UnitQuaternion::from_euler_angles(0.0, 0.3, 0.0)),
        kind: FrameType::Operational,
    });
    model
}

/// Deterministic non-trivial velocity (or acceleration) vector.
pub(crate) fn sample_tangent(nv: usize, scale: f64) -> Vec<f64> {
    (0..nv).map(|k| scale * ((k as f64 + 1.0) * 0.7).sin()).collect()
}

pub(crate) fn assert_close(a: f64, b: f64, tolerance: f64, what: &str) {
    assert!((a - b).abs() <= tolerance, "{}: {} vs {} (tolerance {})", what, a, b, tolerance);
}
