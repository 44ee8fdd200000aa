//! Articulated body model and its computation buffer.

use nalgebra::{DMatrix, DVector, Matrix3xX, Matrix6xX, Vector3};

use crate::joint::JointType;
use crate::kinematic_traits::{FrameIndex, JointIndex, Pose, STANDARD_GRAVITY};
use crate::spatial::{Force, Inertia, Motion, SpatialAction};

/// A joint of the kinematic tree, together with the body it moves.
#[derive(Debug, Clone)]
pub struct JointModel {
    pub name: String,
    pub kind: JointType,
    /// Parent joint, `None` if the joint is attached to the fixed world.
    pub parent: Option<JointIndex>,
    /// Placement of the joint frame in the frame of the parent joint (or of the world).
    pub placement: Pose,
    /// First configuration coordinate of this joint in `q`.
    pub idx_q: usize,
    /// First velocity coordinate of this joint in `v`.
    pub idx_v: usize,
}

impl JointModel {
    pub fn nq(&self) -> usize {
        self.kind.nq()
    }

    pub fn nv(&self) -> usize {
        self.kind.nv()
    }

    /// Configuration coordinates of this joint inside a full configuration vector.
    pub fn q_of<'a>(&self, q: &'a [f64]) -> &'a [f64] {
        &q[self.idx_q..self.idx_q + self.nq()]
    }

    /// Velocity coordinates of this joint inside a full velocity vector.
    pub fn v_of<'a>(&self, v: &'a [f64]) -> &'a [f64] {
        &v[self.idx_v..self.idx_v + self.nv()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Frame of a movable joint.
    Joint,
    /// Frame of a link.
    Body,
    /// Frame of a fixed joint merged into its parent body.
    FixedJoint,
    /// Frame added by the user (tool tip, sensor and the like).
    Operational,
}

/// Named frame rigidly attached to a joint (or to the world).
#[derive(Debug, Clone)]
pub struct Frame {
    pub name: String,
    pub parent: Option<JointIndex>,
    /// Fixed placement of the frame relative to the parent joint frame.
    pub placement: Pose,
    pub kind: FrameType,
}

/// Immutable description of an articulated rigid body system.
///
/// Joints are stored so that a parent always precedes its children; the recursive
/// algorithms rely on this ordering.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub joints: Vec<JointModel>,
    /// Inertia of the body moved by each joint, in the joint frame.
    pub inertias: Vec<Inertia>,
    pub frames: Vec<Frame>,
    /// Lower position limit for every configuration coordinate.
    pub lower_position_limit: Vec<f64>,
    /// Upper position limit for every configuration coordinate.
    pub upper_position_limit: Vec<f64>,
    /// Gravity acceleration as a spatial motion in the world frame.
    pub gravity: Motion,
    pub nq: usize,
    pub nv: usize,
}

impl Model {
    /// Empty model, standard gravity along -Z.
    pub fn new(name: &str) -> Self {
        Model {
            name: name.to_string(),
            joints: Vec::new(),
            inertias: Vec::new(),
            frames: Vec::new(),
            lower_position_limit: Vec::new(),
            upper_position_limit: Vec::new(),
            gravity: Motion::new(Vector3::new(0.0, 0.0, -STANDARD_GRAVITY), Vector3::zeros()),
            nq: 0,
            nv: 0,
        }
    }

    /// Adds a joint and its frame. Returns the index of the new joint.
    ///
    /// Panics if `parent` does not refer to an existing joint.
    pub fn add_joint(&mut self, parent: Option<JointIndex>, kind: JointType, placement: Pose, name: &str) -> JointIndex {
        if let Some(p) = parent {
            assert!(p < self.joints.len(), "Parent joint {} of {} does not exist", p, name);
        }
        let index = self.joints.len();
        let (nq, nv) = (kind.nq(), kind.nv());
        let (lower, upper) = default_limits(&kind);
        self.lower_position_limit.extend(lower);
        self.upper_position_limit.extend(upper);
        self.joints.push(JointModel {
            name: name.to_string(),
            kind,
            parent,
            placement,
            idx_q: self.nq,
            idx_v: self.nv,
        });
        self.inertias.push(Inertia::zero());
        self.nq += nq;
        self.nv += nv;
        self.add_frame(Frame {
            name: name.to_string(),
            parent: Some(index),
            placement: Pose::identity(),
            kind: FrameType::Joint,
        });
        index
    }

    /// Sets position limits of a joint (one value per configuration coordinate).
    pub fn set_joint_limits(&mut self, joint: JointIndex, lower: &[f64], upper: &[f64]) {
        let j = &self.joints[joint];
        assert_eq!(lower.len(), j.nq(), "Lower limit size mismatch for joint {}", j.name);
        assert_eq!(upper.len(), j.nq(), "Upper limit size mismatch for joint {}", j.name);
        let range = j.idx_q..j.idx_q + j.nq();
        self.lower_position_limit[range.clone()].copy_from_slice(lower);
        self.upper_position_limit[range].copy_from_slice(upper);
    }

    /// Rigidly attaches a body to a joint. `placement` locates the body frame (where
    /// `inertia` is given) in the joint frame.
    pub fn append_body_to_joint(&mut self, joint: JointIndex, inertia: &Inertia, placement: &Pose) {
        self.inertias[joint] += placement.act(inertia);
    }

    pub fn add_frame(&mut self, frame: Frame) -> FrameIndex {
        self.frames.push(frame);
        self.frames.len() - 1
    }

    /// Index of the first frame with this name.
    pub fn frame_id(&self, name: &str) -> Option<FrameIndex> {
        self.frames.iter().position(|f| f.name == name)
    }

    pub fn joint_id(&self, name: &str) -> Option<JointIndex> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// Joints from the root down to `joint` (inclusive), root first.
    pub fn supports(&self, joint: JointIndex) -> Vec<JointIndex> {
        let mut chain = Vec::new();
        let mut current = Some(joint);
        while let Some(j) = current {
            chain.push(j);
            current = self.joints[j].parent;
        }
        chain.reverse();
        chain
    }

    /// Total mass of all bodies moved by joints.
    pub fn total_mass(&self) -> f64 {
        self.inertias.iter().map(|i| i.mass).sum()
    }

    pub(crate) fn check_configuration(&self, q: &[f64]) {
        assert_eq!(q.len(), self.nq, "Configuration has {} entries but the model expects nq = {}", q.len(), self.nq);
    }

    pub(crate) fn check_tangent(&self, what: &str, v: &[f64]) {
        assert_eq!(v.len(), self.nv, "The {} vector has {} entries but the model expects nv = {}", what, v.len(), self.nv);
    }
}

fn default_limits(kind: &JointType) -> (Vec<f64>, Vec<f64>) {
    match kind {
        JointType::Revolute(_) | JointType::Prismatic(_) => (vec![f64::NEG_INFINITY], vec![f64::INFINITY]),
        JointType::FreeFlyer => (
            vec![f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY, -1.0, -1.0, -1.0, -1.0],
            vec![f64::INFINITY, f64::INFINITY, f64::INFINITY, 1.0, 1.0, 1.0, 1.0],
        ),
    }
}

/// Results and scratch space of the algorithms, sized for one [`Model`].
///
/// Each field holds what the last algorithm that writes it computed, for whatever
/// configuration that algorithm received. Nothing here tracks which configuration that
/// was: keeping fields and configuration in step is up to the caller.
#[derive(Debug, Clone)]
pub struct Data {
    /// Joint placements relative to the parent joint, joint motion included.
    pub local_placements: Vec<Pose>,
    /// Joint placements in the world.
    pub world_placements: Vec<Pose>,
    /// Spatial velocity of each joint, in the joint frame.
    pub velocities: Vec<Motion>,
    /// Spatial acceleration of each joint, in the joint frame, gravity excluded.
    pub accelerations: Vec<Motion>,
    /// Frame placements in the world.
    pub frame_placements: Vec<Pose>,

    /// Accelerations with gravity folded in (inverse dynamics).
    pub accelerations_gf: Vec<Motion>,
    /// Body forces of the inverse dynamics, in the joint frame.
    pub forces: Vec<Force>,
    /// Subtree inertias in world coordinates (composite rigid body algorithm).
    pub composite_inertias: Vec<Inertia>,

    /// Joint space inertia matrix.
    pub m: DMatrix<f64>,
    /// Nonlinear effects: Coriolis, centrifugal and gravity torques.
    pub nle: DVector<f64>,
    /// Gravity torques.
    pub g: DVector<f64>,
    /// Inverse dynamics torques.
    pub tau: DVector<f64>,
    /// World frame Jacobian, one column per degree of freedom.
    pub j: Matrix6xX<f64>,

    /// Mass of the subtree rooted at each joint.
    pub subtree_mass: Vec<f64>,
    /// Center of mass of the subtree rooted at each joint, world coordinates.
    pub subtree_com: Vec<Vector3<f64>>,
    pub total_mass: f64,
    /// Center of mass position, velocity and acceleration in the world.
    pub com: Vector3<f64>,
    pub vcom: Vector3<f64>,
    pub acom: Vector3<f64>,
    /// Jacobian of the center of mass.
    pub jcom: Matrix3xX<f64>,

    /// Centroidal momentum matrix (at the center of mass, world axes).
    pub ag: Matrix6xX<f64>,
    /// Centroidal momentum.
    pub hg: Force,
}

impl Data {
    pub fn new(model: &Model) -> Self {
        let n = model.joints.len();
        let nv = model.nv;
        Data {
            local_placements: vec![Pose::identity(); n],
            world_placements: vec![Pose::identity(); n],
            velocities: vec![Motion::zero(); n],
            accelerations: vec![Motion::zero(); n],
            frame_placements: vec![Pose::identity(); model.frames.len()],
            accelerations_gf: vec![Motion::zero(); n],
            forces: vec![Force::zero(); n],
            composite_inertias: vec![Inertia::zero(); n],
            m: DMatrix::zeros(nv, nv),
            nle: DVector::zeros(nv),
            g: DVector::zeros(nv),
            tau: DVector::zeros(nv),
            j: Matrix6xX::zeros(nv),
            subtree_mass: vec![0.0; n],
            subtree_com: vec![Vector3::zeros(); n],
            total_mass: 0.0,
            com: Vector3::zeros(),
            vcom: Vector3::zeros(),
            acom: Vector3::zeros(),
            jcom: Matrix3xX::zeros(nv),
            ag: Matrix6xX::zeros(nv),
            hg: Force::zero(),
        }
    }
}
