//! Cached access to kinematic and dynamic quantities of one robot.
//!
//! [`ModelCache`] pairs a shared, immutable [`Model`] with a [`Data`] buffer it owns
//! exclusively. Accessors taking a `recompute` flag either run the algorithm for the
//! given configuration or hand back what the previous run left in the buffer. In the
//! latter case the configuration argument is not looked at: keeping the cached values
//! and the configuration in step is the caller's business.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Matrix3xX, Matrix6xX, Translation3, UnitQuaternion, Vector3};
use rand::Rng;
use tracing::debug;

use crate::configuration;
use crate::dynamics_impl::{frame_world_placement, RecursiveDynamics};
use crate::kinematic_traits::{Derivatives, Dynamics, FrameIndex, JointIndex, Pose, ReferenceFrame};
use crate::model::{Data, Model};
use crate::spatial::{Force, Motion, SpatialAction};

#[cfg(feature = "collisions")]
use crate::collisions::{self, CollisionPair, GeometryData, GeometryModel};

/// Center of mass of the whole model in world coordinates, with as many time
/// derivatives as were requested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CenterOfMass {
    Position(Vector3<f64>),
    PositionVelocity(Vector3<f64>, Vector3<f64>),
    PositionVelocityAcceleration(Vector3<f64>, Vector3<f64>, Vector3<f64>),
}

impl CenterOfMass {
    pub fn position(&self) -> Vector3<f64> {
        match *self {
            CenterOfMass::Position(p)
            | CenterOfMass::PositionVelocity(p, _)
            | CenterOfMass::PositionVelocityAcceleration(p, _, _) => p,
        }
    }

    pub fn velocity(&self) -> Option<Vector3<f64>> {
        match *self {
            CenterOfMass::Position(_) => None,
            CenterOfMass::PositionVelocity(_, v) | CenterOfMass::PositionVelocityAcceleration(_, v, _) => Some(v),
        }
    }

    pub fn acceleration(&self) -> Option<Vector3<f64>> {
        match *self {
            CenterOfMass::PositionVelocityAcceleration(_, _, a) => Some(a),
            _ => None,
        }
    }
}

/// Kinematics and dynamics façade over one model and its computation buffer.
pub struct ModelCache {
    model: Arc<Model>,
    data: Data,
    engine: Arc<dyn Dynamics>,
    #[cfg(feature = "collisions")]
    collision_model: GeometryModel,
    #[cfg(feature = "collisions")]
    collision_data: GeometryData,
}

impl ModelCache {
    /// Cache over `model` using [`RecursiveDynamics`].
    pub fn new(model: Model) -> Self {
        Self::with_engine(Arc::new(model), Arc::new(RecursiveDynamics::new()))
    }

    /// Cache over a model shared with other caches, computed by `engine`.
    pub fn with_engine(model: Arc<Model>, engine: Arc<dyn Dynamics>) -> Self {
        let data = Data::new(&model);
        #[cfg(feature = "collisions")]
        let collision_model = GeometryModel::new();
        ModelCache {
            #[cfg(feature = "collisions")]
            collision_data: GeometryData::new(&collision_model),
            #[cfg(feature = "collisions")]
            collision_model,
            model,
            data,
            engine,
        }
    }

    /// Another cache over the same model and engine with a buffer of its own, so that
    /// both can compute in parallel. The collision model is copied, its state reset.
    pub fn fork(&self) -> Self {
        #[allow(unused_mut)]
        let mut forked = Self::with_engine(Arc::clone(&self.model), Arc::clone(&self.engine));
        #[cfg(feature = "collisions")]
        forked.set_collision_model(self.collision_model.clone());
        forked
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn nq(&self) -> usize {
        self.model.nq
    }

    pub fn nv(&self) -> usize {
        self.model.nv
    }

    pub fn frame_id(&self, name: &str) -> Option<FrameIndex> {
        self.model.frame_id(name)
    }

    pub fn joint_id(&self, name: &str) -> Option<JointIndex> {
        self.model.joint_id(name)
    }

    /// Joint space inertia matrix, `nv x nv`.
    pub fn mass(&mut self, q: &[f64], recompute: bool) -> &DMatrix<f64> {
        if recompute {
            self.engine.crba(&self.model, &mut self.data, q);
        } else {
            debug!("Reusing cached mass matrix");
        }
        &self.data.m
    }

    /// Coriolis, centrifugal and gravity torques: the torques needed to move with
    /// velocity `v` and no acceleration.
    pub fn bias(&mut self, q: &[f64], v: &[f64], recompute: bool) -> &DVector<f64> {
        if recompute {
            self.engine.nonlinear_effects(&self.model, &mut self.data, q, v);
        } else {
            debug!("Reusing cached bias forces");
        }
        &self.data.nle
    }

    /// Torques compensating gravity at rest. Always recomputed.
    pub fn gravity(&mut self, q: &[f64]) -> &DVector<f64> {
        self.engine.generalized_gravity(&self.model, &mut self.data, q);
        &self.data.g
    }

    /// Joint torques producing acceleration `a` at velocity `v`.
    pub fn inverse_dynamics(&mut self, q: &[f64], v: &[f64], a: &[f64]) -> &DVector<f64> {
        self.engine.rnea(&self.model, &mut self.data, q, v, a);
        &self.data.tau
    }

    /// Center of mass, and its velocity and acceleration if their inputs are supplied.
    /// The result carries exactly the requested derivatives.
    pub fn center_of_mass(&mut self, q: &[f64], derivatives: Derivatives, recompute: bool) -> CenterOfMass {
        if recompute {
            self.engine.center_of_mass(&self.model, &mut self.data, q, derivatives);
        } else {
            debug!("Reusing cached center of mass");
        }
        let d = &self.data;
        match derivatives {
            Derivatives::Position => CenterOfMass::Position(d.com),
            Derivatives::Velocity(_) => CenterOfMass::PositionVelocity(d.com, d.vcom),
            Derivatives::Acceleration(_, _) => CenterOfMass::PositionVelocityAcceleration(d.com, d.vcom, d.acom),
        }
    }

    /// Jacobian of the center of mass, `3 x nv`.
    pub fn com_jacobian(&mut self, q: &[f64], recompute: bool) -> &Matrix3xX<f64> {
        if recompute {
            self.engine.jacobian_center_of_mass(&self.model, &mut self.data, q);
        } else {
            debug!("Reusing cached center of mass Jacobian");
        }
        &self.data.jcom
    }

    /// Centroidal momentum matrix, `6 x nv`: maps velocities to the linear and angular
    /// momentum about the center of mass. The momentum for `v` is kept as well, see
    /// [`ModelCache::centroidal_momentum`].
    pub fn momentum_jacobian(&mut self, q: &[f64], v: &[f64], recompute: bool) -> &Matrix6xX<f64> {
        if recompute {
            self.engine.ccrba(&self.model, &mut self.data, q, v);
        } else {
            debug!("Reusing cached centroidal momentum matrix");
        }
        &self.data.ag
    }

    /// Centroidal momentum from the last [`ModelCache::momentum_jacobian`] recompute.
    pub fn centroidal_momentum(&self) -> Force {
        self.data.hg
    }

    /// Joint placements, then velocities and accelerations as far as supplied.
    pub fn forward_kinematics(&mut self, q: &[f64], derivatives: Derivatives) {
        self.engine.forward_kinematics(&self.model, &mut self.data, q, derivatives);
    }

    /// Placements of all joints and all frames.
    pub fn frames_forward_kinematics(&mut self, q: &[f64]) -> &[Pose] {
        self.engine.forward_kinematics(&self.model, &mut self.data, q, Derivatives::Position);
        self.engine.update_frame_placements(&self.model, &mut self.data);
        &self.data.frame_placements
    }

    /// Everything a whole-body controller usually needs in one pass: mass matrix,
    /// bias and gravity torques, joint Jacobians, frame placements, and the center of
    /// mass with its velocity and Jacobian.
    pub fn compute_all_terms(&mut self, q: &[f64], v: &[f64]) {
        let (model, data) = (&*self.model, &mut self.data);
        self.engine.crba(model, data, q);
        self.engine.nonlinear_effects(model, data, q, v);
        self.engine.generalized_gravity(model, data, q);
        self.engine.jacobian_center_of_mass(model, data, q);
        self.engine.center_of_mass(model, data, q, Derivatives::Velocity(v));
        self.engine.update_frame_placements(model, data);
    }

    fn check_frame(&self, frame: FrameIndex) {
        assert!(
            frame < self.model.frames.len(),
            "Frame {} does not exist, model has {} frames", frame, self.model.frames.len()
        );
    }

    /// World placement of a frame: parent joint placement composed with the frame
    /// offset. With `recompute`, joint placements are updated for `q` first.
    pub fn frame_placement(&mut self, q: &[f64], frame: FrameIndex, recompute: bool) -> Pose {
        self.check_frame(frame);
        if recompute {
            self.engine.forward_kinematics(&self.model, &mut self.data, q, Derivatives::Position);
        }
        let f = &self.model.frames[frame];
        let placement = frame_world_placement(&self.data, f.parent, &f.placement);
        self.data.frame_placements[frame] = placement;
        placement
    }

    /// Spatial velocity of a frame, in the frame, from the last forward kinematics that
    /// included velocities.
    pub fn frame_velocity(&self, frame: FrameIndex) -> Motion {
        self.check_frame(frame);
        let f = &self.model.frames[frame];
        match f.parent {
            Some(j) => f.placement.act_inv(&self.data.velocities[j]),
            None => Motion::zero(),
        }
    }

    /// Spatial acceleration of a frame, in the frame, from the last forward kinematics
    /// that included accelerations.
    pub fn frame_acceleration(&self, frame: FrameIndex) -> Motion {
        self.check_frame(frame);
        let f = &self.model.frames[frame];
        match f.parent {
            Some(j) => f.placement.act_inv(&self.data.accelerations[j]),
            None => Motion::zero(),
        }
    }

    /// Acceleration of the frame origin as a point, in the frame: the spatial
    /// acceleration corrected by `angular velocity x linear velocity`.
    pub fn frame_classic_acceleration(&self, frame: FrameIndex) -> Motion {
        let v = self.frame_velocity(frame);
        let mut a = self.frame_acceleration(frame);
        a.linear += v.angular.cross(&v.linear);
        a
    }

    /// Jacobian of a joint, `6 x nv`, linear rows first. Columns of joints that do
    /// not move this joint are zero.
    ///
    /// With `update_geometry`, the world Jacobians of the whole model are recomputed for
    /// `q` first, which is wasteful when several Jacobians are taken in a row at the same
    /// configuration: update once, then pass `false`.
    pub fn joint_jacobian(
        &mut self, q: &[f64], joint: JointIndex, update_geometry: bool, reference: ReferenceFrame,
    ) -> Matrix6xX<f64> {
        assert!(joint < self.model.joints.len(), "Joint {} does not exist", joint);
        if update_geometry {
            self.engine.compute_joint_jacobians(&self.model, &mut self.data, q);
        }
        let placement = self.data.world_placements[joint];
        self.supported_jacobian(Some(joint), &placement, reference)
    }

    /// Jacobian of a frame, `6 x nv`, see [`ModelCache::joint_jacobian`].
    pub fn frame_jacobian(
        &mut self, q: &[f64], frame: FrameIndex, update_geometry: bool, reference: ReferenceFrame,
    ) -> Matrix6xX<f64> {
        self.check_frame(frame);
        if update_geometry {
            self.engine.compute_joint_jacobians(&self.model, &mut self.data, q);
        }
        let f = &self.model.frames[frame];
        let placement = frame_world_placement(&self.data, f.parent, &f.placement);
        self.supported_jacobian(f.parent, &placement, reference)
    }

    /// Columns of the world Jacobian of the joints supporting `joint`, expressed as
    /// requested at `placement`.
    fn supported_jacobian(&self, joint: Option<JointIndex>, placement: &Pose, reference: ReferenceFrame) -> Matrix6xX<f64> {
        let mut jacobian = Matrix6xX::zeros(self.model.nv);
        let Some(joint) = joint else {
            return jacobian;
        };
        let origin_only = Pose::from_parts(Translation3::from(placement.translation.vector), UnitQuaternion::identity());
        for j in self.model.supports(joint) {
            let jm = &self.model.joints[j];
            for c in jm.idx_v..jm.idx_v + jm.nv() {
                let world = Motion::from_vector(&self.data.j.column(c).into_owned());
                let column = match reference {
                    ReferenceFrame::World => world,
                    ReferenceFrame::Local => placement.act_inv(&world),
                    ReferenceFrame::LocalWorldAligned => origin_only.act_inv(&world),
                };
                jacobian.set_column(c, &column.to_vector());
            }
        }
        jacobian
    }

    /// Moves `q` in place by the tangent displacement `dq`.
    pub fn increment(&self, q: &mut [f64], dq: &[f64]) {
        configuration::integrate(&self.model, q, dq);
    }

    /// Displacement that [`ModelCache::increment`] needs to go from `q0` to `q1`.
    pub fn difference(&self, q0: &[f64], q1: &[f64]) -> Vec<f64> {
        configuration::difference(&self.model, q0, q1)
    }

    pub fn normalize(&self, q: &mut [f64]) {
        configuration::normalize(&self.model, q);
    }

    pub fn neutral_configuration(&self) -> Vec<f64> {
        configuration::neutral(&self.model)
    }

    pub fn random_configuration<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        configuration::random_configuration(&self.model, rng)
    }
}

#[cfg(feature = "collisions")]
impl ModelCache {
    /// Installs the collision geometry, keeping its pair list. All pairs start active.
    pub fn set_collision_model(&mut self, collision_model: GeometryModel) {
        self.collision_data = GeometryData::new(&collision_model);
        self.collision_model = collision_model;
    }

    pub fn collision_model(&self) -> &GeometryModel {
        &self.collision_model
    }

    pub fn collision_data(&self) -> &GeometryData {
        &self.collision_data
    }

    /// Registers every pair of objects carried by different joints, ascending, and
    /// resets the collision state: all pairs active, nothing tested.
    pub fn add_all_collision_pairs(&mut self) {
        self.collision_model.add_all_collision_pairs();
        self.collision_data = GeometryData::new(&self.collision_model);
        debug!("{} collision pairs registered", self.collision_model.collision_pairs.len());
    }

    /// Excludes pairs from later checks.
    pub fn deactivate_collision_pairs(&mut self, indices: &[usize]) {
        self.collision_data.deactivate(indices);
    }

    /// Index of the pair made of the two named objects.
    pub fn collision_pair_index(&self, first: &str, second: &str) -> Option<usize> {
        let a = self.collision_model.object_id(first)?;
        let b = self.collision_model.object_id(second)?;
        if a == b {
            return None;
        }
        self.collision_model.find_collision_pair(&CollisionPair::new(a, b))
    }

    /// Places all geometry objects for configuration `q`.
    pub fn update_geometry_placements(&mut self, q: &[f64]) {
        self.engine.forward_kinematics(&self.model, &mut self.data, q, Derivatives::Position);
        collisions::update_geometry_placements(
            &self.model, &self.data, &self.collision_model, &mut self.collision_data);
    }

    /// Whether any active pair collides at `q`. With `stop_at_first`, the check ends at
    /// the first colliding pair.
    pub fn is_in_collision(&mut self, q: &[f64], stop_at_first: bool) -> bool {
        self.update_geometry_placements(q);
        collisions::compute_collisions(&self.collision_model, &mut self.collision_data, stop_at_first)
    }

    /// First colliding pair in ascending index order, at the current geometry
    /// placements. With `active_only`, deactivated pairs are skipped.
    pub fn find_first_collision_pair(&mut self, active_only: bool) -> Option<(usize, CollisionPair)> {
        for k in 0..self.collision_model.collision_pairs.len() {
            if active_only && !self.collision_data.active[k] {
                continue;
            }
            if collisions::compute_collision(&self.collision_model, &mut self.collision_data, k) {
                return Some((k, self.collision_model.collision_pairs[k]));
            }
        }
        None
    }

    /// All colliding pairs in ascending index order, at the current geometry placements.
    pub fn find_all_collision_pairs(&mut self, active_only: bool) -> Vec<(usize, CollisionPair)> {
        let mut colliding = Vec::new();
        for k in 0..self.collision_model.collision_pairs.len() {
            if active_only && !self.collision_data.active[k] {
                continue;
            }
            if collisions::compute_collision(&self.collision_model, &mut self.collision_data, k) {
                colliding.push((k, self.collision_model.collision_pairs[k]));
            }
        }
        colliding
    }
}
