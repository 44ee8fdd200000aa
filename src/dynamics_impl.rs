//! Recursive rigid body algorithms over a [`Model`].

use nalgebra::{DVector, Vector3};
use tracing::debug;

use crate::kinematic_traits::{Derivatives, Dynamics, Pose};
use crate::model::{Data, Model};
use crate::spatial::{Force, Motion, SpatialAction};

/// Default dynamics engine: forward kinematics, recursive Newton-Euler, composite rigid
/// body algorithm, Jacobians and center of mass, all in O(n) or O(n·d) passes over the
/// joint tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecursiveDynamics;

impl RecursiveDynamics {
    pub fn new() -> Self {
        RecursiveDynamics
    }

    /// Local and world placements of every joint.
    fn placements(&self, model: &Model, data: &mut Data, q: &[f64]) {
        model.check_configuration(q);
        check_data(model, data);
        for (i, joint) in model.joints.iter().enumerate() {
            let local = joint.placement * joint.kind.transform(joint.q_of(q));
            data.world_placements[i] = match joint.parent {
                Some(p) => data.world_placements[p] * local,
                None => local,
            };
            data.local_placements[i] = local;
        }
    }

    /// Shared forward and backward passes of inverse dynamics. Missing velocity or
    /// acceleration count as zero. Result in `data.tau`.
    fn newton_euler(&self, model: &Model, data: &mut Data, q: &[f64], v: Option<&[f64]>, a: Option<&[f64]>) {
        if let Some(v) = v {
            model.check_tangent("velocity", v);
        }
        if let Some(a) = a {
            model.check_tangent("acceleration", a);
        }
        self.placements(model, data, q);

        // Gravity enters as an upward acceleration of the world.
        let world_acceleration = -model.gravity;
        for (i, joint) in model.joints.iter().enumerate() {
            let local = &data.local_placements[i];
            let (parent_v, parent_a, parent_agf) = match joint.parent {
                Some(p) => (data.velocities[p], data.accelerations[p], data.accelerations_gf[p]),
                None => (Motion::zero(), Motion::zero(), world_acceleration),
            };
            let vj = v.map_or(Motion::zero(), |v| joint.kind.joint_motion(joint.v_of(v)));
            let aj = a.map_or(Motion::zero(), |a| joint.kind.joint_motion(joint.v_of(a)));

            let velocity = local.act_inv(&parent_v) + vj;
            let bias = velocity.cross(&vj);
            data.velocities[i] = velocity;
            data.accelerations[i] = local.act_inv(&parent_a) + aj + bias;
            let agf = local.act_inv(&parent_agf) + aj + bias;
            data.accelerations_gf[i] = agf;

            let inertia = &model.inertias[i];
            data.forces[i] = inertia.mul_motion(&agf) + velocity.cross_force(&inertia.mul_motion(&velocity));
        }

        for (i, joint) in model.joints.iter().enumerate().rev() {
            let force = data.forces[i];
            for k in 0..joint.nv() {
                data.tau[joint.idx_v + k] = joint.kind.motion_subspace(k).dot(&force);
            }
            if let Some(p) = joint.parent {
                let in_parent = data.local_placements[i].act(&force);
                data.forces[p] += in_parent;
            }
        }
    }

    /// Motion subspace columns mapped to the world frame, one per degree of freedom.
    /// Placements must be current.
    fn world_columns(&self, model: &Model, data: &mut Data) {
        for (i, joint) in model.joints.iter().enumerate() {
            let o_m_i = &data.world_placements[i];
            for k in 0..joint.nv() {
                let column = o_m_i.act(&joint.kind.motion_subspace(k)).to_vector();
                data.j.set_column(joint.idx_v + k, &column);
            }
        }
    }

    /// Subtree inertias in the world frame. Placements must be current.
    fn composite_inertias(&self, model: &Model, data: &mut Data) {
        for (i, inertia) in model.inertias.iter().enumerate() {
            data.composite_inertias[i] = data.world_placements[i].act(inertia);
        }
        for (i, joint) in model.joints.iter().enumerate().rev() {
            if let Some(p) = joint.parent {
                let child = data.composite_inertias[i];
                data.composite_inertias[p] += child;
            }
        }
    }

    /// Center of mass terms from the kinematics currently in `data`.
    fn accumulate_center_of_mass(&self, model: &Model, data: &mut Data, velocity: bool, acceleration: bool) {
        let n = model.joints.len();
        let mut weighted = vec![Vector3::zeros(); n];
        let mut weighted_v = Vector3::zeros();
        let mut weighted_a = Vector3::zeros();

        for (i, inertia) in model.inertias.iter().enumerate() {
            let o_m_i = &data.world_placements[i];
            let c = &inertia.lever;
            data.subtree_mass[i] = inertia.mass;
            weighted[i] = o_m_i.transform_point(&(*c).into()).coords * inertia.mass;

            if velocity {
                let vel = &data.velocities[i];
                let point_velocity = vel.linear + vel.angular.cross(c);
                weighted_v += o_m_i.rotation * point_velocity * inertia.mass;
                if acceleration {
                    let acc = &data.accelerations[i];
                    let point_acceleration =
                        acc.linear + acc.angular.cross(c) + vel.angular.cross(&point_velocity);
                    weighted_a += o_m_i.rotation * point_acceleration * inertia.mass;
                }
            }
        }

        for (i, joint) in model.joints.iter().enumerate().rev() {
            if let Some(p) = joint.parent {
                let child_mass = data.subtree_mass[i];
                data.subtree_mass[p] += child_mass;
                let child = weighted[i];
                weighted[p] += child;
            }
        }

        let mut total_weighted = Vector3::zeros();
        let mut total_mass = 0.0;
        for (i, joint) in model.joints.iter().enumerate() {
            let mass = data.subtree_mass[i];
            data.subtree_com[i] = if mass > 0.0 {
                weighted[i] / mass
            } else {
                data.world_placements[i].translation.vector
            };
            if joint.parent.is_none() {
                total_weighted += weighted[i];
                total_mass += mass;
            }
        }

        data.total_mass = total_mass;
        if total_mass <= 0.0 {
            debug!("Model {} has no mass, center of mass reported at the origin", model.name);
            data.com = Vector3::zeros();
            if velocity {
                data.vcom = Vector3::zeros();
            }
            if acceleration {
                data.acom = Vector3::zeros();
            }
            return;
        }
        data.com = total_weighted / total_mass;
        if velocity {
            data.vcom = weighted_v / total_mass;
        }
        if acceleration {
            data.acom = weighted_a / total_mass;
        }
    }
}

fn check_data(model: &Model, data: &Data) {
    assert_eq!(
        data.world_placements.len(),
        model.joints.len(),
        "Data buffer was created for a model with {} joints, this model has {}",
        data.world_placements.len(),
        model.joints.len()
    );
}

impl Dynamics for RecursiveDynamics {
    fn forward_kinematics(&self, model: &Model, data: &mut Data, q: &[f64], derivatives: Derivatives) {
        let v = derivatives.velocity();
        let a = derivatives.acceleration();
        if let Some(v) = v {
            model.check_tangent("velocity", v);
        }
        if let Some(a) = a {
            model.check_tangent("acceleration", a);
        }
        self.placements(model, data, q);

        let Some(v) = v else {
            return;
        };
        for (i, joint) in model.joints.iter().enumerate() {
            let local = &data.local_placements[i];
            let vj = joint.kind.joint_motion(joint.v_of(v));
            let parent_v = joint.parent.map_or(Motion::zero(), |p| data.velocities[p]);
            let velocity = local.act_inv(&parent_v) + vj;
            data.velocities[i] = velocity;

            if let Some(a) = a {
                let parent_a = joint.parent.map_or(Motion::zero(), |p| data.accelerations[p]);
                data.accelerations[i] =
                    local.act_inv(&parent_a) + joint.kind.joint_motion(joint.v_of(a)) + velocity.cross(&vj);
            }
        }
    }

    fn update_frame_placements(&self, model: &Model, data: &mut Data) {
        for (f, frame) in model.frames.iter().enumerate() {
            data.frame_placements[f] = frame_world_placement(data, frame.parent, &frame.placement);
        }
    }

    fn rnea(&self, model: &Model, data: &mut Data, q: &[f64], v: &[f64], a: &[f64]) {
        self.newton_euler(model, data, q, Some(v), Some(a));
    }

    fn nonlinear_effects(&self, model: &Model, data: &mut Data, q: &[f64], v: &[f64]) {
        self.newton_euler(model, data, q, Some(v), None);
        data.nle.copy_from(&data.tau);
    }

    fn generalized_gravity(&self, model: &Model, data: &mut Data, q: &[f64]) {
        self.newton_euler(model, data, q, None, None);
        data.g.copy_from(&data.tau);
    }

    fn crba(&self, model: &Model, data: &mut Data, q: &[f64]) {
        self.placements(model, data, q);
        self.composite_inertias(model, data);
        self.world_columns(model, data);

        for (i, joint) in model.joints.iter().enumerate() {
            let inertia = data.composite_inertias[i];
            for ci in joint.idx_v..joint.idx_v + joint.nv() {
                let momentum = inertia.mul_motion(&column_motion(data, ci));
                for j in model.supports(i) {
                    let ancestor = &model.joints[j];
                    for cj in ancestor.idx_v..ancestor.idx_v + ancestor.nv() {
                        let value = column_motion(data, cj).dot(&momentum);
                        data.m[(cj, ci)] = value;
                        data.m[(ci, cj)] = value;
                    }
                }
            }
        }
    }

    fn compute_joint_jacobians(&self, model: &Model, data: &mut Data, q: &[f64]) {
        self.placements(model, data, q);
        self.world_columns(model, data);
    }

    fn center_of_mass(&self, model: &Model, data: &mut Data, q: &[f64], derivatives: Derivatives) {
        self.forward_kinematics(model, data, q, derivatives);
        let velocity = derivatives.velocity().is_some();
        let acceleration = derivatives.acceleration().is_some();
        self.accumulate_center_of_mass(model, data, velocity, acceleration);
    }

    fn jacobian_center_of_mass(&self, model: &Model, data: &mut Data, q: &[f64]) {
        self.compute_joint_jacobians(model, data, q);
        self.accumulate_center_of_mass(model, data, false, false);
        data.jcom.fill(0.0);
        if data.total_mass <= 0.0 {
            return;
        }
        for (i, joint) in model.joints.iter().enumerate() {
            let ratio = data.subtree_mass[i] / data.total_mass;
            let com = data.subtree_com[i];
            for c in joint.idx_v..joint.idx_v + joint.nv() {
                let column = column_motion(data, c);
                let point_velocity = column.linear + column.angular.cross(&com);
                data.jcom.set_column(c, &(point_velocity * ratio));
            }
        }
    }

    fn ccrba(&self, model: &Model, data: &mut Data, q: &[f64], v: &[f64]) {
        model.check_tangent("velocity", v);
        self.placements(model, data, q);
        self.composite_inertias(model, data);
        self.world_columns(model, data);
        self.accumulate_center_of_mass(model, data, false, false);

        let com = data.com;
        for (i, joint) in model.joints.iter().enumerate() {
            let inertia = data.composite_inertias[i];
            for c in joint.idx_v..joint.idx_v + joint.nv() {
                let momentum = inertia.mul_motion(&column_motion(data, c));
                let at_com = Force::new(momentum.linear, momentum.angular - com.cross(&momentum.linear));
                data.ag.set_column(c, &at_com.to_vector());
            }
        }
        let hg = &data.ag * DVector::from_column_slice(v);
        data.hg = Force::new(hg.fixed_rows::<3>(0).into_owned(), hg.fixed_rows::<3>(3).into_owned());
    }
}

fn column_motion(data: &Data, column: usize) -> Motion {
    let c = data.j.column(column);
    Motion::new(Vector3::new(c[0], c[1], c[2]), Vector3::new(c[3], c[4], c[5]))
}

/// Placement of a frame attached to `joint`, from the joint placements in `data`.
pub(crate) fn frame_world_placement(data: &Data, parent: Option<usize>, placement: &Pose) -> Pose {
    match parent {
        Some(j) => data.world_placements[j] * placement,
        None => *placement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::JointType;
    use approx::assert_relative_eq;
    use crate::spatial::Inertia;
    use nalgebra::{Matrix3, Translation3, UnitQuaternion};

    /// Point mass on a massless rod, rotating about Z.
    fn pendulum(length: f64, mass: f64) -> Model {
        let mut model = Model::new("pendulum");
        let j = model.add_joint(None, JointType::revolute(Vector3::z()), Pose::identity(), "hinge");
        model.append_body_to_joint(
            j,
            &Inertia::new(mass, Vector3::new(length, 0.0, 0.0), Matrix3::zeros()),
            &Pose::identity(),
        );
        model
    }

    #[test]
    fn test_pendulum_inertia() {
        let model = pendulum(0.5, 2.0);
        let mut data = Data::new(&model);
        RecursiveDynamics.crba(&model, &mut data, &[0.3]);
        assert_relative_eq!(data.m[(0, 0)], 2.0 * 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_horizontal_axis_gravity() {
        // Rotation about Y, rod along X: gravity torque is m g l at q = 0.
        let mut model = Model::new("pendulum");
        let j = model.add_joint(None, JointType::revolute(Vector3::y()), Pose::identity(), "hinge");
        model.append_body_to_joint(
            j,
            &Inertia::new(1.5, Vector3::new(0.4, 0.0, 0.0), Matrix3::zeros()),
            &Pose::identity(),
        );
        let mut data = Data::new(&model);
        RecursiveDynamics.generalized_gravity(&model, &mut data, &[0.0]);
        // Gravity pulls the tip towards +Y rotation, holding it takes a negative torque.
        assert_relative_eq!(data.g[0], -1.5 * 9.81 * 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_frame_placement_follows_joint() {
        let mut model = pendulum(1.0, 1.0);
        let tip = Pose::from_parts(Translation3::new(1.0, 0.0, 0.0), UnitQuaternion::identity());
        model.add_frame(crate::model::Frame {
            name: "tip".into(),
            parent: Some(0),
            placement: tip,
            kind: crate::model::FrameType::Operational,
        });
        let mut data = Data::new(&model);
        RecursiveDynamics.forward_kinematics(&model, &mut data, &[std::f64::consts::FRAC_PI_2], Derivatives::Position);
        RecursiveDynamics.update_frame_placements(&model, &mut data);
        let placement = data.frame_placements[1];
        assert_relative_eq!(placement.translation.vector, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(
            frame_world_placement(&data, Some(0), &tip).translation.vector,
            placement.translation.vector,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_massless_model_com_at_origin() {
        let mut model = Model::new("empty");
        model.add_joint(None, JointType::prismatic(Vector3::x()), Pose::identity(), "slider");
        let mut data = Data::new(&model);
        RecursiveDynamics.center_of_mass(&model, &mut data, &[2.0], Derivatives::Velocity(&[1.0]));
        assert_eq!(data.total_mass, 0.0);
        assert_eq!(data.com, Vector3::zeros());
        assert_eq!(data.vcom, Vector3::zeros());
    }

    #[test]
    #[should_panic(expected = "nv = 1")]
    fn test_velocity_size_is_checked() {
        let model = pendulum(1.0, 1.0);
        let mut data = Data::new(&model);
        RecursiveDynamics.nonlinear_effects(&model, &mut data, &[0.0], &[0.0, 1.0]);
    }
}
