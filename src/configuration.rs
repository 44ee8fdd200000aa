//! Operations on configuration vectors that respect the joint manifolds.

use rand::Rng;

use crate::model::Model;

/// Configuration with every joint at rest (identity quaternion for free-flyers).
pub fn neutral(model: &Model) -> Vec<f64> {
    let mut q = Vec::with_capacity(model.nq);
    for joint in &model.joints {
        q.extend(joint.kind.neutral());
    }
    q
}

/// Random configuration within the position limits of the model. Unbounded coordinates
/// are drawn from `[-pi, pi]`.
pub fn random_configuration<R: Rng + ?Sized>(model: &Model, rng: &mut R) -> Vec<f64> {
    let mut q = vec![0.0; model.nq];
    for joint in &model.joints {
        let range = joint.idx_q..joint.idx_q + joint.nq();
        joint.kind.random(
            rng,
            &model.lower_position_limit[range.clone()],
            &model.upper_position_limit[range.clone()],
            &mut q[range],
        );
    }
    q
}

/// Moves `q` in place along the tangent displacement `dq` (`nv` entries).
///
/// Free-flyer blocks compose on the right with the exponential of their 6D block, every
/// other coordinate is added.
pub fn integrate(model: &Model, q: &mut [f64], dq: &[f64]) {
    model.check_configuration(q);
    model.check_tangent("increment", dq);
    for joint in &model.joints {
        let range = joint.idx_q..joint.idx_q + joint.nq();
        let current = q[range.clone()].to_vec();
        joint.kind.integrate(&current, joint.v_of(dq), &mut q[range]);
    }
}

/// Tangent displacement leading from `q0` to `q1`, such that integrating `q0` by the
/// result gives `q1`.
pub fn difference(model: &Model, q0: &[f64], q1: &[f64]) -> Vec<f64> {
    model.check_configuration(q0);
    model.check_configuration(q1);
    let mut dq = vec![0.0; model.nv];
    for joint in &model.joints {
        joint.kind.difference(
            joint.q_of(q0),
            joint.q_of(q1),
            &mut dq[joint.idx_v..joint.idx_v + joint.nv()],
        );
    }
    dq
}

/// Re-normalizes the quaternions of all free-flyers in `q`.
pub fn normalize(model: &Model, q: &mut [f64]) {
    model.check_configuration(q);
    for joint in &model.joints {
        joint.kind.normalize(&mut q[joint.idx_q..joint.idx_q + joint.nq()]);
    }
}
