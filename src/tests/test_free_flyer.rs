#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use approx::assert_relative_eq;
    use nalgebra::{DVector, Quaternion, UnitQuaternion, Vector3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::model_cache::ModelCache;
    use crate::tests::test_utils::{branching_robot, sample_tangent};

    fn rotation_of(q: &[f64]) -> UnitQuaternion<f64> {
        UnitQuaternion::from_quaternion(Quaternion::new(q[6], q[3], q[4], q[5]))
    }

    fn assert_same_rotation(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>) {
        assert!(a.angle_to(b) < 1e-9, "Rotations differ by {} rad", a.angle_to(b));
    }

    #[test]
    fn test_increment_moves_in_body_frame() {
        let cache = ModelCache::new(branching_robot());
        let mut q = cache.neutral_configuration();
        let turned = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        q[3..7].copy_from_slice(&[turned.i, turned.j, turned.k, turned.w]);

        let mut dq = vec![0.0; cache.nv()];
        dq[0] = 1.0;
        cache.increment(&mut q, &dq);
        assert_relative_eq!(Vector3::new(q[0], q[1], q[2]), Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_same_rotation(&rotation_of(&q), &turned);
    }

    #[test]
    fn test_increment_rotates_about_body_axis() {
        let cache = ModelCache::new(branching_robot());
        let mut q = cache.neutral_configuration();
        let mut dq = vec![0.0; cache.nv()];
        dq[5] = FRAC_PI_2;
        dq[6] = 0.25;
        cache.increment(&mut q, &dq);

        let expected = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        assert_same_rotation(&rotation_of(&q), &expected);
        assert_relative_eq!(q[7], 0.25, epsilon = 1e-15);
        let norm = (q[3] * q[3] + q[4] * q[4] + q[5] * q[5] + q[6] * q[6]).sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_half_steps_compose() {
        let cache = ModelCache::new(branching_robot());
        let start = cache.random_configuration(&mut StdRng::seed_from_u64(21));
        let dq = sample_tangent(cache.nv(), 0.6);
        let half: Vec<f64> = dq.iter().map(|x| x / 2.0).collect();

        let mut once = start.clone();
        cache.increment(&mut once, &dq);
        let mut twice = start.clone();
        cache.increment(&mut twice, &half);
        cache.increment(&mut twice, &half);

        assert_relative_eq!(DVector::from_column_slice(&once[0..3]), DVector::from_column_slice(&twice[0..3]), epsilon = 1e-12);
        assert_same_rotation(&rotation_of(&once), &rotation_of(&twice));
        assert_relative_eq!(DVector::from_column_slice(&once[7..]), DVector::from_column_slice(&twice[7..]), epsilon = 1e-12);
    }

    #[test]
    fn test_difference_inverts_increment() {
        let cache = ModelCache::new(branching_robot());
        let mut rng = StdRng::seed_from_u64(22);
        for _ in 0..10 {
            let start = cache.random_configuration(&mut rng);
            let dq = sample_tangent(cache.nv(), 0.8);
            let mut end = start.clone();
            cache.increment(&mut end, &dq);
            let recovered = cache.difference(&start, &end);
            assert_relative_eq!(DVector::from_vec(recovered), DVector::from_vec(dq), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_normalize_restores_unit_quaternion() {
        let cache = ModelCache::new(branching_robot());
        let mut q = cache.random_configuration(&mut StdRng::seed_from_u64(23));
        let expected = rotation_of(&q);
        for k in 3..7 {
            q[k] *= 3.0;
        }
        let tail = q[7..].to_vec();
        cache.normalize(&mut q);
        assert_same_rotation(&rotation_of(&q), &expected);
        assert_eq!(&q[7..], tail.as_slice());
    }

    #[test]
    fn test_random_configuration_within_limits() {
        let mut model = branching_robot();
        let knee = model.joint_id("left_knee").expect("knee");
        model.set_joint_limits(knee, &[-0.1], &[0.2]);
        let cache = ModelCache::new(model);
        let index = cache.model().joints[knee].idx_q;
        let mut rng = StdRng::seed_from_u64(24);
        for _ in 0..50 {
            let q = cache.random_configuration(&mut rng);
            assert!((-0.1..=0.2).contains(&q[index]), "Knee at {}", q[index]);
            assert_relative_eq!(DVector::from_column_slice(&q[3..7]).norm(), 1.0, epsilon = 1e-12);
        }
    }
}
