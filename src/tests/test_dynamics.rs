#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::model_cache::ModelCache;
    use crate::tests::test_utils::{assert_close, branching_robot, sample_tangent, TwoLink, G};

    const Q: [f64; 2] = [0.3, -0.7];
    const V: [f64; 2] = [1.1, -0.4];

    #[test]
    fn test_two_link_mass_matrix() {
        let arm = TwoLink::new();
        let mut cache = ModelCache::new(arm.model());
        let expected = arm.mass_matrix(&Q);
        let m = cache.mass(&Q, true);
        for r in 0..2 {
            for c in 0..2 {
                assert_close(m[(r, c)], expected[r][c], 1e-9, &format!("M[{},{}]", r, c));
            }
        }
    }

    #[test]
    fn test_two_link_gravity() {
        let arm = TwoLink::new();
        let mut cache = ModelCache::new(arm.model());

        let at_rest = cache.gravity(&[0.0, 0.0]).clone();
        let held = arm.m1 * arm.l1 / 2.0 + arm.m2 * (arm.l1 + arm.l2 / 2.0);
        assert_close(at_rest[0], -G * held, 1e-9, "g1 at rest");
        assert_close(at_rest[1], -G * arm.m2 * arm.l2 / 2.0, 1e-9, "g2 at rest");

        let expected = arm.gravity(&Q);
        let g = cache.gravity(&Q);
        assert_close(g[0], expected[0], 1e-9, "g1");
        assert_close(g[1], expected[1], 1e-9, "g2");
    }

    #[test]
    fn test_two_link_coriolis() {
        let arm = TwoLink::new();
        let mut cache = ModelCache::new(arm.model());
        let gravity = cache.gravity(&Q).clone();
        let bias = cache.bias(&Q, &V, true).clone();
        let expected = arm.coriolis(&Q, &V);
        assert_close(bias[0] - gravity[0], expected[0], 1e-9, "c1");
        assert_close(bias[1] - gravity[1], expected[1], 1e-9, "c2");
    }

    #[test]
    fn test_bias_at_rest_is_gravity() {
        let mut cache = ModelCache::new(branching_robot());
        let q = cache.random_configuration(&mut StdRng::seed_from_u64(7));
        let rest = vec![0.0; cache.nv()];
        let gravity = cache.gravity(&q).clone();
        let bias = cache.bias(&q, &rest, true);
        assert_relative_eq!(*bias, gravity, epsilon = 1e-10);
    }

    #[test]
    fn test_mass_columns_from_inverse_dynamics() {
        let mut cache = ModelCache::new(branching_robot());
        let q = cache.random_configuration(&mut StdRng::seed_from_u64(11));
        let nv = cache.nv();
        let rest = vec![0.0; nv];
        let gravity = cache.gravity(&q).clone();
        let mass = cache.mass(&q, true).clone();

        for k in 0..nv {
            let mut unit = vec![0.0; nv];
            unit[k] = 1.0;
            let column = cache.inverse_dynamics(&q, &rest, &unit) - &gravity;
            assert_relative_eq!(column, mass.column(k).into_owned(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_mass_matrix_symmetric_positive_definite() {
        let mut cache = ModelCache::new(branching_robot());
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let q = cache.random_configuration(&mut rng);
            let mass = cache.mass(&q, true);
            assert_relative_eq!(*mass, mass.transpose(), epsilon = 1e-12);
            assert!(mass.clone().cholesky().is_some(), "Mass matrix not positive definite at {:?}", q);
        }
    }

    #[test]
    fn test_inverse_dynamics_splits_into_mass_and_bias() {
        let mut cache = ModelCache::new(branching_robot());
        let q = cache.random_configuration(&mut StdRng::seed_from_u64(5));
        let v = sample_tangent(cache.nv(), 0.8);
        let a = sample_tangent(cache.nv(), -1.3);

        let mass = cache.mass(&q, true).clone();
        let bias = cache.bias(&q, &v, true).clone();
        let tau = cache.inverse_dynamics(&q, &v, &a).clone();
        assert_relative_eq!(tau, mass * DVector::from_column_slice(&a) + bias, epsilon = 1e-9);
    }

    #[test]
    fn test_cached_values_are_not_recomputed() {
        let arm = TwoLink::new();
        let mut cache = ModelCache::new(arm.model());
        let first: DMatrix<f64> = cache.mass(&[0.0, 0.0], true).clone();
        let cached = cache.mass(&[0.0, 1.2], false).clone();
        assert_eq!(first, cached);
        let fresh = cache.mass(&[0.0, 1.2], true).clone();
        assert_ne!(first, fresh);

        let bias = cache.bias(&Q, &V, true).clone();
        assert_eq!(*cache.bias(&[0.0, 0.0], &[0.0, 0.0], false), bias);
    }

    #[test]
    fn test_forks_compute_independently() {
        let arm = TwoLink::new();
        let mut cache = ModelCache::new(arm.model());
        let mut forked = cache.fork();
        assert!(std::sync::Arc::ptr_eq(cache.model(), forked.model()));

        let here = cache.mass(&[0.0, 0.0], true).clone();
        let there = forked.mass(&[0.0, 1.5], true).clone();
        assert_ne!(here, there);
        assert_eq!(*cache.mass(&[0.0, 1.5], false), here);
    }

    #[test]
    #[should_panic(expected = "nq = 2")]
    fn test_wrong_configuration_size() {
        let mut cache = ModelCache::new(TwoLink::new().model());
        cache.gravity(&[0.0]);
    }
}
