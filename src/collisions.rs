//! Implements collision detection between geometry objects attached to the joints of a model

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use parry3d::shape::SharedShape;
use rayon::prelude::{IntoParallelIterator, ParallelIterator};
use tracing::warn;

use crate::kinematic_traits::{FrameIndex, JointIndex, Pose};
use crate::model::{Data, Model};

/// Shape rigidly attached to a joint of the model (or to the world).
#[derive(Clone)]
pub struct GeometryObject {
    pub name: String,
    /// Joint that carries the object, `None` for objects fixed in the world.
    pub parent_joint: Option<JointIndex>,
    /// Frame the object was declared in (usually the body frame of its link).
    pub parent_frame: Option<FrameIndex>,
    /// Placement of the shape relative to the parent joint frame.
    pub placement: Pose,
    pub shape: SharedShape,
    /// Mesh file the shape was loaded from, if any. Visual objects need it for display.
    pub mesh_path: Option<String>,
}

impl GeometryObject {
    pub fn new(name: &str, parent_joint: Option<JointIndex>, placement: Pose, shape: SharedShape) -> Self {
        GeometryObject {
            name: name.to_string(),
            parent_joint,
            parent_frame: None,
            placement,
            shape,
            mesh_path: None,
        }
    }

    /// Sphere of the given radius.
    pub fn ball(name: &str, parent_joint: Option<JointIndex>, placement: Pose, radius: f64) -> Self {
        Self::new(name, parent_joint, placement, SharedShape::ball(radius as f32))
    }

    /// Box with the given full side lengths.
    pub fn cuboid(name: &str, parent_joint: Option<JointIndex>, placement: Pose, size: Vector3<f64>) -> Self {
        let half = size.cast::<f32>() * 0.5;
        Self::new(name, parent_joint, placement, SharedShape::cuboid(half.x, half.y, half.z))
    }

    /// Cylinder along the Z axis of `placement`.
    pub fn cylinder(name: &str, parent_joint: Option<JointIndex>, placement: Pose, radius: f64, length: f64) -> Self {
        // parry3d cylinders are built along Y
        let y_to_z = Pose::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::FRAC_PI_2),
        );
        Self::new(
            name,
            parent_joint,
            placement * y_to_z,
            SharedShape::cylinder((length / 2.0) as f32, radius as f32),
        )
    }
}

/// Pair of geometry objects to test, `first < second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionPair {
    pub first: usize,
    pub second: usize,
}

impl CollisionPair {
    /// Builds the pair in canonical order.
    pub fn new(a: usize, b: usize) -> Self {
        assert_ne!(a, b, "A geometry object cannot collide with itself");
        CollisionPair { first: a.min(b), second: a.max(b) }
    }
}

/// Set of geometry objects and the pairs among them to check for collision.
#[derive(Clone, Default)]
pub struct GeometryModel {
    pub objects: Vec<GeometryObject>,
    pub collision_pairs: Vec<CollisionPair>,
}

impl GeometryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, object: GeometryObject) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn object_id(&self, name: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.name == name)
    }

    /// Adds a pair unless it is already present. Returns its index.
    pub fn add_collision_pair(&mut self, pair: CollisionPair) -> usize {
        assert!(pair.second < self.objects.len(), "Collision pair {:?} refers to a missing object", pair);
        if let Some(index) = self.find_collision_pair(&pair) {
            return index;
        }
        self.collision_pairs.push(pair);
        self.collision_pairs.len() - 1
    }

    pub fn find_collision_pair(&self, pair: &CollisionPair) -> Option<usize> {
        self.collision_pairs.iter().position(|p| p == pair)
    }

    /// Replaces the pair list with every pair of objects carried by different joints,
    /// in ascending order. Objects on the same joint never move relative to each other.
    pub fn add_all_collision_pairs(&mut self) {
        self.collision_pairs.clear();
        for i in 0..self.objects.len() {
            for j in (i + 1)..self.objects.len() {
                if self.objects[i].parent_joint != self.objects[j].parent_joint {
                    self.collision_pairs.push(CollisionPair::new(i, j));
                }
            }
        }
    }
}

/// Mutable state of collision checking for one [`GeometryModel`].
#[derive(Debug, Clone)]
pub struct GeometryData {
    /// World placements of all objects.
    pub placements: Vec<Pose>,
    /// Whether each collision pair takes part in the checks.
    pub active: Vec<bool>,
    /// Outcome of the last test of each pair, `None` if not tested yet.
    pub results: Vec<Option<bool>>,
}

impl GeometryData {
    /// All pairs active, nothing tested.
    pub fn new(geometry: &GeometryModel) -> Self {
        GeometryData {
            placements: geometry.objects.iter().map(|o| o.placement).collect(),
            active: vec![true; geometry.collision_pairs.len()],
            results: vec![None; geometry.collision_pairs.len()],
        }
    }

    /// Excludes the listed pairs from the checks. Indices outside the pair list are
    /// skipped with a warning.
    pub fn deactivate(&mut self, indices: &[usize]) {
        for &index in indices {
            match self.active.get_mut(index) {
                Some(flag) => *flag = false,
                None => warn!(
                    "Collision pair {} does not exist ({} pairs), cannot deactivate", index, self.active.len()
                ),
            }
        }
    }
}

/// World placements of all geometry objects from the joint placements in `data`.
pub fn update_geometry_placements(model: &Model, data: &Data, geometry: &GeometryModel, geometry_data: &mut GeometryData) {
    assert_eq!(
        geometry_data.placements.len(),
        geometry.objects.len(),
        "Geometry data was created for {} objects, geometry model has {}",
        geometry_data.placements.len(),
        geometry.objects.len()
    );
    for (k, object) in geometry.objects.iter().enumerate() {
        geometry_data.placements[k] = match object.parent_joint {
            Some(j) => {
                debug_assert!(j < model.joints.len());
                data.world_placements[j] * object.placement
            }
            None => object.placement,
        };
    }
}

/// Tests one pair at the current placements. Shape pairs the collision engine cannot
/// test are reported as not colliding.
fn intersects(geometry: &GeometryModel, placements: &[Pose], pair: &CollisionPair) -> bool {
    let a = &geometry.objects[pair.first];
    let b = &geometry.objects[pair.second];
    let pose_a: Isometry3<f32> = placements[pair.first].cast::<f32>();
    let pose_b: Isometry3<f32> = placements[pair.second].cast::<f32>();
    match parry3d::query::intersection_test(&pose_a, &*a.shape, &pose_b, &*b.shape) {
        Ok(collides) => collides,
        Err(_) => {
            warn!("Intersection of {} and {} is not supported, assuming no collision", a.name, b.name);
            false
        }
    }
}

/// Tests the pair at `pair_index` and records the result.
pub fn compute_collision(geometry: &GeometryModel, geometry_data: &mut GeometryData, pair_index: usize) -> bool {
    let pair = geometry.collision_pairs[pair_index];
    let collides = intersects(geometry, &geometry_data.placements, &pair);
    geometry_data.results[pair_index] = Some(collides);
    collides
}

/// Tests all active pairs. With `stop_at_first`, pairs are tested in ascending order
/// until the first hit; otherwise all of them are tested in parallel.
pub fn compute_collisions(geometry: &GeometryModel, geometry_data: &mut GeometryData, stop_at_first: bool) -> bool {
    if stop_at_first {
        for index in 0..geometry.collision_pairs.len() {
            if geometry_data.active[index] && compute_collision(geometry, geometry_data, index) {
                return true;
            }
        }
        return false;
    }

    let placements = &geometry_data.placements;
    let active = &geometry_data.active;
    let outcomes: Vec<Option<bool>> = (0..geometry.collision_pairs.len())
        .into_par_iter()
        .map(|index| {
            if active[index] {
                Some(intersects(geometry, placements, &geometry.collision_pairs[index]))
            } else {
                None
            }
        })
        .collect();

    let mut any = false;
    for (index, outcome) in outcomes.into_iter().enumerate() {
        if let Some(collides) = outcome {
            geometry_data.results[index] = Some(collides);
            any |= collides;
        }
    }
    any
}
