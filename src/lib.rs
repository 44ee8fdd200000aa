//! Kinematics and dynamics of articulated rigid body robots, behind a caching façade.
//!
//! A [`model_cache::ModelCache`] owns a shared, immutable [`model::Model`] (joint tree,
//! inertias, frames, limits) and a mutable [`model::Data`] buffer. Each accessor either
//! recomputes a quantity for the given configuration or returns what the last recompute
//! left in the buffer:
//!
//! - joint space inertia matrix, bias forces (Coriolis, centrifugal and gravity), gravity
//!   torques and inverse dynamics;
//! - forward kinematics with velocities and accelerations, frame placements, frame
//!   velocities and accelerations;
//! - joint and frame Jacobians in the local, world or local world-aligned frame;
//! - center of mass with its velocity, acceleration and Jacobian, and the centroidal
//!   momentum matrix;
//! - configuration space operations: increment (free-flyer aware), difference,
//!   normalization, neutral and random configurations;
//! - self-collision queries over geometry attached to the joints (feature `collisions`);
//! - display in an external viewer (feature `visualization`).
//!
//! Models are usually read from URDF (feature `allow_filesystem`), but can also be built
//! in code:
//!
//! ```rust
//! use nalgebra::{Matrix3, Vector3};
//! use rs_robot_dynamics::joint::JointType;
//! use rs_robot_dynamics::kinematic_traits::Pose;
//! use rs_robot_dynamics::model::Model;
//! use rs_robot_dynamics::model_cache::ModelCache;
//! use rs_robot_dynamics::spatial::Inertia;
//!
//! let mut model = Model::new("pendulum");
//! let hinge = model.add_joint(None, JointType::revolute(Vector3::y()), Pose::identity(), "hinge");
//! model.append_body_to_joint(hinge, &Inertia::new(1.0, Vector3::new(0.5, 0.0, 0.0), Matrix3::zeros()),
//!                            &Pose::identity());
//!
//! let mut cache = ModelCache::new(model);
//! let q = cache.neutral_configuration();
//! let torque = cache.gravity(&q)[0];
//! assert!((torque + 9.81 * 0.5).abs() < 1e-9);
//! ```
//!
//! Spatial vectors, and the rows of all 6-row matrices, have the linear part first.

pub mod spatial;
pub mod kinematic_traits;
pub mod joint;
pub mod model;
pub mod dynamics_impl;
pub mod configuration;
pub mod model_cache;
pub mod model_error;
pub mod utils;

#[cfg(feature = "allow_filesystem")]
pub mod urdf;

#[cfg(feature = "allow_filesystem")]
pub mod settings_from_file;

#[cfg(feature = "collisions")]
pub mod collisions;

#[path = "visualize/visualization.rs"]
#[cfg(feature = "visualization")]
pub mod visualization;

#[cfg(test)]
mod tests;
