//! Bridge to an external 3D viewer displaying the robot.
//!
//! The viewer runs in its own process; the [`Viewer`] trait is the narrow command set the
//! bridge needs from it. Display is a convenience rather than part of any computation:
//! a viewer that cannot be reached, or a command that fails, is logged and otherwise
//! ignored.
//!
//! ```rust,no_run
//! use rs_robot_dynamics::visualization::{Viewer, ViewerBridge};
//! # fn connect() -> anyhow::Result<Box<dyn Viewer>> { anyhow::bail!("no viewer here") }
//! # fn robot() -> (rs_robot_dynamics::model_cache::ModelCache, rs_robot_dynamics::collisions::GeometryModel) { unimplemented!() }
//! let (mut cache, visual_model) = robot();
//! let mut bridge = ViewerBridge::connect(connect, visual_model);
//! bridge.load_display_model("robot", "main");
//! let q = cache.neutral_configuration();
//! bridge.display(&mut cache, &q);
//! ```

use std::thread::sleep;
use std::time::{Duration, Instant};

use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::collisions::{update_geometry_placements, GeometryData, GeometryModel};
use crate::kinematic_traits::{Derivatives, Pose};
use crate::model_cache::ModelCache;

/// Name of the scene the robot is shown in.
pub const WORLD_SCENE: &str = "world";

/// Commands of the external viewer.
pub trait Viewer {
    fn window_exists(&self, name: &str) -> anyhow::Result<bool>;
    fn create_window(&mut self, name: &str) -> anyhow::Result<()>;
    fn scene_list(&self) -> anyhow::Result<Vec<String>>;
    /// Creates a scene with a floor.
    fn create_scene(&mut self, name: &str) -> anyhow::Result<()>;
    fn add_scene_to_window(&mut self, scene: &str, window: &str) -> anyhow::Result<()>;
    fn create_group(&mut self, name: &str) -> anyhow::Result<()>;
    fn add_mesh(&mut self, node: &str, mesh_path: &str) -> anyhow::Result<()>;
    /// Places a node in the world.
    fn apply_configuration(&mut self, node: &str, placement: &Pose) -> anyhow::Result<()>;
    fn refresh(&mut self) -> anyhow::Result<()>;
}

/// Displays a [`ModelCache`] configuration in a [`Viewer`], or does nothing if the
/// viewer is not available.
pub struct ViewerBridge {
    viewer: Option<Box<dyn Viewer>>,
    visual_model: GeometryModel,
    visual_data: GeometryData,
    node_name: String,
}

impl ViewerBridge {
    /// Connects to the viewer. A failing connection leaves the bridge headless.
    pub fn connect<F>(connector: F, visual_model: GeometryModel) -> Self
    where
        F: FnOnce() -> anyhow::Result<Box<dyn Viewer>>,
    {
        let viewer = match connector() {
            Ok(viewer) => Some(viewer),
            Err(e) => {
                warn!("Viewer not available, running without display: {:#}", e);
                None
            }
        };
        ViewerBridge {
            viewer,
            visual_data: GeometryData::new(&visual_model),
            visual_model,
            node_name: "robot".to_string(),
        }
    }

    pub fn is_headless(&self) -> bool {
        self.viewer.is_none()
    }

    /// Viewer node showing a visual object.
    pub fn node_name(&self, object: usize) -> String {
        format!("{}/{}", self.node_name, self.visual_model.objects[object].name)
    }

    fn call<F>(&mut self, what: &str, command: F)
    where
        F: FnOnce(&mut dyn Viewer) -> anyhow::Result<()>,
    {
        if let Some(viewer) = self.viewer.as_deref_mut() {
            if let Err(e) = command(viewer) {
                warn!("Viewer command {} failed: {:#}", what, e);
            }
        }
    }

    /// Creates the window (if needed), the world scene, a group `node_name` and one mesh
    /// node per visual object that has a mesh.
    pub fn load_display_model(&mut self, node_name: &str, window_name: &str) {
        self.node_name = node_name.to_string();
        let Some(viewer) = self.viewer.as_deref_mut() else {
            return;
        };

        match viewer.window_exists(window_name) {
            Ok(true) => debug!("Window {} already exists, reusing it", window_name),
            _ => {
                self.call("create_window", |v| v.create_window(window_name));
                self.call("create_scene", |v| {
                    if v.scene_list()?.iter().any(|s| s == WORLD_SCENE) {
                        return Ok(());
                    }
                    v.create_scene(WORLD_SCENE)
                });
                self.call("add_scene_to_window", |v| v.add_scene_to_window(WORLD_SCENE, window_name));
            }
        }
        self.call("create_group", |v| v.create_group(node_name));

        for k in 0..self.visual_model.objects.len() {
            let Some(mesh_path) = self.visual_model.objects[k].mesh_path.clone() else {
                continue;
            };
            let node = self.node_name(k);
            self.call("add_mesh", |v| v.add_mesh(&node, &mesh_path));
        }
        self.call("refresh", |v| v.refresh());
    }

    /// Shows configuration `q`.
    pub fn display(&mut self, cache: &mut ModelCache, q: &[f64]) {
        if self.is_headless() {
            return;
        }
        cache.forward_kinematics(q, Derivatives::Position);
        update_geometry_placements(cache.model(), cache.data(), &self.visual_model, &mut self.visual_data);

        for k in 0..self.visual_model.objects.len() {
            if self.visual_model.objects[k].mesh_path.is_none() {
                continue;
            }
            let node = self.node_name(k);
            let placement = self.visual_data.placements[k];
            self.call("apply_configuration", |v| v.apply_configuration(&node, &placement));
        }
        self.call("refresh", |v| v.refresh());
    }

    /// Shows the columns of `trajectory` (`nq` rows) one after the other, `dt` apart.
    /// Steps slower than `dt` are shown late rather than skipped. Returns at once when
    /// headless.
    pub fn play(&mut self, cache: &mut ModelCache, trajectory: &DMatrix<f64>, dt: Duration) {
        assert_eq!(
            trajectory.nrows(),
            cache.nq(),
            "Trajectory has {} rows but the model expects nq = {}",
            trajectory.nrows(),
            cache.nq()
        );
        if self.is_headless() {
            return;
        }
        for column in trajectory.column_iter() {
            let started = Instant::now();
            let q: Vec<f64> = column.iter().copied().collect();
            self.display(cache, &q);
            if let Some(residual) = dt.checked_sub(started.elapsed()) {
                sleep(residual);
            }
        }
    }
}
