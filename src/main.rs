//! Robot inspector: loads a URDF description and prints its dynamics and collision state
//! at a chosen configuration.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use rs_robot_dynamics::joint::JointType;
use rs_robot_dynamics::kinematic_traits::Derivatives;
use rs_robot_dynamics::model::FrameType;
use rs_robot_dynamics::model_cache::ModelCache;
use rs_robot_dynamics::settings_from_file::RobotSettings;
use rs_robot_dynamics::urdf::{self, GeometryType};
use rs_robot_dynamics::utils::{as_radians, dump_matrix, dump_vector, is_valid};

/// Inspect the kinematics, dynamics and self-collisions of a URDF robot
#[derive(Parser)]
#[command(name = "rs-robot-dynamics")]
#[command(version, about, long_about = None)]
struct Cli {
    /// URDF file of the robot
    urdf: PathBuf,

    /// Attach the root link to the world with a free-flyer joint
    #[arg(long)]
    floating: bool,

    /// Directories searched for package:// meshes
    #[arg(long = "mesh-dir")]
    mesh_dirs: Vec<PathBuf>,

    /// YAML settings with reference configurations and disabled collision pairs
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Name of a reference configuration from the settings file
    #[arg(long, requires = "settings", conflicts_with = "random")]
    reference: Option<String>,

    /// Configuration values (nq of them)
    #[arg(long, num_args = 1.., allow_negative_numbers = true, conflicts_with_all = ["reference", "random"])]
    q: Option<Vec<f64>>,

    /// Values of --q are in degrees
    #[arg(long, requires = "q")]
    degrees: bool,

    /// Use a random configuration within the joint limits
    #[arg(long)]
    random: bool,

    /// Seed for --random
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Also load collision geometry and report colliding pairs
    #[arg(long)]
    collisions: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let root_joint = if cli.floating { Some(JointType::FreeFlyer) } else { None };
    let model = urdf::from_urdf_file(&cli.urdf, root_joint)
        .with_context(|| format!("Failed to load {}", cli.urdf.display()))?;
    println!("Robot {}: {} joints, nq = {}, nv = {}, total mass {:.3} kg",
             model.name, model.joints.len(), model.nq, model.nv, model.total_mass());

    let settings = match &cli.settings {
        Some(path) => Some(RobotSettings::from_yaml_file(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?),
        None => None,
    };

    let mut cache = ModelCache::new(model);
    let q = if let Some(values) = &cli.q {
        if values.len() != cache.nq() {
            bail!("--q has {} values, the robot needs {}", values.len(), cache.nq());
        }
        let mut q = if cli.degrees { as_radians(values) } else { values.clone() };
        cache.normalize(&mut q);
        q
    } else if let (Some(name), Some(settings)) = (&cli.reference, &settings) {
        settings.reference(name, cache.model())?
    } else if cli.random {
        cache.random_configuration(&mut StdRng::seed_from_u64(cli.seed))
    } else {
        cache.neutral_configuration()
    };
    if !is_valid(&q) {
        bail!("Configuration contains non-finite values");
    }
    let v = vec![0.0; cache.nv()];

    println!("Configuration:");
    dump_vector(&q, false);

    println!("Mass matrix:");
    dump_matrix(cache.mass(&q, true));

    println!("Gravity torques:");
    dump_vector(cache.gravity(&q).as_slice(), false);

    let com = cache.center_of_mass(&q, Derivatives::Velocity(&v), true);
    println!("Center of mass: {:?}", com.position().as_slice());

    println!("Link placements:");
    cache.frames_forward_kinematics(&q);
    let frames: Vec<usize> = (0..cache.model().frames.len())
        .filter(|&f| cache.model().frames[f].kind == FrameType::Body)
        .collect();
    for f in frames {
        let placement = cache.frame_placement(&q, f, false);
        let t = placement.translation.vector;
        let (roll, pitch, yaw) = placement.rotation.euler_angles();
        println!("  {:20} xyz [{:8.3} {:8.3} {:8.3}] rpy [{:7.2} {:7.2} {:7.2}]",
                 cache.model().frames[f].name, t.x, t.y, t.z,
                 roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees());
    }

    if cli.collisions {
        let geometry = urdf::build_geometry_from_file(
            cache.model(), &cli.urdf, GeometryType::Collision, &cli.mesh_dirs)
            .with_context(|| "Failed to build collision geometry")?;
        cache.set_collision_model(geometry);
        cache.add_all_collision_pairs();
        if let Some(settings) = &settings {
            let disabled = settings.disabled_pair_indices(cache.collision_model())?;
            cache.deactivate_collision_pairs(&disabled);
        }

        if cache.is_in_collision(&q, false) {
            println!("Colliding pairs:");
            for (index, pair) in cache.find_all_collision_pairs(true) {
                let objects = &cache.collision_model().objects;
                println!("  {:4}: {} - {}", index, objects[pair.first].name, objects[pair.second].name);
            }
        } else {
            println!("No collisions among {} pairs", cache.collision_model().collision_pairs.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_conflicts_with_random() {
        let args = ["rs-robot-dynamics", "robot.urdf", "--settings", "robot.yaml", "--reference", "home", "--random"];
        assert!(Cli::try_parse_from(args).is_err());
        let cli = Cli::try_parse_from(&args[..6]).expect("reference alone");
        assert_eq!(cli.reference.as_deref(), Some("home"));
    }
}
