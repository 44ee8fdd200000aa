//! Supports building a [`Model`] and its geometry from URDF (optional)

extern crate sxd_document;

use std::collections::HashSet;
use std::fs::read_to_string;
use std::path::Path;

use nalgebra::{Matrix3, Translation3, UnitQuaternion, Vector3};
use regex::Regex;
use sxd_document::{dom, parser, QName};
use tracing::debug;

use crate::joint::JointType;
use crate::kinematic_traits::{JointIndex, Pose};
use crate::model::{Frame, FrameType, Model};
use crate::model_error::ModelError;
use crate::spatial::{Inertia, SpatialAction};

/// Name given to the joint that connects a floating base to the world.
pub const ROOT_JOINT_NAME: &str = "root_joint";

/// Reads URDF file and builds the model.
///
/// # Parameters
/// - `path`: the location of the URDF file.
/// - `root_joint`: `None` for a robot bolted to the world, `Some(JointType::FreeFlyer)`
///   for a floating base.
///
/// # Example
/// ```no_run
/// use rs_robot_dynamics::joint::JointType;
/// let model = rs_robot_dynamics::urdf::from_urdf_file("robot.urdf", Some(JointType::FreeFlyer))
///     .expect("Failed to load robot");
/// println!("{} has {} degrees of freedom", model.name, model.nv);
/// ```
pub fn from_urdf_file<P: AsRef<Path>>(path: P, root_joint: Option<JointType>) -> Result<Model, ModelError> {
    let xml_content = read_to_string(path)?;
    from_urdf(&xml_content, root_joint)
}

/// Parses URDF XML content into a model.
///
/// Every link becomes a body frame and every movable joint a joint of the model. Fixed
/// joints are merged: the child link is welded to the body of the parent link and the
/// fixed joint is kept as a frame. Joint limits may be given in radians or as
/// `${radians(degrees)}`.
pub fn from_urdf(xml_content: &str, root_joint: Option<JointType>) -> Result<Model, ModelError> {
    let package = parser::parse(xml_content)
        .map_err(|e| ModelError::XmlProcessingError(format!("Failed to parse URDF: {:?}", e)))?;
    let document = package.as_document();
    let robot = root_element(&document)?;

    let links = collect_links(robot)?;
    let joints = collect_joints(robot)?;
    let root_link = find_root_link(&links, &joints)?;

    let name = robot.attribute("name").map_or("robot", |a| a.value());
    let mut model = Model::new(name);

    let root_carrier = match root_joint {
        Some(kind) => Some(model.add_joint(None, kind, Pose::identity(), ROOT_JOINT_NAME)),
        None => None,
    };
    attach_link(&mut model, &links[root_link], root_carrier, Pose::identity());
    add_subtree(&mut model, &links, &joints, &links[root_link].name, root_carrier, Pose::identity())?;
    check_all_links_reached(&model, &links)?;

    debug!("Loaded {}: {} joints, nq = {}, nv = {}, {} frames",
        model.name, model.joints.len(), model.nq, model.nv, model.frames.len());
    Ok(model)
}

/// Adds the joints below `parent_link` depth first, in document order, so that parents
/// always precede their children.
fn add_subtree(
    model: &mut Model, links: &[LinkData], joints: &[JointData],
    parent_link: &str, parent_joint: Option<JointIndex>, parent_placement: Pose,
) -> Result<(), ModelError> {
    for joint in joints.iter().filter(|j| j.parent == parent_link) {
        let placement = parent_placement * joint.origin;
        let child = links.iter().find(|l| l.name == joint.child)
            .ok_or_else(|| ModelError::UnknownName(format!("Joint {} refers to link {}", joint.name, joint.child)))?;

        let (carrier, link_placement) = match joint.kind.as_str() {
            "fixed" => {
                model.add_frame(Frame {
                    name: joint.name.clone(),
                    parent: parent_joint,
                    placement,
                    kind: FrameType::FixedJoint,
                });
                (parent_joint, placement)
            }
            "revolute" | "continuous" | "prismatic" | "floating" => {
                let index = model.add_joint(parent_joint, joint_type(joint)?, placement, &joint.name);
                if let Some((lower, upper)) = joint.limits {
                    // Continuous joints stay unbounded even if a limit element carries effort
                    if matches!(joint.kind.as_str(), "revolute" | "prismatic") {
                        model.set_joint_limits(index, &[lower], &[upper]);
                    }
                }
                (Some(index), Pose::identity())
            }
            other => return Err(ModelError::UnsupportedJoint(format!("{} ({})", other, joint.name))),
        };
        attach_link(model, child, carrier, link_placement);
        add_subtree(model, links, joints, &child.name, carrier, link_placement)?;
    }
    Ok(())
}

/// Links on a cycle of joints are not children of the root and never get added.
fn check_all_links_reached(model: &Model, links: &[LinkData]) -> Result<(), ModelError> {
    let reached: HashSet<&str> = model.frames.iter()
        .filter(|f| f.kind == FrameType::Body)
        .map(|f| f.name.as_str())
        .collect();
    let missing: Vec<&str> = links.iter()
        .map(|l| l.name.as_str())
        .filter(|name| !reached.contains(name))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ModelError::ModelStructureError(format!(
            "Links not connected to the root: {}", missing.join(", "))))
    }
}

fn attach_link(model: &mut Model, link: &LinkData, carrier: Option<JointIndex>, placement: Pose) {
    model.add_frame(Frame {
        name: link.name.clone(),
        parent: carrier,
        placement,
        kind: FrameType::Body,
    });
    match (carrier, &link.inertia) {
        (Some(j), Some(inertia)) => model.append_body_to_joint(j, inertia, &placement),
        (None, Some(inertia)) if inertia.mass > 0.0 => {
            debug!("Link {} is fixed to the world, its mass of {} kg is ignored", link.name, inertia.mass)
        }
        _ => {}
    }
}

fn joint_type(joint: &JointData) -> Result<JointType, ModelError> {
    if joint.kind == "floating" {
        return Ok(JointType::FreeFlyer);
    }
    if joint.axis.norm() < f64::EPSILON {
        return Err(ModelError::ModelStructureError(format!("Joint {} has a zero axis", joint.name)));
    }
    Ok(match joint.kind.as_str() {
        "prismatic" => JointType::prismatic(joint.axis),
        _ => JointType::revolute(joint.axis),
    })
}

#[derive(Debug)]
struct LinkData {
    name: String,
    /// Inertia in the link frame.
    inertia: Option<Inertia>,
}

#[derive(Debug)]
struct JointData {
    name: String,
    kind: String,
    parent: String,
    child: String,
    origin: Pose,
    axis: Vector3<f64>,
    limits: Option<(f64, f64)>,
}

fn root_element<'d>(document: &dom::Document<'d>) -> Result<dom::Element<'d>, ModelError> {
    let root = document.root().children().into_iter()
        .find_map(|e| e.element())
        .ok_or_else(|| ModelError::XmlProcessingError("No root element found".into()))?;
    if root.name() != QName::new("robot") {
        return Err(ModelError::XmlProcessingError(
            format!("Root element is <{}>, expected <robot>", root.name().local_part())));
    }
    Ok(root)
}

fn children<'d>(element: dom::Element<'d>, tag: &str) -> Vec<dom::Element<'d>> {
    let tag = QName::new(tag);
    element.children().into_iter()
        .filter_map(|e| e.element())
        .filter(|e| e.name() == tag)
        .collect()
}

fn child<'d>(element: dom::Element<'d>, tag: &str) -> Option<dom::Element<'d>> {
    children(element, tag).into_iter().next()
}

fn attribute<'d>(element: dom::Element<'d>, name: &str) -> Result<&'d str, ModelError> {
    element.attribute(name)
        .map(|a| a.value())
        .ok_or_else(|| ModelError::MissingField(
            format!("{} attribute of <{}>", name, element.name().local_part())))
}

fn parse_number(text: &str) -> Result<f64, ModelError> {
    text.trim().parse()
        .map_err(|_| ModelError::ParseError(format!("Not a number: '{}'", text)))
}

fn parse_vector3(text: &str) -> Result<Vector3<f64>, ModelError> {
    let values: Vec<f64> = text.split_whitespace()
        .map(parse_number)
        .collect::<Result<_, _>>()?;
    if values.len() != 3 {
        return Err(ModelError::InvalidLength { expected: 3, found: values.len() });
    }
    Ok(Vector3::new(values[0], values[1], values[2]))
}

/// Reads `<origin xyz=".." rpy=".."/>`, both attributes being optional.
fn parse_origin(element: Option<dom::Element>) -> Result<Pose, ModelError> {
    let Some(element) = element else {
        return Ok(Pose::identity());
    };
    let xyz = element.attribute("xyz").map(|a| parse_vector3(a.value())).transpose()?
        .unwrap_or_else(Vector3::zeros);
    let rpy = element.attribute("rpy").map(|a| parse_vector3(a.value())).transpose()?
        .unwrap_or_else(Vector3::zeros);
    Ok(Pose::from_parts(
        Translation3::from(xyz),
        UnitQuaternion::from_euler_angles(rpy.x, rpy.y, rpy.z),
    ))
}

fn parse_angle(attr_value: &str) -> Result<f64, ModelError> {
    // Regular expression to match the ${radians(<number>)} format that is common in xacro
    let re = Regex::new(r"^\$\{radians\((-?\d+(\.\d+)?)\)\}$")
        .map_err(|_| ModelError::ParseError("Invalid regex pattern".to_string()))?;

    if let Some(caps) = re.captures(attr_value.trim()) {
        let degrees_str = caps.get(1)
            .ok_or_else(|| ModelError::WrongAngle(format!("Bad representation: {}", attr_value)))?
            .as_str();
        let degrees: f64 = degrees_str.parse()
            .map_err(|_| ModelError::WrongAngle(attr_value.to_string()))?;
        Ok(degrees.to_radians())
    } else {
        // Plain number, radians (or meters for prismatic joints)
        attr_value.trim().parse()
            .map_err(|_| ModelError::WrongAngle(attr_value.to_string()))
    }
}

fn get_limits(element: dom::Element) -> Result<(f64, f64), ModelError> {
    let lower_limit = parse_angle(attribute(element, "lower")?)?;
    let upper_limit = parse_angle(attribute(element, "upper")?)?;
    Ok((lower_limit, upper_limit))
}

fn parse_inertial(element: dom::Element) -> Result<Inertia, ModelError> {
    let origin = parse_origin(child(element, "origin"))?;
    let mass_element = child(element, "mass")
        .ok_or_else(|| ModelError::MissingField("<mass> of <inertial>".into()))?;
    let mass = parse_number(attribute(mass_element, "value")?)?;
    if !mass.is_finite() || mass < 0.0 {
        return Err(ModelError::ParseError(format!("Invalid mass {}", mass)));
    }

    let rotational = match child(element, "inertia") {
        Some(i) => {
            let get = |name: &str| attribute(i, name).and_then(parse_number);
            let (ixx, ixy, ixz) = (get("ixx")?, get("ixy")?, get("ixz")?);
            let (iyy, iyz, izz) = (get("iyy")?, get("iyz")?, get("izz")?);
            Matrix3::new(ixx, ixy, ixz, ixy, iyy, iyz, ixz, iyz, izz)
        }
        None => Matrix3::zeros(),
    };
    check_rotational_inertia(&rotational)?;
    Ok(origin.act(&Inertia::new(mass, Vector3::zeros(), rotational)))
}

/// Rotational inertia must be finite and positive semidefinite.
fn check_rotational_inertia(rotational: &Matrix3<f64>) -> Result<(), ModelError> {
    if rotational.iter().any(|x| !x.is_finite()) {
        return Err(ModelError::ParseError(format!("Non-finite inertia {:?}", rotational.as_slice())));
    }
    let tolerance = 1e-12 * rotational.norm().max(1.0);
    let eigenvalues = rotational.symmetric_eigenvalues();
    if eigenvalues.iter().any(|&e| e < -tolerance) {
        return Err(ModelError::ParseError(format!(
            "Inertia is not positive semidefinite, principal moments {:?}", eigenvalues.as_slice())));
    }
    Ok(())
}

fn collect_links(robot: dom::Element) -> Result<Vec<LinkData>, ModelError> {
    let mut links = Vec::new();
    let mut names = HashSet::new();
    for element in children(robot, "link") {
        let name = attribute(element, "name")?.to_string();
        if !names.insert(name.clone()) {
            return Err(ModelError::ModelStructureError(format!("Duplicate link name {}", name)));
        }
        let inertia = child(element, "inertial").map(parse_inertial).transpose()?;
        links.push(LinkData { name, inertia });
    }
    Ok(links)
}

fn collect_joints(robot: dom::Element) -> Result<Vec<JointData>, ModelError> {
    let mut joints = Vec::new();
    let mut names = HashSet::new();
    let mut children_seen = HashSet::new();
    for element in children(robot, "joint") {
        let name = attribute(element, "name")?.to_string();
        if !names.insert(name.clone()) {
            return Err(ModelError::ModelStructureError(format!("Duplicate joint name {}", name)));
        }
        let link_of = |tag: &str| -> Result<String, ModelError> {
            let e = child(element, tag)
                .ok_or_else(|| ModelError::MissingField(format!("<{}> of joint {}", tag, name)))?;
            Ok(attribute(e, "link")?.to_string())
        };
        let parent = link_of("parent")?;
        let child_link = link_of("child")?;
        if !children_seen.insert(child_link.clone()) {
            return Err(ModelError::ModelStructureError(format!("Link {} has more than one parent joint", child_link)));
        }
        let axis = match child(element, "axis") {
            Some(a) => parse_vector3(attribute(a, "xyz")?)?,
            None => Vector3::x(), // URDF default
        };
        // Limits without bounds (effort and velocity only) leave the joint unbounded
        let limits = match child(element, "limit") {
            Some(l) if l.attribute("lower").is_some() || l.attribute("upper").is_some() => Some(get_limits(l)?),
            _ => None,
        };

        joints.push(JointData {
            kind: attribute(element, "type")?.to_string(),
            origin: parse_origin(child(element, "origin"))?,
            name,
            parent,
            child: child_link,
            axis,
            limits,
        });
    }
    Ok(joints)
}

fn find_root_link(links: &[LinkData], joints: &[JointData]) -> Result<usize, ModelError> {
    let known: HashSet<&str> = links.iter().map(|l| l.name.as_str()).collect();
    for joint in joints {
        for link in [&joint.parent, &joint.child] {
            if !known.contains(link.as_str()) {
                return Err(ModelError::UnknownName(format!("Joint {} refers to link {}", joint.name, link)));
            }
        }
    }
    let children: HashSet<&str> = joints.iter().map(|j| j.child.as_str()).collect();
    let roots: Vec<usize> = (0..links.len()).filter(|&i| !children.contains(links[i].name.as_str())).collect();
    match roots.as_slice() {
        [root] => Ok(*root),
        [] => Err(ModelError::ModelStructureError("No root link found".into())),
        _ => Err(ModelError::ModelStructureError(format!(
            "Several root links: {}",
            roots.iter().map(|&i| links[i].name.as_str()).collect::<Vec<_>>().join(", ")
        ))),
    }
}

#[cfg(feature = "collisions")]
pub use geometry::{build_geometry, build_geometry_from_file, GeometryType};

#[cfg(feature = "collisions")]
mod geometry {
    use std::path::{Path, PathBuf};

    use nalgebra::Vector3;
    use parry3d::shape::SharedShape;
    use sxd_document::{dom, parser};
    use tracing::warn;

    use super::{attribute, child, children, parse_number, parse_origin, parse_vector3, root_element};
    use crate::collisions::{GeometryModel, GeometryObject};
    use crate::model::{FrameType, Model};
    use crate::model_error::ModelError;

    /// Which URDF elements to read the geometry from.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum GeometryType {
        Collision,
        Visual,
    }

    impl GeometryType {
        fn tag(&self) -> &'static str {
            match self {
                GeometryType::Collision => "collision",
                GeometryType::Visual => "visual",
            }
        }
    }

    pub fn build_geometry_from_file<P: AsRef<Path>>(
        model: &Model, path: P, kind: GeometryType, mesh_dirs: &[PathBuf],
    ) -> Result<GeometryModel, ModelError> {
        let xml_content = std::fs::read_to_string(path)?;
        build_geometry(model, &xml_content, kind, mesh_dirs)
    }

    /// Builds the collision or visual geometry of a model loaded from the same URDF.
    ///
    /// Objects are named `{link}_{k}`, `k` counting the elements of that link. Boxes,
    /// spheres, cylinders (along Z) and meshes are supported. Mesh file names may use
    /// `package://` (searched in `mesh_dirs`) or `file://` URIs, or plain paths.
    pub fn build_geometry(
        model: &Model, xml_content: &str, kind: GeometryType, mesh_dirs: &[PathBuf],
    ) -> Result<GeometryModel, ModelError> {
        let package = parser::parse(xml_content)
            .map_err(|e| ModelError::XmlProcessingError(format!("Failed to parse URDF: {:?}", e)))?;
        let document = package.as_document();
        let robot = root_element(&document)?;

        let mut geometry = GeometryModel::new();
        for link in children(robot, "link") {
            let link_name = attribute(link, "name")?;
            let frame_index = model.frames.iter()
                .position(|f| f.kind == FrameType::Body && f.name == link_name)
                .ok_or_else(|| ModelError::UnknownName(format!("Link {} is not in model {}", link_name, model.name)))?;
            let frame = &model.frames[frame_index];

            for (k, element) in children(link, kind.tag()).into_iter().enumerate() {
                let name = format!("{}_{}", link_name, k);
                let placement = frame.placement * parse_origin(child(element, "origin"))?;
                let shape_element = child(element, "geometry")
                    .and_then(|g| g.children().into_iter().find_map(|c| c.element()))
                    .ok_or_else(|| ModelError::MissingField(format!("<geometry> of {}", name)))?;

                let mut object = match shape_element.name().local_part() {
                    "box" => GeometryObject::cuboid(
                        &name, frame.parent, placement, parse_vector3(attribute(shape_element, "size")?)?),
                    "sphere" => GeometryObject::ball(
                        &name, frame.parent, placement, parse_number(attribute(shape_element, "radius")?)?),
                    "cylinder" => GeometryObject::cylinder(
                        &name, frame.parent, placement,
                        parse_number(attribute(shape_element, "radius")?)?,
                        parse_number(attribute(shape_element, "length")?)?),
                    "mesh" => load_mesh(&name, shape_element, frame.parent, placement, mesh_dirs)?,
                    other => {
                        warn!("Geometry <{}> of {} is not supported, skipped", other, name);
                        continue;
                    }
                };
                object.parent_frame = Some(frame_index);
                geometry.add_object(object);
            }
        }
        Ok(geometry)
    }

    fn load_mesh(
        name: &str, element: dom::Element, parent: Option<usize>, placement: crate::kinematic_traits::Pose,
        mesh_dirs: &[PathBuf],
    ) -> Result<GeometryObject, ModelError> {
        let filename = attribute(element, "filename")?;
        let scale = element.attribute("scale").map(|a| parse_vector3(a.value())).transpose()?
            .unwrap_or_else(|| Vector3::new(1.0, 1.0, 1.0));
        if scale.x != scale.y || scale.x != scale.z {
            warn!("Mesh {} has non-uniform scale {:?}, using {}", filename, scale, scale.x);
        }
        let path = resolve_mesh_path(filename, mesh_dirs)?;
        let path_str = path.to_string_lossy().to_string();
        let mesh = rs_read_trimesh::load_trimesh(&path_str, scale.x as f32)
            .map_err(|e| ModelError::MeshError(format!("{}: {}", path_str, e)))?;
        let mut object = GeometryObject::new(name, parent, placement, SharedShape::new(mesh));
        object.mesh_path = Some(path_str);
        Ok(object)
    }

    /// Finds the mesh file on disk.
    pub(crate) fn resolve_mesh_path(filename: &str, mesh_dirs: &[PathBuf]) -> Result<PathBuf, ModelError> {
        if let Some(path) = filename.strip_prefix("file://") {
            let path = PathBuf::from(path);
            return if path.exists() {
                Ok(path)
            } else {
                Err(ModelError::MeshError(format!("Mesh file {} not found", filename)))
            };
        }
        let relative = filename.strip_prefix("package://").unwrap_or(filename);
        let direct = PathBuf::from(relative);
        if !filename.starts_with("package://") && direct.exists() {
            return Ok(direct);
        }
        mesh_dirs.iter()
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.exists())
            .ok_or_else(|| ModelError::MeshError(format!(
                "Mesh file {} not found in {:?}", filename, mesh_dirs)))
    }
}
