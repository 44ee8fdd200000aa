//! Supports reading robot settings from YAML file (optional)

use std::path::Path;

use regex::Regex;
use tracing::debug;
use yaml_rust2::{Yaml, YamlLoader};

use crate::model::Model;
use crate::model_error::ModelError;

/// Named reference configurations and collision pairs to leave out of the checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotSettings {
    /// Configurations in file order, such as a "home" pose.
    pub reference_configurations: Vec<(String, Vec<f64>)>,
    /// Pairs of geometry object names that never need to be tested.
    pub disabled_collision_pairs: Vec<(String, String)>,
}

impl RobotSettings {
    /// Read the settings from YAML file. YAML file like this is supported:
    /// ```yaml
    /// reference_configurations:
    ///   home: [0.0, deg(-90), 0.0, 0.0, 0.0, 0.0]
    ///   zero: [0, 0, 0, 0, 0, 0]
    /// disabled_collision_pairs:
    ///   - [base_link_0, link1_0]
    ///   - [link4_0, link6_0]
    /// ```
    /// Both sections are optional. `deg(angle)` is converted to radians.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ModelError> {
        let docs = YamlLoader::load_from_str(contents)
            .map_err(|e| ModelError::ParseError(format!("{}", e)))?;
        let Some(doc) = docs.first() else {
            return Ok(RobotSettings::default());
        };

        let mut settings = RobotSettings::default();
        match &doc["reference_configurations"] {
            Yaml::Hash(map) => {
                for (key, value) in map {
                    let name = key.as_str()
                        .ok_or_else(|| ModelError::ParseError(format!("Configuration name {:?} is not a string", key)))?;
                    let values = value.as_vec()
                        .ok_or_else(|| ModelError::ParseError(format!("Configuration {} is not a list", name)))?
                        .iter()
                        .map(parse_value)
                        .collect::<Result<Vec<f64>, _>>()?;
                    settings.reference_configurations.push((name.to_string(), values));
                }
            }
            Yaml::BadValue | Yaml::Null => {}
            other => return Err(ModelError::ParseError(
                format!("reference_configurations must be a map, found {:?}", other))),
        }

        match &doc["disabled_collision_pairs"] {
            Yaml::Array(pairs) => {
                for pair in pairs {
                    let names: Vec<&str> = pair.as_vec()
                        .map(|p| p.iter().filter_map(|n| n.as_str()).collect())
                        .unwrap_or_default();
                    if names.len() != 2 {
                        return Err(ModelError::ParseError(
                            format!("Disabled collision pair must list two names, found {:?}", pair)));
                    }
                    settings.disabled_collision_pairs.push((names[0].to_string(), names[1].to_string()));
                }
            }
            Yaml::BadValue | Yaml::Null => {}
            other => return Err(ModelError::ParseError(
                format!("disabled_collision_pairs must be a list, found {:?}", other))),
        }
        Ok(settings)
    }

    /// Reference configuration by name, checked against the model size.
    pub fn reference(&self, name: &str, model: &Model) -> Result<Vec<f64>, ModelError> {
        let (_, q) = self.reference_configurations.iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| ModelError::UnknownName(format!("Reference configuration {}", name)))?;
        if q.len() != model.nq {
            return Err(ModelError::InvalidLength { expected: model.nq, found: q.len() });
        }
        Ok(q.clone())
    }

    /// Indices of the disabled pairs in the pair list of `geometry`, ready to be
    /// deactivated. Pairs that are not in the list are already never tested.
    #[cfg(feature = "collisions")]
    pub fn disabled_pair_indices(&self, geometry: &crate::collisions::GeometryModel) -> Result<Vec<usize>, ModelError> {
        use crate::collisions::CollisionPair;

        let mut indices = Vec::with_capacity(self.disabled_collision_pairs.len());
        for (first, second) in &self.disabled_collision_pairs {
            let find = |name: &str| geometry.object_id(name)
                .ok_or_else(|| ModelError::UnknownName(format!("Geometry object {}", name)));
            let (a, b) = (find(first)?, find(second)?);
            if a == b {
                return Err(ModelError::ParseError(format!("Object {} paired with itself", first)));
            }
            match geometry.find_collision_pair(&CollisionPair::new(a, b)) {
                Some(index) => indices.push(index),
                None => debug!("{} and {} are not a collision pair, nothing to disable", first, second),
            }
        }
        Ok(indices)
    }
}

/// Number, or `deg(angle)` with the angle in degrees.
fn parse_value(value: &Yaml) -> Result<f64, ModelError> {
    match value {
        Yaml::Real(text) => text.parse()
            .map_err(|_| ModelError::ParseError(format!("Not a number: {}", text))),
        Yaml::Integer(i) => Ok(*i as f64),
        Yaml::String(text) => parse_degrees(text),
        other => Err(ModelError::ParseError(format!("Not a number: {:?}", other))),
    }
}

fn parse_degrees(text: &str) -> Result<f64, ModelError> {
    let re = Regex::new(r"^deg\(\s*(-?\d+(\.\d+)?)\s*\)$")
        .map_err(|_| ModelError::ParseError("Invalid regex pattern".to_string()))?;
    let caps = re.captures(text.trim())
        .ok_or_else(|| ModelError::WrongAngle(text.to_string()))?;
    let degrees: f64 = caps[1].parse()
        .map_err(|_| ModelError::WrongAngle(text.to_string()))?;
    Ok(degrees.to_radians())
}
