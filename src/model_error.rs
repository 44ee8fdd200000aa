//! Error handling for model, geometry and settings loaders

use std::io;

/// Unified error to report failures while reading URDF descriptions, meshes and YAML
/// settings.
#[derive(Debug)]
pub enum ModelError {
    IoError(io::Error),
    ParseError(String),
    MissingField(String),
    WrongAngle(String),
    InvalidLength { expected: usize, found: usize },
    XmlProcessingError(String),
    /// The description does not form a valid kinematic tree.
    ModelStructureError(String),
    UnsupportedJoint(String),
    MeshError(String),
    /// A link, joint, frame or geometry object name is not present in the model.
    UnknownName(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            ModelError::IoError(ref err) =>
                write!(f, "IO Error: {}", err),
            ModelError::ParseError(ref msg) =>
                write!(f, "Parse Error: {}", msg),
            ModelError::WrongAngle(ref msg) =>
                write!(f, "Wrong angle representation: {}", msg),
            ModelError::MissingField(ref field) =>
                write!(f, "Missing Field: {}", field),
            ModelError::InvalidLength { expected, found } =>
                write!(f, "Invalid Length: expected {}, found {}", expected, found),
            ModelError::XmlProcessingError(ref err) =>
                write!(f, "XML Processing Error: {}", err),
            ModelError::ModelStructureError(ref err) =>
                write!(f, "Model Structure Error: {}", err),
            ModelError::UnsupportedJoint(ref kind) =>
                write!(f, "Unsupported joint type: {}", kind),
            ModelError::MeshError(ref err) =>
                write!(f, "Mesh Error: {}", err),
            ModelError::UnknownName(ref name) =>
                write!(f, "Unknown name: {}", name),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ModelError {
    fn from(err: io::Error) -> Self {
        ModelError::IoError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ModelError::InvalidLength { expected: 6, found: 5 };
        assert_eq!(err.to_string(), "Invalid Length: expected 6, found 5");
        let err: ModelError = io::Error::new(io::ErrorKind::NotFound, "robot.urdf").into();
        assert!(err.to_string().starts_with("IO Error"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
