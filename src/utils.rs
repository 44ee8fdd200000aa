//! Helper functions

use nalgebra::DMatrix;

/// Checks if all elements of a configuration or velocity vector are finite
pub fn is_valid(values: &[f64]) -> bool {
    values.iter().all(|&v| v.is_finite())
}

/// Print values in one row, converting radians to degrees if asked.
pub fn dump_vector(values: &[f64], degrees: bool) {
    let mut row_str = String::new();
    for &value in values {
        let shown = if degrees { value.to_degrees() } else { value };
        row_str.push_str(&format!("{:8.3} ", shown));
    }
    println!("[{}]", row_str.trim_end());
}

/// Print a matrix row by row.
pub fn dump_matrix(matrix: &DMatrix<f64>) {
    if matrix.is_empty() {
        println!("Empty matrix");
    }
    for row in matrix.row_iter() {
        let values: Vec<f64> = row.iter().copied().collect();
        dump_vector(&values, false);
    }
}

/// Allows to specify joint values in degrees (converts to radians)
pub fn as_radians(degrees: &[f64]) -> Vec<f64> {
    degrees.iter().map(|d| d.to_radians()).collect()
}
