//! Embedding encoding and cosine distance.
//!
//! Embeddings are stored as packed little-endian `f32` values so a row's
//! dimensionality is simply `len / 4`.

use crate::error::{DatabaseError, Result};

/// Encode an embedding for storage.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a stored embedding. Returns `None` for empty or truncated blobs.
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Reject embeddings whose length differs from the deployment dimensionality
/// or that contain NaN or infinite components.
pub fn check_dimensions(embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.len() != expected {
        return Err(DatabaseError::Validation(format!(
            "embedding has {} dimensions, expected {}",
            embedding.len(),
            expected
        )));
    }
    if let Some(position) = embedding.iter().position(|v| !v.is_finite()) {
        return Err(DatabaseError::Validation(format!(
            "embedding component {position} is not finite"
        )));
    }
    Ok(())
}

/// Cosine distance (`1 - cosine similarity`), in `[0, 2]`.
///
/// Returns `None` when the vectors differ in length, are empty, or produce a
/// non-finite result. A zero-norm vector is treated as orthogonal to
/// everything (distance 1.0).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(1.0);
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !similarity.is_finite() {
        return None;
    }
    Some((1.0 - similarity.clamp(-1.0, 1.0)) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let v = vec![0.25f32, -1.5, 3.0];
        let bytes = encode_embedding(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_embedding(&bytes), Some(v));
    }

    #[test]
    fn test_decode_rejects_truncated() {
        assert_eq!(decode_embedding(&[1, 2, 3]), None);
        assert_eq!(decode_embedding(&[]), None);
    }

    #[test]
    fn test_cosine_distance_bounds() {
        let a = [1.0, 0.0];
        assert!(cosine_distance(&a, &[2.0, 0.0]).unwrap().abs() < 1e-6);
        assert!((cosine_distance(&a, &[0.0, 1.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&a, &[-1.0, 0.0]).unwrap() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_degenerate() {
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_distance(&[], &[]), None);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_distance(&[f32::NAN, 1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_distance(&[f32::INFINITY, 1.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(&[0.0; 4], 4).is_ok());
        assert!(matches!(
            check_dimensions(&[0.0; 3], 4),
            Err(DatabaseError::Validation(_))
        ));
        assert!(matches!(
            check_dimensions(&[0.1, f32::NAN], 2),
            Err(DatabaseError::Validation(_))
        ));
        assert!(matches!(
            check_dimensions(&[f32::NEG_INFINITY, 0.1], 2),
            Err(DatabaseError::Validation(_))
        ));
    }
}
