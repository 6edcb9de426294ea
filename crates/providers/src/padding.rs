//! Fixed-width embedding vectors.

/// Width every stored and query embedding is brought to.
pub const EMBEDDING_WIDTH: usize = 1536;

/// Zero-pad `vector` to `width`, or cut it down if it is wider.
pub fn pad_to_width(mut vector: Vec<f32>, width: usize) -> Vec<f32> {
    vector.resize(width, 0.0);
    vector
}
