use sha2::{Digest, Sha256};

/// Offline stand-in for a hosted embedding model. The same (text, model) pair
/// always yields the same vector; components lie in `[-1, 1]`.
///
/// Each 32-byte SHA-256 block is keyed by its block index, so vectors longer
/// than one digest do not repeat.
pub fn deterministic_embedding(text: &str, model_id: &str, dims: usize) -> Vec<f32> {
    let dims = dims.max(1);
    let mut out = Vec::with_capacity(dims);

    let mut block: u32 = 0;
    while out.len() < dims {
        let mut hasher = Sha256::new();
        hasher.update(model_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hasher.update(block.to_le_bytes());
        let digest = hasher.finalize();

        for byte in digest.iter().take(dims - out.len()) {
            out.push((*byte as f32 / 127.5) - 1.0);
        }
        block += 1;
    }

    out
}
