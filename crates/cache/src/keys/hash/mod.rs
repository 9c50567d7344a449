//! Digests used for cache keys

use sha3::{Digest, Sha3_224};

/// Lowercase hex SHA3-224 of `data`
pub fn sha3_224_hex(data: &[u8]) -> String {
    let mut hasher = Sha3_224::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            sha3_224_hex(b""),
            "6b4e03423667dbb73b6e15454f0eb1abd4597f9a1b078e3f5b5a6bc7"
        );
        assert_eq!(
            sha3_224_hex(b"abc"),
            "e642824c3f8cf24ad09234ee7d3c766fc9a3a5168d0c94ad73b46fdf"
        );
    }
}
