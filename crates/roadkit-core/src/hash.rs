//! Content hashing of generated buffers
//!
//! Regeneration must be idempotent: running it twice without an edit in
//! between has to reproduce the exact same vertex, UV and triangle buffers
//! and the exact same terrain grid. Fingerprinting the raw bit patterns
//! makes that cheap to check and to report.

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 based content hash for detecting changes.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Start an incremental hash over several buffers
    pub fn builder() -> ContentHasher {
        ContentHasher {
            inner: Sha256::new(),
        }
    }

    /// Get the hash as a hex string
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Get the hash as a prefixed hex string (e.g., "sha256:abcdef...")
    pub fn to_prefixed_hex(&self) -> String {
        format!("sha256:{}", self.to_hex())
    }
}

/// Incremental hasher for mesh and grid buffers
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    pub fn u32s(&mut self, values: &[u32]) -> &mut Self {
        // Length prefix keeps [a][b, c] distinct from [a, b][c]
        self.inner.update((values.len() as u64).to_le_bytes());
        for v in values {
            self.inner.update(v.to_le_bytes());
        }
        self
    }

    pub fn f32s(&mut self, values: &[f32]) -> &mut Self {
        self.inner.update((values.len() as u64).to_le_bytes());
        for v in values {
            self.inner.update(v.to_bits().to_le_bytes());
        }
        self
    }

    pub fn vec2s(&mut self, values: &[Vec2]) -> &mut Self {
        self.inner.update((values.len() as u64).to_le_bytes());
        for v in values {
            for c in v.to_array() {
                self.inner.update(c.to_bits().to_le_bytes());
            }
        }
        self
    }

    pub fn vec3s(&mut self, values: &[Vec3]) -> &mut Self {
        self.inner.update((values.len() as u64).to_le_bytes());
        for v in values {
            for c in v.to_array() {
                self.inner.update(c.to_bits().to_le_bytes());
            }
        }
        self
    }

    pub fn vec4s(&mut self, values: &[Vec4]) -> &mut Self {
        self.inner.update((values.len() as u64).to_le_bytes());
        for v in values {
            for c in v.to_array() {
                self.inner.update(c.to_bits().to_le_bytes());
            }
        }
        self
    }

    pub fn finish(&mut self) -> ContentHash {
        let inner = std::mem::take(&mut self.inner);
        ContentHash(inner.finalize().into())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}
