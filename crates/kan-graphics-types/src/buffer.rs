//! Buffer description (spec.md §3.2).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferKind {
    Vertex,
    Index16,
    Index32,
    Uniform,
    Storage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferDesc {
    pub kind: BufferKind,
    pub byte_size: u64,
    /// Initial contents, if the buffer is seeded at creation time
    /// (material-instance static buffers, spec.md §4.6.6).
    pub initial_bytes: Option<Vec<u8>>,
    pub tracking_name: String,
}

impl BufferDesc {
    pub fn new(kind: BufferKind, byte_size: u64, tracking_name: impl Into<String>) -> Self {
        Self {
            kind,
            byte_size,
            initial_bytes: None,
            tracking_name: tracking_name.into(),
        }
    }

    pub fn with_initial_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.initial_bytes = Some(bytes);
        self
    }
}
