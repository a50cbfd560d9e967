use std::collections::VecDeque;
use std::sync::{Mutex, TryLockError};

use loam_mesh_cpu::MeshPayload;

/// Meshes handed from the worker to the main context.
#[derive(Debug, Default)]
pub struct MeshQueue {
    inner: Mutex<VecDeque<MeshPayload>>,
}

impl MeshQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a mesh. A mesh still waiting for the same chunk is replaced
    /// in place, keeping its position in line.
    pub fn push(&self, mesh: MeshPayload) {
        let mut q = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match q.iter_mut().find(|m| m.coord == mesh.coord) {
            Some(stale) => *stale = mesh,
            None => q.push_back(mesh),
        }
    }

    /// Pops the oldest mesh without blocking. Returns `None` when the queue
    /// is empty or the worker holds the lock right now.
    pub fn try_pop(&self) -> Option<MeshPayload> {
        match self.inner.try_lock() {
            Ok(mut q) => q.pop_front(),
            Err(TryLockError::Poisoned(e)) => e.into_inner().pop_front(),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
