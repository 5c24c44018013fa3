use std::sync::Mutex;

/// Upper bound on idle buffers kept by a pool.
const MAX_POOLED: usize = 16;

/// Reusable scratch buffer for the bulk-read elevation path.
///
/// Callers that build many heightfields on one worker can keep a
/// `Workspace` and pass it to [`Driver::create_heightfield_with`] so the
/// buffer is allocated once.
///
/// [`Driver::create_heightfield_with`]: crate::Driver::create_heightfield_with
#[derive(Debug, Default)]
pub struct Workspace {
    buffer: Vec<f32>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize to `len` samples, all set to `fill`, and hand out the buffer.
    pub(crate) fn reset(&mut self, len: usize, fill: f32) -> &mut [f32] {
        self.buffer.clear();
        self.buffer.resize(len, fill);
        &mut self.buffer
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

/// Idle workspaces shared by the threads sampling one driver.
#[derive(Debug, Default)]
pub(crate) struct WorkspacePool {
    idle: Mutex<Vec<Workspace>>,
}

impl WorkspacePool {
    pub(crate) fn checkout(&self) -> Workspace {
        self.idle
            .lock()
            .ok()
            .and_then(|mut idle| idle.pop())
            .unwrap_or_default()
    }

    pub(crate) fn checkin(&self, workspace: Workspace) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < MAX_POOLED {
                idle.push(workspace);
            }
        }
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}
