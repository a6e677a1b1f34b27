use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type Release = Box<dyn FnOnce() + Send>;

/// Owns the release handles of one activation.
///
/// On [`release`](Self::release) or drop the liveness flag is cleared first, then every handle
/// runs once in reverse acquisition order. Later calls do nothing.
pub struct ReleaseGuard {
	alive: Arc<AtomicBool>,
	releases: Vec<Release>,
}

/// Read side of a guard's liveness flag, held by the activation's task.
#[derive(Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
	pub fn is_alive(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}
}

impl ReleaseGuard {
	pub fn new() -> Self {
		Self {
			alive: Arc::new(AtomicBool::new(true)),
			releases: Vec::new(),
		}
	}

	pub fn liveness(&self) -> Liveness {
		Liveness(self.alive.clone())
	}

	/// Register a release handle.
	pub fn defer(&mut self, release: impl FnOnce() + Send + 'static) {
		self.releases.push(Box::new(release));
	}

	pub fn is_released(&self) -> bool {
		!self.alive.load(Ordering::Acquire)
	}

	pub fn release(&mut self) {
		self.alive.store(false, Ordering::Release);
		while let Some(release) = self.releases.pop() {
			release();
		}
	}
}

impl Default for ReleaseGuard {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for ReleaseGuard {
	fn drop(&mut self) {
		self.release();
	}
}
