use std::collections::VecDeque;

/// Fixed-capacity FIFO that evicts its oldest element when full.
///
/// A capacity of `0` turns the buffer into a sink that never stores anything.
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
	inner: VecDeque<T>,
	capacity: usize,
}

impl<T> RingBuffer<T> {
	pub fn new(capacity: usize) -> Self {
		Self {
			inner: VecDeque::with_capacity(capacity),
			capacity,
		}
	}

	pub fn push(&mut self, item: T) {
		if self.capacity == 0 {
			return;
		}
		if self.inner.len() == self.capacity {
			self.inner.pop_front();
		}
		self.inner.push_back(item);
	}

	/// Oldest to newest
	pub fn iter(&self) -> impl Iterator<Item = &T> {
		self.inner.iter()
	}

	pub fn back(&self) -> Option<&T> {
		self.inner.back()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn clear(&mut self) {
		self.inner.clear();
	}
}
