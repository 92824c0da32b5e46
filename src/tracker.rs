use crate::{
	binding::BindingId,
	host::{Target, WeakTable},
};
use tracing::trace;

/// Conversion and attachment records, both held weakly.
///
/// A conversion record names the binding that last initialized a target and is never cleared.
/// An attachment record exists iff the target was attached and not detached since.
#[derive(Debug)]
pub struct Tracker<T> {
	conversions: T,
	attachments: T,
}
impl<T> Tracker<T> {
	pub fn new(conversions: T, attachments: T) -> Self {
		Self { conversions, attachments }
	}

	pub fn conversion<N>(&self, target: Target<'_, N>) -> Option<BindingId>
	where
		T: WeakTable<N>,
	{
		self.conversions.get(target)
	}

	/// Returns `false` without changing anything iff `target` is already converted with `binding`.
	pub fn mark_converted<N>(&mut self, target: Target<'_, N>, binding: BindingId) -> bool
	where
		T: WeakTable<N>,
	{
		if self.conversions.get(target) == Some(binding) {
			return false;
		}
		self.conversions.insert(target, binding);
		true
	}

	pub fn attachment<N>(&self, target: Target<'_, N>) -> Option<BindingId>
	where
		T: WeakTable<N>,
	{
		self.attachments.get(target)
	}

	/// Returns `false` without changing anything iff `target` is already attached (under any binding).
	pub fn mark_attached<N>(&mut self, target: Target<'_, N>, binding: BindingId) -> bool
	where
		T: WeakTable<N>,
	{
		if self.attachments.get(target).is_some() {
			return false;
		}
		self.attachments.insert(target, binding);
		true
	}

	pub fn clear_attached<N>(&mut self, target: Target<'_, N>) -> Option<BindingId>
	where
		T: WeakTable<N>,
	{
		self.attachments.remove(target)
	}

	pub fn prune<N>(&mut self)
	where
		T: WeakTable<N>,
	{
		let pruned = self.conversions.prune() + self.attachments.prune();
		if pruned > 0 {
			trace!("Pruned {} expired lifecycle record(s).", pruned);
		}
	}

	/// `(conversions, attachments)`, if the tables can tell.
	pub fn len_hint<N>(&self) -> (Option<usize>, Option<usize>)
	where
		T: WeakTable<N>,
	{
		(self.conversions.len_hint(), self.attachments.len_hint())
	}
}
