//! Registrations that undo themselves
//!
//! Event listeners and observers handed to the host must be removed before
//! their callbacks are freed. Wrapping each one in [`Attached`] ties removal
//! to drop, so an early `?` return cannot leave one behind.

/// Something registered with the host that can be unregistered
pub trait Detach {
    fn detach(&mut self);
}

/// Detaches its registration exactly once, on drop at the latest
pub struct Attached<D: Detach> {
    inner: Option<D>,
}

impl<D: Detach> Attached<D> {
    pub fn new(inner: D) -> Self {
        Self { inner: Some(inner) }
    }

    pub fn get(&self) -> Option<&D> {
        self.inner.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.is_some()
    }

    /// Unregister now; later calls and the drop do nothing
    pub fn detach(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.detach();
        }
    }
}

impl<D: Detach> Drop for Attached<D> {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Attach every item or none
///
/// A failure part-way through detaches the ones already attached before the
/// error is returned.
pub fn attach_all<T, D, E>(
    items: impl IntoIterator<Item = T>,
    mut attach: impl FnMut(T) -> Result<D, E>,
) -> Result<Vec<Attached<D>>, E>
where
    D: Detach,
{
    items
        .into_iter()
        .map(|item| attach(item).map(Attached::new))
        .collect()
}
