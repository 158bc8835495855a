//! Shared ownership of loaded assets.
//!
//! An [`AssetHandle`] is one reference to an asset. Cloning takes a reference,
//! dropping releases it, and the asset's own `Drop` runs its clean-up when the
//! last reference goes. Counts are atomic, so handles may be taken on the
//! submitting thread and released on the rendering thread.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Something that can sit behind an [`AssetHandle`].
pub trait Asset: Send + Sync + 'static {
    /// Short name used in log lines.
    const KIND: &'static str;
}

pub struct AssetHandle<T: Asset>(Arc<T>);

impl<T: Asset> AssetHandle<T> {
    /// Wrap a freshly created asset. The new handle holds the only reference.
    pub fn new(asset: T) -> Self {
        Self(Arc::new(asset))
    }

    /// Take another reference. Same as `clone`.
    pub fn increment_reference_count(&self) -> Self {
        self.clone()
    }

    /// Give this reference back, cleaning the asset up if it was the last one.
    pub fn decrement_reference_count(self) {
        if Arc::strong_count(&self.0) == 1 {
            log::trace!("Releasing last reference to {}", T::KIND);
        }
        drop(self);
    }

    /// Number of live handles to this asset.
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Whether both handles refer to the same asset instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Asset> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Asset> Deref for AssetHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Asset> fmt::Debug for AssetHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("kind", &T::KIND)
            .field("references", &self.reference_count())
            .finish()
    }
}
