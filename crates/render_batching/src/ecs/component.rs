//! Component trait and change markers

use std::marker::PhantomData;

/// Marker trait for components
pub trait Component: 'static + Send + Sync {
    /// Whether the world attaches [`Dirty<Self>`] when this component is
    /// inserted, mutably borrowed or removed
    const TRACK_CHANGES: bool = false;
}

/// Zero-size marker meaning "`T` changed since the last clear"
pub struct Dirty<T>(PhantomData<fn() -> T>);

impl<T> Dirty<T> {
    /// Create a marker
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Dirty<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Dirty<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Dirty<T> {}

impl<T> std::fmt::Debug for Dirty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dirty<{}>", std::any::type_name::<T>())
    }
}

impl<T: Component> Component for Dirty<T> {}
