//! Entity implementation

slotmap::new_key_type! {
    /// Entity identifier
    ///
    /// An index plus a generation. A handle kept after its entity was
    /// despawned never aliases a newer entity that reuses the index.
    pub struct Entity;
}
