//! 128-bit opaque identifier allocation (§9 design note): strong RNG, no
//! ambient global counter.

/// Generate a new collision-resistant opaque identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_non_empty() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }
}
