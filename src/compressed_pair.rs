//! Pair storage in which a stateless component costs nothing.
//!
//! Zero-sized types occupy no space inside a struct, so a stateless policy
//! (such as `DefaultDelete`) stored next to a pointer leaves the pair
//! exactly one pointer wide. Stateful components are stored inline as
//! usual. Both slots are reachable by shared and mutable reference whichever
//! layout results.

/// Two independent values stored side by side.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CompressedPair<F, S> {
    first: F,
    second: S,
}

impl<F, S> CompressedPair<F, S> {
    pub const fn new(first: F, second: S) -> Self {
        Self { first, second }
    }

    pub fn first(&self) -> &F {
        &self.first
    }

    pub fn first_mut(&mut self) -> &mut F {
        &mut self.first
    }

    pub fn second(&self) -> &S {
        &self.second
    }

    pub fn second_mut(&mut self) -> &mut S {
        &mut self.second
    }

    /// Mutable access to both slots at once.
    pub fn both_mut(&mut self) -> (&mut F, &mut S) {
        (&mut self.first, &mut self.second)
    }

    pub fn into_parts(self) -> (F, S) {
        (self.first, self.second)
    }

    /// Whether one of the slots takes no storage.
    pub const fn is_compressed() -> bool {
        core::mem::size_of::<F>() == 0 || core::mem::size_of::<S>() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::CompressedPair;
    use core::mem::size_of;

    #[derive(Default)]
    struct Stateless;

    struct Stateful {
        _tag: u64,
    }

    #[test]
    fn stateless_slot_is_free() {
        assert_eq!(size_of::<CompressedPair<*mut u8, Stateless>>(), size_of::<*mut u8>());
        assert_eq!(size_of::<CompressedPair<Stateless, *mut u8>>(), size_of::<*mut u8>());
        assert!(CompressedPair::<*mut u8, Stateless>::is_compressed());
    }

    #[test]
    fn stateful_slot_is_stored() {
        assert!(size_of::<CompressedPair<*mut u8, Stateful>>() >= size_of::<*mut u8>() + size_of::<u64>());
        assert!(!CompressedPair::<*mut u8, Stateful>::is_compressed());
    }

    #[test]
    fn slots_are_independent() {
        let mut pair = CompressedPair::new(1u32, Stateless);
        *pair.first_mut() = 7;
        let _: &mut Stateless = pair.second_mut();
        assert_eq!(*pair.first(), 7);

        let mut pair = CompressedPair::new(1u8, String::from("a"));
        {
            let (a, b) = pair.both_mut();
            *a += 1;
            b.push('b');
        }
        assert_eq!(pair.into_parts(), (2, "ab".to_string()));
    }
}
