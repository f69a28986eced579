/// Which of the two slots of a [`DoubleBuffered`] is meant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// History from the previous frame (or, during spatial resampling, the
    /// input to gather from).
    Temporal,

    /// Most recent output, i.e. what gets written by the current stage.
    Output,
}

/// Pair of resources whose roles get exchanged instead of their contents
/// being copied.
///
/// Exchanging roles flips an index; the resources themselves never move, so
/// handles to them stay valid across swaps.
#[derive(Debug)]
pub struct DoubleBuffered<T> {
    slots: [T; 2],
    output: usize,
    generation: u64,
}

impl<T> DoubleBuffered<T> {
    pub fn new(a: T, b: T) -> Self {
        Self {
            slots: [a, b],
            output: 0,
            generation: 0,
        }
    }

    pub fn get(&self, role: Role) -> &T {
        &self.slots[self.index_of(role)]
    }

    pub fn get_mut(&mut self, role: Role) -> &mut T {
        &mut self.slots[self.index_of(role)]
    }

    /// Returns both resources, regardless of their roles.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut()
    }

    pub fn swap(&mut self) {
        self.output = 1 - self.output;
        self.generation += 1;
    }

    /// Number of swaps so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn index_of(&self, role: Role) -> usize {
        match role {
            Role::Output => self.output,
            Role::Temporal => 1 - self.output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap() {
        let mut target = DoubleBuffered::new("a", "b");

        assert_eq!("a", *target.get(Role::Output));
        assert_eq!("b", *target.get(Role::Temporal));

        target.swap();

        assert_eq!("b", *target.get(Role::Output));
        assert_eq!("a", *target.get(Role::Temporal));
        assert_eq!(1, target.generation());

        *target.get_mut(Role::Output) = "c";
        target.swap();

        assert_eq!("a", *target.get(Role::Output));
        assert_eq!("c", *target.get(Role::Temporal));
        assert_eq!(2, target.generation());
    }
}
