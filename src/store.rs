//! Double-buffered particle state
//!
//! A [`BankSet`] owns two banks and a single role index. Swapping roles
//! flips the index; particle data is never copied. The split borrow
//! returned by [`BankSet::roles_mut`] makes it impossible to write the
//! bank that is being read in the same step.

use rand::Rng;

use crate::error::{PipelineError, PipelineResult};
use crate::params::Viewport;
use crate::particle::Particle;

/// Two interchangeable banks labelled `current` and `alternate`.
///
/// `B` is the storage of one bank: host vectors for the CPU backend,
/// device buffers for the GPU backend.
#[derive(Debug)]
pub struct BankSet<B> {
    banks: [B; 2],
    current: usize,
}

impl<B> BankSet<B> {
    /// Create a bank set with `first` as the current bank
    pub fn new(first: B, second: B) -> Self {
        Self {
            banks: [first, second],
            current: 0,
        }
    }

    /// Bank the next physics step reads (and the last render read)
    pub fn current(&self) -> &B {
        &self.banks[self.current]
    }

    /// Bank the next physics step writes
    pub fn alternate(&self) -> &B {
        &self.banks[1 - self.current]
    }

    /// Split into `(source, destination)` for one physics step
    pub fn roles_mut(&mut self) -> (&B, &mut B) {
        let [first, second] = &mut self.banks;
        if self.current == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        }
    }

    /// Exchange roles. O(1), no data moves.
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// Index (0 or 1) of the bank currently labelled `current`
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Bank by physical index, regardless of role
    pub fn bank(&self, index: usize) -> &B {
        &self.banks[index]
    }
}

/// Host-resident bank: one array of positions and one of velocities
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleBank {
    pub positions: Vec<[f32; 2]>,
    pub velocities: Vec<[f32; 2]>,
}

impl ParticleBank {
    /// Allocate a bank from initial positions with every velocity at zero
    pub fn at_rest(positions: Vec<[f32; 2]>) -> PipelineResult<Self> {
        let count = positions.len();
        let mut velocities = Vec::new();
        velocities
            .try_reserve_exact(count)
            .map_err(|e| allocation_error(count, e))?;
        velocities.resize(count, [0.0, 0.0]);
        Ok(Self {
            positions,
            velocities,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Particle at slot `index`
    pub fn particle(&self, index: usize) -> Particle {
        Particle {
            position: self.positions[index],
            velocity: self.velocities[index],
        }
    }

    /// Overwrite slot `index`
    pub fn set_particle(&mut self, index: usize, particle: Particle) {
        self.positions[index] = particle.position;
        self.velocities[index] = particle.velocity;
    }
}

impl BankSet<ParticleBank> {
    /// Allocate both host banks with identical random positions and zero
    /// velocity.
    pub fn initialize<R: Rng>(
        count: u32,
        viewport: Viewport,
        rng: &mut R,
    ) -> PipelineResult<Self> {
        let positions = seed_positions(count, viewport, rng)?;
        let mut copy = Vec::new();
        copy.try_reserve_exact(positions.len())
            .map_err(|e| allocation_error(positions.len(), e))?;
        copy.extend_from_slice(&positions);

        let first = ParticleBank::at_rest(positions)?;
        let second = ParticleBank::at_rest(copy)?;
        Ok(Self::new(first, second))
    }
}

/// Draw `count` positions uniformly over `[0, width) × [0, height)`
pub fn seed_positions<R: Rng>(
    count: u32,
    viewport: Viewport,
    rng: &mut R,
) -> PipelineResult<Vec<[f32; 2]>> {
    let count = count as usize;
    let mut positions = Vec::new();
    positions
        .try_reserve_exact(count)
        .map_err(|e| allocation_error(count, e))?;
    positions.extend(
        (0..count).map(|_| [below(rng, viewport.width), below(rng, viewport.height)]),
    );
    Ok(positions)
}

fn below<R: Rng>(rng: &mut R, extent: f32) -> f32 {
    if extent > 0.0 {
        rng.gen_range(0.0..extent)
    } else {
        0.0
    }
}

fn allocation_error(count: usize, err: std::collections::TryReserveError) -> PipelineError {
    PipelineError::Allocation {
        count: count.min(u32::MAX as usize) as u32,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn initialize_fills_both_banks_identically() {
        let mut rng = StdRng::seed_from_u64(7);
        let banks = BankSet::initialize(1000, Viewport::new(640.0, 480.0), &mut rng).unwrap();

        assert_eq!(banks.current().len(), 1000);
        assert_eq!(banks.alternate().len(), 1000);
        assert_eq!(banks.current().positions, banks.alternate().positions);
        assert!(banks.current().velocities.iter().all(|v| *v == [0.0, 0.0]));
        assert!(banks.alternate().velocities.iter().all(|v| *v == [0.0, 0.0]));
    }

    #[test]
    fn seeded_positions_lie_inside_viewport() {
        let mut rng = StdRng::seed_from_u64(42);
        let positions = seed_positions(5000, Viewport::new(320.0, 200.0), &mut rng).unwrap();
        assert!(positions.iter().all(|[x, y]| (0.0..320.0).contains(x) && (0.0..200.0).contains(y)));
        // Not degenerate
        assert!(positions.iter().any(|[x, _]| *x > 160.0));
        assert!(positions.iter().any(|[x, _]| *x < 160.0));
    }

    #[test]
    fn empty_store_is_allowed() {
        let mut rng = StdRng::seed_from_u64(1);
        let banks = BankSet::initialize(0, Viewport::new(10.0, 10.0), &mut rng).unwrap();
        assert!(banks.current().is_empty());
        assert!(banks.alternate().is_empty());
    }

    #[test]
    fn swap_twice_restores_roles() {
        let mut banks = BankSet::new("a", "b");
        assert_eq!(*banks.current(), "a");
        assert_eq!(*banks.alternate(), "b");

        banks.swap();
        assert_eq!(*banks.current(), "b");
        assert_eq!(*banks.alternate(), "a");
        assert_eq!(banks.current_index(), 1);

        banks.swap();
        assert_eq!(*banks.current(), "a");
        assert_eq!(*banks.alternate(), "b");
        assert_eq!(banks.current_index(), 0);
    }

    #[test]
    fn written_bank_becomes_current_after_swap() {
        let mut banks = BankSet::new(vec![1], vec![0]);
        {
            let (source, destination) = banks.roles_mut();
            destination[0] = source[0] + 1;
        }
        banks.swap();
        assert_eq!(banks.current(), &vec![2]);

        let (source, destination) = banks.roles_mut();
        assert_eq!(source, &vec![2]);
        assert_eq!(destination, &mut vec![1]);
    }

    #[test]
    fn bank_lookup_by_physical_index_ignores_roles() {
        let mut banks = BankSet::new('x', 'y');
        banks.swap();
        assert_eq!(*banks.bank(0), 'x');
        assert_eq!(*banks.bank(1), 'y');
    }
}
