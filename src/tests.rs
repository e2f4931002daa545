use crate::mem::{BuddySystem, Error, Frame, PageDescriptor, PageState, PAGE_SIZE};
use quickcheck::{Arbitrary, Gen, QuickCheck};

/// Number of orders of the tested buddy systems, blocks are 1 to 16 pages large.
const ORDERS: usize = 5;
/// Number of managed pages, which are four blocks of the largest order.
const PAGES: usize = 64;

type Buddy<'a> = BuddySystem<'a, PageDescriptor, ORDERS>;

enum OpTag {
    Alloc,
    Free,
    AllocCached,
    FreeCached,
}

#[derive(Clone, Debug)]
enum Op {
    /// Allocate a block of the given order, which may be invalid.
    Alloc { order: usize },
    /// Free an existing allocation.
    ///
    /// Given `n` outstanding allocations, the allocation to free is at index
    /// `index % n`.
    Free { index: usize },
    /// Allocate a single page through the page cache.
    AllocCached,
    /// Return an existing single page allocation to the page cache.
    FreeCached { index: usize },
}

impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        match g
            .choose(&[OpTag::Alloc, OpTag::Free, OpTag::AllocCached, OpTag::FreeCached])
            .unwrap()
        {
            OpTag::Alloc => Op::Alloc {
                order: usize::arbitrary(g) % (ORDERS + 1),
            },
            OpTag::Free => Op::Free {
                index: usize::arbitrary(g),
            },
            OpTag::AllocCached => Op::AllocCached,
            OpTag::FreeCached => Op::FreeCached {
                index: usize::arbitrary(g),
            },
        }
    }
}

struct Allocation {
    frame: Frame,
    order: usize,
}

impl Allocation {
    fn overlaps(&self, other: &Allocation) -> bool {
        let start = self.frame.index();
        let end = start + (1 << self.order);
        let other_start = other.frame.index();
        let other_end = other_start + (1 << other.order);

        start < other_end && other_start < end
    }
}

struct Harness<'a> {
    system: Buddy<'a>,
    live: Vec<Allocation>,
}

impl Harness<'_> {
    fn live_bytes(&self) -> usize {
        self.live
            .iter()
            .map(|alloc| (1 << alloc.order) * PAGE_SIZE)
            .sum()
    }

    fn insert(&mut self, alloc: Allocation) -> bool {
        if self.live.iter().any(|live| live.overlaps(&alloc)) {
            return false;
        }

        self.live.push(alloc);
        true
    }

    /// Applies the operation and returns whether the outcome was valid.
    fn apply(&mut self, op: Op) -> bool {
        let valid = match op {
            Op::Alloc { order } => match self.system.alloc(order) {
                Ok(frame) => order < ORDERS && self.insert(Allocation { frame, order }),
                Err(Error::OrderTooLarge) => order >= ORDERS,
                Err(Error::NoMemoryAvailable) => {
                    (order..ORDERS).all(|order| self.system.free_count(order) == 0)
                }
                Err(_) => false,
            },

            Op::Free { index } => {
                if self.live.is_empty() {
                    return true;
                }

                let alloc = self.live.swap_remove(index % self.live.len());
                self.system.free(alloc.frame).is_ok()
            }

            Op::AllocCached => match self.system.alloc_cached() {
                Ok(frame) => self.insert(Allocation { frame, order: 0 }),
                Err(Error::NoMemoryAvailable) => {
                    self.system.cache_size() == 0 && self.system.free_space() == 0
                }
                Err(_) => false,
            },

            Op::FreeCached { index } => {
                let singles = self
                    .live
                    .iter()
                    .enumerate()
                    .filter(|(_, alloc)| alloc.order == 0)
                    .map(|(idx, _)| idx)
                    .collect::<Vec<_>>();
                if singles.is_empty() {
                    return true;
                }

                let alloc = self.live.swap_remove(singles[index % singles.len()]);
                self.system.free_cached(alloc.frame).is_ok()
            }
        };

        let accounted = self.system.free_space() + self.system.cached_space() + self.live_bytes();
        valid && self.system.check().is_ok() && accounted == self.system.total_space()
    }
}

type Snapshot = (Vec<Vec<Frame>>, Vec<Option<PageState>>);

fn snapshot(system: &Buddy<'_>) -> Snapshot {
    let lists = (0..ORDERS)
        .map(|order| system.free_blocks(order).collect())
        .collect();
    let states = (0..PAGES)
        .map(|idx| system.state(Frame::new(idx)))
        .collect();
    (lists, states)
}

#[test]
fn bookkeeping_stays_consistent() {
    fn prop(ops: Vec<Op>) -> bool {
        let mut pages = vec![PageDescriptor::new(); PAGES];
        let mut harness = Harness {
            system: Buddy::new("prop", &mut pages, 0, PAGES).unwrap(),
            live: Vec::new(),
        };

        ops.into_iter().all(|op| harness.apply(op))
    }

    let mut qc = QuickCheck::new();
    qc.quickcheck(prop as fn(_) -> bool);
}

#[test]
fn alloc_then_free_restores_table() {
    fn prop(ops: Vec<Op>) -> bool {
        let mut pages = vec![PageDescriptor::new(); PAGES];
        let mut harness = Harness {
            system: Buddy::new("prop", &mut pages, 0, PAGES).unwrap(),
            live: Vec::new(),
        };

        if !ops.into_iter().all(|op| harness.apply(op)) {
            return false;
        }

        let system = &mut harness.system;
        (0..ORDERS).all(|order| {
            if (order..ORDERS).all(|order| system.free_count(order) == 0) {
                return system.alloc(order) == Err(Error::NoMemoryAvailable);
            }

            let before = snapshot(system);
            let frame = match system.alloc(order) {
                Ok(frame) => frame,
                Err(_) => return false,
            };

            system.free(frame).is_ok() && snapshot(system) == before
        })
    }

    let mut qc = QuickCheck::new();
    qc.quickcheck(prop as fn(_) -> bool);
}

#[test]
fn freeing_everything_coalesces_fully() {
    fn prop(ops: Vec<Op>, order: Vec<usize>) -> bool {
        let mut pages = vec![PageDescriptor::new(); PAGES];
        let mut harness = Harness {
            system: Buddy::new("prop", &mut pages, 0, PAGES).unwrap(),
            live: Vec::new(),
        };

        if !ops.into_iter().all(|op| harness.apply(op)) {
            return false;
        }

        let mut seeds = order.into_iter().cycle();
        while !harness.live.is_empty() {
            let index = seeds.next().unwrap_or(0) % harness.live.len();
            let alloc = harness.live.swap_remove(index);
            if harness.system.free(alloc.frame).is_err() {
                return false;
            }
        }

        let system = &mut harness.system;
        if system.drain_cache().is_err() {
            return false;
        }

        (0..ORDERS - 1).all(|order| system.free_count(order) == 0)
            && system.free_count(ORDERS - 1) == PAGES >> (ORDERS - 1)
            && system.free_space() == system.total_space()
    }

    let mut qc = QuickCheck::new();
    qc.quickcheck(prop as fn(_, _) -> bool);
}
