use crate::models::Aggregate;
use crossbeam::channel::Receiver;
use rayon::prelude::*;

/// Folds partial mappings into a single accumulator it owns.
#[derive(Debug, Default)]
pub struct Reducer {
    accumulator: Aggregate,
    partials: u64,
}

impl Reducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, partial: Aggregate) {
        let accumulator = std::mem::take(&mut self.accumulator);
        self.accumulator = accumulator.merge(partial);
        self.partials += 1;
    }

    /// Number of partial mappings absorbed so far.
    pub fn partials(&self) -> u64 {
        self.partials
    }

    pub fn into_accumulator(self) -> Aggregate {
        self.accumulator
    }

    /// Worker loop: drain `partials` until every producer has hung up.
    pub fn run(mut self, partials: Receiver<Aggregate>) -> (Aggregate, u64) {
        for partial in partials.iter() {
            self.absorb(partial);
        }
        let absorbed = self.partials();
        (self.into_accumulator(), absorbed)
    }
}

/// Final merge of the reducer accumulators into the result mapping.
pub fn merge_accumulators(accumulators: Vec<Aggregate>) -> Aggregate {
    accumulators
        .into_par_iter()
        .reduce(Aggregate::new, Aggregate::merge)
}
