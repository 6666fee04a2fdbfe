//! Pre-generated trial designs.
//!
//! Designs for a phase or block are built in bulk, shuffled once and then
//! handed out one per trial. A queue never rewinds: running out is an error.

use behex_core::random::shuffle;
use behex_core::{ExperimentError, Result};
use rand::RngCore;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct DesignQueue<D> {
    label: String,
    items: VecDeque<D>,
    consumed: usize,
}

impl<D> DesignQueue<D> {
    /// Designs are handed out in the given order.
    pub fn new(label: impl Into<String>, items: Vec<D>) -> Self {
        Self {
            label: label.into(),
            items: items.into(),
            consumed: 0,
        }
    }

    pub fn shuffled(label: impl Into<String>, items: Vec<D>, rng: &mut dyn RngCore) -> Self {
        Self::new(label, shuffle(rng, items))
    }

    pub fn next_design(&mut self) -> Result<D> {
        match self.items.pop_front() {
            Some(d) => {
                self.consumed += 1;
                Ok(d)
            }
            None => Err(ExperimentError::DesignExhausted {
                phase: self.label.clone(),
                consumed: self.consumed,
            }),
        }
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<D> Default for DesignQueue<D> {
    fn default() -> Self {
        Self::new("empty", Vec::new())
    }
}
