//! Named stacks of co-registered grids.

use crate::error::{GridError, GridResult};
use crate::Grid;

/// Named grids sharing one lattice, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct LayerStack {
    layers: Vec<(String, Grid)>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer. It must be co-registered with the layers already present.
    pub fn push(&mut self, name: impl Into<String>, grid: Grid) -> GridResult<()> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(GridError::DuplicateLayer(name));
        }
        if let Some((_, first)) = self.layers.first() {
            if !first.is_co_registered(&grid) {
                return Err(GridError::NotCoRegistered { name });
            }
        }
        self.layers.push((name, grid));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Grid> {
        self.layers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, g)| g)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Grid)> {
        self.layers.iter().map(|(n, g)| (n.as_str(), g))
    }

    pub fn grids(&self) -> Vec<&Grid> {
        self.layers.iter().map(|(_, g)| g).collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
