//! Layer collection operations.

use super::proxy::LayerProxy;
use zmk_layout_models::{LayerBindings, LayoutBinding, LayoutData, LayoutError, Result};

pub struct LayerManager<'a> {
    data: &'a mut LayoutData,
}

impl<'a> LayerManager<'a> {
    pub(crate) fn new(data: &'a mut LayoutData) -> Self {
        Self { data }
    }

    /// Append a new empty layer and return its proxy.
    pub fn add(&mut self, name: &str) -> Result<LayerProxy<'_>> {
        self.insert_layer(name, None)?;
        self.get(name)
    }

    /// Insert a new empty layer at `position`.
    pub fn add_at(&mut self, name: &str, position: usize) -> Result<LayerProxy<'_>> {
        self.insert_layer(name, Some(position))?;
        self.get(name)
    }

    fn insert_layer(&mut self, name: &str, position: Option<usize>) -> Result<()> {
        if self.data.layer_index(name).is_some() {
            return Err(LayoutError::LayerExists(name.to_owned()));
        }
        let at = match position {
            Some(p) if p > self.data.layer_names.len() => {
                return Err(LayoutError::PositionOutOfRange {
                    position: p,
                    len: self.data.layer_names.len(),
                })
            }
            Some(p) => p,
            None => self.data.layer_names.len(),
        };
        self.data.layer_names.insert(at, name.to_owned());
        self.data.layers.insert(at, LayerBindings::new());
        Ok(())
    }

    /// Proxy for positional edits on an existing layer.
    pub fn get(&mut self, name: &str) -> Result<LayerProxy<'_>> {
        if self.data.layer_index(name).is_none() {
            return Err(LayoutError::LayerNotFound(name.to_owned()));
        }
        Ok(LayerProxy::new(self.data, name))
    }

    pub fn remove(&mut self, name: &str) -> Result<&mut Self> {
        let index = self
            .data
            .layer_index(name)
            .ok_or_else(|| LayoutError::LayerNotFound(name.to_owned()))?;
        self.data.layer_names.remove(index);
        self.data.layers.remove(index);
        Ok(self)
    }

    /// Move a layer to `position`, shifting the others.
    pub fn move_layer(&mut self, name: &str, position: usize) -> Result<&mut Self> {
        let index = self
            .data
            .layer_index(name)
            .ok_or_else(|| LayoutError::LayerNotFound(name.to_owned()))?;
        if position >= self.data.layer_names.len() {
            return Err(LayoutError::PositionOutOfRange {
                position,
                len: self.data.layer_names.len(),
            });
        }
        let layer_name = self.data.layer_names.remove(index);
        let layer = self.data.layers.remove(index);
        self.data.layer_names.insert(position, layer_name);
        self.data.layers.insert(position, layer);
        Ok(self)
    }

    pub fn rename(&mut self, old: &str, new: &str) -> Result<&mut Self> {
        let index = self
            .data
            .layer_index(old)
            .ok_or_else(|| LayoutError::LayerNotFound(old.to_owned()))?;
        if self.data.layer_index(new).is_some() {
            return Err(LayoutError::LayerExists(new.to_owned()));
        }
        self.data.layer_names[index] = new.to_owned();
        Ok(self)
    }

    /// Deep-copy `source` into a new layer `target` and return its proxy.
    pub fn copy(&mut self, source: &str, target: &str) -> Result<LayerProxy<'_>> {
        let source_index = self
            .data
            .layer_index(source)
            .ok_or_else(|| LayoutError::LayerNotFound(source.to_owned()))?;
        if self.data.layer_index(target).is_some() {
            return Err(LayoutError::LayerExists(target.to_owned()));
        }
        let bindings = self.data.layers[source_index].clone();
        self.data.layer_names.push(target.to_owned());
        self.data.layers.push(bindings);
        self.get(target)
    }

    /// Remove all bindings from a layer and return its proxy.
    pub fn clear(&mut self, name: &str) -> Result<LayerProxy<'_>> {
        let index = self
            .data
            .layer_index(name)
            .ok_or_else(|| LayoutError::LayerNotFound(name.to_owned()))?;
        self.data.layers[index].clear();
        self.get(name)
    }

    /// Reorder layers to match `order`, which must name every existing layer
    /// exactly once.
    pub fn reorder(&mut self, order: &[&str]) -> Result<&mut Self> {
        if order.len() != self.data.layer_names.len() {
            return Err(LayoutError::ReorderMismatch);
        }
        let mut indices = Vec::with_capacity(order.len());
        for name in order {
            let index = self
                .data
                .layer_index(name)
                .ok_or(LayoutError::ReorderMismatch)?;
            if indices.contains(&index) {
                return Err(LayoutError::ReorderMismatch);
            }
            indices.push(index);
        }
        self.data.layer_names = indices
            .iter()
            .map(|&i| self.data.layer_names[i].clone())
            .collect();
        self.data.layers = indices
            .iter()
            .map(|&i| self.data.layers[i].clone())
            .collect();
        Ok(self)
    }

    /// Names of layers matching a predicate over (name, bindings).
    pub fn find(&self, mut predicate: impl FnMut(&str, &[LayoutBinding]) -> bool) -> Vec<String> {
        self.data
            .layer_names
            .iter()
            .zip(&self.data.layers)
            .filter(|(name, bindings)| predicate(name, bindings))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Add several empty layers; on any name collision nothing is added.
    pub fn add_multiple(&mut self, names: &[&str]) -> Result<&mut Self> {
        for (i, name) in names.iter().enumerate() {
            if self.data.layer_index(name).is_some() || names[..i].contains(name) {
                return Err(LayoutError::LayerExists((*name).to_owned()));
            }
        }
        for name in names {
            self.data.layer_names.push((*name).to_owned());
            self.data.layers.push(LayerBindings::new());
        }
        Ok(self)
    }

    /// Remove several layers; if any is missing nothing is removed.
    pub fn remove_multiple(&mut self, names: &[&str]) -> Result<&mut Self> {
        for name in names {
            if self.data.layer_index(name).is_none() {
                return Err(LayoutError::LayerNotFound((*name).to_owned()));
            }
        }
        for name in names {
            let index = self.data.layer_index(name).expect("checked above");
            self.data.layer_names.remove(index);
            self.data.layers.remove(index);
        }
        Ok(self)
    }

    pub fn names(&self) -> Vec<String> {
        self.data.layer_names.clone()
    }

    pub fn count(&self) -> usize {
        self.data.layer_names.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.data.layer_index(name).is_some()
    }
}
