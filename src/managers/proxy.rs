//! Positional edits on one layer.

use zmk_layout_models::{LayoutBinding, LayoutData, LayoutError, Result};

/// A handle for one layer. The proxy stores the layer *name* and resolves it
/// on every call, so it never acts on a renamed-away or stale index.
pub struct LayerProxy<'a> {
    data: &'a mut LayoutData,
    name: String,
}

impl<'a> LayerProxy<'a> {
    pub(crate) fn new(data: &'a mut LayoutData, name: &str) -> Self {
        Self {
            data,
            name: name.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn index(&self) -> Result<usize> {
        self.data
            .layer_index(&self.name)
            .ok_or_else(|| LayoutError::LayerNotFound(self.name.clone()))
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.data.layers[self.index()?].len())
    }

    pub fn bindings(&self) -> Result<&[LayoutBinding]> {
        let index = self.index()?;
        Ok(&self.data.layers[index])
    }

    pub fn get(&self, position: usize) -> Result<&LayoutBinding> {
        let index = self.index()?;
        self.data.layers[index]
            .get(position)
            .ok_or(LayoutError::PositionOutOfRange {
                position,
                len: self.data.layers[index].len(),
            })
    }

    /// Set the binding at `position`, parsing it from its keymap spelling.
    /// The layer auto-extends with `&none` placeholders when `position` is
    /// past the end.
    pub fn set(&mut self, position: usize, binding: &str) -> Result<&mut Self> {
        self.set_binding(position, LayoutBinding::from_str(binding)?)
    }

    /// Same as [`set`](Self::set) with an already-built binding.
    pub fn set_binding(&mut self, position: usize, binding: LayoutBinding) -> Result<&mut Self> {
        let index = self.index()?;
        let layer = &mut self.data.layers[index];
        while layer.len() <= position {
            layer.push(LayoutBinding::bare("&none"));
        }
        layer[position] = binding;
        Ok(self)
    }

    pub fn append(&mut self, binding: &str) -> Result<&mut Self> {
        self.append_binding(LayoutBinding::from_str(binding)?)
    }

    pub fn append_binding(&mut self, binding: LayoutBinding) -> Result<&mut Self> {
        let index = self.index()?;
        self.data.layers[index].push(binding);
        Ok(self)
    }

    /// Replace `start..end` with `bindings`; the replacement length must
    /// match the range exactly.
    pub fn set_range(
        &mut self,
        start: usize,
        end: usize,
        bindings: Vec<LayoutBinding>,
    ) -> Result<&mut Self> {
        let index = self.index()?;
        let layer = &mut self.data.layers[index];
        if start > end || end > layer.len() {
            return Err(LayoutError::PositionOutOfRange {
                position: end,
                len: layer.len(),
            });
        }
        if bindings.len() != end - start {
            return Err(LayoutError::RangeLengthMismatch {
                start,
                end,
                expected: end - start,
                got: bindings.len(),
            });
        }
        layer.splice(start..end, bindings);
        Ok(self)
    }

    pub fn clear(&mut self) -> Result<&mut Self> {
        let index = self.index()?;
        self.data.layers[index].clear();
        Ok(self)
    }

    /// Deep-copy another layer's bindings over this one.
    pub fn copy_from(&mut self, source: &str) -> Result<&mut Self> {
        let source_index = self
            .data
            .layer_index(source)
            .ok_or_else(|| LayoutError::LayerNotFound(source.to_owned()))?;
        let index = self.index()?;
        self.data.layers[index] = self.data.layers[source_index].clone();
        Ok(self)
    }
}
