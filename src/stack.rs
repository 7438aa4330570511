use tracing::debug;

use crate::layer::Layer;

/// Stable identity of a layer; indices change when the stack is reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerHandle(u64);

impl LayerHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Layers in paint order; a layer's z value is its index.
#[derive(Debug, Default)]
pub struct LayerStack {
    layers: Vec<Layer>,
    next_handle: u64,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Creates an empty layer on top of the stack.
    pub fn push(&mut self, name: impl Into<String>) -> LayerHandle {
        let handle = self.allocate_handle();
        self.layers.push(Layer::new(handle, name));
        handle
    }

    pub fn allocate_handle(&mut self) -> LayerHandle {
        self.next_handle += 1;
        LayerHandle(self.next_handle)
    }

    /// Inserts `layer` directly above `index`, or on top if out of range.
    pub fn insert_above(&mut self, index: usize, layer: Layer) {
        let at = (index + 1).min(self.layers.len());
        self.layers.insert(at, layer);
    }

    pub fn remove(&mut self, handle: LayerHandle) -> Option<Layer> {
        let index = self.index_of(handle)?;
        Some(self.layers.remove(index))
    }

    pub fn index_of(&self, handle: LayerHandle) -> Option<usize> {
        self.layers.iter().position(|layer| layer.handle() == handle)
    }

    pub fn z_order(&self, handle: LayerHandle) -> Option<usize> {
        self.index_of(handle)
    }

    pub fn get(&self, handle: LayerHandle) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.handle() == handle)
    }

    pub fn get_mut(&mut self, handle: LayerHandle) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.handle() == handle)
    }

    pub fn layer_at(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    /// Swaps the layer at `index` with the one above it.
    pub fn move_up(&mut self, index: usize) -> bool {
        if index + 1 >= self.layers.len() {
            return false;
        }
        self.layers.swap(index, index + 1);
        debug!("layer {index} moved up");
        true
    }

    /// Swaps the layer at `index` with the one below it.
    pub fn move_down(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.layers.len() {
            return false;
        }
        self.layers.swap(index, index - 1);
        debug!("layer {index} moved down");
        true
    }

    pub fn move_layer(&mut self, handle: LayerHandle, direction: Direction) -> bool {
        let Some(index) = self.index_of(handle) else {
            return false;
        };
        match direction {
            Direction::Up => self.move_up(index),
            Direction::Down => self.move_down(index),
        }
    }

    /// Bottom to top, the compositing order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Visible layers, bottom to top.
    pub fn visible(&self) -> impl DoubleEndedIterator<Item = &Layer> {
        self.layers.iter().filter(|layer| layer.visible)
    }
}
