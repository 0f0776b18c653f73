use indexmap::IndexMap;

use crate::pipeline::MediaPipeline;
use crate::types::MediaCategory;

/// Active pipelines of a stream, keyed by category in creation order.
#[derive(Default)]
pub struct PipelineSlots {
    slots: IndexMap<MediaCategory, Box<dyn MediaPipeline>>,
}

impl PipelineSlots {
    /// Adds a slot at the end. An existing slot for the category is replaced in place.
    pub fn insert(&mut self, pipeline: Box<dyn MediaPipeline>) {
        self.slots.insert(pipeline.category(), pipeline);
    }

    /// Swaps the pipeline of an existing slot, keeping its position. Returns the previous
    /// pipeline, or `None` (and leaves the collection untouched) when no such slot exists.
    pub fn replace(
        &mut self,
        category: MediaCategory,
        pipeline: Box<dyn MediaPipeline>,
    ) -> Option<Box<dyn MediaPipeline>> {
        let slot = self.slots.get_mut(&category)?;
        Some(std::mem::replace(slot, pipeline))
    }

    pub fn get(&self, category: MediaCategory) -> Option<&dyn MediaPipeline> {
        self.slots.get(&category).map(|p| p.as_ref())
    }

    pub fn get_mut(&mut self, category: MediaCategory) -> Option<&mut Box<dyn MediaPipeline>> {
        self.slots.get_mut(&category)
    }

    pub fn first(&self) -> Option<&dyn MediaPipeline> {
        self.slots.first().map(|(_, p)| p.as_ref())
    }

    pub fn categories(&self) -> Vec<MediaCategory> {
        self.slots.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn MediaPipeline> {
        self.slots.values().map(|p| p.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn MediaPipeline>> {
        self.slots.values_mut()
    }

    pub fn any_updating(&self) -> bool {
        self.iter().any(|p| p.is_updating())
    }

    /// Resets every pipeline and empties the collection.
    pub fn reset_all(&mut self) {
        for pipeline in self.slots.values_mut() {
            pipeline.reset(false);
        }
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
