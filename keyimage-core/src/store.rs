//! In-memory annotation arena.
//!
//! Annotations are owned here and addressed by [`AnnotationUid`]; tools only
//! ever hold the uid. Insertion order is kept so renders are deterministic.

use std::collections::HashMap;

use crate::host::AnnotationStore;
use crate::{Annotation, AnnotationUid, ElementId};

#[derive(Debug, Clone)]
struct Entry {
    element: ElementId,
    annotation: Annotation,
}

/// Arena-backed [`AnnotationStore`].
#[derive(Debug, Clone, Default)]
pub struct AnnotationArena {
    entries: HashMap<AnnotationUid, Entry>,
    order: Vec<AnnotationUid>,
}

impl AnnotationArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored annotations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an annotation with `uid` is stored.
    #[must_use]
    pub fn contains(&self, uid: AnnotationUid) -> bool {
        self.entries.contains_key(&uid)
    }

    /// All annotations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.order
            .iter()
            .filter_map(|uid| self.entries.get(uid))
            .map(|entry| &entry.annotation)
    }

    /// Element an annotation was added for.
    #[must_use]
    pub fn element_of(&self, uid: AnnotationUid) -> Option<&ElementId> {
        self.entries.get(&uid).map(|entry| &entry.element)
    }
}

impl AnnotationStore for AnnotationArena {
    fn add_annotation(&mut self, annotation: Annotation, element: &ElementId) {
        let uid = annotation.annotation_uid;
        let previous = self.entries.insert(
            uid,
            Entry {
                element: element.clone(),
                annotation,
            },
        );
        if previous.is_none() {
            self.order.push(uid);
        } else {
            tracing::warn!("Annotation {uid} re-added; replacing stored copy");
        }
    }

    fn annotations(&self, tool_name: &str, element: &ElementId) -> Vec<&Annotation> {
        self.order
            .iter()
            .filter_map(|uid| self.entries.get(uid))
            .filter(|entry| {
                entry.element == *element && entry.annotation.metadata.tool_name == tool_name
            })
            .map(|entry| &entry.annotation)
            .collect()
    }

    fn annotation(&self, uid: AnnotationUid) -> Option<&Annotation> {
        self.entries.get(&uid).map(|entry| &entry.annotation)
    }

    fn annotation_mut(&mut self, uid: AnnotationUid) -> Option<&mut Annotation> {
        self.entries.get_mut(&uid).map(|entry| &mut entry.annotation)
    }

    fn remove_annotation(&mut self, uid: AnnotationUid) -> Option<Annotation> {
        let entry = self.entries.remove(&uid)?;
        self.order.retain(|stored| *stored != uid);
        Some(entry.annotation)
    }
}
