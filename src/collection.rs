use crate::models::Movie;
use std::collections::HashSet;

/// Ordered, id-unique accumulation of the movies shown for the active mode.
#[derive(Debug, Default, Clone)]
pub struct MovieCollection {
    items: Vec<Movie>,
    ids: HashSet<i32>,
}

impl MovieCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents. First occurrence of an id wins.
    pub fn reset(&mut self, items: Vec<Movie>) {
        self.clear();
        self.append(items);
    }

    /// Adds unseen items at the end and returns the ones actually added.
    pub fn append(&mut self, items: Vec<Movie>) -> Vec<Movie> {
        let mut added = Vec::with_capacity(items.len());
        for movie in items {
            if self.ids.insert(movie.id) {
                added.push(movie.clone());
                self.items.push(movie);
            }
        }
        added
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.ids.clear();
    }

    pub fn list(&self) -> &[Movie] {
        &self.items
    }

    pub fn contains(&self, id: i32) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
