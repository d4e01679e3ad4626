//! Live mapping from draggable rows, section headers, and section drop-zones
//! to their current bounding boxes.
//!
//! The rendering surface registers a [`RectProvider`] per element as it
//! mounts and unregisters it on unmount. Lookups go through the provider, so
//! a provider backed by live layout state always reports the current box.

use std::collections::HashMap;
use std::fmt;

/// A point in surface coordinates (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// An axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn mid_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Edge-inclusive containment test
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.top() && p.y <= self.bottom()
    }
}

/// What a registered rectangle belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GeometryKey {
    /// A task or subtask row
    Task(String),
    /// A section header
    Section(String),
    /// The whole task-list area of a section (None = the unsectioned area)
    DropZone(Option<String>),
}

impl fmt::Display for GeometryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryKey::Task(id) => write!(f, "task {}", id),
            GeometryKey::Section(id) => write!(f, "section {}", id),
            GeometryKey::DropZone(Some(id)) => write!(f, "drop-zone {}", id),
            GeometryKey::DropZone(None) => write!(f, "drop-zone (unsectioned)"),
        }
    }
}

/// Source of an element's current bounding box. `None` means the element is
/// not laid out right now.
pub trait RectProvider {
    fn rect(&self) -> Option<Rect>;
}

impl RectProvider for Rect {
    fn rect(&self) -> Option<Rect> {
        Some(*self)
    }
}

impl<F> RectProvider for F
where
    F: Fn() -> Option<Rect>,
{
    fn rect(&self) -> Option<Rect> {
        self()
    }
}

/// Registry of element geometry, keyed by [`GeometryKey`]
#[derive(Default)]
pub struct GeometryRegistry {
    providers: HashMap<GeometryKey, Box<dyn RectProvider>>,
}

impl fmt::Debug for GeometryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeometryRegistry")
            .field("registered", &self.providers.len())
            .finish()
    }
}

impl GeometryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the provider for `key`
    pub fn register(&mut self, key: GeometryKey, provider: impl RectProvider + 'static) {
        self.providers.insert(key, Box::new(provider));
    }

    /// Forget `key`. Returns false if it was not registered.
    pub fn unregister(&mut self, key: &GeometryKey) -> bool {
        self.providers.remove(key).is_some()
    }

    /// Current rect of `key`, or None if unregistered or not laid out
    pub fn rect_of(&self, key: &GeometryKey) -> Option<Rect> {
        self.providers.get(key).and_then(|p| p.rect())
    }

    pub fn clear(&mut self) {
        self.providers.clear();
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
