use serde::{Deserialize, Serialize};

/// Whether the collection pass found the element's viewport center actually
/// hitting the element, an occluder, or nothing (off the page entirely).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitState {
    Hittable,
    Occluded,
    OffscreenPage,
}

/// A DOM-extracted click candidate, as produced by the browser worker's
/// `GET_HITTABLES_VIEWPORT` command (spec.md §3, §4.3). The extraction logic
/// itself lives in the worker; this crate only pins the wire shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HittableElement {
    pub id: String,
    pub name: String,
    pub role: String,
    pub enabled: bool,
    pub hit_state: HitState,
    pub center: [f64; 2],
    pub rect: [f64; 4],
    pub selector: String,
    pub href: Option<String>,
    #[serde(rename = "className")]
    pub class_name: Option<String>,
}

impl HittableElement {
    pub fn rect_left(&self) -> f64 {
        self.rect[0]
    }
    pub fn rect_top(&self) -> f64 {
        self.rect[1]
    }
    pub fn rect_width(&self) -> f64 {
        self.rect[2]
    }
    pub fn rect_height(&self) -> f64 {
        self.rect[3]
    }
}

/// Minimum accepted side length for a hittable element, in CSS pixels.
pub const MIN_HITTABLE_SIZE_PX: f64 = 8.0;
/// Default cap on hittables returned by a single snapshot.
pub const DEFAULT_MAX_HITTABLES: usize = 1000;
/// Hard cap regardless of requested `max`.
pub const MAX_HITTABLES_CAP: usize = 5000;
