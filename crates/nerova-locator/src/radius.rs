use nerova_types::{ClickTarget, HittableElement};

/// Default search radius in CSS pixels when the Critic doesn't supply one
/// (spec.md §4.2 step 1).
pub const DEFAULT_RADIUS_PX: f64 = 120.0;

/// When no target center is given, cap the pool considered downstream.
const NO_CENTER_POOL: usize = 200;

/// When radius filtering finds nothing, fall back to this many nearest.
const NEAREST_FALLBACK: usize = 20;

/// Normalize `target.center`/`target.radius` from device pixels to CSS
/// pixels by dividing by the device pixel ratio (spec.md §4.2 step 1).
/// `default_radius` is used when the Critic doesn't supply one, configured
/// from `AGENT_CLICK_RADIUS` (spec.md §6); pass [`DEFAULT_RADIUS_PX`] to get
/// the spec's own default.
pub fn normalize_center_and_radius(
    target: &ClickTarget,
    dpr: f64,
    default_radius: f64,
) -> (Option<[f64; 2]>, f64) {
    let dpr = if dpr > 0.0 { dpr } else { 1.0 };
    let center = target.center.map(|[x, y]| [x / dpr, y / dpr]);
    let radius = target.radius.map(|r| r / dpr).unwrap_or(default_radius);
    (center, radius)
}

/// Euclidean distance from a point to the nearest edge of a rect, or 0 if
/// the point is inside it.
fn point_to_rect_distance(point: [f64; 2], rect: [f64; 4]) -> f64 {
    let [left, top, width, height] = rect;
    let right = left + width;
    let bottom = top + height;

    let dx = if point[0] < left {
        left - point[0]
    } else if point[0] > right {
        point[0] - right
    } else {
        0.0
    };
    let dy = if point[1] < top {
        top - point[1]
    } else if point[1] > bottom {
        point[1] - bottom
    } else {
        0.0
    };
    (dx * dx + dy * dy).sqrt()
}

fn center_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

/// The smaller of center-to-center distance and point-to-rect distance, used
/// both for the radius filter and all downstream nearest-tie-breaks.
pub fn distance_to_target(element: &HittableElement, center: [f64; 2]) -> f64 {
    point_to_rect_distance(center, element.rect).min(center_distance(element.center, center))
}

/// spec.md §4.2 step 3 and §8 property 2: keep elements within `radius`
/// (by center or rect-edge distance); if none qualify, fall back to the 20
/// nearest. With no target center, take the first 200.
pub fn filter_by_radius(
    elements: Vec<HittableElement>,
    center: Option<[f64; 2]>,
    radius: f64,
) -> Vec<HittableElement> {
    let Some(center) = center else {
        return elements.into_iter().take(NO_CENTER_POOL).collect();
    };

    let within: Vec<HittableElement> = elements
        .iter()
        .filter(|e| distance_to_target(e, center) <= radius)
        .cloned()
        .collect();

    if !within.is_empty() {
        return within;
    }

    let mut ranked: Vec<(f64, HittableElement)> = elements
        .into_iter()
        .map(|e| (distance_to_target(&e, center), e))
        .collect();
    ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    ranked
        .into_iter()
        .take(NEAREST_FALLBACK)
        .map(|(_, e)| e)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nerova_types::HitState;

    fn element(id: &str, x: f64, y: f64) -> HittableElement {
        HittableElement {
            id: id.to_string(),
            name: "name".to_string(),
            role: "button".to_string(),
            enabled: true,
            hit_state: HitState::Hittable,
            center: [x, y],
            rect: [x - 5.0, y - 5.0, 10.0, 10.0],
            selector: format!("#{id}"),
            href: None,
            class_name: None,
        }
    }

    #[test]
    fn normalizes_center_and_radius_by_dpr() {
        let target = ClickTarget {
            id: None,
            target_type: None,
            center: Some([640.0, 420.0]),
            hints: Default::default(),
            content: None,
            clear: None,
            submit: None,
            role: None,
            radius: Some(240.0),
        };
        let (center, radius) = normalize_center_and_radius(&target, 2.0, DEFAULT_RADIUS_PX);
        assert_eq!(center, Some([320.0, 210.0]));
        assert_eq!(radius, 120.0);
    }

    #[test]
    fn defaults_radius_when_absent() {
        let target = ClickTarget {
            id: None,
            target_type: None,
            center: Some([10.0, 10.0]),
            hints: Default::default(),
            content: None,
            clear: None,
            submit: None,
            role: None,
            radius: None,
        };
        let (_, radius) = normalize_center_and_radius(&target, 1.0, DEFAULT_RADIUS_PX);
        assert_eq!(radius, DEFAULT_RADIUS_PX);
    }

    #[test]
    fn uses_configured_default_radius_when_absent() {
        let target = ClickTarget {
            id: None,
            target_type: None,
            center: Some([10.0, 10.0]),
            hints: Default::default(),
            content: None,
            clear: None,
            submit: None,
            role: None,
            radius: None,
        };
        let (_, radius) = normalize_center_and_radius(&target, 1.0, 250.0);
        assert_eq!(radius, 250.0);
    }

    #[test]
    fn filters_within_radius() {
        let elements = vec![element("a", 10.0, 10.0), element("b", 500.0, 500.0)];
        let filtered = filter_by_radius(elements, Some([12.0, 12.0]), 50.0);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "a");
    }

    #[test]
    fn falls_back_to_nearest_when_none_within_radius() {
        let elements = vec![element("a", 1000.0, 1000.0), element("b", 2000.0, 2000.0)];
        let filtered = filter_by_radius(elements, Some([0.0, 0.0]), 1.0);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].id, "a");
    }

    #[test]
    fn takes_first_200_when_no_center() {
        let elements: Vec<HittableElement> = (0..300).map(|i| element(&i.to_string(), 0.0, 0.0)).collect();
        let filtered = filter_by_radius(elements, None, DEFAULT_RADIUS_PX);
        assert_eq!(filtered.len(), 200);
    }
}
