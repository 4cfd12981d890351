use nerova_types::{normalize, HittableElement};

use crate::radius::distance_to_target;

/// spec.md §4.2 step 6: terminal exact-text match. Case-insensitive,
/// whitespace-collapsed equality against any of `hints.text_exact`; ties
/// break on nearest-to-center, then first-in-DOM-order (§8 property 5).
pub fn find_exact_match<'a>(
    elements: &'a [HittableElement],
    text_exact: &[String],
    center: Option<[f64; 2]>,
) -> Option<&'a HittableElement> {
    if text_exact.is_empty() {
        return None;
    }
    let wanted: Vec<String> = text_exact.iter().map(|s| normalize(s)).collect();

    let mut matches: Vec<&HittableElement> = elements
        .iter()
        .filter(|e| wanted.contains(&normalize(&e.name)))
        .collect();

    if matches.is_empty() {
        return None;
    }
    if matches.len() == 1 {
        return matches.into_iter().next();
    }

    if let Some(center) = center {
        matches.sort_by(|a, b| {
            distance_to_target(a, center)
                .partial_cmp(&distance_to_target(b, center))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    matches.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nerova_types::HitState;

    fn element(id: &str, x: f64, y: f64, name: &str) -> HittableElement {
        HittableElement {
            id: id.to_string(),
            name: name.to_string(),
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
    fn matches_case_and_whitespace_insensitively() {
        let elements = vec![element("a", 0.0, 0.0, "  Add   To Cart ")];
        let found = find_exact_match(&elements, &["add to cart".to_string()], None);
        assert_eq!(found.unwrap().id, "a");
    }

    #[test]
    fn no_match_returns_none() {
        let elements = vec![element("a", 0.0, 0.0, "Checkout")];
        let found = find_exact_match(&elements, &["Add to Cart".to_string()], None);
        assert!(found.is_none());
    }

    #[test]
    fn ties_break_on_nearest_to_center() {
        let elements = vec![
            element("far", 500.0, 500.0, "Buy"),
            element("near", 10.0, 10.0, "Buy"),
        ];
        let found = find_exact_match(&elements, &["Buy".to_string()], Some([0.0, 0.0]));
        assert_eq!(found.unwrap().id, "near");
    }

    #[test]
    fn ties_without_center_take_first_in_dom_order() {
        let elements = vec![element("first", 0.0, 0.0, "Buy"), element("second", 0.0, 0.0, "Buy")];
        let found = find_exact_match(&elements, &["Buy".to_string()], None);
        assert_eq!(found.unwrap().id, "first");
    }
}
