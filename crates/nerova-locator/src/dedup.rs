use std::collections::HashSet;

use nerova_types::HittableElement;

/// Deduplicate a hittable snapshot by, in priority order: `id:<id>`,
/// `pos:<round(x)>:<round(y)>:<role>:<name>`, `name:<name>:<role>`. First
/// occurrence wins (spec.md §4.2 step 2, §8 property 4).
pub fn dedupe(elements: Vec<HittableElement>) -> Vec<HittableElement> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_positions: HashSet<(i64, i64, String, String)> = HashSet::new();
    let mut seen_names: HashSet<(String, String)> = HashSet::new();
    let mut out = Vec::with_capacity(elements.len());

    for element in elements {
        if !element.id.is_empty() {
            if !seen_ids.insert(element.id.clone()) {
                continue;
            }
        }

        let position_key = (
            element.center[0].round() as i64,
            element.center[1].round() as i64,
            element.role.clone(),
            element.name.clone(),
        );
        if !seen_positions.insert(position_key) {
            continue;
        }

        if !element.name.is_empty() {
            let name_key = (element.name.clone(), element.role.clone());
            if !seen_names.insert(name_key) {
                continue;
            }
        }

        out.push(element);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nerova_types::HitState;

    fn element(id: &str, x: f64, y: f64, role: &str, name: &str) -> HittableElement {
        HittableElement {
            id: id.to_string(),
            name: name.to_string(),
            role: role.to_string(),
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
    fn dedupes_by_id_first() {
        let elements = vec![
            element("btn-1", 10.0, 10.0, "button", "Add"),
            element("btn-1", 99.0, 99.0, "button", "Add Different"),
        ];
        let out = dedupe(elements);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].center, [10.0, 10.0]);
    }

    #[test]
    fn dedupes_by_position_role_name_when_no_id() {
        let elements = vec![
            element("", 10.4, 10.4, "button", "Add"),
            element("", 10.0, 10.0, "button", "Add"),
            element("", 10.0, 10.0, "button", "Different"),
        ];
        let out = dedupe(elements);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn dedupes_by_name_and_role_regardless_of_position() {
        let elements = vec![
            element("", 10.0, 10.0, "button", "Add to cart"),
            element("", 900.0, 900.0, "button", "Add to cart"),
        ];
        let out = dedupe(elements);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].center, [10.0, 10.0]);
    }

    #[test]
    fn no_two_outputs_share_id_or_position_key() {
        let elements = vec![
            element("a", 1.0, 1.0, "button", "x"),
            element("a", 2.0, 2.0, "button", "y"),
            element("b", 1.0, 1.0, "button", "x"),
        ];
        let out = dedupe(elements);
        let mut ids = HashSet::new();
        for e in &out {
            assert!(ids.insert(e.id.clone()));
        }
    }
}
