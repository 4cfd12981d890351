use nerova_types::{ScrollDirection, ScrollParams};

/// Base per-page scroll distance when the Critic gives a page count rather
/// than a raw pixel amount (spec.md §4.1 "Action semantics").
pub fn base_page_delta(viewport_height: f64) -> f64 {
    (0.8 * viewport_height).round().max(200.0)
}

/// Resolve a Critic `scroll` decision into a signed pixel delta along the
/// vertical axis: negative for up, positive for down.
pub fn resolve_delta(params: &ScrollParams, viewport_height: f64) -> f64 {
    let sign = match params.direction {
        ScrollDirection::Up => -1.0,
        ScrollDirection::Down => 1.0,
    };

    if let Some(amount) = params.amount {
        return sign * amount.abs();
    }

    let pages = params.pages.unwrap_or(1).clamp(1, 3) as f64;
    sign * base_page_delta(viewport_height) * pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_overrides_page_count() {
        let params = ScrollParams {
            direction: ScrollDirection::Down,
            pages: Some(2),
            amount: Some(50.0),
        };
        assert_eq!(resolve_delta(&params, 900.0), 50.0);
    }

    #[test]
    fn up_direction_is_negative() {
        let params = ScrollParams {
            direction: ScrollDirection::Up,
            pages: None,
            amount: None,
        };
        assert!(resolve_delta(&params, 900.0) < 0.0);
    }

    #[test]
    fn page_count_scales_base_delta() {
        let one_page = ScrollParams {
            direction: ScrollDirection::Down,
            pages: Some(1),
            amount: None,
        };
        let two_pages = ScrollParams {
            direction: ScrollDirection::Down,
            pages: Some(2),
            amount: None,
        };
        let d1 = resolve_delta(&one_page, 1000.0);
        let d2 = resolve_delta(&two_pages, 1000.0);
        assert_eq!(d2, d1 * 2.0);
    }

    #[test]
    fn base_delta_has_a_floor() {
        assert_eq!(base_page_delta(10.0), 200.0);
    }
}
