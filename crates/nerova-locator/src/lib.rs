//! Click Resolver: radius filtering, deduplication, exact-text matching,
//! and Assistant-backed disambiguation for Critic-proposed click targets
//! (spec.md §4.2).

mod dedup;
mod errors;
mod exact_match;
mod post_click;
mod radius;
mod resolver;

pub use dedup::dedupe;
pub use errors::ResolverError;
pub use exact_match::find_exact_match;
pub use post_click::run_post_click_effects;
pub use radius::{distance_to_target, filter_by_radius, normalize_center_and_radius, DEFAULT_RADIUS_PX};
pub use resolver::{ClickResolver, ResolvedClick};
