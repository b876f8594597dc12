// src/db.rs
//
// Runtime (unchecked) queries so the build never needs a live database.

pub mod ads;
pub mod community;
pub mod courses;
pub mod meetings;
pub mod memberships;
pub mod notes;
pub mod payouts;
pub mod support;
pub mod users;

/// `page` is 1-based; `per_page` is clamped to 1..=50.
pub fn page_bounds(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let per_page = per_page.unwrap_or(20).clamp(1, 50);
    let page = page.unwrap_or(1).max(1);
    (per_page, (page - 1) * per_page)
}
