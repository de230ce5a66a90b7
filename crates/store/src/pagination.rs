//! Page/limit arithmetic shared by list endpoints.

/// Clamp a requested limit into `[1, max]`.
pub fn clamp_limit(limit: usize, max: usize) -> usize {
    limit.clamp(1, max)
}

/// Normalize a page number (pages are 1-based).
pub fn clamp_page(page: usize) -> usize {
    page.max(1)
}

/// Row offset for a 1-based page.
pub fn offset(page: usize, limit: usize) -> usize {
    clamp_page(page).saturating_sub(1) * limit
}
