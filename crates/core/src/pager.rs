//! Page arithmetic bounded by the service's result window.
//!
//! The remote service refuses to enumerate past a fixed number of results
//! (`cap_max`) regardless of how many matches it reports, so every page count
//! and prefetch decision works against `min(total_count, cap_max)`.

/// Default size of the result window the service will paginate through.
pub const CAP_MAX_DEFAULT: u64 = 1000;

fn capped(total_count: u64, cap_max: u64) -> u64 {
    total_count.min(cap_max)
}

/// Number of pages reachable within the capped result window.
pub fn effective_total_pages(total_count: u64, cap_max: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    let pages = capped(total_count, cap_max).div_ceil(u64::from(per_page));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Whether fetching `target_page` could return anything.
///
/// False when no result is known yet (`total_count` is `None`), when the page
/// is below 1, or when its first item lies beyond the capped window.
pub fn can_prefetch(target_page: u32, total_count: Option<u64>, cap_max: u64, per_page: u32) -> bool {
    let Some(total_count) = total_count else {
        return false;
    };
    if target_page < 1 || per_page == 0 {
        return false;
    }
    let first_item = u64::from(target_page - 1) * u64::from(per_page);
    first_item < capped(total_count, cap_max)
}

/// Page numbers to show in a navigation bar.
///
/// Returns `size` consecutive pages centered on `current`, shifted rather than
/// shrunk near either end, or all of `1..=total` when there are fewer pages.
pub fn build_window(current: u32, total: u32, size: u32) -> Vec<u32> {
    if total == 0 || size == 0 {
        return Vec::new();
    }
    if total <= size {
        return (1..=total).collect();
    }

    let current = current.clamp(1, total);
    let mut start = current.saturating_sub(size / 2).max(1);
    let mut end = start + size - 1;
    if end > total {
        end = total;
        start = end - size + 1;
    }

    (start..=end).collect()
}
