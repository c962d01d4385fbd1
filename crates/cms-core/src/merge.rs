/*
 * merge.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Merging page data over global defaults.

use crate::value::{GlobalData, PageData};

/// Merge `page` over `global`, producing a new object.
///
/// The merge is shallow: when both define a field, the page's value is used
/// as a whole. Page fields keep their order and global-only fields follow in
/// their own order. Neither input is modified.
pub fn merge_page_data(page: &PageData, global: &GlobalData) -> PageData {
    let mut merged = page.clone();
    for (key, value) in global {
        if !merged.contains_key(key) {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
