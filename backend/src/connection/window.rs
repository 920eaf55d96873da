//! Page window planning shared by storage backends
//!
//! Backends fetch one row more than requested to learn whether another page
//! exists. `last` pages are fetched in reversed sort order and flipped back.

use super::args::OrderBy;
use crate::storage::{FindArgs, Row, StoragePage, StoragePageInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Rows requested; `None` is unbounded
    pub limit: Option<i64>,
    /// Rows skipped from the start of the (possibly reversed) ordering
    pub offset: i64,
    /// `last` pagination: read from the end of the ordering
    pub backward: bool,
}

impl PageWindow {
    pub fn from_args(args: &FindArgs) -> Self {
        let offset = args.offset.unwrap_or(0).max(0);
        match (args.first, args.last) {
            (Some(first), _) => Self {
                limit: Some(first.max(0)),
                offset,
                backward: false,
            },
            (None, Some(last)) => Self {
                limit: Some(last.max(0)),
                offset,
                backward: true,
            },
            (None, None) => Self {
                limit: None,
                offset,
                backward: false,
            },
        }
    }

    /// Rows to fetch: one more than the limit
    pub fn fetch_limit(&self) -> Option<i64> {
        self.limit.map(|limit| limit.saturating_add(1))
    }

    /// Sort order to read with; reversed for backward windows
    pub fn order_for(&self, order_by: &[OrderBy]) -> Vec<OrderBy> {
        order_by
            .iter()
            .map(|order| {
                let direction = if self.backward {
                    order.direction.reverse()
                } else {
                    order.direction
                };
                OrderBy::new(order.attribute.clone(), direction)
            })
            .collect()
    }

    /// Trim the look-ahead row, restore requested order and compute page flags.
    ///
    /// `rows` must have been read with [`PageWindow::order_for`] and
    /// [`PageWindow::fetch_limit`].
    pub fn finish(&self, mut rows: Vec<Row>, has_after: bool, has_before: bool) -> StoragePage {
        let overflow = match self.limit {
            Some(limit) if rows.len() as i64 > limit => {
                rows.truncate(limit as usize);
                true
            }
            _ => false,
        };

        let skipped = self.offset > 0;
        let page_info = if self.backward {
            rows.reverse();
            StoragePageInfo {
                has_previous_page: overflow,
                has_next_page: has_before || skipped,
            }
        } else {
            StoragePageInfo {
                has_previous_page: has_after || skipped,
                has_next_page: overflow,
            }
        };

        StoragePage { rows, page_info }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::connection::SortDirection;

    fn rows(ids: &[i64]) -> Vec<Row> {
        ids.iter()
            .map(|id| json!({ "id": id }).as_object().cloned().unwrap())
            .collect()
    }

    fn ids(page: &StoragePage) -> Vec<i64> {
        page.rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_forward_window_detects_next_page() {
        let args = FindArgs {
            first: Some(2),
            ..Default::default()
        };
        let window = PageWindow::from_args(&args);
        assert_eq!(window.fetch_limit(), Some(3));

        let page = window.finish(rows(&[1, 2, 3]), false, false);
        assert_eq!(ids(&page), vec![1, 2]);
        assert!(page.page_info.has_next_page);
        assert!(!page.page_info.has_previous_page);

        let page = window.finish(rows(&[1, 2]), true, false);
        assert!(!page.page_info.has_next_page);
        assert!(page.page_info.has_previous_page);
    }

    #[test]
    fn test_backward_window_reverses() {
        let args = FindArgs {
            last: Some(2),
            order_by: vec![OrderBy::asc("id")],
            ..Default::default()
        };
        let window = PageWindow::from_args(&args);
        assert_eq!(window.order_for(&args.order_by), vec![OrderBy::new("id", SortDirection::Desc)]);

        // read in reversed order: 5, 4, 3
        let page = window.finish(rows(&[5, 4, 3]), false, false);
        assert_eq!(ids(&page), vec![4, 5]);
        assert!(page.page_info.has_previous_page);
        assert!(!page.page_info.has_next_page);
    }

    #[test]
    fn test_fetch_limit_saturates() {
        let window = PageWindow::from_args(&FindArgs {
            first: Some(i64::MAX),
            ..Default::default()
        });
        assert_eq!(window.fetch_limit(), Some(i64::MAX));

        let page = window.finish(rows(&[1, 2]), false, false);
        assert_eq!(ids(&page), vec![1, 2]);
        assert!(!page.page_info.has_next_page);
    }

    #[test]
    fn test_unbounded_window() {
        let window = PageWindow::from_args(&FindArgs {
            offset: Some(1),
            ..Default::default()
        });
        assert_eq!(window.fetch_limit(), None);

        let page = window.finish(rows(&[2, 3]), false, false);
        assert_eq!(ids(&page), vec![2, 3]);
        assert!(page.page_info.has_previous_page);
        assert!(!page.page_info.has_next_page);
    }
}
