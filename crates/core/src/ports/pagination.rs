//! Pagination types for list queries.
//!
//! These types implement Relay-style cursor pagination, commonly used
//! with GraphQL but also applicable to other APIs. Ledger records are
//! append-only, so their insertion sequence number is a stable cursor.

/// Page size when the caller gives none.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page a single query may return.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Opaque cursor for pagination.
///
/// The cursor value is implementation-specific and should be treated
/// as an opaque token by clients.
#[derive(Debug, Clone)]
pub struct Cursor {
    pub value: String,
}

/// Forward pagination parameters (`first`/`after`) for list queries.
///
/// Direction is chosen by the list order, not by the cursor.
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    /// Number of items to fetch.
    pub first: Option<i32>,
    /// Cursor to start after.
    pub after: Option<Cursor>,
}

impl Pagination {
    /// Forward page of `first` items.
    pub fn first(first: i32) -> Self {
        Self {
            first: Some(first),
            ..Default::default()
        }
    }

    /// Requested page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn limit(&self) -> i64 {
        self.first
            .map(i64::from)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Sequence number encoded in the `after` cursor, if it parses.
    pub fn after_seq(&self) -> Option<i64> {
        self.after.as_ref().and_then(|c| c.value.parse().ok())
    }
}

/// Paginated result set with edges and page info.
///
/// This is the Relay connection pattern for cursor-based pagination.
#[derive(Debug, Clone)]
pub struct Connection<T> {
    /// List of edges (node + cursor pairs).
    pub edges: Vec<Edge<T>>,
    /// Information about the current page.
    pub page_info: PageInfo,
    /// Total count of items (optional, expensive to compute).
    pub total_count: Option<i64>,
}

impl<T> Connection<T> {
    /// Build a page from `(sequence, node)` rows fetched with `LIMIT limit + 1`.
    ///
    /// The extra row only signals that another page exists and is dropped.
    pub fn from_rows(rows: Vec<(i64, T)>, limit: i64, after_cursor: bool) -> Self {
        let has_next_page = rows.len() as i64 > limit;
        let edges: Vec<Edge<T>> = rows
            .into_iter()
            .take(limit as usize)
            .map(|(seq, node)| Edge {
                node,
                cursor: Cursor {
                    value: seq.to_string(),
                },
            })
            .collect();

        let page_info = PageInfo {
            has_next_page,
            has_previous_page: after_cursor,
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
        };

        Self {
            edges,
            page_info,
            total_count: None,
        }
    }

    /// Nodes of the page, in order.
    pub fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|e| e.node).collect()
    }
}

/// A single item in a paginated result.
#[derive(Debug, Clone)]
pub struct Edge<T> {
    /// The actual item.
    pub node: T,
    /// Cursor for this item (used for pagination).
    pub cursor: Cursor,
}

/// Information about the current page in a paginated result.
#[derive(Debug, Clone)]
pub struct PageInfo {
    /// Whether there are more items after this page.
    pub has_next_page: bool,
    /// Whether there are items before this page.
    pub has_previous_page: bool,
    /// Cursor of the first item in this page.
    pub start_cursor: Option<Cursor>,
    /// Cursor of the last item in this page.
    pub end_cursor: Option<Cursor>,
}

/// Ordering direction for sorted queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order (smallest first).
    #[default]
    Asc,
    /// Descending order (largest first).
    Desc,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(Pagination::default().limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(Pagination::first(5).limit(), 5);
        assert_eq!(Pagination::first(0).limit(), 1);
        assert_eq!(Pagination::first(10_000).limit(), MAX_PAGE_SIZE);
    }

    // Test critique: la ligne supplémentaire signale une page suivante
    #[test]
    fn connection_from_rows_drops_lookahead_row() {
        let rows = vec![(1, "a"), (2, "b"), (3, "c")];
        let conn = Connection::from_rows(rows, 2, false);
        assert!(conn.page_info.has_next_page);
        assert!(!conn.page_info.has_previous_page);
        assert_eq!(conn.page_info.end_cursor.unwrap().value, "2");
        assert_eq!(conn.edges.len(), 2);

        let conn = Connection::from_rows(vec![(7, "x")], 2, true);
        assert!(!conn.page_info.has_next_page);
        assert!(conn.page_info.has_previous_page);
        assert_eq!(conn.into_nodes(), vec!["x"]);
    }

    #[test]
    fn after_cursor_parses_sequence() {
        let p = Pagination {
            after: Some(Cursor { value: "42".into() }),
            ..Default::default()
        };
        assert_eq!(p.after_seq(), Some(42));
        let p = Pagination {
            after: Some(Cursor { value: "garbage".into() }),
            ..Default::default()
        };
        assert_eq!(p.after_seq(), None);
    }
}
