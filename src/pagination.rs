use std::collections::HashMap;

/// `X-Pagination` header payload, serialized verbatim alongside a sliced
/// response body.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaginationInfo {
    pub limit: usize,
    pub offset: usize,
    pub total: usize,
}

/// Applies `limit`/`offset` query params to an in-memory sequence.
///
/// - `limit` absent: the sequence is returned untouched and no header is
///   attached.
/// - `limit` present and a non-negative integer: slices
///   `items[offset..offset+limit]` (offset defaults to 0), clamping an
///   out-of-range slice to empty, and attaches a header reporting the
///   pre-slice length as `total`.
///
/// Non-integer or negative `limit`/`offset` values are treated the same as
/// an absent `limit` — callers are expected to have already dropped
/// unparseable query params before calling this (see [`parse_query_usize`]).
pub fn paginate<T: Clone>(
    items: &[T],
    limit: Option<usize>,
    offset: Option<usize>,
) -> (Vec<T>, Option<PaginationInfo>) {
    let Some(limit) = limit else {
        return (items.to_vec(), None);
    };
    let offset = offset.unwrap_or(0);
    let total = items.len();

    let sliced = if offset >= total {
        Vec::new()
    } else {
        let end = offset.saturating_add(limit).min(total);
        items[offset..end].to_vec()
    };

    (sliced, Some(PaginationInfo { limit, offset, total }))
}

/// Parses a query parameter as a non-negative integer, per the pipeline's
/// "unknown/non-integer params are treated as absent" rule used both here
/// and for `/health`'s `consumers`/`messages` bounds.
pub fn parse_query_usize(params: &HashMap<String, String>, key: &str) -> Option<usize> {
    params.get(key).and_then(|v| v.parse::<usize>().ok())
}

pub fn parse_query_i64(params: &HashMap<String, String>, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.parse::<i64>().ok())
}
