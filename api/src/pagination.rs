//! Cursor-based pagination for list endpoints.
//!
//! The cursor is an opaque base64-encoded offset; a response without a
//! `next_cursor` is the last page.

use serde::{Deserialize, Serialize};

/// Default page size when `limit` is not specified.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Maximum allowed page size.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Query parameters accepted by list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    /// Opaque cursor from a previous response.
    pub cursor: Option<String>,
    /// Items per page (default 50, max 500).
    pub limit: Option<u32>,
}

impl PageQuery {
    /// Effective page size, clamped to `[1, MAX_PAGE_SIZE]`.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Offset encoded in the cursor; 0 when absent or unreadable.
    pub fn offset(&self) -> usize {
        self.cursor
            .as_deref()
            .and_then(decode_cursor)
            .unwrap_or(0) as usize
    }
}

/// One page of items plus the cursor for the next one.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Slice `items` according to `query`. The full item list is cheap at this
/// scale (a bounded recency cache), so pagination is a plain window over it.
pub fn paginate<T>(items: Vec<T>, query: &PageQuery) -> Page<T> {
    let offset = query.offset();
    let limit = query.effective_limit() as usize;
    let total = items.len();

    let items: Vec<T> = items.into_iter().skip(offset).take(limit).collect();
    let consumed = offset + items.len();
    let next_cursor = (items.len() == limit && consumed < total)
        .then(|| encode_cursor(consumed as u64));

    Page { items, next_cursor }
}

/// Encode a numeric offset into an opaque cursor string.
pub fn encode_cursor(offset: u64) -> String {
    base64_encode(offset.to_string().as_bytes())
}

/// Decode a cursor string back to a numeric offset.
pub fn decode_cursor(cursor: &str) -> Option<u64> {
    let bytes = base64_decode(cursor)?;
    std::str::from_utf8(&bytes).ok()?.parse::<u64>().ok()
}

// Minimal base64 helpers (no extra dependency needed).

fn base64_encode(data: &[u8]) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::new();
    for chunk in data.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;
        out.push(CHARS[((triple >> 18) & 0x3F) as usize] as char);
        out.push(CHARS[((triple >> 12) & 0x3F) as usize] as char);
        if chunk.len() > 1 {
            out.push(CHARS[((triple >> 6) & 0x3F) as usize] as char);
        } else {
            out.push('=');
        }
        if chunk.len() > 2 {
            out.push(CHARS[(triple & 0x3F) as usize] as char);
        } else {
            out.push('=');
        }
    }
    out
}

fn base64_decode(input: &str) -> Option<Vec<u8>> {
    fn val(c: u8) -> Option<u32> {
        match c {
            b'A'..=b'Z' => Some((c - b'A') as u32),
            b'a'..=b'z' => Some((c - b'a' + 26) as u32),
            b'0'..=b'9' => Some((c - b'0' + 52) as u32),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }
    let bytes: Vec<u8> = input.bytes().filter(|&b| b != b'=').collect();
    let mut out = Vec::new();
    for chunk in bytes.chunks(4) {
        let mut accum: u32 = 0;
        let mut bits = 0;
        for &b in chunk {
            accum = (accum << 6) | val(b)?;
            bits += 6;
        }
        // shift left so the meaningful bits sit at the top of a 24-bit window
        accum <<= 24 - bits;
        out.push((accum >> 16) as u8);
        if chunk.len() > 2 {
            out.push((accum >> 8) as u8);
        }
        if chunk.len() > 3 {
            out.push(accum as u8);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_roundtrip() {
        for offset in [0u64, 1, 42, 100, 999, 123456789] {
            let encoded = encode_cursor(offset);
            assert_eq!(decode_cursor(&encoded), Some(offset), "offset {offset}");
        }
    }

    #[test]
    fn garbage_cursor_reads_as_start() {
        let query = PageQuery {
            cursor: Some("!!not-base64!!".to_string()),
            limit: None,
        };
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn limit_is_clamped() {
        let query = PageQuery {
            cursor: None,
            limit: Some(5000),
        };
        assert_eq!(query.effective_limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn full_page_yields_next_cursor() {
        let page = paginate(
            (0..10).collect::<Vec<_>>(),
            &PageQuery {
                cursor: None,
                limit: Some(4),
            },
        );
        assert_eq!(page.items, vec![0, 1, 2, 3]);
        let next = page.next_cursor.expect("next cursor");
        assert_eq!(decode_cursor(&next), Some(4));
    }

    #[test]
    fn last_page_has_no_cursor() {
        let query = PageQuery {
            cursor: Some(encode_cursor(8)),
            limit: Some(4),
        };
        let page = paginate((0..10).collect::<Vec<_>>(), &query);
        assert_eq!(page.items, vec![8, 9]);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn exact_boundary_has_no_dangling_cursor() {
        let query = PageQuery {
            cursor: Some(encode_cursor(6)),
            limit: Some(4),
        };
        let page = paginate((0..10).collect::<Vec<_>>(), &query);
        assert_eq!(page.items, vec![6, 7, 8, 9]);
        assert!(page.next_cursor.is_none());
    }
}
