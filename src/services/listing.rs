use crate::models::qr_record::{QrRecord, QrState};
use crate::services::api_client::{ApiError, QrApiClient};
use crate::services::card_renderer::{CardView, DateFormatter};

/// Per-state counts over one fetched page. These are page-local on purpose:
/// they describe what is on screen, not the whole collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QrStats {
    pub valid: usize,
    pub used: usize,
    pub expired: usize,
    pub invalidated: usize,
    pub other: usize,
    pub total: usize,
}

impl QrStats {
    pub fn from_records(records: &[QrRecord]) -> Self {
        let mut stats = QrStats {
            total: records.len(),
            ..Default::default()
        };

        for record in records {
            match record.known_state() {
                Some(QrState::Valid) => stats.valid += 1,
                Some(QrState::Used) => stats.used += 1,
                Some(QrState::Expired) => stats.expired += 1,
                Some(QrState::Invalidated) => stats.invalidated += 1,
                None => {
                    tracing::warn!(
                        qrcode_id = %record.qrcode_id,
                        state = %record.state,
                        "Unknown QR state"
                    );
                    stats.other += 1;
                }
            }
        }

        stats
    }

    pub fn count(&self, state: QrState) -> usize {
        match state {
            QrState::Valid => self.valid,
            QrState::Used => self.used,
            QrState::Expired => self.expired,
            QrState::Invalidated => self.invalidated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl Pagination {
    /// `page` and `page_size` are clamped to at least 1; there is always at
    /// least one page, even when empty.
    pub fn new(page: u32, page_size: u32, total_items: u64) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total_items.div_ceil(u64::from(page_size)).max(1);

        Self {
            page: page.max(1),
            page_size,
            total_items,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }

    /// Used when the backend does not report a total: everything up to this
    /// page is known, and a full page means another one may follow.
    pub fn estimated(page: u32, page_size: u32, page_len: usize) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let seen = skip_for(page, page_size) + page_len as u64;

        let mut pagination = Self::new(page, page_size, seen);
        if page_len as u64 >= u64::from(page_size) {
            pagination.total_pages = pagination.total_pages.max(page.saturating_add(1));
        }
        pagination
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn previous_page(&self) -> u32 {
        self.page.saturating_sub(1).max(1)
    }

    pub fn next_page(&self) -> u32 {
        self.page.saturating_add(1).min(self.total_pages)
    }

    pub fn skip(&self) -> u64 {
        skip_for(self.page, self.page_size)
    }
}

fn skip_for(page: u32, page_size: u32) -> u64 {
    u64::from(page.max(1) - 1) * u64::from(page_size)
}

/// Everything the list tab shows for one page.
#[derive(Debug, Clone)]
pub struct ListingView {
    pub stats: QrStats,
    pub pagination: Pagination,
    pub cards: Vec<CardView>,
}

/// Fetches page `page` and derives stats, pagination and card views from it.
#[tracing::instrument(skip(client, dates))]
pub async fn load_page(
    client: &QrApiClient,
    page: u32,
    page_size: u32,
    dates: &DateFormatter,
) -> Result<ListingView, ApiError> {
    let page = page.max(1);
    let page_size = page_size.max(1);

    let fetched = client.list_qr(skip_for(page, page_size), page_size).await?;

    let stats = QrStats::from_records(&fetched.records);
    let pagination = match fetched.total {
        Some(total) => Pagination::new(page, page_size, total),
        None => Pagination::estimated(page, page_size, fetched.records.len()),
    };

    let cards = fetched
        .records
        .iter()
        .map(|record| CardView::from_record(record, dates))
        .collect();

    tracing::debug!(
        records = stats.total,
        total_pages = pagination.total_pages,
        "Listing page loaded"
    );

    Ok(ListingView {
        stats,
        pagination,
        cards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, state: &str) -> QrRecord {
        QrRecord {
            qrcode_id: id.to_string(),
            new_value: 1.0,
            old_value: 0.0,
            state: state.to_string(),
            creation_date: "2024-01-01T00:00:00".to_string(),
            used_date: None,
            qr_image: None,
        }
    }

    #[test]
    fn test_stats_match_page() {
        let records = vec![
            record("a", "valido"),
            record("b", "valido"),
            record("c", "usado"),
            record("d", "expirado"),
            record("e", "invalidado"),
            record("f", "valido"),
            record("g", "desconocido"),
        ];

        let stats = QrStats::from_records(&records);

        assert_eq!(stats.total, records.len());
        assert_eq!(stats.valid, 3);
        assert_eq!(stats.used, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.invalidated, 1);
        assert_eq!(stats.other, 1);
        assert_eq!(
            stats.valid + stats.used + stats.expired + stats.invalidated + stats.other,
            stats.total
        );
        for state in QrState::ALL {
            let expected = records
                .iter()
                .filter(|r| r.known_state() == Some(state))
                .count();
            assert_eq!(stats.count(state), expected);
        }
    }

    #[test]
    fn test_stats_empty_page() {
        assert_eq!(QrStats::from_records(&[]), QrStats::default());
    }

    #[test]
    fn test_pagination_bounds() {
        let first = Pagination::new(1, 200, 450);
        assert_eq!(first.total_pages, 3);
        assert!(!first.has_previous());
        assert!(first.has_next());

        let last = Pagination::new(3, 200, 450);
        assert!(last.has_previous());
        assert!(!last.has_next());
        assert_eq!(last.skip(), 400);
    }

    #[test]
    fn test_pagination_empty_has_single_page() {
        let empty = Pagination::new(1, 200, 0);
        assert_eq!(empty.total_pages, 1);
        assert!(!empty.has_previous());
        assert!(!empty.has_next());
    }

    #[test]
    fn test_estimated_pagination() {
        // Full page: a next page may exist.
        let full = Pagination::estimated(2, 10, 10);
        assert_eq!(full.total_items, 20);
        assert_eq!(full.total_pages, 3);
        assert!(full.has_next());

        // Short page: this is the last one.
        let short = Pagination::estimated(2, 10, 4);
        assert_eq!(short.total_items, 14);
        assert_eq!(short.total_pages, 2);
        assert!(!short.has_next());
    }
}
