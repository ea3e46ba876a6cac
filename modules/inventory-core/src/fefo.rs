//! First-expire-first-out allocation (C4). Pure — no I/O, total function,
//! never raises; partial results are valid.

use crate::model::LotStatus;
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub warehouse_id: Uuid,
    pub quantity: i64,
    pub preferred_locations: Vec<Uuid>,
    pub excluded_lots: Vec<Uuid>,
    pub min_days_to_expiration: i64,
    /// The day allocation is evaluated against, for expiration math.
    pub today: NaiveDate,
}

/// One candidate source: a stock level paired with its optional lot.
#[derive(Debug, Clone)]
pub struct AllocationSource {
    pub stock_level_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub warehouse_id: Uuid,
    pub location_id: Uuid,
    pub available: i64,
    pub lot: Option<SourceLot>,
    /// Tiebreak for otherwise-equal sources.
    pub location_pick_sequence: i32,
}

#[derive(Debug, Clone)]
pub struct SourceLot {
    pub lot_id: Uuid,
    pub status: LotStatus,
    pub expiration_date: Option<NaiveDate>,
    pub received_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationLine {
    pub stock_level_id: Uuid,
    pub location_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAvailable,
    LotNotPickable,
    LotExpiresTooSoon,
    LotExcluded,
}

#[derive(Debug, Clone)]
pub struct SkippedSource {
    pub stock_level_id: Uuid,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct FefoResult {
    pub lines: Vec<AllocationLine>,
    pub skipped: Vec<SkippedSource>,
    pub shortfall_quantity: i64,
    pub fully_allocated: bool,
}

/// Allocate `request.quantity` across `sources` in FEFO order.
pub fn allocate(request: &AllocationRequest, sources: &[AllocationSource]) -> FefoResult {
    let excluded: HashSet<Uuid> = request.excluded_lots.iter().copied().collect();
    let preferred: HashSet<Uuid> = request.preferred_locations.iter().copied().collect();

    let mut candidates: Vec<&AllocationSource> = sources
        .iter()
        .filter(|s| {
            s.product_id == request.product_id
                && s.warehouse_id == request.warehouse_id
                && (request.variant_id.is_none() || s.variant_id == request.variant_id)
        })
        .collect();

    candidates.sort_by(|a, b| compare_sources(a, b, &preferred));

    let mut remaining = request.quantity;
    let mut lines = Vec::new();
    let mut skipped = Vec::new();

    for source in candidates {
        if remaining <= 0 {
            break;
        }

        if let Some(reason) = skip_reason(source, request, &excluded) {
            skipped.push(SkippedSource {
                stock_level_id: source.stock_level_id,
                reason,
            });
            continue;
        }

        let take = remaining.min(source.available);
        if take <= 0 {
            continue;
        }

        lines.push(AllocationLine {
            stock_level_id: source.stock_level_id,
            location_id: source.location_id,
            lot_id: source.lot.as_ref().map(|l| l.lot_id),
            quantity: take,
        });
        remaining -= take;
    }

    FefoResult {
        lines,
        skipped,
        shortfall_quantity: remaining.max(0),
        fully_allocated: remaining == 0,
    }
}

fn skip_reason(
    source: &AllocationSource,
    request: &AllocationRequest,
    excluded: &HashSet<Uuid>,
) -> Option<SkipReason> {
    if source.available <= 0 {
        return Some(SkipReason::NotAvailable);
    }

    if let Some(lot) = &source.lot {
        if !lot.status.is_pickable_status() {
            return Some(SkipReason::LotNotPickable);
        }
        if let Some(expiration) = lot.expiration_date {
            let days_to_expiration = (expiration - request.today).num_days();
            if days_to_expiration < request.min_days_to_expiration {
                return Some(SkipReason::LotExpiresTooSoon);
            }
        }
        if excluded.contains(&lot.lot_id) {
            return Some(SkipReason::LotExcluded);
        }
    }

    None
}

/// Stable ordering: preferred-location sources first, then FEFO
/// (earlier expiration first; no-expiration sorts after dated lots;
/// neither dated falls back to received-date FIFO), then lotless sources
/// last, with location pick-sequence as the final tiebreak.
fn compare_sources(
    a: &AllocationSource,
    b: &AllocationSource,
    preferred: &HashSet<Uuid>,
) -> Ordering {
    let a_preferred = preferred.contains(&a.location_id);
    let b_preferred = preferred.contains(&b.location_id);
    if a_preferred != b_preferred {
        return if a_preferred { Ordering::Less } else { Ordering::Greater };
    }

    match (&a.lot, &b.lot) {
        (Some(lot_a), Some(lot_b)) => {
            fefo_order(lot_a, lot_b).then_with(|| a.location_pick_sequence.cmp(&b.location_pick_sequence))
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.location_pick_sequence.cmp(&b.location_pick_sequence),
    }
}

fn fefo_order(a: &SourceLot, b: &SourceLot) -> Ordering {
    match (a.expiration_date, b.expiration_date) {
        (Some(exp_a), Some(exp_b)) => exp_a.cmp(&exp_b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.received_date.cmp(&b.received_date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lot(lot_id: Uuid, expiration: Option<NaiveDate>) -> SourceLot {
        SourceLot {
            lot_id,
            status: LotStatus::Available,
            expiration_date: expiration,
            received_date: date(2024, 1, 1),
        }
    }

    fn base_request(product_id: Uuid, warehouse_id: Uuid, quantity: i64) -> AllocationRequest {
        AllocationRequest {
            product_id,
            variant_id: None,
            warehouse_id,
            quantity,
            preferred_locations: vec![],
            excluded_lots: vec![],
            min_days_to_expiration: 0,
            today: date(2026, 1, 1),
        }
    }

    /// S2 from the end-to-end scenario catalog: lot L1 (exp 2030, qty 5)
    /// and L2 (exp 2029, qty 5), request 7 — L2 fully consumed, L1
    /// partially.
    #[test]
    fn fefo_consumes_earlier_expiration_first_and_splits_remainder() {
        let product_id = Uuid::new_v4();
        let warehouse_id = Uuid::new_v4();
        let l1 = Uuid::new_v4();
        let l2 = Uuid::new_v4();

        let sources = vec![
            AllocationSource {
                stock_level_id: Uuid::new_v4(),
                product_id,
                variant_id: None,
                warehouse_id,
                location_id: Uuid::new_v4(),
                available: 5,
                lot: Some(lot(l1, Some(date(2030, 1, 1)))),
                location_pick_sequence: 1,
            },
            AllocationSource {
                stock_level_id: Uuid::new_v4(),
                product_id,
                variant_id: None,
                warehouse_id,
                location_id: Uuid::new_v4(),
                available: 5,
                lot: Some(lot(l2, Some(date(2029, 1, 1)))),
                location_pick_sequence: 2,
            },
        ];

        let result = allocate(&base_request(product_id, warehouse_id, 7), &sources);

        assert!(result.fully_allocated);
        assert_eq!(result.shortfall_quantity, 0);
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0].lot_id, Some(l2));
        assert_eq!(result.lines[0].quantity, 5);
        assert_eq!(result.lines[1].lot_id, Some(l1));
        assert_eq!(result.lines[1].quantity, 2);
    }

    #[test]
    fn excluded_lot_is_skipped_with_reason() {
        let product_id = Uuid::new_v4();
        let warehouse_id = Uuid::new_v4();
        let excluded_lot = Uuid::new_v4();

        let sources = vec![AllocationSource {
            stock_level_id: Uuid::new_v4(),
            product_id,
            variant_id: None,
            warehouse_id,
            location_id: Uuid::new_v4(),
            available: 10,
            lot: Some(lot(excluded_lot, None)),
            location_pick_sequence: 1,
        }];

        let mut request = base_request(product_id, warehouse_id, 5);
        request.excluded_lots = vec![excluded_lot];

        let result = allocate(&request, &sources);
        assert!(result.lines.is_empty());
        assert_eq!(result.shortfall_quantity, 5);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, SkipReason::LotExcluded);
    }

    #[test]
    fn partial_shortfall_when_demand_exceeds_supply() {
        let product_id = Uuid::new_v4();
        let warehouse_id = Uuid::new_v4();

        let sources = vec![AllocationSource {
            stock_level_id: Uuid::new_v4(),
            product_id,
            variant_id: None,
            warehouse_id,
            location_id: Uuid::new_v4(),
            available: 3,
            lot: None,
            location_pick_sequence: 1,
        }];

        let result = allocate(&base_request(product_id, warehouse_id, 10), &sources);
        assert!(!result.fully_allocated);
        assert_eq!(result.shortfall_quantity, 7);
        assert_eq!(result.lines[0].quantity, 3);
    }

    #[test]
    fn lotted_sources_are_consumed_before_lotless_sources() {
        let product_id = Uuid::new_v4();
        let warehouse_id = Uuid::new_v4();
        let lotted = Uuid::new_v4();

        let sources = vec![
            AllocationSource {
                stock_level_id: Uuid::new_v4(),
                product_id,
                variant_id: None,
                warehouse_id,
                location_id: Uuid::new_v4(),
                available: 5,
                lot: None,
                location_pick_sequence: 1,
            },
            AllocationSource {
                stock_level_id: Uuid::new_v4(),
                product_id,
                variant_id: None,
                warehouse_id,
                location_id: Uuid::new_v4(),
                available: 5,
                lot: Some(lot(lotted, Some(date(2030, 1, 1)))),
                location_pick_sequence: 2,
            },
        ];

        let result = allocate(&base_request(product_id, warehouse_id, 5), &sources);
        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.lines[0].lot_id, Some(lotted));
    }

    proptest::proptest! {
        /// However the available quantities are split across sources,
        /// allocated + shortfall always reconciles to the requested amount,
        /// and no line ever allocates more than its source had available.
        #[test]
        fn allocated_plus_shortfall_always_equals_requested(
            quantities in proptest::collection::vec(0i64..50, 1..6),
            requested in 0i64..200,
        ) {
            let product_id = Uuid::new_v4();
            let warehouse_id = Uuid::new_v4();

            let sources: Vec<AllocationSource> = quantities
                .iter()
                .enumerate()
                .map(|(i, qty)| AllocationSource {
                    stock_level_id: Uuid::new_v4(),
                    product_id,
                    variant_id: None,
                    warehouse_id,
                    location_id: Uuid::new_v4(),
                    available: *qty,
                    lot: None,
                    location_pick_sequence: i as i32,
                })
                .collect();

            let result = allocate(&base_request(product_id, warehouse_id, requested), &sources);

            let allocated: i64 = result.lines.iter().map(|l| l.quantity).sum();
            prop_assert_eq!(allocated + result.shortfall_quantity, requested);
            prop_assert_eq!(result.fully_allocated, result.shortfall_quantity == 0);

            let available_by_source: std::collections::HashMap<Uuid, i64> = sources
                .iter()
                .map(|s| (s.stock_level_id, s.available))
                .collect();
            for line in &result.lines {
                prop_assert!(line.quantity <= available_by_source[&line.stock_level_id]);
            }
        }
    }
}
