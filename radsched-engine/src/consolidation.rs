use radsched_core::config::AggregationRule;
use radsched_core::{Order, OrderData};

/// Orders and aggregate duration that will be booked in a single IE request,
/// per the booking-aggregation policy.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingAggregate {
    pub order_ids: Vec<String>,
    pub duration_minutes: i32,
}

const DEFAULT_PROCEDURE_DURATION_MINUTES: i32 = 30;

fn duration_of(order: &Order) -> i32 {
    if !order.procedures.is_empty() {
        let sum: i32 = order
            .procedures
            .iter()
            .filter_map(|p| p.estimated_duration_minutes)
            .sum();
        if sum > 0 {
            return sum;
        }
    }
    order
        .estimated_duration_minutes
        .unwrap_or(DEFAULT_PROCEDURE_DURATION_MINUTES)
}

/// Collect the active order and every queued order that shares modality
/// (and ordering-practice scope, if both sides provide one) into a single
/// booking aggregate. Returns the aggregate plus the
/// pending orders that did NOT fit and remain queued for a later booking
/// round.
///
/// Panics if `order_data.active_order` is `None` — callers only invoke this
/// once a slot has been selected, at which point an active order is a
/// precondition enforced earlier in the state machine.
pub fn aggregate_for_booking(order_data: &OrderData, rule: AggregationRule) -> (BookingAggregate, Vec<Order>) {
    let active = order_data
        .active_order
        .as_ref()
        .expect("booking aggregation requires an active order");

    let mut matched = vec![active.clone()];
    let mut remaining = Vec::new();

    for order in &order_data.pending_orders {
        let modality_matches = order.modality == active.modality;
        let practice_matches = match (&order.ordering_practice, &active.ordering_practice) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        if modality_matches && practice_matches {
            matched.push(order.clone());
        } else {
            remaining.push(order.clone());
        }
    }

    let order_ids = matched.iter().map(|o| o.order_id.clone()).collect();
    let duration_minutes = match rule {
        AggregationRule::Sum => matched.iter().map(duration_of).sum(),
        AggregationRule::Max => matched.iter().map(duration_of).max().unwrap_or(DEFAULT_PROCEDURE_DURATION_MINUTES),
    };

    (BookingAggregate { order_ids, duration_minutes }, remaining)
}
