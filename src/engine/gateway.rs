use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::payload::OrderPayload;
use crate::observability::metrics::Metrics;

/// A named set of live sessions sharing interest in some order events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Group {
    /// Partners waiting for work: `orders_unassigned`.
    Unassigned,
    /// General audience: `orders`.
    AllOrders,
    /// One customer: `user_<phone>`.
    Customer(String),
}

impl Group {
    pub fn customer(phone: &str) -> Self {
        Group::Customer(phone.to_string())
    }

    /// Low-cardinality label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Group::Unassigned => "orders_unassigned",
            Group::AllOrders => "orders",
            Group::Customer(_) => "user",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Unassigned => f.write_str("orders_unassigned"),
            Group::AllOrders => f.write_str("orders"),
            Group::Customer(phone) => write!(f, "user_{phone}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum OrderEvent {
    OrderCreated(Arc<OrderPayload>),
    OrderUpdated(Arc<OrderPayload>),
}

impl OrderEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "order_created",
            OrderEvent::OrderUpdated(_) => "order_updated",
        }
    }
}

/// Process-wide group membership. Built once at startup and shared by the
/// lifecycle functions and every websocket session.
pub struct BroadcastGateway {
    groups: DashMap<Group, HashMap<Uuid, mpsc::Sender<OrderEvent>>>,
    session_buffer: usize,
    metrics: Metrics,
}

impl BroadcastGateway {
    pub fn new(session_buffer: usize, metrics: Metrics) -> Self {
        Self {
            groups: DashMap::new(),
            session_buffer: session_buffer.max(1),
            metrics,
        }
    }

    /// Capacity of the outbound queue each session should be created with.
    pub fn session_buffer(&self) -> usize {
        self.session_buffer
    }

    pub fn join(&self, group: &Group, session_id: Uuid, sender: mpsc::Sender<OrderEvent>) {
        self.groups
            .entry(group.clone())
            .or_default()
            .entry(session_id)
            .or_insert(sender);
        debug!(group = %group, session_id = %session_id, "session joined group");
    }

    pub fn leave(&self, group: &Group, session_id: Uuid) {
        if let Some(mut members) = self.groups.get_mut(group) {
            members.remove(&session_id);
        }
        self.groups.remove_if(group, |_, members| members.is_empty());
        debug!(group = %group, session_id = %session_id, "session left group");
    }

    pub fn member_count(&self, group: &Group) -> usize {
        self.groups.get(group).map(|members| members.len()).unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.groups.iter().map(|entry| entry.value().len()).sum()
    }

    /// Hands `event` to every session in `group` at call time and returns how
    /// many accepted it. Sessions that are gone or backed up are skipped.
    pub fn publish(&self, group: &Group, event: OrderEvent) -> usize {
        let members: Vec<(Uuid, mpsc::Sender<OrderEvent>)> = match self.groups.get(group) {
            Some(members) => members
                .iter()
                .map(|(id, sender)| (*id, sender.clone()))
                .collect(),
            None => Vec::new(),
        };

        let mut delivered = 0;
        for (session_id, sender) in members {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        group = %group,
                        session_id = %session_id,
                        event = event.kind(),
                        "session buffer full; dropping event"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(group = %group, session_id = %session_id, "skipping closed session");
                }
            }
        }

        self.metrics
            .broadcast_deliveries_total
            .with_label_values(&[group.kind()])
            .inc_by(delivered as u64);
        debug!(group = %group, event = event.kind(), delivered, "event published");

        delivered
    }
}
