use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{RwLock, RwLockWriteGuard};
use uuid::Uuid;

use crate::models::history::{DeliveryHistory, HistoryOutcome};
use crate::models::order::Order;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} already exists")]
    DuplicateOrder(Uuid),

    #[error("order {order_id} already has a {outcome:?} history record")]
    DuplicateHistory {
        order_id: Uuid,
        outcome: HistoryOutcome,
    },
}

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    history: Vec<DeliveryHistory>,
}

impl Tables {
    fn has_history(&self, order_id: Uuid, outcome: HistoryOutcome) -> bool {
        self.history
            .iter()
            .any(|record| record.order_id == order_id && record.outcome == outcome)
    }
}

/// Orders, their items and delivery history behind a single lock.
///
/// Writers go through [`Transaction`], which stages every change and applies
/// them together on [`Transaction::commit`]. Dropping a transaction without
/// committing discards the staged changes.
#[derive(Default)]
pub struct OrderStore {
    tables: RwLock<Tables>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin(&self) -> Transaction<'_> {
        Transaction {
            tables: self.tables.write().await,
            staged_orders: HashMap::new(),
            staged_history: Vec::new(),
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Order> {
        self.tables.read().await.orders.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Orders matching `filter`, newest first.
    pub async fn orders_where<F>(&self, filter: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|order| filter(order))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        orders
    }

    pub async fn history_for_order(&self, order_id: Uuid) -> Vec<DeliveryHistory> {
        self.tables
            .read()
            .await
            .history
            .iter()
            .filter(|record| record.order_id == order_id)
            .cloned()
            .collect()
    }

    /// History records handled by one partner joined with their orders,
    /// most recent completion first.
    pub async fn history_for_partner(&self, partner_phone: &str) -> Vec<(DeliveryHistory, Order)> {
        let tables = self.tables.read().await;
        let mut rows: Vec<(DeliveryHistory, Order)> = tables
            .history
            .iter()
            .filter(|record| record.partner_phone.as_deref() == Some(partner_phone))
            .filter_map(|record| {
                tables
                    .orders
                    .get(&record.order_id)
                    .map(|order| (record.clone(), order.clone()))
            })
            .collect();
        rows.sort_by(|a, b| b.0.completed_at.cmp(&a.0.completed_at));
        rows
    }
}

/// Exclusive write access to the store. Reads see staged changes first.
pub struct Transaction<'a> {
    tables: RwLockWriteGuard<'a, Tables>,
    staged_orders: HashMap<Uuid, Order>,
    staged_history: Vec<DeliveryHistory>,
}

impl Transaction<'_> {
    pub fn order(&self, id: Uuid) -> Option<&Order> {
        self.staged_orders
            .get(&id)
            .or_else(|| self.tables.orders.get(&id))
    }

    pub fn insert_order(&mut self, order: Order) -> Result<(), StoreError> {
        if self.order(order.id).is_some() {
            return Err(StoreError::DuplicateOrder(order.id));
        }
        self.staged_orders.insert(order.id, order);
        Ok(())
    }

    pub fn update_order(&mut self, order: Order) {
        self.staged_orders.insert(order.id, order);
    }

    pub fn has_history(&self, order_id: Uuid, outcome: HistoryOutcome) -> bool {
        self.tables.has_history(order_id, outcome)
            || self
                .staged_history
                .iter()
                .any(|record| record.order_id == order_id && record.outcome == outcome)
    }

    pub fn record_history(&mut self, record: DeliveryHistory) -> Result<(), StoreError> {
        if self.has_history(record.order_id, record.outcome) {
            return Err(StoreError::DuplicateHistory {
                order_id: record.order_id,
                outcome: record.outcome,
            });
        }
        self.staged_history.push(record);
        Ok(())
    }

    pub fn commit(self) {
        let Transaction {
            mut tables,
            staged_orders,
            staged_history,
        } = self;
        tables.orders.extend(staged_orders);
        tables.history.extend(staged_history);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::{OrderStore, StoreError};
    use crate::models::history::{DeliveryHistory, HistoryOutcome};
    use crate::models::order::{Order, OrderStatus};

    fn order(placed_minutes_ago: i64) -> Order {
        Order {
            id: Uuid::new_v4(),
            customer_phone: "9876543210".to_string(),
            placed_at: Utc::now() - Duration::minutes(placed_minutes_ago),
            assigned_at: None,
            out_for_delivery_at: None,
            delivery_time: None,
            total_amount: dec!(100.00),
            status: OrderStatus::Placed,
            delivery_address: "12 MG Road".to_string(),
            assigned_to: None,
            items: Vec::new(),
        }
    }

    fn history(order_id: Uuid, outcome: HistoryOutcome) -> DeliveryHistory {
        DeliveryHistory {
            id: Uuid::new_v4(),
            order_id,
            partner_phone: Some("9123456789".to_string()),
            completed_at: Utc::now(),
            earnings: dec!(0),
            outcome,
        }
    }

    #[tokio::test]
    async fn committed_changes_are_visible() {
        let store = OrderStore::new();
        let placed = order(0);
        let id = placed.id;

        let mut tx = store.begin().await;
        tx.insert_order(placed).unwrap();
        tx.record_history(history(id, HistoryOutcome::Completed)).unwrap();
        tx.commit();

        assert!(store.get(id).await.is_some());
        assert_eq!(store.history_for_order(id).await.len(), 1);
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_store_unchanged() {
        let store = OrderStore::new();
        let placed = order(0);
        let id = placed.id;

        let mut tx = store.begin().await;
        tx.insert_order(placed.clone()).unwrap();
        tx.commit();

        {
            let mut tx = store.begin().await;
            let mut updated = placed.clone();
            updated.status = OrderStatus::Delivered;
            tx.update_order(updated);
            tx.record_history(history(id, HistoryOutcome::Completed)).unwrap();
            assert_eq!(tx.order(id).unwrap().status, OrderStatus::Delivered);
        }

        assert_eq!(store.get(id).await.unwrap().status, OrderStatus::Placed);
        assert!(store.history_for_order(id).await.is_empty());
    }

    #[tokio::test]
    async fn history_is_unique_per_outcome() {
        let store = OrderStore::new();
        let id = Uuid::new_v4();

        let mut tx = store.begin().await;
        tx.record_history(history(id, HistoryOutcome::Completed)).unwrap();
        tx.record_history(history(id, HistoryOutcome::Cancelled)).unwrap();
        let err = tx
            .record_history(history(id, HistoryOutcome::Completed))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateHistory { .. }));
    }

    #[tokio::test]
    async fn duplicate_order_insert_is_rejected() {
        let store = OrderStore::new();
        let placed = order(0);

        let mut tx = store.begin().await;
        tx.insert_order(placed.clone()).unwrap();
        assert!(matches!(
            tx.insert_order(placed),
            Err(StoreError::DuplicateOrder(_))
        ));
    }

    #[tokio::test]
    async fn orders_where_returns_newest_first() {
        let store = OrderStore::new();
        let older = order(30);
        let newer = order(5);

        let mut tx = store.begin().await;
        tx.insert_order(older.clone()).unwrap();
        tx.insert_order(newer.clone()).unwrap();
        tx.commit();

        let ids: Vec<Uuid> = store
            .orders_where(|_| true)
            .await
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn partner_history_joins_orders() {
        let store = OrderStore::new();
        let placed = order(0);
        let id = placed.id;

        let mut tx = store.begin().await;
        tx.insert_order(placed).unwrap();
        tx.record_history(history(id, HistoryOutcome::Cancelled)).unwrap();
        tx.commit();

        let rows = store.history_for_partner("9123456789").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.id, id);
        assert!(store.history_for_partner("9000000000").await.is_empty());
    }
}
