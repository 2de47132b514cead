use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::engine::gateway::{BroadcastGateway, Group, OrderEvent};
use crate::engine::payload::{OrderPayload, PartnerContact};
use crate::error::AppError;
use crate::models::is_valid_phone;

/// What a websocket connection asked to watch, derived from its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTarget {
    PartnerPool,
    AllOrders,
    Customer(String),
}

impl SessionTarget {
    pub fn group(&self) -> Group {
        match self {
            SessionTarget::PartnerPool => Group::Unassigned,
            SessionTarget::AllOrders => Group::AllOrders,
            SessionTarget::Customer(phone) => Group::customer(phone),
        }
    }

    /// Pool and general channels greet new connections.
    pub fn sends_greeting(&self) -> bool {
        !matches!(self, SessionTarget::Customer(_))
    }

    pub fn channel(&self) -> &'static str {
        match self {
            SessionTarget::PartnerPool => "partner",
            SessionTarget::AllOrders => "orders",
            SessionTarget::Customer(_) => "user",
        }
    }
}

/// Parses the last path segment of `/ws/orders/<channel>`.
impl FromStr for SessionTarget {
    type Err = AppError;

    fn from_str(channel: &str) -> Result<Self, Self::Err> {
        if channel == "partner" {
            return Ok(SessionTarget::PartnerPool);
        }

        match channel.strip_prefix("user_") {
            Some(phone) if is_valid_phone(phone) => Ok(SessionTarget::Customer(phone.to_string())),
            Some(_) => Err(AppError::BadRequest(
                "customer channel needs a 10-digit phone number".to_string(),
            )),
            None => Err(AppError::NotFound(format!("unknown order channel {channel}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

/// One websocket subscriber. Joins its group on [`Session::open`] and leaves
/// on [`Session::close`] or when dropped.
pub struct Session {
    id: Uuid,
    group: Group,
    state: SessionState,
    gateway: Arc<BroadcastGateway>,
    sender: mpsc::Sender<OrderEvent>,
}

impl Session {
    pub fn connect(
        gateway: Arc<BroadcastGateway>,
        target: &SessionTarget,
    ) -> (Self, mpsc::Receiver<OrderEvent>) {
        let (sender, receiver) = mpsc::channel(gateway.session_buffer());
        let session = Self {
            id: Uuid::new_v4(),
            group: target.group(),
            state: SessionState::Connecting,
            gateway,
            sender,
        };
        (session, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn open(&mut self) {
        if self.state != SessionState::Connecting {
            return;
        }
        self.gateway
            .join(&self.group, self.id, self.sender.clone());
        self.state = SessionState::Open;
        info!(session_id = %self.id, group = %self.group, "session opened");
    }

    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if self.state == SessionState::Open {
            self.gateway.leave(&self.group, self.id);
        }
        self.state = SessionState::Closed;
        info!(session_id = %self.id, group = %self.group, "session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Serialize)]
struct Envelope {
    order: OrderPayload<PartnerContact>,
}

#[derive(Serialize)]
struct Greeting {
    message: &'static str,
}

/// Renders an event into the text frame written to the socket.
pub fn render(event: &OrderEvent) -> Result<String, serde_json::Error> {
    let order = match event {
        OrderEvent::OrderCreated(order) => order.session_view(),
        OrderEvent::OrderUpdated(order) => order.session_view(),
    };
    serde_json::to_string(&Envelope { order })
}

pub fn greeting() -> Result<String, serde_json::Error> {
    serde_json::to_string(&Greeting {
        message: "connected to order updates",
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::{render, Session, SessionState, SessionTarget};
    use crate::engine::gateway::{BroadcastGateway, Group, OrderEvent};
    use crate::engine::payload::{CustomerSummary, OrderPayload, PartnerSummary};
    use crate::error::AppError;
    use crate::models::order::OrderStatus;
    use crate::observability::metrics::Metrics;

    fn gateway() -> Arc<BroadcastGateway> {
        Arc::new(BroadcastGateway::new(16, Metrics::new()))
    }

    fn payload(assigned: bool) -> Arc<OrderPayload> {
        Arc::new(OrderPayload {
            order_id: Uuid::new_v4(),
            placed_at: Utc::now(),
            assigned_at: None,
            out_for_delivery_at: None,
            delivery_time: None,
            total_amount: dec!(250.00),
            delivery_status: OrderStatus::Assigned,
            assigned_to: assigned.then(|| PartnerSummary {
                id: Uuid::new_v4(),
                name: "Ravi".to_string(),
                phone_number: "9123456789".to_string(),
            }),
            items: Vec::new(),
            delivery_address: "12 MG Road".to_string(),
            user: CustomerSummary {
                name: "Asha".to_string(),
                phone_number: "9876543210".to_string(),
                address: "12 MG Road".to_string(),
            },
        })
    }

    #[test]
    fn channel_parsing() {
        assert_eq!(
            "partner".parse::<SessionTarget>().unwrap(),
            SessionTarget::PartnerPool
        );
        assert_eq!(
            "user_9876543210".parse::<SessionTarget>().unwrap(),
            SessionTarget::Customer("9876543210".to_string())
        );
        assert!(matches!(
            "user_12345".parse::<SessionTarget>(),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            "riders".parse::<SessionTarget>(),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn targets_map_to_groups() {
        assert_eq!(SessionTarget::PartnerPool.group(), Group::Unassigned);
        assert_eq!(SessionTarget::AllOrders.group(), Group::AllOrders);
        assert_eq!(
            SessionTarget::Customer("9876543210".to_string()).group(),
            Group::customer("9876543210")
        );
        assert!(!SessionTarget::Customer("9876543210".to_string()).sends_greeting());
    }

    #[tokio::test]
    async fn session_receives_until_closed() {
        let gateway = gateway();
        let (mut session, mut rx) = Session::connect(gateway.clone(), &SessionTarget::PartnerPool);
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(gateway.member_count(&Group::Unassigned), 0);

        session.open();
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(
            gateway.publish(&Group::Unassigned, OrderEvent::OrderCreated(payload(false))),
            1
        );
        assert!(matches!(rx.recv().await, Some(OrderEvent::OrderCreated(_))));

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            gateway.publish(&Group::Unassigned, OrderEvent::OrderUpdated(payload(false))),
            0
        );
    }

    #[test]
    fn dropping_an_open_session_leaves_its_group() {
        let gateway = gateway();
        {
            let (mut session, _rx) = Session::connect(
                gateway.clone(),
                &SessionTarget::Customer("9876543210".to_string()),
            );
            session.open();
            assert_eq!(gateway.member_count(&Group::customer("9876543210")), 1);
        }
        assert_eq!(gateway.session_count(), 0);
    }

    #[test]
    fn both_event_kinds_render_identically() {
        let order = payload(true);
        let created = render(&OrderEvent::OrderCreated(order.clone())).unwrap();
        let updated = render(&OrderEvent::OrderUpdated(order)).unwrap();
        assert_eq!(created, updated);

        let json: serde_json::Value = serde_json::from_str(&created).unwrap();
        assert_eq!(json["order"]["assigned_to"]["name"], "Ravi");
        assert_eq!(json["order"]["assigned_to"]["phone_number"], "9123456789");
        assert!(json["order"]["assigned_to"].get("id").is_none());
        assert_eq!(json["order"]["total_amount"], "250.00");
    }

    #[test]
    fn unassigned_order_renders_null_partner() {
        let rendered = render(&OrderEvent::OrderUpdated(payload(false))).unwrap();
        let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert!(json["order"]["assigned_to"].is_null());
    }
}
