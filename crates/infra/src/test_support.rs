//! Shared test aggregate for the adapter tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use repokit_core::{AggregateRoot, Entity, EntityId, HasDomainEvents};
use repokit_events::{DomainEvent, EventRecorder};
use repokit_specification::{FieldValue, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CustomerEvent {
    Registered { first_name: String, at: DateTime<Utc> },
    Relocated { zip_code: Option<String>, at: DateTime<Utc> },
}

impl DomainEvent for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::Registered { .. } => "customer.registered",
            CustomerEvent::Relocated { .. } => "customer.relocated",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustomerEvent::Registered { at, .. } | CustomerEvent::Relocated { at, .. } => *at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: EntityId,
    pub first_name: String,
    pub zip_code: Option<String>,
    pub is_vip: bool,
    pub version: u64,
    #[serde(skip)]
    pub events: EventRecorder<CustomerEvent>,
}

impl Customer {
    pub fn register(first_name: &str, zip_code: Option<&str>) -> Self {
        let mut customer = Self {
            id: EntityId::new(),
            first_name: first_name.to_string(),
            zip_code: zip_code.map(str::to_string),
            is_vip: false,
            version: 0,
            events: EventRecorder::new(),
        };
        customer.events.record(CustomerEvent::Registered {
            first_name: first_name.to_string(),
            at: Utc::now(),
        });
        customer
    }

    pub fn relocate(&mut self, zip_code: Option<&str>) {
        self.zip_code = zip_code.map(str::to_string);
        self.events.record(CustomerEvent::Relocated {
            zip_code: self.zip_code.clone(),
            at: Utc::now(),
        });
    }
}

impl Entity for Customer {
    type Id = EntityId;

    fn id(&self) -> &EntityId {
        &self.id
    }
}

impl HasDomainEvents for Customer {
    type Event = CustomerEvent;

    fn pending_events(&self) -> &[CustomerEvent] {
        self.events.pending()
    }

    fn take_events(&mut self) -> Vec<CustomerEvent> {
        self.events.drain()
    }
}

impl AggregateRoot for Customer {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn aggregate_type() -> &'static str {
        "customer"
    }
}

impl Record for Customer {
    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(self.id.into()),
            "first_name" => Some(self.first_name.clone().into()),
            "zip_code" => Some(self.zip_code.clone().into()),
            "is_vip" => Some(self.is_vip.into()),
            "version" => Some(FieldValue::Int(self.version as i64)),
            _ => None,
        }
    }
}
