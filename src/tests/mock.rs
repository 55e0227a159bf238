use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::auth::Claims;
use crate::models::account::{Account, Role};
use crate::models::event::{Event, Priority};

pub fn mock_claims(account_id: Uuid, role: Role) -> Claims {
    Claims::new(account_id, role)
}

pub fn mock_staff() -> Account {
    Account {
        id: Uuid::new_v4(),
        email: String::from("staff@example.com"),
        name: String::from("Jamie Park"),
        phone: String::from("555-0100"),
        role: Role::Staff,
        address: Some(String::from("Bandra West, Mumbai")),
        lat: Some(19.070),
        lng: Some(72.870),
        created_at: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        pass_hash: String::from("$2b$10$notarealhashnotarealhashnotarealhash"),
    }
}

pub fn mock_event() -> Event {
    let starts_at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();

    Event {
        id: Uuid::new_v4(),
        name: String::from("Mock Event"),
        description: String::from("Let's all go cater somewhere!"),
        venue_address: String::from("Somewhere out there"),
        venue_lat: Some(19.075),
        venue_lng: Some(72.875),
        starts_at,
        ends_at: starts_at + Duration::hours(4),
        priority: Priority::Normal,
        required_staff: 5,
        created_by: Uuid::new_v4(),
        approved: true,
        created_at: starts_at - Duration::days(7),
    }
}
