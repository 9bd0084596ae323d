/// An owner-scoped table reachable through `/api/:resource`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    /// URL segment
    pub name: &'static str,
    pub table: &'static str,
    pub owner_column: &'static str,
    /// Column stamped with the current time on create and update
    pub touch_column: Option<&'static str>,
}

pub const TRIPS: Resource = Resource { name: "trips", table: "bpa_trips", owner_column: "user_id", touch_column: None };
pub const OFFICES: Resource = Resource { name: "offices", table: "constituency_offices", owner_column: "user_id", touch_column: None };
pub const STAFF: Resource = Resource { name: "staff", table: "office_staff", owner_column: "user_id", touch_column: None };
pub const PREFERENCES: Resource = Resource {
    name: "preferences",
    table: "communication_preferences",
    owner_column: "user_id",
    touch_column: Some("updated_at"),
};
pub const REGISTRATIONS: Resource = Resource {
    name: "registrations",
    table: "bpa_registrations",
    owner_column: "user_id",
    touch_column: None,
};

pub const ALL: [Resource; 5] = [TRIPS, OFFICES, STAFF, PREFERENCES, REGISTRATIONS];

impl Resource {
    pub fn by_name(name: &str) -> Option<Resource> {
        ALL.iter().copied().find(|r| r.name == name)
    }
}
