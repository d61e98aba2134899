//! Usage ledger ("actions") models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default `read_type` when the recorder does not send one.
pub const DEFAULT_READ_TYPE: &str = "docChange";

/// Largest `count` a single event may carry.
pub const MAX_ACTION_COUNT: i64 = 1_000_000_000;

/// One billable/operational event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub collection: String,
    pub read_type: String,
    #[serde(rename = "uid")]
    pub user_id: String,
    #[serde(rename = "companyId")]
    pub tenant_id: String,
    pub count: i64,
    pub host: String,
    /// Id of the document the event touched.
    #[serde(rename = "docId")]
    pub doc_id: String,
    /// Epoch milliseconds.
    pub created: i64,
    pub removed: bool,
}

/// Input for recording an action. Defaults are already applied.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub kind: String,
    pub collection: String,
    pub read_type: String,
    pub user_id: String,
    pub tenant_id: String,
    pub count: i64,
    pub host: String,
    pub doc_id: String,
    pub created: i64,
    pub removed: bool,
}

/// Administrative partial update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPatch {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub collection: Option<String>,
    pub read_type: Option<String>,
    pub count: Option<i64>,
    pub host: Option<String>,
    pub removed: Option<bool>,
}

impl ActionPatch {
    pub fn apply(&self, action: &mut Action) {
        if let Some(kind) = &self.kind {
            action.kind = kind.clone();
        }
        if let Some(collection) = &self.collection {
            action.collection = collection.clone();
        }
        if let Some(read_type) = &self.read_type {
            action.read_type = read_type.clone();
        }
        if let Some(count) = self.count {
            action.count = count;
        }
        if let Some(host) = &self.host {
            action.host = host.clone();
        }
        if let Some(removed) = self.removed {
            action.removed = removed;
        }
    }
}

/// Listing filter. Every field is optional; `None` means "any".
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub kind: Option<String>,
    pub collection: Option<String>,
    pub removed: Option<bool>,
    /// Inclusive lower bound on `created`.
    pub from: Option<i64>,
    /// Exclusive upper bound on `created`.
    pub to: Option<i64>,
    /// Strict lower bound on `created`, used for live tailing. Ignored when
    /// `from` or `to` is set.
    pub since: Option<i64>,
}

impl ActionFilter {
    pub fn matches(&self, action: &Action) -> bool {
        fn eq(want: &Option<String>, have: &str) -> bool {
            want.as_deref().is_none_or(|w| w == have)
        }
        let in_range = match (self.from, self.to, self.since) {
            (None, None, Some(since)) => action.created > since,
            (from, to, _) => {
                from.is_none_or(|f| action.created >= f) && to.is_none_or(|t| action.created < t)
            }
        };
        eq(&self.user_id, &action.user_id)
            && eq(&self.tenant_id, &action.tenant_id)
            && eq(&self.kind, &action.kind)
            && eq(&self.collection, &action.collection)
            && self.removed.is_none_or(|r| r == action.removed)
            && in_range
    }
}

/// Field to group billing results by. Closed set; never interpolated raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupField {
    #[default]
    Tenant,
    User,
    Kind,
    Collection,
    ReadType,
    Host,
}

impl GroupField {
    /// Accepts the wire names (`companyId`, `uid`, `type`, ...).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "companyId" => Some(GroupField::Tenant),
            "uid" => Some(GroupField::User),
            "type" => Some(GroupField::Kind),
            "collection" => Some(GroupField::Collection),
            "readType" => Some(GroupField::ReadType),
            "host" => Some(GroupField::Host),
            _ => None,
        }
    }

    /// Wire name, used as the key in aggregation responses.
    pub fn wire_name(&self) -> &'static str {
        match self {
            GroupField::Tenant => "companyId",
            GroupField::User => "uid",
            GroupField::Kind => "type",
            GroupField::Collection => "collection",
            GroupField::ReadType => "readType",
            GroupField::Host => "host",
        }
    }

    /// Column name in the `actions` table.
    pub fn column(&self) -> &'static str {
        match self {
            GroupField::Tenant => "company_id",
            GroupField::User => "uid",
            GroupField::Kind => "type",
            GroupField::Collection => "collection",
            GroupField::ReadType => "read_type",
            GroupField::Host => "host",
        }
    }

    pub fn value_of<'a>(&self, action: &'a Action) -> &'a str {
        match self {
            GroupField::Tenant => &action.tenant_id,
            GroupField::User => &action.user_id,
            GroupField::Kind => &action.kind,
            GroupField::Collection => &action.collection,
            GroupField::ReadType => &action.read_type,
            GroupField::Host => &action.host,
        }
    }
}

/// Numeric field summed by billing aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SumField {
    #[default]
    Count,
    Created,
}

impl SumField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "count" => Some(SumField::Count),
            "created" => Some(SumField::Created),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SumField::Count => "count",
            SumField::Created => "created",
        }
    }

    pub fn value_of(&self, action: &Action) -> i64 {
        match self {
            SumField::Count => action.count,
            SumField::Created => action.created,
        }
    }
}

/// Billing aggregation request over `[from, to)`.
#[derive(Debug, Clone)]
pub struct AggregateQuery {
    pub from: i64,
    pub to: i64,
    pub tenant_id: Option<String>,
    pub group_by: GroupField,
    pub sum: SumField,
}

impl AggregateQuery {
    /// Half-open range check plus the removal flag.
    pub fn matches(&self, action: &Action) -> bool {
        !action.removed
            && action.created >= self.from
            && action.created < self.to
            && self
                .tenant_id
                .as_deref()
                .is_none_or(|t| t == action.tenant_id)
    }
}

/// One aggregation group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingGroup {
    pub key: String,
    pub total_sum: i64,
    pub document_count: i64,
}

/// Aggregation result: a single (possibly zero) summary when a tenant was
/// named, otherwise every group seen in range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingSummary {
    Tenant(BillingGroup),
    All(Vec<BillingGroup>),
}

/// Distinct-value listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistinctField {
    Tenant,
    Collection,
}

impl DistinctField {
    pub fn column(&self) -> &'static str {
        match self {
            DistinctField::Tenant => "company_id",
            DistinctField::Collection => "collection",
        }
    }

    pub fn value_of<'a>(&self, action: &'a Action) -> &'a str {
        match self {
            DistinctField::Tenant => &action.tenant_id,
            DistinctField::Collection => &action.collection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(created: i64, removed: bool) -> Action {
        Action {
            id: Uuid::nil(),
            kind: "read".into(),
            collection: "docs".into(),
            read_type: DEFAULT_READ_TYPE.into(),
            user_id: "u1".into(),
            tenant_id: "T1".into(),
            count: 3,
            host: "app.example.com".into(),
            doc_id: "d1".into(),
            created,
            removed,
        }
    }

    #[test]
    fn aggregation_range_is_half_open() {
        let q = AggregateQuery {
            from: 100,
            to: 200,
            tenant_id: None,
            group_by: GroupField::Tenant,
            sum: SumField::Count,
        };
        assert!(q.matches(&action(100, false)));
        assert!(q.matches(&action(199, false)));
        assert!(!q.matches(&action(200, false)));
        assert!(!q.matches(&action(150, true)));
    }

    #[test]
    fn since_applies_only_without_explicit_range() {
        let tail = ActionFilter {
            since: Some(100),
            ..Default::default()
        };
        assert!(!tail.matches(&action(100, false)));
        assert!(tail.matches(&action(101, false)));

        let ranged = ActionFilter {
            from: Some(50),
            since: Some(100),
            ..Default::default()
        };
        assert!(ranged.matches(&action(60, false)));
    }

    #[test]
    fn group_fields_round_trip_wire_names() {
        for name in ["companyId", "uid", "type", "collection", "readType", "host"] {
            let field = GroupField::parse(name).unwrap();
            assert_eq!(field.wire_name(), name);
        }
        assert!(GroupField::parse("pw").is_none());
        assert!(SumField::parse("host").is_none());
    }
}
