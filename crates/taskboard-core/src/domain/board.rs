//! Board entity.

use serde::{Deserialize, Serialize};

use super::ids::{Address, BoardId, TableId};
use super::member::{Member, Role};
use super::schema::SchemaVersion;

/// Where a board keeps one of its collections.
///
/// Callers normally do not care; the decoder resolves both into plain lists.
/// The source is kept so follow-up lookups (e.g. one task by index) know
/// which table to ask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "table", rename_all = "snake_case")]
pub enum CollectionSource {
    Inline,
    Table(TableId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub version: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<Address>,
    /// Explicit membership entries (the owner is a member even if absent here).
    pub members: Vec<Member>,
    pub member_source: CollectionSource,
    /// Task references in creation order: object ids for inline task lists,
    /// decimal sequence numbers for table-backed tasks.
    pub task_ids: Vec<String>,
    pub task_source: CollectionSource,
    pub schema: SchemaVersion,
}

impl Board {
    pub fn is_member(&self, address: &Address) -> bool {
        &self.owner == address || self.members.iter().any(|m| &m.address == address)
    }

    pub fn role_of(&self, address: &Address) -> Option<Role> {
        if &self.owner == address {
            return Some(Role::admin(self.schema));
        }
        self.members
            .iter()
            .find(|m| &m.address == address)
            .map(|m| m.role)
    }

    /// Membership with the owner made explicit (as admin, listed first).
    pub fn members_with_owner(&self) -> Vec<Member> {
        let mut out = Vec::with_capacity(self.members.len() + 1);
        out.push(Member::new(self.owner.clone(), Role::admin(self.schema)));
        out.extend(
            self.members
                .iter()
                .filter(|m| m.address != self.owner)
                .cloned(),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Board {
        let schema = SchemaVersion::Verified;
        Board {
            id: BoardId::new("0xb"),
            version: 3,
            name: "Sprint".to_string(),
            description: None,
            owner: Address::new("0xowner"),
            verifier: None,
            members: vec![
                Member::new(Address::new("0xowner"), Role::new(1, schema)),
                Member::new(Address::new("0xalice"), Role::new(1, schema)),
            ],
            member_source: CollectionSource::Inline,
            task_ids: Vec::new(),
            task_source: CollectionSource::Inline,
            schema,
        }
    }

    #[test]
    fn owner_is_always_a_member_and_admin() {
        let b = board();
        assert!(b.is_member(&Address::new("0xowner")));
        assert!(b.role_of(&Address::new("0xowner")).is_some_and(Role::is_admin));
        assert!(!b.is_member(&Address::new("0xbob")));
    }

    #[test]
    fn members_with_owner_lists_owner_once() {
        let members = board().members_with_owner();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].address.as_str(), "0xowner");
        assert!(members[0].role.is_admin());
        assert_eq!(members[1].address.as_str(), "0xalice");
    }
}
