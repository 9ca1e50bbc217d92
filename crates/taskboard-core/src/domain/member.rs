//! Member entity. Members only exist as entries of a board's membership relation.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::Address;
use super::schema::SchemaVersion;

/// A member role: the zero-based index into the schema's ordered role tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    index: u8,
    schema: SchemaVersion,
}

impl Role {
    pub fn new(index: u8, schema: SchemaVersion) -> Self {
        Self { index, schema }
    }

    pub fn admin(schema: SchemaVersion) -> Self {
        Self::new(schema.admin_role(), schema)
    }

    pub fn index(self) -> u8 {
        self.index
    }

    pub fn tag(self) -> &'static str {
        self.schema
            .role_tags()
            .get(self.index as usize)
            .copied()
            .unwrap_or("Unknown")
    }

    pub fn is_admin(self) -> bool {
        self.index == self.schema.admin_role()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub address: Address,
    pub role: Role,
}

impl Member {
    pub fn new(address: Address, role: Role) -> Self {
        Self { address, role }
    }
}
