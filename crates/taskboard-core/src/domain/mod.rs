//! Domain model (ids, schema versions, entities, errors).

pub mod board;
pub mod errors;
pub mod ids;
pub mod member;
pub mod schema;
pub mod task;

pub use self::board::{Board, CollectionSource};
pub use self::errors::{BoardError, ErrorKind};
pub use self::ids::{Address, BoardId, CapId, Id, IdMarker, TableId, TaskObjectId};
pub use self::member::{Member, Role};
pub use self::schema::SchemaVersion;
pub use self::task::{Task, TaskStatus};

/// Any entity the decoder can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Board(Board),
    Task(Task),
    Member(Member),
}

/// Which entity a raw object is expected to decode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Board,
    Task,
    Member,
}

impl EntityKind {
    /// Struct name the object's declared type must end with.
    pub fn struct_name(self) -> &'static str {
        match self {
            Self::Board => "Board",
            Self::Task => "Task",
            Self::Member => "Field",
        }
    }
}
