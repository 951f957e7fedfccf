//! Board stores: the storage collaborators behind `BoardStore`.
//!
//! `InMemoryBoardStore` keeps boards in process memory behind a mutex;
//! `PgBoardStore` keeps each board as a versioned JSONB row in PostgreSQL.
//! Both commit a whole board at once and reject stale versions.

pub mod in_memory;
pub mod pg_board_store;
pub mod schema;
