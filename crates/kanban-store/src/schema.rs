//! Board store database schema.

/// SQL to create the board tables.
///
/// `boards.state` holds the columns and cards of a board as JSON;
/// `board_entities` maps every column and card id to its board.
pub const CREATE_BOARD_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS boards (
    board_id    UUID PRIMARY KEY,
    project_id  UUID NOT NULL UNIQUE,
    version     BIGINT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    state       JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS board_entities (
    entity_id   UUID PRIMARY KEY,
    board_id    UUID NOT NULL REFERENCES boards (board_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_board_entities_board_id
    ON board_entities (board_id);
";
