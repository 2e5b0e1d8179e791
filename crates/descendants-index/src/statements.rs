//! SQL statements issued against the `Items` and `Descendants` tables.
//!
//! Each constant is a single statement. Parameters are bound by name and
//! carry hyphenated item ids.

/// Schema of the SQLite store. `Descendants` keeps its `ID`, `Ancestor`,
/// `Descendant` column layout for compatibility with existing stores.
pub const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS Items (
      ID TEXT PRIMARY KEY NOT NULL,
      ParentID TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS ndxItems_ParentID ON Items (ParentID);

    CREATE TABLE IF NOT EXISTS Descendants (
      ID TEXT PRIMARY KEY NOT NULL,
      Ancestor TEXT NOT NULL,
      Descendant TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS ndxDescendants_Ancestor ON Descendants (Ancestor, Descendant);
    CREATE INDEX IF NOT EXISTS ndxDescendants_Descendant ON Descendants (Descendant);
"#;

// ---------------------------------------------------------------------------
// Incremental maintenance
// ---------------------------------------------------------------------------

pub const INSERT_PARENT_ROW: &str = r#"
    INSERT INTO Descendants (ID, Ancestor, Descendant)
    SELECT lower(hex(randomblob(16))), :parentId, :itemId
    WHERE NOT EXISTS (
      SELECT 1 FROM Descendants
      WHERE Ancestor = :parentId AND Descendant = :itemId
    )
"#;

pub const INSERT_ANCESTOR_ROWS: &str = r#"
    INSERT INTO Descendants (ID, Ancestor, Descendant)
    SELECT lower(hex(randomblob(16))), d.Ancestor, :itemId
    FROM Descendants d
    WHERE d.Descendant = :parentId
      AND NOT EXISTS (
        SELECT 1 FROM Descendants e
        WHERE e.Ancestor = d.Ancestor AND e.Descendant = :itemId
      )
"#;

/// Rows of every node below the deleted item. Must run before `DELETE_ITEM_ROWS`,
/// which removes the `(item, X)` rows that identify those nodes.
pub const DELETE_SUBTREE_ROWS: &str = r#"
    DELETE FROM Descendants
    WHERE Descendant IN (
      SELECT Descendant FROM Descendants WHERE Ancestor = :itemId
    )
"#;

pub const DELETE_ITEM_ROWS: &str = r#"
    DELETE FROM Descendants WHERE Descendant = :itemId
"#;

// ---------------------------------------------------------------------------
// Full rebuild
// ---------------------------------------------------------------------------

pub const CREATE_REBUILD_SCRATCH: &str = r#"
    CREATE TEMP TABLE IF NOT EXISTS RebuiltDescendants (
      Ancestor TEXT NOT NULL,
      Descendant TEXT NOT NULL,
      PRIMARY KEY (Ancestor, Descendant)
    )
"#;

pub const CLEAR_REBUILD_SCRATCH: &str = "DELETE FROM temp.RebuiltDescendants";

/// Transitive closure of the `ParentID` edges. `UNION` keeps a cyclic edge set finite.
pub const COLLECT_CLOSURE: &str = r#"
    WITH RECURSIVE TempSet (Ancestor, Descendant) AS (
      SELECT Items.ParentID, Items.ID
      FROM Items
      WHERE Items.ParentID <> :nullId
      UNION
      SELECT Items.ParentID, TempSet.Descendant
      FROM Items JOIN TempSet ON TempSet.Ancestor = Items.ID
      WHERE Items.ParentID <> :nullId
    )
    INSERT OR IGNORE INTO temp.RebuiltDescendants (Ancestor, Descendant)
    SELECT Ancestor, Descendant FROM TempSet
"#;

pub const DELETE_DUPLICATE_ROWS: &str = r#"
    DELETE FROM Descendants
    WHERE rowid NOT IN (
      SELECT MIN(rowid) FROM Descendants GROUP BY Ancestor, Descendant
    )
"#;

pub const INSERT_MISSING_ROWS: &str = r#"
    INSERT INTO Descendants (ID, Ancestor, Descendant)
    SELECT lower(hex(randomblob(16))), s.Ancestor, s.Descendant
    FROM temp.RebuiltDescendants s
    WHERE NOT EXISTS (
      SELECT 1 FROM Descendants t
      WHERE t.Ancestor = s.Ancestor AND t.Descendant = s.Descendant
    )
"#;

pub const DELETE_STALE_ROWS: &str = r#"
    DELETE FROM Descendants
    WHERE NOT EXISTS (
      SELECT 1 FROM temp.RebuiltDescendants s
      WHERE s.Ancestor = Descendants.Ancestor AND s.Descendant = Descendants.Descendant
    )
"#;

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub const SELECT_ANCESTORS: &str = r#"
    SELECT Ancestor FROM Descendants WHERE Descendant = :itemId ORDER BY Ancestor
"#;

pub const SELECT_DESCENDANTS: &str = r#"
    SELECT Descendant FROM Descendants WHERE Ancestor = :itemId ORDER BY Descendant
"#;

pub const SELECT_IS_ANCESTOR: &str = r#"
    SELECT Ancestor FROM Descendants
    WHERE Ancestor = :ancestorId AND Descendant = :itemId
    LIMIT 1
"#;

pub const SELECT_CLOSURE_PAIRS: &str = r#"
    SELECT Ancestor, Descendant FROM Descendants ORDER BY Ancestor, Descendant
"#;

// ---------------------------------------------------------------------------
// Primary tree edges
// ---------------------------------------------------------------------------

pub const INSERT_ITEM: &str = r#"
    INSERT INTO Items (ID, ParentID) VALUES (:itemId, :parentId)
"#;

pub const DELETE_ITEM_SUBTREE: &str = r#"
    WITH RECURSIVE Subtree (ID) AS (
      SELECT :itemId
      UNION
      SELECT Items.ID FROM Items JOIN Subtree ON Items.ParentID = Subtree.ID
    )
    DELETE FROM Items WHERE ID IN (SELECT ID FROM Subtree)
"#;

pub const UPDATE_ITEM_PARENT: &str = r#"
    UPDATE Items SET ParentID = :parentId WHERE ID = :itemId
"#;

pub const SELECT_ITEM_PARENT: &str = "SELECT ParentID FROM Items WHERE ID = :itemId";

pub const SELECT_ITEM_CHILDREN: &str = "SELECT ID FROM Items WHERE ParentID = :itemId ORDER BY ID";

pub const SELECT_ITEM_EDGES: &str = "SELECT ID, ParentID FROM Items ORDER BY ID";
