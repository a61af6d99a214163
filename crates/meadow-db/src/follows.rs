use rusqlite::params;

use crate::Database;
use crate::error::map_constraint;
use crate::{StoreError, StoreResult};

impl Database {
    /// Insert the directed edge. A pair collision means the edge already
    /// exists and is reported as Conflict, distinct from any other fault.
    pub fn follow(&self, follower_id: &str, followed_id: &str, created_at: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO follows (follower_id, followed_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![follower_id, followed_id, created_at],
            )
            .map_err(map_constraint)?;
            Ok(())
        })
    }

    /// Remove the directed edge. Zero rows affected means there was nothing
    /// to unfollow, never silent success.
    pub fn unfollow(&self, follower_id: &str, followed_id: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let rows = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
                params![follower_id, followed_id],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }
}
