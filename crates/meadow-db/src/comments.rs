use rusqlite::params;

use crate::Database;
use crate::StoreResult;
use crate::error::map_constraint;
use crate::models::CommentRow;

impl Database {
    pub fn create_comment(
        &self,
        id: &str,
        post_id: &str,
        user_id: &str,
        content: &str,
        created_at: &str,
    ) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, user_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, post_id, user_id, content, created_at],
            )
            .map_err(map_constraint)?;
            Ok(())
        })
    }

    pub fn comments_for_post(&self, post_id: &str) -> StoreResult<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.created_at
                 FROM comments c
                 JOIN users u ON u.id = c.user_id
                 WHERE c.post_id = ?1
                 ORDER BY c.created_at DESC",
            )?;

            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        user_id: row.get(2)?,
                        author_username: row.get(3)?,
                        content: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::StoreError;
    use crate::models::PostRow;
    use crate::testutil::{seed_user, test_db};
    use crate::now_utc;

    #[test]
    fn comments_come_back_with_author_username() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "ann", "ann@example.com");
        let now = now_utc();
        db.create_post(&PostRow {
            id: "p1".to_string(),
            user_id: "u1".to_string(),
            title: "hello".to_string(),
            content: "body".to_string(),
            tags: Vec::new(),
            created_at: now.clone(),
            updated_at: now.clone(),
            version: 1,
        })
        .unwrap();

        db.create_comment("c1", "p1", "u1", "first", &now).unwrap();
        let comments = db.comments_for_post("p1").unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author_username, "ann");
        assert_eq!(comments[0].content, "first");
    }

    #[test]
    fn comment_on_missing_post_is_not_found() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "ann", "ann@example.com");
        let res = db.create_comment("c1", "nope", "u1", "hi", &now_utc());
        assert!(matches!(res, Err(StoreError::NotFound)));
    }
}
