use rusqlite::params;
use tracing::warn;

use crate::Database;
use crate::error::{map_constraint, not_found_on_no_rows};
use crate::models::{FeedItemRow, PostRow};
use crate::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub limit: u32,
    pub offset: u32,
    /// Substring match against title and content; empty means no filter.
    pub search: String,
    /// Exact tag match; empty means no filter.
    pub tag: String,
    pub sort: SortOrder,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            search: String::new(),
            tag: String::new(),
            sort: SortOrder::Desc,
        }
    }
}

impl Database {
    pub fn create_post(&self, post: &PostRow) -> StoreResult<()> {
        let tags = encode_tags(&post.tags)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (id, user_id, title, content, tags, created_at, updated_at, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
                params![
                    post.id,
                    post.user_id,
                    post.title,
                    post.content,
                    tags,
                    post.created_at,
                    post.updated_at
                ],
            )
            .map_err(map_constraint)?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> StoreResult<PostRow> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, title, content, tags, created_at, updated_at, version
                 FROM posts
                 WHERE id = ?1",
                [id],
                post_from_row,
            )
            .map_err(not_found_on_no_rows)
        })
    }

    /// Optimistic-concurrency update: one conditional statement matching on
    /// id AND the version the caller last read. Zero matched rows means the
    /// row is gone or someone committed first; the caller re-reads and
    /// retries. No lock is ever held across a caller round trip.
    pub fn update_post(
        &self,
        id: &str,
        title: &str,
        content: &str,
        expected_version: i64,
        updated_at: &str,
    ) -> StoreResult<PostRow> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "UPDATE posts
                 SET title = ?1, content = ?2, updated_at = ?3, version = version + 1
                 WHERE id = ?4 AND version = ?5
                 RETURNING id, user_id, title, content, tags, created_at, updated_at, version",
                params![title, content, updated_at, id, expected_version],
                post_from_row,
            )
            .map_err(not_found_on_no_rows)
        })
    }

    pub fn delete_post(&self, id: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let rows = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            if rows == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    /// Posts authored by the user or anyone they follow, with comment
    /// counts. The sort direction comes from an enum, never from raw input.
    pub fn feed(&self, user_id: &str, query: &FeedQuery) -> StoreResult<Vec<FeedItemRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT p.id, p.user_id, u.username, p.title, p.content, p.tags,
                        p.version, p.created_at, p.updated_at,
                        COUNT(c.id) AS comments_count
                 FROM posts p
                 JOIN users u ON u.id = p.user_id
                 LEFT JOIN comments c ON c.post_id = p.id
                 WHERE (p.user_id = ?1
                        OR p.user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?1))
                   AND (?2 = '' OR p.title LIKE '%' || ?2 || '%' OR p.content LIKE '%' || ?2 || '%')
                   AND (?3 = '' OR p.tags LIKE '%\"' || ?3 || '\"%')
                 GROUP BY p.id
                 ORDER BY p.created_at {}
                 LIMIT ?4 OFFSET ?5",
                query.sort.as_sql()
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![user_id, query.search, query.tag, query.limit, query.offset],
                    feed_item_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn encode_tags(tags: &[String]) -> StoreResult<String> {
    serde_json::to_string(tags).map_err(|e| StoreError::Internal(format!("tags encode: {e}")))
}

fn decode_tags(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt tags column {raw:?}: {e}");
        Vec::new()
    })
}

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    let tags_json: String = row.get(4)?;
    Ok(PostRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        tags: decode_tags(&tags_json),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        version: row.get(7)?,
    })
}

fn feed_item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeedItemRow> {
    let tags_json: String = row.get(5)?;
    Ok(FeedItemRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author_username: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        tags: decode_tags(&tags_json),
        version: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        comments_count: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::{FeedQuery, SortOrder};
    use crate::models::PostRow;
    use crate::testutil::{seed_user, test_db};
    use crate::{StoreError, now_utc};

    fn new_post(id: &str, user_id: &str, title: &str) -> PostRow {
        let now = now_utc();
        PostRow {
            id: id.to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            content: "some content".to_string(),
            tags: vec!["intro".to_string()],
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        }
    }

    #[test]
    fn update_increments_version_by_one() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "ann", "ann@example.com");
        db.create_post(&new_post("p1", "u1", "hello")).unwrap();

        let updated = db
            .update_post("p1", "hello again", "edited", 1, &now_utc())
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.title, "hello again");
    }

    #[test]
    fn stale_version_never_silently_applies() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "ann", "ann@example.com");
        db.create_post(&new_post("p1", "u1", "hello")).unwrap();

        db.update_post("p1", "first writer", "a", 1, &now_utc())
            .unwrap();

        // A second writer that also read version 1 must lose, and the row
        // must still carry the first writer's state.
        let stale = db.update_post("p1", "second writer", "b", 1, &now_utc());
        assert!(matches!(stale, Err(StoreError::NotFound)));

        let current = db.get_post("p1").unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.title, "first writer");
    }

    #[test]
    fn delete_missing_post_is_not_found() {
        let (_dir, db) = test_db();
        let res = db.delete_post("nope");
        assert!(matches!(res, Err(StoreError::NotFound)));
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "ann", "ann@example.com");
        db.create_post(&new_post("p1", "u1", "hello")).unwrap();

        db.delete_post("p1").unwrap();
        assert!(matches!(db.get_post("p1"), Err(StoreError::NotFound)));
    }

    #[test]
    fn post_for_unknown_author_is_not_found() {
        let (_dir, db) = test_db();
        let res = db.create_post(&new_post("p1", "ghost", "hello"));
        assert!(matches!(res, Err(StoreError::NotFound)));
    }

    #[test]
    fn feed_spans_self_and_followed_authors() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "ann", "ann@example.com");
        seed_user(&db, "u2", "beth", "beth@example.com");
        seed_user(&db, "u3", "carol", "carol@example.com");
        db.follow("u1", "u2", &now_utc()).unwrap();

        db.create_post(&new_post("p1", "u1", "mine")).unwrap();
        db.create_post(&new_post("p2", "u2", "followed")).unwrap();
        db.create_post(&new_post("p3", "u3", "stranger")).unwrap();
        db.create_comment("c1", "p2", "u1", "nice", &now_utc())
            .unwrap();

        let feed = db.feed("u1", &FeedQuery::default()).unwrap();
        let titles: Vec<_> = feed.iter().map(|item| item.title.as_str()).collect();
        assert_eq!(feed.len(), 2);
        assert!(titles.contains(&"mine"));
        assert!(titles.contains(&"followed"));

        let followed = feed.iter().find(|item| item.id == "p2").unwrap();
        assert_eq!(followed.comments_count, 1);
        assert_eq!(followed.author_username, "beth");
    }

    #[test]
    fn feed_search_and_tag_filters() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "ann", "ann@example.com");
        db.create_post(&new_post("p1", "u1", "rust patterns")).unwrap();
        db.create_post(&new_post("p2", "u1", "gardening")).unwrap();

        let query = FeedQuery {
            search: "rust".to_string(),
            sort: SortOrder::Asc,
            ..FeedQuery::default()
        };
        let feed = db.feed("u1", &query).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id, "p1");

        let query = FeedQuery {
            tag: "intro".to_string(),
            ..FeedQuery::default()
        };
        assert_eq!(db.feed("u1", &query).unwrap().len(), 2);

        let query = FeedQuery {
            tag: "missing".to_string(),
            ..FeedQuery::default()
        };
        assert!(db.feed("u1", &query).unwrap().is_empty());
    }
}
