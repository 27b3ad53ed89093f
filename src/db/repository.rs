//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity.

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::auth::RegistrationError;
use crate::errors::AppError;
use crate::models::{
    AuthorRef, Campground, CampgroundDetail, CampgroundInput, Geometry, ImageRef, NewCampground,
    Review, ReviewDetail, ReviewInput, User, UserCredentials,
};

const CAMPGROUND_COLUMNS: &str = "id, title, price, description, location, geometry, images, \
     author_id, review_ids, created_at, updated_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== USER OPERATIONS ====================

    /// Insert a user. Username and email are unique, case-insensitively.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, RegistrationError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(User {
                id,
                username: username.to_string(),
                email: email.to_string(),
                created_at: now,
            }),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let field = if db_err.message().contains("users.email") {
                    "email"
                } else {
                    "username"
                };
                Err(RegistrationError::Duplicate(format!(
                    "A user with the given {field} is already registered"
                )))
            }
            Err(err) => Err(RegistrationError::Store(err.into())),
        }
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query("SELECT id, username, email, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn find_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, AppError> {
        let row = sqlx::query(
            "SELECT id, username, email, created_at, password_hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| UserCredentials {
            user: user_from_row(&row),
            password_hash: row.get("password_hash"),
        }))
    }

    #[cfg(test)]
    pub async fn count_users(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    // ==================== CAMPGROUND OPERATIONS ====================

    /// List all campgrounds, newest first.
    pub async fn list_campgrounds(&self) -> Result<Vec<Campground>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {CAMPGROUND_COLUMNS} FROM campgrounds ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(campground_from_row).collect()
    }

    /// Get a campground by ID.
    pub async fn get_campground(&self, id: &str) -> Result<Option<Campground>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {CAMPGROUND_COLUMNS} FROM campgrounds WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(campground_from_row).transpose()
    }

    /// Deep read for the detail view.
    ///
    /// Review ids that no longer resolve to a review are skipped.
    pub async fn get_campground_detail(
        &self,
        id: &str,
    ) -> Result<Option<CampgroundDetail>, AppError> {
        let Some(campground) = self.get_campground(id).await? else {
            return Ok(None);
        };

        let author = sqlx::query("SELECT username FROM users WHERE id = ?")
            .bind(&campground.author)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| AuthorRef {
                id: campground.author.clone(),
                username: row.get("username"),
            })
            .unwrap_or_else(|| AuthorRef::unknown(campground.author.clone()));

        let rows = sqlx::query(
            r#"SELECT r.id, r.body, r.rating, r.author_id, r.created_at,
                      u.username AS author_username
               FROM campgrounds c, json_each(c.review_ids) AS j
               JOIN reviews r ON r.id = j.value
               LEFT JOIN users u ON u.id = r.author_id
               WHERE c.id = ?
               ORDER BY j.key"#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let reviews = rows.iter().map(review_detail_from_row).collect();

        Ok(Some(CampgroundDetail {
            campground,
            author,
            reviews,
        }))
    }

    /// Persist an enriched campground.
    pub async fn create_campground(&self, new: &NewCampground) -> Result<Campground, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let geometry_json = serde_json::to_string(&new.geometry)?;
        let images_json = serde_json::to_string(&new.images)?;

        sqlx::query(
            r#"INSERT INTO campgrounds
                (id, title, price, description, location, geometry, images, author_id, review_ids, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, ?)"#,
        )
        .bind(&id)
        .bind(&new.input.title)
        .bind(new.input.price)
        .bind(&new.input.description)
        .bind(&new.input.location)
        .bind(&geometry_json)
        .bind(&images_json)
        .bind(&new.author)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Campground {
            id,
            title: new.input.title.clone(),
            price: new.input.price,
            description: new.input.description.clone(),
            location: new.input.location.clone(),
            geometry: new.geometry,
            images: new.images.clone(),
            author: new.author.clone(),
            reviews: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Overwrite the editable fields and append `new_images`.
    ///
    /// Author, geometry and reviews are left untouched.
    pub async fn update_campground(
        &self,
        id: &str,
        input: &CampgroundInput,
        new_images: &[ImageRef],
    ) -> Result<Campground, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {CAMPGROUND_COLUMNS} FROM campgrounds WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let existing = row
            .as_ref()
            .map(campground_from_row)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("Campground {} not found", id)))?;

        let mut images = existing.images;
        images.extend_from_slice(new_images);
        let images_json = serde_json::to_string(&images)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"UPDATE campgrounds SET
                title = ?, price = ?, description = ?, location = ?, images = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&input.title)
        .bind(input.price)
        .bind(&input.description)
        .bind(&input.location)
        .bind(&images_json)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Campground {
            id: id.to_string(),
            title: input.title.clone(),
            price: input.price,
            description: input.description.clone(),
            location: input.location.clone(),
            geometry: existing.geometry,
            images,
            author: existing.author,
            reviews: existing.reviews,
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    /// Delete a campground. Its reviews are left in place.
    pub async fn delete_campground(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM campgrounds WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Campground {} not found", id)));
        }

        Ok(())
    }

    // ==================== REVIEW OPERATIONS ====================

    /// Insert a review and append its id to the parent campground.
    ///
    /// Both writes share a transaction. The review is inserted first so that a
    /// failure between the steps could only leak a review, never leave a
    /// dangling id on the campground.
    pub async fn create_review(
        &self,
        campground_id: &str,
        author_id: &str,
        input: &ReviewInput,
    ) -> Result<Review, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO reviews (id, body, rating, author_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&input.body)
        .bind(input.rating)
        .bind(author_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "UPDATE campgrounds SET review_ids = json_insert(review_ids, '$[#]', ?) WHERE id = ?",
        )
        .bind(&id)
        .bind(campground_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back the review insert.
            return Err(AppError::NotFound(format!(
                "Campground {} not found",
                campground_id
            )));
        }

        tx.commit().await?;

        Ok(Review {
            id,
            body: input.body.clone(),
            rating: input.rating,
            author: author_id.to_string(),
            created_at: now,
        })
    }

    /// Get a review by ID.
    pub async fn get_review(&self, id: &str) -> Result<Option<Review>, AppError> {
        let row =
            sqlx::query("SELECT id, body, rating, author_id, created_at FROM reviews WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.as_ref().map(review_from_row))
    }

    /// Pull the review id from its parent, then delete the review.
    ///
    /// Same ordering rule as [`Self::create_review`]: the reference goes first.
    pub async fn delete_review(&self, campground_id: &str, review_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"UPDATE campgrounds SET review_ids = (
                   SELECT json_group_array(j.value)
                   FROM json_each(campgrounds.review_ids) AS j
                   WHERE j.value <> ?
               )
               WHERE id = ?"#,
        )
        .bind(review_id)
        .bind(campground_id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(review_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Review {} not found", review_id)));
        }

        tx.commit().await?;
        Ok(())
    }
}

// Helper functions for row conversion

fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }
}

fn campground_from_row(row: &SqliteRow) -> Result<Campground, AppError> {
    let geometry: String = row.get("geometry");
    let images: String = row.get("images");
    let review_ids: String = row.get("review_ids");

    Ok(Campground {
        id: row.get("id"),
        title: row.get("title"),
        price: row.get("price"),
        description: row.get("description"),
        location: row.get("location"),
        geometry: serde_json::from_str::<Geometry>(&geometry)?,
        images: serde_json::from_str(&images)?,
        author: row.get("author_id"),
        reviews: serde_json::from_str(&review_ids)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn review_from_row(row: &SqliteRow) -> Review {
    Review {
        id: row.get("id"),
        body: row.get("body"),
        rating: row.get("rating"),
        author: row.get("author_id"),
        created_at: row.get("created_at"),
    }
}

fn review_detail_from_row(row: &SqliteRow) -> ReviewDetail {
    let author_id: String = row.get("author_id");
    let author_username: Option<String> = row.get("author_username");
    ReviewDetail {
        id: row.get("id"),
        body: row.get("body"),
        rating: row.get("rating"),
        author: match author_username {
            Some(username) => AuthorRef {
                id: author_id,
                username,
            },
            None => AuthorRef::unknown(author_id),
        },
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    struct Fixture {
        repo: Repository,
        owner: User,
        reviewer: User,
        _temp_dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("repo.sqlite"))
            .await
            .unwrap();
        let repo = Repository::new(pool);
        let owner = repo
            .create_user("owner", "owner@example.com", "$argon2id$fake")
            .await
            .unwrap();
        let reviewer = repo
            .create_user("reviewer", "reviewer@example.com", "$argon2id$fake")
            .await
            .unwrap();
        Fixture {
            repo,
            owner,
            reviewer,
            _temp_dir: temp_dir,
        }
    }

    fn new_campground(author: &User, title: &str) -> NewCampground {
        NewCampground {
            input: CampgroundInput {
                title: title.to_string(),
                price: 20.0,
                description: "Shady sites by the river".to_string(),
                location: "Moab, Utah".to_string(),
            },
            geometry: Geometry::point(-109.55, 38.57),
            images: vec![ImageRef {
                url: "https://img.example.com/a.jpg".to_string(),
                filename: "YelpCamp/a".to_string(),
            }],
            author: author.id.clone(),
        }
    }

    fn review(body: &str, rating: i64) -> ReviewInput {
        ReviewInput {
            body: body.to_string(),
            rating,
        }
    }

    #[tokio::test]
    async fn test_campground_round_trip_and_listing() {
        let f = fixture().await;
        let created = f
            .repo
            .create_campground(&new_campground(&f.owner, "River Bend"))
            .await
            .unwrap();

        let fetched = f.repo.get_campground(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.author, f.owner.id);

        let listed = f.repo.list_campgrounds().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(f.repo.get_campground("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_overwrites_fields_and_appends_images() {
        let f = fixture().await;
        let created = f
            .repo
            .create_campground(&new_campground(&f.owner, "River Bend"))
            .await
            .unwrap();

        let input = CampgroundInput {
            title: "River Bend North".to_string(),
            price: 25.0,
            description: "More shade".to_string(),
            location: "Green River, Utah".to_string(),
        };
        let extra = ImageRef {
            url: "https://img.example.com/b.jpg".to_string(),
            filename: "YelpCamp/b".to_string(),
        };
        f.repo
            .update_campground(&created.id, &input, std::slice::from_ref(&extra))
            .await
            .unwrap();

        let stored = f.repo.get_campground(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "River Bend North");
        assert_eq!(stored.location, "Green River, Utah");
        assert_eq!(stored.author, f.owner.id);
        assert_eq!(stored.geometry, created.geometry);
        assert_eq!(stored.images.len(), 2);
        assert_eq!(stored.images[0], created.images[0]);
        assert_eq!(stored.images[1], extra);

        let missing = f.repo.update_campground("missing", &input, &[]).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_deep_read_resolves_reviews_and_authors() {
        let f = fixture().await;
        let camp = f
            .repo
            .create_campground(&new_campground(&f.owner, "River Bend"))
            .await
            .unwrap();
        let first = f
            .repo
            .create_review(&camp.id, &f.reviewer.id, &review("Great", 5))
            .await
            .unwrap();
        let second = f
            .repo
            .create_review(&camp.id, &f.owner.id, &review("Thanks!", 4))
            .await
            .unwrap();

        let detail = f
            .repo
            .get_campground_detail(&camp.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.author.username, "owner");
        assert_eq!(detail.campground.reviews, vec![first.id.clone(), second.id.clone()]);
        let ids: Vec<_> = detail.reviews.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
        assert_eq!(detail.reviews[0].author.username, "reviewer");
        assert_eq!(detail.reviews[1].author.username, "owner");
    }

    #[tokio::test]
    async fn test_dangling_review_id_does_not_break_read() {
        let f = fixture().await;
        let camp = f
            .repo
            .create_campground(&new_campground(&f.owner, "River Bend"))
            .await
            .unwrap();
        let kept = f
            .repo
            .create_review(&camp.id, &f.reviewer.id, &review("Kept", 3))
            .await
            .unwrap();
        let gone = f
            .repo
            .create_review(&camp.id, &f.reviewer.id, &review("Gone", 2))
            .await
            .unwrap();

        // Simulate the half-finished delete: review row removed, id still listed.
        sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(&gone.id)
            .execute(&f.repo.pool)
            .await
            .unwrap();

        let detail = f
            .repo
            .get_campground_detail(&camp.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.campground.reviews.len(), 2);
        assert_eq!(detail.reviews.len(), 1);
        assert_eq!(detail.reviews[0].id, kept.id);
    }

    #[tokio::test]
    async fn test_delete_review_pulls_reference() {
        let f = fixture().await;
        let camp = f
            .repo
            .create_campground(&new_campground(&f.owner, "River Bend"))
            .await
            .unwrap();
        let a = f
            .repo
            .create_review(&camp.id, &f.reviewer.id, &review("A", 3))
            .await
            .unwrap();
        let b = f
            .repo
            .create_review(&camp.id, &f.reviewer.id, &review("B", 4))
            .await
            .unwrap();

        f.repo.delete_review(&camp.id, &a.id).await.unwrap();

        assert!(f.repo.get_review(&a.id).await.unwrap().is_none());
        let stored = f.repo.get_campground(&camp.id).await.unwrap().unwrap();
        assert_eq!(stored.reviews, vec![b.id.clone()]);

        f.repo.delete_review(&camp.id, &b.id).await.unwrap();
        let stored = f.repo.get_campground(&camp.id).await.unwrap().unwrap();
        assert!(stored.reviews.is_empty());

        let again = f.repo.delete_review(&camp.id, &b.id).await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_review_on_missing_campground_is_rolled_back() {
        let f = fixture().await;
        let result = f
            .repo
            .create_review("missing", &f.reviewer.id, &review("Orphan", 3))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let row = sqlx::query("SELECT COUNT(*) AS n FROM reviews")
            .fetch_one(&f.repo.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 0);
    }

    #[tokio::test]
    async fn test_delete_campground_leaves_reviews_orphaned() {
        let f = fixture().await;
        let doomed = f
            .repo
            .create_campground(&new_campground(&f.owner, "Doomed"))
            .await
            .unwrap();
        let survivor = f
            .repo
            .create_campground(&new_campground(&f.owner, "Survivor"))
            .await
            .unwrap();
        let orphan = f
            .repo
            .create_review(&doomed.id, &f.reviewer.id, &review("Orphan", 1))
            .await
            .unwrap();

        f.repo.delete_campground(&doomed.id).await.unwrap();

        let listed = f.repo.list_campgrounds().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, survivor.id);
        assert!(f.repo.get_review(&orphan.id).await.unwrap().is_some());

        let again = f.repo.delete_campground(&doomed.id).await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_username_lookup_is_case_insensitive() {
        let f = fixture().await;
        let creds = f
            .repo
            .find_credentials_by_username("OWNER")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds.user, f.owner);
        assert_eq!(creds.password_hash, "$argon2id$fake");
    }
}
