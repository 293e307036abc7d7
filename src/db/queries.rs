use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::db::store::PersistenceError;
use crate::models::persona::Persona;
use crate::models::story::{
    NewStory, Story, StoryContent, StoryFormat, StoryStatus, PLACEHOLDER_BODY, PLACEHOLDER_TITLE,
};

fn status_names(statuses: &[StoryStatus]) -> Vec<String> {
    statuses.iter().map(ToString::to_string).collect()
}

fn story_from_row(row: &PgRow) -> Result<Story, PersistenceError> {
    let status_str: String = row.try_get("status")?;
    let status = StoryStatus::from_str(&status_str)
        .map_err(|_| PersistenceError::Corrupt(format!("unknown status '{status_str}'")))?;

    let format_strs: Vec<String> = row.try_get("requested_formats")?;
    let requested_formats = format_strs
        .iter()
        .map(|f| {
            StoryFormat::from_str(f)
                .map_err(|_| PersistenceError::Corrupt(format!("unknown format '{f}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Story {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        prompt: row.try_get("prompt")?,
        illustrations: row.try_get("illustrations")?,
        requested_formats,
        owner: row.try_get("owner_id")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert a placeholder story row
pub async fn create_story_placeholder(pool: &PgPool, new: &NewStory) -> Result<Uuid, sqlx::Error> {
    let formats: Vec<String> = new.formats.iter().map(ToString::to_string).collect();

    let row = sqlx::query(
        r#"
        INSERT INTO stories (id, title, body, prompt, illustrations, requested_formats, owner_id, status)
        VALUES ($1, $2, $3, $4, '{}', $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(PLACEHOLDER_TITLE)
    .bind(PLACEHOLDER_BODY)
    .bind(&new.prompt)
    .bind(formats)
    .bind(new.owner.as_deref())
    .bind(StoryStatus::InProgress.to_string())
    .fetch_one(pool)
    .await?;

    row.try_get("id")
}

/// Get a story by ID
pub async fn get_story(pool: &PgPool, id: Uuid) -> Result<Option<Story>, PersistenceError> {
    let row = sqlx::query(
        r#"
        SELECT id, title, body, prompt, illustrations, requested_formats, owner_id, status,
               created_at, updated_at
        FROM stories
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(story_from_row).transpose()
}

pub async fn get_story_status(pool: &PgPool, id: Uuid) -> Result<Option<StoryStatus>, PersistenceError> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM stories WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    status
        .map(|s| {
            StoryStatus::from_str(&s)
                .map_err(|_| PersistenceError::Corrupt(format!("unknown status '{s}'")))
        })
        .transpose()
}

/// Overwrite placeholder content. Only rows still in a predecessor status of
/// `status` are touched.
pub async fn update_story_content(
    pool: &PgPool,
    id: Uuid,
    content: &StoryContent,
    status: StoryStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE stories
        SET title = $1,
            body = $2,
            illustrations = $3,
            status = $4,
            updated_at = NOW()
        WHERE id = $5 AND status = ANY($6)
        "#,
    )
    .bind(&content.title)
    .bind(&content.body)
    .bind(&content.illustrations)
    .bind(status.to_string())
    .bind(id)
    .bind(status_names(status.predecessors()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Move a story forward in its lifecycle. Returns false when the row is
/// missing or not in a predecessor status.
pub async fn update_story_status(
    pool: &PgPool,
    id: Uuid,
    status: StoryStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE stories
        SET status = $1,
            updated_at = NOW()
        WHERE id = $2 AND status = ANY($3)
        "#,
    )
    .bind(status.to_string())
    .bind(id)
    .bind(status_names(status.predecessors()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_stories_for_owner(
    pool: &PgPool,
    owner: &str,
    limit: i64,
) -> Result<Vec<Story>, PersistenceError> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, body, prompt, illustrations, requested_formats, owner_id, status,
               created_at, updated_at
        FROM stories
        WHERE owner_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(owner)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(story_from_row).collect()
}

/// Count stories that finished but have not been opened yet
pub async fn count_new_stories(pool: &PgPool, owner: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM stories WHERE owner_id = $1 AND status = $2")
        .bind(owner)
        .bind(StoryStatus::New.to_string())
        .fetch_one(pool)
        .await
}

pub async fn get_active_persona(pool: &PgPool, owner: &str) -> Result<Option<Persona>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT name, personality_description, visual_description
        FROM personas
        WHERE owner_id = $1 AND is_active = TRUE
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(owner)
    .fetch_optional(pool)
    .await?;

    row.map(|r| -> Result<Persona, sqlx::Error> {
        Ok(Persona {
            name: r.try_get("name")?,
            personality_description: r.try_get("personality_description")?,
            visual_description: r.try_get("visual_description")?,
        })
    })
    .transpose()
}
