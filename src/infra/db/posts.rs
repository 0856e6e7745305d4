use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use url::Url;

use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::criteria::{FilterCriteria, PostLimit};
use crate::domain::entities::PostRecord;
use crate::domain::types::{PostStatus, PostType};

use super::PostgresRepositories;
use super::map_sqlx_error;

const SELECT_POSTS: &str = "SELECT p.id, p.title, p.post_type, p.published_at, p.permalink, \
     ARRAY(SELECT pc.category_id FROM post_categories pc \
           WHERE pc.post_id = p.id ORDER BY pc.category_id) AS category_ids \
     FROM posts p WHERE p.status = ";

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) post_type: String,
    pub(crate) published_at: OffsetDateTime,
    pub(crate) permalink: String,
    pub(crate) category_ids: Vec<i64>,
}

impl TryFrom<PostRow> for PostRecord {
    type Error = RepoError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let post_type = row.post_type.parse::<PostType>().map_err(|err| {
            RepoError::from_persistence(format!("post {} has {err}", row.id))
        })?;
        let permalink = Url::parse(&row.permalink).map_err(|err| {
            RepoError::from_persistence(format!("post {} has invalid permalink: {err}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            title: row.title,
            post_type,
            published_at: row.published_at,
            permalink,
            category_ids: row.category_ids.into_iter().collect::<BTreeSet<_>>(),
        })
    }
}

impl PostgresRepositories {
    fn apply_criteria<'q>(qb: &mut QueryBuilder<'q, Postgres>, criteria: &FilterCriteria) {
        match criteria.post_type {
            PostType::Any => {
                qb.push(" AND p.post_type IN ('post', 'page') ");
            }
            requested => {
                qb.push(" AND p.post_type = ");
                qb.push_bind(requested.as_str());
            }
        }

        if let Some(from) = criteria.date_from {
            qb.push(" AND (p.published_at AT TIME ZONE 'UTC')::date >= ");
            qb.push_bind(from);
        }
        if let Some(to) = criteria.date_to {
            qb.push(" AND (p.published_at AT TIME ZONE 'UTC')::date <= ");
            qb.push_bind(to);
        }

        if let Some(category) = criteria.category_id {
            qb.push(
                " AND EXISTS (SELECT 1 FROM post_categories pc WHERE pc.post_id = p.id AND pc.category_id = ",
            );
            qb.push_bind(category);
            qb.push(")");
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn fetch_posts(&self, criteria: &FilterCriteria) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(SELECT_POSTS);
        qb.push_bind(PostStatus::Published.as_str());
        Self::apply_criteria(&mut qb, criteria);
        qb.push(" ORDER BY p.published_at DESC, p.id DESC ");

        if let PostLimit::AtMost(limit) = criteria.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit.get()));
        }

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(PostRecord::try_from).collect()
    }
}
