//! Repository support for entity data access
//!
//! [`QueryFactory`] is the entry point for building queries against a pool.
//! [`RepositorySupport`] adds paging on top of it for one root entity:
//!
//! ```rust,ignore
//! use rosterql::db::entities::MEMBER;
//!
//! let support = RepositorySupport::new(pool.clone(), MEMBER);
//! let page = support
//!     .apply_pagination(&PageRequest::of(0, 20)?, |q| {
//!         q.select_from(MEMBER).filter(MEMBER.age.goe(20))
//!     })
//!     .await?;
//! ```

use sqlx::SqlitePool;

use super::builder::SelectQuery;
use super::pagination::{Page, PageRequest};
use super::projection::{EntityPath, Projection};
use crate::error::Result;

/// Builds queries bound to a connection pool.
#[derive(Clone)]
pub struct QueryFactory {
    pool: SqlitePool,
}

impl QueryFactory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a query with an explicit projection; add FROM items next.
    pub fn select<P: Projection>(&self, projection: P) -> SelectQuery<P> {
        SelectQuery::new(self.pool.clone(), projection)
    }

    /// Select the entity itself from its own table.
    pub fn select_from<Q: EntityPath>(&self, entity: Q) -> SelectQuery<Q> {
        SelectQuery::new(self.pool.clone(), entity).from(entity)
    }
}

/// Paging helpers for repositories rooted at one entity path.
#[derive(Clone)]
pub struct RepositorySupport<Q: EntityPath> {
    factory: QueryFactory,
    path: Q,
}

impl<Q: EntityPath> RepositorySupport<Q> {
    pub fn new(pool: SqlitePool, path: Q) -> Self {
        Self {
            factory: QueryFactory::new(pool),
            path,
        }
    }

    pub fn factory(&self) -> &QueryFactory {
        &self.factory
    }

    pub fn path(&self) -> Q {
        self.path
    }

    pub fn select<P: Projection>(&self, projection: P) -> SelectQuery<P> {
        self.factory.select(projection)
    }

    pub fn select_from(&self, entity: Q) -> SelectQuery<Q> {
        self.factory.select_from(entity)
    }

    /// Apply the request's sort (through the root path) and offset/limit.
    pub fn paginate<P: Projection>(
        &self,
        query: SelectQuery<P>,
        request: &PageRequest,
    ) -> Result<SelectQuery<P>> {
        let mut query = query.order_by_sort(self.path, request.sort())?;
        if let Some(size) = request.page_size() {
            query = query.offset(request.offset()).limit(size);
        }
        Ok(query)
    }

    /// Page through `content`; the total is counted with the same query.
    pub async fn apply_pagination<P, F>(
        &self,
        request: &PageRequest,
        content: F,
    ) -> Result<Page<P::Output>>
    where
        P: Projection,
        F: FnOnce(&QueryFactory) -> SelectQuery<P>,
    {
        let query = content(&self.factory);
        let items = self.paginate(query.clone(), request)?.fetch().await?;
        Page::resolve(items, request.clone(), || query.fetch_count()).await
    }

    /// Page through `content`; the total comes from a separately shaped
    /// `count` query, skipped when the content alone settles it.
    pub async fn apply_pagination_with_count<P, C, F, G>(
        &self,
        request: &PageRequest,
        content: F,
        count: G,
    ) -> Result<Page<P::Output>>
    where
        P: Projection,
        C: Projection,
        F: FnOnce(&QueryFactory) -> SelectQuery<P>,
        G: FnOnce(&QueryFactory) -> SelectQuery<C>,
    {
        let query = content(&self.factory);
        let items = self.paginate(query, request)?.fetch().await?;
        let factory = &self.factory;
        Page::resolve(items, request.clone(), || async move {
            count(factory).fetch_count().await
        })
        .await
    }
}
