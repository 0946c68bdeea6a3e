use crate::database::error::DatabaseError;
use async_trait::async_trait;

/// Base repository trait defining common store operations
/// All domain-specific repositories should implement this trait
#[async_trait]
pub trait Repository: Send + Sync {
    /// Associated type for the entity this repository manages
    type Entity: Send + Sync;

    /// Find an entity by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Self::Entity>, DatabaseError>;

    /// All entities in the repository's natural order
    async fn find_all(&self) -> Result<Vec<Self::Entity>, DatabaseError>;

    /// Insert the entity, or replace the stored one with the same ID
    async fn save(&self, entity: Self::Entity) -> Result<Self::Entity, DatabaseError>;

    /// Delete an entity by ID
    async fn delete(&self, id: &str) -> Result<bool, DatabaseError>;

    /// Check if an entity exists by ID
    async fn exists(&self, id: &str) -> Result<bool, DatabaseError> {
        match self.find_by_id(id).await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
