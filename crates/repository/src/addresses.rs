use crate::RepositoryError;
use async_trait::async_trait;
use tokio_postgres::Client;

/// # AddressesRepository
///
/// Read-only view of the address book maintained by the address subsystem.
/// Checkout only needs the ownership check.
#[async_trait]
pub trait AddressesRepository: Send + Sync {
    /// Returns `true` if the address exists and belongs to the customer.
    async fn belongs_to_customer(
        &self,
        address_id: i64,
        customer_id: i64,
    ) -> Result<bool, RepositoryError>;
}

/// PostgreSQL implementation of the [`AddressesRepository`] trait.
pub struct PgAddressesRepository {
    db: Client,
}

impl PgAddressesRepository {
    pub fn new(db: Client) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AddressesRepository for PgAddressesRepository {
    async fn belongs_to_customer(
        &self,
        address_id: i64,
        customer_id: i64,
    ) -> Result<bool, RepositoryError> {
        let query = "SELECT 1 FROM addresses WHERE id = $1 AND user_id = $2";
        let row = self.db.query_opt(query, &[&address_id, &customer_id]).await?;
        Ok(row.is_some())
    }
}
