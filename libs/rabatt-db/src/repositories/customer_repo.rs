use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::customer::Customer;

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, external_ref: &str, full_name: Option<&str>) -> Result<Customer> {
        sqlx::query_as::<_, Customer>(
            "INSERT INTO customers (external_ref, full_name) VALUES ($1, $2) RETURNING *",
        )
        .bind(external_ref)
        .bind(full_name)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create customer")
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Customer>> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch customer by ID")
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customers WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check customer existence")
    }
}
