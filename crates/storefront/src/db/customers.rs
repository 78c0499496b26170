//! Customer and address repository.
//!
//! Customers are keyed by their lowercased email. Writes take a
//! `PgConnection` so they can join the caller's transaction.

use sqlx::{PgConnection, PgPool};

use katana_forge_core::checkout::Address;
use katana_forge_core::{AddressId, AddressKind, CustomerId, Email};

use super::RepositoryError;
use crate::models::{Customer, StoredAddress};

const CUSTOMER_COLUMNS: &str = "id, email, first_name, last_name, phone";

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: CustomerId,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            email: Email::parse(&row.email).map_err(|e| RepositoryError::corrupt("email", e))?,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    kind: AddressKind,
    company: Option<String>,
    vat_number: Option<String>,
    line1: String,
    line2: Option<String>,
    city: String,
    postal_code: String,
    country: String,
}

impl From<AddressRow> for StoredAddress {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            address: Address {
                company: row.company,
                vat_number: row.vat_number,
                line1: row.line1,
                line2: row.line2,
                city: row.city,
                postal_code: row.postal_code,
                country: row.country.trim().to_owned(),
            },
        }
    }
}

/// Contact details written on checkout.
#[derive(Debug, Clone, Copy)]
pub struct CustomerDetails<'a> {
    pub email: &'a Email,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: Option<&'a str>,
}

/// Repository for customers and their addresses.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM storefront.customer WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// Create the customer or refresh their name and phone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        conn: &mut PgConnection,
        details: CustomerDetails<'_>,
    ) -> Result<Customer, RepositoryError> {
        let row: CustomerRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.customer (id, email, first_name, last_name, phone)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
                SET first_name = EXCLUDED.first_name,
                    last_name = EXCLUDED.last_name,
                    phone = EXCLUDED.phone,
                    updated_at = NOW()
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(CustomerId::random())
        .bind(details.email.as_str())
        .bind(details.first_name)
        .bind(details.last_name)
        .bind(details.phone)
        .fetch_one(conn)
        .await?;

        row.try_into()
    }

    /// Create the customer or refresh their name, leaving the phone alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert_name(
        conn: &mut PgConnection,
        email: &Email,
        first_name: &str,
        last_name: &str,
    ) -> Result<Customer, RepositoryError> {
        let row: CustomerRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.customer (id, email, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
                SET first_name = EXCLUDED.first_name,
                    last_name = EXCLUDED.last_name,
                    updated_at = NOW()
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(CustomerId::random())
        .bind(email.as_str())
        .bind(first_name)
        .bind(last_name)
        .fetch_one(conn)
        .await?;

        row.try_into()
    }

    /// Attach a new address to a customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_address(
        conn: &mut PgConnection,
        customer_id: CustomerId,
        kind: AddressKind,
        address: &Address,
    ) -> Result<StoredAddress, RepositoryError> {
        let row: AddressRow = sqlx::query_as(
            r"
            INSERT INTO storefront.address
                (id, customer_id, kind, company, vat_number, line1, line2, city, postal_code, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, kind, company, vat_number, line1, line2, city, postal_code, country
            ",
        )
        .bind(AddressId::random())
        .bind(customer_id)
        .bind(kind)
        .bind(address.company.as_deref())
        .bind(address.vat_number.as_deref())
        .bind(&address.line1)
        .bind(address.line2.as_deref())
        .bind(&address.city)
        .bind(&address.postal_code)
        .bind(&address.country)
        .fetch_one(conn)
        .await?;

        Ok(row.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_row_normalizes_email() {
        let customer = Customer::try_from(CustomerRow {
            id: CustomerId::random(),
            email: "Aiko@Example.com".to_owned(),
            first_name: "Aiko".to_owned(),
            last_name: "Tanaka".to_owned(),
            phone: None,
        })
        .unwrap();
        assert_eq!(customer.email.as_str(), "aiko@example.com");
        assert_eq!(customer.full_name(), "Aiko Tanaka");
    }

    #[test]
    fn test_address_row_trims_country() {
        let stored = StoredAddress::from(AddressRow {
            id: AddressId::random(),
            kind: AddressKind::Billing,
            company: None,
            vat_number: None,
            line1: "1 Rue".to_owned(),
            line2: None,
            city: "Lyon".to_owned(),
            postal_code: "69001".to_owned(),
            country: "FR".to_owned(),
        });
        assert_eq!(stored.address.country, "FR");
        assert_eq!(stored.kind, AddressKind::Billing);
    }
}
