//! Built-in backend that answers from sample databases
//!
//! Used for `backend.mode: demo` and as the source of the databases the
//! HTTP client falls back to for a local root login.

use async_trait::async_trait;
use pipeloom_core::schema::{Column, Table, TableSelection};
use pipeloom_core::Credential;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::backend::Backend;
use crate::error::{Error, Result};

/// Databases every demo login can see
pub const DEMO_DATABASES: [&str; 3] = ["airportdb", "employees", "sakila"];

/// Rows generated per demo table
const DEMO_ROWS: usize = 120;

fn int(name: &str) -> Column {
    Column::new(name, "int")
}

fn text(name: &str, len: u16) -> Column {
    Column::new(name, format!("varchar({})", len))
}

fn airportdb() -> Vec<Table> {
    vec![
        Table::new(
            "airline",
            vec![
                int("airline_id").primary_key(),
                Column::new("iata", "char(2)"),
                text("airlinename", 30),
                int("base_airport").references("airport.airport_id"),
            ],
        ),
        Table::new(
            "airport",
            vec![
                int("airport_id").primary_key(),
                Column::new("iata", "char(3)"),
                Column::new("icao", "char(4)"),
                text("name", 50),
            ],
        ),
        Table::new(
            "flight",
            vec![
                int("flight_id").primary_key(),
                Column::new("flightno", "char(8)"),
                int("from").references("airport.airport_id"),
                int("to").references("airport.airport_id"),
                Column::new("departure", "datetime"),
                Column::new("arrival", "datetime"),
                int("airline_id").references("airline.airline_id"),
            ],
        ),
        Table::new(
            "passenger",
            vec![
                int("passenger_id").primary_key(),
                Column::new("passportno", "char(9)"),
                text("firstname", 100),
                text("lastname", 100),
            ],
        ),
        Table::new(
            "booking",
            vec![
                int("booking_id").primary_key(),
                int("flight_id").references("flight.flight_id"),
                Column::new("seat", "char(4)"),
                int("passenger_id").references("passenger.passenger_id"),
                Column::new("price", "decimal(10,2)"),
            ],
        ),
    ]
}

fn employees() -> Vec<Table> {
    vec![
        Table::new(
            "employees",
            vec![
                int("emp_no").primary_key(),
                Column::new("birth_date", "date"),
                text("first_name", 14),
                text("last_name", 16),
                Column::new("gender", "enum('M','F')"),
                Column::new("hire_date", "date"),
            ],
        ),
        Table::new(
            "departments",
            vec![
                Column::new("dept_no", "char(4)").primary_key(),
                text("dept_name", 40),
            ],
        ),
        Table::new(
            "dept_emp",
            vec![
                int("emp_no").primary_key().references("employees.emp_no"),
                Column::new("dept_no", "char(4)")
                    .primary_key()
                    .references("departments.dept_no"),
                Column::new("from_date", "date"),
                Column::new("to_date", "date"),
            ],
        ),
        Table::new(
            "salaries",
            vec![
                int("emp_no").primary_key().references("employees.emp_no"),
                int("salary"),
                Column::new("from_date", "date").primary_key(),
                Column::new("to_date", "date"),
            ],
        ),
    ]
}

fn sakila() -> Vec<Table> {
    vec![
        Table::new(
            "actor",
            vec![
                int("actor_id").primary_key(),
                text("first_name", 45),
                text("last_name", 45),
                Column::new("last_update", "timestamp"),
            ],
        ),
        Table::new(
            "film",
            vec![
                int("film_id").primary_key(),
                text("title", 128),
                Column::new("release_year", "year"),
                Column::new("rental_rate", "decimal(4,2)"),
                int("length"),
            ],
        ),
        Table::new(
            "film_actor",
            vec![
                int("actor_id").primary_key().references("actor.actor_id"),
                int("film_id").primary_key().references("film.film_id"),
            ],
        ),
        Table::new(
            "customer",
            vec![
                int("customer_id").primary_key(),
                text("first_name", 45),
                text("last_name", 45),
                text("email", 50),
                Column::new("active", "boolean"),
            ],
        ),
        Table::new(
            "rental",
            vec![
                int("rental_id").primary_key(),
                Column::new("rental_date", "datetime"),
                int("customer_id").references("customer.customer_id"),
                Column::new("return_date", "datetime"),
            ],
        ),
    ]
}

/// Tables of a demo database
pub fn demo_tables(database: &str) -> Option<Vec<Table>> {
    match database {
        "airportdb" => Some(airportdb()),
        "employees" => Some(employees()),
        "sakila" => Some(sakila()),
        _ => None,
    }
}

fn sample_value(column: &Column, row: usize) -> Value {
    let n = row + 1;
    let ty = column.data_type.to_ascii_lowercase();
    if column.reference_target().is_some() && !column.is_primary_key {
        // stays inside the referenced table's id range
        return Value::from(((row * 7) % DEMO_ROWS + 1) as i64);
    }
    if ty.starts_with("int") || ty == "year" {
        Value::from(n as i64)
    } else if ty.starts_with("decimal") {
        serde_json::Number::from_f64(n as f64 * 10.5)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if ty == "boolean" {
        Value::Bool(n % 3 != 0)
    } else if ty == "date" {
        Value::from(format!("2024-{:02}-{:02}", row % 12 + 1, row % 28 + 1))
    } else if ty == "datetime" || ty == "timestamp" {
        Value::from(format!(
            "2024-{:02}-{:02}T{:02}:00:00",
            row % 12 + 1,
            row % 28 + 1,
            row % 24
        ))
    } else if ty.starts_with("enum") {
        Value::from(if n % 2 == 0 { "F" } else { "M" })
    } else {
        Value::from(format!("{}_{}", column.name, n))
    }
}

fn sample_rows(table: &Table, limit: usize) -> Vec<Value> {
    (0..DEMO_ROWS.min(limit))
        .map(|row| {
            let record: Map<String, Value> = table
                .columns
                .iter()
                .map(|c| (c.name.clone(), sample_value(c, row)))
                .collect();
            Value::Object(record)
        })
        .collect()
}

/// Backend serving the sample databases after an artificial delay.
///
/// Hosts containing `unreachable` or ending in `.invalid` cannot be
/// reached, and the password `wrong` is refused.
#[derive(Debug, Clone, Default)]
pub struct DemoBackend {
    latency: Duration,
}

impl DemoBackend {
    /// Demo backend that answers immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every answer by `latency`
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn check_login(credential: &Credential) -> Result<()> {
        let host = credential.require_host()?;
        if host.contains("unreachable") || host.ends_with(".invalid") {
            return Err(Error::Unreachable {
                host: host.to_string(),
            });
        }
        if credential.password.as_ref().is_some_and(|p| p.expose() == "wrong") {
            return Err(Error::Rejected {
                message: format!(
                    "Access denied for user '{}'@'{}'",
                    credential.username_or_empty(),
                    host
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for DemoBackend {
    async fn connect(&self, credential: &Credential) -> Result<Vec<String>> {
        self.pause().await;
        Self::check_login(credential)?;
        Ok(DEMO_DATABASES.iter().map(|d| d.to_string()).collect())
    }

    async fn select_database(&self, credential: &Credential) -> Result<Vec<Table>> {
        self.pause().await;
        Self::check_login(credential)?;
        let database = credential.require_database()?;
        demo_tables(database).ok_or_else(|| Error::Rejected {
            message: format!("Unknown database '{}'", database),
        })
    }

    async fn preview_table(
        &self,
        credential: &Credential,
        table: &TableSelection,
        limit: usize,
    ) -> Result<Vec<Value>> {
        self.pause().await;
        Self::check_login(credential)?;
        let found = demo_tables(&table.schema)
            .and_then(|tables| tables.into_iter().find(|t| t.name == table.table))
            .ok_or_else(|| Error::Rejected {
                message: format!("Table '{}' doesn't exist", table.qualified_name()),
            })?;
        Ok(sample_rows(&found, limit))
    }

    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "demo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeloom_core::DbEngine;

    fn root() -> Credential {
        Credential::new(DbEngine::Mysql, "localhost").with_username("root")
    }

    #[tokio::test]
    async fn test_connect_lists_demo_databases() {
        let databases = DemoBackend::new().connect(&root()).await.unwrap();
        assert_eq!(databases, DEMO_DATABASES.to_vec());
    }

    #[tokio::test]
    async fn test_unreachable_host_fails() {
        let credential = Credential::new(DbEngine::Mysql, "unreachable.example");
        let err = DemoBackend::new().connect(&credential).await.unwrap_err();
        assert!(matches!(err, Error::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let err = DemoBackend::new()
            .connect(&root().with_password("wrong"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Access denied"));
    }

    #[tokio::test]
    async fn test_select_database_returns_tables_with_keys() {
        let tables = DemoBackend::new()
            .select_database(&root().with_database("airportdb"))
            .await
            .unwrap();
        let flight = tables.iter().find(|t| t.name == "flight").unwrap();
        assert_eq!(flight.primary_key(), vec!["flight_id"]);
        assert_eq!(
            flight.column("airline_id").unwrap().reference_target(),
            Some(("airline", "airline_id"))
        );
    }

    #[tokio::test]
    async fn test_unknown_database_is_rejected() {
        let result = DemoBackend::new()
            .select_database(&root().with_database("nope"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_preview_respects_limit() {
        let rows = DemoBackend::new()
            .preview_table(&root(), &TableSelection::new("sakila", "customer"), 50)
            .await
            .unwrap();
        assert_eq!(rows.len(), 50);
        assert_eq!(rows[0]["customer_id"], 1);
        assert_eq!(rows[0]["email"], "email_1");
        assert!(rows[0]["active"].is_boolean());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_simulated() {
        let backend = DemoBackend::with_latency(Duration::from_millis(300));
        let started = tokio::time::Instant::now();
        backend.connect(&root()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_every_demo_reference_resolves() {
        for db in DEMO_DATABASES {
            let tables = demo_tables(db).unwrap();
            for column in tables.iter().flat_map(|t| &t.columns) {
                if let Some((table, col)) = column.reference_target() {
                    let target = tables.iter().find(|t| t.name == table).unwrap();
                    assert!(target.column(col).is_some(), "{db}: {table}.{col}");
                }
            }
        }
    }
}
