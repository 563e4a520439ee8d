//! Test harnesses.
//!
//! `AppHarness` wires the full router over in-memory stores and needs nothing
//! external. `PgHarness` runs against a shared Postgres container that is
//! started once and reused by every test in the binary.

use anyhow::{Context, Result};
use axum::Router;
use campus_core::domains::moderation::models::RuleInput;
use campus_core::kernel::{ServerDeps, TestDependencies};
use campus_core::server::{build_app, AxumAppState};
use sqlx::PgPool;
use std::sync::Arc;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

// =============================================================================
// In-memory application harness
// =============================================================================

pub struct AppHarness {
    pub stores: TestDependencies,
    pub deps: Arc<ServerDeps>,
    pub app: Router,
}

impl AppHarness {
    pub fn new() -> Self {
        Self::with_rules(Vec::new())
    }

    pub fn with_rules(rules: Vec<RuleInput>) -> Self {
        init_tracing();
        let stores = TestDependencies::with_rules(rules);
        let state = AxumAppState::new(None, stores.server_deps());
        let deps = state.deps.clone();
        let app = build_app(state, &[]);
        Self { stores, deps, app }
    }
}

/// Respect RUST_LOG in tests. Safe to call repeatedly.
/// Run tests with: RUST_LOG=debug cargo test -- --nocapture
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Postgres harness (requires Docker)
// =============================================================================

/// Shared test infrastructure that persists across all tests.
struct SharedTestInfra {
    db_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        init_tracing();

        let postgres = Postgres::default()
            .with_tag("16")
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!(
            "postgresql://postgres:postgres@{}:{}/postgres",
            pg_host, pg_port
        );

        // Run migrations once on the shared database
        let pool = PgPool::connect(&db_url)
            .await
            .context("Failed to connect to Postgres for migrations")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

pub struct PgHarness {
    /// Fresh pool on the shared database
    pub db_pool: PgPool,
}

impl PgHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;
        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .context("Failed to connect to test database")?;
        Ok(Self { db_pool })
    }
}
