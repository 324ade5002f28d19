//! Backend gateway for a condo EV-charging rebate claims portal.
//!
//! Thin async facades (auth, claims, condos, admin, storage) over a
//! hosted backend-as-a-service. Every operation is a single pass-through
//! call to the remote service, which owns storage, row-level authorization,
//! and consistency; this crate only translates calls and normalizes remote
//! failures into [`Error`].
//!
//! The facades talk to three narrow seams ([`backend::Authenticator`],
//! [`backend::RecordStore`], [`backend::BlobStore`]), so the glue logic
//! runs unchanged against the REST bindings in production and the
//! in-memory fakes in tests.
//!
//! ```no_run
//! use evrebate::{Gateway, GatewayConfig};
//!
//! # async fn example() -> evrebate::Result<()> {
//! let gateway = Gateway::connect(&GatewayConfig::from_env());
//! gateway.auth().sign_in("resident@example.com", "password").await?;
//! let condos = gateway.condos().all().await?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod auth;
pub mod backend;
pub mod claims;
pub mod condos;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use admin::AdminFacade;
pub use auth::AuthFacade;
pub use backend::{AuthEvent, AuthSubscription, Backend};
pub use claims::ClaimsFacade;
pub use condos::CondoFacade;
pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use storage::StorageFacade;

/// The explicitly constructed client handle, built once at process start
/// and passed down to the UI layer. Stateless apart from the auth session;
/// no teardown is needed.
pub struct Gateway {
    auth: AuthFacade,
    claims: ClaimsFacade,
    condos: CondoFacade,
    admin: AdminFacade,
    storage: StorageFacade,
}

impl Gateway {
    /// Connect to the hosted service described by `config`.
    pub fn connect(config: &GatewayConfig) -> Self {
        Self::with_backend(backend::rest::connect(config))
    }

    /// Build a gateway over an injected backend; the seam the tests use.
    pub fn with_backend(backend: Backend) -> Self {
        Self {
            auth: AuthFacade::new(backend.clone()),
            claims: ClaimsFacade::new(backend.clone()),
            condos: CondoFacade::new(backend.clone()),
            admin: AdminFacade::new(backend.clone()),
            storage: StorageFacade::new(backend),
        }
    }

    pub fn auth(&self) -> &AuthFacade {
        &self.auth
    }

    pub fn claims(&self) -> &ClaimsFacade {
        &self.claims
    }

    pub fn condos(&self) -> &CondoFacade {
        &self.condos
    }

    pub fn admin(&self) -> &AdminFacade {
        &self.admin
    }

    pub fn storage(&self) -> &StorageFacade {
        &self.storage
    }
}
