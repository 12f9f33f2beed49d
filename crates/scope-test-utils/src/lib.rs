//! # Scope Test Utilities
//!
//! Shared test utilities for the scope service.
//!
//! ## Modules
//!
//! - `fixtures` - Builder for actor forests and contacts over an in-memory store
//! - `harness` - In-process router driven with `tower::ServiceExt::oneshot`
//! - `assertions` - Invariant checks on statistics reports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scope_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let org = OrgFixture::new()
//!         .manager("Boss")
//!         .manager("Rep")
//!         .reports_to("Rep", "Boss")
//!         .contacts("Rep", 3);
//!     let app = TestApp::new(org.store());
//!
//!     let (status, body) = app.get("/api/v1/stats", Some(org.id("Boss"))).await?;
//!     assert_eq!(status, 200);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod harness;

pub use assertions::*;
pub use fixtures::*;
pub use harness::*;
