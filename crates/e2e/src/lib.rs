//! viewkit E2E Test Framework
//!
//! Drives the viewkit web application the way a user would:
//! - Starts the application in-process, as a subprocess, or attaches to a running one
//! - Issues HTTP requests and queries the returned markup (request specs)
//! - Drives a real browser over the W3C WebDriver protocol (system specs)
//! - Parses declarative YAML test specs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── start_server() -> ServerHandle                       │
//! │    ├── DriverHandle::connect() -> Session (system specs)    │
//! │    └── run_spec(spec: TestSpec) -> TestResult               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSpec (YAML)                                            │
//! │    ├── name, description, tags                              │
//! │    └── steps: [Step]                                        │
//! │          ├── request { path, method?, expect_status? }      │
//! │          ├── assert_css { selector, count?, text? }         │
//! │          ├── visit { path, wait_for_selector? }             │
//! │          ├── assert_selector { selector, count? }           │
//! │          └── log { message }                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Specs that need a browser are skipped when no driver is configured, so
//! the request specs run anywhere.

pub mod driver;
pub mod error;
pub mod request;
pub mod runner;
pub mod server;
pub mod spec;

pub use driver::{Browser, DriverConfig, DriverHandle, Session};
pub use error::{E2eError, E2eResult};
pub use runner::{Outcome, RunnerConfig, TestResult, TestRunner, TestSuiteResult};
pub use server::{ServerConfig, ServerHandle, Target};
pub use spec::{TestSpec, TestStep};
