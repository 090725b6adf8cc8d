//! Registration core: accounts, activation keys, workflows and signals.
//!
//! The [`Registrar`] ties everything together. HTTP handlers and the CLI only talk
//! to it; storage, email delivery and time are injected so the same code runs against
//! Postgres in production and an in-memory store in tests.

pub mod clock;
pub mod config;
pub mod email;
mod error;
pub mod forms;
pub mod keys;
pub mod models;
pub mod password;
mod registrar;
pub mod signals;
pub mod signing;
pub mod store;
pub mod workflow;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RegistrationConfig;
pub use email::{EmailMessage, EmailSender, LogEmailSender};
pub use error::{ActivationError, RegistrationError};
pub use forms::{FormErrors, FormPolicy, RegistrationForm};
pub use models::{NewUser, RegistrationProfile, User};
pub use registrar::{Registered, Registrar, ResendOutcome};
pub use signals::{ListenerId, RequestContext, Signal, Signals, UserActivated, UserRegistered};
pub use store::{MemoryStore, PgStore, RegistrationStore, SignupOutcome};
pub use workflow::Workflow;
