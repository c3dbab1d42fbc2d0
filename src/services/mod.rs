//! Services layer - Business logic
//!
//! - `auth`: accounts, sign-in and session resolution
//! - `context`: per-request context and the session guard
//! - `task`: the access-controlled task operations
//! - `password`: Argon2id hashing

pub mod auth;
pub mod context;
pub mod password;
pub mod task;

pub use auth::{AuthError, AuthService, SignInInput, SignUpInput, SignedIn};
pub use context::{
    extract_session_token, Caller, ContextBuilder, OwnerScope, RequestContext, SessionIdentity,
    SessionResolver,
};
pub use password::{hash_password, verify_password};
pub use task::{TaskError, TaskService};
