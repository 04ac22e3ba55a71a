pub mod auth;
pub mod content;
pub mod contract;
pub mod leads;
pub mod rate_limit;
pub mod store;

pub use auth::{AuthContext, AuthService, Role};
pub use content::ContentService;
pub use contract::{Contract, ContractRegistry};
pub use leads::LeadService;
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use store::Store;
