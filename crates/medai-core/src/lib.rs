pub mod disease;
pub mod error;
pub mod role;
pub mod time;

pub use disease::{Disease, Gender};
pub use error::{CoreError, Result};
pub use role::{ApprovalStatus, PatientApproval, Role, StaffRole};
pub use time::{DateBound, format_rfc3339, now_utc, parse_date_bound};
