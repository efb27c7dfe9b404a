//! Package-index query backends.
//! The resolver only sees `QueryBackend`; `WingetCli` is the production one.

mod table;
mod winget;

pub use table::parse_search_table;
pub use winget::{is_no_results_exit_code, WingetCli, NO_APPLICATIONS_FOUND_EXIT_CODE};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::types::{PackageQuery, PackageRecord};

/// Executes package-index queries.
///
/// Implementors should:
/// - Honor `cancel` while blocked on external I/O and return `CnfError::Cancelled`
/// - Return an empty list (not an error) when nothing matched
pub trait QueryBackend: Send + Sync {
    /// Short label for logs (e.g., "winget")
    fn name(&self) -> &str;

    fn execute(&self, query: &PackageQuery, cancel: &CancelToken) -> Result<Vec<PackageRecord>>;
}
