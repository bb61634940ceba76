/// Router Module Index
///
/// Routes are grouped by access level, and each group gets its access control as a
/// layer in `create_router`, never inside individual handlers.

/// Routes open to anyone.
pub mod public;

/// Routes that need a signed-in principal (`AuthUser`), whatever its role.
pub mod authenticated;

/// Role-scoped subtrees, each wrapped by the role guard middleware.
pub mod scoped;
