/// Router Module Index
///
/// Splits routes by access level so the bearer middleware is applied to a whole
/// router at once rather than handler by handler.

/// Routes open to anonymous callers.
pub mod public;

/// Routes protected by the bearer-token middleware.
pub mod authenticated;
