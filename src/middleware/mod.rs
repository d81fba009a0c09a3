//! Tower middleware layers applied ahead of the forwarding handler.
//!
//! [`scrub`] rewrites analytics beacon bodies before they reach
//! [`proxy::forward_handler`](crate::proxy::forward_handler).

pub mod scrub;
