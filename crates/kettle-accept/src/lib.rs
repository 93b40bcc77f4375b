//! # Kettle Accept
//!
//! Media types and `Accept` header handling for the kettle router:
//! - Strict media type parsing (`application/json`)
//! - Client preference ranges with wildcards and q-values (`text/*;q=0.5`)
//! - RFC 7231 style quality lookup (most specific range wins)
//! - Content negotiation against a server-side offer list
//!
//! ## Example
//!
//! ```
//! use kettle_accept::{AcceptList, MediaType};
//!
//! let accept = AcceptList::parse("text/html, application/json;q=0.8");
//! let offers = [MediaType::json(), MediaType::html()];
//!
//! assert_eq!(accept.negotiate(&offers), Some(MediaType::html()));
//! ```

mod media_type;
mod preference;

pub use media_type::{MediaType, MediaTypeError};
pub use preference::{AcceptList, MediaRange};
