pub mod clock;
pub mod factory;
pub mod identity;
pub mod signing_key;
pub mod token_codec;

pub use clock::{Clock, SystemClock};
pub use factory::{build_authenticator, build_token_codec};
pub use identity::{Identity, IdentityDirectory, IdentityLookup, LookupError, Role};
pub use token_codec::{Claims, TokenCodec, TokenError};
