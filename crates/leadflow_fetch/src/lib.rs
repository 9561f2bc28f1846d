//! Fetch plane: one operation, `fetch(Source) -> RawPayload | FetchError`.
//!
//! Transport selection is a closed dispatch on the source type. Remote
//! failure is data, never a panic: every outcome is a typed `FetchError`
//! whose kind drives the retry policy. Credentials are resolved by name
//! through an injected resolver; the fetch plane never sees the
//! environment or the filesystem.

mod error;
mod retry;
mod secrets;
mod transport;

pub use error::{FetchError, FetchErrorKind};
pub use retry::fetch_with_retry;
pub use secrets::{SecretError, SecretResolver, StaticSecrets};
pub use transport::{FetchContext, HttpTransport, Transport};
