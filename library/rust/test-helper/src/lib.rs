#[cfg(feature = "jwt")]
pub mod jwt;
#[cfg(feature = "mock-server")]
pub mod mock_server;

#[cfg(feature = "jwt")]
pub use jwt::{RsaJwtTestHelper, TestClaims, TEST_AUDIENCE, TEST_ISSUER, TEST_KID};
#[cfg(feature = "mock-server")]
pub use mock_server::JwksMockServer;
