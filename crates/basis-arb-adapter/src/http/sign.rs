/*
[INPUT]:  Request query strings and the account's API secret
[OUTPUT]: Hex-encoded HMAC-SHA256 signatures for signed endpoints
[POS]:    HTTP layer - request signing
[UPDATE]: When the venue changes its signing scheme
*/

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::http::error::{BinanceError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Sign the canonical query string with the API secret.
///
/// The venue signs the exact bytes of the query string (parameter order
/// matters); callers append the returned value as `signature=...`.
pub fn sign_query(secret: &str, query: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| BinanceError::Config(format!("invalid API secret: {err}")))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
