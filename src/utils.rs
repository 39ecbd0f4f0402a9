//! Identifier minting: uuid7 payloads behind human-readable bech32 prefixes

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

// prefixes used internally are static lowercase strings, parsing them can
// only fail on a programmer error
pub(crate) fn mint_id(prefix: &str) -> String {
    new_uuid_to_bech32(prefix).expect("invalid static id prefix")
}
