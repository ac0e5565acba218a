//! CIP-37 base32 address codec.
//!
//! Conflux Core Space addresses are base32 strings carrying a network
//! prefix (`cfx`, `cfxtest` or `net<N>`) and a 40-bit BCH checksum over the
//! prefix and payload. The payload is a version byte (currently always 0)
//! followed by the 20 address bytes.

use alloy_primitives::Address;
use thiserror::Error;

/// CIP-37 base32 alphabet. Excludes i, l, o and q.
const ALPHABET: &[u8; 32] = b"abcdefghjkmnprstuvwxyz0123456789";

const VERSION_BYTE: u8 = 0;

/// Conflux mainnet network id.
pub const MAINNET_ID: u32 = 1029;
/// Conflux testnet network id.
pub const TESTNET_ID: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base32 address '{0}'")]
    Invalid(String),
    #[error("checksum mismatch in '{0}'")]
    Checksum(String),
    #[error("address '{0}' belongs to another network (expected {1})")]
    WrongNetwork(String, String),
}

/// Network prefix for a CIP-37 address.
pub fn network_prefix(network_id: u32) -> String {
    match network_id {
        MAINNET_ID => "cfx".to_string(),
        TESTNET_ID => "cfxtest".to_string(),
        other => format!("net{other}"),
    }
}

/// Encode a 20-byte address into its CIP-37 base32 form.
pub fn encode(address: Address, network_id: u32) -> String {
    let prefix = network_prefix(network_id);

    let mut payload = Vec::with_capacity(21);
    payload.push(VERSION_BYTE);
    payload.extend_from_slice(address.as_slice());
    let data = convert_bits(&payload, 8, 5, true);

    let mut checksum_input = expand_prefix(&prefix);
    checksum_input.extend_from_slice(&data);
    checksum_input.extend_from_slice(&[0u8; 8]);
    let checksum = polymod(&checksum_input);

    let mut out = String::with_capacity(prefix.len() + 1 + data.len() + 8);
    out.push_str(&prefix);
    out.push(':');
    for &symbol in &data {
        out.push(ALPHABET[symbol as usize] as char);
    }
    for i in (0..8).rev() {
        let symbol = ((checksum >> (i * 5)) & 0x1f) as usize;
        out.push(ALPHABET[symbol] as char);
    }
    out
}

/// Decode a CIP-37 base32 address, verifying the checksum.
///
/// The network id is returned alongside the address so callers can reject
/// cross-network input.
pub fn decode(input: &str) -> Result<(Address, u32), AddressError> {
    let lower = input.to_ascii_lowercase();
    let (prefix, body) = lower
        .split_once(':')
        .ok_or_else(|| AddressError::Invalid(input.to_string()))?;
    // CIP-37 allows an optional verbose type annotation ("type.user:...");
    // a second colon separates it from the payload.
    let body = body.rsplit(':').next().unwrap_or(body);

    let network_id = parse_prefix(prefix).ok_or_else(|| AddressError::Invalid(input.to_string()))?;

    let mut data = Vec::with_capacity(body.len());
    for c in body.bytes() {
        let symbol = ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or_else(|| AddressError::Invalid(input.to_string()))?;
        data.push(symbol as u8);
    }
    if data.len() < 9 {
        return Err(AddressError::Invalid(input.to_string()));
    }

    let mut checksum_input = expand_prefix(prefix);
    checksum_input.extend_from_slice(&data);
    if polymod(&checksum_input) != 0 {
        return Err(AddressError::Checksum(input.to_string()));
    }

    let payload_symbols = &data[..data.len() - 8];
    let payload = convert_bits(payload_symbols, 5, 8, false);
    if payload.len() != 21 || payload[0] != VERSION_BYTE {
        return Err(AddressError::Invalid(input.to_string()));
    }

    Ok((Address::from_slice(&payload[1..]), network_id))
}

/// Decode and require a specific network.
pub fn decode_for_network(input: &str, network_id: u32) -> Result<Address, AddressError> {
    let (address, found) = decode(input)?;
    if found != network_id {
        return Err(AddressError::WrongNetwork(
            input.to_string(),
            network_prefix(network_id),
        ));
    }
    Ok(address)
}

/// Does this string look like a CIP-37 address? Matches every prefix the
/// codec emits: `cfx`, `cfxtest` and `net<N>`. Used by the translators,
/// which replace any such string they can decode.
pub fn looks_like_base32(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("cfx")
        || (lower.starts_with("net")
            && lower.as_bytes().get(3).is_some_and(u8::is_ascii_digit))
}

fn parse_prefix(prefix: &str) -> Option<u32> {
    match prefix {
        "cfx" => Some(MAINNET_ID),
        "cfxtest" => Some(TESTNET_ID),
        other => other.strip_prefix("net")?.parse().ok(),
    }
}

fn expand_prefix(prefix: &str) -> Vec<u8> {
    let mut out: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
    out.push(0);
    out
}

/// BCH checksum over 5-bit symbols, per the CashAddr construction CIP-37
/// borrows.
fn polymod(symbols: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for &d in symbols {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x0007_ffff_ffff) << 5) ^ u64::from(d);
        if c0 & 0x01 != 0 {
            c ^= 0x98_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x79_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0xf3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0xae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x1e_4f43_e470;
        }
    }
    c ^ 1
}

/// Regroup a bit stream between symbol widths.
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Vec<u8> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::new();
    let max = (1u32 << to) - 1;
    for &value in data {
        acc = (acc << from) | u32::from(value);
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max) as u8);
        }
    }
    if pad && bits > 0 {
        out.push(((acc << (to - bits)) & max) as u8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_the_null_address_on_mainnet() {
        let addr = Address::ZERO;
        assert_eq!(
            encode(addr, MAINNET_ID),
            "cfx:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa0sfbnjm2"
        );
    }

    #[test]
    fn encodes_the_documented_example_address() {
        let addr: Address = "0x85d80245dc02f5a89589e1f19c5c718e405b56cd"
            .parse()
            .unwrap();
        assert_eq!(
            encode(addr, MAINNET_ID),
            "cfx:acc7uawf5ubtnmezvhu9dhc6sghea0403y2dgpyfjp"
        );
        assert_eq!(
            encode(addr, TESTNET_ID),
            "cfxtest:acc7uawf5ubtnmezvhu9dhc6sghea0403ywjz6wtpg"
        );
    }

    #[test]
    fn decode_verifies_checksum() {
        let good = "cfx:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa0sfbnjm2";
        let (addr, network) = decode(good).unwrap();
        assert_eq!(addr, Address::ZERO);
        assert_eq!(network, MAINNET_ID);

        let bad = "cfx:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa0sfbnjm3";
        assert!(matches!(decode(bad), Err(AddressError::Checksum(_))));
    }

    #[test]
    fn decode_is_case_insensitive() {
        let upper = "CFX:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA0SFBNJM2";
        assert_eq!(decode(upper).unwrap().0, Address::ZERO);
    }

    #[test]
    fn custom_networks_use_net_prefix() {
        let addr = Address::repeat_byte(0x11);
        let encoded = encode(addr, 7);
        assert!(encoded.starts_with("net7:"));
        assert_eq!(decode(&encoded).unwrap(), (addr, 7));
    }

    #[test]
    fn cross_network_input_is_rejected() {
        let encoded = encode(Address::ZERO, TESTNET_ID);
        assert!(matches!(
            decode_for_network(&encoded, MAINNET_ID),
            Err(AddressError::WrongNetwork(..))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode("nonsense").is_err());
        assert!(decode("cfx:").is_err());
        assert!(decode("cfx:iloq").is_err());
    }

    #[test]
    fn base32_detection_matches_every_emitted_prefix() {
        assert!(looks_like_base32(
            "cfx:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa0sfbnjm2"
        ));
        assert!(looks_like_base32("CFXTEST:aaaa"));
        assert!(looks_like_base32(&encode(Address::repeat_byte(0x11), 7)));
        assert!(looks_like_base32("net1029:aaaa"));
        // hex addresses and near-misses are not base32
        assert!(!looks_like_base32("0x85d80245dc02f5a89589e1f19c5c718e405b56cd"));
        assert!(!looks_like_base32("network"));
        assert!(!looks_like_base32("net"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_roundtrip_mainnet(bytes in any::<[u8; 20]>()) {
            let addr = Address::from(bytes);
            let encoded = encode(addr, MAINNET_ID);
            prop_assert_eq!(decode_for_network(&encoded, MAINNET_ID).unwrap(), addr);
        }

        #[test]
        fn prop_roundtrip_arbitrary_network(bytes in any::<[u8; 20]>(), network in 1u32..100_000) {
            let addr = Address::from(bytes);
            let encoded = encode(addr, network);
            let (decoded, found) = decode(&encoded).unwrap();
            prop_assert_eq!(decoded, addr);
            prop_assert_eq!(found, network);
        }
    }
}
