//! Celo legacy transaction encoding.
//!
//! The Celo legacy wire format extends Ethereum's with three fee fields:
//! `rlp([nonce, gasPrice, gas, feeCurrency, gatewayFeeRecipient, gatewayFee,
//! to, value, data, v, r, s])` with EIP-155 replay protection folded into
//! `v`. The signature hash covers the same prefix with `[chainId, 0, 0]`
//! appended.

use alloy_primitives::{keccak256, Address, Bytes, Signature, B256, U256};
use alloy_rlp::{BufMut, Encodable, RlpEncodable};

/// Optional address field; absent encodes as the empty RLP string.
#[derive(Debug, Clone, Copy)]
pub struct OptionalAddress(pub Option<Address>);

impl Encodable for OptionalAddress {
    fn encode(&self, out: &mut dyn BufMut) {
        match self.0 {
            Some(address) => address.encode(out),
            None => out.put_u8(alloy_rlp::EMPTY_STRING_CODE),
        }
    }

    fn length(&self) -> usize {
        match self.0 {
            Some(address) => address.length(),
            None => 1,
        }
    }
}

/// Unsigned Celo legacy transaction.
#[derive(Debug, Clone)]
pub struct CeloTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas: u64,
    pub fee_currency: Option<Address>,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub chain_id: u64,
}

#[derive(RlpEncodable)]
struct SigningPayload {
    nonce: u64,
    gas_price: U256,
    gas: u64,
    fee_currency: OptionalAddress,
    gateway_fee_recipient: OptionalAddress,
    gateway_fee: U256,
    to: OptionalAddress,
    value: U256,
    data: Bytes,
    chain_id: u64,
    zero_r: u8,
    zero_s: u8,
}

#[derive(RlpEncodable)]
struct SignedPayload {
    nonce: u64,
    gas_price: U256,
    gas: u64,
    fee_currency: OptionalAddress,
    gateway_fee_recipient: OptionalAddress,
    gateway_fee: U256,
    to: OptionalAddress,
    value: U256,
    data: Bytes,
    v: u64,
    r: U256,
    s: U256,
}

impl CeloTransaction {
    /// EIP-155 signature hash over the extended field list.
    pub fn signature_hash(&self) -> B256 {
        let payload = SigningPayload {
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas: self.gas,
            fee_currency: OptionalAddress(self.fee_currency),
            gateway_fee_recipient: OptionalAddress(None),
            gateway_fee: U256::ZERO,
            to: OptionalAddress(self.to),
            value: self.value,
            data: self.data.clone(),
            chain_id: self.chain_id,
            zero_r: 0,
            zero_s: 0,
        };
        let mut buf = Vec::with_capacity(payload.length());
        payload.encode(&mut buf);
        keccak256(&buf)
    }

    /// Raw bytes for `eth_sendRawTransaction`, with the replay-protected v.
    pub fn into_signed(self, signature: Signature) -> Vec<u8> {
        let v = 35 + 2 * self.chain_id + u64::from(signature.v());
        let payload = SignedPayload {
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas: self.gas,
            fee_currency: OptionalAddress(self.fee_currency),
            gateway_fee_recipient: OptionalAddress(None),
            gateway_fee: U256::ZERO,
            to: OptionalAddress(self.to),
            value: self.value,
            data: self.data,
            v,
            r: signature.r(),
            s: signature.s(),
        };
        let mut buf = Vec::with_capacity(payload.length());
        payload.encode(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(fee_currency: Option<Address>) -> CeloTransaction {
        CeloTransaction {
            nonce: 1,
            gas_price: U256::from(5_000_000_000u64),
            gas: 21_000,
            fee_currency,
            to: Some(Address::repeat_byte(0x22)),
            value: U256::from(10u64),
            data: Bytes::new(),
            chain_id: 42_220,
        }
    }

    #[test]
    fn fee_currency_changes_the_signature_hash() {
        let without = sample(None).signature_hash();
        let with = sample(Some(Address::repeat_byte(0x33))).signature_hash();
        assert_ne!(without, with);
    }

    #[test]
    fn v_is_replay_protected() {
        let tx = sample(None);
        let signature =
            Signature::from_scalars_and_parity(B256::repeat_byte(1), B256::repeat_byte(2), true);
        let raw = tx.into_signed(signature);
        let mut slice = raw.as_slice();
        let header = alloy_rlp::Header::decode(&mut slice).unwrap();
        assert!(header.list);
        // v = 35 + 2·42220 + 1 = 84476 somewhere in the payload
        let expected_v: u64 = 35 + 2 * 42_220 + 1;
        let v_bytes = expected_v.to_be_bytes();
        let trimmed = &v_bytes[v_bytes.iter().position(|&b| b != 0).unwrap()..];
        assert!(slice
            .windows(trimmed.len())
            .any(|window| window == trimmed));
    }
}
