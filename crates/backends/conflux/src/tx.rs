//! Conflux Core Space native transaction encoding.
//!
//! The wire shape is `rlp([[nonce, gasPrice, gas, to, value, storageLimit,
//! epochHeight, chainId, data], v, r, s])`; the signature hash is the keccak
//! of the inner list alone and `v` is the raw recovery id, not an EIP-155
//! fold.

use alloy_primitives::{keccak256, Address, Bytes, Signature, B256, U256};
use alloy_rlp::{BufMut, Encodable, RlpEncodable};

/// `to` is an empty RLP string for contract creation.
#[derive(Debug, Clone, Copy)]
pub struct CallTarget(pub Option<Address>);

impl Encodable for CallTarget {
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

/// Unsigned native transaction fields, in wire order.
#[derive(Debug, Clone, RlpEncodable)]
pub struct NativeTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas: u64,
    pub to: CallTarget,
    pub value: U256,
    pub storage_limit: u64,
    pub epoch_height: u64,
    pub chain_id: u64,
    pub data: Bytes,
}

#[derive(RlpEncodable)]
struct SignedNative {
    tx: NativeTransaction,
    v: u8,
    r: U256,
    s: U256,
}

impl NativeTransaction {
    /// Hash the unsigned RLP list.
    pub fn signature_hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(self.length());
        self.encode(&mut buf);
        keccak256(&buf)
    }

    /// Produce the raw bytes for `cfx_sendRawTransaction`.
    pub fn into_signed(self, signature: Signature) -> Vec<u8> {
        let signed = SignedNative {
            v: u8::from(signature.v()),
            r: signature.r(),
            s: signature.s(),
            tx: self,
        };
        let mut buf = Vec::with_capacity(signed.length());
        signed.encode(&mut buf);
        buf
    }
}
