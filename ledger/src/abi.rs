//! Minimal ABI support for the two contract calls this service makes.
//! Head/tail encoding per the Solidity ABI; nothing generic.

use sha3::{Digest, Keccak256};

use crate::LedgerError;

const WORD: usize = 32;

pub(crate) fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

fn u64_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Calldata for `storeHash(string)`.
pub(crate) fn encode_store_hash(ipfs_hash: &str) -> Vec<u8> {
    let bytes = ipfs_hash.as_bytes();
    let padded_len = bytes.len().div_ceil(WORD) * WORD;
    let mut data = Vec::with_capacity(4 + 2 * WORD + padded_len);
    data.extend_from_slice(&selector("storeHash(string)"));
    // Single dynamic argument: offset to the tail, then length, then bytes.
    data.extend_from_slice(&u64_word(WORD as u64));
    data.extend_from_slice(&u64_word(bytes.len() as u64));
    data.extend_from_slice(bytes);
    data.resize(4 + 2 * WORD + padded_len, 0);
    data
}

/// Calldata for `getHash(address)`.
pub(crate) fn encode_get_hash(account: &str) -> Result<Vec<u8>, LedgerError> {
    let stripped = account.strip_prefix("0x").unwrap_or(account);
    let raw = hex::decode(stripped)
        .map_err(|e| LedgerError::Rejected(format!("invalid account address {account}: {e}")))?;
    if raw.len() != 20 {
        return Err(LedgerError::Rejected(format!(
            "invalid account address {account}: expected 20 bytes, got {}",
            raw.len()
        )));
    }
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&selector("getHash(address)"));
    data.extend_from_slice(&[0u8; WORD - 20]);
    data.extend_from_slice(&raw);
    Ok(data)
}

/// Decodes a single ABI string return value from hex `eth_call` output.
pub(crate) fn decode_string_return(hex_output: &str) -> Result<String, LedgerError> {
    let stripped = hex_output.strip_prefix("0x").unwrap_or(hex_output);
    let raw = hex::decode(stripped)
        .map_err(|e| LedgerError::Unavailable(format!("malformed eth_call output: {e}")))?;
    if raw.len() < 2 * WORD {
        return Err(LedgerError::Unavailable(format!(
            "eth_call output too short: {} bytes",
            raw.len()
        )));
    }
    let offset = word_as_usize(&raw[..WORD])?;
    let len_end = offset
        .checked_add(WORD)
        .filter(|end| *end <= raw.len())
        .ok_or_else(|| LedgerError::Unavailable("string offset out of range".to_string()))?;
    let len = word_as_usize(&raw[offset..len_end])?;
    let data_end = len_end
        .checked_add(len)
        .filter(|end| *end <= raw.len())
        .ok_or_else(|| LedgerError::Unavailable("string length out of range".to_string()))?;
    String::from_utf8(raw[len_end..data_end].to_vec())
        .map_err(|e| LedgerError::Unavailable(format!("stored hash is not utf-8: {e}")))
}

fn word_as_usize(word: &[u8]) -> Result<usize, LedgerError> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(LedgerError::Unavailable(
            "oversized word in eth_call output".to_string(),
        ));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(tail) as usize)
}
