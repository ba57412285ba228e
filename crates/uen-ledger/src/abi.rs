//! Solidity ABI encoding for the three registry functions.
//!
//! Only the shapes the registry uses are supported: `string`, `string[]`.
//! The ABI descriptor file is checked once at startup so that a contract
//! without the expected functions fails before any transaction is built.

use crate::{keccak256, LedgerError};
use serde::Deserialize;
use std::path::Path;

pub const ADD_RECORDS: &str = "add_uens";
pub const LIST_IDENTIFIERS: &str = "get_all_uens";
pub const GET_NAME: &str = "get_name";

const WORD: usize = 32;

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn word(n: usize) -> [u8; WORD] {
    let mut out = [0u8; WORD];
    out[WORD - 8..].copy_from_slice(&(n as u64).to_be_bytes());
    out
}

fn padded_len(n: usize) -> usize {
    n.div_ceil(WORD) * WORD
}

fn encode_string_tail(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&word(s.len()));
    out.extend_from_slice(s.as_bytes());
    out.resize(out.len() + padded_len(s.len()) - s.len(), 0);
}

fn encode_string_array_tail(items: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&word(items.len()));
    let mut offset = items.len() * WORD;
    for item in items {
        out.extend_from_slice(&word(offset));
        offset += WORD + padded_len(item.len());
    }
    for item in items {
        encode_string_tail(item, &mut out);
    }
    out
}

/// Calldata for `add_uens(string[],string[])`.
pub fn encode_add_records(identifiers: &[String], names: &[String]) -> Vec<u8> {
    let ids = encode_string_array_tail(identifiers);
    let names = encode_string_array_tail(names);
    let mut out = Vec::with_capacity(4 + 2 * WORD + ids.len() + names.len());
    out.extend_from_slice(&selector(&format!("{ADD_RECORDS}(string[],string[])")));
    out.extend_from_slice(&word(2 * WORD));
    out.extend_from_slice(&word(2 * WORD + ids.len()));
    out.extend_from_slice(&ids);
    out.extend_from_slice(&names);
    out
}

/// Calldata for `get_all_uens()`.
pub fn encode_list_identifiers() -> Vec<u8> {
    selector(&format!("{LIST_IDENTIFIERS}()")).to_vec()
}

/// Calldata for `get_name(string)`.
pub fn encode_get_name(identifier: &str) -> Vec<u8> {
    let mut out = selector(&format!("{GET_NAME}(string)")).to_vec();
    out.extend_from_slice(&word(WORD));
    encode_string_tail(identifier, &mut out);
    out
}

fn read_usize(data: &[u8], pos: usize) -> Result<usize, LedgerError> {
    let end = pos
        .checked_add(WORD)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| LedgerError::Abi(format!("word at {pos} out of bounds ({} bytes)", data.len())))?;
    let w = &data[pos..end];
    if w[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(LedgerError::Abi(format!("word at {pos} does not fit in 64 bits")));
    }
    let mut be = [0u8; 8];
    be.copy_from_slice(&w[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(be))
        .map_err(|_| LedgerError::Abi(format!("word at {pos} overflows usize")))
}

fn read_string_at(data: &[u8], pos: usize) -> Result<String, LedgerError> {
    let len = read_usize(data, pos)?;
    let start = pos + WORD;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| LedgerError::Abi(format!("string at {pos} runs past end of data")))?;
    String::from_utf8(data[start..end].to_vec())
        .map_err(|e| LedgerError::Abi(format!("string at {pos} is not utf-8: {e}")))
}

fn require_data(data: &[u8]) -> Result<(), LedgerError> {
    if data.is_empty() {
        return Err(LedgerError::Abi(
            "empty return data (is the contract deployed at this address?)".to_string(),
        ));
    }
    Ok(())
}

/// Decode a single `string[]` return value.
pub fn decode_string_array(data: &[u8]) -> Result<Vec<String>, LedgerError> {
    require_data(data)?;
    let offset = read_usize(data, 0)?;
    let count = read_usize(data, offset)?;
    let base = offset + WORD;
    let heads_fit = count
        .checked_mul(WORD)
        .and_then(|n| n.checked_add(base))
        .is_some_and(|end| end <= data.len());
    if !heads_fit {
        return Err(LedgerError::Abi(format!(
            "array of {count} elements exceeds return data"
        )));
    }

    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let rel = read_usize(data, base + i * WORD)?;
        let at = base
            .checked_add(rel)
            .ok_or_else(|| LedgerError::Abi(format!("element {i} offset overflows")))?;
        out.push(read_string_at(data, at)?);
    }
    Ok(out)
}

/// Decode a single `string` return value.
pub fn decode_string(data: &[u8]) -> Result<String, LedgerError> {
    require_data(data)?;
    let offset = read_usize(data, 0)?;
    read_string_at(data, offset)
}

// ============================================================================
// Descriptor
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
}

/// A contract interface as emitted by Hardhat/Truffle (`{"abi": [...]}`) or
/// a bare ABI array.
#[derive(Debug, Clone)]
pub struct AbiDescriptor {
    pub entries: Vec<AbiEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DescriptorFile {
    Artifact { abi: Vec<AbiEntry> },
    Bare(Vec<AbiEntry>),
}

impl AbiDescriptor {
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let text = std::fs::read_to_string(path).map_err(|e| LedgerError::AbiDescriptor {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&text).map_err(|e| LedgerError::AbiDescriptor {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_json(text: &str) -> Result<Self, LedgerError> {
        let file: DescriptorFile =
            serde_json::from_str(text).map_err(|e| LedgerError::Abi(e.to_string()))?;
        let entries = match file {
            DescriptorFile::Artifact { abi } => abi,
            DescriptorFile::Bare(abi) => abi,
        };
        Ok(Self { entries })
    }

    pub fn function(&self, name: &str) -> Option<&AbiEntry> {
        self.entries
            .iter()
            .find(|e| e.kind == "function" && e.name == name)
    }

    /// Check that the registry functions exist with the expected shapes.
    pub fn require_registry(&self) -> Result<(), LedgerError> {
        let expect = |name: &str, inputs: &[&str], outputs: &[&str]| -> Result<(), LedgerError> {
            let f = self
                .function(name)
                .ok_or_else(|| LedgerError::Abi(format!("contract has no function `{name}`")))?;
            let got_in: Vec<&str> = f.inputs.iter().map(|p| p.kind.as_str()).collect();
            let got_out: Vec<&str> = f.outputs.iter().map(|p| p.kind.as_str()).collect();
            if got_in != inputs || got_out != outputs {
                return Err(LedgerError::Abi(format!(
                    "`{name}` has signature ({}) -> ({}), expected ({}) -> ({})",
                    got_in.join(","),
                    got_out.join(","),
                    inputs.join(","),
                    outputs.join(",")
                )));
            }
            Ok(())
        };
        expect(ADD_RECORDS, &["string[]", "string[]"], &[])?;
        expect(LIST_IDENTIFIERS, &[], &["string[]"])?;
        expect(GET_NAME, &["string"], &["string"])?;
        Ok(())
    }
}
