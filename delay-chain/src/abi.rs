//! Just enough of the contract ABI codec for the views this crate reads:
//! static words, `bytes`, dynamic arrays, and `string` returns.

use delay_types::{Address, Amount, ChainKey};

const WORD: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("return data too short: need {need} bytes, have {have}")]
    Short { need: usize, have: usize },
    #[error("word {index} does not fit in {bits} bits")]
    Overflow { index: usize, bits: u32 },
    #[error("word {index} is not a valid address")]
    Address { index: usize },
    #[error("string is not valid utf-8")]
    Utf8,
    #[error("{kind} code {code} is not recognised")]
    UnknownCode { kind: &'static str, code: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(Amount),
    FixedBytes([u8; 32]),
    Bytes(Vec<u8>),
    Array(Vec<Token>),
}

impl From<ChainKey> for Token {
    fn from(key: ChainKey) -> Self {
        Token::FixedBytes(key.0)
    }
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn padded(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    out.resize(data.len().div_ceil(WORD) * WORD, 0);
    out
}

fn encode_tail(token: &Token) -> Vec<u8> {
    match token {
        Token::Bytes(data) => {
            let mut out = uint_word(data.len() as u128).to_vec();
            out.extend(padded(data));
            out
        }
        Token::Array(items) => {
            let mut out = uint_word(items.len() as u128).to_vec();
            out.extend(encode(items));
            out
        }
        _ => Vec::new(),
    }
}

/// `abi.encode(tokens...)`.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for token in tokens {
        match token {
            Token::Address(a) => head.extend(address_word(a)),
            Token::Uint(v) => head.extend(uint_word(*v)),
            Token::FixedBytes(b) => head.extend(b),
            Token::Bytes(_) | Token::Array(_) => {
                head.extend(uint_word((head_len + tail.len()) as u128));
                tail.extend(encode_tail(token));
            }
        }
    }
    head.extend(tail);
    head
}

pub fn encode_call(selector: [u8; 4], args: &[Token]) -> Vec<u8> {
    let mut out = selector.to_vec();
    out.extend(encode(args));
    out
}

/// Reads positional words out of a call's return data.
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// `len` bytes at byte offset `start`. Offsets come from return data,
    /// so every bound is checked.
    fn slice(&self, start: usize, len: usize) -> Result<&'a [u8], AbiError> {
        let have = self.data.len();
        let end = start.checked_add(len).ok_or(AbiError::Short { need: usize::MAX, have })?;
        self.data.get(start..end).ok_or(AbiError::Short { need: end, have })
    }

    fn word(&self, index: usize) -> Result<&'a [u8], AbiError> {
        let start = index
            .checked_mul(WORD)
            .ok_or(AbiError::Short { need: usize::MAX, have: self.data.len() })?;
        self.slice(start, WORD)
    }

    fn word_at(&self, offset: usize) -> Result<u64, AbiError> {
        let word = self.slice(offset, WORD)?;
        if word[..24].iter().any(|b| *b != 0) {
            return Err(AbiError::Overflow { index: offset / WORD, bits: 64 });
        }
        let mut low = [0u8; 8];
        low.copy_from_slice(&word[24..]);
        Ok(u64::from_be_bytes(low))
    }

    fn narrow(&self, index: usize, bits: u32) -> Result<u128, AbiError> {
        let word = self.word(index)?;
        if word[..16].iter().any(|b| *b != 0) {
            return Err(AbiError::Overflow { index, bits });
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&word[16..]);
        let value = u128::from_be_bytes(low);
        if bits < 128 && value >> bits != 0 {
            return Err(AbiError::Overflow { index, bits });
        }
        Ok(value)
    }

    pub fn uint(&self, index: usize) -> Result<Amount, AbiError> {
        self.narrow(index, 128)
    }

    pub fn uint64(&self, index: usize) -> Result<u64, AbiError> {
        Ok(self.narrow(index, 64)? as u64)
    }

    pub fn uint8(&self, index: usize) -> Result<u8, AbiError> {
        Ok(self.narrow(index, 8)? as u8)
    }

    pub fn address(&self, index: usize) -> Result<Address, AbiError> {
        let word = self.word(index)?;
        if word[..12].iter().any(|b| *b != 0) {
            return Err(AbiError::Address { index });
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&word[12..]);
        Ok(Address(out))
    }

    pub fn fixed_bytes(&self, index: usize) -> Result<[u8; 32], AbiError> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.word(index)?);
        Ok(out)
    }

    /// A `string` return. Legacy tokens that return `bytes32` are accepted
    /// too, with trailing zero bytes stripped.
    pub fn string(&self) -> Result<String, AbiError> {
        if self.data.len() == WORD {
            let raw = self.fixed_bytes(0)?;
            let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            return String::from_utf8(raw[..end].to_vec()).map_err(|_| AbiError::Utf8);
        }
        let to_usize = |value: u64, index: usize| usize::try_from(value).map_err(|_| AbiError::Overflow { index, bits: 64 });
        let offset = to_usize(self.uint64(0)?, 0)?;
        let len = to_usize(self.word_at(offset)?, offset / WORD)?;
        let start = offset
            .checked_add(WORD)
            .ok_or(AbiError::Short { need: usize::MAX, have: self.data.len() })?;
        let bytes = self.slice(start, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_claimable_hint_payload() {
        let network = Address([0xab; 20]);
        let encoded = encode(&[Token::Address(network), Token::Uint(5), Token::Array(vec![])]);
        assert_eq!(encoded.len(), 4 * WORD);
        assert_eq!(&encoded[12..32], network.as_bytes());
        assert_eq!(encoded[63], 5);
        assert_eq!(encoded[95], 0x60);
        assert!(encoded[96..].iter().all(|b| *b == 0));
    }

    #[test]
    fn encodes_bytes_argument_after_static_head() {
        let payload = vec![1u8; 40];
        let encoded = encode(&[Token::Uint(1), Token::Bytes(payload.clone())]);
        // head (2 words) + length word + 2 padded data words
        assert_eq!(encoded.len(), 5 * WORD);
        assert_eq!(encoded[63], 0x40);
        assert_eq!(encoded[95], 40);
        assert_eq!(&encoded[96..136], payload.as_slice());
        assert!(encoded[136..].iter().all(|b| *b == 0));
    }

    #[test]
    fn decodes_words_and_rejects_overflow() {
        let data = encode(&[Token::Uint(1_700_000_000), Token::Uint(2), Token::Uint(300)]);
        let d = Decoder::new(&data);
        assert_eq!(d.uint64(0), Ok(1_700_000_000));
        assert_eq!(d.uint8(1), Ok(2));
        assert_eq!(d.uint8(2), Err(AbiError::Overflow { index: 2, bits: 8 }));
        assert!(matches!(d.uint(3), Err(AbiError::Short { .. })));
    }

    #[test]
    fn decodes_dynamic_and_bytes32_strings() {
        let mut data = uint_word(0x20).to_vec();
        data.extend(uint_word(4));
        data.extend(padded(b"USDC"));
        assert_eq!(Decoder::new(&data).string(), Ok("USDC".to_string()));

        let mut legacy = [0u8; 32];
        legacy[..3].copy_from_slice(b"MKR");
        assert_eq!(Decoder::new(&legacy).string(), Ok("MKR".to_string()));
    }

    #[test]
    fn string_with_huge_length_or_offset_is_short() {
        let mut huge_len = uint_word(0x20).to_vec();
        huge_len.extend(uint_word(u128::from(u64::MAX)));
        huge_len.extend([0u8; 32]);
        assert!(matches!(Decoder::new(&huge_len).string(), Err(AbiError::Short { .. })));

        let mut huge_offset = uint_word(u128::from(u64::MAX - 8)).to_vec();
        huge_offset.extend(uint_word(4));
        huge_offset.extend(padded(b"USDC"));
        assert!(matches!(Decoder::new(&huge_offset).string(), Err(AbiError::Short { .. })));
    }

    #[test]
    fn word_index_past_usize_is_short() {
        let data = [0u8; 32];
        assert!(matches!(Decoder::new(&data).uint(usize::MAX), Err(AbiError::Short { .. })));
    }

    #[test]
    fn rejects_dirty_address_word() {
        let data = [0xffu8; 32];
        assert_eq!(Decoder::new(&data).address(0), Err(AbiError::Address { index: 0 }));
    }
}
