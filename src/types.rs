use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::GovernanceError;

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Parses an address from runtime input, with or without a `0x` prefix.
    pub fn from_hex(input: &str) -> Result<Self, GovernanceError> {
        let stripped = input.strip_prefix("0x").unwrap_or(input);
        let bytes =
            hex::decode(stripped).map_err(|_| GovernanceError::InvalidAddress(input.to_string()))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| GovernanceError::InvalidAddress(input.to_string()))?;
        Ok(Address(bytes))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex(s)
    }
}

/// A raw 32-byte big-endian word as returned by contract calls.
///
/// Numeric fields cross the wire in this form and are decoded with checked
/// conversions; a word that does not fit the target integer is a decode
/// error, never a truncation and never a float.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Word(pub [u8; 32]);

impl Word {
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Word(bytes)
    }

    pub fn from_u128(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[16..].copy_from_slice(&value.to_be_bytes());
        Word(bytes)
    }

    /// Checked narrowing; `None` when any of the upper 24 bytes is set.
    pub fn to_u64(&self) -> Option<u64> {
        if self.0[..24].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0[24..]);
        Some(u64::from_be_bytes(low))
    }

    /// Checked narrowing; `None` when any of the upper 16 bytes is set.
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[..16].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&self.0[16..]);
        Some(u128::from_be_bytes(low))
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word(0x{})", hex::encode(self.0))
    }
}

/// Identifier of a submitted transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub [u8; 32]);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId(0x{})", hex::encode(self.0))
    }
}

/// Wallet connection state. Never persisted across process restarts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub account: Option<Address>,
    pub connected: bool,
}

/// Opaque generation token identifying one session epoch.
///
/// Captured before any suspension point and compared at resumption; a
/// mismatch means the session changed mid-flight and the suspended
/// operation's result must be discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionToken(pub(crate) u64);

/// One governance proposal as read from the chain.
///
/// `id`, `proposer`, `start`, `end` and `metadata_uri` are immutable;
/// tallies and `executed` change only through chain state, never locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub proposer: Address,
    pub start: u64,
    pub end: u64,
    pub metadata_uri: String,
    pub yes: u128,
    pub no: u128,
    pub abstain: u128,
    pub executed: bool,
}

/// One internally consistent set of proposals from a single successful load,
/// tagged with the context it was fetched under. Snapshots are wholly
/// replaced on reload, never merged field-by-field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSnapshot {
    pub dao: Address,
    pub viewer: Option<Address>,
    /// Ordered most-recently-created first (descending by id).
    pub proposals: Vec<Proposal>,
}

/// The three valid ballot values of the governance contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum VoteChoice {
    Yes = 1,
    No = 2,
    Abstain = 3,
}

impl VoteChoice {
    /// Validates a raw wire value; anything outside {1, 2, 3} is rejected.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(VoteChoice::Yes),
            2 => Some(VoteChoice::No),
            3 => Some(VoteChoice::Abstain),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Terminal-or-pending state of a submitted write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxState {
    Pending,
    Confirmed,
    Failed(String),
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxState::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_hex_round_trip() {
        let addr = Address([0xab; 20]);
        let parsed = Address::from_hex(&addr.to_hex()).unwrap();
        assert_eq!(parsed, addr);
        // Prefix is optional on input
        assert_eq!(Address::from_hex(&hex::encode([0xab; 20])).unwrap(), addr);
    }

    #[test]
    fn address_rejects_bad_input() {
        assert!(matches!(
            Address::from_hex("0x1234"),
            Err(GovernanceError::InvalidAddress(_))
        ));
        assert!(matches!(
            Address::from_hex("not hex at all"),
            Err(GovernanceError::InvalidAddress(_))
        ));
    }

    #[test]
    fn word_narrowing_is_checked() {
        assert_eq!(Word::from_u64(u64::MAX).to_u64(), Some(u64::MAX));
        assert_eq!(Word::from_u128(u128::MAX).to_u128(), Some(u128::MAX));
        // A value above u64::MAX narrows to u128 but not to u64
        let big = Word::from_u128(u64::MAX as u128 + 1);
        assert_eq!(big.to_u64(), None);
        assert_eq!(big.to_u128(), Some(u64::MAX as u128 + 1));
        // A full 256-bit word narrows to neither
        let huge = Word([0xff; 32]);
        assert_eq!(huge.to_u64(), None);
        assert_eq!(huge.to_u128(), None);
    }

    #[test]
    fn vote_choice_raw_values() {
        assert_eq!(VoteChoice::from_raw(1), Some(VoteChoice::Yes));
        assert_eq!(VoteChoice::from_raw(2), Some(VoteChoice::No));
        assert_eq!(VoteChoice::from_raw(3), Some(VoteChoice::Abstain));
        assert_eq!(VoteChoice::from_raw(0), None);
        assert_eq!(VoteChoice::from_raw(4), None);
        assert_eq!(VoteChoice::Abstain.as_u8(), 3);
    }
}
