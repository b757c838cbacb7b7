use std::fmt;

use serde::Serialize;

use crate::error::{StacksSignerError, StacksSignerResult};

/// Hex characters in one 32-byte signature component.
pub const COMPONENT_HEX_LEN: usize = 64;

/// Hex characters in a raw `r || s` signature.
pub const RAW_SIGNATURE_HEX_LEN: usize = 2 * COMPONENT_HEX_LEN;

/// Bytes in `marker || r || s`.
pub const FULL_SIGNATURE_LEN: usize = 1 + 32 + 32;

/// Order in which recovery markers are broadcast.
pub const MARKER_PRIORITY: MarkerPriority = MarkerPriority([
    RecoveryMarker(1),
    RecoveryMarker(0),
    RecoveryMarker(2),
    RecoveryMarker(3),
]);

/// Recovery/parity tag prepended to an `(r, s)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecoveryMarker(u8);

impl RecoveryMarker {
    pub const COUNT: usize = 4;

    pub const ALL: [RecoveryMarker; Self::COUNT] = [
        RecoveryMarker(0),
        RecoveryMarker(1),
        RecoveryMarker(2),
        RecoveryMarker(3),
    ];

    pub fn new(value: u8) -> StacksSignerResult<Self> {
        if usize::from(value) < Self::COUNT {
            Ok(Self(value))
        } else {
            Err(StacksSignerError::InvalidMarker(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Two-character hex form, e.g. `"01"`.
    pub fn to_hex(self) -> String {
        format!("{:02x}", self.0)
    }
}

impl TryFrom<u8> for RecoveryMarker {
    type Error = StacksSignerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RecoveryMarker> for u8 {
    fn from(marker: RecoveryMarker) -> Self {
        marker.0
    }
}

impl fmt::Display for RecoveryMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

/// A permutation of all recovery markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPriority([RecoveryMarker; RecoveryMarker::COUNT]);

impl MarkerPriority {
    pub fn new(order: [u8; RecoveryMarker::COUNT]) -> StacksSignerResult<Self> {
        let mut seen = [false; RecoveryMarker::COUNT];
        let mut markers = [RecoveryMarker(0); RecoveryMarker::COUNT];

        for (slot, value) in markers.iter_mut().zip(order) {
            let marker = RecoveryMarker::new(value)?;
            if std::mem::replace(&mut seen[usize::from(value)], true) {
                return Err(StacksSignerError::InvalidPriority(order));
            }
            *slot = marker;
        }

        Ok(Self(markers))
    }

    pub fn markers(&self) -> &[RecoveryMarker; RecoveryMarker::COUNT] {
        &self.0
    }

    /// The marker tried first, also reported when every candidate fails.
    pub fn first(&self) -> RecoveryMarker {
        self.0[0]
    }

    /// Moves `marker` to the front, keeping the relative order of the rest.
    pub fn preferring(self, marker: RecoveryMarker) -> Self {
        let mut markers = [marker; RecoveryMarker::COUNT];
        let rest = self.0.into_iter().filter(|m| *m != marker);
        for (slot, m) in markers[1..].iter_mut().zip(rest) {
            *slot = m;
        }
        Self(markers)
    }
}

impl Default for MarkerPriority {
    fn default() -> Self {
        MARKER_PRIORITY
    }
}

/// A full signature candidate `marker || r || s`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureCandidate {
    marker: RecoveryMarker,
    r: [u8; 32],
    s: [u8; 32],
}

impl SignatureCandidate {
    pub fn marker(&self) -> RecoveryMarker {
        self.marker
    }

    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    pub fn r_hex(&self) -> String {
        hex::encode(self.r)
    }

    pub fn s_hex(&self) -> String {
        hex::encode(self.s)
    }

    /// The 65 bytes a single-sig spending condition carries.
    pub fn full_signature(&self) -> [u8; FULL_SIGNATURE_LEN] {
        let mut bytes = [0u8; FULL_SIGNATURE_LEN];
        bytes[0] = self.marker.value();
        bytes[1..33].copy_from_slice(&self.r);
        bytes[33..].copy_from_slice(&self.s);
        bytes
    }

    pub fn full_signature_hex(&self) -> String {
        hex::encode(self.full_signature())
    }
}

/// All candidates for one raw signature, indexed by marker value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureCandidates {
    candidates: [SignatureCandidate; RecoveryMarker::COUNT],
    raw_hex_len: usize,
}

impl SignatureCandidates {
    pub fn by_marker(&self, marker: RecoveryMarker) -> &SignatureCandidate {
        &self.candidates[usize::from(marker.value())]
    }

    pub fn in_priority<'a>(
        &'a self,
        priority: &'a MarkerPriority,
    ) -> impl Iterator<Item = &'a SignatureCandidate> + 'a {
        priority.markers().iter().map(|marker| self.by_marker(*marker))
    }

    /// Candidate reported when no marker was accepted.
    pub fn default_candidate(&self) -> &SignatureCandidate {
        self.by_marker(MARKER_PRIORITY.first())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignatureCandidate> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Length of the signature after stripping `0x`.
    pub fn raw_hex_len(&self) -> usize {
        self.raw_hex_len
    }

    /// `false` when the signer returned something other than 128 hex
    /// characters and `r`/`s` had to be padded.
    pub fn is_well_formed(&self) -> bool {
        self.raw_hex_len == RAW_SIGNATURE_HEX_LEN
    }
}

/// Left-pads a signature component with `'0'` to 64 hex characters.
pub fn pad_component(component: &str) -> String {
    format!("{:0>width$}", component, width = COMPONENT_HEX_LEN)
}

/// Builds the four signature candidates for a raw hex `r || s` signature.
///
/// Input of the wrong length is padded rather than rejected; check
/// [`SignatureCandidates::is_well_formed`] to report it. Only non-hex
/// characters are an error.
pub fn generate_candidates(signature: &str) -> StacksSignerResult<SignatureCandidates> {
    let hex_sig = signature.strip_prefix("0x").unwrap_or(signature);

    if let Some((index, c)) = hex_sig
        .char_indices()
        .find(|(_, c)| !c.is_ascii_hexdigit())
    {
        return Err(hex::FromHexError::InvalidHexCharacter { c, index }.into());
    }

    let r = decode_component(component(hex_sig, 0))?;
    let s = decode_component(component(hex_sig, 1))?;

    Ok(SignatureCandidates {
        candidates: RecoveryMarker::ALL.map(|marker| SignatureCandidate { marker, r, s }),
        raw_hex_len: hex_sig.len(),
    })
}

fn component(hex_sig: &str, index: usize) -> &str {
    let start = (index * COMPONENT_HEX_LEN).min(hex_sig.len());
    let end = ((index + 1) * COMPONENT_HEX_LEN).min(hex_sig.len());
    &hex_sig[start..end]
}

fn decode_component(component: &str) -> StacksSignerResult<[u8; 32]> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(pad_component(component), &mut bytes)?;
    Ok(bytes)
}
