//! Byte layouts of serialized keys.
//!
//! Every key kind is described by one ordered field table. The same table
//! yields the key size, the write offsets used at generation and the read
//! offsets used at evaluation.

use std::ops::Range;
use crate::{config::*, error::*};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyField {
    RangeSize,
    RangePoints,
    RootSeed,
    RootBit,
    Party,
    RootSeedB,
    LevelCorrections,
    Payload,
    ProofCorrection,
}

impl KeyField {
    pub fn name(&self) -> &'static str {
        match self {
            KeyField::RangeSize => "range size",
            KeyField::RangePoints => "range points",
            KeyField::RootSeed => "root seed",
            KeyField::RootBit => "root bit",
            KeyField::Party => "party",
            KeyField::RootSeedB => "second root seed",
            KeyField::LevelCorrections => "level corrections",
            KeyField::Payload => "payload",
            KeyField::ProofCorrection => "proof correction",
        }
    }
}

/// Product of caller-supplied sizes, `None` on overflow.
pub fn product(factors: &[usize]) -> Option<usize> {
    factors.iter().try_fold(1usize, |acc, &f| acc.checked_mul(f))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FieldSpan {
    field: KeyField,
    offset: usize,
    len: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    spans: Vec<FieldSpan>,
    total: usize,
}

impl KeyLayout {
    fn from_fields(fields: &[(KeyField, Option<usize>)], data_size: usize) -> Result<Self> {
        let overflow = || FssError::InputSize { expected: usize::MAX, actual: data_size };
        let mut spans = Vec::with_capacity(fields.len());
        let mut offset = 0usize;
        for &(field, len) in fields {
            let len = len.ok_or_else(overflow)?;
            spans.push(FieldSpan { field, offset, len });
            offset = offset.checked_add(len).ok_or_else(overflow)?;
        }
        Ok(Self { spans, total: offset })
    }

    /// Single point key: `18 * range_size + 18 + data_size` (+64 when verifiable).
    pub fn point(range_size: usize, data_size: usize, verifiable: bool) -> Result<Self> {
        let mut fields = vec![
            (KeyField::RangeSize, Some(1)),
            (KeyField::RootSeed, Some(BLOCK_SIZE)),
            (KeyField::RootBit, Some(1)),
            (KeyField::LevelCorrections, product(&[DPF_CW_SIZE, range_size])),
            (KeyField::Payload, Some(data_size)),
        ];
        if verifiable {
            fields.push((KeyField::ProofCorrection, Some(PROOF_CORRECTION_SIZE)));
        }
        Self::from_fields(&fields, data_size)
    }

    /// Multi point key: `24 * range_size * points + 19 + data_size * points`
    /// (+64 per point when verifiable).
    pub fn multi_point(range_size: usize, points: usize, data_size: usize, verifiable: bool) -> Result<Self> {
        let mut fields = vec![
            (KeyField::RangeSize, Some(1)),
            (KeyField::RangePoints, Some(1)),
            (KeyField::RootSeed, Some(BLOCK_SIZE)),
            (KeyField::Party, Some(1)),
            (KeyField::LevelCorrections, product(&[DMPF_CW_SIZE, range_size, points])),
            (KeyField::Payload, product(&[data_size, points])),
        ];
        if verifiable {
            fields.push((KeyField::ProofCorrection, product(&[PROOF_CORRECTION_SIZE, points])));
        }
        Self::from_fields(&fields, data_size)
    }

    /// Both roots followed by the shared body: `34 + 24 * range_size * points + data_size * points`.
    pub fn compressed(range_size: usize, points: usize, data_size: usize) -> Result<Self> {
        Self::from_fields(
            &[
                (KeyField::RangeSize, Some(1)),
                (KeyField::RangePoints, Some(1)),
                (KeyField::RootSeed, Some(BLOCK_SIZE)),
                (KeyField::RootSeedB, Some(BLOCK_SIZE)),
                (KeyField::LevelCorrections, product(&[DMPF_CW_SIZE, range_size, points])),
                (KeyField::Payload, product(&[data_size, points])),
            ],
            data_size,
        )
    }

    pub fn size(&self) -> usize {
        self.total
    }

    pub fn has(&self, field: KeyField) -> bool {
        self.spans.iter().any(|span| span.field == field)
    }

    /// Byte range of `field`; empty at the end of the key if the layout lacks it.
    pub fn range(&self, field: KeyField) -> Range<usize> {
        self.spans
            .iter()
            .find(|span| span.field == field)
            .map(|span| span.offset..span.offset + span.len)
            .unwrap_or(self.total..self.total)
    }

    pub fn field<'a>(&self, bytes: &'a [u8], field: KeyField) -> &'a [u8] {
        &bytes[self.range(field)]
    }

    pub fn field_mut<'a>(&self, bytes: &'a mut [u8], field: KeyField) -> &'a mut [u8] {
        &mut bytes[self.range(field)]
    }

    pub fn alloc(&self) -> Vec<u8> {
        vec![0u8; self.total]
    }

    pub fn check(&self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.total {
            return Err(FssError::KeyCorruption {
                expected: self.total,
                actual: bytes.len(),
            });
        }
        Ok(())
    }

    /// Compare a one-byte header field against the declared parameter.
    pub fn check_header(&self, bytes: &[u8], field: KeyField, expected: usize) -> Result<()> {
        let actual = self.field(bytes, field).first().copied().unwrap_or_default() as usize;
        if actual != expected {
            return Err(FssError::KeyHeaderMismatch {
                field: field.name(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}
