// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use uuid::Uuid;

use crate::common::*;
use crate::dbi::HeaderVersion;

/// The PDB info stream header.
///
/// Signature, age and GUID are what match a PDB to the binary it describes.
///
/// Reference: http://llvm.org/docs/PDB/PdbStream.html
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PdbInformation {
    pub version: HeaderVersion,
    pub signature: u32,
    pub age: u32,
    pub guid: Uuid,
}

impl PdbInformation {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        let mut buf = ParseBuffer::from(bytes);

        let version = From::from(buf.parse_u32()?);
        let signature = buf.parse_u32()?;
        let age = buf.parse_u32()?;

        let d1 = buf.parse_u32()?;
        let d2 = buf.parse_u16()?;
        let d3 = buf.parse_u16()?;
        let mut d4 = [0u8; 8];
        d4.copy_from_slice(buf.take(8)?);

        Ok(PdbInformation {
            version,
            signature,
            age,
            guid: Uuid::from_fields(d1, d2, d3, &d4),
        })
    }
}
