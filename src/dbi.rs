// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The DBI (debug information) stream header.
//!
//! Only the header is decoded; its job here is to locate the symbol records
//! stream and to report the target machine.

use std::fmt;

use crate::common::*;

/// Provides access to the DBI stream header.
#[derive(Debug, Copy, Clone)]
pub struct DebugInformation {
    header: DbiHeader,
}

impl DebugInformation {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        let mut buf = ParseBuffer::from(bytes);
        let header = DbiHeader::parse(&mut buf)?;
        Ok(DebugInformation { header })
    }

    /// The stream holding the global symbol records.
    pub(crate) fn symbol_records_stream(&self) -> Option<u32> {
        self.header.symbol_records_stream.get()
    }

    /// The PDB's `age` as the linker wrote it, if present.
    pub fn age(&self) -> Option<u32> {
        match self.header.age {
            0 => None,
            age => Some(age),
        }
    }

    /// The target's machine type (architecture).
    pub fn machine_type(&self) -> MachineType {
        self.header.machine_type.into()
    }
}

/// The version of the PDB format, used by both the DBI and PDBI headers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum HeaderVersion {
    V41,
    V50,
    V60,
    V70,
    V110,
    OtherValue(u32),
}

impl From<u32> for HeaderVersion {
    #[allow(clippy::inconsistent_digit_grouping)]
    fn from(v: u32) -> Self {
        match v {
            93_08_03 => HeaderVersion::V41,
            1996_03_07 => HeaderVersion::V50,
            1997_06_06 => HeaderVersion::V60,
            1999_09_03 => HeaderVersion::V70,
            2009_12_01 => HeaderVersion::V110,
            _ => HeaderVersion::OtherValue(v),
        }
    }
}

/// The 64-byte `NewDBIHdr`:
///   https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/PDB/dbi/dbi.h#L124
#[derive(Debug, Copy, Clone)]
pub(crate) struct DbiHeader {
    pub signature: u32,
    pub version: HeaderVersion,
    pub age: u32,
    pub gs_symbols_stream: StreamIndex,
    pub internal_version: u16,
    pub ps_symbols_stream: StreamIndex,
    pub pdb_dll_build_version: u16,
    pub symbol_records_stream: StreamIndex,
    pub pdb_dll_rbld_version: u16,
    pub module_list_size: u32,
    pub section_contribution_size: u32,
    pub section_map_size: u32,
    pub file_info_size: u32,
    pub type_server_map_size: u32,
    pub mfc_type_server_index: u32,
    pub debug_header_size: u32,
    pub ec_substream_size: u32,
    pub flags: u16,
    pub machine_type: u16,
    pub reserved: u32,
}

impl DbiHeader {
    fn parse(buf: &mut ParseBuffer<'_>) -> Result<Self> {
        let header = DbiHeader {
            signature: buf.parse_u32()?,
            version: From::from(buf.parse_u32()?),
            age: buf.parse_u32()?,
            gs_symbols_stream: buf.parse()?,
            internal_version: buf.parse_u16()?,
            ps_symbols_stream: buf.parse()?,
            pdb_dll_build_version: buf.parse_u16()?,
            symbol_records_stream: buf.parse()?,
            pdb_dll_rbld_version: buf.parse_u16()?,
            module_list_size: buf.parse_u32()?,
            section_contribution_size: buf.parse_u32()?,
            section_map_size: buf.parse_u32()?,
            file_info_size: buf.parse_u32()?,
            type_server_map_size: buf.parse_u32()?,
            mfc_type_server_index: buf.parse_u32()?,
            debug_header_size: buf.parse_u32()?,
            ec_substream_size: buf.parse_u32()?,
            flags: buf.parse_u16()?,
            machine_type: buf.parse_u16()?,
            reserved: buf.parse_u32()?,
        };

        // a pre-NewDBIHdr header starts with its version instead of the
        // 0xffffffff marker
        if header.signature != u32::max_value() {
            return Err(DecodeError::InvalidStreamHeader("ancient DBI header").into());
        }

        Ok(header)
    }
}

/// The target machine's architecture.
///
/// Reference: https://docs.microsoft.com/en-us/windows/desktop/debug/pe-format#machine-types
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MachineType {
    /// Applicable to any machine type.
    Unknown,
    /// Intel 386 or later.
    X86,
    /// x64.
    Amd64,
    /// ARM little endian.
    Arm,
    /// ARM64 little endian.
    Arm64,
    /// Any machine type not otherwise modeled, preserved by ordinal.
    OtherValue(u16),
}

impl From<u16> for MachineType {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => MachineType::Unknown,
            0x014c => MachineType::X86,
            0x8664 => MachineType::Amd64,
            0x01c0 => MachineType::Arm,
            0xaa64 => MachineType::Arm64,
            other => MachineType::OtherValue(other),
        }
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MachineType::Unknown => write!(f, "Unknown"),
            MachineType::X86 => write!(f, "X86"),
            MachineType::Amd64 => write!(f, "Amd64"),
            MachineType::Arm => write!(f, "Arm"),
            MachineType::Arm64 => write!(f, "Arm64"),
            MachineType::OtherValue(value) => write!(f, "0x{:04x}", value),
        }
    }
}
