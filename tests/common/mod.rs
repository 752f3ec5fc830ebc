// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Builders for synthetic in-memory MSF containers.
//!
//! The containers built here use a 4096-byte page size with the canonical
//! layout: page 0 is the superblock, pages 1 and 2 the free page maps, and
//! data pages start at 3. Stream indices follow the fixed assignment the
//! crate expects: 1 = PDB info, 2 = TPI, 3 = DBI, 4 = symbol records.

#![allow(unused)]

use pdbgraph::TypeIndex;

pub const PAGE: usize = 4096;

const MAGIC: &[u8] = b"Microsoft C/C++ MSF 7.00\r\n\x1a\x44\x53\x00\x00\x00";

/// Assemble a container from per-stream contents.
pub fn build_msf(streams: &[Vec<u8>]) -> Vec<u8> {
    // pages 0..=2: superblock and the two free page maps
    let mut file = vec![0u8; PAGE * 3];

    let mut push_page = |file: &mut Vec<u8>, bytes: &[u8]| -> u32 {
        assert!(bytes.len() <= PAGE);
        let number = (file.len() / PAGE) as u32;
        file.extend_from_slice(bytes);
        file.resize(file.len() + PAGE - bytes.len(), 0);
        number
    };

    // data pages, stream by stream
    let mut stream_pages: Vec<Vec<u32>> = Vec::new();
    for stream in streams {
        let mut pages = Vec::new();
        for chunk in stream.chunks(PAGE) {
            pages.push(push_page(&mut file, chunk));
        }
        stream_pages.push(pages);
    }

    // the stream directory: count, then sizes, then page numbers
    let mut directory = Vec::new();
    directory.extend_from_slice(&(streams.len() as u32).to_le_bytes());
    for stream in streams {
        directory.extend_from_slice(&(stream.len() as u32).to_le_bytes());
    }
    for pages in &stream_pages {
        for &page in pages {
            directory.extend_from_slice(&page.to_le_bytes());
        }
    }

    let mut directory_pages = Vec::new();
    for chunk in directory.chunks(PAGE) {
        directory_pages.push(push_page(&mut file, chunk));
    }

    // the map page holds the directory's page numbers
    let mut map = Vec::new();
    for &page in &directory_pages {
        map.extend_from_slice(&page.to_le_bytes());
    }
    let map_page = push_page(&mut file, &map);

    let page_count = (file.len() / PAGE) as u32;

    // superblock
    let mut superblock = Vec::new();
    superblock.extend_from_slice(MAGIC);
    superblock.extend_from_slice(&(PAGE as u32).to_le_bytes());
    superblock.extend_from_slice(&1u32.to_le_bytes()); // free page map
    superblock.extend_from_slice(&page_count.to_le_bytes());
    superblock.extend_from_slice(&(directory.len() as u32).to_le_bytes());
    superblock.extend_from_slice(&0u32.to_le_bytes()); // reserved
    superblock.extend_from_slice(&map_page.to_le_bytes());
    file[..superblock.len()].copy_from_slice(&superblock);

    file
}

/// A container with the fixed streams in their conventional slots.
pub fn build_pdb(tpi: Vec<u8>, symbols: Vec<u8>) -> Vec<u8> {
    build_msf(&[
        Vec::new(), // stream 0: old directory, unused
        pdbi_stream(),
        tpi,
        dbi_stream(4),
        symbols,
    ])
}

/// A minimal PDB info stream.
pub fn pdbi_stream() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&19990903u32.to_le_bytes()); // V70
    bytes.extend_from_slice(&0x5d8e4a61u32.to_le_bytes()); // signature
    bytes.extend_from_slice(&1u32.to_le_bytes()); // age
    bytes.extend_from_slice(&0x30313233u32.to_le_bytes());
    bytes.extend_from_slice(&0x3435u16.to_le_bytes());
    bytes.extend_from_slice(&0x3637u16.to_le_bytes());
    bytes.extend_from_slice(b"89abcdef");
    bytes
}

/// A 64-byte DBI header pointing at the given symbol records stream.
pub fn dbi_stream(symbol_records_stream: u16) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0xffffffffu32.to_le_bytes()); // signature
    bytes.extend_from_slice(&19990903u32.to_le_bytes()); // version
    bytes.extend_from_slice(&1u32.to_le_bytes()); // age
    bytes.extend_from_slice(&0xffffu16.to_le_bytes()); // gs symbols
    bytes.extend_from_slice(&0u16.to_le_bytes()); // internal version
    bytes.extend_from_slice(&0xffffu16.to_le_bytes()); // ps symbols
    bytes.extend_from_slice(&0u16.to_le_bytes()); // dll build
    bytes.extend_from_slice(&symbol_records_stream.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes()); // dll rbld
    bytes.extend_from_slice(&[0u8; 32]); // substream sizes
    bytes.extend_from_slice(&0u16.to_le_bytes()); // flags
    bytes.extend_from_slice(&0x8664u16.to_le_bytes()); // machine
    bytes.extend_from_slice(&0u32.to_le_bytes()); // reserved
    bytes
}

// leaf tags used by the builders
const LF_MODIFIER: u16 = 0x1001;
const LF_POINTER: u16 = 0x1002;
const LF_PROCEDURE: u16 = 0x1008;
const LF_ARGLIST: u16 = 0x1201;
const LF_FIELDLIST: u16 = 0x1203;
const LF_ENUMERATE: u16 = 0x1502;
const LF_ARRAY: u16 = 0x1503;
const LF_STRUCTURE: u16 = 0x1505;
const LF_ENUM: u16 = 0x1507;
const LF_MEMBER: u16 = 0x150d;
const LF_SHORT: u16 = 0x8001;

// symbol kinds used by the builders
const S_END: u16 = 0x0006;
const S_CONSTANT: u16 = 0x1107;
const S_UDT: u16 = 0x1108;
const S_GDATA32: u16 = 0x110d;
const S_PUB32: u16 = 0x110e;
const S_GPROC32: u16 = 0x1110;

fn pad_record(bytes: &mut Vec<u8>) {
    // (length prefix + body) must be 4-aligned; pad bytes are 0xf1..0xf3
    while (bytes.len() + 2) % 4 != 0 {
        bytes.push(0xf1);
    }
}

/// Builds a TPI stream record by record, handing out type indices.
pub struct TpiBuilder {
    records: Vec<Vec<u8>>,
}

impl TpiBuilder {
    pub fn new() -> Self {
        TpiBuilder {
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, mut body: Vec<u8>) -> TypeIndex {
        pad_record(&mut body);
        let index = TypeIndex(0x1000 + self.records.len() as u32);
        self.records.push(body);
        index
    }

    /// The index the next record will get.
    pub fn next_index(&self) -> TypeIndex {
        TypeIndex(0x1000 + self.records.len() as u32)
    }

    pub fn modifier(&mut self, underlying: TypeIndex, constant: bool) -> TypeIndex {
        let mut body = LF_MODIFIER.to_le_bytes().to_vec();
        body.extend_from_slice(&underlying.0.to_le_bytes());
        body.extend_from_slice(&u16::from(constant).to_le_bytes());
        self.push(body)
    }

    pub fn pointer(&mut self, underlying: TypeIndex) -> TypeIndex {
        let mut body = LF_POINTER.to_le_bytes().to_vec();
        body.extend_from_slice(&underlying.0.to_le_bytes());
        // 64-bit pointer: ptrtype 0x0c, size 8
        body.extend_from_slice(&(0x0cu32 | (8 << 13)).to_le_bytes());
        self.push(body)
    }

    pub fn field_list(&mut self, members: &[Vec<u8>]) -> TypeIndex {
        let mut body = LF_FIELDLIST.to_le_bytes().to_vec();
        for member in members {
            body.extend_from_slice(member);
        }
        self.push(body)
    }

    pub fn enumeration(&mut self, name: &str, underlying: TypeIndex, fields: TypeIndex) -> TypeIndex {
        let mut body = LF_ENUM.to_le_bytes().to_vec();
        body.extend_from_slice(&1u16.to_le_bytes()); // count
        body.extend_from_slice(&0u16.to_le_bytes()); // properties
        body.extend_from_slice(&underlying.0.to_le_bytes());
        body.extend_from_slice(&fields.0.to_le_bytes());
        body.extend_from_slice(name.as_bytes());
        body.push(0);
        self.push(body)
    }

    pub fn structure(
        &mut self,
        name: &str,
        properties: u16,
        fields: Option<TypeIndex>,
        size: u16,
    ) -> TypeIndex {
        let mut body = LF_STRUCTURE.to_le_bytes().to_vec();
        body.extend_from_slice(&0u16.to_le_bytes()); // count
        body.extend_from_slice(&properties.to_le_bytes());
        body.extend_from_slice(&fields.map_or(0, |f| f.0).to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes()); // derived_from
        body.extend_from_slice(&0u32.to_le_bytes()); // vtable_shape
        body.extend_from_slice(&size.to_le_bytes()); // direct numeric leaf
        body.extend_from_slice(name.as_bytes());
        body.push(0);
        self.push(body)
    }

    /// A forward reference: properties bit 0x0080 and no field list.
    pub fn forward_reference(&mut self, name: &str) -> TypeIndex {
        self.structure(name, 0x0080, None, 0)
    }

    pub fn array(&mut self, element: TypeIndex, byte_size: u16) -> TypeIndex {
        let mut body = LF_ARRAY.to_le_bytes().to_vec();
        body.extend_from_slice(&element.0.to_le_bytes());
        body.extend_from_slice(&0x74u32.to_le_bytes()); // indexed by int32
        body.extend_from_slice(&byte_size.to_le_bytes()); // direct numeric leaf
        body.push(0); // end of dimensions
        self.push(body)
    }

    pub fn argument_list(&mut self, arguments: &[TypeIndex]) -> TypeIndex {
        let mut body = LF_ARGLIST.to_le_bytes().to_vec();
        body.extend_from_slice(&(arguments.len() as u32).to_le_bytes());
        for argument in arguments {
            body.extend_from_slice(&argument.0.to_le_bytes());
        }
        self.push(body)
    }

    pub fn procedure(&mut self, return_type: TypeIndex, arguments: TypeIndex, count: u16) -> TypeIndex {
        let mut body = LF_PROCEDURE.to_le_bytes().to_vec();
        body.extend_from_slice(&return_type.0.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes()); // attributes: near C
        body.extend_from_slice(&count.to_le_bytes());
        body.extend_from_slice(&arguments.0.to_le_bytes());
        self.push(body)
    }

    /// Serialize the stream: 56-byte header, then the records.
    pub fn build(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        let total: usize = self.records.iter().map(|r| r.len() + 2).sum();
        bytes.extend_from_slice(&20040203u32.to_le_bytes()); // version
        bytes.extend_from_slice(&56u32.to_le_bytes()); // header size
        bytes.extend_from_slice(&0x1000u32.to_le_bytes());
        bytes.extend_from_slice(&(0x1000 + self.records.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(total as u32).to_le_bytes());
        bytes.extend_from_slice(&0xffffu16.to_le_bytes()); // hash stream
        bytes.extend_from_slice(&0xffffu16.to_le_bytes()); // hash pad stream
        bytes.extend_from_slice(&[0u8; 32]); // hash sizes and slices
        for record in &self.records {
            bytes.extend_from_slice(&(record.len() as u16).to_le_bytes());
            bytes.extend_from_slice(record);
        }
        bytes
    }
}

/// An `LF_MEMBER` leaf for a field list.
pub fn member(name: &str, field_type: TypeIndex, offset: u16) -> Vec<u8> {
    let mut bytes = LF_MEMBER.to_le_bytes().to_vec();
    bytes.extend_from_slice(&3u16.to_le_bytes()); // public access
    bytes.extend_from_slice(&field_type.0.to_le_bytes());
    bytes.extend_from_slice(&offset.to_le_bytes()); // direct numeric leaf
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0xf1);
    }
    bytes
}

/// An `LF_ENUMERATE` leaf for a field list.
pub fn enumerate(name: &str, value: u16) -> Vec<u8> {
    let mut bytes = LF_ENUMERATE.to_le_bytes().to_vec();
    bytes.extend_from_slice(&3u16.to_le_bytes()); // public access
    bytes.extend_from_slice(&value.to_le_bytes()); // direct numeric leaf
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0xf1);
    }
    bytes
}

/// Builds a symbol records stream.
pub struct SymBuilder {
    bytes: Vec<u8>,
}

impl SymBuilder {
    pub fn new() -> Self {
        SymBuilder { bytes: Vec::new() }
    }

    pub fn record(&mut self, kind: u16, payload: &[u8]) -> &mut Self {
        let mut body = kind.to_le_bytes().to_vec();
        body.extend_from_slice(payload);
        while (body.len() + 2) % 4 != 0 {
            body.push(0);
        }
        self.bytes.extend_from_slice(&(body.len() as u16).to_le_bytes());
        self.bytes.extend_from_slice(&body);
        self
    }

    /// An `S_CONSTANT` with a direct (unsigned, < 0x8000) value.
    pub fn constant(&mut self, name: &str, type_index: TypeIndex, value: u16) -> &mut Self {
        let mut payload = type_index.0.to_le_bytes().to_vec();
        payload.extend_from_slice(&value.to_le_bytes());
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        self.record(S_CONSTANT, &payload)
    }

    /// An `S_CONSTANT` with an `LF_SHORT` (signed 16-bit) value.
    pub fn constant_i16(&mut self, name: &str, type_index: TypeIndex, value: i16) -> &mut Self {
        let mut payload = type_index.0.to_le_bytes().to_vec();
        payload.extend_from_slice(&LF_SHORT.to_le_bytes());
        payload.extend_from_slice(&value.to_le_bytes());
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        self.record(S_CONSTANT, &payload)
    }

    pub fn global_data(&mut self, name: &str, type_index: TypeIndex, offset: u32) -> &mut Self {
        let mut payload = type_index.0.to_le_bytes().to_vec();
        payload.extend_from_slice(&offset.to_le_bytes());
        payload.extend_from_slice(&1u16.to_le_bytes()); // segment
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        self.record(S_GDATA32, &payload)
    }

    pub fn public(&mut self, name: &str, function: bool, offset: u32) -> &mut Self {
        let flags: u32 = if function { 0x3 } else { 0x0 };
        let mut payload = flags.to_le_bytes().to_vec();
        payload.extend_from_slice(&offset.to_le_bytes());
        payload.extend_from_slice(&1u16.to_le_bytes()); // segment
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        self.record(S_PUB32, &payload)
    }

    /// An `S_GPROC32` scope, immediately closed by `S_END`.
    pub fn procedure(&mut self, name: &str, type_index: TypeIndex, offset: u32) -> &mut Self {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0u32.to_le_bytes()); // parent
        payload.extend_from_slice(&0u32.to_le_bytes()); // end, unused here
        payload.extend_from_slice(&0u32.to_le_bytes()); // next
        payload.extend_from_slice(&64u32.to_le_bytes()); // code length
        payload.extend_from_slice(&4u32.to_le_bytes()); // dbg start
        payload.extend_from_slice(&60u32.to_le_bytes()); // dbg end
        payload.extend_from_slice(&type_index.0.to_le_bytes());
        payload.extend_from_slice(&offset.to_le_bytes());
        payload.extend_from_slice(&1u16.to_le_bytes()); // segment
        payload.push(0); // flags
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        self.record(S_GPROC32, &payload);
        self.record(S_END, &[])
    }

    pub fn udt(&mut self, name: &str, type_index: TypeIndex) -> &mut Self {
        let mut payload = type_index.0.to_le_bytes().to_vec();
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        self.record(S_UDT, &payload)
    }

    pub fn build(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}
