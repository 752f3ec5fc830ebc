// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

#![allow(unused)]

// Symbol kinds, as catalogued in cvinfo.h:
//   https://github.com/Microsoft/microsoft-pdb/blob/082c5290e5aff028ae84e43affa8be717aa7af73/include/cvinfo.h#L2735

pub const S_END: u16 = 0x0006;
pub const S_SKIP: u16 = 0x0007;

pub const S_ALIGN: u16 = 0x0402;

pub const S_CONSTANT: u16 = 0x1107;
pub const S_UDT: u16 = 0x1108;
pub const S_LDATA32: u16 = 0x110c;
pub const S_GDATA32: u16 = 0x110d;
pub const S_PUB32: u16 = 0x110e;
pub const S_LPROC32: u16 = 0x110f;
pub const S_GPROC32: u16 = 0x1110;

pub const S_PROCREF: u16 = 0x1125;
pub const S_DATAREF: u16 = 0x1126;
pub const S_LPROCREF: u16 = 0x1127;

pub const S_EXPORT: u16 = 0x1138;

// CV_PUBSYMFLAGS_e
pub const CVPSF_CODE: u32 = 0x1;
pub const CVPSF_FUNCTION: u32 = 0x2;
