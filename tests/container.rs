// Copyright 2025 pdbgraph Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io::Cursor;

use pdbgraph::{Container, ContainerError, Error};

mod common;
use common::{build_msf, PAGE};

#[test]
fn test_stream_round_trip() {
    let streams = vec![
        Vec::new(),
        b"first stream".to_vec(),
        vec![0xaa; 300],
    ];
    let file = build_msf(&streams);

    let mut container = Container::open(Cursor::new(file)).expect("open");
    assert_eq!(container.stream(1, None).expect("stream 1").as_slice(), b"first stream");
    assert_eq!(container.stream(2, None).expect("stream 2").len(), 300);
}

#[test]
fn test_multi_page_stream() {
    // spans three pages and ends mid-page
    let big: Vec<u8> = (0..PAGE * 2 + 100).map(|i| (i % 251) as u8).collect();
    let file = build_msf(&[Vec::new(), big.clone()]);

    let mut container = Container::open(Cursor::new(file)).expect("open");
    let stream = container.stream(1, None).expect("stream");
    assert_eq!(stream.as_slice(), big.as_slice());
}

#[test]
fn test_stream_limit() {
    let file = build_msf(&[Vec::new(), vec![7u8; 2000]]);

    let mut container = Container::open(Cursor::new(file)).expect("open");
    let stream = container.stream(1, Some(10)).expect("stream");
    assert_eq!(stream.as_slice(), &[7u8; 10]);
}

#[test]
fn test_missing_stream() {
    let file = build_msf(&[Vec::new(), b"only one".to_vec()]);

    let mut container = Container::open(Cursor::new(file)).expect("open");
    match container.stream(5, None) {
        Err(Error::Container(ContainerError::StreamNotFound(5))) => (),
        other => panic!("expected StreamNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_empty_stream() {
    let file = build_msf(&[Vec::new(), b"data".to_vec()]);

    let mut container = Container::open(Cursor::new(file)).expect("open");
    let stream = container.stream(0, None).expect("stream 0");
    assert!(stream.as_slice().is_empty());
}

#[test]
fn test_truncated_container() {
    let mut file = build_msf(&[Vec::new(), vec![1u8; 100]]);
    // drop everything past the superblock page
    file.truncate(PAGE);

    let mut container = Container::open(Cursor::new(file)).expect("open");
    match container.stream(1, None) {
        Err(Error::Container(ContainerError::Truncated)) => (),
        other => panic!("expected Truncated, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_page_reference_out_of_range() {
    let mut file = build_msf(&[Vec::new(), b"payload".to_vec()]);
    // the superblock's directory map pointer is the last u32 of the header;
    // point it past the end of the file
    let bogus = ((file.len() / PAGE) + 10) as u32;
    file[52..56].copy_from_slice(&bogus.to_le_bytes());

    match Container::open(Cursor::new(file)) {
        Err(Error::Container(ContainerError::PageOutOfRange(page))) => {
            assert_eq!(page, bogus);
        }
        other => panic!("expected PageOutOfRange, got {:?}", other.map(|_| ())),
    }
}
