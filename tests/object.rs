#![cfg(feature = "object")]

use serde::{Deserialize, Serialize};
use strided_mp::{MpError, ObjectBuf, Range};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Particle {
    id: u32,
    position: [f64; 3],
    tags: Vec<String>,
}

fn particle(id: u32) -> Particle {
    Particle {
        id,
        position: [id as f64, 0.5 * id as f64, -(id as f64)],
        tags: (0..id % 3).map(|k| format!("t{k}")).collect(),
    }
}

/// Drain `src` through windows of `window_bytes` into `dst`.
fn transfer<T>(src: &mut ObjectBuf<'_, T>, dst: &mut ObjectBuf<'_, T>, window_bytes: usize) -> usize
where
    T: Serialize + serde::de::DeserializeOwned + Clone,
{
    let total = src.encoded_len().unwrap();
    let mut offset = 0;
    let mut stored = None;
    let mut scratch = vec![0u8; window_bytes];
    while offset < total {
        let mut w = &mut scratch[..];
        let n = src.pack(offset, &mut w).unwrap();
        offset += n;
        let mut window = &scratch[..n];
        if let Some(items) = dst.unpack(&mut window).unwrap() {
            stored = Some(items);
        }
        assert!(window.is_empty());
    }
    stored.expect("message incomplete")
}

#[test]
fn test_object_round_trip_any_window() {
    for window_bytes in [1, 3, 7, 64, 4096] {
        let mut src_items: Vec<Particle> = (0..6).map(particle).collect();
        let mut dst_items = vec![Particle::default(); 3];
        let mut src = ObjectBuf::slice(&mut src_items, Range::with_stride(1, 5, 2).unwrap()).unwrap();
        let mut dst = ObjectBuf::whole(&mut dst_items);
        assert_eq!(transfer(&mut src, &mut dst, window_bytes), 3);
        assert_eq!(dst_items, vec![particle(1), particle(3), particle(5)]);
    }
}

#[test]
fn test_shorter_receiver_keeps_prefix() {
    let mut src_items = vec![String::from("a"), String::from("b"), String::from("c")];
    let mut dst_items = vec![String::new(); 2];
    let mut src = ObjectBuf::whole(&mut src_items);
    let mut dst = ObjectBuf::whole(&mut dst_items);
    assert_eq!(transfer(&mut src, &mut dst, 5), 2);
    assert_eq!(dst_items, vec!["a", "b"]);
}

#[test]
fn test_corrupt_message_rejected_and_receiver_recovers() {
    let mut dst_items = vec![1u32, 2];
    let mut dst = ObjectBuf::whole(&mut dst_items);
    let garbage = [0u8, 0, 0, 2, 0xff, 0xff];
    assert!(matches!(dst.unpack(&mut &garbage[..]), Err(MpError::Decode(_))));
    assert_eq!(*dst.get(1), 2);

    let mut good_items = vec![9u32, 8];
    let mut good = ObjectBuf::whole(&mut good_items);
    let mut bytes = Vec::new();
    good.pack(0, &mut bytes).unwrap();
    assert_eq!(dst.unpack(&mut &bytes[..]).unwrap(), Some(2));
    assert_eq!(dst_items, vec![9, 8]);
}

#[test]
fn test_object_reduction_concatenates() {
    let mut acc = vec![vec![1u8], vec![2u8]];
    let mut incoming = vec![vec![10u8, 11], vec![20u8]];
    let mut bytes = Vec::new();
    ObjectBuf::whole(&mut incoming).pack(0, &mut bytes).unwrap();

    let mut dst = ObjectBuf::whole(&mut acc);
    let mut concat = dst.reduction(|mut a, b| {
        a.extend(b);
        a
    });
    let (head, tail) = bytes.split_at(3);
    assert_eq!(concat.unpack(&mut &head[..]).unwrap(), None);
    assert_eq!(concat.unpack(&mut &tail[..]).unwrap(), Some(2));
    assert_eq!(acc, vec![vec![1, 10, 11], vec![2, 20]]);
}
