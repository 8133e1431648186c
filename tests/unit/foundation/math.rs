use super::*;

#[test]
fn mul_div255_endpoints() {
    assert_eq!(mul_div255_u8(255, 255), 255);
    assert_eq!(mul_div255_u8(0, 255), 0);
    assert_eq!(mul_div255_u8(255, 0), 0);
    assert_eq!(mul_div255_u8(128, 255), 128);
}

#[test]
fn fingerprint_separates_part_boundaries() {
    let a = fingerprint_bytes(&[b"ab", b"c"]);
    let b = fingerprint_bytes(&[b"a", b"bc"]);
    assert_ne!(a, b);
    assert_eq!(a, fingerprint_bytes(&[b"ab", b"c"]));
}

#[test]
fn pack_rgba_orders_by_red_first() {
    assert!(pack_rgba([1, 0, 0, 0]) > pack_rgba([0, 255, 255, 255]));
}
