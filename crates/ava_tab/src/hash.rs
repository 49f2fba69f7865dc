//! Content hashing.
//!
//! Every asset stored in an archive pair is addressed by the 32-bit
//! `hashlittle` value (Bob Jenkins' lookup3, initval `0`) of its generic
//! path, e.g. `editor/entities/characters/main_characters/rico.ee`.

use byteorder::{ByteOrder, LittleEndian};

fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(4);
    *c = c.wrapping_add(*b);

    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(6);
    *a = a.wrapping_add(*c);

    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(8);
    *b = b.wrapping_add(*a);

    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(16);
    *c = c.wrapping_add(*b);

    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(19);
    *a = a.wrapping_add(*c);

    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(4);
    *b = b.wrapping_add(*a);
}

fn finalize(a: &mut u32, b: &mut u32, c: &mut u32) {
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(14));

    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(11));

    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(25));

    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(16));

    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(4));

    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(14));

    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(24));
}

/// Hash `key` into a `u32`, reading it as little-endian words.
pub fn hashlittle(key: &[u8], initval: u32) -> u32 {
    let mut a = 0xdeadbeef_u32
        .wrapping_add(key.len() as u32)
        .wrapping_add(initval);
    let mut b = a;
    let mut c = a;

    if key.is_empty() {
        return c;
    }

    let mut k = key;
    while k.len() > 12 {
        a = a.wrapping_add(LittleEndian::read_u32(&k[0..4]));
        b = b.wrapping_add(LittleEndian::read_u32(&k[4..8]));
        c = c.wrapping_add(LittleEndian::read_u32(&k[8..12]));
        mix(&mut a, &mut b, &mut c);
        k = &k[12..];
    }

    // missing tail bytes count as zero
    let mut tail = [0u8; 12];
    tail[..k.len()].copy_from_slice(k);
    a = a.wrapping_add(LittleEndian::read_u32(&tail[0..4]));
    b = b.wrapping_add(LittleEndian::read_u32(&tail[4..8]));
    c = c.wrapping_add(LittleEndian::read_u32(&tail[8..12]));

    finalize(&mut a, &mut b, &mut c);
    c
}

/// Hash a generic asset path the way the archive indices do.
#[inline]
pub fn hash_path(path: &str) -> u32 {
    hashlittle(path.as_bytes(), 0)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{hash_path, hashlittle};

    #[test]
    fn empty_key() {
        assert_eq!(hashlittle(b"", 0), 0xdeadbeef);
    }

    #[test]
    fn reference_vectors() {
        assert_eq!(hashlittle(b"Four score and seven years ago", 0), 0x17770551);
        assert_eq!(hashlittle(b"Four score and seven years ago", 1), 0xcd628161);
    }

    #[test]
    fn path_hash_is_case_sensitive() {
        assert_ne!(
            hash_path("textures/rico.ddsc"),
            hash_path("Textures/rico.ddsc")
        );
    }
}
