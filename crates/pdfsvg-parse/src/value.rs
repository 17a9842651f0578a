//! Structural hashing of PDF objects.
//!
//! Direct font dictionaries that live in a direct resource dictionary
//! have no object number. They are identified by a 31-bit FNV-1a hash of
//! a tagged serialization instead, so equal dictionaries always map to the
//! same [`FontId`](pdfsvg_core::FontId).

use lopdf::Object;

const FNV_OFFSET: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// FNV-1a over bytes.
#[derive(Debug, Clone, Copy)]
pub struct FnvHash(u32);

impl Default for FnvHash {
    fn default() -> Self {
        FnvHash(FNV_OFFSET)
    }
}

impl FnvHash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn byte(&mut self, b: u8) {
        self.0 ^= u32::from(b);
        self.0 = self.0.wrapping_mul(FNV_PRIME);
    }

    pub fn bytes(&mut self, data: &[u8]) {
        for b in data {
            self.byte(*b);
        }
    }

    fn int(&mut self, n: i32) {
        self.bytes(&n.to_le_bytes());
    }

    /// The hash folded to 31 bits.
    pub fn get31(&self) -> u32 {
        (self.0 ^ (self.0 >> 31)) & 0x7fff_ffff
    }
}

/// 31-bit structural hash of `obj`. References are hashed by number,
/// never followed.
pub fn hash31(obj: &Object) -> u32 {
    let mut h = FnvHash::new();
    hash_object(obj, &mut h);
    h.get31()
}

fn hash_object(obj: &Object, h: &mut FnvHash) {
    match obj {
        Object::Boolean(b) => {
            h.byte(b'b');
            h.byte(u8::from(*b));
        }
        Object::Integer(i) => {
            h.byte(b'i');
            h.int(*i as i32);
        }
        Object::Real(r) => {
            h.byte(b'r');
            h.bytes(&f64::from(*r).to_le_bytes());
        }
        Object::String(s, _) => {
            h.byte(b's');
            h.bytes(s);
        }
        Object::Name(n) => {
            h.byte(b'n');
            h.bytes(n);
        }
        Object::Null => h.byte(b'z'),
        Object::Array(items) => {
            h.byte(b'a');
            h.int(items.len() as i32);
            for item in items {
                hash_object(item, h);
            }
        }
        Object::Dictionary(dict) => {
            h.byte(b'd');
            h.int(dict.len() as i32);
            for (key, value) in dict.iter() {
                h.bytes(key);
                hash_object(value, h);
            }
        }
        // Streams are always indirect in valid files.
        Object::Stream(_) => {}
        Object::Reference((num, generation)) => {
            h.byte(b'f');
            h.int(*num as i32);
            h.int(i32::from(*generation));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, dictionary};

    fn font(name: &str) -> Object {
        Object::Dictionary(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => name,
        })
    }

    #[test]
    fn empty_input_is_offset_basis_folded() {
        let h = FnvHash::new();
        assert_eq!(h.get31(), (FNV_OFFSET ^ (FNV_OFFSET >> 31)) & 0x7fff_ffff);
    }

    #[test]
    fn known_single_byte() {
        // FNV-1a of "a" is 0xe40c292c.
        let mut h = FnvHash::new();
        h.byte(b'a');
        assert_eq!(h.0, 0xe40c_292c);
        assert_eq!(h.get31(), (0xe40c_292c_u32 ^ 1) & 0x7fff_ffff);
    }

    #[test]
    fn equal_dictionaries_hash_equal() {
        assert_eq!(hash31(&font("Helvetica")), hash31(&font("Helvetica")));
        assert_ne!(hash31(&font("Helvetica")), hash31(&font("Times-Roman")));
    }

    #[test]
    fn key_order_matters() {
        let mut a = Dictionary::new();
        a.set("A", 1);
        a.set("B", 2);
        let mut b = Dictionary::new();
        b.set("B", 2);
        b.set("A", 1);
        assert_ne!(hash31(&Object::Dictionary(a)), hash31(&Object::Dictionary(b)));
    }

    #[test]
    fn references_hash_by_number() {
        let a = Object::Reference((12, 0));
        let b = Object::Reference((12, 1));
        assert_ne!(hash31(&a), hash31(&b));
        assert!(hash31(&a) <= 0x7fff_ffff);
    }

    #[test]
    fn integer_and_real_differ() {
        assert_ne!(hash31(&Object::Integer(1)), hash31(&Object::Real(1.0)));
    }
}
