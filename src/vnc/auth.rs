//! VNC password authentication.
//!
//! The VNC security type encrypts a 16-byte server challenge with DES in
//! ECB mode. The key is the password truncated or zero-padded to 8 bytes,
//! with the bit order of every byte mirrored (an RFB quirk inherited from
//! the original AT&T implementation).

use des::Des;
use des::cipher::generic_array::GenericArray;
use des::cipher::{BlockEncrypt, KeyInit};

pub(crate) fn encrypt_challenge(password: &str, challenge: &[u8; 16]) -> [u8; 16] {
    let mut key = [0u8; 8];
    for (slot, byte) in key.iter_mut().zip(password.bytes()) {
        *slot = byte.reverse_bits();
    }

    let cipher = Des::new(&GenericArray::from(key));
    let mut response = [0u8; 16];
    for (chunk, out) in challenge.chunks(8).zip(response.chunks_mut(8)) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.encrypt_block(&mut block);
        out.copy_from_slice(&block);
    }
    response
}
