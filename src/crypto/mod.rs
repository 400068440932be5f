//! ESET `.NQF` byte transform.
//!
//! Every byte of a quarantine container is obfuscated independently:
//!
//! ```text
//! plain  = ((stored - 84) mod 256) XOR 0xA5
//! stored = ((plain XOR 0xA5) + 84) mod 256
//! ```
//!
//! The mapping is a permutation of the 256 byte values but it is NOT an
//! involution: `decrypt(decrypt(x)) != x` in general.  Use [`encrypt`] to go
//! back.
//!
//! There is no header, no key and no error path.  Any byte sequence,
//! including an empty one, is a valid container body.

use std::io::{self, Read, Write};

/// Tag written into decrypted output names (`*.00000000_ESET.out`).
pub const CIPHER_TAG: &str = "ESET";

/// Subtracted (mod 256) from every stored byte before the XOR.
pub const BYTE_OFFSET: u8 = 84;
/// XOR mask applied after the offset.
pub const XOR_MASK: u8 = 0xA5;

/// Chunk size used by [`decrypt_stream`].
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Full 256-entry decryption table, built at compile time.
const DECRYPT_TABLE: [u8; 256] = build_table(false);
/// Inverse of [`DECRYPT_TABLE`].
const ENCRYPT_TABLE: [u8; 256] = build_table(true);

const fn build_table(inverse: bool) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let b = i as u8;
        table[i] = if inverse {
            (b ^ XOR_MASK).wrapping_add(BYTE_OFFSET)
        } else {
            b.wrapping_sub(BYTE_OFFSET) ^ XOR_MASK
        };
        i += 1;
    }
    table
}

// ── Single byte ───────────────────────────────────────────────────────────────

#[inline]
pub fn decrypt_byte(b: u8) -> u8 {
    DECRYPT_TABLE[b as usize]
}

#[inline]
pub fn encrypt_byte(b: u8) -> u8 {
    ENCRYPT_TABLE[b as usize]
}

// ── Buffers ───────────────────────────────────────────────────────────────────

/// Decrypt a container body.  Output has the same length as `data`; byte `i`
/// of the output depends only on byte `i` of the input.
pub fn decrypt(data: &[u8]) -> Vec<u8> {
    data.iter().map(|&b| decrypt_byte(b)).collect()
}

/// Inverse of [`decrypt`].  Produces a container body from plaintext.
pub fn encrypt(data: &[u8]) -> Vec<u8> {
    data.iter().map(|&b| encrypt_byte(b)).collect()
}

/// Decrypt `buf` without allocating.
pub fn decrypt_in_place(buf: &mut [u8]) {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        buf.par_chunks_mut(STREAM_CHUNK_SIZE)
            .for_each(|chunk| chunk.iter_mut().for_each(|b| *b = decrypt_byte(*b)));
    }

    #[cfg(not(feature = "parallel"))]
    {
        buf.iter_mut().for_each(|b| *b = decrypt_byte(*b));
    }
}

// ── Streaming ─────────────────────────────────────────────────────────────────

/// Decrypt everything `reader` yields into `writer`, [`STREAM_CHUNK_SIZE`]
/// bytes at a time.  Returns the number of bytes written.
pub fn decrypt_stream<R: Read, W: Write>(mut reader: R, mut writer: W) -> io::Result<u64> {
    let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        decrypt_in_place(&mut buf[..n]);
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    writer.flush()?;
    Ok(total)
}
