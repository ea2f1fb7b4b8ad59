//! Bit-matrix transposition for the OT extension.

/// Transposes an 8x8 bit matrix packed row-major into a `u64` (byte `i` is
/// row `i`, LSB0 bit order within each byte).
#[inline]
fn transpose_8x8(mut x: u64) -> u64 {
    let mut t;
    t = (x ^ (x >> 7)) & 0x00aa_00aa_00aa_00aa;
    x ^= t ^ (t << 7);
    t = (x ^ (x >> 14)) & 0x0000_cccc_0000_cccc;
    x ^= t ^ (t << 14);
    t = (x ^ (x >> 28)) & 0x0000_0000_f0f0_f0f0;
    x ^= t ^ (t << 28);
    x
}

/// Transposes a row-major packed bit matrix.
///
/// The input holds `nrows` rows of `ncols` bits each; the output holds
/// `ncols` rows of `nrows` bits. Both dimensions must be multiples of 8.
///
/// # Panics
///
/// Panics if the dimensions are not multiples of 8 or do not match the input
/// length.
pub fn transpose_bits(src: &[u8], nrows: usize, ncols: usize) -> Vec<u8> {
    assert_eq!(nrows % 8, 0, "row count must be a multiple of 8");
    assert_eq!(ncols % 8, 0, "column count must be a multiple of 8");
    assert_eq!(src.len(), nrows * ncols / 8, "matrix size mismatch");

    let in_width = ncols / 8;
    let out_width = nrows / 8;
    let mut out = vec![0u8; src.len()];

    for row_block in 0..nrows / 8 {
        for col_block in 0..in_width {
            let mut x = 0u64;
            for k in 0..8 {
                x |= (src[(row_block * 8 + k) * in_width + col_block] as u64) << (8 * k);
            }
            let y = transpose_8x8(x);
            for m in 0..8 {
                out[(col_block * 8 + m) * out_width + row_block] = (y >> (8 * m)) as u8;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha12Rng;

    use super::*;

    fn get_bit(m: &[u8], width: usize, row: usize, col: usize) -> bool {
        m[row * width + col / 8] >> (col % 8) & 1 == 1
    }

    #[test]
    fn test_transpose_matches_reference() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        for (nrows, ncols) in [(8, 8), (16, 8), (128, 64), (24, 40)] {
            let mut src = vec![0u8; nrows * ncols / 8];
            rng.fill_bytes(&mut src);

            let dst = transpose_bits(&src, nrows, ncols);
            for i in 0..nrows {
                for j in 0..ncols {
                    assert_eq!(
                        get_bit(&src, ncols / 8, i, j),
                        get_bit(&dst, nrows / 8, j, i),
                        "mismatch at ({i}, {j}) for {nrows}x{ncols}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_transpose_involution() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let mut src = vec![0u8; 128 * 32 / 8];
        rng.fill_bytes(&mut src);

        let double = transpose_bits(&transpose_bits(&src, 128, 32), 32, 128);
        assert_eq!(double, src);
    }
}
