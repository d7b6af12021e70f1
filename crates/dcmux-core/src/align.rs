//! Part-length alignment for file chunk requests.
//!
//! The remote file-serving protocol only accepts part lengths that are clean
//! divisors of its maximum chunk size, so the server can compute part
//! boundaries without per-request negotiation.

/// Minimum file part size in bytes. All part lengths are multiples of this.
pub const MIN_PART_SIZE: u32 = 4096;

/// Maximum file part size in bytes. All part lengths evenly divide this.
pub const MAX_PART_SIZE: u32 = 1 << 20;

/// Normalize a requested byte length to a protocol-valid part size.
///
/// Rounds up to a multiple of [`MIN_PART_SIZE`], then to the next length that
/// evenly divides [`MAX_PART_SIZE`]. Valid lengths are exactly the powers of
/// two in `[MIN_PART_SIZE, MAX_PART_SIZE]`, so the upward scan collapses to
/// `next_power_of_two`.
///
/// A requested length of zero yields [`MIN_PART_SIZE`]; requests above
/// [`MAX_PART_SIZE`] clamp to it.
pub fn align_part_length(requested: u32) -> u32 {
    if requested >= MAX_PART_SIZE {
        return MAX_PART_SIZE;
    }
    let rounded = requested.div_ceil(MIN_PART_SIZE).max(1) * MIN_PART_SIZE;
    rounded.next_power_of_two()
}
