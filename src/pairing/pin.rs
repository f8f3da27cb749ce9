use rand::{Rng, seq::SliceRandom};

/// Characters a PIN is made of. Look-alikes (`0`/`O`, `1`/`I`) are left out.
pub const PIN_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in a PIN.
pub const PIN_LENGTH: usize = 6;

/// Generates a random PIN from [`PIN_ALPHABET`].
pub fn generate_pin<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..PIN_LENGTH)
        .filter_map(|_| PIN_ALPHABET.choose(rng).map(|c| *c as char))
        .collect()
}
