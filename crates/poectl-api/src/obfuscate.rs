// Password obfuscation for the switch's login form.
//
// Mirrors the `encode()` routine the vendor web UI runs in the browser.
// This is not a security mechanism; the device simply refuses logins whose
// password field doesn't have this shape.

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Step at which the tens digit of the password length is emitted.
pub const LENGTH_TENS_STEP: usize = 123;
/// Step at which the units digit of the password length is emitted.
pub const LENGTH_UNITS_STEP: usize = 289;

/// Shape of the obfuscated string for one firmware family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    total_length: usize,
    interleave_stride: usize,
}

impl EncodeParams {
    pub(crate) const QUERY_LOGIN: Self = Self {
        total_length: 320,
        interleave_stride: 7,
    };
    pub(crate) const FORM_LOGIN: Self = Self {
        total_length: 321,
        interleave_stride: 5,
    };

    /// `None` when `interleave_stride` is zero.
    pub const fn new(total_length: usize, interleave_stride: usize) -> Option<Self> {
        if interleave_stride == 0 {
            return None;
        }
        Some(Self {
            total_length,
            interleave_stride,
        })
    }

    pub fn total_length(&self) -> usize {
        self.total_length
    }

    pub fn interleave_stride(&self) -> usize {
        self.interleave_stride
    }
}

/// Obfuscate `password` using thread-local randomness for the filler.
pub fn encode(password: &str, params: EncodeParams) -> String {
    encode_with_rng(password, params, &mut rand::rng())
}

/// Obfuscate `password`, drawing filler characters from `rng`.
///
/// Runs `total_length - len` steps. Every `interleave_stride`-th step emits
/// the next password character counting from the end, steps 123 and 289
/// emit the password length as decimal digits, everything else is random
/// alphanumeric filler.
pub fn encode_with_rng<R: Rng + ?Sized>(password: &str, params: EncodeParams, rng: &mut R) -> String {
    let chars: Vec<char> = password.chars().collect();
    let len = chars.len();
    let steps = params.total_length.saturating_sub(len);
    let mut cursor = len;
    let mut out = String::with_capacity(steps);

    for i in 1..=steps {
        if i % params.interleave_stride == 0 && cursor > 0 {
            cursor -= 1;
            out.push(chars[cursor]);
        } else if i == LENGTH_TENS_STEP {
            if len < 10 {
                out.push('0');
            } else {
                out.push_str(&(len / 10).to_string());
            }
        } else if i == LENGTH_UNITS_STEP {
            out.push_str(&(len % 10).to_string());
        } else {
            let idx = rng.random_range(0..ALPHABET.len());
            out.push(char::from(ALPHABET[idx]));
        }
    }

    out
}
