use rand::Rng;

/// Source of booking codes. Implementations never consult the store; the
/// unique constraint plus the coordinator's retry loop resolve collisions.
pub trait BookingCodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

impl<F> BookingCodeGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate(&self) -> String {
        self()
    }
}

/// Crockford-style alphabet without 0, 1, I and O.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const DEFAULT_PREFIX: &str = "TKT";
const DEFAULT_LENGTH: usize = 10;

#[derive(Debug, Clone)]
pub struct RandomBookingCodes {
    prefix: String,
    length: usize,
}

impl RandomBookingCodes {
    pub fn new(prefix: impl Into<String>, length: usize) -> Self {
        Self {
            prefix: prefix.into(),
            length: length.max(1),
        }
    }
}

impl Default for RandomBookingCodes {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, DEFAULT_LENGTH)
    }
}

impl BookingCodeGenerator for RandomBookingCodes {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let body: String = (0..self.length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        format!("{}-{}", self.prefix, body)
    }
}
